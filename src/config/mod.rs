//! Configuration module for Portal-Harvest
//!
//! Portals are described in a TOML file, one `[portals.<name>]` table each.
//! Adding a portal never requires code changes.
//!
//! # Example
//!
//! ```no_run
//! use portal_harvest::config::{load_config, resolve_portal, RunOptions};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config/portals.toml")).unwrap();
//! let portal = resolve_portal(&config, &RunOptions::new("europages", "packaging")).unwrap();
//! println!("Visiting up to {} pages", portal.max_pages);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, EmailConfig, Engine, OutputConfig, PaginationStyle, PortalConfig, RunOptions,
    SelectorSet,
};

pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, resolve_portal,
};

pub(crate) use validation::validate_domain_pattern;
