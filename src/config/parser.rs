use crate::config::types::{Config, PortalConfig, RunOptions};
use crate::config::validation::{validate, validate_portal};
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use portal_harvest::config::load_config;
///
/// let config = load_config(Path::new("config/portals.toml")).unwrap();
/// println!("Portals: {:?}", config.portals.keys().collect::<Vec<_>>());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is recorded with every run so that results can be traced back
/// to the exact selector set that produced them.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Picks the requested portal and applies the command-line overrides
///
/// The overridden portal is validated again so a bad `--max-pages` or
/// `--workers` value is rejected before any request is made.
pub fn resolve_portal(config: &Config, options: &RunOptions) -> Result<PortalConfig, ConfigError> {
    let mut portal = config
        .portals
        .get(&options.portal)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownPortal {
            name: options.portal.clone(),
            available: config
                .portals
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    if options.sector.trim().is_empty() {
        return Err(ConfigError::Validation("sector cannot be empty".to_string()));
    }

    if let Some(max_pages) = options.max_pages {
        portal.max_pages = max_pages;
    }
    if let Some(workers) = options.workers {
        portal.workers = workers;
    }

    validate_portal(&options.portal, &portal)?;
    Ok(portal)
}
