//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `TraversalState`: where the orchestrator is in its walk over list pages
//! - `RunContext`: start time, cancellation token, link set and aggregator of one run

mod run_context;
mod traversal;

pub use run_context::RunContext;
pub use traversal::{StopReason, TraversalState};
