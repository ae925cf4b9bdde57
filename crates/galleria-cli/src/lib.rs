//! Galleria command-line interface.
//!
//! Exposes the ingest boundary, asset and section listings, the cleanup
//! sweep and quota diagnostics.

pub mod commands;
pub mod context;
pub mod error;
pub mod logging;
pub mod output;
pub mod router;

pub use error::{CliError, CliResult};
pub use router::{Cli, CommandRouter, Commands};
