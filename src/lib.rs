pub mod cli;
pub mod error;
pub mod models;
pub mod services;
pub mod sources;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use cli::{Cli, Commands};
pub use models::{Config, OutputFormat};
pub use services::{Ingestor, Orchestrator};
