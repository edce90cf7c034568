pub mod cli;
pub mod error;
pub mod loader;
pub mod schema;

pub use cli::Cli;
pub use error::{Error, Result};
pub use loader::load_config;
pub use schema::{CanopyConfig, PartialConfig};
