//! Error type and the process-wide handle for the loaded config.

mod error;
pub mod handle;

pub use error::ConfigError;
pub use handle::{cfg, init_config};
