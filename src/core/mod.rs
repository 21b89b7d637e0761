//! Core types - pure abstractions shared across the codebase.

pub mod id;
mod mode;
mod state;

pub use id::Resolver;
pub use mode::BuildMode;
pub use state::{
    is_serving, is_shutdown, register_server, set_serving, setup_shutdown_handler,
};
