//! Shared utilities.

pub mod glob;
pub mod hash;
pub mod mime;
pub mod minify;
pub mod path;
pub mod plural;

pub use plural::plural_count;
