//! Watch mode actors.
//!
//! ```text
//! FsActor --Pass--> BuildActor (Orchestrator) --evaluate/reload--> Hmr
//! (watch)            (session)
//! ```
//!
//! - `messages` - Message types between the actors
//! - `fs` - File watcher with the debounce state machine
//! - `coordinator` - Classification, reload decision and the pass itself

pub mod coordinator;
pub mod fs;
pub mod messages;

pub use coordinator::{Coordinator, Orchestrator};
pub use fs::FsActor;
