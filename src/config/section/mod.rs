//! Configuration section definitions.
//!
//! Each module corresponds to a section in `weft.toml`:
//!
//! | Module  | TOML Section                  | Purpose                        |
//! |---------|-------------------------------|--------------------------------|
//! | `build` | `[build]`, `[[build.entry]]`  | Paths, entries, output options |
//! | `serve` | `[serve]`                     | Development server             |

mod build;
mod serve;

pub use build::{BuildConfig, EntryConfig};
pub use serve::ServeConfig;
