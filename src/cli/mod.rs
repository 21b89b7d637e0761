//! `weft [root]` builds once; `weft --watch [root]` serves and rebuilds.

mod args;
pub mod build;
pub mod serve;

pub use args::Cli;
