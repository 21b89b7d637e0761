//! Path utilities.
//!
//! Pure functions for path manipulation. No side effects except
//! `normalize_path`, which consults the filesystem.

pub mod fs;

pub use fs::{lexical_normalize, normalize_path, relative_to};
