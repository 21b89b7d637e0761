//! Build and resolution errors.

use thiserror::Error;

/// A per-file build failure.
///
/// Two errors are equal when their messages are, so repeated failures of
/// the same root cause collapse into one report.
#[derive(Debug, Clone, Error)]
#[error("{path}: {message}")]
pub struct BuildError {
    /// Id of the file that failed.
    pub path: String,
    pub message: String,
}

impl BuildError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl PartialEq for BuildError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
    }
}

impl Eq for BuildError {}

/// An import specifier that maps to no module.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot resolve `{specifier}` from `{importer}`")]
pub struct ResolveError {
    pub specifier: String,
    pub importer: String,
}

impl From<ResolveError> for BuildError {
    fn from(err: ResolveError) -> Self {
        Self::new(err.importer.clone(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_errors_compare_by_message() {
        let a = BuildError::new("src/a.js", "unexpected token");
        let b = BuildError::new("src/b.js", "unexpected token");
        assert_eq!(a, b);
        assert_ne!(a, BuildError::new("src/a.js", "missing file"));
    }

    #[test]
    fn test_resolve_error_into_build_error() {
        let err: BuildError = ResolveError {
            specifier: "./missing.js".into(),
            importer: "src/main.js".into(),
        }
        .into();
        assert_eq!(err.path, "src/main.js");
        assert!(err.message.contains("./missing.js"));
    }
}
