use std::path::PathBuf;

use thiserror::Error;

/// Failure to load `weft.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// One problem per line.
    #[error("invalid config:\n{0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_messages_name_the_problem() {
        let err = ConfigError::Io(
            PathBuf::from("site/weft.toml"),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.to_string(), "cannot read `site/weft.toml`");

        let err = ConfigError::Validation("serve.port must not be 0".into());
        assert!(err.to_string().ends_with("\nserve.port must not be 0"));
    }
}
