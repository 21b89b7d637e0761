//! `weft.toml`: sections, loading and validation.
//!
//! The file is optional; a project without one builds with the defaults.
//! CLI flags win over values from the file. Unknown keys are reported and
//! otherwise ignored.

pub mod section;
pub mod types;

pub use section::{BuildConfig, EntryConfig, ServeConfig};
pub use types::{ConfigError, cfg, init_config};

use crate::cli::Cli;
use crate::core::{BuildMode, Resolver};
use crate::log;
use crate::utils::glob::Glob;
use crate::utils::path::{lexical_normalize, normalize_path};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Env-file suffix used by production builds.
pub const PRODUCTION_MODE: &str = "production";

/// Parsed `weft.toml` plus the run's CLI and resolved root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeftConfig {
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Absolute; watched for "restart to apply" notices.
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub serve: ServeConfig,
}

impl WeftConfig {
    /// Resolve `<root>` against the cwd, read `<root>/<config>` when it
    /// exists, then apply CLI overrides and validate.
    pub fn load(cli: &'static Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("cannot determine the working directory")?;
        let root = normalize_path(&cwd.join(&cli.root));
        let config_path = root.join(&cli.config);

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)?
        } else {
            crate::debug!("config"; "{} not found, using defaults", cli.config.display());
            Self::default()
        };

        config.config_path = config_path;
        config.cli = Some(cli);
        config.root = root;
        config.apply_cli_options(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, unknown) = Self::parse_with_ignored(&content)?;
        for key in &unknown {
            log!("config"; "ignoring unknown key `{}` in {}", key, path.display());
        }
        Ok(config)
    }

    /// Parse, returning the dotted paths of keys no section declares.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut unknown = Vec::new();
        let config = serde_ignored::deserialize(
            toml::Deserializer::new(content),
            |key: serde_ignored::Path| unknown.push(key.to_string()),
        )?;
        Ok((config, unknown))
    }

    pub fn get_root(&self) -> &Path {
        &self.root
    }

    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        lexical_normalize(&self.root.join(path))
    }

    /// Resolver for ids, URIs and output paths of this project.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(&self.root, &self.build.src, &self.build.out)
    }

    /// Absolute assets directory.
    pub fn assets_dir(&self) -> PathBuf {
        self.root_join(&self.build.assets)
    }

    /// Build mode derived from the CLI and the `[build]` section.
    pub fn mode(&self) -> BuildMode {
        let watch = self.cli.is_some_and(|cli| cli.is_watch());
        BuildMode::new(watch, self.build.minify, self.build.critical)
    }

    /// Env-file suffix for this run.
    pub fn env_mode(&self) -> &str {
        if self.mode().watch {
            &self.build.mode
        } else {
            PRODUCTION_MODE
        }
    }

    /// Requested browser extension target, if any.
    pub fn webext(&self) -> Option<&str> {
        self.cli.and_then(|cli| cli.webext.as_deref())
    }

    fn apply_cli_options(&mut self, cli: &Cli) {
        crate::logger::set_verbose(cli.verbose);

        override_with(&mut self.build.minify, cli.minify);
        override_with(&mut self.build.critical, cli.critical);
        override_with(&mut self.serve.interface, cli.interface);
        override_with(&mut self.serve.port, cli.port);
    }

    /// Collect every problem into one error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.serve.port == 0 {
            problems.push("[serve] port must not be 0".to_string());
        }

        for pattern in &self.build.entries {
            if let Err(e) = Glob::new(pattern) {
                problems.push(format!("[build] entries: invalid pattern `{pattern}`: {e}"));
            } else if escapes(Path::new(pattern)) {
                problems.push(format!("[build] entries: `{pattern}` is outside the project root"));
            }
        }

        for entry in &self.build.entry {
            if entry.file.as_os_str().is_empty() {
                problems.push("[[build.entry]] file must not be empty".to_string());
            } else if escapes(&entry.file) {
                problems.push(format!(
                    "[[build.entry]] `{}` is outside the project root",
                    entry.file.display()
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems.join("\n")))
        }
    }
}

fn override_with<T>(value: &mut T, flag: Option<T>) {
    if let Some(flag) = flag {
        *value = flag;
    }
}

/// Whether a root-relative path leaves the root.
fn escapes(path: &Path) -> bool {
    if path.is_absolute() {
        return true;
    }
    let normalized = lexical_normalize(path);
    normalized.starts_with("..")
}

/// Parse a test config; unknown keys fail the test.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> WeftConfig {
    let (parsed, ignored) = WeftConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}
