//! # CLI configuration
//!
//! Layered resolution of [`CliConfig`], lowest precedence first:
//!
//! 1. Built-in defaults (the nearest `schemas/` directory above the working
//!    directory, a 30 second fetch timeout, the latest version triple).
//! 2. An optional YAML file passed with `--config`.
//! 3. Environment variables `TCS_SCHEMA_DIR` and `TCS_FETCH_TIMEOUT_SECS`.
//! 4. Per-subcommand flags, applied by the subcommand handlers.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tcs_core::{CompatibilityError, VersionRegistry, VersionTriple};

/// Default request timeout for `tcs fetch`.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Resolved configuration shared by all subcommands.
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// Directory holding the bundled `*.schema.json` files.
    pub schema_dir: PathBuf,
    /// Request timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Versions used when a command does not name them.
    pub default_versions: VersionTriple,
}

/// The on-disk shape of a `--config` file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    schema_dir: Option<PathBuf>,
    fetch_timeout_secs: Option<u64>,
    default_versions: Option<VersionTriple>,
}

/// Configuration errors. All of them are operational (exit code 2).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("default_versions is not a supported combination: {0}")]
    Incompatible(#[from] CompatibilityError),
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            schema_dir: default_schema_dir(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            default_versions: VersionRegistry::latest_triple(),
        }
    }
}

impl CliConfig {
    /// Resolve from defaults, `file` and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve(file, |var| std::env::var(var).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve(
        file: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = file {
            let layer = read_file(path)?;
            if let Some(dir) = layer.schema_dir {
                // Relative paths in a config file are relative to the file.
                config.schema_dir = match path.parent() {
                    Some(parent) if dir.is_relative() => parent.join(dir),
                    _ => dir,
                };
            }
            if let Some(secs) = layer.fetch_timeout_secs {
                config.fetch_timeout_secs = secs;
            }
            if let Some(triple) = layer.default_versions {
                config.default_versions = triple;
            }
            tracing::debug!(path = %path.display(), "config file applied");
        }

        if let Some(dir) = env("TCS_SCHEMA_DIR") {
            config.schema_dir = PathBuf::from(dir);
        }
        if let Some(raw) = env("TCS_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout_secs = raw.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "TCS_FETCH_TIMEOUT_SECS",
                value: raw,
            })?;
        }

        VersionRegistry::assert_triple(&config.default_versions)?;
        Ok(config)
    }

    /// The registry carrying this configuration's default versions.
    pub fn registry(&self) -> Result<VersionRegistry, ConfigError> {
        Ok(VersionRegistry::with_defaults(self.default_versions)?)
    }

    /// `flag` when given, the configured schema directory otherwise.
    pub fn schema_dir_or(&self, flag: Option<&Path>) -> PathBuf {
        flag.map_or_else(|| self.schema_dir.clone(), Path::to_path_buf)
    }
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Walk up from the current directory to the nearest `schemas/`.
fn default_schema_dir() -> PathBuf {
    let found = std::env::current_dir().ok().and_then(|cwd| {
        cwd.ancestors()
            .map(|dir| dir.join("schemas"))
            .find(|candidate| candidate.is_dir())
    });
    found.unwrap_or_else(|| PathBuf::from("schemas"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcs_core::{OrganisationVersion, ReportVersion, TcsVersion};

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = CliConfig::resolve(None, no_env).unwrap();
        assert_eq!(config.fetch_timeout_secs, DEFAULT_FETCH_TIMEOUT_SECS);
        assert_eq!(config.default_versions, VersionRegistry::latest_triple());
    }

    #[test]
    fn file_then_env_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tcs.yaml");
        std::fs::write(
            &path,
            "schema_dir: bundled\nfetch_timeout_secs: 5\ndefault_versions:\n  organisation: '0.1.0'\n  report: '0.0.2'\n  tech_carbon_standard: '0.0.2'\n",
        )
        .unwrap();

        let from_file = CliConfig::resolve(Some(&path), no_env).unwrap();
        assert_eq!(from_file.schema_dir, dir.path().join("bundled"));
        assert_eq!(from_file.fetch_timeout_secs, 5);
        assert_eq!(
            from_file.default_versions,
            VersionTriple::new(
                OrganisationVersion::V0_1_0,
                ReportVersion::V0_0_2,
                TcsVersion::V0_0_2
            )
        );

        let env = |var: &str| match var {
            "TCS_SCHEMA_DIR" => Some("/opt/schemas".to_string()),
            "TCS_FETCH_TIMEOUT_SECS" => Some("90".to_string()),
            _ => None,
        };
        let overridden = CliConfig::resolve(Some(&path), env).unwrap();
        assert_eq!(overridden.schema_dir, PathBuf::from("/opt/schemas"));
        assert_eq!(overridden.fetch_timeout_secs, 90);
    }

    #[test]
    fn flag_beats_config() {
        let config = CliConfig::resolve(None, no_env).unwrap();
        assert_eq!(
            config.schema_dir_or(Some(Path::new("/x"))),
            PathBuf::from("/x")
        );
        assert_eq!(config.schema_dir_or(None), config.schema_dir);
    }

    #[test]
    fn invalid_timeout_env_rejected() {
        let env = |var: &str| (var == "TCS_FETCH_TIMEOUT_SECS").then(|| "soon".to_string());
        let err = CliConfig::resolve(None, env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn incompatible_default_versions_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tcs.yaml");
        std::fs::write(
            &path,
            "default_versions:\n  organisation: '0.0.1'\n  report: '0.0.3'\n  tech_carbon_standard: '0.1.0'\n",
        )
        .unwrap();
        let err = CliConfig::resolve(Some(&path), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Incompatible(_)));
    }

    #[test]
    fn unknown_config_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tcs.yaml");
        std::fs::write(&path, "schemas: here\n").unwrap();
        assert!(matches!(
            CliConfig::resolve(Some(&path), no_env).unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn missing_config_file_is_read_error() {
        let err = CliConfig::resolve(Some(Path::new("/nonexistent/tcs.yaml")), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
