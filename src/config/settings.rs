//! TOML-based configuration for pgcompare.
//!
//! Supports a config file (`pgcompare.toml` by default) with environment variable
//! expansion inside string values. This is the single place section 6's property table is
//! turned into a typed, immutable `AppConfig` that gets threaded explicitly through the
//! Reconciler and its children — never read from a global.
//!
//! ```toml
//! project = 1
//!
//! [batch]
//! fetch-size = 2000
//! commit-size = 500
//! progress-report-size = 100000
//!
//! [loader]
//! threads = 2
//! message-queue-size = 100
//!
//! [cast]
//! float-cast = "standard"
//! number-cast = "standard"
//! column-hash-method = "normalized"
//!
//! [observer]
//! throttle = true
//! throttle-size = 2000000
//! vacuum = false
//!
//! [log]
//! destination = "stderr"
//! level = "info"
//!
//! [repo]
//! engine = "postgres"
//! host = "localhost"
//! database = "compare"
//! user = "${PGCOMPARE_REPO_USER}"
//! password = "${PGCOMPARE_REPO_PASSWORD}"
//! sslmode = "prefer"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::connection::{ConnectionConfig, ConnectionError, Engine, SslMode};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid connection configuration: {0}")]
    Connection(#[from] ConnectionError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure, deserialized directly from TOML.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Active project id (`--project` on the CLI overrides this).
    pub project: Option<i64>,

    #[serde(default)]
    pub batch: BatchSettings,

    #[serde(default)]
    pub loader: LoaderSettings,

    #[serde(default)]
    pub cast: CastSettings,

    #[serde(default)]
    pub observer: ObserverSettings,

    #[serde(default)]
    pub log: LogSettings,

    #[serde(default, rename = "database-sort")]
    pub database_sort: bool,

    pub repo: Option<RawConnection>,
    pub source: Option<RawConnection>,
    pub target: Option<RawConnection>,
}

/// `batch-fetch-size` / `batch-commit-size` / `batch-progress-report-size`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchSettings {
    #[serde(rename = "fetch-size")]
    pub fetch_size: usize,
    #[serde(rename = "commit-size")]
    pub commit_size: usize,
    #[serde(rename = "progress-report-size")]
    pub progress_report_size: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            fetch_size: 2000,
            commit_size: 500,
            progress_report_size: 100_000,
        }
    }
}

/// `loader-threads` / `message-queue-size`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoaderSettings {
    pub threads: usize,
    #[serde(rename = "message-queue-size")]
    pub message_queue_size: usize,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            threads: 2,
            message_queue_size: 100,
        }
    }
}

/// `float-cast` / `number-cast` / `column-hash-method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericCastMode {
    Standard,
    Notation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnHashMethod {
    Raw,
    Normalized,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CastSettings {
    #[serde(rename = "float-cast")]
    pub float_cast: NumericCastMode,
    #[serde(rename = "number-cast")]
    pub number_cast: NumericCastMode,
    #[serde(rename = "column-hash-method")]
    pub column_hash_method: ColumnHashMethod,
}

impl Default for CastSettings {
    fn default() -> Self {
        Self {
            float_cast: NumericCastMode::Standard,
            number_cast: NumericCastMode::Standard,
            column_hash_method: ColumnHashMethod::Normalized,
        }
    }
}

/// `observer-throttle` / `observer-throttle-size` / `observer-vacuum`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObserverSettings {
    pub throttle: bool,
    #[serde(rename = "throttle-size")]
    pub throttle_size: u64,
    pub vacuum: bool,
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self {
            throttle: true,
            throttle_size: 2_000_000,
            vacuum: false,
        }
    }
}

/// `log-destination` / `log-level`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
    pub destination: LogDestination,
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            destination: LogDestination::Stderr,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogDestination {
    Stderr,
    File(String),
}

impl Default for LogDestination {
    fn default() -> Self {
        LogDestination::Stderr
    }
}

/// Raw `[repo]`/`[source]`/`[target]` table before environment-variable expansion and
/// engine/sslmode parsing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConnection {
    pub engine: String,
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub sslmode: Option<String>,
}

impl RawConnection {
    fn resolve(&self) -> Result<ConnectionConfig, SettingsError> {
        let engine = Engine::from_str(&expand_env_vars(&self.engine)?)?;
        let host = expand_env_vars(&self.host)?;
        let database = expand_env_vars(&self.database)?;
        let username = self.user.as_deref().map(expand_env_vars).transpose()?;
        let password = self.password.as_deref().map(expand_env_vars).transpose()?;
        let schema = self.schema.as_deref().map(expand_env_vars).transpose()?;
        let sslmode = match &self.sslmode {
            Some(s) => SslMode::from_str(&expand_env_vars(s)?)?,
            None => SslMode::default(),
        };
        Ok(ConnectionConfig {
            engine,
            host,
            port: self.port.unwrap_or_else(|| engine.default_port()),
            database,
            username,
            password,
            schema,
            sslmode,
        })
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. `--config` path, if passed explicitly (see `Settings::load_from`)
    /// 2. `PGCOMPARE_CONFIG` environment variable
    /// 3. `./pgcompare.toml`
    /// 4. built-in defaults
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("PGCOMPARE_CONFIG") {
            return Self::from_file(path);
        }

        let local_config = PathBuf::from("pgcompare.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        Ok(Settings::default())
    }

    /// Load settings from an explicit `--config` path, falling back to [`Settings::load`]
    /// when `explicit` is `None`.
    pub fn load_from(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => Self::load(),
        }
    }

    /// Resolve the repository connection (always required).
    pub fn repo_connection(&self) -> Result<ConnectionConfig, SettingsError> {
        self.repo
            .as_ref()
            .ok_or_else(|| SettingsError::InvalidConfig("missing [repo] connection".to_string()))?
            .resolve()
    }

    /// Resolve the source-side connection (required for `compare`/`check`/`discover`).
    pub fn source_connection(&self) -> Result<ConnectionConfig, SettingsError> {
        self.source
            .as_ref()
            .ok_or_else(|| {
                SettingsError::InvalidConfig("missing [source] connection".to_string())
            })?
            .resolve()
    }

    /// Resolve the target-side connection (required for `compare`/`check`/`discover`).
    pub fn target_connection(&self) -> Result<ConnectionConfig, SettingsError> {
        self.target
            .as_ref()
            .ok_or_else(|| {
                SettingsError::InvalidConfig("missing [target] connection".to_string())
            })?
            .resolve()
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            if chars.peek() == Some(&'{') {
                chars.next();
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '}' {
                        chars.next();
                        break;
                    }
                    var_name.push(chars.next().unwrap());
                }
                let value = env::var(&var_name)
                    .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                result.push_str(&value);
            } else {
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        var_name.push(chars.next().unwrap());
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    result.push('$');
                } else {
                    let value = env::var(&var_name)
                        .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                    result.push_str(&value);
                }
            }
        } else {
            result.push(c);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_braces() {
        env::set_var("PGCOMPARE_TEST_VAR", "hello");
        assert_eq!(
            expand_env_vars("${PGCOMPARE_TEST_VAR}").unwrap(),
            "hello"
        );
        assert_eq!(
            expand_env_vars("prefix_${PGCOMPARE_TEST_VAR}_suffix").unwrap(),
            "prefix_hello_suffix"
        );
        env::remove_var("PGCOMPARE_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("${PGCOMPARE_NONEXISTENT_VAR_12345}");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_toml_defaults() {
        let toml = r#"
project = 7

[repo]
engine = "postgres"
host = "localhost"
database = "compare"
user = "pgcompare"
"#;
        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.project, Some(7));
        assert_eq!(settings.batch.fetch_size, 2000);
        assert_eq!(settings.loader.threads, 2);
        assert_eq!(settings.observer.throttle_size, 2_000_000);

        let repo = settings.repo_connection().unwrap();
        assert_eq!(repo.engine, Engine::Postgres);
        assert_eq!(repo.port, 5432);
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.batch.commit_size, 500);
        assert_eq!(settings.cast.column_hash_method, ColumnHashMethod::Normalized);
        assert!(settings.repo_connection().is_err());
    }

    #[test]
    fn test_env_expansion_in_connection() {
        env::set_var("PGCOMPARE_TEST_PASSWORD", "s3cret");
        let toml = r#"
[source]
engine = "oracle"
host = "ora.example.com"
database = "ORCL"
user = "scott"
password = "${PGCOMPARE_TEST_PASSWORD}"
"#;
        let settings: Settings = toml::from_str(toml).unwrap();
        let source = settings.source_connection().unwrap();
        assert_eq!(source.password.as_deref(), Some("s3cret"));
        assert_eq!(source.port, 1521);
        env::remove_var("PGCOMPARE_TEST_PASSWORD");
    }
}
