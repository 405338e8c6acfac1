//! Configuration for pgcompare.
//!
//! Handles connection configuration, environment variable expansion, and the TOML settings
//! file that together resolve into the `AppConfig` the rest of the crate runs on.

mod connection;
mod settings;

pub use connection::{ConnectionConfig, ConnectionError, Engine, SslMode};
pub use settings::{
    expand_env_vars, BatchSettings, CastSettings, ColumnHashMethod, LoaderSettings,
    LogDestination, LogSettings, NumericCastMode, ObserverSettings, RawConnection, Settings,
    SettingsError,
};
