//! Database connection configuration.
//!
//! A connection describes one fully-resolved endpoint (the repository, or a reconciliation
//! side). `Settings`' `[repo]`/`[source]`/`[target]` TOML tables (with `${VAR}` expansion) are
//! the only way one of these gets built — see `RawConnection::resolve` in `config::settings`.

/// Error type for connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("unsupported engine: {0}. Supported: postgres, oracle, mysql, mssql, db2")]
    UnsupportedEngine(String),

    #[error("invalid sslmode: {0}. Supported: disable, prefer, require")]
    InvalidSslMode(String),
}

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    Postgres,
    Oracle,
    MySql,
    SqlServer,
    Db2,
}

impl Engine {
    /// Parse an engine name from a config/env value.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConnectionError> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Engine::Postgres),
            "oracle" => Ok(Engine::Oracle),
            "mysql" | "mariadb" => Ok(Engine::MySql),
            "mssql" | "sqlserver" | "sql_server" => Ok(Engine::SqlServer),
            "db2" => Ok(Engine::Db2),
            other => Err(ConnectionError::UnsupportedEngine(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Postgres => "postgres",
            Engine::Oracle => "oracle",
            Engine::MySql => "mysql",
            Engine::SqlServer => "mssql",
            Engine::Db2 => "db2",
        }
    }

    /// Default TCP port for this engine.
    pub fn default_port(&self) -> u16 {
        match self {
            Engine::Postgres => 5432,
            Engine::Oracle => 1521,
            Engine::MySql => 3306,
            Engine::SqlServer => 1433,
            Engine::Db2 => 50000,
        }
    }
}

/// TLS negotiation mode for a connection, mirroring libpq's `sslmode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

impl SslMode {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConnectionError> {
        match s.to_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            other => Err(ConnectionError::InvalidSslMode(other.to_string())),
        }
    }
}

/// A fully-resolved connection endpoint: the repository, or one reconciliation side.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub engine: Engine,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Default schema/owner to introspect and extract from when a table alias does not
    /// specify one explicitly.
    pub schema: Option<String>,
    pub sslmode: SslMode,
}

impl ConnectionConfig {
    /// Build a libpq-style keyword/value connection string. Only meaningful when
    /// `engine == Engine::Postgres` — the repository is always Postgres, and a Postgres
    /// source/target also uses this form.
    pub fn to_postgres_conn_string(&self) -> String {
        let mut parts = vec![
            format!("host={}", self.host),
            format!("port={}", self.port),
            format!("dbname={}", self.database),
        ];
        if let Some(user) = &self.username {
            parts.push(format!("user={}", user));
        }
        if let Some(pass) = &self.password {
            parts.push(format!("password={}", pass));
        }
        let sslmode = match self.sslmode {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        };
        parts.push(format!("sslmode={}", sslmode));
        parts.join(" ")
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_parsing() {
        assert_eq!(Engine::from_str("postgres").unwrap(), Engine::Postgres);
        assert_eq!(Engine::from_str("PostgreSQL").unwrap(), Engine::Postgres);
        assert_eq!(Engine::from_str("oracle").unwrap(), Engine::Oracle);
        assert_eq!(Engine::from_str("mariadb").unwrap(), Engine::MySql);
        assert_eq!(Engine::from_str("sqlserver").unwrap(), Engine::SqlServer);
        assert_eq!(Engine::from_str("db2").unwrap(), Engine::Db2);
        assert!(Engine::from_str("nope").is_err());
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(Engine::Postgres.default_port(), 5432);
        assert_eq!(Engine::Oracle.default_port(), 1521);
        assert_eq!(Engine::SqlServer.default_port(), 1433);
    }

    #[test]
    fn test_sslmode_parsing() {
        assert_eq!(SslMode::from_str("require").unwrap(), SslMode::Require);
        assert!(SslMode::from_str("bogus").is_err());
    }

    #[test]
    fn test_postgres_conn_string() {
        let cfg = ConnectionConfig {
            engine: Engine::Postgres,
            host: "localhost".to_string(),
            port: 5432,
            database: "compare".to_string(),
            username: Some("pgcompare".to_string()),
            password: Some("secret".to_string()),
            schema: None,
            sslmode: SslMode::Require,
        };
        let conn_str = cfg.to_postgres_conn_string();
        assert!(conn_str.contains("host=localhost"));
        assert!(conn_str.contains("dbname=compare"));
        assert!(conn_str.contains("sslmode=require"));
    }
}
