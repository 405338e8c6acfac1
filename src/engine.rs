//! `EngineConnector` (A2): one trait, five implementations, uniform streaming/batch-execute
//! surface used by Extractor (C4) and Loader (C6). The repository is always Postgres and
//! pools connections (`src/repo`); source/target connections here are each one dedicated
//! connection per Extractor/Loader (section 5) — no pooling.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::{ConnectionConfig, Engine};
use crate::error::PgCompareError;

/// One row's worth of raw, engine-native column values, read in column order. The Extractor
/// pairs these against the compiled `ColumnMap` by position to build a `RowFingerprint`;
/// numeric/timestamp/text canonicalization already happened in the SQL text (C2), so by the
/// time a row reaches here every value is already its canonical string form (or NULL).
pub type RawRow = Vec<Option<String>>;

/// How many rows the producer side of `stream_query` may buffer ahead of a slow consumer.
/// Bounds the backpressure window: once the channel is full, the driver task blocks on send
/// rather than pulling further rows, so a large table never sits fully materialized in memory.
const STREAM_CHANNEL_CAPACITY: usize = 256;

/// A lazily-produced sequence of rows, each already mapped into canonical `RawRow` form.
pub type RowStream = Pin<Box<dyn Stream<Item = Result<RawRow, PgCompareError>> + Send>>;

/// Uniform connector surface Extractor/Loader are generic over.
#[async_trait]
pub trait EngineConnector: Send + Sync {
    /// Engine this connector talks to.
    fn engine(&self) -> Engine;

    /// Run `sql` and stream back every row's already-canonicalized column values, in the
    /// order the SELECT list was compiled by the column-map compiler (C3): pk expressions
    /// first, then hashable column expressions. Rows are produced incrementally off the
    /// driver's own cursor/streaming API — the whole result set is never buffered at once.
    async fn stream_query(&self, sql: &str) -> Result<RowStream, PgCompareError>;

    /// Execute a DML statement with no result rows expected (used by `copy-table`, DDL
    /// bootstrap against source/target when applicable).
    async fn execute(&self, sql: &str) -> Result<u64, PgCompareError>;
}

/// Postgres connector: `tokio-postgres`, one dedicated connection per caller.
pub struct PostgresConnector {
    client: Arc<tokio_postgres::Client>,
}

impl PostgresConnector {
    pub async fn connect(conn: &ConnectionConfig) -> Result<Self, PgCompareError> {
        let (client, connection) = tokio_postgres::connect(&conn.to_postgres_conn_string(), tokio_postgres::NoTls)
            .await
            .map_err(|e| PgCompareError::Connect {
                side: "source/target".to_string(),
                message: e.to_string(),
            })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::error!("postgres connection error: {e}");
            }
        });

        Ok(Self { client: Arc::new(client) })
    }
}

#[async_trait]
impl EngineConnector for PostgresConnector {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    async fn stream_query(&self, sql: &str) -> Result<RowStream, PgCompareError> {
        let client = self.client.clone();
        let sql = sql.to_string();
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            match client.query_raw(&sql, std::iter::empty::<i32>()).await {
                Ok(rows) => {
                    futures::pin_mut!(rows);
                    while let Some(row_result) = rows.next().await {
                        let mapped = row_result
                            .map_err(|e| PgCompareError::Driver {
                                engine: "postgres".to_string(),
                                message: e.to_string(),
                            })
                            .map(|row| {
                                (0..row.len())
                                    .map(|i| row.try_get::<usize, Option<String>>(i).ok().flatten())
                                    .collect()
                            });
                        if tx.send(mapped).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx
                        .send(Err(PgCompareError::Driver {
                            engine: "postgres".to_string(),
                            message: e.to_string(),
                        }))
                        .await;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn execute(&self, sql: &str) -> Result<u64, PgCompareError> {
        self.client
            .execute(sql, &[])
            .await
            .map_err(|e| PgCompareError::Driver {
                engine: "postgres".to_string(),
                message: e.to_string(),
            })
    }
}

/// MySQL/MariaDB connector: `mysql_async`, one dedicated connection per caller.
pub struct MySqlConnector {
    conn: Arc<tokio::sync::Mutex<mysql_async::Conn>>,
}

impl MySqlConnector {
    pub async fn connect(conn: &ConnectionConfig) -> Result<Self, PgCompareError> {
        let opts = mysql_async::OptsBuilder::default()
            .ip_or_hostname(conn.host.clone())
            .tcp_port(conn.port)
            .db_name(Some(conn.database.clone()))
            .user(conn.username.clone())
            .pass(conn.password.clone());

        let client = mysql_async::Conn::new(opts).await.map_err(|e| PgCompareError::Connect {
            side: "source/target".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            conn: Arc::new(tokio::sync::Mutex::new(client)),
        })
    }
}

#[async_trait]
impl EngineConnector for MySqlConnector {
    fn engine(&self) -> Engine {
        Engine::MySql
    }

    async fn stream_query(&self, sql: &str) -> Result<RowStream, PgCompareError> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            use mysql_async::prelude::Queryable;

            let mut guard = conn.lock().await;
            let result = match guard.query_iter(&sql).await {
                Ok(r) => r,
                Err(e) => {
                    let _ = tx
                        .send(Err(PgCompareError::Driver {
                            engine: "mysql".to_string(),
                            message: e.to_string(),
                        }))
                        .await;
                    return;
                }
            };

            match result.stream::<mysql_async::Row>().await {
                Ok(Some(mut rows)) => {
                    while let Some(row_result) = rows.next().await {
                        let mapped = row_result
                            .map_err(|e| PgCompareError::Driver {
                                engine: "mysql".to_string(),
                                message: e.to_string(),
                            })
                            .map(|row| (0..row.len()).map(|i| row.as_ref(i).map(mysql_value_to_string)).collect());
                        if tx.send(mapped).await.is_err() {
                            break;
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    let _ = tx
                        .send(Err(PgCompareError::Driver {
                            engine: "mysql".to_string(),
                            message: e.to_string(),
                        }))
                        .await;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn execute(&self, sql: &str) -> Result<u64, PgCompareError> {
        use mysql_async::prelude::Queryable;
        let mut conn = self.conn.lock().await;
        conn.query_drop(sql).await.map_err(|e| PgCompareError::Driver {
            engine: "mysql".to_string(),
            message: e.to_string(),
        })?;
        Ok(conn.affected_rows())
    }
}

fn mysql_value_to_string(v: &mysql_async::Value) -> String {
    match v {
        mysql_async::Value::Bytes(b) => String::from_utf8_lossy(b).to_string(),
        other => format!("{other:?}"),
    }
}

/// SQL Server connector: `tiberius` over a raw TCP stream with `tokio-util` compat.
pub struct SqlServerConnector {
    client: Arc<tokio::sync::Mutex<tiberius::Client<tokio_util::compat::Compat<tokio::net::TcpStream>>>>,
}

impl SqlServerConnector {
    pub async fn connect(conn: &ConnectionConfig) -> Result<Self, PgCompareError> {
        use tokio_util::compat::TokioAsyncWriteCompatExt;

        let mut config = tiberius::Config::new();
        config.host(&conn.host);
        config.port(conn.port);
        config.database(&conn.database);
        if let (Some(user), Some(pass)) = (&conn.username, &conn.password) {
            config.authentication(tiberius::AuthMethod::sql_server(user, pass));
        }
        config.trust_cert();

        let tcp = tokio::net::TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| PgCompareError::Connect {
                side: "source/target".to_string(),
                message: e.to_string(),
            })?;
        tcp.set_nodelay(true).ok();

        let client = tiberius::Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| PgCompareError::Connect {
                side: "source/target".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client: Arc::new(tokio::sync::Mutex::new(client)),
        })
    }
}

#[async_trait]
impl EngineConnector for SqlServerConnector {
    fn engine(&self) -> Engine {
        Engine::SqlServer
    }

    async fn stream_query(&self, sql: &str) -> Result<RowStream, PgCompareError> {
        let client = self.client.clone();
        let sql = sql.to_string();
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            use futures::TryStreamExt;

            let mut guard = client.lock().await;
            let mut stream = match guard.simple_query(&sql).await {
                Ok(s) => s,
                Err(e) => {
                    let _ = tx
                        .send(Err(PgCompareError::Driver {
                            engine: "mssql".to_string(),
                            message: e.to_string(),
                        }))
                        .await;
                    return;
                }
            };

            loop {
                match stream.try_next().await {
                    Ok(Some(tiberius::QueryItem::Row(row))) => {
                        let mapped: RawRow = (0..row.len())
                            .map(|i| row.get::<&str, usize>(i).map(|s| s.to_string()))
                            .collect();
                        if tx.send(Ok(mapped)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(tiberius::QueryItem::Metadata(_))) => continue,
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx
                            .send(Err(PgCompareError::Driver {
                                engine: "mssql".to_string(),
                                message: e.to_string(),
                            }))
                            .await;
                        break;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn execute(&self, sql: &str) -> Result<u64, PgCompareError> {
        let mut client = self.client.lock().await;
        let result = client.execute(sql, &[]).await.map_err(|e| PgCompareError::Driver {
            engine: "mssql".to_string(),
            message: e.to_string(),
        })?;
        Ok(result.rows_affected().iter().sum())
    }
}

/// Oracle connector: the `oracle` crate (OCI bindings) is synchronous, so every call is
/// dispatched through `spawn_blocking`; rows are forwarded to the async side row-by-row over a
/// bounded channel, so `blocking_send` applies the same backpressure a native async cursor
/// would.
pub struct OracleConnector {
    conn: Arc<oracle::Connection>,
}

impl OracleConnector {
    pub async fn connect(conn: &ConnectionConfig) -> Result<Self, PgCompareError> {
        let connect_string = format!("//{}:{}/{}", conn.host, conn.port, conn.database);
        let username = conn.username.clone().unwrap_or_default();
        let password = conn.password.clone().unwrap_or_default();

        let connection = tokio::task::spawn_blocking(move || {
            oracle::Connection::connect(&username, &password, &connect_string)
        })
        .await
        .map_err(|e| PgCompareError::Connect {
            side: "source/target".to_string(),
            message: e.to_string(),
        })?
        .map_err(|e| PgCompareError::Connect {
            side: "source/target".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            conn: Arc::new(connection),
        })
    }
}

#[async_trait]
impl EngineConnector for OracleConnector {
    fn engine(&self) -> Engine {
        Engine::Oracle
    }

    async fn stream_query(&self, sql: &str) -> Result<RowStream, PgCompareError> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        tokio::task::spawn_blocking(move || {
            let result_set = match conn.query(&sql, &[]) {
                Ok(rs) => rs,
                Err(e) => {
                    let _ = tx.blocking_send(Err(PgCompareError::Driver {
                        engine: "oracle".to_string(),
                        message: e.to_string(),
                    }));
                    return;
                }
            };

            for row_result in result_set {
                let mapped = row_result
                    .map_err(|e| PgCompareError::Driver {
                        engine: "oracle".to_string(),
                        message: e.to_string(),
                    })
                    .map(|row| {
                        let mut values = Vec::with_capacity(row.sql_values().len());
                        for i in 0..row.sql_values().len() {
                            let value: Option<String> = row.get(i).unwrap_or(None);
                            values.push(value);
                        }
                        values
                    });
                if tx.blocking_send(mapped).is_err() {
                    break;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn execute(&self, sql: &str) -> Result<u64, PgCompareError> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            conn.execute(&sql, &[]).map_err(|e| PgCompareError::Driver {
                engine: "oracle".to_string(),
                message: e.to_string(),
            })?;
            conn.commit().map_err(|e| PgCompareError::Driver {
                engine: "oracle".to_string(),
                message: e.to_string(),
            })?;
            Ok(conn.row_count().unwrap_or(0))
        })
        .await
        .map_err(|e| PgCompareError::Driver {
            engine: "oracle".to_string(),
            message: e.to_string(),
        })?
    }
}

/// DB2 connector: no native Rust DB2 client exists, so connectivity goes through ODBC
/// (`odbc-api`), which is also synchronous and dispatched through `spawn_blocking`. Rows are
/// fetched in the driver's own batch size but forwarded to the async side one at a time, so
/// the channel (not an in-process `Vec`) is what's actually bounding memory.
pub struct Db2Connector {
    env: Arc<odbc_api::Environment>,
    connection_string: String,
}

impl Db2Connector {
    pub fn connect(conn: &ConnectionConfig) -> Result<Self, PgCompareError> {
        let env = odbc_api::Environment::new().map_err(|e| PgCompareError::Connect {
            side: "source/target".to_string(),
            message: e.to_string(),
        })?;

        let mut connection_string = format!(
            "DRIVER={{IBM DB2 ODBC DRIVER}};DATABASE={};HOSTNAME={};PORT={};PROTOCOL=TCPIP;",
            conn.database, conn.host, conn.port
        );
        if let Some(user) = &conn.username {
            connection_string.push_str(&format!("UID={user};"));
        }
        if let Some(password) = &conn.password {
            connection_string.push_str(&format!("PWD={password};"));
        }

        Ok(Self {
            env: Arc::new(env),
            connection_string,
        })
    }
}

#[async_trait]
impl EngineConnector for Db2Connector {
    fn engine(&self) -> Engine {
        Engine::Db2
    }

    async fn stream_query(&self, sql: &str) -> Result<RowStream, PgCompareError> {
        let env = self.env.clone();
        let connection_string = self.connection_string.clone();
        let sql = sql.to_string();
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        tokio::task::spawn_blocking(move || {
            use odbc_api::Cursor;

            let conn = match env.connect_with_connection_string(&connection_string, odbc_api::ConnectionOptions::default()) {
                Ok(c) => c,
                Err(e) => {
                    let _ = tx.blocking_send(Err(PgCompareError::Driver {
                        engine: "db2".to_string(),
                        message: e.to_string(),
                    }));
                    return;
                }
            };

            let mut cursor = match conn.execute(&sql, ()) {
                Ok(Some(c)) => c,
                Ok(None) => return,
                Err(e) => {
                    let _ = tx.blocking_send(Err(PgCompareError::Driver {
                        engine: "db2".to_string(),
                        message: e.to_string(),
                    }));
                    return;
                }
            };

            let headers = cursor.column_count().unwrap_or(0);
            let mut buffers = match odbc_api::buffers::TextRowSet::for_cursor(256, &mut cursor, Some(4096)) {
                Ok(b) => b,
                Err(e) => {
                    let _ = tx.blocking_send(Err(PgCompareError::Driver {
                        engine: "db2".to_string(),
                        message: e.to_string(),
                    }));
                    return;
                }
            };
            let mut row_set_cursor = match cursor.bind_buffer(&mut buffers) {
                Ok(c) => c,
                Err(e) => {
                    let _ = tx.blocking_send(Err(PgCompareError::Driver {
                        engine: "db2".to_string(),
                        message: e.to_string(),
                    }));
                    return;
                }
            };

            loop {
                match row_set_cursor.fetch() {
                    Ok(Some(batch)) => {
                        for row_index in 0..batch.num_rows() {
                            let mut row = Vec::with_capacity(headers as usize);
                            for col_index in 0..headers {
                                let value = batch
                                    .at(col_index as usize, row_index)
                                    .map(|bytes| String::from_utf8_lossy(bytes).to_string());
                                row.push(value);
                            }
                            if tx.blocking_send(Ok(row)).is_err() {
                                return;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.blocking_send(Err(PgCompareError::Driver {
                            engine: "db2".to_string(),
                            message: e.to_string(),
                        }));
                        break;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn execute(&self, sql: &str) -> Result<u64, PgCompareError> {
        let env = self.env.clone();
        let connection_string = self.connection_string.clone();
        let sql = sql.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = env
                .connect_with_connection_string(&connection_string, odbc_api::ConnectionOptions::default())
                .map_err(|e| PgCompareError::Driver {
                    engine: "db2".to_string(),
                    message: e.to_string(),
                })?;
            conn.execute(&sql, ()).map_err(|e| PgCompareError::Driver {
                engine: "db2".to_string(),
                message: e.to_string(),
            })?;
            Ok(0)
        })
        .await
        .map_err(|e| PgCompareError::Driver {
            engine: "db2".to_string(),
            message: e.to_string(),
        })?
    }
}

/// Connect to whichever engine `conn.engine` names.
pub async fn connect(conn: &ConnectionConfig) -> Result<Box<dyn EngineConnector>, PgCompareError> {
    match conn.engine {
        Engine::Postgres => Ok(Box::new(PostgresConnector::connect(conn).await?)),
        Engine::MySql => Ok(Box::new(MySqlConnector::connect(conn).await?)),
        Engine::SqlServer => Ok(Box::new(SqlServerConnector::connect(conn).await?)),
        Engine::Oracle => Ok(Box::new(OracleConnector::connect(conn).await?)),
        Engine::Db2 => Ok(Box::new(Db2Connector::connect(conn)?)),
    }
}

/// A canned-row connector used by unit tests (A9) and, under the `test-util` feature, by the
/// `tests/` integration crate: yields fixed rows without a live database, so the cast
/// compiler/column-map/queue/extractor/recheck logic can be exercised end-to-end in isolation.
#[cfg(any(test, feature = "test-util"))]
pub struct MockConnector {
    pub engine: Engine,
    pub rows: Vec<RawRow>,
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl EngineConnector for MockConnector {
    fn engine(&self) -> Engine {
        self.engine
    }

    async fn stream_query(&self, _sql: &str) -> Result<RowStream, PgCompareError> {
        let rows = self.rows.clone();
        Ok(Box::pin(tokio_stream::iter(rows.into_iter().map(Ok))))
    }

    async fn execute(&self, _sql: &str) -> Result<u64, PgCompareError> {
        Ok(self.rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_connector_streams_canned_rows() {
        let mock = MockConnector {
            engine: Engine::Postgres,
            rows: vec![vec![Some("1".to_string()), Some("A".to_string())]],
        };
        let mut rows = mock.stream_query("SELECT 1").await.unwrap();
        let first = rows.next().await.unwrap().unwrap();
        assert_eq!(first[0], Some("1".to_string()));
        assert!(rows.next().await.is_none());
    }
}
