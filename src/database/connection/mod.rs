
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{ColumnIndex, Decode, Row, Type};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::DatabaseConfig;
use crate::database::{Connector, EmbeddingValue, SourceRow, TargetDatabase};
use crate::request::ProvisionRequest;
use crate::{ProvisionError, Result};

/// Driver family selected from the connection URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    MySql,
}

/// Strip an optional `jdbc:` prefix and pick the driver for the URL scheme.
#[inline]
pub fn parse_connection_url(raw: &str) -> Result<(Backend, String)> {
    let trimmed = raw.trim();
    let url = trimmed.strip_prefix("jdbc:").unwrap_or(trimmed);

    let parsed = Url::parse(url)
        .map_err(|e| ProvisionError::Config(format!("Invalid connection URL '{url}': {e}")))?;

    let backend = match parsed.scheme() {
        "postgres" | "postgresql" => Backend::Postgres,
        "mysql" | "mariadb" => Backend::MySql,
        other => {
            return Err(ProvisionError::Sql(format!(
                "No database driver available for '{other}' connections"
            )));
        }
    };

    Ok((backend, url.to_string()))
}

/// A pooled `sqlx` connection to the target database.
#[derive(Debug, Clone)]
pub enum SqlxDatabase {
    Postgres(PgPool),
    MySql(MySqlPool),
}

impl SqlxDatabase {
    #[inline]
    pub async fn connect(request: &ProvisionRequest, settings: &DatabaseConfig) -> Result<Self> {
        let (backend, url) = parse_connection_url(&request.url)?;
        let acquire_timeout = Duration::from_secs(settings.acquire_timeout_secs);

        let database = match backend {
            Backend::Postgres => {
                let mut options = PgConnectOptions::from_str(&url)?;
                if let Some(username) = &request.username {
                    options = options.username(username);
                }
                if let Some(password) = &request.password {
                    options = options.password(password);
                }

                let pool = PgPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect_with(options)
                    .await?;
                Self::Postgres(pool)
            }
            Backend::MySql => {
                let mut options = MySqlConnectOptions::from_str(&url)?;
                if let Some(username) = &request.username {
                    options = options.username(username);
                }
                if let Some(password) = &request.password {
                    options = options.password(password);
                }

                let pool = MySqlPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect_with(options)
                    .await?;
                Self::MySql(pool)
            }
        };

        info!("Database connection established ({:?})", backend);
        Ok(database)
    }
}

fn decode_row<R>(row: &R, field_count: usize) -> Result<SourceRow>
where
    R: Row,
    usize: ColumnIndex<R>,
    i64: for<'r> Decode<'r, R::Database> + Type<R::Database>,
    String: for<'r> Decode<'r, R::Database> + Type<R::Database>,
{
    let id: i64 = row.try_get(0)?;
    let fields = (1..=field_count)
        .map(|index| row.try_get::<Option<String>, _>(index))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(SourceRow { id, fields })
}

#[async_trait]
impl TargetDatabase for SqlxDatabase {
    /// The sqlx driver's `Database::NAME`, not server metadata. A MariaDB
    /// server behind a `mysql://` URL reports `MySQL`.
    async fn product_name(&self) -> Result<String> {
        let name = match self {
            Self::Postgres(_) => <sqlx::Postgres as sqlx::Database>::NAME,
            Self::MySql(_) => <sqlx::MySql as sqlx::Database>::NAME,
        };
        Ok(name.to_string())
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        debug!("Executing: {}", sql);
        let rows = match self {
            Self::Postgres(pool) => sqlx::raw_sql(sql).execute(pool).await?.rows_affected(),
            Self::MySql(pool) => sqlx::raw_sql(sql).execute(pool).await?.rows_affected(),
        };
        Ok(rows)
    }

    async fn fetch_count(&self, sql: &str) -> Result<i64> {
        debug!("Querying: {}", sql);
        let count = match self {
            Self::Postgres(pool) => sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await?,
            Self::MySql(pool) => sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await?,
        };
        Ok(count)
    }

    fn stream_rows<'a>(
        &'a self,
        sql: &'a str,
        field_count: usize,
    ) -> BoxStream<'a, Result<SourceRow>> {
        debug!("Streaming: {}", sql);
        match self {
            Self::Postgres(pool) => sqlx::query(sql)
                .fetch(pool)
                .map(move |row| decode_row(&row?, field_count))
                .boxed(),
            Self::MySql(pool) => sqlx::query(sql)
                .fetch(pool)
                .map(move |row| decode_row(&row?, field_count))
                .boxed(),
        }
    }

    async fn insert_embedding(
        &self,
        sql: &str,
        foreign_key: i64,
        embedding: EmbeddingValue,
    ) -> Result<()> {
        match self {
            Self::Postgres(pool) => {
                let query = sqlx::query(sql).bind(foreign_key);
                let query = match embedding {
                    EmbeddingValue::FloatArray(values) => query.bind(values),
                    EmbeddingValue::Text(text) => query.bind(text),
                    EmbeddingValue::Bytes(bytes) => query.bind(bytes),
                };
                query.execute(pool).await?;
            }
            Self::MySql(pool) => {
                let query = sqlx::query(sql).bind(foreign_key);
                let query = match embedding {
                    EmbeddingValue::Text(text) => query.bind(text),
                    EmbeddingValue::Bytes(bytes) => query.bind(bytes),
                    EmbeddingValue::FloatArray(_) => {
                        return Err(ProvisionError::Sql(
                            "MySQL cannot bind a native float array embedding".to_string(),
                        ));
                    }
                };
                query.execute(pool).await?;
            }
        }
        Ok(())
    }

    async fn close(&self) {
        match self {
            Self::Postgres(pool) => pool.close().await,
            Self::MySql(pool) => pool.close().await,
        }
        debug!("Connection pool closed");
    }
}

/// Opens a fresh `sqlx` pool per request.
#[derive(Debug, Clone)]
pub struct SqlxConnector {
    settings: DatabaseConfig,
}

impl SqlxConnector {
    #[inline]
    pub fn new(settings: DatabaseConfig) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Connector for SqlxConnector {
    async fn connect(&self, request: &ProvisionRequest) -> Result<Box<dyn TargetDatabase>> {
        let database = SqlxDatabase::connect(request, &self.settings).await?;
        Ok(Box::new(database))
    }
}
