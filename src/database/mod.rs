// Database module
// Dialect capability table plus the seams the pipeline talks to.

pub mod connection;
pub mod dialect;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::Result;
use crate::request::{ProvisionRequest, TableTarget};

pub use connection::{SqlxConnector, SqlxDatabase};
pub use dialect::{Dialect, DialectCapabilities, EmbeddingEncoding, Placeholder, VectorExtension};

/// One row read from the source table: the id plus the requested text fields
/// in request order. `None` is a SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub id: i64,
    pub fields: Vec<Option<String>>,
}

impl SourceRow {
    /// Fields joined with a single space, NULL treated as empty.
    #[inline]
    pub fn combined_text(&self) -> String {
        itertools::join(
            self.fields.iter().map(|field| field.as_deref().unwrap_or("")),
            " ",
        )
    }
}

/// An embedding already converted to the dialect's wire form.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingValue {
    /// Bracketed list, e.g. `[0.0, 0.5]`
    Text(String),
    /// Native `float4[]`
    FloatArray(Vec<f32>),
    /// Packed little-endian f32
    Bytes(Vec<u8>),
}

/// The operations the provisioning stages need from a connected database.
#[async_trait]
pub trait TargetDatabase: Send + Sync {
    /// Product name as reported by the driver, e.g. `PostgreSQL`.
    async fn product_name(&self) -> Result<String>;

    /// Run a statement that returns no rows.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Run a query returning a single integer.
    async fn fetch_count(&self, sql: &str) -> Result<i64>;

    /// Forward-only cursor over `SELECT id, field...`.
    fn stream_rows<'a>(
        &'a self,
        sql: &'a str,
        field_count: usize,
    ) -> BoxStream<'a, Result<SourceRow>>;

    /// Single-row parameterized insert of `(foreign key, embedding)`.
    async fn insert_embedding(
        &self,
        sql: &str,
        foreign_key: i64,
        embedding: EmbeddingValue,
    ) -> Result<()>;

    /// Release pooled connections.
    async fn close(&self) {}
}

/// Opens a database for one request.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, request: &ProvisionRequest) -> Result<Box<dyn TargetDatabase>>;
}

/// Per-request context threaded through every stage.
pub struct Session<'a> {
    pub database: &'a dyn TargetDatabase,
    pub dialect: Dialect,
    pub target: &'a TableTarget,
}

impl<'a> Session<'a> {
    /// Detect the dialect once and bind it to the request.
    #[inline]
    pub async fn open(database: &'a dyn TargetDatabase, target: &'a TableTarget) -> Result<Self> {
        let dialect = Dialect::detect(database).await?;
        Ok(Self {
            database,
            dialect,
            target,
        })
    }

    #[inline]
    pub fn capabilities(&self) -> &'static DialectCapabilities {
        self.dialect.capabilities()
    }
}
