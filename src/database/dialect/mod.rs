
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::database::{EmbeddingValue, TargetDatabase};
use crate::request::{Identifier, TableTarget};
use crate::{ProvisionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[value(name = "mysql")]
    MySql,
    #[value(name = "postgresql")]
    PostgreSql,
    Oracle,
    #[value(name = "sqlserver")]
    SqlServer,
}

impl fmt::Display for Dialect {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MySql => "MYSQL",
            Self::PostgreSql => "POSTGRESQL",
            Self::Oracle => "ORACLE",
            Self::SqlServer => "SQLSERVER",
        };
        f.write_str(name)
    }
}

/// Bind-parameter syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `?`
    Question,
    /// `$1`
    Dollar,
    /// `:1`
    Colon,
    /// `@P1`
    AtP,
}

impl Placeholder {
    /// Render the 1-based parameter `index`.
    #[inline]
    pub fn render(self, index: usize) -> String {
        match self {
            Self::Question => "?".to_string(),
            Self::Dollar => format!("${index}"),
            Self::Colon => format!(":{index}"),
            Self::AtP => format!("@P{index}"),
        }
    }
}

/// How an embedding is written to the companion table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingEncoding {
    BracketText,
    FloatArray,
    LittleEndianBlob,
}

impl EmbeddingEncoding {
    #[inline]
    pub fn encode(self, embedding: &[f32]) -> EmbeddingValue {
        match self {
            Self::BracketText => EmbeddingValue::Text(bracket_list(embedding)),
            Self::FloatArray => EmbeddingValue::FloatArray(embedding.to_vec()),
            Self::LittleEndianBlob => EmbeddingValue::Bytes(
                embedding
                    .iter()
                    .flat_map(|value| value.to_le_bytes())
                    .collect(),
            ),
        }
    }
}

/// `[0.0, 0.5, -1.0]`, the JSON-array text MySQL and SQL Server store.
#[inline]
pub fn bracket_list(embedding: &[f32]) -> String {
    format!("[{}]", embedding.iter().map(|value| format!("{value:?}")).join(", "))
}

/// Database-side extension needed before the embedding column type exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorExtension {
    pub name: &'static str,
    pub installed_check: &'static str,
    pub enable: &'static str,
}

/// Everything that differs between dialects, defined once per dialect.
#[derive(Debug, PartialEq, Eq)]
pub struct DialectCapabilities {
    pub product_name: &'static str,
    pub quote_open: char,
    pub quote_close: char,
    pub conditional_create: bool,
    pub surrogate_key: &'static str,
    pub foreign_key_type: &'static str,
    /// `{dimension}` is substituted with the embedding length.
    pub embedding_type: &'static str,
    pub id_cast: &'static str,
    pub text_cast: &'static str,
    pub placeholder: Placeholder,
    pub encoding: EmbeddingEncoding,
    pub extension: Option<VectorExtension>,
}

static MYSQL: DialectCapabilities = DialectCapabilities {
    product_name: "MySQL",
    quote_open: '`',
    quote_close: '`',
    conditional_create: true,
    surrogate_key: "id INT AUTO_INCREMENT PRIMARY KEY NOT NULL",
    foreign_key_type: "INT",
    embedding_type: "JSON",
    id_cast: "SIGNED",
    text_cast: "CHAR",
    placeholder: Placeholder::Question,
    encoding: EmbeddingEncoding::BracketText,
    extension: None,
};

static POSTGRESQL: DialectCapabilities = DialectCapabilities {
    product_name: "PostgreSQL",
    quote_open: '"',
    quote_close: '"',
    conditional_create: true,
    surrogate_key: "id SERIAL PRIMARY KEY NOT NULL",
    foreign_key_type: "INT",
    embedding_type: "vector({dimension})",
    id_cast: "BIGINT",
    text_cast: "TEXT",
    placeholder: Placeholder::Dollar,
    encoding: EmbeddingEncoding::FloatArray,
    extension: Some(VectorExtension {
        name: "vector",
        installed_check: "SELECT COUNT(*) FROM pg_extension WHERE extname = 'vector'",
        enable: "CREATE EXTENSION IF NOT EXISTS vector",
    }),
};

static ORACLE: DialectCapabilities = DialectCapabilities {
    product_name: "Oracle",
    quote_open: '"',
    quote_close: '"',
    conditional_create: false,
    surrogate_key: "id NUMBER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY NOT NULL",
    foreign_key_type: "NUMBER",
    embedding_type: "BLOB",
    id_cast: "NUMBER(19)",
    text_cast: "VARCHAR2(4000)",
    placeholder: Placeholder::Colon,
    encoding: EmbeddingEncoding::LittleEndianBlob,
    extension: None,
};

static SQLSERVER: DialectCapabilities = DialectCapabilities {
    product_name: "Microsoft SQL Server",
    quote_open: '[',
    quote_close: ']',
    conditional_create: false,
    surrogate_key: "id INT IDENTITY(1,1) PRIMARY KEY NOT NULL",
    foreign_key_type: "INT",
    embedding_type: "NVARCHAR(MAX)",
    id_cast: "BIGINT",
    text_cast: "NVARCHAR(MAX)",
    placeholder: Placeholder::AtP,
    encoding: EmbeddingEncoding::BracketText,
    extension: None,
};

impl Dialect {
    pub const ALL: [Self; 4] = [Self::MySql, Self::PostgreSql, Self::Oracle, Self::SqlServer];

    #[inline]
    pub fn capabilities(self) -> &'static DialectCapabilities {
        match self {
            Self::MySql => &MYSQL,
            Self::PostgreSql => &POSTGRESQL,
            Self::Oracle => &ORACLE,
            Self::SqlServer => &SQLSERVER,
        }
    }

    /// Case-insensitive exact match on the product name; anything else is an error.
    #[inline]
    pub fn from_product_name(product_name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|dialect| {
                dialect
                    .capabilities()
                    .product_name
                    .eq_ignore_ascii_case(product_name)
            })
            .ok_or_else(|| ProvisionError::UnsupportedDialect(product_name.to_string()))
    }

    #[inline]
    pub async fn detect(database: &dyn TargetDatabase) -> Result<Self> {
        let product_name = database.product_name().await?;
        let dialect = Self::from_product_name(&product_name)?;
        info!("Detected database dialect: {}", dialect);
        Ok(dialect)
    }

    /// Quote an identifier, doubling any closing quote character.
    #[inline]
    pub fn quote(self, identifier: &Identifier) -> String {
        let caps = self.capabilities();
        let close = caps.quote_close.to_string();
        let escaped = identifier
            .as_str()
            .replace(caps.quote_close, &format!("{close}{close}"));
        format!("{}{}{}", caps.quote_open, escaped, caps.quote_close)
    }

    #[inline]
    pub fn embedding_column_type(self, dimension: usize) -> String {
        self.capabilities()
            .embedding_type
            .replace("{dimension}", &dimension.to_string())
    }

    /// DDL for `<table>_vector`.
    #[inline]
    pub fn create_companion_table_sql(self, target: &TableTarget, dimension: usize) -> String {
        let caps = self.capabilities();
        let companion = self.quote(&target.companion_table());
        let foreign_key = self.quote(&target.foreign_key_column());
        let conditional = if caps.conditional_create {
            "IF NOT EXISTS "
        } else {
            ""
        };

        format!(
            "CREATE TABLE {conditional}{companion} ({surrogate}, {foreign_key} {fk_type} NOT NULL, \
             embedding {embedding_type}, FOREIGN KEY ({foreign_key}) REFERENCES {table} ({id}))",
            surrogate = caps.surrogate_key,
            fk_type = caps.foreign_key_type,
            embedding_type = self.embedding_column_type(dimension),
            table = self.quote(&target.table),
            id = self.quote(&target.id_column),
        )
    }

    /// `SELECT id, fields... FROM table`, cast so every driver decodes an
    /// integer id and nullable text.
    #[inline]
    pub fn select_source_rows_sql(self, target: &TableTarget) -> String {
        let caps = self.capabilities();
        let id = format!("CAST({} AS {})", self.quote(&target.id_column), caps.id_cast);
        let fields = target
            .fields
            .iter()
            .map(|field| format!("CAST({} AS {})", self.quote(field), caps.text_cast))
            .join(", ");

        format!("SELECT {id}, {fields} FROM {}", self.quote(&target.table))
    }

    #[inline]
    pub fn insert_embedding_sql(self, target: &TableTarget) -> String {
        let placeholder = self.capabilities().placeholder;
        format!(
            "INSERT INTO {} ({}, embedding) VALUES ({}, {})",
            self.quote(&target.companion_table()),
            self.quote(&target.foreign_key_column()),
            placeholder.render(1),
            placeholder.render(2),
        )
    }

    #[inline]
    pub fn encode_embedding(self, embedding: &[f32]) -> EmbeddingValue {
        self.capabilities().encoding.encode(embedding)
    }
}
