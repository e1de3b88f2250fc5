
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::{ProvisionError, Result};

static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("identifier pattern is valid"));

/// Payload accepted by every environment selector.
///
/// Field names follow the JSON wire form (`tableName`, `idName`, ...), so a
/// request file written for the HTTP surface can be fed to the CLI as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_container_name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub table_name: String,
    pub id_name: String,
    pub fields: Vec<String>,
}

impl ProvisionRequest {
    /// Check every identifier and produce the typed target used to build SQL.
    ///
    /// Nothing touches the database before this succeeds.
    #[inline]
    pub fn validate(&self) -> Result<TableTarget> {
        let table = Identifier::parse(&self.table_name)?;
        let id_column = Identifier::parse(&self.id_name)?;

        if self.fields.is_empty() {
            return Err(ProvisionError::Validation(
                "at least one text field is required".to_string(),
            ));
        }

        let fields = self
            .fields
            .iter()
            .map(|field| Identifier::parse(field))
            .collect::<Result<Vec<_>>>()?;

        Ok(TableTarget {
            table,
            id_column,
            fields,
        })
    }
}

/// A SQL identifier restricted to `[A-Za-z0-9_]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    #[inline]
    pub fn parse(raw: &str) -> Result<Self> {
        if IDENTIFIER_PATTERN.is_match(raw).unwrap_or(false) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ProvisionError::Validation(raw.to_string()))
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated source table description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub table: Identifier,
    pub id_column: Identifier,
    pub fields: Vec<Identifier>,
}

impl TableTarget {
    /// `<table>_vector`
    #[inline]
    pub fn companion_table(&self) -> Identifier {
        Identifier(format!("{}_vector", self.table))
    }

    /// `fk_<table>_<idColumn>`
    #[inline]
    pub fn foreign_key_column(&self) -> Identifier {
        Identifier(format!("fk_{}_{}", self.table, self.id_column))
    }
}
