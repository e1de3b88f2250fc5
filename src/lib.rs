use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProvisionError>;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Invalid identifier: {0}")]
    Validation(String),

    #[error("Unsupported database product: {0}")]
    UnsupportedDialect(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Unsupported OS: {0}")]
    UnsupportedOs(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Command failed with exit code {}: {output}", exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    Execution {
        exit_code: Option<i32>,
        output: String,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("SQL error: {0}")]
    Sql(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for ProvisionError {
    #[inline]
    fn from(err: sqlx::Error) -> Self {
        Self::Sql(err.to_string())
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod installer;
pub mod orchestrator;
pub mod pipeline;
pub mod request;
pub mod schema;

#[cfg(test)]
mod test_support;
