//! Companion vector table DDL


use tracing::{debug, info};

use crate::database::Session;
use crate::{ProvisionError, Result};

/// Create `<table>_vector` with an embedding column of `dimension`.
///
/// Dialects without `IF NOT EXISTS` fail with [`ProvisionError::Schema`]
/// when the table is already there.
#[inline]
pub async fn create_companion_table(session: &Session<'_>, dimension: usize) -> Result<()> {
    let companion = session.target.companion_table();
    let ddl = session
        .dialect
        .create_companion_table_sql(session.target, dimension);
    debug!(sql = %ddl, "Creating companion table");

    session.database.execute(&ddl).await.map_err(|e| {
        ProvisionError::Schema(format!("Failed to create table {companion}: {e}"))
    })?;

    info!(
        "Companion table {} ready with {} embedding column",
        companion,
        session.dialect.embedding_column_type(dimension)
    );
    Ok(())
}
