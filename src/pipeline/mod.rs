//! Row-by-row ingestion: read, embed, serialize, insert

#[cfg(test)]
mod tests;

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::database::Session;
use crate::embeddings::EmbeddingProvider;
use crate::{ProvisionError, Result};

/// Embed every row of the source table into its companion table.
///
/// Rows are read from a forward-only cursor and inserted one at a time with
/// autocommit. The first failure stops the run; rows inserted before it stay.
/// Returns the number of rows written.
#[inline]
pub async fn run(session: &Session<'_>, embedder: &dyn EmbeddingProvider) -> Result<u64> {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} [{pos}] Embedding rows of {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(session.target.table.to_string());

    let result = ingest_rows(session, embedder, &bar).await;
    bar.finish_and_clear();

    let rows_processed = result?;
    info!(
        "Inserted {} embeddings into {}",
        rows_processed,
        session.target.companion_table()
    );
    Ok(rows_processed)
}

async fn ingest_rows(
    session: &Session<'_>,
    embedder: &dyn EmbeddingProvider,
    bar: &ProgressBar,
) -> Result<u64> {
    let select = session.dialect.select_source_rows_sql(session.target);
    let insert = session.dialect.insert_embedding_sql(session.target);
    debug!(sql = %select, "Streaming source rows");
    debug!(sql = %insert, "Insert statement");

    let expected = embedder.dimension();
    let mut rows = session
        .database
        .stream_rows(&select, session.target.fields.len());
    let mut processed = 0_u64;

    while let Some(row) = rows.next().await {
        let row = row?;
        let text = row.combined_text();
        debug!(id = row.id, "Embedding {} characters", text.len());

        let embedding = embedder.embed(&text).await?;
        if embedding.len() != expected {
            return Err(ProvisionError::Embedding(format!(
                "provider returned {} values for row {}, expected {}",
                embedding.len(),
                row.id,
                expected
            )));
        }
        if embedding.iter().any(|value| !value.is_finite()) {
            return Err(ProvisionError::Embedding(format!(
                "provider returned a non-finite value for row {}",
                row.id
            )));
        }

        let value = session.dialect.encode_embedding(&embedding);
        session
            .database
            .insert_embedding(&insert, row.id, value)
            .await?;

        processed += 1;
        bar.inc(1);
    }

    Ok(processed)
}
