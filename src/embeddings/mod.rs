// Embeddings module
// The provider seam the ingestion pipeline calls once per row

pub mod ollama;


use async_trait::async_trait;

use crate::Result;
use crate::config::{Config, EmbeddingProviderKind};

pub use ollama::OllamaEmbedder;

/// Text in, fixed-length vector out.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Fails when the provider cannot serve requests, before any row is read.
    async fn check_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Returns an all-zero vector for every input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZeroEmbedder {
    dimension: usize,
}

impl ZeroEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for ZeroEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0; self.dimension])
    }
}

/// Build the provider selected in the config.
#[inline]
pub fn provider_from_config(config: &Config) -> Result<Box<dyn EmbeddingProvider>> {
    let dimension = config.embedding_dimension();
    match config.embedding.provider {
        EmbeddingProviderKind::Zero => Ok(Box::new(ZeroEmbedder::new(dimension))),
        EmbeddingProviderKind::Ollama => Ok(Box::new(OllamaEmbedder::new(
            &config.embedding.ollama,
            dimension,
        )?)),
    }
}
