//! Knowledge-base lookup over a local vector index

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::Result;
use crate::retrieval::{RetrievalAdapter, RetrievalSource};
use crate::vector::{Embedder, VectorIndex};

pub struct KnowledgeBaseAdapter {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl KnowledgeBaseAdapter {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            index,
            embedder,
            top_k: top_k.max(1),
        }
    }
}

#[async_trait]
impl RetrievalAdapter for KnowledgeBaseAdapter {
    fn name(&self) -> &str {
        "knowledge-base"
    }

    fn source(&self) -> RetrievalSource {
        RetrievalSource::VectorIndex
    }

    async fn fetch(&self, query: &str) -> Result<Option<String>> {
        if self.index.is_empty() {
            return Ok(None);
        }

        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let Some(query_vector) = vectors.into_iter().next() else {
            return Ok(None);
        };

        let hits = self.index.search(&query_vector, self.top_k);
        if hits.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            hits.into_iter()
                .map(|h| h.text)
                .collect::<Vec<_>>()
                .join("\n\n"),
        ))
    }
}
