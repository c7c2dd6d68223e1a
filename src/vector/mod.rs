//! Local knowledge base
//!
//! Documents are split into chunks, embedded through a remote
//! feature-extraction endpoint and kept in a flat in-memory index that is
//! searched by cosine similarity and persisted as JSON.

pub mod embedder;
pub mod index;
pub mod splitter;

pub use embedder::{Embedder, HfEmbeddingClient};
pub use index::{IndexEntry, ScoredChunk, VectorIndex};
pub use splitter::TextSplitter;

use tracing::info;

use crate::errors::{Result, TutorError};

/// Chunks sent per embedding request
const EMBED_BATCH: usize = 32;

/// Split `text`, embed every chunk and append it to `index`.
///
/// Returns the number of chunks added.
pub async fn ingest(
    index: &mut VectorIndex,
    text: &str,
    source: &str,
    splitter: &TextSplitter,
    embedder: &dyn Embedder,
) -> Result<usize> {
    let chunks = splitter.split(text);
    if chunks.is_empty() {
        return Err(TutorError::Index(format!("{} contains no text", source)));
    }

    for batch in chunks.chunks(EMBED_BATCH) {
        let vectors = embedder.embed(batch).await?;
        if vectors.len() != batch.len() {
            return Err(TutorError::Index(format!(
                "embedding endpoint returned {} vectors for {} chunks",
                vectors.len(),
                batch.len()
            )));
        }
        for (chunk, vector) in batch.iter().zip(vectors) {
            index.add(chunk.clone(), source, vector)?;
        }
    }

    info!(source, chunks = chunks.len(), "ingested document");
    Ok(chunks.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Bag-of-letters embedding, good enough to rank obvious matches
    pub(crate) struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                        v[(c as u8 - b'a') as usize] += 1.0;
                    }
                    v
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_ingest_adds_every_chunk() {
        let mut index = VectorIndex::new("letters");
        let splitter = TextSplitter::new(40, 0);
        let text = "Metallica is a heavy metal band.\n\nThe drummer is Lars Ulrich.\n\nJames Hetfield sings.";

        let added = ingest(&mut index, text, "notes.txt", &splitter, &LetterEmbedder)
            .await
            .unwrap();

        assert_eq!(added, 3);
        assert_eq!(index.len(), 3);
    }

    #[tokio::test]
    async fn test_ingest_empty_text_fails() {
        let mut index = VectorIndex::new("letters");
        let splitter = TextSplitter::new(40, 0);
        assert!(ingest(&mut index, "  ", "empty.txt", &splitter, &LetterEmbedder)
            .await
            .is_err());
    }
}
