//! Flat cosine-similarity index persisted as JSON

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{Result, TutorError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub text: String,
    pub source: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub text: String,
    pub source: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    /// Embedding model the vectors came from
    pub model: String,
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            dimension: None,
            entries: Vec::new(),
        }
    }

    /// Add one chunk; every vector must share the first vector's dimension
    pub fn add(&mut self, text: String, source: &str, vector: Vec<f32>) -> Result<()> {
        if vector.is_empty() {
            return Err(TutorError::Index("empty embedding vector".to_string()));
        }
        match self.dimension {
            Some(dim) if dim != vector.len() => {
                return Err(TutorError::Index(format!(
                    "dimension mismatch: index has {}, got {}",
                    dim,
                    vector.len()
                )))
            }
            Some(_) => {}
            None => self.dimension = Some(vector.len()),
        }

        self.entries.push(IndexEntry {
            text,
            source: source.to_string(),
            vector,
        });
        Ok(())
    }

    /// Top `k` chunks by cosine similarity, best first
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        if self.dimension != Some(query.len()) {
            return Vec::new();
        }

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|e| ScoredChunk {
                text: e.text.clone(),
                source: e.source.clone(),
                score: cosine_similarity(query, &e.vector),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TutorError::Index(format!("Failed to read {}: {}", path.display(), e)))?;
        let index: VectorIndex = serde_json::from_str(&contents)?;
        Ok(index)
    }
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> VectorIndex {
        let mut index = VectorIndex::new("test-model");
        index.add("north".to_string(), "a.txt", vec![0.0, 1.0]).unwrap();
        index.add("east".to_string(), "a.txt", vec![1.0, 0.0]).unwrap();
        index.add("north-east".to_string(), "b.txt", vec![1.0, 1.0]).unwrap();
        index
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_ranks_best_first() {
        let results = sample().search(&[0.1, 1.0], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "north");
        assert_eq!(results[1].text, "north-east");
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut index = sample();
        assert!(index.add("bad".to_string(), "c.txt", vec![1.0, 2.0, 3.0]).is_err());
        assert!(index.search(&[1.0, 2.0, 3.0], 3).is_empty());
    }

    #[test]
    fn test_save_and_load_keeps_ranking() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        sample().save(&path).unwrap();

        let loaded = VectorIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.model, "test-model");
        assert_eq!(loaded.search(&[1.0, 0.1], 1)[0].text, "east");
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            VectorIndex::load(Path::new("/nonexistent/index.json")),
            Err(TutorError::Index(_))
        ));
    }
}
