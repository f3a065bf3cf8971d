use anyhow::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::utils::cosine_similarity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    pub text: String,
    pub user: String,
}

/// Write-once entry of the memory index.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: MemoryMetadata,
}

/// Ranked query hit. Metadata is optional because indexes may drop it.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Option<MemoryMetadata>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, record: MemoryRecord) -> Result<()>;

    /// Up to `top_k` nearest records, best first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<MemoryMatch>>;
}

/// Process-local index ranked by cosine similarity.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    records: RwLock<Vec<MemoryRecord>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait::async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, record: MemoryRecord) -> Result<()> {
        let mut records = self.records.write();
        // Records are never overwritten.
        if !records.iter().any(|r| r.id == record.id) {
            records.push(record);
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<MemoryMatch>> {
        let records = self.records.read();
        let mut scored: Vec<MemoryMatch> = records
            .iter()
            .filter_map(|record| {
                cosine_similarity(vector, &record.vector).map(|score| MemoryMatch {
                    id: record.id.clone(),
                    score,
                    metadata: Some(record.metadata.clone()),
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}
