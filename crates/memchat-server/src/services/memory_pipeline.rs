//! Best-effort memory retrieval.
//!
//! Embeds the incoming message, stores it in the shared index and pulls the
//! nearest prior messages back as prompt context. Every failure degrades to an
//! empty context; nothing here can fail the enclosing request.

use std::sync::Arc;
use tracing::{debug, warn};

use super::embedding_service::Embedder;
use super::fault::PipelineFault;
use super::vector_index::{MemoryMetadata, MemoryRecord, VectorIndex};

/// Identifies the message being remembered: owning agent instance plus its
/// position in that instance's history.
#[derive(Debug, Clone, Copy)]
pub struct MemoryKey<'a> {
    pub agent: &'a str,
    pub sequence: usize,
}

impl MemoryKey<'_> {
    fn record_id(&self) -> String {
        format!(
            "{}-{}-{}",
            self.agent,
            chrono::Utc::now().timestamp_millis(),
            self.sequence
        )
    }
}

pub struct MemoryPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl MemoryPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            top_k,
        }
    }

    /// Context string for `message`, possibly empty.
    pub async fn retrieve_context(&self, key: MemoryKey<'_>, message: &str, user_id: &str) -> String {
        let vector = match self.embedder.embed(message).await {
            Ok(vector) if !vector.is_empty() => vector,
            Ok(_) => {
                debug!(agent = key.agent, "Embedding came back empty, skipping memory");
                return String::new();
            }
            Err(e) => {
                let fault = PipelineFault::memory(e);
                warn!(agent = key.agent, error = %fault, "Embedding failed, continuing without memory");
                return String::new();
            }
        };

        let record = MemoryRecord {
            id: key.record_id(),
            vector: vector.clone(),
            metadata: MemoryMetadata {
                text: message.to_string(),
                user: user_id.to_string(),
            },
        };
        let record_id = record.id.clone();
        if let Err(e) = self.index.upsert(record).await {
            let fault = PipelineFault::memory(e);
            warn!(agent = key.agent, record_id = %record_id, error = %fault, "Memory upsert failed");
        }

        let matches = match self.index.query(&vector, self.top_k).await {
            Ok(matches) => matches,
            Err(e) => {
                let fault = PipelineFault::memory(e);
                warn!(agent = key.agent, error = %fault, "Memory query failed, continuing without memory");
                return String::new();
            }
        };

        let context = matches
            .iter()
            .filter_map(|m| m.metadata.as_ref())
            .map(|meta| meta.text.as_str())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        debug!(
            agent = key.agent,
            matches = matches.len(),
            context_len = context.len(),
            "Memory context assembled"
        );
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::embedding_service::MockEmbedder;
    use crate::services::vector_index::{InMemoryVectorIndex, MemoryMatch, MockVectorIndex};

    const KEY: MemoryKey<'static> = MemoryKey {
        agent: "default",
        sequence: 0,
    };

    fn hit(id: &str, text: Option<&str>) -> MemoryMatch {
        MemoryMatch {
            id: id.to_string(),
            score: 0.9,
            metadata: text.map(|t| MemoryMetadata {
                text: t.to_string(),
                user: "guest".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_yields_empty_context() {
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed()
            .returning(|_| Err(anyhow::anyhow!("embedding offline")));
        let mut index = MockVectorIndex::new();
        index.expect_upsert().never();
        index.expect_query().never();

        let pipeline = MemoryPipeline::new(Arc::new(embedder), Arc::new(index), 3);
        assert_eq!(pipeline.retrieve_context(KEY, "hello", "guest").await, "");
    }

    #[tokio::test]
    async fn test_upsert_failure_still_queries() {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|_| Ok(vec![0.1, 0.2]));
        let mut index = MockVectorIndex::new();
        index
            .expect_upsert()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("index read-only")));
        index
            .expect_query()
            .withf(|vector, top_k| vector == [0.1f32, 0.2] && *top_k == 3)
            .times(1)
            .returning(|_, _| Ok(vec![hit("a", Some("earlier note"))]));

        let pipeline = MemoryPipeline::new(Arc::new(embedder), Arc::new(index), 3);
        assert_eq!(
            pipeline.retrieve_context(KEY, "hello", "guest").await,
            "earlier note"
        );
    }

    #[tokio::test]
    async fn test_query_failure_yields_empty_context() {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|_| Ok(vec![1.0]));
        let mut index = MockVectorIndex::new();
        index.expect_upsert().returning(|_| Ok(()));
        index
            .expect_query()
            .returning(|_, _| Err(anyhow::anyhow!("timeout")));

        let pipeline = MemoryPipeline::new(Arc::new(embedder), Arc::new(index), 3);
        assert_eq!(pipeline.retrieve_context(KEY, "hello", "guest").await, "");
    }

    #[tokio::test]
    async fn test_context_keeps_index_order_and_skips_blanks() {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|_| Ok(vec![1.0]));
        let mut index = MockVectorIndex::new();
        index.expect_upsert().returning(|_| Ok(()));
        index.expect_query().returning(|_, _| {
            Ok(vec![
                hit("a", Some("second best")),
                hit("b", Some("")),
                hit("c", None),
                hit("d", Some("third best")),
            ])
        });

        let pipeline = MemoryPipeline::new(Arc::new(embedder), Arc::new(index), 3);
        assert_eq!(
            pipeline.retrieve_context(KEY, "hello", "guest").await,
            "second best\nthird best"
        );
    }

    #[tokio::test]
    async fn test_record_stored_with_message_metadata() {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|_| Ok(vec![0.3, 0.4]));
        let index = Arc::new(InMemoryVectorIndex::new());

        let pipeline = MemoryPipeline::new(Arc::new(embedder), index.clone(), 3);
        let context = pipeline
            .retrieve_context(MemoryKey { agent: "room-1", sequence: 4 }, "remember me", "ana")
            .await;

        // The freshly stored message is its own nearest neighbour.
        assert_eq!(context, "remember me");
        let hits = index.query(&[0.3, 0.4], 1).await.unwrap();
        assert!(hits[0].id.starts_with("room-1-"));
        assert!(hits[0].id.ends_with("-4"));
        assert_eq!(hits[0].metadata.as_ref().unwrap().user, "ana");
    }
}
