use anyhow::{Context, Result};
use memchat_proto::ConversationMessage;
use pgvector::Vector;
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::debug;

use super::DbPool;
use crate::agent::ConversationRepository;
use crate::services::{MemoryMatch, MemoryMetadata, MemoryRecord, VectorIndex};

/// Create the tables and indexes both adapters rely on.
pub async fn ensure_schema(pool: &DbPool) -> Result<()> {
    let pool = pool.inner();

    debug!("Ensuring pgvector extension exists...");
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(pool)
        .await?;

    debug!("Ensuring memory table exists...");
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS agent_memories (
            id TEXT PRIMARY KEY,
            embedding vector NOT NULL,
            text TEXT NOT NULL,
            user_id TEXT NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )"#,
    )
    .execute(pool)
    .await?;

    debug!("Ensuring conversation table exists...");
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS agent_conversations (
            agent_name TEXT PRIMARY KEY,
            conversation JSONB NOT NULL DEFAULT '[]'::jsonb,
            updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[derive(FromRow)]
struct MemoryRow {
    id: String,
    text: String,
    user_id: String,
    similarity: f64,
}

/// pgvector-backed memory index, shared by every agent instance.
pub struct PgVectorIndex {
    pool: DbPool,
}

impl PgVectorIndex {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl VectorIndex for PgVectorIndex {
    async fn upsert(&self, record: MemoryRecord) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO agent_memories (id, embedding, text, user_id)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (id) DO NOTHING"#,
        )
        .bind(&record.id)
        .bind(Vector::from(record.vector))
        .bind(&record.metadata.text)
        .bind(&record.metadata.user)
        .execute(self.pool.inner())
        .await
        .context("Failed to insert memory record")?;

        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<MemoryMatch>> {
        let rows = sqlx::query_as::<_, MemoryRow>(
            r#"SELECT
                id,
                text,
                user_id,
                1 - (embedding <=> $1) AS similarity
               FROM agent_memories
               WHERE vector_dims(embedding) = vector_dims($1)
               ORDER BY embedding <=> $1
               LIMIT $2"#,
        )
        .bind(Vector::from(vector.to_vec()))
        .bind(top_k as i64)
        .persistent(false)
        .fetch_all(self.pool.inner())
        .await
        .context("Failed to query memory index")?;

        debug!("Found {} memory matches", rows.len());

        Ok(rows
            .into_iter()
            .map(|row| MemoryMatch {
                id: row.id,
                score: row.similarity as f32,
                metadata: Some(MemoryMetadata {
                    text: row.text,
                    user: row.user_id,
                }),
            })
            .collect())
    }
}

/// Persisted conversation copy, one JSONB document per agent instance.
pub struct PgConversationRepository {
    pool: DbPool,
}

impl PgConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn load(&self, agent: &str) -> Result<Vec<ConversationMessage>> {
        let row: Option<(Json<Vec<ConversationMessage>>,)> = sqlx::query_as(
            "SELECT conversation FROM agent_conversations WHERE agent_name = $1",
        )
        .bind(agent)
        .fetch_optional(self.pool.inner())
        .await
        .context("Failed to load conversation")?;

        Ok(row.map(|(Json(conversation),)| conversation).unwrap_or_default())
    }

    async fn save(&self, agent: &str, conversation: &[ConversationMessage]) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO agent_conversations (agent_name, conversation, updated_at)
               VALUES ($1, $2, NOW())
               ON CONFLICT (agent_name)
               DO UPDATE SET conversation = EXCLUDED.conversation, updated_at = NOW()"#,
        )
        .bind(agent)
        .bind(Json(conversation))
        .execute(self.pool.inner())
        .await
        .context("Failed to save conversation")?;

        Ok(())
    }
}
