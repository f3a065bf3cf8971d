use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use memchat_server::agent::{
    AgentRegistry, AgentServices, ConversationRepository, InMemoryConversationRepository,
};
use memchat_server::config::{MemoryBackend, Settings};
use memchat_server::database::{
    repository::ensure_schema, DbPool, PgConversationRepository, PgVectorIndex,
};
use memchat_server::router::build_router;
use memchat_server::services::{
    EmbeddingService, InMemoryVectorIndex, LoggingReminderHook, MemoryPipeline, ModelService,
    QueuedTaskRegistrar, ReminderScheduler, ReplyGenerator, VectorIndex,
};
use memchat_server::state::AppState;
use memchat_server::utils::logger::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_logger()?;

    info!("🚀 Starting memchat server...");

    // Load configuration
    let settings = Settings::load()?;
    info!("✅ Configuration loaded");

    // Storage backends
    let mut db_pool: Option<DbPool> = None;
    let (index, repository): (Arc<dyn VectorIndex>, Arc<dyn ConversationRepository>) =
        match settings.memory.backend {
            MemoryBackend::InMemory => {
                info!("Using in-memory vector index and conversation store");
                (
                    Arc::new(InMemoryVectorIndex::new()),
                    Arc::new(InMemoryConversationRepository::new()),
                )
            }
            MemoryBackend::Postgres => {
                let db_config = settings
                    .database
                    .as_ref()
                    .context("memory.backend = \"postgres\" requires a [database] section")?;
                let pool = DbPool::connect(db_config).await?;
                ensure_schema(&pool).await?;
                info!("✅ Database connection established");
                db_pool = Some(pool.clone());
                (
                    Arc::new(PgVectorIndex::new(pool.clone())),
                    Arc::new(PgConversationRepository::new(pool)),
                )
            }
        };

    // Initialize services
    let embedding_service = Arc::new(EmbeddingService::new(&settings.embedding)?);
    let model_service = Arc::new(ModelService::new(&settings.llm)?);
    let registrar = Arc::new(QueuedTaskRegistrar::new(
        settings.reminder.queue_capacity,
        Arc::new(LoggingReminderHook),
    ));

    let services = AgentServices {
        memory: Arc::new(MemoryPipeline::new(
            embedding_service,
            index,
            settings.memory.top_k,
        )),
        generator: Arc::new(ReplyGenerator::new(
            model_service,
            settings.llm.max_tokens,
            settings.llm.include_history,
        )),
        scheduler: Arc::new(ReminderScheduler::new(registrar, settings.reminder.clone())),
        repository,
    };

    let registry = Arc::new(AgentRegistry::new(services, settings.agent.clone()));
    let app = build_router(AppState { registry });

    // Server address
    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = db_pool {
        pool.close().await;
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
