//! Study chat server
//!
//! (c) Softlandia 2025

use study_chat_server::TASK_SENDER;
use study_chat_server::api;
use study_chat_server::config::{Settings, StoreBackend};
use study_chat_server::core;
use study_chat_server::core::assistant::ChannelAnswerGenerator;
use study_chat_server::core::services::StudyConversationService;
use study_chat_server::core::traits::AnswerGenerator;
use study_chat_server::infrastructure::database::DatabaseConnection;
use study_chat_server::infrastructure::memory::{
    InMemoryConversationRepository, InMemoryMessageRepository, MemoryDatabase,
};
use study_chat_server::infrastructure::repositories::{
    DbConversationRepository, DbMessageRepository,
};

use anyhow::{Context, anyhow};
use axum::http::{HeaderValue, Method};
use di::{Injectable, ServiceCollection};
use di_axum::RouterServiceProviderExtensions;
use log::info;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let runtime: Runtime = Builder::new_multi_thread().enable_all().build()?;

    // background task answering questions
    let (task_sender, task_receiver) = mpsc::channel(10);
    let assistant_join_handle = runtime.spawn(core::assistant::background_task(task_receiver));
    TASK_SENDER
        .set(task_sender)
        .map_err(|_| anyhow!("task sender should not be set"))?;

    let web_task_handle = runtime.spawn(web_server_task(settings));

    runtime.block_on(async {
        web_task_handle
            .await
            .context("failed to join web_task_handle")??;
        assistant_join_handle
            .await
            .context("failed to join assistant_join_handle")?;
        Ok::<(), anyhow::Error>(())
    })
}

async fn web_server_task(settings: Settings) -> anyhow::Result<()> {
    let mut services = ServiceCollection::new();
    match settings.store_backend {
        StoreBackend::Sqlite => {
            let pool = DatabaseConnection::connect(&settings.database_url).await?;
            DatabaseConnection::install(pool);
            services
                .add(DatabaseConnection::singleton())
                .add(DbConversationRepository::scoped())
                .add(DbMessageRepository::scoped());
        }
        StoreBackend::Memory => {
            info!("keeping conversations in memory, they are lost on restart");
            services
                .add(MemoryDatabase::singleton())
                .add(InMemoryConversationRepository::scoped())
                .add(InMemoryMessageRepository::scoped());
        }
    }
    let provider = services
        .add(di::existing::<dyn AnswerGenerator, ChannelAnswerGenerator>(Box::new(
            ChannelAnswerGenerator::new(settings.answer_timeout),
        )))
        .add(StudyConversationService::scoped())
        .build_provider()
        .map_err(|e| anyhow!("invalid service configuration: {e:?}"))?;

    let origins = settings
        .allowed_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()
        .context("invalid ALLOWED_ORIGINS")?;

    let app = api::router()
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_headers(Any)
                    .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
                    .allow_origin(origins),
            ),
        )
        .with_provider(provider);

    let listener = tokio::net::TcpListener::bind(settings.bind_address).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    info!("Shutting down...");
    Ok(())
}
