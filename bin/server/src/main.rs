use colloquy_ai::OpenAiCompatibleBackend;
use colloquy_conversation::{
    ConversationOrchestrator, HistoryStore, PhraseTriggerPolicy, SessionDirectory, ToolDispatcher,
    ToolRegistry,
};
use colloquy_server::config::ServerConfig;
use colloquy_server::db::{PgSessionStore, PgTurnStore};
use colloquy_server::routes::{self, AppState};
use colloquy_server::tools;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    // Session and history state, backed by Postgres
    let directory = Arc::new(SessionDirectory::new(Arc::new(PgSessionStore::new(
        db_pool.clone(),
    ))));
    let history = Arc::new(HistoryStore::new(Arc::new(PgTurnStore::new(
        db_pool.clone(),
    ))));

    // Build the tool catalog from the declarative table
    let (registry, report) = ToolRegistry::from_rows(tools::tool_table(&config));
    for failure in &report.failures {
        tracing::warn!(
            tool = %failure.id,
            reason = %failure.reason,
            "Tool skipped at startup"
        );
    }
    tracing::info!(
        registered = report.registered.len(),
        skipped = report.failures.len(),
        "Tool catalog ready"
    );

    let dispatcher = Arc::new(
        ToolDispatcher::new(Arc::new(registry)).expect("failed to start tool dispatcher"),
    );

    let backend = Arc::new(
        OpenAiCompatibleBackend::new(config.generation.clone())
            .expect("failed to build generation backend"),
    );

    let orchestrator = Arc::new(ConversationOrchestrator::new(
        directory,
        history,
        Arc::clone(&dispatcher),
        Arc::new(PhraseTriggerPolicy),
        backend,
        config.conversation.clone(),
    ));

    let app = routes::router(AppState {
        orchestrator,
        dispatcher,
    })
    .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app).await.expect("server error");
}
