use parley_ai::{OpenAiClient, RunOrchestrator, SearchEscalator};
use parley_conversation::{JsonFileStore, KeyValueStore, Relay, SessionStore};
use parley_integration::{GoogleSearchClient, SlackClient};
use parley_server::{
    config::ServerConfig,
    db::PgKeyValueStore,
    error::StartupError,
    provision::resolve_assistant,
    routes::{AppState, router},
    signature::SignatureVerifier,
};
use rootcause::prelude::{Report, ResultExt};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
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

    run(config).await.expect("server error");
}

async fn run(config: ServerConfig) -> Result<(), Report<StartupError>> {
    let openai = Arc::new(
        OpenAiClient::new(config.openai_client())
            .context(StartupError::Client { service: "OpenAI" })?,
    );
    let slack = Arc::new(
        SlackClient::new(config.slack_client()).context(StartupError::Client { service: "Slack" })?,
    );
    let search = Arc::new(
        GoogleSearchClient::new(config.search_client())
            .context(StartupError::Client { service: "Google Search" })?,
    );

    let store = open_store(&config).await?;
    let sessions = SessionStore::load(openai.clone(), store)
        .await
        .context(StartupError::Sessions)?;

    let system_prompt = config.system_prompt();
    let assistant_id = resolve_assistant(&*openai, &config.openai, &system_prompt).await?;

    let relay = Relay::new(
        config.relay(),
        slack,
        Arc::new(sessions),
        RunOrchestrator::new(openai.clone(), assistant_id, system_prompt, config.run()),
        SearchEscalator::new(search, openai),
    );
    let verifier = SignatureVerifier::new(
        &config.slack.signing_secret,
        config.slack.max_request_age_secs,
    );
    let relay = Arc::new(relay);
    let app = router(AppState::new(Arc::clone(&relay), verifier));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context(StartupError::Listener {
            addr: config.bind_addr.clone(),
        })?;

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(StartupError::Listener {
            addr: config.bind_addr.clone(),
        })?;

    relay.drain(config.shutdown_grace()).await;
    tracing::info!("Server stopped");
    Ok(())
}

/// Opens the session mapping backend: Postgres when a database URL is
/// configured, the JSON mapping file otherwise.
async fn open_store(config: &ServerConfig) -> Result<Arc<dyn KeyValueStore>, Report<StartupError>> {
    let Some(database_url) = &config.persistence.database_url else {
        tracing::info!(
            path = %config.persistence.mapping_file.display(),
            "Using JSON file for session mappings"
        );
        return Ok(Arc::new(JsonFileStore::new(&config.persistence.mapping_file)));
    };

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context(StartupError::Database)?;

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context(StartupError::Database)?;

    Ok(Arc::new(PgKeyValueStore::new(db_pool)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
