//! forvibe-back binary entrypoint wiring the REST routes, the chat relay and the store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forvibe_back::{
    config::AppConfig,
    dao::{
        completion::openai::{OpenAiClient, OpenAiConfig},
        store::{Store, memory::MemoryStore},
    },
    routes,
    services::storage_supervisor::{self, Backoff},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let store = build_store()?;

    let completions = OpenAiClient::new(OpenAiConfig::from_env(
        config.chat.model.clone(),
        config.chat.max_tokens,
    ))
    .context("building completion client")?;

    let app_state = AppState::new(store, Arc::new(completions), config);

    tokio::spawn(storage_supervisor::run(app_state.clone(), Backoff::default()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the Postgres store when `DATABASE_URL` is set, the in-memory one otherwise.
#[cfg(feature = "postgres-store")]
fn build_store() -> anyhow::Result<Arc<dyn Store>> {
    use forvibe_back::dao::store::postgres::{PostgresConfig, PostgresStore};

    let Some(pg_config) = PostgresConfig::from_env() else {
        warn!("DATABASE_URL not set; scores and conversations are kept in memory only");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let store = PostgresStore::connect_lazy(&pg_config).context("configuring Postgres pool")?;
    // Connections open on first use; the schema is applied by the storage supervisor.
    info!(max_connections = pg_config.max_connections, "Postgres pool configured");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres-store"))]
fn build_store() -> anyhow::Result<Arc<dyn Store>> {
    warn!("built without postgres-store; scores and conversations are kept in memory only");
    Ok(Arc::new(MemoryStore::new()))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
