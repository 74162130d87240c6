use std::sync::Arc;

use anyhow::Context;

use forms_api::app::{AppState, build_app};
use forms_auth::UserStore;
use forms_infra::{AppConfig, InMemoryUserStore, PostgresUserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    forms_observability::init(AppConfig::production_from_env());

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let users: Arc<dyn UserStore> = match &config.database_uri {
        Some(uri) => {
            let store = PostgresUserStore::connect(uri)
                .await
                .context("failed to connect to database")?;
            store
                .ensure_schema()
                .await
                .context("failed to prepare users table")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("FORMS_DATABASE_URI not set; users are kept in memory");
            Arc::new(InMemoryUserStore::new())
        }
    };

    let state = AppState::from_config(&config, users)?;
    let app = build_app(state, &config.base_url);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
