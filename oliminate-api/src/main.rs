use std::net::SocketAddr;

use anyhow::Context;
use oliminate_api::{app, AppState, AuthConfig};
use oliminate_store::{Config, DbClient, Repositories, StorageBackend};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "oliminate_api=debug,oliminate_store=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!(
        port = config.server.port,
        backend = ?config.storage.backend,
        "Starting Oliminate API"
    );

    let repos = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Repositories::postgres(db.pool)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory backend; data is lost on restart");
            Repositories::in_memory()
        }
    };

    let app_state = AppState::new(
        repos,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app(app_state))
        .await
        .context("Server error")?;

    Ok(())
}
