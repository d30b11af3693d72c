use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use api::{
    AppConfig, AppState, create_router,
    managers::{PostManager, ProfileManager},
    repositories::{PgPostRepository, PgUserRepository},
};
use blob_store::{S3BlobStore, S3Config};
use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use identity::{HttpIdentityProvider, IdentityConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting lost & found API");

    let app_config = AppConfig::from_env().map_err(anyhow::Error::msg)?;
    info!(
        "Cleanup policies: photo replace {}, photo remove {}, post delete {}",
        app_config.consistency.photo_replace,
        app_config.consistency.photo_remove,
        app_config.consistency.post_delete
    );

    // Document store
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    run_migrations(&pool).await?;

    // Identity provider
    let identity_config = IdentityConfig::from_env().map_err(anyhow::Error::msg)?;
    let identity = Arc::new(HttpIdentityProvider::new(identity_config)?);

    // Blob store
    let blobs = Arc::new(S3BlobStore::connect(S3Config::from_env()).await);
    if let Err(e) = blobs.health_check().await {
        warn!("Blob store not reachable at start-up: {}", e);
    }

    let timeout = app_config.upstream_timeout();
    let users = Arc::new(PgUserRepository::new(pool.clone(), timeout));
    let posts = Arc::new(PgPostRepository::new(pool, timeout));

    let profiles = ProfileManager::new(
        identity.clone(),
        blobs.clone(),
        users,
        app_config.consistency,
    );
    let post_manager = PostManager::new(identity, blobs, posts, app_config.consistency)
        .verify_owners(app_config.verify_post_owners);

    let app = create_router(AppState::new(profiles, post_manager), &app_config);

    let listener = TcpListener::bind(&app_config.bind_address).await?;
    info!("API service listening on {}", app_config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
