mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use studio_api::cache::RenderCache;
use studio_api::{AppState, AppStateInner, AuthSettings};
use studio_db::Database;
use studio_pipeline::PipelineClient;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caption_studio=debug,studio_api=debug,studio_db=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("FATAL: {:#}", e);
            std::process::exit(1);
        }
    };

    // Init database
    let db = Database::open(&config.db_path, &config.captions_table)?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        pipeline: PipelineClient::new(config.pipeline_base_url.clone()),
        auth: AuthSettings {
            jwt_secret: config.jwt_secret.clone(),
            anon_key: config.anon_key.clone(),
            auth_url: config.auth_url.clone(),
            site_url: config.site_url.clone(),
        },
        feed_cache: RenderCache::new(config.cache_ttl),
        voting_cache: RenderCache::new(config.cache_ttl),
    });

    let app = studio_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Caption studio listening on {}", addr);
    info!(
        "Captions table \"{}\", pipeline at {}, render cache {}s",
        config.captions_table,
        config.pipeline_base_url,
        config.cache_ttl.as_secs()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
