// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use reportsim::{
    AnyEngine, AppConfig, AppState, EmbeddingEngine, PipelineMetrics, ReportService,
    RouterOptions, build_store, config::LogFormat, config::LoggingConfig, create_router,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_with_path(path)?,
        None => AppConfig::load()?,
    };

    init_tracing(&config.logging);
    tracing::info!("Starting report similarity service...");
    tracing::debug!("Configuration loaded: {:?}", config);

    tracing::info!(
        "Initializing {} engine (this may take a while to download models)...",
        config.model.engine
    );
    let model_config = config.model.clone();
    let engine = tokio::task::spawn_blocking(move || AnyEngine::new(&model_config)).await??;
    tracing::info!(
        "Engine '{}' ready, dimension {}",
        engine.name(),
        engine.dimension()
    );

    let store = build_store(&config.store).await?;
    let metrics = Arc::new(PipelineMetrics::new()?);

    let service = ReportService::from_config(&config, Arc::new(engine), store)?
        .with_metrics(Arc::clone(&metrics));
    tracing::info!(
        "Pipeline: max_chunk_size={}, ingest_mode={:?}, index cache {}",
        config.pipeline.max_chunk_size,
        config.pipeline.ingest_mode,
        if config.index.cache_enabled { "on" } else { "off" }
    );

    let app_state = AppState {
        service: Arc::new(service),
        metrics,
    };
    let options = RouterOptions {
        timeout: Duration::from_secs(config.server.timeout_secs),
        max_body_bytes: config.server.max_upload_mb * 1024 * 1024,
        cors_origins: config.server.cors_origins.clone(),
    };
    let app = create_router(app_state, options);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
