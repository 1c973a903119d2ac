mod config;
mod http;
mod state;

use anyhow::Context;
use dotenvy::dotenv;
use engine::{Engine, EngineConfig, LocalUploader};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Settings;
use http::router::build_router;
use state::AppState;
use storage::Db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境变量与日志
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 2. 加载配置
    let settings = Settings::new().context("Failed to load configuration")?;

    // 3. 构建引擎 (可选 SQLite 镜像)
    let uploader = Arc::new(LocalUploader::new(
        &settings.uploads.dir,
        &settings.uploads.url_prefix,
        settings.uploads.max_bytes,
    ));
    let engine_config = EngineConfig {
        event_capacity: settings.engine.event_capacity,
    };

    let engine = if settings.database.enabled {
        let db = Db::new(&settings.database.url)
            .await
            .with_context(|| format!("Failed to open database {}", settings.database.url))?;
        Engine::open(uploader, engine_config, db).await?
    } else {
        info!("Database mirror disabled, threads are kept in memory only");
        Engine::new(uploader, engine_config)
    };

    // 4. 启动命令 Worker
    let (tx_cmd, rx_cmd) = mpsc::channel(settings.engine.command_capacity.max(1));
    let cancel_token = CancellationToken::new();

    let worker = tokio::spawn({
        let engine = engine.clone();
        let cancel_token = cancel_token.clone();
        async move {
            if let Err(e) = engine::start_with_cancel_token(engine, rx_cmd, cancel_token).await {
                tracing::error!("Comment worker crashed: {:?}", e);
            }
        }
    });

    // 5. 启动 Web Server
    let state = AppState {
        engine,
        sender: tx_cmd,
        command_timeout: Duration::from_secs(settings.engine.command_timeout_secs),
    };

    let app = build_router(state, &settings.server.cors_origins, &settings.uploads);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address: {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 6. 优雅退出
    cancel_token.cancel();
    worker.await.context("Comment worker panicked")?;
    info!("Bye");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
