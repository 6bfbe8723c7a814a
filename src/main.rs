use std::sync::Arc;

use anyhow::Context;
use cycimg::{
    app_state::AppState,
    capture::{split_file, spawn_capture},
    config::AppConfig,
    web,
};
use tracing::{error, info};
use tracing_appender::rolling;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = AppConfig::from_env()?;

    let args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args.iter().position(|arg| arg == "--split") {
        let path = args.get(pos + 1).context("--split needs an mjpeg file path")?;
        let report = split_file(path, config.read_buffer_bytes).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    tokio::fs::create_dir_all(&config.log_dir).await?;
    let file_appender = rolling::daily(&config.log_dir, "cycimg.log");
    let (non_blocking, _log_guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::INFO)
        .init();

    let state = Arc::new(AppState::from_config(config.clone()));
    let app = web::routes::build_router(state.clone());

    if config.auto_start {
        match spawn_capture(state.clone()).await {
            Ok(()) => info!("capture auto-started"),
            Err(err) => error!("failed to auto-start capture: {err:#}"),
        }
    }

    info!("{} listening on {}", config.app_name, config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
