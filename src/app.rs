use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::domain::error::Result;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::ConfigService;
use crate::interfaces::http::start_server;

/// Runs the HTTP server until Ctrl-C, then drains connections and closes the store.
pub fn run(config_file: &Path) -> Result<()> {
    init_tracing();
    actix_web::rt::System::new().block_on(serve(config_file))
}

pub fn store_pat(pat: &str) -> Result<()> {
    ConfigService::new().save_pat(pat)
}

pub fn clear_pat() -> Result<()> {
    ConfigService::new().clear_pat()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn serve(config_file: &Path) -> Result<()> {
    let backend = bootstrap::setup(config_file).await?;
    let server = &backend.config.server;

    let http = start_server(
        backend.state.clone(),
        &server.host,
        server.port,
        backend.config.is_development(),
    )?;
    backend.logs.info(
        "System",
        &format!("HTTP server listening on http://{}:{}", server.host, server.port),
    );

    let handle = http.handle();
    let logs = backend.logs.clone();
    actix_web::rt::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            logs.info("System", "Shutdown requested, stopping HTTP server");
            handle.stop(true).await;
        }
    });

    http.await?;
    backend.pool.close().await;
    backend.logs.info("System", "Shutdown complete");
    Ok(())
}
