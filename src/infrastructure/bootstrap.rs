use std::path::Path;
use std::sync::Arc;

use actix_web::web;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::domain::error::Result;
use crate::infrastructure::azure_devops::AzureDevOpsClient;
use crate::infrastructure::config::{AppConfig, ConfigService};
use crate::infrastructure::db::sqlite::init_db;
use crate::infrastructure::logging::LogSink;
use crate::interfaces::http::HttpState;

/// Everything the server needs, wired from configuration.
pub struct Backend {
    pub config: AppConfig,
    pub pool: SqlitePool,
    pub state: web::Data<HttpState>,
    pub logs: LogSink,
}

pub async fn setup(config_file: &Path) -> Result<Backend> {
    let logs = LogSink::new();
    let config_service = ConfigService::new();

    let config = config_service.load(config_file).map_err(|err| {
        error!(error = %err, config_file = %config_file.display(), "Failed to load configuration");
        err
    })?;
    info!(config = %config.redacted(), "Configuration loaded");

    let azure_devops = config_service.azure_devops_config(&config)?;

    let pool = init_db(&config.database.path).await.map_err(|err| {
        error!(
            error = %err,
            db_path = %config.database.path.display(),
            "Failed to open database"
        );
        err
    })?;

    let client = Arc::new(AzureDevOpsClient::new(azure_devops, logs.clone())?);
    let state = web::Data::new(HttpState::new(
        pool.clone(),
        client,
        logs.clone(),
        config.environment,
        config.cost_ceiling_run_usd,
    ));

    logs.info(
        "System",
        &format!(
            "Backend initialized (database: {})",
            config.database.path.display()
        ),
    );

    Ok(Backend {
        config,
        pool,
        state,
        logs,
    })
}
