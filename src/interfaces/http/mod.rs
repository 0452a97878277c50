mod azure_devops;
mod cases;
pub mod envelope;

use crate::application::{DiscoveryUseCase, ImportUseCase, TestExecutionUseCase};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::azure_devops::AzureDevOpsClient;
use crate::infrastructure::config::RunEnvironment;
use crate::infrastructure::db::sqlite::{self, DatabaseStats};
use crate::infrastructure::db::{TestCaseRepository, TestRunRepository};
use crate::infrastructure::logging::LogSink;
use crate::shared::time::now_iso;
use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::middleware::{from_fn, Next};
use actix_web::{error, get, web, App, HttpRequest, HttpResponse, HttpServer};
use envelope::{bad_request, ok, ApiResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;
use validator::Validate;

const SOURCE: &str = "HttpApi";
const REQUEST_ID_HEADER: &str = "x-request-id";
const FRONTEND_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

pub struct HttpState {
    pub import: ImportUseCase,
    pub discovery: DiscoveryUseCase,
    pub execution: TestExecutionUseCase,
    pub cases: Arc<TestCaseRepository>,
    pub pool: SqlitePool,
    pub logs: LogSink,
    pub environment: RunEnvironment,
    pub started_at: Instant,
}

impl HttpState {
    pub fn new(
        pool: SqlitePool,
        client: Arc<AzureDevOpsClient>,
        logs: LogSink,
        environment: RunEnvironment,
        cost_ceiling_run_usd: f64,
    ) -> Self {
        let cases = Arc::new(TestCaseRepository::new(pool.clone()));
        let runs = Arc::new(TestRunRepository::new(pool.clone()));

        Self {
            import: ImportUseCase::new(client.clone(), cases.clone(), logs.clone()),
            discovery: DiscoveryUseCase::new(client, logs.clone()),
            execution: TestExecutionUseCase::new(
                cases.clone(),
                runs,
                logs.clone(),
                cost_ceiling_run_usd,
            ),
            cases,
            pool,
            logs,
            environment,
            started_at: Instant::now(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthReport {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    environment: RunEnvironment,
    database: &'static str,
    uptime_seconds: u64,
    #[serde(flatten)]
    stats: Option<DatabaseStats>,
}

#[get("/health")]
async fn health(data: web::Data<HttpState>) -> HttpResponse {
    let stats = match sqlite::ping(&data.pool).await {
        Ok(()) => sqlite::stats(&data.pool).await,
        Err(err) => Err(err),
    };
    let healthy = stats.is_ok();
    if let Err(err) = &stats {
        data.logs
            .error(SOURCE, &format!("Health check failed: {err}"));
    }

    let report = HealthReport {
        status: if healthy { "healthy" } else { "unhealthy" },
        timestamp: now_iso(),
        version: env!("CARGO_PKG_VERSION"),
        environment: data.environment,
        database: if healthy { "connected" } else { "disconnected" },
        uptime_seconds: data.started_at.elapsed().as_secs(),
        stats: stats.ok(),
    };

    if healthy {
        ok(report)
    } else {
        HttpResponse::ServiceUnavailable().json(ApiResponse {
            success: false,
            data: Some(report),
            error: Some("HealthCheckError".to_string()),
            message: Some("Health check failed".to_string()),
            pagination: None,
        })
    }
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> HttpResponse {
    ok(data.logs.entries())
}

async fn not_found(req: HttpRequest) -> HttpResponse {
    HttpResponse::NotFound().json(ApiResponse::failure(
        "NotFound",
        format!("Route {} {} not found", req.method(), req.path()),
    ))
}

/// Echoes or assigns `X-Request-ID` and records each request in the log sink.
async fn request_context(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> std::result::Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let logs = req
        .app_data::<web::Data<HttpState>>()
        .map(|state| state.logs.clone());
    let method = req.method().to_string();
    let path = req.path().to_string();
    let started = Instant::now();

    let mut res = next.call(req).await?;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        res.headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    if let Some(logs) = logs {
        let status = res.status();
        let level = if status.is_server_error() {
            "ERROR"
        } else if status.is_client_error() {
            "WARN"
        } else {
            "INFO"
        };
        logs.add_entry(
            level,
            SOURCE,
            &format!(
                "{method} {path} -> {} ({}ms) [{request_id}]",
                status.as_u16(),
                started.elapsed().as_millis()
            ),
        );
    }
    Ok(res)
}

pub(crate) fn validate<T: Validate>(value: &T) -> Result<()> {
    value
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))
}

/// An empty body means "all defaults"; anything else must be valid JSON for `T`.
pub(crate) fn parse_optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::ValidationError(format!("Invalid request body: {e}")))
}

/// Routes plus the extractor configuration that turns malformed input into envelopes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let response = bad_request(err.to_string());
        error::InternalError::from_response(err, response).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        let response = bad_request(err.to_string());
        error::InternalError::from_response(err, response).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        let response = bad_request(err.to_string());
        error::InternalError::from_response(err, response).into()
    }))
    .service(
        web::scope("/api")
            .service(health)
            .service(get_logs)
            .configure(cases::configure)
            .configure(azure_devops::configure),
    );
}

pub fn build_app(
    state: web::Data<HttpState>,
    development: bool,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let cors = if development {
        Cors::permissive()
    } else {
        FRONTEND_ORIGINS
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allow_any_method()
            .allow_any_header()
            .expose_headers([REQUEST_ID_HEADER])
            .max_age(3600)
    };

    App::new()
        .app_data(state)
        .wrap(from_fn(request_context))
        .wrap(cors)
        .configure(configure)
        .default_service(web::to(not_found))
}

pub fn start_server(
    state: web::Data<HttpState>,
    host: &str,
    port: u16,
    development: bool,
) -> std::io::Result<Server> {
    let server = HttpServer::new(move || build_app(state.clone(), development))
        .bind((host, port))?
        .disable_signals()
        .run();

    Ok(server)
}
