use super::envelope::{ok, ApiResponse};
use super::{parse_optional_body, validate, HttpState};
use crate::domain::error::{AppError, Result};
use crate::domain::test_case::{Pagination, TestCaseFilter};
use crate::domain::test_run::{Browser, RunStatus};
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use validator::Validate;

const SOURCE: &str = "HttpApi";
const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 20;

#[derive(Debug, Deserialize, Validate)]
pub struct ListCasesQuery {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,
    pub area: Option<String>,
    #[validate(range(min = 1, max = 4, message = "Priority must be between 1 and 4"))]
    pub priority: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateTestRequest {
    #[serde(default)]
    pub regenerate: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExecuteTestRequest {
    #[serde(default)]
    pub browser: Browser,
    #[serde(default)]
    pub env: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FinishRunRequest {
    pub status: RunStatus,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageRequest {
    #[validate(length(min = 1, message = "Model is required"))]
    pub model: String,
    #[validate(range(min = 0, message = "Prompt tokens must not be negative"))]
    pub prompt_tokens: i64,
    #[validate(range(min = 0, message = "Completion tokens must not be negative"))]
    pub completion_tokens: i64,
    #[validate(range(min = 0.0, message = "Cost must not be negative"))]
    pub cost_usd: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteTestResponse {
    run_id: String,
}

#[get("/cases")]
async fn list_cases(
    data: web::Data<HttpState>,
    query: web::Query<ListCasesQuery>,
) -> Result<HttpResponse> {
    validate(&*query)?;
    let query = query.into_inner();
    let page = query.page.unwrap_or(DEFAULT_PAGE);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let filter = TestCaseFilter {
        area: query.area.filter(|area| !area.is_empty()),
        priority: query.priority,
    };

    let (cases, total) = data.cases.list_cases(&filter, page, limit).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::paginated(
        cases,
        Pagination::new(page, limit, total),
    )))
}

#[get("/cases/{id}")]
async fn get_case(data: web::Data<HttpState>, path: web::Path<String>) -> Result<HttpResponse> {
    let case_id = path.into_inner();
    let case = data
        .cases
        .get_case_with_steps(&case_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Test case not found".to_string()))?;
    Ok(ok(case))
}

#[post("/tests/generate/{id}")]
async fn generate_test(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let case_id = path.into_inner();
    let request: GenerateTestRequest = parse_optional_body(&body)?;
    data.logs
        .info(SOURCE, &format!("Generating test for case {case_id}"));

    let generated = data
        .execution
        .generate_test(&case_id, request.regenerate)
        .await?;
    Ok(ok(generated))
}

#[post("/tests/runs/{id}/execute")]
async fn execute_test(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let case_id = path.into_inner();
    let request: ExecuteTestRequest = parse_optional_body(&body)?;

    let run = data
        .execution
        .execute_test(&case_id, request.browser, request.env.as_deref())
        .await?;
    Ok(ok(ExecuteTestResponse { run_id: run.id }))
}

#[post("/tests/runs/{id}/finish")]
async fn finish_run(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    body: web::Json<FinishRunRequest>,
) -> Result<HttpResponse> {
    let run = data
        .execution
        .finish_run(&path.into_inner(), body.status)
        .await?;
    Ok(ok(run))
}

#[post("/tests/runs/{id}/usage")]
async fn record_token_usage(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    body: web::Json<TokenUsageRequest>,
) -> Result<HttpResponse> {
    validate(&*body)?;
    let run_id = path.into_inner();
    let usage = data
        .execution
        .record_token_usage(
            Some(&run_id),
            &body.model,
            body.prompt_tokens,
            body.completion_tokens,
            body.cost_usd,
        )
        .await?;
    Ok(ok(usage))
}

#[get("/tests/runs/{id}")]
async fn get_run(data: web::Data<HttpState>, path: web::Path<String>) -> Result<HttpResponse> {
    let details = data.execution.get_run(&path.into_inner()).await?;
    Ok(ok(details))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_cases)
        .service(get_case)
        .service(generate_test)
        .service(execute_test)
        .service(finish_run)
        .service(record_token_usage)
        .service(get_run);
}
