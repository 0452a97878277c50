use super::envelope::ok;
use super::{validate, HttpState};
use crate::domain::azure_devops::TestPlanQuery;
use crate::domain::error::{AppError, Result};
use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use validator::Validate;

const SOURCE: &str = "HttpApi";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionRequest {
    #[validate(url(message = "Organization URL must be a valid URL"))]
    pub org_url: String,
    #[validate(length(min = 1, message = "Project name is required"))]
    pub project: String,
    #[validate(length(min = 1, message = "Personal Access Token is required"))]
    pub pat: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProjectQuery {
    #[validate(length(min = 1, message = "Project ID is required"))]
    pub project_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TestPlansQuery {
    #[validate(length(min = 1, message = "Project ID is required"))]
    pub project_id: String,
    pub search: Option<String>,
    pub skip: Option<usize>,
    pub top: Option<usize>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TestSuitesQuery {
    #[validate(length(min = 1, message = "Project ID is required"))]
    pub project_id: String,
    #[validate(range(min = 1, message = "Test Plan ID must be a positive integer"))]
    pub test_plan_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    #[validate(length(min = 1, message = "Project ID is required"))]
    pub project_id: String,
    #[validate(range(min = 1, message = "Test Plan ID must be a positive integer"))]
    pub test_plan_id: i64,
    #[serde(default)]
    pub test_suite_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub update_existing: Option<bool>,
}

#[post("/azure-devops/test-connection")]
async fn test_connection(
    data: web::Data<HttpState>,
    body: web::Json<TestConnectionRequest>,
) -> Result<HttpResponse> {
    validate(&*body)?;
    let result = data
        .discovery
        .test_connection(&body.org_url, &body.project, &body.pat)
        .await?;
    data.logs.info(
        SOURCE,
        &format!(
            "Azure DevOps connection test completed (success: {})",
            result.success
        ),
    );
    Ok(ok(result))
}

#[get("/azure-devops/organizations")]
async fn list_organizations(data: web::Data<HttpState>) -> Result<HttpResponse> {
    Ok(ok(data.discovery.list_organizations()))
}

#[get("/azure-devops/projects")]
async fn list_projects(data: web::Data<HttpState>) -> Result<HttpResponse> {
    let projects = data.discovery.list_projects().await?;
    Ok(ok(projects))
}

#[get("/azure-devops/test-plans")]
async fn list_test_plans(
    data: web::Data<HttpState>,
    query: web::Query<TestPlansQuery>,
) -> Result<HttpResponse> {
    validate(&*query)?;
    let query = query.into_inner();
    let plan_query = TestPlanQuery {
        search: query.search.filter(|search| !search.trim().is_empty()),
        skip: query.skip,
        top: query.top,
    };
    let page = data
        .discovery
        .list_test_plans(&query.project_id, &plan_query)
        .await?;
    Ok(ok(page))
}

#[get("/azure-devops/test-plans/{id}")]
async fn get_test_plan(
    data: web::Data<HttpState>,
    path: web::Path<i64>,
    query: web::Query<ProjectQuery>,
) -> Result<HttpResponse> {
    validate(&*query)?;
    let plan = data
        .discovery
        .get_test_plan(&query.project_id, path.into_inner())
        .await?;
    Ok(ok(plan))
}

#[get("/azure-devops/test-suites")]
async fn list_test_suites(
    data: web::Data<HttpState>,
    query: web::Query<TestSuitesQuery>,
) -> Result<HttpResponse> {
    validate(&*query)?;
    let suites = data
        .discovery
        .list_test_suites(&query.project_id, query.test_plan_id)
        .await?;
    Ok(ok(suites))
}

#[post("/azure-devops/import")]
async fn import_test_cases(
    data: web::Data<HttpState>,
    body: web::Json<ImportRequest>,
) -> Result<HttpResponse> {
    validate(&*body)?;
    let request = body.into_inner();
    if let Some(ids) = &request.test_suite_ids {
        if ids.iter().any(|id| *id < 1) {
            return Err(AppError::ValidationError(
                "Each Test Suite ID must be a positive integer".to_string(),
            ));
        }
    }

    let result = data
        .import
        .import_test_cases(
            &request.project_id,
            request.test_plan_id,
            request.test_suite_ids.as_deref(),
            request.update_existing.unwrap_or(true),
        )
        .await?;
    Ok(ok(result))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(test_connection)
        .service(list_organizations)
        .service(list_projects)
        .service(list_test_plans)
        .service(get_test_plan)
        .service(list_test_suites)
        .service(import_test_cases);
}
