use super::TestManagementSource;
use crate::domain::azure_devops::{
    AdoList, AdoProject, AdoTestCaseRef, AdoTestPlan, AdoTestSuite, AdoWorkItem,
    ConnectionPermissions, ConnectionTest, Organization, TestPlanPage, TestPlanQuery,
    DEFAULT_PLAN_PAGE_SIZE,
};
use crate::domain::error::{AppError, RemoteError, RemoteErrorKind, Result};
use crate::infrastructure::config::AzureDevOpsConfig;
use crate::infrastructure::logging::LogSink;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

const API_VERSION: &str = "6.0";
const PLAN_LIST_API_VERSION: &str = "7.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const LOG_SOURCE: &str = "AzureDevOps";

pub struct AzureDevOpsClient {
    client: reqwest::Client,
    config: AzureDevOpsConfig,
    auth_header: String,
    logs: LogSink,
}

impl AzureDevOpsClient {
    pub fn new(config: AzureDevOpsConfig, logs: LogSink) -> Result<Self> {
        Url::parse(&config.organization_url).map_err(|e| {
            AppError::ValidationError(format!(
                "Organization URL `{}` is not a valid URL: {}",
                config.organization_url, e
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let auth_header = format!(
            "Basic {}",
            BASE64.encode(format!(":{}", config.personal_access_token))
        );

        Ok(Self {
            client,
            config,
            auth_header,
            logs,
        })
    }

    /// Both calls run concurrently; success means the PAT can read the organization and the
    /// project. Failures come back as `success: false` rather than an error.
    pub async fn test_connection(&self) -> ConnectionTest {
        let result = tokio::try_join!(self.organization_info(), self.project_info());
        match result {
            Ok((organization, project)) => ConnectionTest {
                success: true,
                organization_name: Some(organization.name),
                project_name: Some(project.name),
                error: None,
                permissions: Some(ConnectionPermissions {
                    can_read_projects: true,
                    can_read_test_plans: true,
                    can_read_test_cases: true,
                }),
            },
            Err(err) => {
                self.logs.error(
                    LOG_SOURCE,
                    &format!("Azure DevOps connection test failed: {}", err),
                );
                ConnectionTest {
                    success: false,
                    organization_name: None,
                    project_name: None,
                    error: Some(remote_message(&err)),
                    permissions: None,
                }
            }
        }
    }

    /// Derived from the configured URL; Azure DevOps has no PAT-scoped listing for this.
    pub fn list_organizations(&self) -> Vec<Organization> {
        vec![Organization {
            name: organization_name(&self.config.organization_url),
            url: self.config.organization_url.clone(),
        }]
    }

    pub async fn list_projects(&self) -> Result<Vec<AdoProject>> {
        let url = self.endpoint(None, &["projects"], API_VERSION, &[])?;
        let list: AdoList<AdoProject> = self.fetch("fetch projects", url).await?;
        Ok(list.value)
    }

    /// `Ok(None)` when the plan does not exist.
    pub async fn get_test_plan(
        &self,
        project_id: &str,
        test_plan_id: i64,
    ) -> Result<Option<AdoTestPlan>> {
        let plan_id = test_plan_id.to_string();
        let url = self.endpoint(
            Some(project_id),
            &["testplan", "plans", plan_id.as_str()],
            API_VERSION,
            &[],
        )?;
        match self.fetch::<AdoTestPlan>("fetch test plan", url).await {
            Ok(plan) => Ok(Some(plan)),
            Err(err) if err.is_remote_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// The plans endpoint has no server-side paging, so the whole set is fetched, filtered,
    /// sorted newest-first and sliced here.
    pub async fn list_test_plans(
        &self,
        project_id: &str,
        query: &TestPlanQuery,
    ) -> Result<TestPlanPage> {
        let url = self.endpoint(
            Some(project_id),
            &["testplan", "plans"],
            PLAN_LIST_API_VERSION,
            &[("includePlanDetails", "true")],
        )?;
        let list: AdoList<AdoTestPlan> = self.fetch("fetch test plans", url).await?;
        Ok(paginate_plans(list.value, query))
    }

    fn endpoint(
        &self,
        project_id: Option<&str>,
        segments: &[&str],
        api_version: &str,
        query: &[(&str, &str)],
    ) -> Result<Url> {
        let mut url = Url::parse(&self.config.organization_url)
            .map_err(|e| AppError::ValidationError(format!("Invalid organization URL: {}", e)))?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                AppError::ValidationError("Organization URL cannot carry a path".to_string())
            })?;
            path.pop_if_empty();
            if let Some(project) = project_id {
                path.push(project);
            }
            path.push("_apis");
            path.extend(segments);
        }
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("api-version", api_version);
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, operation: &str, url: Url) -> Result<T> {
        match self.get_json(url).await {
            Ok(value) => Ok(value),
            Err(err) => {
                self.logs
                    .error(LOG_SOURCE, &format!("Failed to {}: {}", operation, err));
                Err(err)
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, &self.auth_header)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                RemoteError::network(format!("Network error connecting to Azure DevOps: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::from_response(status.as_u16(), body).into());
        }

        response.json::<T>().await.map_err(|e| {
            AppError::Remote(RemoteError {
                kind: RemoteErrorKind::Validation,
                status: status.as_u16(),
                message: format!("Unexpected Azure DevOps response: {}", e),
            })
        })
    }

    async fn organization_info(&self) -> Result<Organization> {
        let url = self.endpoint(None, &["connectionData"], API_VERSION, &[])?;
        let _: serde_json::Value = self.get_json(url).await?;
        Ok(self
            .list_organizations()
            .into_iter()
            .next()
            .unwrap_or_else(|| Organization {
                name: "Unknown".to_string(),
                url: self.config.organization_url.clone(),
            }))
    }

    async fn project_info(&self) -> Result<AdoProject> {
        let url = self.endpoint(None, &["projects", self.config.project.as_str()], API_VERSION, &[])?;
        self.get_json(url).await
    }
}

#[async_trait]
impl TestManagementSource for AzureDevOpsClient {
    async fn list_test_suites(
        &self,
        project_id: &str,
        test_plan_id: i64,
    ) -> Result<Vec<AdoTestSuite>> {
        let plan_id = test_plan_id.to_string();
        let url = self.endpoint(
            Some(project_id),
            &["testplan", "Plans", plan_id.as_str(), "suites"],
            API_VERSION,
            &[],
        )?;
        let list: AdoList<AdoTestSuite> = self.fetch("fetch test suites", url).await?;
        Ok(list.value)
    }

    async fn list_test_cases(
        &self,
        project_id: &str,
        test_plan_id: i64,
        test_suite_id: i64,
    ) -> Result<Vec<AdoTestCaseRef>> {
        let plan_id = test_plan_id.to_string();
        let suite_id = test_suite_id.to_string();
        let url = self.endpoint(
            Some(project_id),
            &["testplan", "Plans", plan_id.as_str(), "Suites", suite_id.as_str(), "TestCase"],
            API_VERSION,
            &[],
        )?;
        let list: AdoList<AdoTestCaseRef> = self.fetch("fetch test cases", url).await?;
        Ok(list.value)
    }

    async fn get_test_case_details(
        &self,
        project_id: &str,
        test_case_id: i64,
    ) -> Result<AdoWorkItem> {
        let case_id = test_case_id.to_string();
        let url = self.endpoint(
            Some(project_id),
            &["wit", "workitems", case_id.as_str()],
            API_VERSION,
            &[("$expand", "all")],
        )?;
        self.fetch("fetch test case details", url).await
    }
}

/// Last path segment of the organization URL, e.g. `contoso` for
/// `https://dev.azure.com/contoso`.
pub fn organization_name(organization_url: &str) -> String {
    organization_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

pub fn paginate_plans(plans: Vec<AdoTestPlan>, query: &TestPlanQuery) -> TestPlanPage {
    let skip = query.skip.unwrap_or(0);
    let top = query.top.unwrap_or(DEFAULT_PLAN_PAGE_SIZE);
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut plans: Vec<AdoTestPlan> = match needle {
        Some(needle) => plans
            .into_iter()
            .filter(|plan| plan.name.to_lowercase().contains(&needle))
            .collect(),
        None => plans,
    };
    plans.sort_by(|a, b| b.id.cmp(&a.id));

    let total_count = plans.len();
    let test_plans = plans.into_iter().skip(skip).take(top).collect();
    TestPlanPage {
        test_plans,
        total_count,
        skip,
        top,
    }
}

fn remote_message(err: &AppError) -> String {
    match err {
        AppError::Remote(remote) => remote.message.clone(),
        other => other.to_string(),
    }
}
