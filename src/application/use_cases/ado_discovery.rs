use crate::domain::azure_devops::{
    AdoProject, AdoTestPlan, AdoTestSuite, ConnectionTest, Organization, TestPlanPage,
    TestPlanQuery,
};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::azure_devops::{AzureDevOpsClient, TestManagementSource};
use crate::infrastructure::config::AzureDevOpsConfig;
use crate::infrastructure::logging::LogSink;
use std::sync::Arc;

/// Read-only browsing of the configured organization.
pub struct DiscoveryUseCase {
    client: Arc<AzureDevOpsClient>,
    logs: LogSink,
}

impl DiscoveryUseCase {
    pub fn new(client: Arc<AzureDevOpsClient>, logs: LogSink) -> Self {
        Self { client, logs }
    }

    /// Probes credentials supplied by the caller with a throwaway client; the configured
    /// client is never touched.
    pub async fn test_connection(
        &self,
        organization_url: &str,
        project: &str,
        personal_access_token: &str,
    ) -> Result<ConnectionTest> {
        let config = AzureDevOpsConfig::new(organization_url, project, personal_access_token);
        if config.project.is_empty() {
            return Err(AppError::ValidationError("Project is required".to_string()));
        }
        if config.personal_access_token.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Personal Access Token is required".to_string(),
            ));
        }

        let probe = AzureDevOpsClient::new(config, self.logs.clone())?;
        Ok(probe.test_connection().await)
    }

    pub fn list_organizations(&self) -> Vec<Organization> {
        self.client.list_organizations()
    }

    pub async fn list_projects(&self) -> Result<Vec<AdoProject>> {
        self.client.list_projects().await
    }

    pub async fn list_test_plans(
        &self,
        project_id: &str,
        query: &TestPlanQuery,
    ) -> Result<TestPlanPage> {
        let project_id = require_project(project_id)?;
        self.client.list_test_plans(project_id, query).await
    }

    pub async fn get_test_plan(&self, project_id: &str, test_plan_id: i64) -> Result<AdoTestPlan> {
        let project_id = require_project(project_id)?;
        require_plan(test_plan_id)?;
        self.client
            .get_test_plan(project_id, test_plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Test plan {test_plan_id} not found")))
    }

    pub async fn list_test_suites(
        &self,
        project_id: &str,
        test_plan_id: i64,
    ) -> Result<Vec<AdoTestSuite>> {
        let project_id = require_project(project_id)?;
        require_plan(test_plan_id)?;
        self.client.list_test_suites(project_id, test_plan_id).await
    }
}

fn require_project(project_id: &str) -> Result<&str> {
    let project_id = project_id.trim();
    if project_id.is_empty() {
        return Err(AppError::ValidationError("Project ID is required".to_string()));
    }
    Ok(project_id)
}

fn require_plan(test_plan_id: i64) -> Result<()> {
    if test_plan_id < 1 {
        return Err(AppError::ValidationError(
            "Test Plan ID must be a positive integer".to_string(),
        ));
    }
    Ok(())
}
