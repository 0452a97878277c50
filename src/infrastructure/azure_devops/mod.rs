pub mod client;
pub mod step_parser;

use crate::domain::azure_devops::{AdoTestCaseRef, AdoTestSuite, AdoWorkItem};
use crate::domain::error::Result;
use async_trait::async_trait;

pub use client::AzureDevOpsClient;

/// The slice of the remote test-management API the importer walks.
#[async_trait]
pub trait TestManagementSource: Send + Sync {
    async fn list_test_suites(&self, project_id: &str, test_plan_id: i64)
        -> Result<Vec<AdoTestSuite>>;

    async fn list_test_cases(
        &self,
        project_id: &str,
        test_plan_id: i64,
        test_suite_id: i64,
    ) -> Result<Vec<AdoTestCaseRef>>;

    async fn get_test_case_details(&self, project_id: &str, test_case_id: i64)
        -> Result<AdoWorkItem>;
}
