use crate::domain::azure_devops::{AdoTestCaseRef, AdoTestSuite, ImportProgress, ImportResult};
use crate::domain::error::{AppError, Result};
use crate::domain::test_case::{TestCase, TestStep, UpsertOutcome};
use crate::infrastructure::azure_devops::step_parser::parse_steps;
use crate::infrastructure::azure_devops::TestManagementSource;
use crate::infrastructure::db::TestCaseRepository;
use crate::infrastructure::logging::LogSink;
use crate::shared::time::now_iso;
use std::sync::Arc;

const LOG_SOURCE: &str = "Import";

pub struct ImportUseCase {
    source: Arc<dyn TestManagementSource>,
    repository: Arc<TestCaseRepository>,
    logs: LogSink,
}

/// What happened to one remote case.
enum CaseOutcome {
    Stored(UpsertOutcome),
    Skipped,
}

impl ImportUseCase {
    pub fn new(
        source: Arc<dyn TestManagementSource>,
        repository: Arc<TestCaseRepository>,
        logs: LogSink,
    ) -> Self {
        Self {
            source,
            repository,
            logs,
        }
    }

    /// Walks the selected suites of a plan and mirrors every listed case locally.
    ///
    /// Only the initial suite listing can fail the call. Afterwards a suite whose case list
    /// cannot be fetched is logged and skipped, and a failing case is recorded in the
    /// progress errors while the walk continues.
    pub async fn import_test_cases(
        &self,
        project_id: &str,
        test_plan_id: i64,
        test_suite_ids: Option<&[i64]>,
        update_existing: bool,
    ) -> Result<ImportResult> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(AppError::ValidationError("Project ID is required".to_string()));
        }
        if test_plan_id < 1 {
            return Err(AppError::ValidationError(
                "Test Plan ID must be a positive integer".to_string(),
            ));
        }

        self.logs.info(
            LOG_SOURCE,
            &format!(
                "Starting import of plan {test_plan_id} in {project_id} (suites: {test_suite_ids:?}, update existing: {update_existing})"
            ),
        );

        let suites = self
            .source
            .list_test_suites(project_id, test_plan_id)
            .await?;
        let suites = select_suites(suites, test_suite_ids);

        let mut progress = ImportProgress::start(now_iso());
        progress.total_test_cases = suites.iter().fold(0u64, |total, suite| {
            total.saturating_add(u64::from(suite.test_case_count))
        });

        for suite in &suites {
            let cases = match self
                .source
                .list_test_cases(project_id, test_plan_id, suite.id)
                .await
            {
                Ok(cases) => cases,
                Err(err) => {
                    self.logs.error(
                        LOG_SOURCE,
                        &format!("Failed to process test suite {}: {err}", suite.id),
                    );
                    continue;
                }
            };

            for case_ref in &cases {
                progress.processed_test_cases += 1;
                match self.import_case(project_id, case_ref, update_existing).await {
                    Ok(CaseOutcome::Stored(UpsertOutcome::Inserted)) => {
                        progress.imported_test_cases += 1
                    }
                    Ok(CaseOutcome::Stored(UpsertOutcome::Updated)) => {
                        progress.updated_test_cases += 1
                    }
                    Ok(CaseOutcome::Skipped) => progress.skipped_test_cases += 1,
                    Err(err) => {
                        self.logs.error(
                            LOG_SOURCE,
                            &format!("Failed to import test case {}: {err}", case_ref.id),
                        );
                        progress.record_failure(case_ref.id, err.to_string());
                    }
                }
            }
        }

        progress.finish(now_iso());
        let message = progress.summary();
        self.logs.info(LOG_SOURCE, &message);

        Ok(ImportResult {
            success: progress.is_success(),
            progress,
            message,
        })
    }

    async fn import_case(
        &self,
        project_id: &str,
        case_ref: &AdoTestCaseRef,
        update_existing: bool,
    ) -> Result<CaseOutcome> {
        let detail = self
            .source
            .get_test_case_details(project_id, case_ref.id)
            .await?;
        let parsed = parse_steps(detail.steps_html());

        let case_id = case_ref.id.to_string();
        let existing = self.repository.find_case_by_id(&case_id).await?;
        if existing.is_some() && !update_existing {
            return Ok(CaseOutcome::Skipped);
        }

        let fields = &detail.fields;
        let case = TestCase {
            id: case_id.clone(),
            title: fields.title.clone().unwrap_or_default(),
            area: fields.area_path.clone().filter(|area| !area.is_empty()),
            priority: fields.priority.filter(|priority| *priority != 0),
            last_synced_at: now_iso(),
            source_rev: detail.revision(),
        };
        let steps: Vec<TestStep> = parsed
            .iter()
            .map(|step| TestStep::from_parsed(&case_id, step))
            .collect();

        let outcome = self.repository.sync_case(&case, &steps).await?;
        Ok(CaseOutcome::Stored(outcome))
    }
}

/// Keeps remote order; ids that match no suite are ignored.
fn select_suites(suites: Vec<AdoTestSuite>, wanted: Option<&[i64]>) -> Vec<AdoTestSuite> {
    match wanted {
        Some(ids) => suites
            .into_iter()
            .filter(|suite| ids.contains(&suite.id))
            .collect(),
        None => suites,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::azure_devops::{AdoWorkItem, AdoWorkItemFields, ImportStatus};
    use crate::domain::error::{RemoteError, RemoteErrorKind};
    use crate::infrastructure::db::sqlite::init_in_memory_db;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Scripted remote: suites, per-suite case lists, per-case work items. Anything not
    /// scripted answers with a 404.
    #[derive(Default)]
    struct FakeSource {
        suites: Option<Vec<AdoTestSuite>>,
        cases: HashMap<i64, Vec<i64>>,
        items: HashMap<i64, AdoWorkItem>,
    }

    impl FakeSource {
        fn suite(mut self, id: i64, reported: u32, case_ids: &[i64]) -> Self {
            self.suites.get_or_insert_with(Vec::new).push(AdoTestSuite {
                id,
                name: format!("Suite {id}"),
                plan: None,
                parent_suite: None,
                suite_type: None,
                has_children: false,
                test_case_count: reported,
            });
            self.cases.insert(id, case_ids.to_vec());
            self
        }

        fn broken_suite(mut self, id: i64, reported: u32) -> Self {
            self = self.suite(id, reported, &[]);
            self.cases.remove(&id);
            self
        }

        fn item(mut self, id: i64, title: &str, steps: &str) -> Self {
            self.items.insert(
                id,
                AdoWorkItem {
                    id,
                    rev: Some(3),
                    fields: AdoWorkItemFields {
                        title: Some(title.to_string()),
                        area_path: Some("Proj\\Web".to_string()),
                        priority: Some(2),
                        steps: Some(steps.to_string()),
                        ..AdoWorkItemFields::default()
                    },
                },
            );
            self
        }
    }

    fn not_found(what: &str) -> AppError {
        AppError::Remote(RemoteError {
            kind: RemoteErrorKind::NotFound,
            status: 404,
            message: format!("{what} not found"),
        })
    }

    #[async_trait]
    impl TestManagementSource for FakeSource {
        async fn list_test_suites(&self, _: &str, _: i64) -> Result<Vec<AdoTestSuite>> {
            self.suites.clone().ok_or_else(|| not_found("plan"))
        }

        async fn list_test_cases(&self, _: &str, _: i64, suite_id: i64) -> Result<Vec<AdoTestCaseRef>> {
            self.cases
                .get(&suite_id)
                .map(|ids| {
                    ids.iter()
                        .map(|id| AdoTestCaseRef { id: *id, name: None })
                        .collect()
                })
                .ok_or_else(|| not_found("suite"))
        }

        async fn get_test_case_details(&self, _: &str, case_id: i64) -> Result<AdoWorkItem> {
            self.items
                .get(&case_id)
                .cloned()
                .ok_or_else(|| not_found("work item"))
        }
    }

    const TWO_STEPS: &str =
        "<table><tr><td>Open app</td><td>App opens</td></tr><tr><td>Log in</td><td></td></tr></table>";

    async fn setup(source: FakeSource) -> (ImportUseCase, Arc<TestCaseRepository>) {
        let repository = Arc::new(TestCaseRepository::new(init_in_memory_db().await.unwrap()));
        let use_case = ImportUseCase::new(Arc::new(source), repository.clone(), LogSink::new());
        (use_case, repository)
    }

    fn assert_accounting(progress: &ImportProgress) {
        assert_eq!(
            progress.processed_test_cases,
            progress.imported_test_cases
                + progress.updated_test_cases
                + progress.skipped_test_cases
                + progress.failed_test_cases
        );
    }

    #[tokio::test]
    async fn test_end_to_end_two_cases() {
        let source = FakeSource::default()
            .suite(10, 2, &[101, 102])
            .item(101, "Login works", TWO_STEPS)
            .item(102, "Logout works", "");
        let (use_case, repository) = setup(source).await;

        let result = use_case
            .import_test_cases("proj", 1, None, true)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.progress.status, ImportStatus::Completed);
        assert!(result.progress.completed_at.is_some());
        assert_eq!(result.progress.total_test_cases, 2);
        assert_eq!(result.progress.processed_test_cases, 2);
        assert_eq!(result.progress.imported_test_cases, 2);
        assert_eq!(
            result.message,
            "Import completed: 2 imported, 0 updated, 0 skipped, 0 failed"
        );

        let stored = repository.get_case_with_steps("101").await.unwrap().unwrap();
        assert_eq!(stored.case.title, "Login works");
        assert_eq!(stored.case.area.as_deref(), Some("Proj\\Web"));
        assert_eq!(stored.case.priority, Some(2));
        assert_eq!(stored.case.source_rev.as_deref(), Some("3"));
        assert_eq!(stored.steps.len(), 2);
        assert_eq!(stored.steps[0].id, "101-1");
        assert_eq!(stored.steps[0].expected.as_deref(), Some("App opens"));
        assert_eq!(stored.steps[1].step_index, 2);
        assert_eq!(stored.steps[1].expected, None);

        let empty = repository.get_case_with_steps("102").await.unwrap().unwrap();
        assert!(empty.steps.is_empty());
    }

    #[tokio::test]
    async fn test_reimport_updates_and_skip_keeps_steps() {
        let source = FakeSource::default()
            .suite(10, 1, &[101])
            .item(101, "Login works", TWO_STEPS);
        let (use_case, repository) = setup(source).await;

        use_case.import_test_cases("proj", 1, None, true).await.unwrap();
        let again = use_case.import_test_cases("proj", 1, None, true).await.unwrap();
        assert_eq!(again.progress.updated_test_cases, 1);
        assert_eq!(again.progress.imported_test_cases, 0);

        let before = repository.get_case_with_steps("101").await.unwrap().unwrap();
        let skipped = use_case.import_test_cases("proj", 1, None, false).await.unwrap();
        assert!(skipped.success);
        assert_eq!(skipped.progress.skipped_test_cases, 1);
        assert_accounting(&skipped.progress);

        let after = repository.get_case_with_steps("101").await.unwrap().unwrap();
        assert_eq!(before.case.last_synced_at, after.case.last_synced_at);
        assert_eq!(after.steps, before.steps);
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let source = FakeSource::default()
            .suite(10, 3, &[101, 999, 102])
            .item(101, "One", TWO_STEPS)
            .item(102, "Two", TWO_STEPS);
        let (use_case, repository) = setup(source).await;

        let result = use_case.import_test_cases("proj", 1, None, true).await.unwrap();

        assert!(result.success);
        assert_eq!(result.progress.imported_test_cases, 2);
        assert_eq!(result.progress.failed_test_cases, 1);
        assert_eq!(result.progress.errors.len(), 1);
        assert_eq!(result.progress.errors[0].test_case_id, 999);
        assert!(result.progress.errors[0].error.contains("not found"));
        assert_accounting(&result.progress);
        assert!(repository.find_case_by_id("102").await.unwrap().is_some());
        assert!(repository.find_case_by_id("999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_failed_is_not_success() {
        let source = FakeSource::default().suite(10, 2, &[1, 2]);
        let (use_case, _) = setup(source).await;

        let result = use_case.import_test_cases("proj", 1, None, true).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.progress.failed_test_cases, 2);
        assert_accounting(&result.progress);
    }

    #[tokio::test]
    async fn test_empty_plan_is_success() {
        let (use_case, _) = setup(FakeSource::default().suite(10, 0, &[])).await;
        let result = use_case.import_test_cases("proj", 1, None, true).await.unwrap();
        assert!(result.success);
        assert_eq!(result.progress.processed_test_cases, 0);
    }

    #[tokio::test]
    async fn test_broken_suite_is_skipped_without_counting() {
        let source = FakeSource::default()
            .broken_suite(10, 4)
            .suite(11, 1, &[101])
            .item(101, "One", "");
        let (use_case, _) = setup(source).await;

        let result = use_case.import_test_cases("proj", 1, None, true).await.unwrap();
        assert!(result.success);
        assert_eq!(result.progress.total_test_cases, 5);
        assert_eq!(result.progress.processed_test_cases, 1);
        assert!(result.progress.errors.is_empty());
    }

    #[tokio::test]
    async fn test_suite_filter_and_reported_totals() {
        let source = FakeSource::default()
            .suite(10, 7, &[101])
            .suite(11, 3, &[102])
            .item(101, "One", "")
            .item(102, "Two", "");
        let (use_case, repository) = setup(source).await;

        let result = use_case
            .import_test_cases("proj", 1, Some(&[11, 404]), true)
            .await
            .unwrap();
        assert_eq!(result.progress.total_test_cases, 3);
        assert_eq!(result.progress.processed_test_cases, 1);
        assert!(repository.find_case_by_id("101").await.unwrap().is_none());
        assert!(repository.find_case_by_id("102").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_huge_reported_counts_do_not_overflow_total() {
        let source = FakeSource::default()
            .suite(10, u32::MAX, &[])
            .suite(11, u32::MAX, &[]);
        let (use_case, _) = setup(source).await;

        let result = use_case
            .import_test_cases("proj", 1, None, true)
            .await
            .unwrap();
        assert_eq!(result.progress.total_test_cases, 2 * u64::from(u32::MAX));
        assert_eq!(result.progress.processed_test_cases, 0);
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_suite_listing_failure_fails_the_call() {
        let (use_case, _) = setup(FakeSource::default()).await;
        let err = use_case
            .import_test_cases("proj", 1, None, true)
            .await
            .unwrap_err();
        assert!(err.is_remote_not_found());
    }

    #[tokio::test]
    async fn test_rejects_bad_arguments() {
        let (use_case, _) = setup(FakeSource::default()).await;
        assert!(matches!(
            use_case.import_test_cases("  ", 1, None, true).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            use_case.import_test_cases("proj", 0, None, true).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_fields_are_stored_as_null() {
        let mut source = FakeSource::default().suite(10, 1, &[7]);
        source.items.insert(
            7,
            AdoWorkItem {
                id: 7,
                rev: None,
                fields: AdoWorkItemFields {
                    area_path: Some(String::new()),
                    priority: Some(0),
                    ..AdoWorkItemFields::default()
                },
            },
        );
        let (use_case, repository) = setup(source).await;

        use_case.import_test_cases("proj", 1, None, true).await.unwrap();
        let stored = repository.find_case_by_id("7").await.unwrap().unwrap();
        assert_eq!(stored.title, "");
        assert_eq!(stored.area, None);
        assert_eq!(stored.priority, None);
        assert_eq!(stored.source_rev, None);
    }
}
