use crate::domain::error::{AppError, Result};
use crate::domain::test_run::{
    ArtifactKind, Browser, GeneratedTest, RunDetails, RunStatus, TestArtifact, TestRun,
    TokenUsage,
};
use crate::infrastructure::db::{TestCaseRepository, TestRunRepository};
use crate::infrastructure::logging::LogSink;
use crate::shared::time::now_iso;
use std::sync::Arc;
use uuid::Uuid;

const LOG_SOURCE: &str = "TestExecution";
pub const DEFAULT_RUN_ENV: &str = "dev";

/// Test generation and execution bookkeeping. Generation and execution themselves are
/// placeholders: only the artifacts, runs and token usage rows are real.
pub struct TestExecutionUseCase {
    cases: Arc<TestCaseRepository>,
    runs: Arc<TestRunRepository>,
    logs: LogSink,
    cost_ceiling_run_usd: f64,
}

impl TestExecutionUseCase {
    pub fn new(
        cases: Arc<TestCaseRepository>,
        runs: Arc<TestRunRepository>,
        logs: LogSink,
        cost_ceiling_run_usd: f64,
    ) -> Self {
        Self {
            cases,
            runs,
            logs,
            cost_ceiling_run_usd,
        }
    }

    pub async fn generate_test(&self, case_id: &str, regenerate: bool) -> Result<GeneratedTest> {
        self.require_case(case_id).await?;

        let artifact = TestArtifact {
            id: Uuid::new_v4().to_string(),
            case_id: case_id.to_string(),
            kind: ArtifactKind::Playwright.as_str().to_string(),
            path: format!("/e2e/tests/{case_id}.spec.ts"),
            created_at: now_iso(),
        };
        self.runs.insert_artifact(&artifact).await?;
        self.logs.info(
            LOG_SOURCE,
            &format!(
                "Generated placeholder test {} for case {case_id} (regenerate: {regenerate})",
                artifact.id
            ),
        );

        Ok(GeneratedTest {
            artifact_id: artifact.id,
            tokens_used: 0,
            cost_usd: 0.0,
        })
    }

    pub async fn execute_test(
        &self,
        case_id: &str,
        browser: Browser,
        env: Option<&str>,
    ) -> Result<TestRun> {
        self.require_case(case_id).await?;

        let env = env
            .map(str::trim)
            .filter(|env| !env.is_empty())
            .unwrap_or(DEFAULT_RUN_ENV);
        let run = TestRun {
            id: Uuid::new_v4().to_string(),
            case_id: case_id.to_string(),
            started_at: now_iso(),
            finished_at: None,
            status: RunStatus::Running.as_str().to_string(),
            browser: browser.as_str().to_string(),
            env: env.to_string(),
        };
        self.runs.insert_run(&run).await?;
        self.logs.info(
            LOG_SOURCE,
            &format!("Started run {} for case {case_id} on {}", run.id, run.browser),
        );
        Ok(run)
    }

    pub async fn finish_run(&self, run_id: &str, status: RunStatus) -> Result<TestRun> {
        if status == RunStatus::Running {
            return Err(AppError::ValidationError(
                "A run cannot be finished as running".to_string(),
            ));
        }
        let finished_at = now_iso();
        self.runs
            .update_run_status(run_id, status.as_str(), Some(&finished_at))
            .await?;
        let run = self.require_run(run_id).await?;
        self.logs.info(
            LOG_SOURCE,
            &format!("Run {run_id} finished with status {}", run.status),
        );
        Ok(run)
    }

    /// Stores one model call against a run. Crossing the per-run ceiling is logged, not
    /// rejected, since the tokens are already spent.
    pub async fn record_token_usage(
        &self,
        run_id: Option<&str>,
        model: &str,
        prompt_tokens: i64,
        completion_tokens: i64,
        cost_usd: f64,
    ) -> Result<TokenUsage> {
        if prompt_tokens < 0 || completion_tokens < 0 || cost_usd.is_nan() || cost_usd < 0.0 {
            return Err(AppError::ValidationError(
                "Token counts and cost must not be negative".to_string(),
            ));
        }
        if let Some(run_id) = run_id {
            self.require_run(run_id).await?;
        }

        let usage = TokenUsage {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.map(str::to_string),
            model: model.to_string(),
            prompt_tokens,
            completion_tokens,
            cost_usd,
            created_at: now_iso(),
        };
        self.runs.record_token_usage(&usage).await?;

        if let Some(run_id) = run_id {
            let total = self.runs.total_cost_for_run(run_id).await?;
            if total > self.cost_ceiling_run_usd {
                self.logs.warn(
                    LOG_SOURCE,
                    &format!(
                        "Run {run_id} cost ${total:.4} exceeds the ${:.2} ceiling",
                        self.cost_ceiling_run_usd
                    ),
                );
            }
        }
        Ok(usage)
    }

    pub async fn get_run(&self, run_id: &str) -> Result<RunDetails> {
        let run = self.require_run(run_id).await?;

        let (artifacts, token_usage, total_cost_usd) = tokio::try_join!(
            self.runs.list_artifacts_for_case(&run.case_id),
            self.runs.list_token_usage(run_id),
            self.runs.total_cost_for_run(run_id),
        )?;

        Ok(RunDetails {
            run,
            artifacts,
            token_usage,
            total_cost_usd,
        })
    }

    async fn require_run(&self, run_id: &str) -> Result<TestRun> {
        self.runs
            .get_run(run_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Test run not found: {run_id}")))
    }

    async fn require_case(&self, case_id: &str) -> Result<()> {
        match self.cases.find_case_by_id(case_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("Test case not found: {case_id}"))),
        }
    }
}
