use crate::domain::error::{AppError, Result};
use crate::domain::test_run::{TestArtifact, TestRun, TokenUsage};
use sqlx::sqlite::SqlitePool;

pub struct TestRunRepository {
    pool: SqlitePool,
}

impl TestRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_artifact(&self, artifact: &TestArtifact) -> Result<()> {
        sqlx::query(
            "INSERT INTO test_artifacts (id, case_id, kind, path, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&artifact.id)
        .bind(&artifact.case_id)
        .bind(&artifact.kind)
        .bind(&artifact.path)
        .bind(&artifact.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert test artifact: {e}")))?;

        Ok(())
    }

    /// Newest first.
    pub async fn list_artifacts_for_case(&self, case_id: &str) -> Result<Vec<TestArtifact>> {
        let rows = sqlx::query_as::<_, TestArtifactEntity>(
            "SELECT id, case_id, kind, path, created_at
             FROM test_artifacts WHERE case_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list test artifacts: {e}")))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn insert_run(&self, run: &TestRun) -> Result<()> {
        sqlx::query(
            "INSERT INTO test_runs (id, case_id, started_at, finished_at, status, browser, env)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&run.id)
        .bind(&run.case_id)
        .bind(&run.started_at)
        .bind(&run.finished_at)
        .bind(&run.status)
        .bind(&run.browser)
        .bind(&run.env)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert test run: {e}")))?;

        Ok(())
    }

    pub async fn update_run_status(
        &self,
        run_id: &str,
        status: &str,
        finished_at: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE test_runs SET status = ?, finished_at = ? WHERE id = ?")
            .bind(status)
            .bind(finished_at)
            .bind(run_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update test run: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Test run not found: {run_id}")));
        }
        Ok(())
    }

    pub async fn get_run(&self, run_id: &str) -> Result<Option<TestRun>> {
        let run = sqlx::query_as::<_, TestRunEntity>(
            "SELECT id, case_id, started_at, finished_at, status, browser, env
             FROM test_runs WHERE id = ?",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch test run: {e}")))?;

        Ok(run.map(Into::into))
    }

    pub async fn record_token_usage(&self, usage: &TokenUsage) -> Result<()> {
        sqlx::query(
            "INSERT INTO token_usage (id, run_id, model, prompt_tokens, completion_tokens, cost_usd, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&usage.id)
        .bind(&usage.run_id)
        .bind(&usage.model)
        .bind(usage.prompt_tokens)
        .bind(usage.completion_tokens)
        .bind(usage.cost_usd)
        .bind(&usage.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to record token usage: {e}")))?;

        Ok(())
    }

    pub async fn list_token_usage(&self, run_id: &str) -> Result<Vec<TokenUsage>> {
        let rows = sqlx::query_as::<_, TokenUsageEntity>(
            "SELECT id, run_id, model, prompt_tokens, completion_tokens, cost_usd, created_at
             FROM token_usage WHERE run_id = ? ORDER BY created_at ASC",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list token usage: {e}")))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn total_cost_for_run(&self, run_id: &str) -> Result<f64> {
        sqlx::query_scalar::<_, f64>(
            "SELECT COALESCE(SUM(cost_usd), 0.0) FROM token_usage WHERE run_id = ?",
        )
        .bind(run_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to sum run cost: {e}")))
    }
}

#[derive(sqlx::FromRow)]
struct TestArtifactEntity {
    id: String,
    case_id: String,
    kind: String,
    path: String,
    created_at: String,
}

impl From<TestArtifactEntity> for TestArtifact {
    fn from(entity: TestArtifactEntity) -> Self {
        Self {
            id: entity.id,
            case_id: entity.case_id,
            kind: entity.kind,
            path: entity.path,
            created_at: entity.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TestRunEntity {
    id: String,
    case_id: String,
    started_at: String,
    finished_at: Option<String>,
    status: String,
    browser: String,
    env: String,
}

impl From<TestRunEntity> for TestRun {
    fn from(entity: TestRunEntity) -> Self {
        Self {
            id: entity.id,
            case_id: entity.case_id,
            started_at: entity.started_at,
            finished_at: entity.finished_at,
            status: entity.status,
            browser: entity.browser,
            env: entity.env,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TokenUsageEntity {
    id: String,
    run_id: Option<String>,
    model: String,
    prompt_tokens: i64,
    completion_tokens: i64,
    cost_usd: f64,
    created_at: String,
}

impl From<TokenUsageEntity> for TokenUsage {
    fn from(entity: TokenUsageEntity) -> Self {
        Self {
            id: entity.id,
            run_id: entity.run_id,
            model: entity.model,
            prompt_tokens: entity.prompt_tokens,
            completion_tokens: entity.completion_tokens,
            cost_usd: entity.cost_usd,
            created_at: entity.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_case::TestCase;
    use crate::infrastructure::db::sqlite::init_in_memory_db;
    use crate::infrastructure::db::test_cases::TestCaseRepository;

    async fn setup() -> TestRunRepository {
        let pool = init_in_memory_db().await.unwrap();
        TestCaseRepository::new(pool.clone())
            .upsert_case(&TestCase {
                id: "42".to_string(),
                title: "Login".to_string(),
                area: None,
                priority: None,
                last_synced_at: "2024-01-01T00:00:00.000Z".to_string(),
                source_rev: None,
            })
            .await
            .unwrap();
        TestRunRepository::new(pool)
    }

    fn run(id: &str, case_id: &str) -> TestRun {
        TestRun {
            id: id.to_string(),
            case_id: case_id.to_string(),
            started_at: "2024-01-01T00:00:00.000Z".to_string(),
            finished_at: None,
            status: "running".to_string(),
            browser: "chromium".to_string(),
            env: "dev".to_string(),
        }
    }

    fn usage(id: &str, run_id: Option<&str>, cost: f64) -> TokenUsage {
        TokenUsage {
            id: id.to_string(),
            run_id: run_id.map(str::to_string),
            model: "gpt-4o-mini".to_string(),
            prompt_tokens: 100,
            completion_tokens: 50,
            cost_usd: cost,
            created_at: format!("2024-01-01T00:00:0{id}.000Z"),
        }
    }

    #[tokio::test]
    async fn test_run_round_trip_and_status_update() {
        let repo = setup().await;
        repo.insert_run(&run("r1", "42")).await.unwrap();

        let stored = repo.get_run("r1").await.unwrap().unwrap();
        assert_eq!(stored, run("r1", "42"));

        repo.update_run_status("r1", "passed", Some("2024-01-01T00:01:00.000Z"))
            .await
            .unwrap();
        let stored = repo.get_run("r1").await.unwrap().unwrap();
        assert_eq!(stored.status, "passed");
        assert_eq!(stored.finished_at.as_deref(), Some("2024-01-01T00:01:00.000Z"));

        assert!(repo.get_run("nope").await.unwrap().is_none());
        assert!(matches!(
            repo.update_run_status("nope", "passed", None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_run_requires_existing_case() {
        let repo = setup().await;
        assert!(repo.insert_run(&run("r1", "missing")).await.is_err());
    }

    #[tokio::test]
    async fn test_artifacts_newest_first() {
        let repo = setup().await;
        for (id, created_at) in [("a1", "2024-01-01T00:00:00.000Z"), ("a2", "2024-01-02T00:00:00.000Z")] {
            repo.insert_artifact(&TestArtifact {
                id: id.to_string(),
                case_id: "42".to_string(),
                kind: "playwright".to_string(),
                path: "/e2e/tests/42.spec.ts".to_string(),
                created_at: created_at.to_string(),
            })
            .await
            .unwrap();
        }

        let artifacts = repo.list_artifacts_for_case("42").await.unwrap();
        let ids: Vec<&str> = artifacts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a2", "a1"]);
    }

    #[tokio::test]
    async fn test_token_usage_and_run_cost() {
        let repo = setup().await;
        repo.insert_run(&run("r1", "42")).await.unwrap();
        repo.record_token_usage(&usage("1", Some("r1"), 0.25)).await.unwrap();
        repo.record_token_usage(&usage("2", Some("r1"), 0.5)).await.unwrap();
        repo.record_token_usage(&usage("3", None, 9.0)).await.unwrap();

        let rows = repo.list_token_usage("r1").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "1");
        assert!((repo.total_cost_for_run("r1").await.unwrap() - 0.75).abs() < f64::EPSILON);
        assert_eq!(repo.total_cost_for_run("r2").await.unwrap(), 0.0);

        assert!(repo
            .record_token_usage(&usage("4", Some("missing-run"), 1.0))
            .await
            .is_err());
    }
}
