use crate::domain::error::{AppError, Result};
use crate::domain::test_case::{
    TestCase, TestCaseFilter, TestCaseWithSteps, TestStep, UpsertOutcome,
};
use sqlx::sqlite::{SqliteConnection, SqlitePool};

pub struct TestCaseRepository {
    pool: SqlitePool,
}

impl TestCaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_case_by_id(&self, case_id: &str) -> Result<Option<TestCase>> {
        let case = sqlx::query_as::<_, TestCaseEntity>(
            "SELECT id, title, area, priority, last_synced_at, source_rev
             FROM test_cases WHERE id = ?",
        )
        .bind(case_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch test case: {e}")))?;

        Ok(case.map(Into::into))
    }

    /// Inserts the case, or overwrites every mutable column of the existing row.
    /// Standalone half of `sync_case`; the importer always goes through `sync_case`.
    #[allow(dead_code)]
    pub(crate) async fn upsert_case(&self, case: &TestCase) -> Result<UpsertOutcome> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to acquire connection: {e}")))?;
        upsert_case_on(&mut conn, case).await
    }

    /// Deletes every stored step of the case and inserts `steps` in their place.
    /// Standalone half of `sync_case`, in its own transaction.
    #[allow(dead_code)]
    pub(crate) async fn replace_steps(&self, case_id: &str, steps: &[TestStep]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to start step tx: {e}")))?;
        replace_steps_on(&mut tx, case_id, steps).await?;
        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit steps: {e}")))
    }

    /// Case upsert and step replacement as one transaction.
    pub async fn sync_case(&self, case: &TestCase, steps: &[TestStep]) -> Result<UpsertOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to start sync tx: {e}")))?;
        let outcome = upsert_case_on(&mut tx, case).await?;
        replace_steps_on(&mut tx, &case.id, steps).await?;
        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit test case: {e}")))?;
        Ok(outcome)
    }

    pub async fn list_steps(&self, case_id: &str) -> Result<Vec<TestStep>> {
        let steps = sqlx::query_as::<_, TestStepEntity>(
            "SELECT id, case_id, step_index, action, expected
             FROM test_steps WHERE case_id = ? ORDER BY step_index ASC",
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list test steps: {e}")))?;

        Ok(steps.into_iter().map(Into::into).collect())
    }

    pub async fn get_case_with_steps(&self, case_id: &str) -> Result<Option<TestCaseWithSteps>> {
        match self.find_case_by_id(case_id).await? {
            Some(case) => {
                let steps = self.list_steps(case_id).await?;
                Ok(Some(TestCaseWithSteps { case, steps }))
            }
            None => Ok(None),
        }
    }

    /// Newest-synced first. `page` is 1-based; the total uses the same filter.
    pub async fn list_cases(
        &self,
        filter: &TestCaseFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<TestCase>, i64)> {
        let offset = i64::from(page.max(1) - 1) * i64::from(limit);

        let rows = sqlx::query_as::<_, TestCaseEntity>(
            "SELECT id, title, area, priority, last_synced_at, source_rev
             FROM test_cases
             WHERE (?1 IS NULL OR area = ?1) AND (?2 IS NULL OR priority = ?2)
             ORDER BY last_synced_at DESC
             LIMIT ?3 OFFSET ?4",
        )
        .bind(&filter.area)
        .bind(filter.priority)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool);

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM test_cases
             WHERE (?1 IS NULL OR area = ?1) AND (?2 IS NULL OR priority = ?2)",
        )
        .bind(&filter.area)
        .bind(filter.priority)
        .fetch_one(&self.pool);

        let (rows, total) = tokio::try_join!(rows, total)
            .map_err(|e| AppError::DatabaseError(format!("Failed to list test cases: {e}")))?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }
}

async fn upsert_case_on(conn: &mut SqliteConnection, case: &TestCase) -> Result<UpsertOutcome> {
    let existing = sqlx::query_scalar::<_, String>("SELECT id FROM test_cases WHERE id = ?")
        .bind(&case.id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to look up test case: {e}")))?;

    if existing.is_some() {
        sqlx::query(
            "UPDATE test_cases
             SET title = ?, area = ?, priority = ?, last_synced_at = ?, source_rev = ?
             WHERE id = ?",
        )
        .bind(&case.title)
        .bind(&case.area)
        .bind(case.priority)
        .bind(&case.last_synced_at)
        .bind(&case.source_rev)
        .bind(&case.id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to update test case: {e}")))?;
        Ok(UpsertOutcome::Updated)
    } else {
        sqlx::query(
            "INSERT INTO test_cases (id, title, area, priority, last_synced_at, source_rev)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&case.id)
        .bind(&case.title)
        .bind(&case.area)
        .bind(case.priority)
        .bind(&case.last_synced_at)
        .bind(&case.source_rev)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert test case: {e}")))?;
        Ok(UpsertOutcome::Inserted)
    }
}

async fn replace_steps_on(
    conn: &mut SqliteConnection,
    case_id: &str,
    steps: &[TestStep],
) -> Result<()> {
    sqlx::query("DELETE FROM test_steps WHERE case_id = ?")
        .bind(case_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to delete test steps: {e}")))?;

    for step in steps {
        sqlx::query(
            "INSERT INTO test_steps (id, case_id, step_index, action, expected)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&step.id)
        .bind(case_id)
        .bind(step.step_index)
        .bind(&step.action)
        .bind(&step.expected)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert test step: {e}")))?;
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct TestCaseEntity {
    id: String,
    title: String,
    area: Option<String>,
    priority: Option<i64>,
    last_synced_at: String,
    source_rev: Option<String>,
}

impl From<TestCaseEntity> for TestCase {
    fn from(entity: TestCaseEntity) -> Self {
        Self {
            id: entity.id,
            title: entity.title,
            area: entity.area,
            priority: entity.priority,
            last_synced_at: entity.last_synced_at,
            source_rev: entity.source_rev,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TestStepEntity {
    id: String,
    case_id: String,
    step_index: i64,
    action: String,
    expected: Option<String>,
}

impl From<TestStepEntity> for TestStep {
    fn from(entity: TestStepEntity) -> Self {
        Self {
            id: entity.id,
            case_id: entity.case_id,
            step_index: entity.step_index,
            action: entity.action,
            expected: entity.expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::sqlite::init_in_memory_db;

    fn case(id: &str, area: Option<&str>, priority: Option<i64>, synced: &str) -> TestCase {
        TestCase {
            id: id.to_string(),
            title: format!("Case {id}"),
            area: area.map(str::to_string),
            priority,
            last_synced_at: synced.to_string(),
            source_rev: Some("1".to_string()),
        }
    }

    fn step(case_id: &str, index: i64, action: &str) -> TestStep {
        TestStep {
            id: format!("{case_id}-{index}"),
            case_id: case_id.to_string(),
            step_index: index,
            action: action.to_string(),
            expected: None,
        }
    }

    async fn repo() -> TestCaseRepository {
        TestCaseRepository::new(init_in_memory_db().await.unwrap())
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_overwrites() {
        let repo = repo().await;
        let first = case("100", Some("Web"), Some(2), "2024-01-01T00:00:00.000Z");
        assert_eq!(repo.upsert_case(&first).await.unwrap(), UpsertOutcome::Inserted);

        let mut second = first.clone();
        second.title = "Renamed".to_string();
        second.area = None;
        second.priority = None;
        second.source_rev = Some("7".to_string());
        second.last_synced_at = "2024-02-01T00:00:00.000Z".to_string();
        assert_eq!(repo.upsert_case(&second).await.unwrap(), UpsertOutcome::Updated);

        let stored = repo.find_case_by_id("100").await.unwrap().unwrap();
        assert_eq!(stored, second);
        assert!(repo.find_case_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_steps_is_whole() {
        let repo = repo().await;
        repo.upsert_case(&case("1", None, None, "t")).await.unwrap();
        repo.replace_steps("1", &[step("1", 1, "a"), step("1", 2, "b"), step("1", 3, "c")])
            .await
            .unwrap();
        repo.replace_steps("1", &[step("1", 1, "only")]).await.unwrap();

        let steps = repo.list_steps("1").await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, "only");
    }

    #[tokio::test]
    async fn test_sync_case_rolls_back_on_failure() {
        let repo = repo().await;
        let duplicate = vec![step("5", 1, "a"), step("5", 1, "dup")];
        let result = repo
            .sync_case(&case("5", None, None, "t"), &duplicate)
            .await;
        assert!(result.is_err());
        assert!(repo.find_case_by_id("5").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_case_cascades_to_steps() {
        let repo = repo().await;
        repo.sync_case(&case("9", None, None, "t"), &[step("9", 1, "a")])
            .await
            .unwrap();
        sqlx::query("DELETE FROM test_cases WHERE id = '9'")
            .execute(&repo.pool)
            .await
            .unwrap();
        assert!(repo.list_steps("9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_cases_filters_orders_and_counts() {
        let repo = repo().await;
        repo.upsert_case(&case("1", Some("Web"), Some(1), "2024-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        repo.upsert_case(&case("2", Some("Web"), Some(2), "2024-01-03T00:00:00.000Z"))
            .await
            .unwrap();
        repo.upsert_case(&case("3", Some("Api"), Some(1), "2024-01-02T00:00:00.000Z"))
            .await
            .unwrap();
        repo.upsert_case(&case("4", Some("Web"), Some(1), "2024-01-04T00:00:00.000Z"))
            .await
            .unwrap();

        let (all, total) = repo
            .list_cases(&TestCaseFilter::default(), 1, 20)
            .await
            .unwrap();
        assert_eq!(total, 4);
        let ids: Vec<&str> = all.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "2", "3", "1"]);

        let web = TestCaseFilter {
            area: Some("Web".to_string()),
            priority: None,
        };
        let (page_two, total) = repo.list_cases(&web, 2, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page_two.len(), 1);
        assert_eq!(page_two[0].id, "1");

        let web_p1 = TestCaseFilter {
            area: Some("Web".to_string()),
            priority: Some(1),
        };
        let (rows, total) = repo.list_cases(&web_p1, 1, 20).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_case_with_steps() {
        let repo = repo().await;
        repo.sync_case(
            &case("11", None, None, "t"),
            &[step("11", 2, "second"), step("11", 1, "first")],
        )
        .await
        .unwrap();

        let found = repo.get_case_with_steps("11").await.unwrap().unwrap();
        let actions: Vec<&str> = found.steps.iter().map(|s| s.action.as_str()).collect();
        assert_eq!(actions, vec!["first", "second"]);
        assert!(repo.get_case_with_steps("12").await.unwrap().is_none());
    }
}
