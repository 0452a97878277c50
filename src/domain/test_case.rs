use serde::{Deserialize, Serialize};

/// A step extracted from the remote step table. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedStep {
    pub index: u32,
    pub action: String,
    pub expected_result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub title: String,
    pub area: Option<String>,
    pub priority: Option<i64>,
    pub last_synced_at: String,
    pub source_rev: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStep {
    pub id: String,
    pub case_id: String,
    pub step_index: i64,
    pub action: String,
    pub expected: Option<String>,
}

impl TestStep {
    pub fn step_id(case_id: &str, index: u32) -> String {
        format!("{}-{}", case_id, index)
    }

    pub fn from_parsed(case_id: &str, step: &ParsedStep) -> Self {
        let expected = if step.expected_result.is_empty() {
            None
        } else {
            Some(step.expected_result.clone())
        };
        Self {
            id: Self::step_id(case_id, step.index),
            case_id: case_id.to_string(),
            step_index: i64::from(step.index),
            action: step.action.clone(),
            expected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseWithSteps {
    #[serde(flatten)]
    pub case: TestCase,
    pub steps: Vec<TestStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestCaseFilter {
    pub area: Option<String>,
    pub priority: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit_i = i64::from(limit.max(1));
        Self {
            page,
            limit,
            total,
            total_pages: (total + limit_i - 1) / limit_i,
        }
    }
}
