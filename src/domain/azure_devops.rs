use serde::{Deserialize, Deserializer, Serialize};

/// Envelope used by every Azure DevOps collection endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoList<T> {
    #[serde(default)]
    pub count: usize,
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdoProject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub last_update_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdoIdentity {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanState {
    #[serde(alias = "active")]
    Active,
    #[serde(alias = "inactive")]
    Inactive,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdoTestPlan {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<AdoIdentity>,
    #[serde(default)]
    pub state: Option<PlanState>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub area_path: Option<String>,
    #[serde(default)]
    pub iteration: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuiteType {
    #[serde(alias = "staticTestSuite")]
    StaticTestSuite,
    #[serde(alias = "dynamicTestSuite")]
    DynamicTestSuite,
    #[serde(alias = "requirementTestSuite")]
    RequirementTestSuite,
    #[serde(other)]
    Unknown,
}

/// Azure DevOps returns reference ids as numbers on some endpoints and strings on others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoReference {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdoTestSuite {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub plan: Option<AdoReference>,
    #[serde(default, alias = "parent")]
    pub parent_suite: Option<AdoReference>,
    #[serde(default)]
    pub suite_type: Option<SuiteType>,
    #[serde(default)]
    pub has_children: bool,
    #[serde(default)]
    pub test_case_count: u32,
}

/// One entry of a suite's test case listing. Newer API versions nest the id under
/// `workItem`; older ones put it at the top level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawTestCaseRef")]
pub struct AdoTestCaseRef {
    pub id: i64,
    pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTestCaseRef {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    work_item: Option<RawWorkItemRef>,
}

#[derive(Deserialize)]
struct RawWorkItemRef {
    id: i64,
    #[serde(default)]
    name: Option<String>,
}

impl TryFrom<RawTestCaseRef> for AdoTestCaseRef {
    type Error = String;

    fn try_from(raw: RawTestCaseRef) -> std::result::Result<Self, Self::Error> {
        match (raw.work_item, raw.id) {
            (Some(item), _) => Ok(Self {
                id: item.id,
                name: item.name,
            }),
            (None, Some(id)) => Ok(Self { id, name: None }),
            (None, None) => Err("test case entry has neither `id` nor `workItem.id`".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdoWorkItemFields {
    #[serde(rename = "System.Title", default)]
    pub title: Option<String>,
    #[serde(rename = "System.State", default)]
    pub state: Option<String>,
    #[serde(rename = "System.AreaPath", default)]
    pub area_path: Option<String>,
    #[serde(rename = "Microsoft.VSTS.Common.Priority", default)]
    pub priority: Option<i64>,
    #[serde(rename = "Microsoft.VSTS.TCM.Steps", default)]
    pub steps: Option<String>,
    #[serde(rename = "System.Rev", default)]
    pub rev: Option<i64>,
    #[serde(rename = "System.ChangedDate", default)]
    pub changed_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoWorkItem {
    pub id: i64,
    #[serde(default)]
    pub rev: Option<i64>,
    #[serde(default)]
    pub fields: AdoWorkItemFields,
}

impl AdoWorkItem {
    pub fn steps_html(&self) -> &str {
        self.fields.steps.as_deref().unwrap_or("")
    }

    pub fn revision(&self) -> Option<String> {
        self.fields.rev.or(self.rev).map(|rev| rev.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPermissions {
    pub can_read_projects: bool,
    pub can_read_test_plans: bool,
    pub can_read_test_cases: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTest {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<ConnectionPermissions>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub name: String,
    pub url: String,
}

pub const DEFAULT_PLAN_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPlanQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub skip: Option<usize>,
    #[serde(default)]
    pub top: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPlanPage {
    pub test_plans: Vec<AdoTestPlan>,
    pub total_count: usize,
    pub skip: usize,
    pub top: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFailure {
    pub test_case_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub status: ImportStatus,
    pub total_test_cases: u64,
    pub processed_test_cases: u64,
    pub imported_test_cases: u64,
    pub updated_test_cases: u64,
    pub skipped_test_cases: u64,
    pub failed_test_cases: u64,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub errors: Vec<ImportFailure>,
}

impl ImportProgress {
    pub fn start(started_at: String) -> Self {
        Self {
            status: ImportStatus::Running,
            total_test_cases: 0,
            processed_test_cases: 0,
            imported_test_cases: 0,
            updated_test_cases: 0,
            skipped_test_cases: 0,
            failed_test_cases: 0,
            started_at,
            completed_at: None,
            errors: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, test_case_id: i64, error: String) {
        self.failed_test_cases += 1;
        self.errors.push(ImportFailure {
            test_case_id,
            error,
        });
    }

    pub fn finish(&mut self, completed_at: String) {
        self.status = ImportStatus::Completed;
        self.completed_at = Some(completed_at);
    }

    /// Full success, or at least one case landed locally.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() || self.imported_test_cases + self.updated_test_cases > 0
    }

    pub fn summary(&self) -> String {
        format!(
            "Import completed: {} imported, {} updated, {} skipped, {} failed",
            self.imported_test_cases,
            self.updated_test_cases,
            self.skipped_test_cases,
            self.failed_test_cases
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub progress: ImportProgress,
    pub message: String,
}

fn id_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(value) => Ok(value),
        NumberOrString::Text(value) => value
            .trim()
            .parse::<i64>()
            .map_err(|err| serde::de::Error::custom(format!("invalid id `{value}`: {err}"))),
    }
}
