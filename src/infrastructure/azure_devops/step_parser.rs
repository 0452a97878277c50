//! Extracts manual test steps from the HTML table Azure DevOps stores in
//! `Microsoft.VSTS.TCM.Steps`.
//!
//! This is a tolerant pattern extractor for that one table layout, not an HTML parser:
//! truncated or malformed markup yields fewer steps, never an error.

use crate::domain::test_case::ParsedStep;
use once_cell::sync::Lazy;
use regex::Regex;

static ROW_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr[^>]*>.*?</tr>").unwrap());

static CELL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").unwrap());

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Rows need an action and an expected-result cell; rows with a blank action are dropped
/// and do not consume a step number.
pub fn parse_steps(html: &str) -> Vec<ParsedStep> {
    if html.trim().is_empty() {
        return Vec::new();
    }

    let mut steps = Vec::new();
    for row in ROW_PATTERN.find_iter(html) {
        let cells: Vec<&str> = CELL_PATTERN
            .captures_iter(row.as_str())
            .filter_map(|caps| caps.get(1).map(|cell| cell.as_str()))
            .collect();
        if cells.len() < 2 {
            continue;
        }

        let action = strip_html(cells[0]);
        if action.is_empty() {
            continue;
        }

        steps.push(ParsedStep {
            index: steps.len() as u32 + 1,
            action,
            expected_result: strip_html(cells[1]),
        });
    }
    steps
}

/// Drops markup, decodes the handful of entities the step editor emits, trims.
pub fn strip_html(fragment: &str) -> String {
    TAG_PATTERN
        .replace_all(fragment, "")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .trim()
        .to_string()
}
