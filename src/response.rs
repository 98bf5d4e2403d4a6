//! Recovering a validated report from free-form model output.

use crate::{
    error::{Error, Result},
    report::AnalysisReport,
    util::snippet,
};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, warn};

const SNIPPET_CHARS: usize = 200;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").expect("valid fence regex"))
}

/// Find and parse the JSON object in `raw`.
///
/// Fenced blocks are preferred over the surrounding text. Within a candidate,
/// the first balanced object wins; failing that, the span from the first `{`
/// to the last `}` is tried.
pub fn extract_json(raw: &str) -> Result<Value> {
    let mut candidates: Vec<&str> = fence_re()
        .captures_iter(raw)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    candidates.push(raw);

    let mut last_err = "no JSON object found".to_string();
    for candidate in candidates {
        if let Some(slice) = balanced_object(candidate) {
            match serde_json::from_str::<Value>(slice) {
                Ok(v) => return Ok(v),
                Err(e) => last_err = e.to_string(),
            }
        }
        if let (Some(start), Some(end)) = (candidate.find('{'), candidate.rfind('}')) {
            if start >= end {
                continue;
            }
            match serde_json::from_str::<Value>(&candidate[start..=end]) {
                Ok(v) => {
                    debug!("recovered JSON from outer braces");
                    return Ok(v);
                }
                Err(e) => last_err = e.to_string(),
            }
        }
    }

    Err(Error::InvalidModelOutput {
        reason: last_err,
        snippet: snippet(raw, SNIPPET_CHARS),
    })
}

/// The first `{...}` in `s` whose braces balance, ignoring braces in strings.
fn balanced_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Check `value` against the report schema and the document it describes.
pub fn validate(value: Value, page_count: u32) -> Result<AnalysisReport> {
    let rendered = value.to_string();
    let invalid = |reason: String| Error::InvalidModelOutput {
        reason,
        snippet: snippet(&rendered, SNIPPET_CHARS),
    };

    let report: AnalysisReport =
        serde_json::from_value(value).map_err(|e| invalid(format!("schema: {e}")))?;

    let pct = report.executive_summary.automation_potential_percent;
    if !(0.0..=100.0).contains(&pct) {
        return Err(invalid(format!(
            "automationPotentialPercent {pct} is outside 0..=100"
        )));
    }

    for (i, opp) in report.detailed_analysis.automation_opportunities.iter().enumerate() {
        let page = opp.sop_reference.page_number;
        if page < 1 || page > i64::from(page_count) {
            return Err(invalid(format!(
                "automationOpportunities[{i}].sopReference.pageNumber {page} is outside 1..={page_count}"
            )));
        }
    }

    let summary = &report.executive_summary;
    if summary.automatable_steps > summary.total_steps {
        warn!(
            "model reports {} automatable of {} total steps",
            summary.automatable_steps, summary.total_steps
        );
    }
    Ok(report)
}

/// `extract_json` followed by `validate`.
pub fn parse_report(raw: &str, page_count: u32) -> Result<AnalysisReport> {
    validate(extract_json(raw)?, page_count)
}
