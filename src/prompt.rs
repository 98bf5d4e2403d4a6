//! Prompt construction under a context-window budget.
//!
//! Token counts are estimated from characters. The estimate is deliberately
//! pessimistic so the prompt plus the requested completion fits the window of
//! the bundled model without a tokenizer on hand.

use crate::extract::Page;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Conservative characters-per-token estimate for English prose.
pub const CHARS_PER_TOKEN: usize = 4;

/// Lower bound on the prompt budget, whatever the context configuration says.
pub const MIN_PROMPT_TOKENS: usize = 512;

/// Share of the body budget spent on the start of the document when truncating.
pub const HEAD_SHARE_PERCENT: usize = 70;

pub const TRUNCATION_MARKER: &str = "[TRUNCATED]";

const MARKER_REPLACEMENT: &str = "(TRUNCATED)";

const PERSONA: &str = "You are a senior business-process analyst. You read standard operating \
procedures (SOPs) and identify which steps can be automated.";

const DIRECTIVE: &str = "Respond with ONLY one JSON object. No markdown, no code fences, no \
commentary before or after it. Use exactly the keys of the template below. \
overallComplexity, complexity and estimatedRoi must be one of \"Low\", \"Medium\", \"High\". \
automationPotentialPercent is a number from 0 to 100.";

const TEMPLATE: &str = r#"{"executiveSummary":{"processName":"","totalSteps":0,"automatableSteps":0,"automationPotentialPercent":0,"estimatedTimeSavings":"","overallComplexity":"Low","summary":""},"detailedAnalysis":{"currentState":{"manualSteps":0,"decisionPoints":0,"systemsInvolved":[],"painPoints":[]},"automationOpportunities":[{"title":"","description":"","sopReference":{"stepIdentifier":"","pageNumber":1},"automationType":"","complexity":"Low","estimatedRoi":"Low","estimatedTimeSavings":""}],"implementationRoadmap":[{"phase":"","timeline":"","opportunities":[]}],"technicalRequirements":{"systems":[],"integrations":[],"skills":[]}}}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltPrompt {
    pub text: String,
    pub truncated: bool,
    /// Upper bound on `text`, in characters.
    pub char_budget: usize,
}

/// Prompt tokens left once the completion and safety margin are reserved.
pub fn max_prompt_tokens(ctx_size: usize, predict_tokens: usize, safety_margin: usize) -> usize {
    ctx_size
        .saturating_sub(predict_tokens)
        .saturating_sub(safety_margin)
        .max(MIN_PROMPT_TOKENS)
}

pub fn build_prompt(
    pages: &[Page],
    ctx_size: usize,
    predict_tokens: usize,
    safety_margin: usize,
) -> BuiltPrompt {
    let char_budget = max_prompt_tokens(ctx_size, predict_tokens, safety_margin) * CHARS_PER_TOKEN;
    let header = header(pages.len());
    let body = body(pages);

    let header_chars = header.chars().count();
    let body_chars = body.chars().count();
    if header_chars + body_chars <= char_budget {
        return BuiltPrompt {
            text: header + &body,
            truncated: false,
            char_budget,
        };
    }

    let cut = format!("\n{TRUNCATION_MARKER}\n");
    let available = char_budget
        .saturating_sub(header_chars)
        .saturating_sub(cut.chars().count());
    let head_len = available * HEAD_SHARE_PERCENT / 100;
    let tail_len = available - head_len;

    let mut text = header;
    text.extend(body.chars().take(head_len));
    text.push_str(&cut);
    text.extend(body.chars().skip(body_chars - tail_len));

    BuiltPrompt {
        text,
        truncated: true,
        char_budget,
    }
}

fn header(page_count: usize) -> String {
    format!(
        "{PERSONA}\n\n{DIRECTIVE} Every sopReference.pageNumber must be an integer between 1 and \
         {page_count}, the page where the step appears.\n\nJSON template:\n{TEMPLATE}\n\n\
         SOP document ({page_count} pages):\n"
    )
}

fn body(pages: &[Page]) -> String {
    let mut out = String::new();
    for page in pages {
        let _ = writeln!(out, "--- PAGE {} ---", page.page_number);
        out.push_str(&page.text.replace(TRUNCATION_MARKER, MARKER_REPLACEMENT));
        out.push_str("\n\n");
    }
    out
}
