use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Low,
    Medium,
    High,
}

/// Automation assessment of one SOP document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub executive_summary: ExecutiveSummary,
    pub detailed_analysis: DetailedAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutiveSummary {
    pub process_name: String,
    pub total_steps: u32,
    pub automatable_steps: u32,
    pub automation_potential_percent: f64,
    pub estimated_time_savings: String,
    pub overall_complexity: Level,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAnalysis {
    pub current_state: CurrentState,
    pub automation_opportunities: Vec<AutomationOpportunity>,
    pub implementation_roadmap: Vec<RoadmapPhase>,
    pub technical_requirements: TechnicalRequirements,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentState {
    pub manual_steps: u32,
    pub decision_points: u32,
    pub systems_involved: Vec<String>,
    pub pain_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationOpportunity {
    pub title: String,
    pub description: String,
    pub sop_reference: SopReference,
    pub automation_type: String,
    pub complexity: Level,
    pub estimated_roi: Level,
    pub estimated_time_savings: String,
}

/// Where in the source document an opportunity was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SopReference {
    pub step_identifier: String,
    /// Signed so out-of-range values from the model reach validation instead of failing to parse.
    pub page_number: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapPhase {
    pub phase: String,
    pub timeline: String,
    pub opportunities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalRequirements {
    pub systems: Vec<String>,
    pub integrations: Vec<String>,
    pub skills: Vec<String>,
}

/// Per-file result of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub file: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AnalysisReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}
