use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Metric name as it arrives from upstream: a standardized label and a
/// free-text one, either of which may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricLabel {
    pub standardized: Option<String>,
    pub freeform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricObservation {
    pub client: String,
    pub organization: String,
    pub metric: MetricLabel,
    pub program: String,
    pub month: String,
    pub year: i32,
    pub actual: Option<f64>,
    pub goal: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingObservation {
    pub client: String,
    pub organization: String,
    pub metric: MetricLabel,
    pub month: String,
    pub year: i32,
    pub behavior: String,
    pub sub_behavior: Option<String>,
    pub coaching_count: Option<i64>,
    pub effectiveness_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonType {
    Month,
    Quarter,
}

impl fmt::Display for ComparisonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonType::Month => write!(f, "month"),
            ComparisonType::Quarter => write!(f, "quarter"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRequest {
    pub clients: BTreeSet<String>,
    pub organization: String,
    pub metric_name: String,
    pub year: i32,
    pub comparison_type: ComparisonType,
    pub current_selector: String,
    pub previous_selector: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub metadata: SnapshotMetadata,
    pub coaching_activity: CoachingActivity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotMetadata {
    pub request: ComparisonRequest,
    pub periods: PeriodLabels,
    pub comparison: MetricComparison,
    pub data_quality: DataQuality,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodLabels {
    pub current_period: String,
    pub previous_period: String,
    pub current_months: Vec<String>,
    pub previous_months: Vec<String>,
    pub current_coaching_period: String,
    pub previous_coaching_period: String,
    pub current_coaching_months: Vec<String>,
    pub previous_coaching_months: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub current_value: Option<f64>,
    pub previous_value: Option<f64>,
    pub current_goal: Option<f64>,
    pub previous_goal: Option<f64>,
    pub change: Option<f64>,
    pub percent_change: Option<f64>,
    pub percent_change_label: String,
    pub programs_count: usize,
    pub current_rows: usize,
    pub previous_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataQuality {
    pub current_metric_rows: usize,
    pub previous_metric_rows: usize,
    pub current_coaching_rows: usize,
    pub previous_coaching_rows: usize,
    pub current_effectiveness_coverage: EffectivenessCoverage,
    pub previous_effectiveness_coverage: EffectivenessCoverage,
}

/// How many coaching rows in a period carry an effectiveness value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectivenessCoverage {
    pub with_effectiveness: usize,
    pub total_rows: usize,
}

impl fmt::Display for EffectivenessCoverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.with_effectiveness, self.total_rows)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoachingActivity {
    pub current: CoachingPeriodSummary,
    pub previous: CoachingPeriodSummary,
    pub change: CoachingChange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoachingPeriodSummary {
    pub period: String,
    pub matched_rows: usize,
    pub total_coaching_sessions: i64,
    pub coaching_effectiveness: Option<f64>,
    pub coaching_effectiveness_label: String,
    pub effectiveness_coverage: EffectivenessCoverage,
    pub top_behaviors: Vec<BehaviorRank>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BehaviorRank {
    pub behavior: String,
    pub coaching_count: i64,
    pub percent_of_total: f64,
    pub sub_behaviors: Vec<SubBehaviorRank>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubBehaviorRank {
    pub sub_behavior: String,
    pub coaching_count: i64,
    pub percent_of_behavior: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoachingChange {
    pub volume_change: i64,
    pub volume_change_pct: Option<f64>,
    pub volume_change_pct_label: String,
    pub effectiveness_change_points: Option<f64>,
    pub effectiveness_change_label: String,
}

#[derive(Debug, Clone)]
pub struct ProgramPerformance {
    pub program: String,
    pub avg_actual: f64,
    pub avg_goal: f64,
    pub attainment_pct: f64,
    pub observation_count: i64,
}

pub const NOT_APPLICABLE: &str = "N/A";
pub const NO_EFFECTIVENESS_DATA: &str = "no effectiveness data";

/// Parses an upstream numeric cell. Blank, `null`, non-numeric and
/// non-finite values all come back as `None`.
pub fn parse_numeric(raw: Option<&str>) -> Option<f64> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
