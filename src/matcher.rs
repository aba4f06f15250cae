use std::collections::BTreeSet;

use chrono::Month;
use serde::Serialize;

use crate::models::{CoachingObservation, ComparisonRequest, MetricLabel, MetricObservation};
use crate::period::Period;

/// Fields every upstream row exposes to the filter.
pub trait Observation {
    fn client(&self) -> &str;
    fn organization(&self) -> &str;
    fn metric(&self) -> &MetricLabel;
    fn month(&self) -> &str;
    fn year(&self) -> i32;
}

impl Observation for MetricObservation {
    fn client(&self) -> &str {
        &self.client
    }

    fn organization(&self) -> &str {
        &self.organization
    }

    fn metric(&self) -> &MetricLabel {
        &self.metric
    }

    fn month(&self) -> &str {
        &self.month
    }

    fn year(&self) -> i32 {
        self.year
    }
}

impl Observation for CoachingObservation {
    fn client(&self) -> &str {
        &self.client
    }

    fn organization(&self) -> &str {
        &self.organization
    }

    fn metric(&self) -> &MetricLabel {
        &self.metric
    }

    fn month(&self) -> &str {
        &self.month
    }

    fn year(&self) -> i32 {
        self.year
    }
}

/// Maps full month names and abbreviations onto a calendar month.
pub fn normalize_month(raw: &str) -> Option<Month> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("sept") {
        return Some(Month::September);
    }
    trimmed.parse::<Month>().ok()
}

/// Every lowercase spelling `normalize_month` accepts for `month`.
pub fn month_spellings(month: Month) -> Vec<String> {
    let name = month.name().to_lowercase();
    let mut spellings = vec![name[..3].to_string(), name];
    if month == Month::September {
        spellings.push("sept".to_string());
    }
    spellings.dedup();
    spellings
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricMatch {
    Standardized,
    Freeform,
}

/// Standardized label first, free-text label as the fallback.
pub fn match_metric(label: &MetricLabel, requested: &str) -> Option<MetricMatch> {
    let requested = fold(requested);
    let same = |value: &Option<String>| {
        value
            .as_deref()
            .is_some_and(|value| fold(value) == requested)
    };

    if same(&label.standardized) {
        Some(MetricMatch::Standardized)
    } else if same(&label.freeform) {
        Some(MetricMatch::Freeform)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthMatch {
    Exact,
    Normalized,
    Outside,
    Unrecognized,
}

impl MonthMatch {
    pub fn is_match(self) -> bool {
        matches!(self, MonthMatch::Exact | MonthMatch::Normalized)
    }
}

pub fn match_month(raw: &str, targets: &[&str]) -> MonthMatch {
    if targets.iter().any(|target| *target == raw) {
        return MonthMatch::Exact;
    }

    let Some(month) = normalize_month(raw) else {
        return MonthMatch::Unrecognized;
    };
    let matched = targets
        .iter()
        .filter_map(|target| normalize_month(target))
        .any(|target| target == month);

    if matched {
        MonthMatch::Normalized
    } else {
        MonthMatch::Outside
    }
}

/// Per-pass match counts. Each dimension is counted independently of the
/// others so a zero shows which predicate rejected the rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterDiagnostics {
    pub rows_scanned: usize,
    pub client_matches: usize,
    pub organization_matches: usize,
    pub metric_matches: usize,
    pub month_matches: usize,
    pub year_matches: usize,
    pub matched: usize,
    pub freeform_metric_matches: usize,
    pub normalized_month_matches: usize,
    pub unrecognized_months: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchDiagnostics {
    pub current_metric: FilterDiagnostics,
    pub previous_metric: FilterDiagnostics,
    pub current_coaching: FilterDiagnostics,
    pub previous_coaching: FilterDiagnostics,
}

pub struct RecordFilter<'a> {
    clients: &'a BTreeSet<String>,
    organization: String,
    metric_name: &'a str,
    months: Vec<&'static str>,
    year: i32,
}

impl<'a> RecordFilter<'a> {
    pub fn new(request: &'a ComparisonRequest, period: &Period) -> Self {
        Self {
            clients: &request.clients,
            organization: fold(&request.organization),
            metric_name: &request.metric_name,
            months: period.codes(),
            year: period.year,
        }
    }

    pub fn select<'r, T: Observation>(&self, rows: &'r [T]) -> (Vec<&'r T>, FilterDiagnostics) {
        let mut diagnostics = FilterDiagnostics {
            rows_scanned: rows.len(),
            ..FilterDiagnostics::default()
        };
        let mut selected = Vec::new();

        for row in rows {
            let client = self.clients.contains(row.client());
            let organization = fold(row.organization()) == self.organization;
            let metric = match_metric(row.metric(), self.metric_name);
            let month = match_month(row.month(), &self.months);
            let year = row.year() == self.year;

            diagnostics.client_matches += usize::from(client);
            diagnostics.organization_matches += usize::from(organization);
            diagnostics.metric_matches += usize::from(metric.is_some());
            diagnostics.month_matches += usize::from(month.is_match());
            diagnostics.year_matches += usize::from(year);
            diagnostics.unrecognized_months += usize::from(month == MonthMatch::Unrecognized);

            if client && organization && metric.is_some() && month.is_match() && year {
                diagnostics.matched += 1;
                diagnostics.freeform_metric_matches +=
                    usize::from(metric == Some(MetricMatch::Freeform));
                diagnostics.normalized_month_matches += usize::from(month == MonthMatch::Normalized);
                selected.push(row);
            }
        }

        (selected, diagnostics)
    }
}

/// Trimmed, lowercased form used for organization and metric equality.
pub fn fold(value: &str) -> String {
    value.trim().to_lowercase()
}
