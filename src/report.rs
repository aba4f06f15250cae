use std::fmt::Write;

use crate::matcher::{FilterDiagnostics, MatchDiagnostics};
use crate::models::{CoachingPeriodSummary, Snapshot, NOT_APPLICABLE};

fn value_or_na(value: Option<f64>) -> String {
    value
        .map(|value| format!("{value:.2}"))
        .unwrap_or_else(|| NOT_APPLICABLE.to_string())
}

fn write_coaching_period(output: &mut String, heading: &str, summary: &CoachingPeriodSummary) {
    let _ = writeln!(output);
    let _ = writeln!(output, "### {} ({})", heading, summary.period);
    let _ = writeln!(
        output,
        "- Sessions: {} across {} rows",
        summary.total_coaching_sessions, summary.matched_rows
    );
    let _ = writeln!(
        output,
        "- Effectiveness: {} ({} rows with data)",
        summary.coaching_effectiveness_label, summary.effectiveness_coverage
    );

    if summary.top_behaviors.is_empty() {
        let _ = writeln!(output, "- No coaching recorded for this window.");
        return;
    }

    for behavior in summary.top_behaviors.iter() {
        let _ = writeln!(
            output,
            "- {}: {} sessions ({:.1}% of total)",
            behavior.behavior, behavior.coaching_count, behavior.percent_of_total
        );
        for sub in behavior.sub_behaviors.iter() {
            let _ = writeln!(
                output,
                "  - {}: {} sessions ({:.1}% of behavior)",
                sub.sub_behavior, sub.coaching_count, sub.percent_of_behavior
            );
        }
    }
}

fn write_filter_diagnostics(output: &mut String, name: &str, diagnostics: &FilterDiagnostics) {
    let _ = writeln!(
        output,
        "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
        name,
        diagnostics.rows_scanned,
        diagnostics.client_matches,
        diagnostics.organization_matches,
        diagnostics.metric_matches,
        diagnostics.month_matches,
        diagnostics.year_matches,
        diagnostics.matched,
        diagnostics.freeform_metric_matches,
        diagnostics.normalized_month_matches,
    );
}

pub fn build_report(snapshot: &Snapshot, diagnostics: Option<&MatchDiagnostics>) -> String {
    let metadata = &snapshot.metadata;
    let request = &metadata.request;
    let comparison = &metadata.comparison;
    let activity = &snapshot.coaching_activity;

    let mut output = String::new();
    let clients = request
        .clients
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let _ = writeln!(output, "# {} Performance Snapshot", request.metric_name);
    let _ = writeln!(
        output,
        "Generated for {} ({}) comparing {} with {}",
        request.organization, clients, metadata.periods.current_period, metadata.periods.previous_period
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Performance");
    let _ = writeln!(
        output,
        "- {}: {}",
        metadata.periods.current_period,
        value_or_na(comparison.current_value)
    );
    let _ = writeln!(
        output,
        "- {}: {}",
        metadata.periods.previous_period,
        value_or_na(comparison.previous_value)
    );
    let _ = writeln!(
        output,
        "- Change: {} ({})",
        value_or_na(comparison.change),
        comparison.percent_change_label
    );
    if comparison.current_goal.is_some() || comparison.previous_goal.is_some() {
        let _ = writeln!(
            output,
            "- Goal: {} current, {} previous",
            value_or_na(comparison.current_goal),
            value_or_na(comparison.previous_goal)
        );
    }
    let _ = writeln!(output, "- Programs: {}", comparison.programs_count);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Coaching Activity");
    write_coaching_period(&mut output, "Current coaching window", &activity.current);
    write_coaching_period(&mut output, "Previous coaching window", &activity.previous);

    let _ = writeln!(output);
    let _ = writeln!(output, "### Change");
    let _ = writeln!(
        output,
        "- Volume: {:+} sessions ({})",
        activity.change.volume_change, activity.change.volume_change_pct_label
    );
    let _ = writeln!(
        output,
        "- Effectiveness: {}",
        activity.change.effectiveness_change_label
    );

    let quality = &metadata.data_quality;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Quality");
    let _ = writeln!(
        output,
        "- Metric rows: {} current, {} previous",
        quality.current_metric_rows, quality.previous_metric_rows
    );
    let _ = writeln!(
        output,
        "- Coaching rows: {} current, {} previous",
        quality.current_coaching_rows, quality.previous_coaching_rows
    );
    let _ = writeln!(
        output,
        "- Effectiveness coverage: {} current, {} previous",
        quality.current_effectiveness_coverage, quality.previous_effectiveness_coverage
    );

    if let Some(diagnostics) = diagnostics {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Match Diagnostics");
        let _ = writeln!(
            output,
            "| Filter | Scanned | Client | Organization | Metric | Month | Year | Matched | Free-text metric | Normalized month |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|---|");
        write_filter_diagnostics(&mut output, "Current metric", &diagnostics.current_metric);
        write_filter_diagnostics(&mut output, "Previous metric", &diagnostics.previous_metric);
        write_filter_diagnostics(&mut output, "Current coaching", &diagnostics.current_coaching);
        write_filter_diagnostics(&mut output, "Previous coaching", &diagnostics.previous_coaching);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CoachingObservation, ComparisonRequest, ComparisonType, MetricLabel, MetricObservation,
    };
    use crate::snapshot::build_snapshot;

    fn request() -> ComparisonRequest {
        ComparisonRequest {
            clients: ["Acme".to_string()].into_iter().collect(),
            organization: "Customer Care".to_string(),
            metric_name: "NPS".to_string(),
            year: 2025,
            comparison_type: ComparisonType::Month,
            current_selector: "Jul".to_string(),
            previous_selector: "Jun".to_string(),
        }
    }

    fn nps() -> MetricLabel {
        MetricLabel {
            standardized: None,
            freeform: Some("NPS".to_string()),
        }
    }

    #[test]
    fn renders_numbers_and_sentinels() {
        let metrics = vec![
            MetricObservation {
                client: "Acme".to_string(),
                organization: "Customer Care".to_string(),
                metric: nps(),
                program: "Tier 1".to_string(),
                month: "Jul".to_string(),
                year: 2025,
                actual: Some(79.0),
                goal: None,
            },
            MetricObservation {
                client: "Acme".to_string(),
                organization: "Customer Care".to_string(),
                metric: nps(),
                program: "Tier 1".to_string(),
                month: "Jun".to_string(),
                year: 2025,
                actual: Some(77.0),
                goal: None,
            },
        ];
        let coaching = vec![CoachingObservation {
            client: "Acme".to_string(),
            organization: "Customer Care".to_string(),
            metric: nps(),
            month: "Jun".to_string(),
            year: 2025,
            behavior: "Empathy".to_string(),
            sub_behavior: Some("Mirror".to_string()),
            coaching_count: Some(4),
            effectiveness_pct: None,
        }];

        let (snapshot, diagnostics) = build_snapshot(&request(), &metrics, &coaching).unwrap();
        let report = build_report(&snapshot, Some(&diagnostics));

        assert!(report.contains("# NPS Performance Snapshot"));
        assert!(report.contains("- Jul 2025: 79.00"));
        assert!(report.contains("- Change: 2.00 (2.60%)"));
        assert!(report.contains("- Empathy: 4 sessions (100.0% of total)"));
        assert!(report.contains("  - Mirror: 4 sessions (100.0% of behavior)"));
        assert!(report.contains("- Effectiveness: no effectiveness data (0 of 1 rows with data)"));
        assert!(report.contains("- Volume: +4 sessions (N/A)"));
        assert!(report.contains("No coaching recorded for this window."));
        assert!(report.contains("| Current metric | 2 | 2 | 2 | 2 | 1 | 2 | 1 | 1 | 0 |"));
        assert!(!report.contains("- Goal:"));
    }

    #[test]
    fn omits_diagnostics_unless_requested() {
        let (snapshot, _) = build_snapshot(&request(), &[], &[]).unwrap();
        let report = build_report(&snapshot, None);
        assert!(!report.contains("## Match Diagnostics"));
        assert!(report.contains("- Change: N/A (N/A)"));
        assert!(report.contains("- Effectiveness coverage: 0 of 0 current, 0 of 0 previous"));
    }
}
