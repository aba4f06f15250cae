use tracing::debug;

use crate::coaching;
use crate::error::{ComparisonError, Result};
use crate::matcher::{MatchDiagnostics, RecordFilter};
use crate::metrics;
use crate::models::{
    CoachingActivity, CoachingChange, CoachingObservation, CoachingPeriodSummary,
    ComparisonRequest, DataQuality, MetricComparison, MetricObservation, PeriodLabels, Snapshot,
    SnapshotMetadata,
};
use crate::period::{self, CoachingPeriods, PerformancePeriods};

/// Builds the comparison snapshot for one request.
///
/// Both record sets are the unfiltered `(organization, year)` superset; all
/// dimension filtering happens here. Empty inputs produce an all-`None`
/// snapshot rather than an error.
pub fn build_snapshot(
    request: &ComparisonRequest,
    metric_rows: &[MetricObservation],
    coaching_rows: &[CoachingObservation],
) -> Result<(Snapshot, MatchDiagnostics)> {
    if request.clients.is_empty() {
        return Err(ComparisonError::EmptyClients);
    }

    let performance = period::resolve(
        request.comparison_type,
        &request.current_selector,
        &request.previous_selector,
        request.year,
    )?;
    let coaching_windows = period::coaching_periods(request.comparison_type, &performance);

    let (current_metric, current_metric_diag) =
        RecordFilter::new(request, &performance.current).select(metric_rows);
    let (previous_metric, previous_metric_diag) =
        RecordFilter::new(request, &performance.previous).select(metric_rows);
    let (current_coaching, current_coaching_diag) =
        RecordFilter::new(request, &coaching_windows.current).select(coaching_rows);
    let (previous_coaching, previous_coaching_diag) =
        RecordFilter::new(request, &coaching_windows.previous).select(coaching_rows);

    debug!(
        current_metric = current_metric.len(),
        previous_metric = previous_metric.len(),
        current_coaching = current_coaching.len(),
        previous_coaching = previous_coaching.len(),
        "matched observation rows"
    );

    let comparison = metrics::compare_metric(&current_metric, &previous_metric);
    let current_summary =
        coaching::summarize_period(&coaching_windows.current.label, &current_coaching);
    let previous_summary =
        coaching::summarize_period(&coaching_windows.previous.label, &previous_coaching);
    let change = coaching::compare_periods(&current_summary, &previous_summary);

    let snapshot = compose(
        request,
        &performance,
        &coaching_windows,
        comparison,
        current_summary,
        previous_summary,
        change,
    );
    let diagnostics = MatchDiagnostics {
        current_metric: current_metric_diag,
        previous_metric: previous_metric_diag,
        current_coaching: current_coaching_diag,
        previous_coaching: previous_coaching_diag,
    };

    Ok((snapshot, diagnostics))
}

fn owned_codes(codes: Vec<&str>) -> Vec<String> {
    codes.into_iter().map(str::to_string).collect()
}

fn compose(
    request: &ComparisonRequest,
    performance: &PerformancePeriods,
    coaching_windows: &CoachingPeriods,
    comparison: MetricComparison,
    current: CoachingPeriodSummary,
    previous: CoachingPeriodSummary,
    change: CoachingChange,
) -> Snapshot {
    let periods = PeriodLabels {
        current_period: performance.current.label.clone(),
        previous_period: performance.previous.label.clone(),
        current_months: owned_codes(performance.current.codes()),
        previous_months: owned_codes(performance.previous.codes()),
        current_coaching_period: coaching_windows.current.label.clone(),
        previous_coaching_period: coaching_windows.previous.label.clone(),
        current_coaching_months: owned_codes(coaching_windows.current.codes()),
        previous_coaching_months: owned_codes(coaching_windows.previous.codes()),
    };

    let data_quality = DataQuality {
        current_metric_rows: comparison.current_rows,
        previous_metric_rows: comparison.previous_rows,
        current_coaching_rows: current.matched_rows,
        previous_coaching_rows: previous.matched_rows,
        current_effectiveness_coverage: current.effectiveness_coverage,
        previous_effectiveness_coverage: previous.effectiveness_coverage,
    };

    Snapshot {
        metadata: SnapshotMetadata {
            request: request.clone(),
            periods,
            comparison,
            data_quality,
        },
        coaching_activity: CoachingActivity {
            current,
            previous,
            change,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComparisonType, MetricLabel, NOT_APPLICABLE, NO_EFFECTIVENESS_DATA};

    fn request(comparison_type: ComparisonType, current: &str, previous: &str) -> ComparisonRequest {
        ComparisonRequest {
            clients: ["Acme".to_string(), "Globex".to_string()].into_iter().collect(),
            organization: "Customer Care".to_string(),
            metric_name: "NPS".to_string(),
            year: 2025,
            comparison_type,
            current_selector: current.to_string(),
            previous_selector: previous.to_string(),
        }
    }

    fn label(name: &str) -> MetricLabel {
        MetricLabel {
            standardized: Some(name.to_string()),
            freeform: None,
        }
    }

    fn metric(program: &str, month: &str, actual: Option<f64>) -> MetricObservation {
        MetricObservation {
            client: "Acme".to_string(),
            organization: "Customer Care".to_string(),
            metric: label("NPS"),
            program: program.to_string(),
            month: month.to_string(),
            year: 2025,
            actual,
            goal: None,
        }
    }

    fn coaching(
        month: &str,
        behavior: &str,
        count: i64,
        effectiveness: Option<f64>,
    ) -> CoachingObservation {
        CoachingObservation {
            client: "Globex".to_string(),
            organization: "customer care ".to_string(),
            metric: label("NPS"),
            month: month.to_string(),
            year: 2025,
            behavior: behavior.to_string(),
            sub_behavior: None,
            coaching_count: Some(count),
            effectiveness_pct: effectiveness,
        }
    }

    #[test]
    fn month_over_month_metric_comparison() {
        let metrics = vec![
            metric("Tier 1", "Jul", Some(80.0)),
            metric("Tier 2", "Jul", Some(78.0)),
            metric("Tier 1", "Jun", Some(77.0)),
            metric("Tier 1", "May", Some(10.0)),
        ];

        let (snapshot, diagnostics) =
            build_snapshot(&request(ComparisonType::Month, "Jul", "Jun"), &metrics, &[]).unwrap();
        let comparison = &snapshot.metadata.comparison;

        assert_eq!(comparison.current_value, Some(79.0));
        assert_eq!(comparison.previous_value, Some(77.0));
        assert_eq!(comparison.change, Some(2.0));
        assert_eq!(comparison.percent_change_label, "2.60%");
        assert_eq!(comparison.programs_count, 2);
        assert_eq!(snapshot.metadata.periods.current_period, "Jul 2025");
        assert_eq!(snapshot.metadata.periods.current_coaching_period, "Jun 2025");
        assert_eq!(snapshot.metadata.data_quality.current_metric_rows, 2);
        assert_eq!(snapshot.metadata.data_quality.previous_metric_rows, 1);
        assert_eq!(diagnostics.current_metric.rows_scanned, 4);
        assert_eq!(diagnostics.current_metric.matched, 2);
    }

    #[test]
    fn quarter_comparison_credits_the_preceding_quarters() {
        let rows = vec![
            coaching("Apr", "Empathy", 4, Some(80.0)),
            coaching("May", "Ownership", 6, None),
            coaching("Jun", "Empathy", 2, Some(90.0)),
            coaching("Jan", "Clarity", 3, Some(60.0)),
            coaching("Mar", "Clarity", 1, None),
            coaching("Jul", "Empathy", 100, Some(10.0)),
        ];

        let (snapshot, _) =
            build_snapshot(&request(ComparisonType::Quarter, "Q3", "Q2"), &[], &rows).unwrap();
        let periods = &snapshot.metadata.periods;
        assert_eq!(periods.current_coaching_months, vec!["Apr", "May", "Jun"]);
        assert_eq!(periods.previous_coaching_months, vec!["Jan", "Feb", "Mar"]);
        assert_eq!(periods.current_coaching_months, periods.previous_months);

        let activity = &snapshot.coaching_activity;
        assert_eq!(activity.current.total_coaching_sessions, 12);
        assert_eq!(activity.previous.total_coaching_sessions, 4);
        assert_eq!(activity.current.coaching_effectiveness, Some(85.0));
        assert_eq!(activity.current.top_behaviors[0].behavior, "Empathy");
        assert_eq!(activity.change.volume_change, 8);
        assert_eq!(activity.change.volume_change_pct, Some(200.0));
        assert_eq!(activity.change.effectiveness_change_points, Some(25.0));
        assert_eq!(
            snapshot.metadata.data_quality.current_effectiveness_coverage.to_string(),
            "2 of 3"
        );
        assert_eq!(
            snapshot.metadata.data_quality.previous_effectiveness_coverage.to_string(),
            "1 of 2"
        );
    }

    #[test]
    fn full_month_names_match_through_normalization() {
        let rows = vec![coaching("September", "Empathy", 5, Some(70.0))];

        let (snapshot, diagnostics) =
            build_snapshot(&request(ComparisonType::Month, "Oct", "Sep"), &[], &rows).unwrap();
        assert_eq!(snapshot.metadata.periods.current_coaching_months, vec!["Sep"]);
        assert_eq!(snapshot.coaching_activity.current.total_coaching_sessions, 5);
        assert_eq!(diagnostics.current_coaching.normalized_month_matches, 1);
    }

    #[test]
    fn no_coaching_rows_degrades_to_sentinels() {
        let (snapshot, _) =
            build_snapshot(&request(ComparisonType::Month, "Jul", "Jun"), &[], &[]).unwrap();
        let activity = &snapshot.coaching_activity;

        for summary in [&activity.current, &activity.previous] {
            assert_eq!(summary.total_coaching_sessions, 0);
            assert_eq!(summary.coaching_effectiveness, None);
            assert_eq!(summary.coaching_effectiveness_label, NO_EFFECTIVENESS_DATA);
            assert!(summary.top_behaviors.is_empty());
        }
        assert_eq!(activity.change.volume_change_pct, None);
        assert_eq!(activity.change.volume_change_pct_label, NOT_APPLICABLE);
        assert_eq!(snapshot.metadata.comparison.percent_change_label, NOT_APPLICABLE);
        assert_eq!(snapshot.metadata.comparison.programs_count, 0);
    }

    #[test]
    fn january_coaching_wraps_to_december_of_the_same_year() {
        let rows = vec![coaching("Dec", "Empathy", 2, None)];
        let (snapshot, _) =
            build_snapshot(&request(ComparisonType::Month, "Jan", "Dec"), &[], &rows).unwrap();
        assert_eq!(snapshot.metadata.periods.current_coaching_months, vec!["Dec"]);
        assert_eq!(snapshot.metadata.periods.previous_coaching_months, vec!["Nov"]);
        assert_eq!(snapshot.coaching_activity.current.total_coaching_sessions, 2);
    }

    #[test]
    fn rejects_bad_requests() {
        assert_eq!(
            build_snapshot(&request(ComparisonType::Quarter, "Q3", "Q9"), &[], &[]).unwrap_err(),
            ComparisonError::UnknownQuarter("Q9".to_string())
        );

        let mut empty = request(ComparisonType::Month, "Jul", "Jun");
        empty.clients.clear();
        assert_eq!(
            build_snapshot(&empty, &[], &[]).unwrap_err(),
            ComparisonError::EmptyClients
        );
    }

    #[test]
    fn same_inputs_give_the_same_snapshot() {
        let metrics = vec![metric("Tier 1", "Jul", Some(80.0))];
        let rows = vec![coaching("Jun", "Empathy", 3, Some(50.0))];
        let req = request(ComparisonType::Month, "Jul", "Jun");

        let (first, _) = build_snapshot(&req, &metrics, &rows).unwrap();
        let (second, _) = build_snapshot(&req, &metrics, &rows).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.metadata.request, req);
    }

    #[test]
    fn rows_from_another_year_do_not_move_the_means() {
        let mut last_year = metric("Tier 3", "Jul", Some(10.0));
        last_year.year = 2024;
        let metrics = vec![
            metric("Tier 1", "Jul", Some(80.0)),
            metric("Tier 2", "Jul", Some(78.0)),
            last_year,
        ];

        let (snapshot, diagnostics) =
            build_snapshot(&request(ComparisonType::Month, "Jul", "Jun"), &metrics, &[]).unwrap();
        assert_eq!(snapshot.metadata.comparison.current_value, Some(79.0));
        assert_eq!(snapshot.metadata.comparison.programs_count, 2);
        assert_eq!(snapshot.metadata.data_quality.current_metric_rows, 2);
        assert_eq!(diagnostics.current_metric.rows_scanned, 3);
        assert_eq!(diagnostics.current_metric.year_matches, 2);
        assert_eq!(diagnostics.current_metric.month_matches, 3);
    }
}
