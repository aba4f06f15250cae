use std::collections::HashSet;

use crate::models::{round_to, MetricComparison, MetricObservation, NOT_APPLICABLE};

pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .filter(|value| value.is_finite())
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

pub fn percent_change(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    match (current, previous) {
        (Some(current), Some(previous)) if previous != 0.0 => {
            Some(round_to((current - previous) / previous * 100.0, 2))
        }
        _ => None,
    }
}

pub fn percent_label(value: Option<f64>) -> String {
    value
        .map(|value| format!("{value:.2}%"))
        .unwrap_or_else(|| NOT_APPLICABLE.to_string())
}

/// Averages `actual` per period and derives the change between them.
pub fn compare_metric(
    current: &[&MetricObservation],
    previous: &[&MetricObservation],
) -> MetricComparison {
    let current_value = mean(current.iter().filter_map(|row| row.actual));
    let previous_value = mean(previous.iter().filter_map(|row| row.actual));
    let change = match (current_value, previous_value) {
        (Some(current), Some(previous)) => Some(round_to(current - previous, 2)),
        _ => None,
    };
    let percent_change = percent_change(current_value, previous_value);

    let programs_count = current
        .iter()
        .chain(previous.iter())
        .map(|row| row.program.as_str())
        .collect::<HashSet<_>>()
        .len();

    MetricComparison {
        current_value,
        previous_value,
        current_goal: mean(current.iter().filter_map(|row| row.goal)),
        previous_goal: mean(previous.iter().filter_map(|row| row.goal)),
        change,
        percent_change,
        percent_change_label: percent_label(percent_change),
        programs_count,
        current_rows: current.len(),
        previous_rows: previous.len(),
    }
}
