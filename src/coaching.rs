use std::collections::HashMap;

use crate::metrics::{mean, percent_label};
use crate::models::{
    round_to, BehaviorRank, CoachingChange, CoachingObservation, CoachingPeriodSummary,
    EffectivenessCoverage, SubBehaviorRank, NOT_APPLICABLE, NO_EFFECTIVENESS_DATA,
};

pub const TOP_BEHAVIORS: usize = 5;
pub const TOP_SUB_BEHAVIORS: usize = 3;

fn session_count(row: &CoachingObservation) -> i64 {
    row.coaching_count.unwrap_or(0)
}

/// Saturates instead of overflowing on absurd imported counts.
fn total_sessions<'r>(rows: impl IntoIterator<Item = &'r CoachingObservation>) -> i64 {
    rows.into_iter()
        .fold(0i64, |total, row| total.saturating_add(session_count(row)))
}

fn share(part: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round_to(part as f64 / total as f64 * 100.0, 1)
    }
}

/// Sums counts per key, keeping first-seen order, then ranks by count
/// descending. The sort is stable so ties keep their first-seen order.
fn rank_by_count<'r, I>(entries: I, limit: usize) -> Vec<(&'r str, i64)>
where
    I: IntoIterator<Item = (&'r str, i64)>,
{
    let mut totals: Vec<(&str, i64)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for (key, count) in entries {
        match positions.get(key) {
            Some(&index) => totals[index].1 = totals[index].1.saturating_add(count),
            None => {
                positions.insert(key, totals.len());
                totals.push((key, count));
            }
        }
    }

    totals.sort_by(|a, b| b.1.cmp(&a.1));
    totals.truncate(limit);
    totals
}

fn sub_behaviors(rows: &[&CoachingObservation], behavior: &str) -> Vec<SubBehaviorRank> {
    let behavior_rows: Vec<&CoachingObservation> = rows
        .iter()
        .copied()
        .filter(|row| row.behavior == behavior)
        .collect();
    let behavior_total = total_sessions(behavior_rows.iter().copied());

    let tagged = behavior_rows.iter().filter_map(|row| {
        row.sub_behavior
            .as_deref()
            .map(str::trim)
            .filter(|sub| !sub.is_empty())
            .map(|sub| (sub, session_count(row)))
    });

    rank_by_count(tagged, TOP_SUB_BEHAVIORS)
        .into_iter()
        .map(|(sub_behavior, coaching_count)| SubBehaviorRank {
            sub_behavior: sub_behavior.to_string(),
            coaching_count,
            percent_of_behavior: share(coaching_count, behavior_total),
        })
        .collect()
}

pub fn summarize_period(label: &str, rows: &[&CoachingObservation]) -> CoachingPeriodSummary {
    let total_coaching_sessions = total_sessions(rows.iter().copied());

    let defined: Vec<f64> = rows
        .iter()
        .filter_map(|row| row.effectiveness_pct)
        .filter(|value| value.is_finite())
        .collect();
    let effectiveness_coverage = EffectivenessCoverage {
        with_effectiveness: defined.len(),
        total_rows: rows.len(),
    };
    let coaching_effectiveness = mean(defined);
    let coaching_effectiveness_label = coaching_effectiveness
        .map(|value| format!("{value:.1}%"))
        .unwrap_or_else(|| NO_EFFECTIVENESS_DATA.to_string());

    let top_behaviors = rank_by_count(
        rows.iter()
            .map(|row| (row.behavior.as_str(), session_count(row))),
        TOP_BEHAVIORS,
    )
    .into_iter()
    .map(|(behavior, coaching_count)| BehaviorRank {
        behavior: behavior.to_string(),
        coaching_count,
        percent_of_total: share(coaching_count, total_coaching_sessions),
        sub_behaviors: sub_behaviors(rows, behavior),
    })
    .collect();

    CoachingPeriodSummary {
        period: label.to_string(),
        matched_rows: rows.len(),
        total_coaching_sessions,
        coaching_effectiveness,
        coaching_effectiveness_label,
        effectiveness_coverage,
        top_behaviors,
    }
}

pub fn compare_periods(
    current: &CoachingPeriodSummary,
    previous: &CoachingPeriodSummary,
) -> CoachingChange {
    let volume_change = current
        .total_coaching_sessions
        .saturating_sub(previous.total_coaching_sessions);
    let volume_change_pct = (previous.total_coaching_sessions > 0).then(|| {
        round_to(
            volume_change as f64 / previous.total_coaching_sessions as f64 * 100.0,
            2,
        )
    });

    let effectiveness_change_points =
        match (current.coaching_effectiveness, previous.coaching_effectiveness) {
            (Some(current), Some(previous)) => Some(round_to(current - previous, 2)),
            _ => None,
        };
    let effectiveness_change_label = effectiveness_change_points
        .map(|points| format!("{points:+.2} pts"))
        .unwrap_or_else(|| NOT_APPLICABLE.to_string());

    CoachingChange {
        volume_change,
        volume_change_pct,
        volume_change_pct_label: percent_label(volume_change_pct),
        effectiveness_change_points,
        effectiveness_change_label,
    }
}
