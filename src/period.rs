use chrono::Month;

use crate::error::{ComparisonError, Result};
use crate::matcher::normalize_month;
use crate::models::ComparisonType;

const MONTH_CODES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn month_code(month: Month) -> &'static str {
    MONTH_CODES[(month.number_from_month() - 1) as usize]
}

/// Ordered months inside a single year filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub label: String,
    pub months: Vec<Month>,
    pub year: i32,
}

impl Period {
    fn from_months(months: Vec<Month>, year: i32) -> Self {
        let label = format!(
            "{} {}",
            months
                .iter()
                .map(|month| month_code(*month))
                .collect::<Vec<_>>()
                .join(", "),
            year
        );
        Self {
            label,
            months,
            year,
        }
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.months.iter().map(|month| month_code(*month)).collect()
    }

    /// Moves every month back `steps` positions around the 12-month cycle.
    /// The year filter is left alone.
    pub fn shifted_back(&self, steps: usize) -> Self {
        let months = self
            .months
            .iter()
            .map(|month| (0..steps).fold(*month, |acc, _| acc.pred()))
            .collect();
        Self::from_months(months, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformancePeriods {
    pub current: Period,
    pub previous: Period,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoachingPeriods {
    pub current: Period,
    pub previous: Period,
}

pub fn resolve(
    comparison_type: ComparisonType,
    current_selector: &str,
    previous_selector: &str,
    year: i32,
) -> Result<PerformancePeriods> {
    Ok(PerformancePeriods {
        current: resolve_selector(comparison_type, current_selector, year)?,
        previous: resolve_selector(comparison_type, previous_selector, year)?,
    })
}

pub fn resolve_selector(
    comparison_type: ComparisonType,
    selector: &str,
    year: i32,
) -> Result<Period> {
    match comparison_type {
        ComparisonType::Month => month_period(selector, year),
        ComparisonType::Quarter => quarter_period(selector, year),
    }
}

/// Coaching is credited one period ahead, so the coaching windows sit one
/// period before the performance windows.
///
/// In quarter mode the current coaching window is the previous performance
/// quarter and the previous coaching window is one further quarter back.
pub fn coaching_periods(
    comparison_type: ComparisonType,
    performance: &PerformancePeriods,
) -> CoachingPeriods {
    match comparison_type {
        ComparisonType::Month => CoachingPeriods {
            current: performance.current.shifted_back(1),
            previous: performance.previous.shifted_back(1),
        },
        ComparisonType::Quarter => {
            let current = Period::from_months(
                performance.previous.months.clone(),
                performance.previous.year,
            );
            let previous = current.shifted_back(3);
            CoachingPeriods { current, previous }
        }
    }
}

fn month_period(selector: &str, year: i32) -> Result<Period> {
    let month = normalize_month(selector)
        .ok_or_else(|| ComparisonError::UnknownMonth(selector.to_string()))?;
    Ok(Period {
        label: format!("{} {}", month_code(month), year),
        months: vec![month],
        year,
    })
}

fn quarter_period(selector: &str, year: i32) -> Result<Period> {
    let code = selector.trim().to_ascii_uppercase();
    let months = match code.as_str() {
        "Q1" => vec![Month::January, Month::February, Month::March],
        "Q2" => vec![Month::April, Month::May, Month::June],
        "Q3" => vec![Month::July, Month::August, Month::September],
        "Q4" => vec![Month::October, Month::November, Month::December],
        _ => return Err(ComparisonError::UnknownQuarter(selector.to_string())),
    };
    Ok(Period {
        label: format!("{code} {year}"),
        months,
        year,
    })
}
