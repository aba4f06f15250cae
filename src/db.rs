use anyhow::Context;
use chrono::Month;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::matcher::month_spellings;
use crate::models::{
    parse_numeric, CoachingObservation, MetricLabel, MetricObservation, ProgramPerformance,
    Snapshot,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let metrics = vec![
        ("seed-m-001", "Acme", "Tier 1 Voice", "Jun", 77.0),
        ("seed-m-002", "Acme", "Tier 1 Voice", "Jul", 80.0),
        ("seed-m-003", "Acme", "Tier 2 Chat", "Jul", 78.0),
        ("seed-m-004", "Globex", "Billing", "Apr", 71.5),
        ("seed-m-005", "Globex", "Billing", "May", 73.0),
        ("seed-m-006", "Globex", "Billing", "Aug", 76.0),
    ];

    for (source_key, client, program, month, actual) in metrics {
        sqlx::query(
            r#"
            INSERT INTO coaching_impact.metric_observations
            (id, source_key, client, organization, amplifai_metric, metric, program, month, year, actual, goal)
            VALUES ($1, $2, $3, 'Customer Care', 'NPS', 'Net Promoter Score', $4, $5, 2025, $6, 75.0)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(source_key)
        .bind(client)
        .bind(program)
        .bind(month)
        .bind(actual)
        .execute(pool)
        .await?;
    }

    let coaching = vec![
        ("seed-c-001", "Acme", "May", "Empathy", Some("Acknowledge feelings"), 14, Some(72.0)),
        ("seed-c-002", "Acme", "Jun", "Empathy", Some("Acknowledge feelings"), 9, Some(81.0)),
        ("seed-c-003", "Acme", "Jun", "Ownership", Some("Set expectations"), 6, None),
        ("seed-c-004", "Acme", "June", "Ownership", None, 3, Some(64.0)),
        ("seed-c-005", "Globex", "Jan", "Call Control", Some("Agenda setting"), 5, Some(58.0)),
        ("seed-c-006", "Globex", "Apr", "Call Control", Some("Agenda setting"), 8, Some(66.0)),
    ];

    for (source_key, client, month, behavior, sub_behavior, count, effectiveness) in coaching {
        sqlx::query(
            r#"
            INSERT INTO coaching_impact.coaching_observations
            (id, source_key, client, organization, amplifai_metric, metric, month, year,
             behavior, sub_behavior, coaching_count, effectiveness_pct)
            VALUES ($1, $2, $3, 'Customer Care', NULL, 'NPS', $4, 2025, $5, $6, $7, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(source_key)
        .bind(client)
        .bind(month)
        .bind(behavior)
        .bind(sub_behavior)
        .bind(count as i64)
        .bind(effectiveness)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Every metric row for the year. Organization, client, metric and month
/// filtering is left to the snapshot engine so SQL and Rust never disagree
/// on what counts as whitespace.
pub async fn fetch_metric_rows(
    pool: &PgPool,
    year: i32,
) -> anyhow::Result<Vec<MetricObservation>> {
    let records = sqlx::query(
        "SELECT client, organization, amplifai_metric, metric, program, month, year, actual, goal \
         FROM coaching_impact.metric_observations \
         WHERE year = $1",
    )
    .bind(year)
    .fetch_all(pool)
    .await
    .context("failed to fetch metric observations")?;

    let mut rows = Vec::with_capacity(records.len());
    for row in records {
        rows.push(MetricObservation {
            client: row.get("client"),
            organization: row.get("organization"),
            metric: MetricLabel {
                standardized: row.get("amplifai_metric"),
                freeform: row.get("metric"),
            },
            program: row.get("program"),
            month: row.get("month"),
            year: row.get("year"),
            actual: row.get("actual"),
            goal: row.get("goal"),
        });
    }

    debug!(year, rows = rows.len(), "fetched metric rows");
    Ok(rows)
}

pub async fn fetch_coaching_rows(
    pool: &PgPool,
    year: i32,
) -> anyhow::Result<Vec<CoachingObservation>> {
    let records = sqlx::query(
        "SELECT client, organization, amplifai_metric, metric, month, year, behavior, \
         sub_behavior, coaching_count, effectiveness_pct \
         FROM coaching_impact.coaching_observations \
         WHERE year = $1",
    )
    .bind(year)
    .fetch_all(pool)
    .await
    .context("failed to fetch coaching observations")?;

    let mut rows = Vec::with_capacity(records.len());
    for row in records {
        rows.push(CoachingObservation {
            client: row.get("client"),
            organization: row.get("organization"),
            metric: MetricLabel {
                standardized: row.get("amplifai_metric"),
                freeform: row.get("metric"),
            },
            month: row.get("month"),
            year: row.get("year"),
            behavior: row.get("behavior"),
            sub_behavior: row.get("sub_behavior"),
            coaching_count: row.get("coaching_count"),
            effectiveness_pct: row.get("effectiveness_pct"),
        });
    }

    debug!(year, rows = rows.len(), "fetched coaching rows");
    Ok(rows)
}

pub async fn import_metrics_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        client: String,
        organization: String,
        amplifai_metric: Option<String>,
        metric: Option<String>,
        program: String,
        month: String,
        year: i32,
        actual: Option<String>,
        goal: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO coaching_impact.metric_observations
            (id, source_key, client, organization, amplifai_metric, metric, program, month, year, actual, goal)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(source_key)
        .bind(&row.client)
        .bind(&row.organization)
        .bind(non_blank(row.amplifai_metric))
        .bind(non_blank(row.metric))
        .bind(&row.program)
        .bind(&row.month)
        .bind(row.year)
        .bind(parse_numeric(row.actual.as_deref()))
        .bind(parse_numeric(row.goal.as_deref()))
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    info!(path = %csv_path.display(), inserted, "imported metric observations");
    Ok(inserted)
}

pub async fn import_coaching_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        client: String,
        organization: String,
        amplifai_metric: Option<String>,
        metric: Option<String>,
        month: String,
        year: i32,
        behavior: String,
        sub_behavior: Option<String>,
        coaching_count: Option<String>,
        effectiveness_pct: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        let coaching_count =
            parse_numeric(row.coaching_count.as_deref()).map(|count| count.round() as i64);

        let result = sqlx::query(
            r#"
            INSERT INTO coaching_impact.coaching_observations
            (id, source_key, client, organization, amplifai_metric, metric, month, year,
             behavior, sub_behavior, coaching_count, effectiveness_pct)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(source_key)
        .bind(&row.client)
        .bind(&row.organization)
        .bind(non_blank(row.amplifai_metric))
        .bind(non_blank(row.metric))
        .bind(&row.month)
        .bind(row.year)
        .bind(&row.behavior)
        .bind(non_blank(row.sub_behavior))
        .bind(coaching_count)
        .bind(parse_numeric(row.effectiveness_pct.as_deref()))
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    info!(path = %csv_path.display(), inserted, "imported coaching observations");
    Ok(inserted)
}

/// Snapshots are append-only; each call writes a new row.
pub async fn store_snapshot(pool: &PgPool, snapshot: &Snapshot) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let request = &snapshot.metadata.request;

    sqlx::query(
        r#"
        INSERT INTO coaching_impact.comparison_snapshots
        (id, organization, metric_name, comparison_type, current_period, previous_period, snapshot)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(&request.organization)
    .bind(&request.metric_name)
    .bind(request.comparison_type.to_string())
    .bind(&snapshot.metadata.periods.current_period)
    .bind(&snapshot.metadata.periods.previous_period)
    .bind(Json(snapshot))
    .execute(pool)
    .await
    .context("failed to store comparison snapshot")?;

    Ok(id)
}

/// Programs whose average actual meets or beats their average goal over the
/// given months, best attainment first.
pub async fn fetch_high_performers(
    pool: &PgPool,
    organization: &str,
    metric_name: &str,
    year: i32,
    months: &[Month],
    limit: i64,
) -> anyhow::Result<Vec<ProgramPerformance>> {
    let spellings: Vec<String> = months.iter().copied().flat_map(month_spellings).collect();
    let records = sqlx::query(
        r#"
        SELECT program,
               AVG(actual) AS avg_actual,
               AVG(goal) AS avg_goal,
               AVG(actual) / NULLIF(AVG(goal), 0) * 100 AS attainment_pct,
               COUNT(*) AS observation_count
        FROM coaching_impact.metric_observations
        WHERE lower(trim(organization)) = lower(trim($1))
          AND (lower(trim(amplifai_metric)) = lower(trim($2))
               OR lower(trim(metric)) = lower(trim($2)))
          AND year = $3
          AND lower(btrim(month, E' \t\r\n')) = ANY($4)
          AND actual IS NOT NULL
          AND goal IS NOT NULL
        GROUP BY program
        HAVING AVG(goal) <> 0 AND AVG(actual) >= AVG(goal)
        ORDER BY attainment_pct DESC, program
        LIMIT $5
        "#,
    )
    .bind(organization)
    .bind(metric_name)
    .bind(year)
    .bind(&spellings)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to fetch high performers")?;

    let mut performers = Vec::with_capacity(records.len());
    for row in records {
        performers.push(ProgramPerformance {
            program: row.get("program"),
            avg_actual: row.get("avg_actual"),
            avg_goal: row.get("avg_goal"),
            attainment_pct: row.get("attainment_pct"),
            observation_count: row.get("observation_count"),
        });
    }

    Ok(performers)
}
