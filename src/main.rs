use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod coaching;
mod db;
mod error;
mod matcher;
mod metrics;
mod models;
mod period;
mod report;
mod snapshot;

use models::{ComparisonRequest, ComparisonType};

#[derive(Parser)]
#[command(name = "coaching-impact")]
#[command(about = "Compare performance periods against the coaching that preceded them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import metric and/or coaching observations from CSV files
    #[command(group(
        ArgGroup::new("source")
            .args(["metrics", "coaching"])
            .required(true)
            .multiple(true)
    ))]
    Import {
        #[arg(long)]
        metrics: Option<PathBuf>,
        #[arg(long)]
        coaching: Option<PathBuf>,
    },
    /// Build a period-over-period comparison snapshot
    Compare {
        /// Client to include; repeat for several
        #[arg(long = "client", required = true)]
        clients: Vec<String>,
        #[arg(long)]
        organization: String,
        #[arg(long)]
        metric: String,
        #[arg(long)]
        year: i32,
        #[arg(long, value_enum, default_value_t = ComparisonType::Month)]
        comparison_type: ComparisonType,
        /// Month (Jul) or quarter (Q3) being evaluated
        #[arg(long)]
        current: String,
        /// Month or quarter to compare against
        #[arg(long)]
        previous: String,
        /// Write the markdown report here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the snapshot as JSON instead of markdown
        #[arg(long)]
        json: bool,
        /// Include per-filter match diagnostics
        #[arg(long)]
        diagnostics: bool,
        /// Store the snapshot in the database
        #[arg(long)]
        persist: bool,
    },
    /// List programs meeting or beating their goal
    HighPerformers {
        #[arg(long)]
        organization: String,
        #[arg(long)]
        metric: String,
        #[arg(long)]
        year: i32,
        #[arg(long, value_enum, default_value_t = ComparisonType::Month)]
        period_type: ComparisonType,
        /// Month (Jul) or quarter (Q3)
        #[arg(long)]
        period: String,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { metrics, coaching } => {
            if let Some(path) = metrics {
                let inserted = db::import_metrics_csv(&pool, &path).await?;
                println!("Inserted {inserted} metric rows from {}.", path.display());
            }
            if let Some(path) = coaching {
                let inserted = db::import_coaching_csv(&pool, &path).await?;
                println!("Inserted {inserted} coaching rows from {}.", path.display());
            }
        }
        Commands::Compare {
            clients,
            organization,
            metric,
            year,
            comparison_type,
            current,
            previous,
            out,
            json,
            diagnostics,
            persist,
        } => {
            let request = ComparisonRequest {
                clients: clients.into_iter().collect::<BTreeSet<_>>(),
                organization,
                metric_name: metric,
                year,
                comparison_type,
                current_selector: current,
                previous_selector: previous,
            };

            let (metric_rows, coaching_rows) = tokio::try_join!(
                db::fetch_metric_rows(&pool, request.year),
                db::fetch_coaching_rows(&pool, request.year),
            )?;
            let (snapshot, match_diagnostics) =
                snapshot::build_snapshot(&request, &metric_rows, &coaching_rows)?;
            info!(
                current = %snapshot.metadata.periods.current_period,
                previous = %snapshot.metadata.periods.previous_period,
                change = %snapshot.metadata.comparison.percent_change_label,
                "snapshot built"
            );

            if persist {
                let id = db::store_snapshot(&pool, &snapshot).await?;
                info!(%id, "snapshot stored");
            }

            let rendered = if json {
                let value = if diagnostics {
                    serde_json::json!({
                        "snapshot": serde_json::to_value(&snapshot)?,
                        "diagnostics": serde_json::to_value(&match_diagnostics)?,
                    })
                } else {
                    serde_json::to_value(&snapshot)?
                };
                serde_json::to_string_pretty(&value)?
            } else {
                report::build_report(&snapshot, diagnostics.then_some(&match_diagnostics))
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Snapshot written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Commands::HighPerformers {
            organization,
            metric,
            year,
            period_type,
            period,
            limit,
        } => {
            let window = period::resolve_selector(period_type, &period, year)?;
            let performers = db::fetch_high_performers(
                &pool,
                &organization,
                &metric,
                year,
                &window.months,
                limit,
            )
            .await?;

            if performers.is_empty() {
                println!("No programs met their goal in {}.", window.label);
                return Ok(());
            }

            println!("Programs at or above goal in {}:", window.label);
            for performer in performers.iter() {
                println!(
                    "- {} averaged {:.2} against a goal of {:.2} ({:.1}% attainment, {} observations)",
                    performer.program,
                    performer.avg_actual,
                    performer.avg_goal,
                    performer.attainment_pct,
                    performer.observation_count
                );
            }
        }
    }

    Ok(())
}
