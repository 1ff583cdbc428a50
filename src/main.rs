use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

mod checks;
mod config;
mod derive;
mod error;
mod fingerprint;
mod import;
mod models;
mod report;
mod series;
mod session;
mod store;

use models::{Channel, ChannelLabel, Metric};
use session::Session;
use store::FileStore;

#[derive(Parser)]
#[command(name = "wbr")]
#[command(about = "Weekly business review: week-over-week deltas, anomalies and audit fingerprints", long_about = None)]
struct Cli {
    /// Key/value store file (overrides WBR_STORE_PATH)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the document (seeded with sample weeks) if it does not exist
    Init {
        /// Replace the current weeks with the sample series
        #[arg(long)]
        reset: bool,
    },
    /// Print KPI cards and the history grid
    Show,
    /// Run the self-check gate; exits non-zero when any check fails
    Check,
    /// Replace one field in one week
    Edit {
        /// Week index, 0 = oldest, 7 = latest
        #[arg(long)]
        week: usize,
        /// Metric (revenue, dealCount, activeCount, acquisitionCost), channel
        /// (paid, organic, email, referral) or period_end
        #[arg(long)]
        field: String,
        #[arg(long)]
        value: String,
    },
    /// Drop the oldest week and append a copy of the latest one week later
    Roll,
    /// Update configuration values
    Config {
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        logic_version: Option<String>,
    },
    /// Render the review as Markdown or JSON
    Report {
        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace the history grid from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Write the history grid to a CSV file
    Export {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print document identity, fingerprint and baseline
    Audit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let app = config::AppConfig::from_env()?;
    app.log_summary();

    let store_path = cli.store.unwrap_or_else(|| app.store_path.clone());
    let store = FileStore::open(&store_path)
        .with_context(|| format!("failed to open store at {}", store_path.display()))?;
    tracing::debug!(store = %store.path().display(), "using store");
    let mut session =
        Session::open(store, app.seed_configuration()).context("failed to load document")?;
    session.refresh_fingerprint().await;

    match cli.command {
        Commands::Init { reset } => {
            if reset {
                session.replace_series(series::RecordSeries::sample()).await?;
            }
            println!("Document {} ready.", session.audit().document_id);
        }
        Commands::Show => print_cards(&session),
        Commands::Check => {
            print_checks(&session);
            if !session.gate_passed() {
                bail!("self-check gate failed");
            }
        }
        Commands::Edit { week, field, value } => {
            apply_edit(&mut session, week, &field, &value).await?;
            print_cards(&session);
        }
        Commands::Roll => {
            if let Some(period_end) = session.roll_forward().await? {
                println!("Rolled forward to week ending {period_end}.");
            }
        }
        Commands::Config {
            label,
            threshold,
            logic_version,
        } => {
            if let Some(label) = label {
                let label: ChannelLabel = label.parse()?;
                session.set_channel_label(label).await?;
            }
            if let Some(threshold) = threshold {
                let applied = session.set_threshold(threshold).await?;
                println!("Alert threshold set to {}.", report::format_share(applied));
            }
            if let Some(version) = logic_version {
                session.set_logic_version(&version).await?;
            }
            let config = session.config();
            println!(
                "Channel label {}, threshold {}, logic {}.",
                config.channel_label.map(|l| l.as_str()).unwrap_or("(unset)"),
                report::format_share(config.alert_threshold),
                config.logic_version
            );
        }
        Commands::Report { format, out } => {
            let rendered = match format {
                ReportFormat::Markdown => report::to_report(
                    session.series(),
                    session.config(),
                    session.derived(),
                    session.audit(),
                ),
                ReportFormat::Json => report::to_json(
                    session.series(),
                    session.config(),
                    session.derived(),
                    session.audit(),
                )?,
            };
            match out {
                Some(out) => {
                    std::fs::write(&out, rendered)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                    println!("Report written to {}.", out.display());
                }
                None => print!("{rendered}"),
            }
        }
        Commands::Import { csv } => {
            let series = import::import_csv(&csv)
                .with_context(|| format!("failed to import {}", csv.display()))?;
            session.replace_series(series).await?;
            println!("Imported 8 weeks from {}.", csv.display());
        }
        Commands::Export { csv } => {
            let written = import::export_csv(session.series(), &csv)?;
            println!("Exported {written} weeks to {}.", csv.display());
        }
        Commands::Audit => {
            let audit = session.audit();
            println!("Document:    {}", audit.document_id);
            println!(
                "Fingerprint: {}",
                audit.fingerprint.as_deref().unwrap_or("(pending)")
            );
            println!("Baseline:    {}", audit.baseline.as_deref().unwrap_or("(none)"));
            println!("Drifted:     {}", if audit.drifted() { "yes" } else { "no" });
            println!("Last run:    {}", audit.last_run.to_rfc3339());
        }
    }

    Ok(())
}

async fn apply_edit(
    session: &mut Session<FileStore>,
    week: usize,
    field: &str,
    value: &str,
) -> anyhow::Result<()> {
    if matches!(field, "period_end" | "periodEnd" | "date") {
        let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .with_context(|| format!("period_end must be YYYY-MM-DD, got {value:?}"))?;
        session.set_period_end(week, date).await?;
        return Ok(());
    }
    if let Ok(metric) = field.parse::<Metric>() {
        let applied = session.set_metric(week, metric, value).await?;
        println!("Week {week} {metric} = {applied}");
        return Ok(());
    }
    let channel: Channel = field.parse()?;
    let applied = session.set_channel(week, channel, value).await?;
    println!("Week {week} {channel} = {applied}");
    Ok(())
}

fn print_cards(session: &Session<FileStore>) {
    let derived = session.derived();
    if let Some(latest) = session.series().latest() {
        println!("Week ending {}:", latest.period_end);
    }
    for metric in Metric::ALL {
        let Some(metric_series) = derived.metric(metric) else {
            continue;
        };
        let current = metric_series
            .latest_value()
            .map(|value| report::format_metric(metric, value))
            .unwrap_or_else(|| report::MISSING_DELTA.to_string());
        println!(
            "- {}: {} ({}){}",
            metric.label(),
            current,
            report::format_delta(metric_series.latest_delta()),
            if metric_series.latest_anomaly() { " [alert]" } else { "" }
        );
    }

    println!();
    println!("Channels:");
    for row in &derived.channels {
        println!(
            "- {}: {} ({}, {} share)",
            row.channel,
            report::format_count(row.current),
            report::format_delta(row.wow),
            report::format_share(row.share)
        );
    }

    println!();
    println!("History:");
    for (week, record) in session.series().records().iter().enumerate() {
        println!(
            "{week} {} revenue {} deals {} active {} cac {}",
            record.period_end,
            report::format_currency(record.metrics.revenue),
            report::format_count(record.metrics.deal_count),
            report::format_count(record.metrics.active_count),
            report::format_currency(record.metrics.acquisition_cost)
        );
    }
}

fn print_checks(session: &Session<FileStore>) {
    println!(
        "Gate: {}",
        if session.gate_passed() { "PASS" } else { "FAIL" }
    );
    for result in session.checks() {
        println!(
            "- {} {}: {}",
            if result.passed { "ok  " } else { "FAIL" },
            result.name,
            result.message
        );
    }
}
