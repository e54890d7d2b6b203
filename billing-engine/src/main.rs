use anyhow::{bail, Context, Result};
use billing_engine::{
    calendar::YearMonth,
    chart::ChartBundle,
    config::AppConfig,
    customers::{load_customers, CustomerRecord},
    invoice::InvoiceSummary,
    ledger::{LedgerUpdate, ResultsLedger},
    metrics_export, observability,
    pipeline::BillingPipeline,
    sources::{is_fixture_meter, FixtureReadingSource, QuestDbReadingSource, RoutingReadingSource},
};
use futures::{stream, StreamExt};
use sqlx::postgres::PgPoolOptions;
use std::{env, fs, time::Duration};

/// Compute billing figures and chart series for every customer in the
/// directory (or only the listed sensor ids) for one month.
///
/// Usage:
///   billing-engine <year> <month> [sensor_id ...]
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: billing-engine <year> <month> [sensor_id ...]");
    }
    let year: i32 = args[1].parse().with_context(|| format!("invalid year '{}'", args[1]))?;
    let month: u8 = args[2].parse().with_context(|| format!("invalid month '{}'", args[2]))?;
    let period = YearMonth::new(year, month)?;
    let only: Vec<&str> = args[3..].iter().map(String::as_str).collect();

    // Load configuration
    let cfg = AppConfig::load()?;

    if cfg.metrics.is_some() {
        metrics_export::init()?;
    }

    let customers: Vec<CustomerRecord> = load_customers(&cfg.customers.path)?
        .into_iter()
        .filter(|c| only.is_empty() || only.contains(&c.sensor_id.as_str()))
        .collect();
    if customers.is_empty() {
        tracing::warn!(period = %period, "no customers selected");
        return Ok(());
    }

    // Connect to QuestDB only if some meter is not served from fixtures.
    let needs_live = customers.iter().any(|c| !is_fixture_meter(&c.sensor_id));
    let live = if needs_live {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.questdb.max_connections)
            .acquire_timeout(Duration::from_millis(cfg.questdb.acquire_timeout_ms))
            .connect(&cfg.questdb.uri)
            .await?;
        Some(QuestDbReadingSource::new(pool))
    } else {
        None
    };
    let source = RoutingReadingSource::new(live, FixtureReadingSource::new(&cfg.fixtures.dir));
    let pipeline = BillingPipeline::new(source, cfg.engine.clone());

    fs::create_dir_all(&cfg.output.report_dir)
        .with_context(|| format!("creating report directory {}", cfg.output.report_dir.display()))?;
    let mut ledger = ResultsLedger::load(cfg.output.report_dir.join("results.json"))?;

    // Runs are independent; a failure for one customer never stops the others.
    let outcomes: Vec<_> = stream::iter(customers.iter())
        .map(|customer| {
            let pipeline = &pipeline;
            async move { (customer, pipeline.run(&customer.billing_request(period)).await) }
        })
        .buffer_unordered(cfg.output.workers.max(1))
        .collect()
        .await;

    let mut updated = 0usize;
    for (customer, outcome) in outcomes {
        let report = match outcome {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(customer = %customer.customer, city = %customer.city, error = %e, "billing run failed");
                continue;
            }
        };

        let Some(summary) = InvoiceSummary::build(customer, &report) else {
            tracing::warn!(
                customer = %customer.customer,
                city = %customer.city,
                "no meter data available during this billing period"
            );
            continue;
        };

        if let Err(e) = ChartBundle::from_report(&report).write(&cfg.output.report_dir, &summary.report_file_name) {
            tracing::error!(report = %summary.report_file_name, error = %e, "failed to write chart series");
        }
        if summary.billed_price.is_none() {
            tracing::warn!(report = %summary.report_file_name, "no billed price; amount due left blank");
        }

        tracing::info!(
            report = %summary.report_file_name,
            gallons_saved = summary.volume,
            amount_due = ?summary.amount_due,
            "billing completed"
        );
        if ledger.record(summary) != LedgerUpdate::Unchanged {
            updated += 1;
        }
    }

    ledger.save()?;
    tracing::info!(period = %period, customers = customers.len(), updated, ledger = %ledger.path().display(), "batch finished");

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_export::write_textfile(&metrics_cfg.textfile_path)?;
    }

    Ok(())
}
