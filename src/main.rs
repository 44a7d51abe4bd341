// src/main.rs
use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, ValueEnum};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod bigquery;
mod calendar;
mod config;
mod csv_sink;
mod daily;
mod directory;
mod http;
mod kot;
mod lenient;
mod monthly;
mod pipeline;
mod rows;
mod smarthr;
mod warehouse;

use bigquery::BigQuerySink;
use calendar::TargetMonth;
use config::{require, EtlConfig};
use csv_sink::CsvSink;
use kot::KotClient;
use pipeline::{AttendanceSource, DirectorySource, Job, Pipeline, RunSettings, Tables};
use smarthr::SmartHrClient;
use warehouse::{TableRef, WarehouseSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    Bigquery,
    Csv,
}

/// Loads SmartHR employees and KING OF TIME attendance into the warehouse.
#[derive(Parser, Debug)]
#[command(name = "kintai-sync", version, about)]
struct Cli {
    /// Target month (YYYY-MM). Defaults to TARGET_MONTH, then the previous month.
    #[arg(long)]
    month: Option<TargetMonth>,

    /// Jobs to run, comma separated.
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = [Job::Employees, Job::Daily, Job::Monthly]
    )]
    jobs: Vec<Job>,

    #[arg(long, value_enum, default_value_t = SinkKind::Bigquery)]
    sink: SinkKind,

    /// Directory for `--sink csv` output.
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting tracing subscriber failed")?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env before tracing so RUST_LOG can come from it
    dotenv::dotenv().ok();
    init_tracing()?;
    let cli = Cli::parse();

    let config = EtlConfig::from_env().context("Loading configuration failed")?;
    debug!("Configuration: {:?}", config);

    let month = config.resolve_month(cli.month, Local::now().date_naive());
    let jobs: BTreeSet<Job> = cli.jobs.iter().copied().collect();
    let timeout = config.http_timeout();
    info!("Target month {}, jobs {:?}, sink {:?}", month, jobs, cli.sink);

    let smarthr = if jobs.contains(&Job::Employees) {
        Some(SmartHrClient::new(
            require(&config.smarthr_subdomain, "SMARTHR_SUBDOMAIN")?,
            require(&config.smarthr_token, "SMARTHR_TOKEN")?,
            timeout,
        )?)
    } else {
        None
    };

    let kot = if jobs.contains(&Job::Daily) || jobs.contains(&Job::Monthly) {
        Some(KotClient::new(
            &config.kot_base_url,
            require(&config.kot_token, "KOT_TOKEN")?,
            timeout,
        )?)
    } else {
        None
    };

    let (project, dataset, sink): (String, String, Box<dyn WarehouseSink>) = match cli.sink {
        SinkKind::Bigquery => (
            require(&config.gcp_project_id, "GCP_PROJECT_ID")?.to_string(),
            require(&config.bq_dataset, "BQ_DATASET")?.to_string(),
            Box::new(BigQuerySink::new(
                require(&config.gcp_access_token, "GCP_ACCESS_TOKEN")?,
                config.bq_location.clone(),
                timeout,
            )?) as Box<dyn WarehouseSink>,
        ),
        SinkKind::Csv => (
            config.gcp_project_id.clone().unwrap_or_default(),
            config.bq_dataset.clone().unwrap_or_default(),
            Box::new(CsvSink::new(cli.output_dir.clone())) as Box<dyn WarehouseSink>,
        ),
    };

    let settings = RunSettings {
        month,
        jobs,
        tables: Tables {
            employees: TableRef::new(&project, &dataset, &config.bq_table_employees),
            daily: TableRef::new(&project, &dataset, &config.bq_table_daily),
            monthly: TableRef::new(&project, &dataset, &config.bq_table_monthly),
        },
        company_holidays: config.company_holidays_for(month)?,
        daily_working_hours: config.daily_working_hours,
        classifier: config.regime_classifier(),
    };

    let pipeline = Pipeline::new(
        smarthr.as_ref().map(|c| c as &dyn DirectorySource),
        kot.as_ref().map(|c| c as &dyn AttendanceSource),
        sink.as_ref(),
        settings,
    );
    let summary = pipeline
        .run()
        .await
        .with_context(|| format!("ETL run for {} failed", month))?;

    info!("All selected jobs completed: {:?}", summary);
    Ok(())
}
