// src/pipeline.rs
//
// The batch run: fetch every selected feed, transform all rows, then load.
// A failed fetch aborts the run before any table is replaced.

use async_trait::async_trait;
use chrono::NaiveDate;
use clap::ValueEnum;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use tracing::info;

use crate::calendar::{JapaneseHolidays, StandardHoursCalculator, TargetMonth};
use crate::daily::normalize_daily;
use crate::directory::normalize_crews;
use crate::http::ClientError;
use crate::kot::{DailyWorkingDay, KotClient, MonthlyWorking};
use crate::monthly::{build_type_lookup, MonthlyReconciler, RegimeClassifier};
use crate::rows::{DailyAttendanceRow, EmployeeRow, MonthlyAttendanceRow};
use crate::smarthr::{Crew, SmartHrClient};
use crate::warehouse::{load_table, SinkError, TableRef, WarehouseSink};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Source API error: {0}")]
    Client(#[from] ClientError),

    #[error("Warehouse error: {0}")]
    Sink(#[from] SinkError),

    #[error("Job '{job}' selected but no {source_name} client is configured")]
    SourceUnavailable {
        job: Job,
        source_name: &'static str,
    },
}

// --- Sources ---

#[async_trait]
pub trait DirectorySource: Send + Sync {
    async fn fetch_crews(&self) -> Result<Vec<Option<Crew>>, ClientError>;
}

#[async_trait]
pub trait AttendanceSource: Send + Sync {
    async fn fetch_daily(&self, month: TargetMonth) -> Result<Vec<DailyWorkingDay>, ClientError>;
    async fn fetch_monthly(&self, month: TargetMonth) -> Result<Vec<MonthlyWorking>, ClientError>;
}

#[async_trait]
impl DirectorySource for SmartHrClient {
    async fn fetch_crews(&self) -> Result<Vec<Option<Crew>>, ClientError> {
        self.fetch_all_crews().await
    }
}

#[async_trait]
impl AttendanceSource for KotClient {
    async fn fetch_daily(&self, month: TargetMonth) -> Result<Vec<DailyWorkingDay>, ClientError> {
        self.fetch_daily_workings_for_month(month).await
    }

    async fn fetch_monthly(&self, month: TargetMonth) -> Result<Vec<MonthlyWorking>, ClientError> {
        self.fetch_monthly_workings(month).await
    }
}

// --- Run Settings ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Job {
    Employees,
    Daily,
    Monthly,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Job::Employees => "employees",
            Job::Daily => "daily",
            Job::Monthly => "monthly",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Tables {
    pub employees: TableRef,
    pub daily: TableRef,
    pub monthly: TableRef,
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub month: TargetMonth,
    pub jobs: BTreeSet<Job>,
    pub tables: Tables,
    pub company_holidays: BTreeSet<NaiveDate>,
    pub daily_working_hours: u32,
    pub classifier: RegimeClassifier,
}

/// Rows written per job; `None` for jobs that did not run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub employees: Option<u64>,
    pub daily: Option<u64>,
    pub monthly: Option<u64>,
}

// --- Pipeline ---

/// Raw feeds for the selected jobs. `daily` is also fetched for a
/// monthly-only run, since it carries the employee types.
#[derive(Default)]
struct Feeds {
    crews: Option<Vec<Option<Crew>>>,
    daily: Option<Vec<DailyWorkingDay>>,
    monthly: Option<Vec<MonthlyWorking>>,
}

#[derive(Default)]
struct Batch {
    employees: Option<Vec<EmployeeRow>>,
    daily: Option<Vec<DailyAttendanceRow>>,
    monthly: Option<Vec<MonthlyAttendanceRow>>,
}

pub struct Pipeline<'a> {
    directory: Option<&'a dyn DirectorySource>,
    attendance: Option<&'a dyn AttendanceSource>,
    sink: &'a dyn WarehouseSink,
    settings: RunSettings,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        directory: Option<&'a dyn DirectorySource>,
        attendance: Option<&'a dyn AttendanceSource>,
        sink: &'a dyn WarehouseSink,
        settings: RunSettings,
    ) -> Self {
        Self {
            directory,
            attendance,
            sink,
            settings,
        }
    }

    fn runs(&self, job: Job) -> bool {
        self.settings.jobs.contains(&job)
    }

    /// Fetches every selected feed, then transforms, then loads. Nothing is
    /// written unless all fetches succeeded.
    pub async fn run(&self) -> Result<RunSummary, AppError> {
        let month = self.settings.month;
        info!("Starting run for {} (jobs: {:?})", month, self.settings.jobs);

        let feeds = self.fetch_all().await?;
        let batch = self.transform(&feeds);
        let summary = self.load_all(&batch).await?;

        info!("Run for {} finished: {:?}", month, summary);
        Ok(summary)
    }

    async fn fetch_all(&self) -> Result<Feeds, AppError> {
        let month = self.settings.month;
        let mut feeds = Feeds::default();

        if self.runs(Job::Employees) {
            let directory = self.directory.ok_or(AppError::SourceUnavailable {
                job: Job::Employees,
                source_name: "SmartHR",
            })?;
            feeds.crews = Some(directory.fetch_crews().await?);
        }

        if self.runs(Job::Daily) || self.runs(Job::Monthly) {
            let job = if self.runs(Job::Daily) { Job::Daily } else { Job::Monthly };
            let attendance = self.attendance.ok_or(AppError::SourceUnavailable {
                job,
                source_name: "KING OF TIME",
            })?;
            feeds.daily = Some(attendance.fetch_daily(month).await?);
            if self.runs(Job::Monthly) {
                feeds.monthly = Some(attendance.fetch_monthly(month).await?);
            }
        }

        info!("All feeds fetched for {}", month);
        Ok(feeds)
    }

    fn transform(&self, feeds: &Feeds) -> Batch {
        let month = self.settings.month;
        let mut batch = Batch {
            employees: feeds.crews.as_deref().map(normalize_crews),
            ..Batch::default()
        };

        if self.runs(Job::Daily) {
            batch.daily = feeds.daily.as_deref().map(|days| normalize_daily(days, month));
        }

        if let (Some(records), Some(days)) = (feeds.monthly.as_deref(), feeds.daily.as_deref()) {
            let calculator = StandardHoursCalculator::new(
                JapaneseHolidays,
                self.settings.company_holidays.clone(),
                self.settings.daily_working_hours,
            );
            let standard = calculator.standard_minutes(month);
            info!("Standard working minutes for {}: {}", month, standard);

            let lookup = build_type_lookup(days);
            let reconciler =
                MonthlyReconciler::new(month, standard, self.settings.classifier.clone());
            batch.monthly = Some(reconciler.reconcile(&lookup, records));
        }

        batch
    }

    async fn load_all(&self, batch: &Batch) -> Result<RunSummary, AppError> {
        let tables = &self.settings.tables;
        let mut summary = RunSummary::default();

        if let Some(rows) = &batch.employees {
            summary.employees = Some(load_table(self.sink, &tables.employees, rows).await?);
        }
        if let Some(rows) = &batch.daily {
            summary.daily = Some(load_table(self.sink, &tables.daily, rows).await?);
        }
        if let Some(rows) = &batch.monthly {
            summary.monthly = Some(load_table(self.sink, &tables.monthly, rows).await?);
        }
        Ok(summary)
    }
}
