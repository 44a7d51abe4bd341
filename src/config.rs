// src/config.rs
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::calendar::{year_end_closure, TargetMonth, DEFAULT_DAILY_WORKING_HOURS};
use crate::http::DEFAULT_TIMEOUT_SECS;
use crate::kot::KOT_DEFAULT_BASE_URL;
use crate::monthly::RegimeClassifier;

pub const DEFAULT_TABLE_EMPLOYEES: &str = "smarthr_employees";
pub const DEFAULT_TABLE_DAILY: &str = "kot_daily_attendance_detail";
pub const DEFAULT_TABLE_MONTHLY: &str = "kot_monthly_summary";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid date '{value}' in {setting}, expected YYYY-MM-DD")]
    InvalidDate { setting: &'static str, value: String },
}

fn default_kot_base_url() -> String {
    KOT_DEFAULT_BASE_URL.to_string()
}

fn default_table_employees() -> String {
    DEFAULT_TABLE_EMPLOYEES.to_string()
}

fn default_table_daily() -> String {
    DEFAULT_TABLE_DAILY.to_string()
}

fn default_table_monthly() -> String {
    DEFAULT_TABLE_MONTHLY.to_string()
}

fn default_daily_working_hours() -> u32 {
    DEFAULT_DAILY_WORKING_HOURS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Settings read from the environment (and `.env`). Credentials are optional
/// here and checked per job, so a daily-only run needs no SmartHR token.
#[derive(Deserialize, Clone)]
pub struct EtlConfig {
    // SmartHR
    pub smarthr_token: Option<String>,
    pub smarthr_subdomain: Option<String>,

    // KING OF TIME
    pub kot_token: Option<String>,
    #[serde(default = "default_kot_base_url")]
    pub kot_base_url: String,

    // BigQuery
    pub gcp_project_id: Option<String>,
    pub bq_dataset: Option<String>,
    pub gcp_access_token: Option<String>,
    pub bq_location: Option<String>,
    #[serde(default = "default_table_employees")]
    pub bq_table_employees: String,
    #[serde(default = "default_table_daily")]
    pub bq_table_daily: String,
    #[serde(default = "default_table_monthly")]
    pub bq_table_monthly: String,

    // Calculation
    pub target_month: Option<TargetMonth>,
    #[serde(default = "default_daily_working_hours")]
    pub daily_working_hours: u32,
    pub company_holidays: Option<String>,
    pub flex_type_codes: Option<String>,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn redact(value: &Option<String>) -> &'static str {
    match value {
        Some(_) => "<redacted>",
        None => "<unset>",
    }
}

impl fmt::Debug for EtlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EtlConfig")
            .field("smarthr_token", &redact(&self.smarthr_token))
            .field("smarthr_subdomain", &self.smarthr_subdomain)
            .field("kot_token", &redact(&self.kot_token))
            .field("kot_base_url", &self.kot_base_url)
            .field("gcp_project_id", &self.gcp_project_id)
            .field("bq_dataset", &self.bq_dataset)
            .field("gcp_access_token", &redact(&self.gcp_access_token))
            .field("bq_location", &self.bq_location)
            .field("bq_table_employees", &self.bq_table_employees)
            .field("bq_table_daily", &self.bq_table_daily)
            .field("bq_table_monthly", &self.bq_table_monthly)
            .field("target_month", &self.target_month)
            .field("daily_working_hours", &self.daily_working_hours)
            .field("company_holidays", &self.company_holidays)
            .field("flex_type_codes", &self.flex_type_codes)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

/// Returns the trimmed value, treating blank as unset.
pub fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl EtlConfig {
    /// Reads the process environment. `main` loads `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::from_env::<EtlConfig>()?)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// CLI month, else `TARGET_MONTH`, else the month before `today`.
    pub fn resolve_month(&self, cli_month: Option<TargetMonth>, today: NaiveDate) -> TargetMonth {
        cli_month
            .or(self.target_month)
            .unwrap_or_else(|| TargetMonth::containing(today).previous())
    }

    /// `COMPANY_HOLIDAYS` when set, otherwise the year-end closure.
    pub fn company_holidays_for(&self, month: TargetMonth) -> Result<BTreeSet<NaiveDate>, ConfigError> {
        let Some(raw) = self.company_holidays.as_deref() else {
            return Ok(year_end_closure(month));
        };
        split_list(raw)
            .map(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ConfigError::InvalidDate {
                    setting: "COMPANY_HOLIDAYS",
                    value: s.to_string(),
                })
            })
            .collect()
    }

    pub fn regime_classifier(&self) -> RegimeClassifier {
        match self.flex_type_codes.as_deref() {
            Some(raw) => RegimeClassifier::new(split_list(raw).map(str::to_string)),
            None => RegimeClassifier::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monthly::EmploymentRegime;

    fn config_from(vars: &[(&str, &str)]) -> Result<EtlConfig, ConfigError> {
        let iter = vars.iter().map(|(k, v)| (k.to_string(), v.to_string()));
        Ok(envy::from_iter::<_, EtlConfig>(iter)?)
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.kot_base_url, KOT_DEFAULT_BASE_URL);
        assert_eq!(config.bq_table_employees, "smarthr_employees");
        assert_eq!(config.bq_table_daily, "kot_daily_attendance_detail");
        assert_eq!(config.bq_table_monthly, "kot_monthly_summary");
        assert_eq!(config.daily_working_hours, 8);
        assert_eq!(config.http_timeout(), Duration::from_secs(60));
        assert!(config.target_month.is_none());
    }

    #[test]
    fn reads_values_from_environment_names() {
        let config = config_from(&[
            ("SMARTHR_TOKEN", "shr"),
            ("KOT_BASE_URL", "https://example.test/v1.0"),
            ("TARGET_MONTH", "2025-11"),
            ("DAILY_WORKING_HOURS", "7"),
            ("HTTP_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(require(&config.smarthr_token, "SMARTHR_TOKEN").unwrap(), "shr");
        assert_eq!(config.kot_base_url, "https://example.test/v1.0");
        assert_eq!(config.target_month, Some("2025-11".parse().unwrap()));
        assert_eq!(config.daily_working_hours, 7);
        assert_eq!(config.http_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert!(config_from(&[("TARGET_MONTH", "2025-13")]).is_err());
        assert!(config_from(&[("TARGET_MONTH", "202511")]).is_err());
    }

    #[test]
    fn blank_credentials_count_as_missing() {
        let config = config_from(&[("KOT_TOKEN", "  ")]).unwrap();
        assert!(matches!(
            require(&config.kot_token, "KOT_TOKEN"),
            Err(ConfigError::Missing("KOT_TOKEN"))
        ));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let config = config_from(&[("KOT_TOKEN", "super-secret"), ("GCP_ACCESS_TOKEN", "ya29.x")]).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(!printed.contains("ya29.x"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn month_resolution_order() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let config = config_from(&[]).unwrap();
        assert_eq!(config.resolve_month(None, today).to_string(), "2025-12");

        let config = config_from(&[("TARGET_MONTH", "2025-10")]).unwrap();
        assert_eq!(config.resolve_month(None, today).to_string(), "2025-10");
        let cli = Some("2025-09".parse().unwrap());
        assert_eq!(config.resolve_month(cli, today).to_string(), "2025-09");
    }

    #[test]
    fn company_holidays_parse_or_default() {
        let month: TargetMonth = "2025-12".parse().unwrap();
        let config = config_from(&[]).unwrap();
        let defaults = config.company_holidays_for(month).unwrap();
        assert!(defaults.contains(&NaiveDate::from_ymd_opt(2025, 12, 29).unwrap()));

        let config = config_from(&[("COMPANY_HOLIDAYS", "2025-12-26, 2025-12-29,")]).unwrap();
        let dates = config.company_holidays_for(month).unwrap();
        assert_eq!(dates.len(), 2);

        let config = config_from(&[("COMPANY_HOLIDAYS", "12/26")]).unwrap();
        assert!(matches!(
            config.company_holidays_for(month),
            Err(ConfigError::InvalidDate { .. })
        ));
    }

    #[test]
    fn flex_codes_override_defaults() {
        let config = config_from(&[("FLEX_TYPE_CODES", "9000, 9001")]).unwrap();
        let classifier = config.regime_classifier();
        assert_eq!(classifier.classify("9001", ""), EmploymentRegime::Flex);
        assert_eq!(classifier.classify("1000", ""), EmploymentRegime::Fixed);

        let classifier = config_from(&[]).unwrap().regime_classifier();
        assert_eq!(classifier.classify("1000", ""), EmploymentRegime::Flex);
    }
}
