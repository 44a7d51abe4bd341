// src/kot.rs
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::calendar::TargetMonth;
use crate::http::{ApiClient, ClientError};
use crate::lenient::{de_null_default, de_opt_number, de_opt_string, minutes};

pub const KOT_DEFAULT_BASE_URL: &str = "https://api.kingtime.jp/v1.0";

// --- KING OF TIME API Data Structures ---
//
// All minute values are minutes. Field names differ between the daily and
// monthly endpoints (`lateNightOvertime` vs `nightOvertime`), so both spellings
// are captured and resolved by the accessor methods below.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KotEmployee {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub type_code: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub type_name: Option<String>,
}

impl KotEmployee {
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.last_name.as_deref().unwrap_or(""),
            self.first_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolidaySlot {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyHolidaysObtained {
    #[serde(default)]
    pub fulltime_holiday: Option<HolidaySlot>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub halfday_holidays: Vec<HolidaySlot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyWorking {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub employee_key: Option<String>,
    #[serde(default)]
    pub current_date_employee: Option<KotEmployee>,
    #[serde(default)]
    pub current_employee: Option<KotEmployee>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub workday_type_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub overtime: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub late_night_overtime: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub night_overtime: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub unassigned: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub late_night_unassigned: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub night_unassigned: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub late_night: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub night: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub late: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub early_leave: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub total_work: Option<f64>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub holidays_obtained: DailyHolidaysObtained,
}

impl DailyWorking {
    /// `currentDateEmployee` (requested via `additionalFields`), else
    /// `currentEmployee`. An employee object without a code is passed over.
    pub fn employee(&self) -> Option<&KotEmployee> {
        [self.current_date_employee.as_ref(), self.current_employee.as_ref()]
            .into_iter()
            .flatten()
            .find(|e| e.code.as_deref().is_some_and(|c| !c.is_empty()))
    }

    pub fn employee_code(&self) -> Option<&str> {
        self.employee().and_then(|e| e.code.as_deref())
    }

    pub fn night_overtime_minutes(&self) -> i64 {
        minutes(self.late_night_overtime.or(self.night_overtime))
    }

    pub fn night_unassigned_minutes(&self) -> i64 {
        minutes(self.late_night_unassigned.or(self.night_unassigned))
    }

    pub fn night_minutes(&self) -> i64 {
        minutes(self.late_night.or(self.night))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyWorkingDay {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub daily_workings: Vec<DailyWorking>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomMonthlyWorking {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub calculation_result: Option<f64>,
}

/// Holiday-work breakdown (`legalHolidayWork` / `generalHolidayWork`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolidayWorkBreakdown {
    #[serde(default, deserialize_with = "de_opt_number")]
    pub normal: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub extra: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub overtime: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub night: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub night_extra: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub night_overtime: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObtainedHoliday {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub day_count: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub minutes: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyWorking {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub employee_key: Option<String>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub overtime: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub night_overtime: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub unassigned: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub night_unassigned: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub night: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub late: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub early_leave: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub late_count: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub early_leave_count: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub break_sum: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub interval_shortage_count: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub workingday_count: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub absentday_count: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub regarding: Option<f64>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub legal_holiday_work: HolidayWorkBreakdown,
    #[serde(default, deserialize_with = "de_null_default")]
    pub general_holiday_work: HolidayWorkBreakdown,
    #[serde(default, deserialize_with = "de_null_default")]
    pub custom_monthly_workings: Vec<CustomMonthlyWorking>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub holidays_obtained: Vec<ObtainedHoliday>,
}

impl MonthlyWorking {
    /// Value of the first custom computed item with the given code, or 0.
    pub fn custom_item(&self, code: &str) -> f64 {
        self.custom_monthly_workings
            .iter()
            .find(|item| item.code.as_deref() == Some(code))
            .and_then(|item| item.calculation_result)
            .unwrap_or(0.0)
    }
}

// --- Client ---

#[derive(Debug, Clone)]
pub struct KotClient {
    api: ApiClient,
    base_url: Url,
}

impl KotClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url.trim())?;
        // `join` drops the last path segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            api: ApiClient::new("KING OF TIME", token, timeout)?,
            base_url,
        })
    }

    /// `GET /daily-workings?start=&end=` over an inclusive date range.
    pub async fn fetch_daily_workings(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyWorkingDay>, ClientError> {
        info!("Fetching KOT daily workings from {} to {}...", start, end);
        let mut url = self.base_url.join("daily-workings")?;
        url.query_pairs_mut()
            .append_pair("start", &start.format("%Y-%m-%d").to_string())
            .append_pair("end", &end.format("%Y-%m-%d").to_string())
            .append_pair("additionalFields", "currentDateEmployee");

        let response = self
            .api
            .get::<Vec<DailyWorkingDay>>(url, "Get KOT Daily Workings")
            .await?;
        info!("Fetched {} days of daily workings.", response.data.len());
        Ok(response.data)
    }

    pub async fn fetch_daily_workings_for_month(
        &self,
        month: TargetMonth,
    ) -> Result<Vec<DailyWorkingDay>, ClientError> {
        self.fetch_daily_workings(month.first_day(), month.last_day())
            .await
    }

    /// `GET /monthly-workings/{YYYY-MM}`.
    pub async fn fetch_monthly_workings(
        &self,
        month: TargetMonth,
    ) -> Result<Vec<MonthlyWorking>, ClientError> {
        info!("Fetching KOT monthly workings for {}...", month);
        let url = self
            .base_url
            .join(&format!("monthly-workings/{}", month))?;
        let response = self
            .api
            .get::<Vec<MonthlyWorking>>(url, "Get KOT Monthly Workings")
            .await?;
        info!("Fetched {} monthly working records.", response.data.len());
        Ok(response.data)
    }
}
