// src/monthly.rs
//
// Monthly attendance reconciliation: joins the KING OF TIME monthly feed with
// employee types taken from the daily feed and splits total working time into
// assigned and overtime minutes according to the employment regime.

use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

use crate::calendar::TargetMonth;
use crate::kot::{DailyWorkingDay, HolidayWorkBreakdown, MonthlyWorking, ObtainedHoliday};
use crate::lenient::minutes;
use crate::rows::MonthlyAttendanceRow;

/// Custom computed item holding in-schedule working minutes.
pub const CUSTOM_ITEM_SCHEDULED: &str = "001";
/// Custom computed item holding working minutes beyond the schedule.
/// Item "002" duplicates part of these two and is never read.
pub const CUSTOM_ITEM_EXCESS: &str = "003";

pub const DEFAULT_FLEX_TYPE_CODES: [&str; 6] = ["1000", "3100", "1060", "1070", "6001", "6002"];

const FLEX_MARKER: &str = "フレックス";
const DISCRETIONARY_MARKER: &str = "裁量労働";
const MANAGERIAL_MARKER: &str = "管理監督者";

// --- Employee Type Lookup ---

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeeTypeInfo {
    pub code: String,
    pub name: String,
    pub type_code: String,
    pub type_name: String,
}

impl EmployeeTypeInfo {
    /// Type name, or `コード:{type_code}` when the feed has no name.
    pub fn employment_type_label(&self) -> String {
        if self.type_name.is_empty() {
            format!("コード:{}", self.type_code)
        } else {
            self.type_name.clone()
        }
    }
}

/// Employee key → type info, from every daily entry carrying both a key and an
/// employee code. Later entries overwrite earlier ones.
pub fn build_type_lookup(days: &[DailyWorkingDay]) -> HashMap<String, EmployeeTypeInfo> {
    let mut lookup = HashMap::new();
    for record in days.iter().flat_map(|day| day.daily_workings.iter()) {
        let (Some(key), Some(employee), Some(code)) = (
            record.employee_key.as_ref(),
            record.employee(),
            record.employee_code(),
        ) else {
            continue;
        };
        lookup.insert(
            key.clone(),
            EmployeeTypeInfo {
                code: code.to_string(),
                name: employee.display_name(),
                type_code: employee.type_code.clone().unwrap_or_default(),
                type_name: employee.type_name.clone().unwrap_or_default(),
            },
        );
    }
    debug!("Built employee type lookup with {} entries", lookup.len());
    lookup
}

// --- Employment Regime ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmploymentRegime {
    Flex,
    DiscretionaryManagerial,
    Fixed,
}

/// Assigned/overtime split of the month's total working minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkSplit {
    pub assigned: i64,
    pub overtime: i64,
}

impl EmploymentRegime {
    /// Flex: time beyond the standard. Discretionary/managerial: late-night
    /// overtime only. Fixed: the excess item when positive, else the feed's
    /// own overtime. Assigned is always the remainder.
    pub fn split(
        self,
        total: i64,
        standard: i64,
        excess_item: f64,
        night_overtime: i64,
        feed_overtime: i64,
    ) -> WorkSplit {
        let overtime = match self {
            EmploymentRegime::Flex => (total - standard).max(0),
            EmploymentRegime::DiscretionaryManagerial => night_overtime,
            EmploymentRegime::Fixed if excess_item > 0.0 => excess_item.trunc() as i64,
            EmploymentRegime::Fixed => feed_overtime,
        };
        WorkSplit {
            assigned: total - overtime,
            overtime,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegimeClassifier {
    flex_type_codes: BTreeSet<String>,
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_FLEX_TYPE_CODES.iter().map(|c| c.to_string()))
    }
}

impl RegimeClassifier {
    pub fn new<I: IntoIterator<Item = String>>(flex_type_codes: I) -> Self {
        Self {
            flex_type_codes: flex_type_codes.into_iter().collect(),
        }
    }

    pub fn classify(&self, type_code: &str, type_name: &str) -> EmploymentRegime {
        if self.flex_type_codes.contains(type_code) || type_name.contains(FLEX_MARKER) {
            EmploymentRegime::Flex
        } else if type_name.contains(DISCRETIONARY_MARKER) || type_name.contains(MANAGERIAL_MARKER)
        {
            EmploymentRegime::DiscretionaryManagerial
        } else {
            EmploymentRegime::Fixed
        }
    }
}

// --- 36 Agreement ---

/// Normal plus extra minutes of one holiday-work breakdown.
pub fn holiday_work_minutes(breakdown: &HolidayWorkBreakdown) -> i64 {
    minutes(breakdown.normal) + minutes(breakdown.extra)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThirtySixAggregates {
    pub total_excess: i64,
    pub weekday_excess: i64,
    pub holiday_work: i64,
}

impl ThirtySixAggregates {
    pub fn compute(total: i64, holiday_work: i64, standard: i64) -> Self {
        let weekday_excess = (total - holiday_work - standard).max(0);
        Self {
            total_excess: weekday_excess + holiday_work,
            weekday_excess,
            holiday_work,
        }
    }
}

// --- Leave ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveCategory {
    Substitute,
    Paid,
    Ceremonial,
    Summer,
    SpecialPaid,
    MenstrualPaid,
    ChildNursing,
    FamilyCare,
    SecondmentSpecial,
}

impl LeaveCategory {
    /// Leave name as configured in KING OF TIME.
    pub fn label(self) -> &'static str {
        match self {
            LeaveCategory::Substitute => "代休",
            LeaveCategory::Paid => "有休",
            LeaveCategory::Ceremonial => "慶弔休暇",
            LeaveCategory::Summer => "夏季休暇",
            LeaveCategory::SpecialPaid => "特別休暇（有給）",
            LeaveCategory::MenstrualPaid => "生理休暇（有給）",
            LeaveCategory::ChildNursing => "子の看護休暇（未就学）",
            LeaveCategory::FamilyCare => "介護休暇",
            LeaveCategory::SecondmentSpecial => "出向者特別休暇（有給）",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LeaveTally {
    pub days: f64,
    pub minutes: f64,
}

/// Sum of day counts and minutes over every obtained holiday whose name
/// matches the category exactly.
pub fn leave_tally(holidays: &[ObtainedHoliday], category: LeaveCategory) -> LeaveTally {
    holidays
        .iter()
        .filter(|h| h.name.as_deref() == Some(category.label()))
        .fold(LeaveTally::default(), |acc, h| LeaveTally {
            days: acc.days + h.day_count.unwrap_or(0.0),
            minutes: acc.minutes + h.minutes.unwrap_or(0.0),
        })
}

// --- Reconciler ---

pub struct MonthlyReconciler {
    month: TargetMonth,
    standard_minutes: i64,
    classifier: RegimeClassifier,
}

impl MonthlyReconciler {
    pub fn new(month: TargetMonth, standard_minutes: i64, classifier: RegimeClassifier) -> Self {
        Self {
            month,
            standard_minutes,
            classifier,
        }
    }

    pub fn reconcile_record(
        &self,
        info: &EmployeeTypeInfo,
        record: &MonthlyWorking,
    ) -> MonthlyAttendanceRow {
        let standard = self.standard_minutes;
        let excess_item = record.custom_item(CUSTOM_ITEM_EXCESS);
        let total = (record.custom_item(CUSTOM_ITEM_SCHEDULED) + excess_item).trunc() as i64;

        let regime = self.classifier.classify(&info.type_code, &info.type_name);
        let night_overtime = minutes(record.night_overtime);
        let split = regime.split(
            total,
            standard,
            excess_item,
            night_overtime,
            minutes(record.overtime),
        );

        let legal = &record.legal_holiday_work;
        let general = &record.general_holiday_work;
        let thirty_six = ThirtySixAggregates::compute(
            total,
            holiday_work_minutes(legal) + holiday_work_minutes(general),
            standard,
        );

        let tally = |category| leave_tally(&record.holidays_obtained, category);
        let child_nursing = tally(LeaveCategory::ChildNursing);
        let family_care = tally(LeaveCategory::FamilyCare);
        let secondment = tally(LeaveCategory::SecondmentSpecial);

        debug!(
            "{} ({:?}): total={} standard={} assigned={} overtime={}",
            info.code, regime, total, standard, split.assigned, split.overtime
        );

        MonthlyAttendanceRow {
            emp_code: info.code.clone(),
            user_name: info.name.clone(),
            employment_type: info.employment_type_label(),
            target_month: self.month.to_string(),
            standard_labor_minutes: standard,
            assigned_minutes: split.assigned,
            unassigned_minutes: minutes(record.unassigned),
            overtime_minutes: split.overtime,
            night_assigned: minutes(record.night),
            night_unassigned: minutes(record.night_unassigned),
            night_overtime,
            legal_h_assigned: minutes(legal.normal),
            legal_h_unassigned: minutes(legal.extra),
            legal_h_overtime: minutes(legal.overtime),
            legal_h_night_assigned: minutes(legal.night),
            legal_h_night_unassigned: minutes(legal.night_extra),
            legal_h_night_overtime: minutes(legal.night_overtime),
            gen_h_assigned: minutes(general.normal),
            gen_h_unassigned: minutes(general.extra),
            gen_h_overtime: minutes(general.overtime),
            gen_h_night_assigned: minutes(general.night),
            gen_h_night_unassigned: minutes(general.night_extra),
            gen_h_night_overtime: minutes(general.night_overtime),
            late_minutes: minutes(record.late),
            early_leave_minutes: minutes(record.early_leave),
            break_minutes: minutes(record.break_sum),
            interval_shortage_count: minutes(record.interval_shortage_count),
            total_working_minutes: total,
            late_count: minutes(record.late_count),
            early_leave_count: minutes(record.early_leave_count),
            workingday_count: record.workingday_count.unwrap_or(0.0),
            absentday_count: record.absentday_count.unwrap_or(0.0),
            substitute_leave_days: tally(LeaveCategory::Substitute).days,
            paid_leave_days: tally(LeaveCategory::Paid).days,
            ceremonial_leave_days: tally(LeaveCategory::Ceremonial).days,
            summer_leave_days: tally(LeaveCategory::Summer).days,
            special_paid_leave_days: tally(LeaveCategory::SpecialPaid).days,
            menstrual_leave_days: tally(LeaveCategory::MenstrualPaid).days,
            child_nursing_leave_days: child_nursing.days,
            family_care_leave_days: family_care.days,
            secondment_special_leave_days: secondment.days,
            regarding_minutes: minutes(record.regarding),
            child_nursing_leave_minutes: minutes(Some(child_nursing.minutes)),
            family_care_leave_minutes: minutes(Some(family_care.minutes)),
            secondment_special_leave_minutes: minutes(Some(secondment.minutes)),
            thirty_six_total_excess: thirty_six.total_excess,
            thirty_six_weekday_excess: thirty_six.weekday_excess,
            thirty_six_holiday_work: thirty_six.holiday_work,
        }
    }

    /// One row per monthly record whose employee key is in `lookup`.
    pub fn reconcile(
        &self,
        lookup: &HashMap<String, EmployeeTypeInfo>,
        records: &[MonthlyWorking],
    ) -> Vec<MonthlyAttendanceRow> {
        info!(
            "Reconciling {} monthly records for {} (standard {} minutes)...",
            records.len(),
            self.month,
            self.standard_minutes
        );
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let info = record
                .employee_key
                .as_ref()
                .and_then(|key| lookup.get(key));
            match info {
                Some(info) => rows.push(self.reconcile_record(info, record)),
                None => warn!(
                    "No daily entry for employee key {:?}; skipping monthly record",
                    record.employee_key
                ),
            }
        }
        info!("Reconciled {} monthly summary rows.", rows.len());
        rows
    }
}
