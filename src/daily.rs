// src/daily.rs
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::calendar::TargetMonth;
use crate::kot::{DailyWorking, DailyWorkingDay, HolidaySlot};
use crate::lenient::minutes;
use crate::rows::{DailyAttendanceRow, HolidayClass};

const LEGAL_HOLIDAY_MARKER: &str = "法定休日";
const GENERAL_HOLIDAY_MARKER: &str = "法定外";

const PAID_LEAVE: &str = "有休";
const ABSENCE: &str = "欠勤";
const SUBSTITUTE_LEAVE: &str = "代休";

const FULL_DAY: f64 = 1.0;
const HALF_DAY: f64 = 0.5;
const MAX_LEAVE_PER_DAY: f64 = 1.0;

impl HolidayClass {
    /// Legal wins when a label carries both markers.
    pub fn from_workday_type_name(name: Option<&str>) -> Self {
        match name {
            Some(n) if n.contains(LEGAL_HOLIDAY_MARKER) => HolidayClass::Legal,
            Some(n) if n.contains(GENERAL_HOLIDAY_MARKER) => HolidayClass::General,
            _ => HolidayClass::None,
        }
    }
}

/// Leave day counts for one attendance record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LeaveDays {
    pub paid: f64,
    pub absence: f64,
    pub substitute: f64,
}

impl LeaveDays {
    pub fn total(&self) -> f64 {
        self.paid + self.absence + self.substitute
    }

    /// Adds `amount` to the category named by `slot`. Unknown names are
    /// ignored; anything that would push the record past one day is dropped.
    fn add(&mut self, slot: &HolidaySlot, amount: f64) -> bool {
        let room = (MAX_LEAVE_PER_DAY - self.total()).max(0.0);
        let bucket = match slot.name.as_deref() {
            Some(PAID_LEAVE) => &mut self.paid,
            Some(ABSENCE) => &mut self.absence,
            Some(SUBSTITUTE_LEAVE) => &mut self.substitute,
            _ => return true,
        };
        *bucket += amount.min(room);
        amount <= room
    }
}

pub fn leave_days(record: &DailyWorking) -> LeaveDays {
    let mut days = LeaveDays::default();
    let obtained = &record.holidays_obtained;
    let slots = obtained
        .fulltime_holiday
        .iter()
        .map(|slot| (slot, FULL_DAY))
        .chain(obtained.halfday_holidays.iter().map(|slot| (slot, HALF_DAY)));

    for (slot, amount) in slots {
        if !days.add(slot, amount) {
            warn!(
                "Leave for {:?} exceeds one day; dropped part of {:?} ({})",
                record.employee_code(),
                slot.name,
                amount
            );
        }
    }
    days
}

pub fn normalize_record(
    record: &DailyWorking,
    work_date: NaiveDate,
    month: TargetMonth,
) -> Option<DailyAttendanceRow> {
    let employee = record.employee()?;
    let emp_code = employee.code.clone()?;

    let night_overtime = record.night_overtime_minutes();
    let night_unassigned = record.night_unassigned_minutes();
    let is_night_work = night_overtime > 0 || night_unassigned > 0 || record.night_minutes() > 0;

    let holiday = HolidayClass::from_workday_type_name(record.workday_type_name.as_deref());
    let leave = leave_days(record);

    Some(DailyAttendanceRow {
        emp_code,
        work_date,
        target_month: month.to_string(),
        type_code: employee.type_code.clone(),
        overtime: minutes(record.overtime),
        night_overtime,
        unassigned: minutes(record.unassigned),
        night_unassigned,
        late: minutes(record.late),
        early_leave: minutes(record.early_leave),
        total_work_minutes: minutes(record.total_work),
        paid_leave_days: leave.paid,
        absence_days: leave.absence,
        sub_leave_days: leave.substitute,
        holiday_type: holiday,
        is_night_work,
        is_legal_holiday: holiday == HolidayClass::Legal,
        is_general_holiday: holiday == HolidayClass::General,
    })
}

fn parse_work_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|s| s.get(..10))
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

/// One row per (day, employee) entry that resolves to an employee code.
pub fn normalize_daily(days: &[DailyWorkingDay], month: TargetMonth) -> Vec<DailyAttendanceRow> {
    info!("Normalizing KOT daily workings for {}...", month);
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for day in days {
        let Some(work_date) = parse_work_date(day.date.as_deref()) else {
            warn!(
                "Skipping {} entries with unparseable date {:?}",
                day.daily_workings.len(),
                day.date
            );
            skipped += day.daily_workings.len();
            continue;
        };
        for record in &day.daily_workings {
            match normalize_record(record, work_date, month) {
                Some(row) => rows.push(row),
                None => skipped += 1,
            }
        }
    }

    debug!("Skipped {} daily entries without an employee code", skipped);
    info!("Normalized {} daily attendance rows.", rows.len());
    rows
}
