// src/rows.rs
//
// Warehouse row types. Field order here is column order; each `schema()` must
// list the same names in the same order.

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::warehouse::FieldType::{Date, Float, Integer, String as Str};
use crate::warehouse::{FieldSchema, TableRow};

/// Flags are loaded as 0/1 integers so downstream SQL can `SUM` them.
fn as_flag<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(i64::from(*value))
}

// --- Employee ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeRow {
    pub emp_code: Option<String>,
    pub full_name: String,
    pub joined_date: Option<NaiveDate>,
    pub resigned_date: Option<NaiveDate>,
    pub email: Option<String>,
    pub employment_type: Option<String>,
    pub dept_name: Option<String>,
    pub group_name: Option<String>,
}

impl TableRow for EmployeeRow {
    fn schema() -> Vec<FieldSchema> {
        vec![
            FieldSchema::nullable("emp_code", Str),
            FieldSchema::nullable("full_name", Str),
            FieldSchema::nullable("joined_date", Date),
            FieldSchema::nullable("resigned_date", Date),
            FieldSchema::nullable("email", Str),
            FieldSchema::nullable("employment_type", Str),
            FieldSchema::nullable("dept_name", Str),
            FieldSchema::nullable("group_name", Str),
        ]
    }
}

// --- Daily Attendance ---

/// Holiday classification of a single work date. Legal takes precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HolidayClass {
    #[default]
    None,
    General,
    Legal,
}

impl HolidayClass {
    pub fn code(self) -> i64 {
        match self {
            HolidayClass::None => 0,
            HolidayClass::General => 1,
            HolidayClass::Legal => 2,
        }
    }
}

impl Serialize for HolidayClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAttendanceRow {
    pub emp_code: String,
    pub work_date: NaiveDate,
    pub target_month: String,
    pub type_code: Option<String>,
    pub overtime: i64,
    pub night_overtime: i64,
    pub unassigned: i64,
    pub night_unassigned: i64,
    pub late: i64,
    pub early_leave: i64,
    pub total_work_minutes: i64,
    pub paid_leave_days: f64,
    pub absence_days: f64,
    pub sub_leave_days: f64,
    pub holiday_type: HolidayClass,
    #[serde(serialize_with = "as_flag")]
    pub is_night_work: bool,
    #[serde(serialize_with = "as_flag")]
    pub is_legal_holiday: bool,
    #[serde(serialize_with = "as_flag")]
    pub is_general_holiday: bool,
}

impl TableRow for DailyAttendanceRow {
    fn schema() -> Vec<FieldSchema> {
        vec![
            FieldSchema::required("emp_code", Str),
            FieldSchema::required("work_date", Date),
            FieldSchema::required("target_month", Str),
            FieldSchema::nullable("type_code", Str),
            FieldSchema::nullable("overtime", Integer),
            FieldSchema::nullable("night_overtime", Integer),
            FieldSchema::nullable("unassigned", Integer),
            FieldSchema::nullable("night_unassigned", Integer),
            FieldSchema::nullable("late", Integer),
            FieldSchema::nullable("early_leave", Integer),
            FieldSchema::nullable("total_work_minutes", Integer),
            FieldSchema::nullable("paid_leave_days", Float),
            FieldSchema::nullable("absence_days", Float),
            FieldSchema::nullable("sub_leave_days", Float),
            FieldSchema::nullable("holiday_type", Integer),
            FieldSchema::nullable("is_night_work", Integer),
            FieldSchema::nullable("is_legal_holiday", Integer),
            FieldSchema::nullable("is_general_holiday", Integer),
        ]
    }
}

// --- Monthly Attendance ---

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MonthlyAttendanceRow {
    pub emp_code: String,
    pub user_name: String,
    pub employment_type: String,
    pub target_month: String,
    pub standard_labor_minutes: i64,
    pub assigned_minutes: i64,
    pub unassigned_minutes: i64,
    pub overtime_minutes: i64,
    pub night_assigned: i64,
    pub night_unassigned: i64,
    pub night_overtime: i64,
    pub legal_h_assigned: i64,
    pub legal_h_unassigned: i64,
    pub legal_h_overtime: i64,
    pub legal_h_night_assigned: i64,
    pub legal_h_night_unassigned: i64,
    pub legal_h_night_overtime: i64,
    pub gen_h_assigned: i64,
    pub gen_h_unassigned: i64,
    pub gen_h_overtime: i64,
    pub gen_h_night_assigned: i64,
    pub gen_h_night_unassigned: i64,
    pub gen_h_night_overtime: i64,
    pub late_minutes: i64,
    pub early_leave_minutes: i64,
    pub break_minutes: i64,
    pub interval_shortage_count: i64,
    pub total_working_minutes: i64,
    pub late_count: i64,
    pub early_leave_count: i64,
    pub workingday_count: f64,
    pub absentday_count: f64,
    pub substitute_leave_days: f64,
    pub paid_leave_days: f64,
    pub ceremonial_leave_days: f64,
    pub summer_leave_days: f64,
    pub special_paid_leave_days: f64,
    pub menstrual_leave_days: f64,
    pub child_nursing_leave_days: f64,
    pub family_care_leave_days: f64,
    pub secondment_special_leave_days: f64,
    pub regarding_minutes: i64,
    pub child_nursing_leave_minutes: i64,
    pub family_care_leave_minutes: i64,
    pub secondment_special_leave_minutes: i64,
    pub thirty_six_total_excess: i64,
    pub thirty_six_weekday_excess: i64,
    pub thirty_six_holiday_work: i64,
}

impl TableRow for MonthlyAttendanceRow {
    fn schema() -> Vec<FieldSchema> {
        let mut fields = vec![
            FieldSchema::required("emp_code", Str),
            FieldSchema::nullable("user_name", Str),
            FieldSchema::nullable("employment_type", Str),
            FieldSchema::required("target_month", Str),
        ];
        let integers = [
            "standard_labor_minutes",
            "assigned_minutes",
            "unassigned_minutes",
            "overtime_minutes",
            "night_assigned",
            "night_unassigned",
            "night_overtime",
            "legal_h_assigned",
            "legal_h_unassigned",
            "legal_h_overtime",
            "legal_h_night_assigned",
            "legal_h_night_unassigned",
            "legal_h_night_overtime",
            "gen_h_assigned",
            "gen_h_unassigned",
            "gen_h_overtime",
            "gen_h_night_assigned",
            "gen_h_night_unassigned",
            "gen_h_night_overtime",
            "late_minutes",
            "early_leave_minutes",
            "break_minutes",
            "interval_shortage_count",
            "total_working_minutes",
            "late_count",
            "early_leave_count",
        ];
        fields.extend(integers.into_iter().map(|n| FieldSchema::nullable(n, Integer)));
        let floats = [
            "workingday_count",
            "absentday_count",
            "substitute_leave_days",
            "paid_leave_days",
            "ceremonial_leave_days",
            "summer_leave_days",
            "special_paid_leave_days",
            "menstrual_leave_days",
            "child_nursing_leave_days",
            "family_care_leave_days",
            "secondment_special_leave_days",
        ];
        fields.extend(floats.into_iter().map(|n| FieldSchema::nullable(n, Float)));
        let trailing = [
            "regarding_minutes",
            "child_nursing_leave_minutes",
            "family_care_leave_minutes",
            "secondment_special_leave_minutes",
            "thirty_six_total_excess",
            "thirty_six_weekday_excess",
            "thirty_six_holiday_work",
        ];
        fields.extend(trailing.into_iter().map(|n| FieldSchema::nullable(n, Integer)));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::encode_rows;

    fn column_names<T: TableRow>(row: T) -> Vec<String> {
        encode_rows(&[row]).unwrap()[0].keys().cloned().collect()
    }

    fn schema_names<T: TableRow>() -> Vec<String> {
        T::schema().iter().map(|f| f.name.to_string()).collect()
    }

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    fn daily_row(holiday: HolidayClass) -> DailyAttendanceRow {
        DailyAttendanceRow {
            emp_code: "1001".into(),
            work_date: NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
            target_month: "2025-11".into(),
            type_code: None,
            overtime: 0,
            night_overtime: 0,
            unassigned: 0,
            night_unassigned: 0,
            late: 0,
            early_leave: 0,
            total_work_minutes: 0,
            paid_leave_days: 0.5,
            absence_days: 0.0,
            sub_leave_days: 0.0,
            holiday_type: holiday,
            is_night_work: true,
            is_legal_holiday: holiday == HolidayClass::Legal,
            is_general_holiday: holiday == HolidayClass::General,
        }
    }

    #[test]
    fn schemas_match_serialized_columns() {
        let employee = EmployeeRow {
            emp_code: None,
            full_name: String::new(),
            joined_date: None,
            resigned_date: None,
            email: None,
            employment_type: None,
            dept_name: None,
            group_name: None,
        };
        // serde_json's default map is ordered by key, so compare as sets.
        assert_eq!(sorted(column_names(employee)), sorted(schema_names::<EmployeeRow>()));
        assert_eq!(
            sorted(column_names(daily_row(HolidayClass::None))),
            sorted(schema_names::<DailyAttendanceRow>())
        );
        assert_eq!(
            sorted(column_names(MonthlyAttendanceRow::default())),
            sorted(schema_names::<MonthlyAttendanceRow>())
        );
    }

    #[test]
    fn daily_flags_encode_as_integers() {
        let row = &encode_rows(&[daily_row(HolidayClass::Legal)]).unwrap()[0];
        assert_eq!(row["holiday_type"], 2);
        assert_eq!(row["is_legal_holiday"], 1);
        assert_eq!(row["is_general_holiday"], 0);
        assert_eq!(row["is_night_work"], 1);
        assert_eq!(row["work_date"], "2025-11-03");
        assert_eq!(row["paid_leave_days"], 0.5);
    }
}
