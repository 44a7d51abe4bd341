// src/directory.rs
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::rows::EmployeeRow;
use crate::smarthr::{Crew, CrewDepartment};

/// (group, department) names resolved from the crew's first department.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepartmentNames {
    pub group_name: Option<String>,
    pub dept_name: Option<String>,
}

/// The first department is the group. Its grandparent is the department, or
/// the parent when there is no grandparent, or the group itself at top level.
pub fn resolve_department(departments: &[Option<CrewDepartment>]) -> DepartmentNames {
    let Some(primary) = departments.first().and_then(|d| d.as_ref()) else {
        return DepartmentNames::default();
    };

    let group_name = primary.name.clone();
    let dept_name = match primary.parent.as_deref() {
        Some(parent) => match parent.parent.as_deref() {
            Some(grand_parent) => grand_parent.name.clone(),
            None => parent.name.clone(),
        },
        None => group_name.clone(),
    };

    DepartmentNames {
        group_name,
        dept_name,
    }
}

pub fn full_name(last: Option<&str>, first: Option<&str>) -> String {
    format!("{} {}", last.unwrap_or(""), first.unwrap_or(""))
        .trim()
        .to_string()
}

fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    // SmartHR sends plain dates; tolerate a datetime suffix.
    raw.and_then(|s| s.get(..10))
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

pub fn normalize_crew(crew: &Crew) -> EmployeeRow {
    let departments = resolve_department(&crew.departments);
    EmployeeRow {
        emp_code: crew.emp_code.clone(),
        full_name: full_name(
            crew.business_last_name.as_deref(),
            crew.business_first_name.as_deref(),
        ),
        joined_date: parse_date(crew.entered_at.as_deref()),
        resigned_date: parse_date(crew.resigned_at.as_deref()),
        email: crew.email.clone(),
        employment_type: crew
            .employment_type
            .as_ref()
            .and_then(|t| t.name.clone()),
        dept_name: departments.dept_name,
        group_name: departments.group_name,
    }
}

/// One row per non-null crew record, in feed order.
pub fn normalize_crews(crews: &[Option<Crew>]) -> Vec<EmployeeRow> {
    info!("Normalizing {} SmartHR crew records...", crews.len());
    let rows: Vec<EmployeeRow> = crews.iter().flatten().map(normalize_crew).collect();
    debug!("Skipped {} null crew records", crews.len() - rows.len());
    info!("Normalized {} employee rows.", rows.len());
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dept(name: &str, parent: Option<CrewDepartment>) -> CrewDepartment {
        CrewDepartment {
            name: Some(name.to_string()),
            parent: parent.map(Box::new),
        }
    }

    fn crew_from(value: serde_json::Value) -> Crew {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn no_departments_yields_nulls() {
        assert_eq!(resolve_department(&[]), DepartmentNames::default());
        assert_eq!(resolve_department(&[None]), DepartmentNames::default());
    }

    #[test]
    fn single_department_is_both_group_and_dept() {
        let names = resolve_department(&[Some(dept("営業部", None))]);
        assert_eq!(names.group_name.as_deref(), Some("営業部"));
        assert_eq!(names.dept_name, names.group_name);
    }

    #[test]
    fn parent_used_when_no_grandparent() {
        let names = resolve_department(&[Some(dept("第一グループ", Some(dept("営業部", None))))]);
        assert_eq!(names.group_name.as_deref(), Some("第一グループ"));
        assert_eq!(names.dept_name.as_deref(), Some("営業部"));
    }

    #[test]
    fn grandparent_wins_over_parent() {
        let tree = dept(
            "チームA",
            Some(dept("第一グループ", Some(dept("営業本部", None)))),
        );
        let names = resolve_department(&[Some(tree), Some(dept("ignored", None))]);
        assert_eq!(names.group_name.as_deref(), Some("チームA"));
        assert_eq!(names.dept_name.as_deref(), Some("営業本部"));
    }

    #[test]
    fn only_first_department_entry_is_considered() {
        let names = resolve_department(&[None, Some(dept("営業部", None))]);
        assert_eq!(names, DepartmentNames::default());
    }

    #[test]
    fn full_name_trims_missing_parts() {
        assert_eq!(full_name(Some("山田"), Some("太郎")), "山田 太郎");
        assert_eq!(full_name(Some("山田"), None), "山田");
        assert_eq!(full_name(None, Some("太郎")), "太郎");
        assert_eq!(full_name(None, None), "");
    }

    #[test]
    fn normalizes_full_crew() {
        let crew = crew_from(serde_json::json!({
            "emp_code": "0001",
            "business_last_name": "山田",
            "business_first_name": "太郎",
            "entered_at": "2020-04-01",
            "resigned_at": null,
            "email": "taro@example.com",
            "employment_type": {"name": "正社員"},
            "departments": [{"name": "開発G", "parent": {"name": "技術部", "parent": null}}]
        }));
        let row = normalize_crew(&crew);
        assert_eq!(row.emp_code.as_deref(), Some("0001"));
        assert_eq!(row.full_name, "山田 太郎");
        assert_eq!(row.joined_date, NaiveDate::from_ymd_opt(2020, 4, 1));
        assert_eq!(row.resigned_date, None);
        assert_eq!(row.employment_type.as_deref(), Some("正社員"));
        assert_eq!(row.group_name.as_deref(), Some("開発G"));
        assert_eq!(row.dept_name.as_deref(), Some("技術部"));
    }

    #[test]
    fn sparse_crew_never_fails() {
        let rows = normalize_crews(&[None, Some(crew_from(serde_json::json!({}))), None]);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.full_name, "");
        assert_eq!(row.emp_code, None);
        assert_eq!(row.employment_type, None);
        assert_eq!(row.dept_name, None);
        assert_eq!(row.group_name, None);
    }
}
