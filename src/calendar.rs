// src/calendar.rs
use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_DAILY_WORKING_HOURS: u32 = 8;

// --- Target Month ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid target month '{0}', expected YYYY-MM")]
pub struct InvalidMonth(pub String);

/// A calendar month, stored as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetMonth(NaiveDate);

impl TargetMonth {
    pub fn containing(date: NaiveDate) -> Self {
        Self(date - Duration::days(date.day0() as i64))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn last_day(&self) -> NaiveDate {
        self.days().last().unwrap_or(self.0)
    }

    /// Every date of the month, in order, each exactly once.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let month = self.0.month();
        self.0.iter_days().take_while(move |d| d.month() == month)
    }

    pub fn previous(&self) -> Self {
        self.0
            .checked_sub_months(Months::new(1))
            .map(Self)
            .unwrap_or(*self)
    }
}

impl fmt::Display for TargetMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

impl FromStr for TargetMonth {
    type Err = InvalidMonth;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // "2025-1" is rejected; the APIs expect zero-padded months.
        if trimmed.len() != 7 {
            return Err(InvalidMonth(s.to_string()));
        }
        NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| InvalidMonth(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for TargetMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// --- Public Holidays ---

pub trait HolidayCalendar {
    /// Name of the public holiday falling on `date`, if any.
    fn holiday_name(&self, date: NaiveDate) -> Option<&'static str>;

    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holiday_name(date).is_some()
    }
}

/// Japanese national holidays computed from the rules of the Act on National
/// Holidays, including substitute (振替休日) and citizens' (国民の休日) holidays.
///
/// Equinox days use the standard astronomical approximation, valid for
/// 1980 through 2099.
#[derive(Debug, Clone, Copy, Default)]
pub struct JapaneseHolidays;

const SUBSTITUTE_HOLIDAY: &str = "振替休日";
const CITIZENS_HOLIDAY: &str = "国民の休日";

impl JapaneseHolidays {
    pub fn for_year(year: i32) -> BTreeMap<NaiveDate, &'static str> {
        let national = Self::national_holidays(year);

        let mut all = national.clone();

        // A non-Sunday day sandwiched between two national holidays.
        for (&date, _) in national.iter() {
            let Some(next) = date.succ_opt() else { continue };
            let Some(after) = next.succ_opt() else { continue };
            if national.contains_key(&after)
                && !national.contains_key(&next)
                && next.weekday() != Weekday::Sun
            {
                all.insert(next, CITIZENS_HOLIDAY);
            }
        }

        // A national holiday on Sunday moves to the next day that is not a holiday.
        // Before 2007 only the following Monday qualified.
        for (&date, _) in national.iter().filter(|(d, _)| d.weekday() == Weekday::Sun) {
            let mut candidate = date.succ_opt();
            while let Some(day) = candidate {
                if !all.contains_key(&day) {
                    all.insert(day, SUBSTITUTE_HOLIDAY);
                    break;
                }
                if year < 2007 {
                    break;
                }
                candidate = day.succ_opt();
            }
        }

        all
    }

    fn national_holidays(year: i32) -> BTreeMap<NaiveDate, &'static str> {
        let mut days: Vec<(Option<NaiveDate>, &'static str)> = vec![
            (ymd(year, 1, 1), "元日"),
            (ymd(year, 2, 11), "建国記念の日"),
            (vernal_equinox(year), "春分の日"),
            (ymd(year, 5, 3), "憲法記念日"),
            (ymd(year, 5, 5), "こどもの日"),
            (autumnal_equinox(year), "秋分の日"),
            (ymd(year, 11, 3), "文化の日"),
            (ymd(year, 11, 23), "勤労感謝の日"),
        ];

        days.push(if year >= 2000 {
            (nth_monday(year, 1, 2), "成人の日")
        } else {
            (ymd(year, 1, 15), "成人の日")
        });

        if year >= 2020 {
            days.push((ymd(year, 2, 23), "天皇誕生日"));
        } else if (1989..=2018).contains(&year) {
            days.push((ymd(year, 12, 23), "天皇誕生日"));
        }

        if year >= 2007 {
            days.push((ymd(year, 4, 29), "昭和の日"));
            days.push((ymd(year, 5, 4), "みどりの日"));
        } else {
            days.push((ymd(year, 4, 29), "みどりの日"));
        }

        days.push(match year {
            2020 => (ymd(year, 7, 23), "海の日"),
            2021 => (ymd(year, 7, 22), "海の日"),
            y if y >= 2003 => (nth_monday(year, 7, 3), "海の日"),
            y if y >= 1996 => (ymd(year, 7, 20), "海の日"),
            _ => (None, "海の日"),
        });

        days.push(match year {
            2020 => (ymd(year, 8, 10), "山の日"),
            2021 => (ymd(year, 8, 8), "山の日"),
            y if y >= 2016 => (ymd(year, 8, 11), "山の日"),
            _ => (None, "山の日"),
        });

        days.push(if year >= 2003 {
            (nth_monday(year, 9, 3), "敬老の日")
        } else {
            (ymd(year, 9, 15), "敬老の日")
        });

        days.push(match year {
            2020 => (ymd(year, 7, 24), "スポーツの日"),
            2021 => (ymd(year, 7, 23), "スポーツの日"),
            y if y >= 2020 => (nth_monday(year, 10, 2), "スポーツの日"),
            y if y >= 2000 => (nth_monday(year, 10, 2), "体育の日"),
            _ => (ymd(year, 10, 10), "体育の日"),
        });

        if year == 2019 {
            days.push((ymd(year, 5, 1), "即位の日"));
            days.push((ymd(year, 10, 22), "即位礼正殿の儀の行われる日"));
        }

        days.into_iter()
            .filter_map(|(date, name)| date.map(|d| (d, name)))
            .collect()
    }
}

impl HolidayCalendar for JapaneseHolidays {
    fn holiday_name(&self, date: NaiveDate) -> Option<&'static str> {
        Self::for_year(date.year()).get(&date).copied()
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn nth_monday(year: i32, month: u32, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Mon, n)
}

fn equinox_day(year: i32, base: f64) -> u32 {
    let offset = (year - 1980) as f64;
    (base + 0.242194 * offset - (offset / 4.0).floor()).floor() as u32
}

fn vernal_equinox(year: i32) -> Option<NaiveDate> {
    ymd(year, 3, equinox_day(year, 20.8431))
}

fn autumnal_equinox(year: i32) -> Option<NaiveDate> {
    ymd(year, 9, equinox_day(year, 23.2488))
}

// --- Company Holidays ---

/// Year-end closure (12/29 through 1/3) around the given month.
pub fn year_end_closure(month: TargetMonth) -> BTreeSet<NaiveDate> {
    let mut dates = BTreeSet::new();
    for year in [month.year() - 1, month.year()] {
        for day in 29..=31 {
            dates.extend(ymd(year, 12, day));
        }
        for day in 1..=3 {
            dates.extend(ymd(year + 1, 1, day));
        }
    }
    dates
}

// --- Standard Working Minutes ---

pub struct StandardHoursCalculator<C: HolidayCalendar> {
    calendar: C,
    company_holidays: BTreeSet<NaiveDate>,
    daily_hours: u32,
}

impl<C: HolidayCalendar> StandardHoursCalculator<C> {
    pub fn new(calendar: C, company_holidays: BTreeSet<NaiveDate>, daily_hours: u32) -> Self {
        Self {
            calendar,
            company_holidays,
            daily_hours,
        }
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
            && !self.calendar.is_holiday(date)
            && !self.company_holidays.contains(&date)
    }

    pub fn working_days(&self, month: TargetMonth) -> Vec<NaiveDate> {
        month.days().filter(|d| self.is_working_day(*d)).collect()
    }

    /// Working days × daily hours × 60.
    pub fn standard_minutes(&self, month: TargetMonth) -> i64 {
        let work_days = self.working_days(month).len() as i64;
        let minutes = work_days * self.daily_hours as i64 * 60;
        debug!(
            "Standard working time for {}: {} days x {}h = {} minutes",
            month, work_days, self.daily_hours, minutes
        );
        minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn month(s: &str) -> TargetMonth {
        s.parse().unwrap()
    }

    #[test]
    fn parses_and_formats_target_month() {
        let m = month("2025-02");
        assert_eq!(m.year(), 2025);
        assert_eq!(m.month(), 2);
        assert_eq!(m.to_string(), "2025-02");
        assert_eq!(m.last_day(), date(2025, 2, 28));
        assert_eq!(m.days().count(), 28);
        assert_eq!(month("2024-02").days().count(), 29);
    }

    #[test]
    fn rejects_malformed_months() {
        assert!("2025-13".parse::<TargetMonth>().is_err());
        assert!("2025-1".parse::<TargetMonth>().is_err());
        assert!("October".parse::<TargetMonth>().is_err());
    }

    #[test]
    fn previous_month_wraps_year() {
        assert_eq!(month("2026-01").previous(), month("2025-12"));
        assert_eq!(TargetMonth::containing(date(2025, 11, 17)), month("2025-11"));
    }

    #[test]
    fn november_2025_holidays_include_substitute() {
        let cal = JapaneseHolidays;
        assert_eq!(cal.holiday_name(date(2025, 11, 3)), Some("文化の日"));
        assert_eq!(cal.holiday_name(date(2025, 11, 23)), Some("勤労感謝の日"));
        // Nov 23 2025 is a Sunday.
        assert_eq!(cal.holiday_name(date(2025, 11, 24)), Some(SUBSTITUTE_HOLIDAY));
        assert!(!cal.is_holiday(date(2025, 11, 25)));
    }

    #[test]
    fn golden_week_and_equinoxes() {
        let holidays = JapaneseHolidays::for_year(2025);
        assert!(holidays.contains_key(&date(2025, 3, 20)));
        assert!(holidays.contains_key(&date(2025, 9, 23)));
        assert!(holidays.contains_key(&date(2025, 4, 29)));
        assert!(holidays.contains_key(&date(2025, 5, 3)));
        assert!(holidays.contains_key(&date(2025, 5, 4)));
        assert!(holidays.contains_key(&date(2025, 5, 5)));
        // May 4 2025 (Sunday) pushes the substitute past May 5 to May 6.
        assert_eq!(holidays.get(&date(2025, 5, 6)), Some(&SUBSTITUTE_HOLIDAY));
    }

    #[test]
    fn citizens_holiday_between_two_holidays() {
        // 2026: Respect for the Aged Day Sep 21, equinox Sep 23.
        let holidays = JapaneseHolidays::for_year(2026);
        assert_eq!(holidays.get(&date(2026, 9, 22)), Some(&CITIZENS_HOLIDAY));
    }

    #[test]
    fn olympic_year_moves() {
        let holidays = JapaneseHolidays::for_year(2021);
        assert!(holidays.contains_key(&date(2021, 7, 22)));
        assert!(holidays.contains_key(&date(2021, 7, 23)));
        assert!(holidays.contains_key(&date(2021, 8, 8)));
        // Aug 8 2021 was a Sunday.
        assert!(holidays.contains_key(&date(2021, 8, 9)));
        assert!(!holidays.contains_key(&date(2021, 10, 11)));
    }

    #[test]
    fn enthronement_golden_week_2019() {
        let holidays = JapaneseHolidays::for_year(2019);
        assert!(holidays.contains_key(&date(2019, 4, 29)));
        assert_eq!(holidays.get(&date(2019, 4, 30)), Some(&CITIZENS_HOLIDAY));
        for d in 1..=6 {
            assert!(holidays.contains_key(&date(2019, 5, d)), "May {}", d);
        }
    }

    #[test]
    fn standard_minutes_november_2025() {
        // 30 days, 10 weekend days, Nov 3 and the Nov 24 substitute holiday.
        let calc = StandardHoursCalculator::new(JapaneseHolidays, BTreeSet::new(), 8);
        assert_eq!(calc.working_days(month("2025-11")).len(), 18);
        assert_eq!(calc.standard_minutes(month("2025-11")), 8640);
    }

    #[test]
    fn standard_minutes_excludes_company_holidays() {
        let m = month("2025-12");
        let calc = StandardHoursCalculator::new(JapaneseHolidays, year_end_closure(m), 8);
        // December 2025 has 23 weekdays, of which 12/29-12/31 are closed.
        assert_eq!(calc.working_days(m).len(), 20);
        assert_eq!(calc.standard_minutes(m), 20 * 480);

        let no_closure = StandardHoursCalculator::new(JapaneseHolidays, BTreeSet::new(), 7);
        assert_eq!(no_closure.standard_minutes(m), 23 * 7 * 60);
    }

    #[test]
    fn january_closure_overlaps_new_year() {
        let m = month("2026-01");
        let calc = StandardHoursCalculator::new(JapaneseHolidays, year_end_closure(m), 8);
        let days = calc.working_days(m);
        assert!(!days.contains(&date(2026, 1, 2)));
        assert!(!days.contains(&date(2026, 1, 12))); // Coming of Age Day
        assert_eq!(days.first(), Some(&date(2026, 1, 5)));
    }
}
