//! FHIR `date` / `dateTime` values and date search semantics.
//!
//! Every value denotes a half-open instant range `[lo, hi)` whose width is
//! its precision: `2019` covers the whole year, `2019-03-04` one day, and a
//! full dateTime one second. Values without a zone are read as UTC.

use chrono::{
    DateTime, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat,
    TimeZone, Utc,
};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePrecision {
    Year,
    Month,
    Day,
    DateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FhirDateTime {
    Year(NaiveDate),
    Month(NaiveDate),
    Day(NaiveDate),
    Zoned(DateTime<FixedOffset>),
    Local(NaiveDateTime),
}

impl FhirDateTime {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.contains('T') {
            return parse_date_time(raw);
        }

        match raw.len() {
            4 if raw.chars().all(|c| c.is_ascii_digit()) => {
                let year = raw.parse().ok()?;
                NaiveDate::from_ymd_opt(year, 1, 1).map(FhirDateTime::Year)
            }
            7 => NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
                .ok()
                .map(FhirDateTime::Month),
            10 => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(FhirDateTime::Day),
            _ => None,
        }
    }

    pub fn precision(&self) -> DatePrecision {
        match self {
            FhirDateTime::Year(_) => DatePrecision::Year,
            FhirDateTime::Month(_) => DatePrecision::Month,
            FhirDateTime::Day(_) => DatePrecision::Day,
            FhirDateTime::Zoned(_) | FhirDateTime::Local(_) => DatePrecision::DateTime,
        }
    }

    /// Instant range covered by this value
    pub fn range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match self {
            FhirDateTime::Year(date) => {
                Some((start_of(*date), start_of(date.checked_add_months(Months::new(12))?)))
            }
            FhirDateTime::Month(date) => {
                Some((start_of(*date), start_of(date.checked_add_months(Months::new(1))?)))
            }
            FhirDateTime::Day(date) => Some((start_of(*date), start_of(date.succ_opt()?))),
            FhirDateTime::Zoned(value) => {
                let lo = value.with_timezone(&Utc);
                Some((lo, lo + Duration::seconds(1)))
            }
            FhirDateTime::Local(value) => {
                let lo = Utc.from_utc_datetime(value);
                Some((lo, lo + Duration::seconds(1)))
            }
        }
    }

    /// Moves the value by `steps` units of its own precision.
    ///
    /// Years and months move by calendar units; days and dateTimes by days.
    pub fn shift(&self, steps: i32) -> Option<Self> {
        match self {
            FhirDateTime::Year(date) => add_months(*date, steps * 12).map(FhirDateTime::Year),
            FhirDateTime::Month(date) => add_months(*date, steps).map(FhirDateTime::Month),
            FhirDateTime::Day(date) => date
                .checked_add_signed(Duration::days(i64::from(steps)))
                .map(FhirDateTime::Day),
            FhirDateTime::Zoned(value) => value
                .checked_add_signed(Duration::days(i64::from(steps)))
                .map(FhirDateTime::Zoned),
            FhirDateTime::Local(value) => value
                .checked_add_signed(Duration::days(i64::from(steps)))
                .map(FhirDateTime::Local),
        }
    }
}

impl fmt::Display for FhirDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FhirDateTime::Year(date) => write!(f, "{}", date.format("%Y")),
            FhirDateTime::Month(date) => write!(f, "{}", date.format("%Y-%m")),
            FhirDateTime::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            FhirDateTime::Zoned(value) => {
                f.write_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            FhirDateTime::Local(value) => write!(f, "{}", value.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

fn parse_date_time(raw: &str) -> Option<FhirDateTime> {
    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Some(FhirDateTime::Zoned(value));
    }

    let zoned = match raw.strip_suffix('Z') {
        Some(rest) => format!("{rest}+00:00"),
        None => raw.to_string(),
    };
    if let Ok(value) = DateTime::parse_from_str(&zoned, "%Y-%m-%dT%H:%M%:z") {
        return Some(FhirDateTime::Zoned(value));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(FhirDateTime::Local)
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn add_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    if months >= 0 {
        date.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    }
}

/// Search prefixes applicable to date parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchPrefix {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Sa,
    Eb,
    Ap,
}

impl SearchPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchPrefix::Eq => "eq",
            SearchPrefix::Ne => "ne",
            SearchPrefix::Gt => "gt",
            SearchPrefix::Lt => "lt",
            SearchPrefix::Ge => "ge",
            SearchPrefix::Le => "le",
            SearchPrefix::Sa => "sa",
            SearchPrefix::Eb => "eb",
            SearchPrefix::Ap => "ap",
        }
    }

    fn split(raw: &str) -> (Self, &str) {
        let prefix = match raw.get(..2) {
            Some("eq") => SearchPrefix::Eq,
            Some("ne") => SearchPrefix::Ne,
            Some("gt") => SearchPrefix::Gt,
            Some("lt") => SearchPrefix::Lt,
            Some("ge") => SearchPrefix::Ge,
            Some("le") => SearchPrefix::Le,
            Some("sa") => SearchPrefix::Sa,
            Some("eb") => SearchPrefix::Eb,
            Some("ap") => SearchPrefix::Ap,
            _ => return (SearchPrefix::Eq, raw),
        };
        (prefix, &raw[2..])
    }
}

impl fmt::Display for SearchPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchPrefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match SearchPrefix::split(s) {
            (prefix, "") => Ok(prefix),
            _ => Err(format!("Unknown search prefix: {s}")),
        }
    }
}

/// Range a resource element occupies; `None` bounds are open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Range of a date/dateTime string or of a Period object
    pub fn from_element(element: &Value) -> Option<Self> {
        match element {
            Value::String(raw) => {
                let (lo, hi) = FhirDateTime::parse(raw)?.range()?;
                Some(DateRange {
                    start: Some(lo),
                    end: Some(hi),
                })
            }
            Value::Object(period) => {
                let start = period.get("start").and_then(Value::as_str);
                let end = period.get("end").and_then(Value::as_str);
                if start.is_none() && end.is_none() {
                    return None;
                }
                Some(DateRange {
                    start: match start {
                        Some(raw) => Some(FhirDateTime::parse(raw)?.range()?.0),
                        None => None,
                    },
                    end: match end {
                        Some(raw) => Some(FhirDateTime::parse(raw)?.range()?.1),
                        None => None,
                    },
                })
            }
            _ => None,
        }
    }
}

/// A date search parameter value such as `gt2019-03-04`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSearch {
    pub prefix: SearchPrefix,
    pub value: FhirDateTime,
}

impl DateSearch {
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, rest) = SearchPrefix::split(raw.trim());
        Some(Self {
            prefix,
            value: FhirDateTime::parse(rest)?,
        })
    }

    /// Whether a target range satisfies this search
    pub fn matches(&self, target: &DateRange) -> bool {
        let Some((lo, hi)) = self.value.range() else {
            return false;
        };
        let starts_before = |bound: DateTime<Utc>| target.start.is_none_or(|start| start < bound);
        let ends_after = |bound: DateTime<Utc>| target.end.is_none_or(|end| end > bound);
        let contained = target.start.is_some_and(|start| start >= lo)
            && target.end.is_some_and(|end| end <= hi);

        match self.prefix {
            SearchPrefix::Eq => contained,
            SearchPrefix::Ne => !contained,
            SearchPrefix::Gt => ends_after(hi),
            SearchPrefix::Lt => starts_before(lo),
            SearchPrefix::Ge => ends_after(lo),
            SearchPrefix::Le => starts_before(hi),
            SearchPrefix::Sa => target.start.is_some_and(|start| start >= hi),
            SearchPrefix::Eb => target.end.is_some_and(|end| end <= lo),
            SearchPrefix::Ap => starts_before(hi) && ends_after(lo),
        }
    }
}

impl fmt::Display for DateSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_every_precision() {
        assert_eq!(FhirDateTime::parse("2019").unwrap().precision(), DatePrecision::Year);
        assert_eq!(FhirDateTime::parse("2019-03").unwrap().precision(), DatePrecision::Month);
        assert_eq!(FhirDateTime::parse("2019-03-04").unwrap().precision(), DatePrecision::Day);
        assert_eq!(
            FhirDateTime::parse("2019-03-04T10:00:00+02:00").unwrap().precision(),
            DatePrecision::DateTime
        );
        assert_eq!(
            FhirDateTime::parse("2019-03-04T10:00Z").unwrap().precision(),
            DatePrecision::DateTime
        );
        assert!(FhirDateTime::parse("2019-3-4").is_none());
        assert!(FhirDateTime::parse("yesterday").is_none());
    }

    #[test]
    fn formatting_keeps_precision_and_zone() {
        for raw in ["2019", "2019-03", "2019-03-04", "2019-03-04T10:00:00+02:00", "2019-03-04T10:00:00Z"] {
            assert_eq!(FhirDateTime::parse(raw).unwrap().to_string(), raw);
        }
        assert_eq!(
            FhirDateTime::parse("2019-03-04T10:00:00").unwrap().to_string(),
            "2019-03-04T10:00:00"
        );
    }

    #[test]
    fn shifting_uses_precision_units() {
        let shift = |raw: &str, steps| FhirDateTime::parse(raw).unwrap().shift(steps).unwrap().to_string();
        assert_eq!(shift("2019", -1), "2018");
        assert_eq!(shift("2019-12", 1), "2020-01");
        assert_eq!(shift("2019-03-01", -1), "2019-02-28");
        assert_eq!(shift("2019-03-04T10:00:00Z", 1), "2019-03-05T10:00:00Z");
    }

    #[test]
    fn month_range_covers_whole_month() {
        let (lo, hi) = FhirDateTime::parse("2019-02").unwrap().range().unwrap();
        assert_eq!(lo.to_rfc3339(), "2019-02-01T00:00:00+00:00");
        assert_eq!(hi.to_rfc3339(), "2019-03-01T00:00:00+00:00");
    }

    #[test]
    fn prefix_semantics_against_period() {
        let period = DateRange::from_element(&json!({"start": "2019-03-01", "end": "2019-03-31"})).unwrap();
        let check = |raw: &str| DateSearch::parse(raw).unwrap().matches(&period);

        assert!(check("gt2019-02-28"));
        assert!(!check("gt2019-03-31"));
        assert!(check("lt2019-04-01"));
        assert!(!check("lt2019-03-01"));
        assert!(check("le2019-03-01"));
        assert!(check("ge2019-03-31"));
        assert!(!check("ge2019-04-01"));
        assert!(check("eq2019-03"));
        assert!(!check("2019-03-15"));
        assert!(check("ne2019-03-15"));
        assert!(check("sa2019-02-28"));
        assert!(check("eb2019-04-01"));
        assert!(check("ap2019-03-15"));
    }

    #[test]
    fn open_periods_extend_to_infinity() {
        let ongoing = DateRange::from_element(&json!({"start": "2019-03-01"})).unwrap();
        assert!(DateSearch::parse("gt2030-01-01").unwrap().matches(&ongoing));
        assert!(!DateSearch::parse("lt2019-03-01").unwrap().matches(&ongoing));
        assert!(!DateSearch::parse("eq2019").unwrap().matches(&ongoing));
    }

    #[test]
    fn unknown_prefix_defaults_to_eq() {
        let search = DateSearch::parse("2019-03-04").unwrap();
        assert_eq!(search.prefix, SearchPrefix::Eq);
        assert_eq!(search.to_string(), "eq2019-03-04");
        assert_eq!("le".parse::<SearchPrefix>().unwrap(), SearchPrefix::Le);
        assert!("xx".parse::<SearchPrefix>().is_err());
    }
}
