//! The period helper (spec.md §4.8): pure, tag-based time-window scoping
//! used to "close the books" — partition an otherwise-unbounded stream of
//! events into statements an accountant (or any append-only ledger) can
//! seal and never reopen.
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::tag::Tag;

/// How a period boundary is computed from a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Yearly,
    Monthly,
    Daily,
    Hourly,
    /// No windowing: the whole log is one period, `"all"`.
    None,
}

/// A period's stable, orderable, human-readable identifier — also the
/// `period` tag's value on `StatementOpened`/`StatementClosed` events and
/// on every event scoped to that period.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PeriodId(String);

impl PeriodId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Computes the identifier of the period containing `at`, under
    /// `period_type`.
    pub fn containing(period_type: PeriodType, at: DateTime<Utc>) -> Self {
        let id = match period_type {
            PeriodType::Yearly => format!("{:04}", at.year()),
            PeriodType::Monthly => format!("{:04}-{:02}", at.year(), at.month()),
            PeriodType::Daily => format!("{:04}-{:02}-{:02}", at.year(), at.month(), at.day()),
            PeriodType::Hourly => format!(
                "{:04}-{:02}-{:02}T{:02}",
                at.year(),
                at.month(),
                at.day(),
                at.hour()
            ),
            PeriodType::None => "all".to_string(),
        };
        PeriodId(id)
    }

    /// The tag used to scope events, statements, and queries to this
    /// period.
    pub fn tag(&self) -> Tag {
        Tag::new("period", &self.0).expect("period ids are generated, always valid tag values")
    }
}

impl std::fmt::Display for PeriodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn monthly_periods_group_by_calendar_month() {
        let a = PeriodId::containing(PeriodType::Monthly, at(2026, 1, 5, 3));
        let b = PeriodId::containing(PeriodType::Monthly, at(2026, 1, 31, 23));
        let c = PeriodId::containing(PeriodType::Monthly, at(2026, 2, 1, 0));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str(), "2026-01");
    }

    #[test]
    fn none_collapses_every_instant_to_a_single_period() {
        let a = PeriodId::containing(PeriodType::None, at(2020, 1, 1, 0));
        let b = PeriodId::containing(PeriodType::None, at(2030, 12, 31, 23));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "all");
    }

    #[test]
    fn period_ids_sort_chronologically_as_strings() {
        let jan = PeriodId::containing(PeriodType::Monthly, at(2026, 1, 1, 0));
        let feb = PeriodId::containing(PeriodType::Monthly, at(2026, 2, 1, 0));
        assert!(jan < feb);
    }
}
