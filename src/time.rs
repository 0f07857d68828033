//! Safe ISO-8601 parsing and POSIX timestamp derivation.
//!
//! The catalog hands back date strings that may be missing, empty, or
//! malformed. `SafeDate` makes "absent" an explicit state instead of letting
//! callers branch on truthiness.

use chrono::{DateTime, NaiveDate, Utc};

/// Either a valid instant parsed from the catalog, or "absent" (missing,
/// empty, or unparseable). Producers fall back to wall-clock `now()` only at
/// the point where a `Stat` actually needs a number; the absence itself is
/// preserved everywhere else (e.g. the `Added:`/`Updated:` lines in track
/// text, which are omitted entirely rather than printing "now").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafeDate {
    Valid(DateTime<Utc>),
    Absent,
}

impl SafeDate {
    pub fn valid(&self) -> Option<DateTime<Utc>> {
        match self {
            SafeDate::Valid(dt) => Some(*dt),
            SafeDate::Absent => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, SafeDate::Valid(_))
    }

    /// Seconds since epoch, floating point, falling back to wall-clock now.
    pub fn epoch_seconds_or_now(&self) -> f64 {
        match self {
            SafeDate::Valid(dt) => epoch_seconds(*dt),
            SafeDate::Absent => epoch_seconds(Utc::now()),
        }
    }
}

/// `epoch_ms / 1000` in floating form, as spec'd.
pub fn epoch_seconds(dt: DateTime<Utc>) -> f64 {
    dt.timestamp_millis() as f64 / 1000.0
}

/// Parse a catalog date string. Mirrors the reference's `createSafeDate`:
/// an input yields a valid date only if non-empty and the parse produces a
/// finite instant.
pub fn create_safe_date(input: Option<&str>) -> SafeDate {
    let Some(s) = input else {
        return SafeDate::Absent;
    };
    if s.is_empty() {
        return SafeDate::Absent;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return SafeDate::Valid(dt.with_timezone(&Utc));
    }

    // Accept bare dates (no time component) as a fallback; still "finite".
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = d.and_hms_opt(0, 0, 0) {
            return SafeDate::Valid(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    SafeDate::Absent
}

/// Earliest valid date among a set of optional strings, ignoring unparseable
/// entries entirely (used for directory `created_at` aggregation in §4.1).
pub fn earliest(dates: impl IntoIterator<Item = SafeDate>) -> SafeDate {
    dates
        .into_iter()
        .filter_map(|d| d.valid())
        .min()
        .map(SafeDate::Valid)
        .unwrap_or(SafeDate::Absent)
}

/// Latest valid date among a set of optional strings (directory `updated_at`
/// aggregation).
pub fn latest(dates: impl IntoIterator<Item = SafeDate>) -> SafeDate {
    dates
        .into_iter()
        .filter_map(|d| d.valid())
        .max()
        .map(SafeDate::Valid)
        .unwrap_or(SafeDate::Absent)
}

/// Locale-ish rendering used in track text bodies (`Added:`/`Updated:`).
/// The reference uses the runtime's `toLocaleString`; we pick a fixed,
/// deterministic rendering so the stat-size/read-bytes invariant (§8) holds
/// without depending on process locale.
pub fn format_localized(dt: DateTime<Utc>) -> String {
    dt.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_missing_are_absent() {
        assert_eq!(create_safe_date(Some("")), SafeDate::Absent);
        assert_eq!(create_safe_date(None), SafeDate::Absent);
        assert_eq!(create_safe_date(Some("not a date")), SafeDate::Absent);
    }

    #[test]
    fn valid_rfc3339_parses() {
        let d = create_safe_date(Some("2023-06-15T10:30:00.000Z"));
        assert!(d.is_valid());
        assert_eq!(epoch_seconds(d.valid().unwrap()), 1686825000.0);
    }

    #[test]
    fn earliest_and_latest_skip_invalid() {
        let dates = vec![
            create_safe_date(Some("2023-06-15T10:30:00.000Z")),
            create_safe_date(Some("not a date")),
            create_safe_date(Some("2020-01-01T00:00:00.000Z")),
        ];
        assert_eq!(
            earliest(dates.clone()).valid().unwrap().timestamp(),
            create_safe_date(Some("2020-01-01T00:00:00.000Z"))
                .valid()
                .unwrap()
                .timestamp()
        );
        assert_eq!(
            latest(dates).valid().unwrap().timestamp(),
            create_safe_date(Some("2023-06-15T10:30:00.000Z"))
                .valid()
                .unwrap()
                .timestamp()
        );
    }

    #[test]
    fn all_invalid_yields_absent() {
        let dates = vec![create_safe_date(Some("")), create_safe_date(None)];
        assert_eq!(earliest(dates.clone()), SafeDate::Absent);
        assert_eq!(latest(dates), SafeDate::Absent);
    }
}
