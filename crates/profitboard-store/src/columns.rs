//! Conversions between SQLite text columns and domain types.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

/// Fixed-width RFC 3339 in UTC, so that text ordering is chronological.
pub(crate) fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_failure<E>(row: &Row<'_>, column: &str, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let idx = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn uuid(row: &Row<'_>, column: &str) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(column)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_failure(row, column, e))
}

pub(crate) fn ts(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    parse_ts(row, column, &raw)
}

pub(crate) fn opt_ts(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|s| parse_ts(row, column, &s)).transpose()
}

fn parse_ts(row: &Row<'_>, column: &str, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_failure(row, column, e))
}

/// Parse a text column through the type's `FromStr` (roles, statuses).
pub(crate) fn parsed<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(column)?;
    raw.parse().map_err(|e| conversion_failure(row, column, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_as_text() {
        let whole = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let later = whole + chrono::Duration::microseconds(1500);
        assert_eq!(fmt_ts(&whole), "2024-03-05T12:00:00.000000Z");
        assert!(fmt_ts(&whole) < fmt_ts(&later));
        assert_eq!(fmt_ts(&whole).len(), fmt_ts(&later).len());
    }
}
