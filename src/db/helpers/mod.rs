use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::TransferStatus;

/// Fixed-width UTC form so stored timestamps sort lexically.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_status(value: &str) -> Result<TransferStatus> {
    match value {
        "Active" => Ok(TransferStatus::Active),
        "Stopped" => Ok(TransferStatus::Stopped),
        other => Err(anyhow!("unknown transfer status {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_into_utc() {
        let parsed = parse_datetime("2024-03-01T11:30:00+05:30", "start_timestamp").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T06:00:00+00:00");
        assert!(parse_datetime("yesterday", "start_timestamp").is_err());
    }

    #[test]
    fn formatted_timestamps_sort_chronologically() {
        let early = parse_datetime("2024-03-01T06:00:00Z", "a").unwrap();
        let late = parse_datetime("2024-03-01T06:00:00.5Z", "b").unwrap();
        assert_eq!(format_datetime(&early), "2024-03-01T06:00:00.000000Z");
        assert!(format_datetime(&early) < format_datetime(&late));
        assert_eq!(parse_datetime(&format_datetime(&late), "b").unwrap(), late);
    }

    #[test]
    fn status_round_trips_through_as_str() {
        for status in [TransferStatus::Active, TransferStatus::Stopped] {
            assert_eq!(parse_status(status.as_str()).unwrap(), status);
        }
        assert!(parse_status("Paused").is_err());
    }
}
