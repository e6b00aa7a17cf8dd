//! Cleanliness evaluation for a single transfer session.
//!
//! Pure computation: takes a session, its route's magnet mappings, the
//! magnet lookup, every cleaning record and the session's current
//! checkpoint, and decides whether an interval boundary has been crossed
//! and which magnets were left uncleaned since the last one.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::error::{MonitorError, MonitorResult};
use crate::models::{CleaningRecord, Magnet, MagnetMapping, TransferSession};

/// Strictly positive cleaning cadence in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleaningInterval(i64);

impl CleaningInterval {
    pub fn new(session_id: &str, seconds: i64) -> MonitorResult<Self> {
        if seconds <= 0 {
            return Err(MonitorError::invalid_interval(session_id, seconds));
        }
        Ok(Self(seconds))
    }

    pub fn for_session(session: &TransferSession) -> MonitorResult<Self> {
        Self::new(&session.id, session.cleaning_interval_seconds)
    }

    pub fn seconds(&self) -> i64 {
        self.0
    }
}

pub struct EvaluationInput<'a> {
    pub session: &'a TransferSession,
    pub interval: CleaningInterval,
    pub now: DateTime<Utc>,
    /// Mappings for any route; only the session's route is considered.
    pub mappings: &'a [MagnetMapping],
    pub magnets: &'a HashMap<String, Magnet>,
    pub records: &'a [CleaningRecord],
    pub checkpoint: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MagnetStatus {
    pub magnet: Magnet,
    pub last_cleaned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub session_id: String,
    pub source_name: String,
    pub destination_name: String,
    pub interval: CleaningInterval,
    pub intervals_passed: i64,
    pub last_alert_time: DateTime<Utc>,
    pub cleaned: Vec<MagnetStatus>,
    pub uncleaned: Vec<MagnetStatus>,
}

impl Decision {
    pub fn is_clean(&self) -> bool {
        self.uncleaned.is_empty()
    }

    pub fn total(&self) -> usize {
        self.cleaned.len() + self.uncleaned.len()
    }

    /// Elapsed transfer time rounded down to the last interval boundary.
    pub fn elapsed_seconds(&self) -> i64 {
        self.intervals_passed * self.interval.seconds()
    }

    pub fn uncleaned_names(&self) -> Vec<String> {
        self.uncleaned
            .iter()
            .map(|status| status.magnet.name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// No new interval boundary since the checkpoint.
    NotDue { intervals_passed: i64 },
    Due(Decision),
}

/// Whole intervals elapsed between `start` and `now`, floored. Negative when
/// the session starts in the future.
pub fn intervals_passed(
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    interval: CleaningInterval,
) -> i64 {
    let elapsed_ms = (now - start).num_milliseconds();
    elapsed_ms.div_euclid(interval.seconds().saturating_mul(1000))
}

pub fn evaluate(input: &EvaluationInput<'_>) -> Evaluation {
    let session = input.session;
    let passed = intervals_passed(session.start_timestamp, input.now, input.interval);
    if passed <= input.checkpoint {
        return Evaluation::NotDue {
            intervals_passed: passed,
        };
    }

    // checkpoint < passed, so this offset is bounded by the elapsed time.
    let last_alert_time =
        session.start_timestamp + Duration::seconds(input.checkpoint * input.interval.seconds());
    let latest = latest_cleanings(input.records);

    let mut seen = HashSet::new();
    let mut cleaned = Vec::new();
    let mut uncleaned = Vec::new();

    for mapping in input
        .mappings
        .iter()
        .filter(|mapping| mapping.route_id == session.route_id)
    {
        if !seen.insert(mapping.magnet_id.as_str()) {
            continue;
        }
        // Dangling mapping: nothing to report on.
        let Some(magnet) = input.magnets.get(&mapping.magnet_id) else {
            continue;
        };

        let last_cleaned_at = latest
            .get(mapping.magnet_id.as_str())
            .map(|record| record.cleaning_timestamp);
        let status = MagnetStatus {
            magnet: magnet.clone(),
            last_cleaned_at,
        };

        match last_cleaned_at {
            Some(at) if at >= last_alert_time => cleaned.push(status),
            _ => uncleaned.push(status),
        }
    }

    Evaluation::Due(Decision {
        session_id: session.id.clone(),
        source_name: session.source_name.clone(),
        destination_name: session.destination_name.clone(),
        interval: input.interval,
        intervals_passed: passed,
        last_alert_time,
        cleaned,
        uncleaned,
    })
}

/// Most recent record per magnet. Records sharing a timestamp are ordered by
/// id so the pick is deterministic.
pub fn latest_cleanings(records: &[CleaningRecord]) -> HashMap<&str, &CleaningRecord> {
    let mut latest: HashMap<&str, &CleaningRecord> = HashMap::new();
    for record in records {
        latest
            .entry(record.magnet_id.as_str())
            .and_modify(|current| {
                if (record.cleaning_timestamp, &record.id)
                    > (current.cleaning_timestamp, &current.id)
                {
                    *current = record;
                }
            })
            .or_insert(record);
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransferStatus;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap()
    }

    fn session(interval: i64) -> TransferSession {
        TransferSession {
            id: "transfer-7".into(),
            route_id: "route-a".into(),
            source_name: "Godown 2".into(),
            destination_name: "Precleaning Bin 4".into(),
            start_timestamp: t0(),
            cleaning_interval_seconds: interval,
            status: TransferStatus::Active,
        }
    }

    fn magnets(names: &[(&str, &str)]) -> HashMap<String, Magnet> {
        names
            .iter()
            .map(|(id, name)| {
                (
                    id.to_string(),
                    Magnet {
                        id: id.to_string(),
                        name: name.to_string(),
                    },
                )
            })
            .collect()
    }

    fn mapping(magnet_id: &str) -> MagnetMapping {
        MagnetMapping {
            magnet_id: magnet_id.into(),
            route_id: "route-a".into(),
        }
    }

    fn record(id: &str, magnet_id: &str, at: DateTime<Utc>) -> CleaningRecord {
        CleaningRecord {
            id: id.into(),
            magnet_id: magnet_id.into(),
            cleaning_timestamp: at,
            transfer_session_id: None,
        }
    }

    fn secs(n: i64) -> Duration {
        Duration::seconds(n)
    }

    fn expect_due(evaluation: Evaluation) -> Decision {
        match evaluation {
            Evaluation::Due(decision) => decision,
            other => panic!("expected a due decision, got {other:?}"),
        }
    }

    #[test]
    fn interval_index_is_floored() {
        let interval = CleaningInterval::new("s", 60).unwrap();
        assert_eq!(intervals_passed(t0(), t0() + secs(150), interval), 2);
        assert_eq!(intervals_passed(t0(), t0() + secs(59), interval), 0);
        assert_eq!(intervals_passed(t0(), t0() + secs(60), interval), 1);
        assert_eq!(intervals_passed(t0(), t0() - secs(1), interval), -1);
    }

    #[test]
    fn rejects_non_positive_interval() {
        assert!(matches!(
            CleaningInterval::new("s", 0),
            Err(MonitorError::InvalidInterval { seconds: 0, .. })
        ));
        assert!(CleaningInterval::for_session(&session(-30)).is_err());
    }

    #[test]
    fn not_due_within_acknowledged_interval() {
        let session = session(60);
        let lookup = magnets(&[("m1", "Drum Magnet")]);
        let mappings = vec![mapping("m1")];
        let input = EvaluationInput {
            session: &session,
            interval: CleaningInterval::for_session(&session).unwrap(),
            now: t0() + secs(150),
            mappings: &mappings,
            magnets: &lookup,
            records: &[],
            checkpoint: 2,
        };

        assert_eq!(
            evaluate(&input),
            Evaluation::NotDue {
                intervals_passed: 2
            }
        );
    }

    #[test]
    fn cleaning_at_boundary_counts_as_clean() {
        let session = session(60);
        let lookup = magnets(&[("m1", "Drum Magnet")]);
        let mappings = vec![mapping("m1")];
        // checkpoint 1 -> last alert boundary at t0 + 60s
        let records = vec![record("r1", "m1", t0() + secs(60))];
        let input = EvaluationInput {
            session: &session,
            interval: CleaningInterval::for_session(&session).unwrap(),
            now: t0() + secs(125),
            mappings: &mappings,
            magnets: &lookup,
            records: &records,
            checkpoint: 1,
        };

        let decision = expect_due(evaluate(&input));
        assert_eq!(decision.last_alert_time, t0() + secs(60));
        assert!(decision.is_clean());
        assert_eq!(decision.cleaned.len(), 1);
    }

    #[test]
    fn stale_and_missing_records_are_dirty() {
        let session = session(60);
        let lookup = magnets(&[
            ("m1", "Drum Magnet"),
            ("m2", "Plate Magnet"),
            ("m3", "Grill Magnet"),
        ]);
        let mappings = vec![mapping("m1"), mapping("m2"), mapping("m3")];
        let records = vec![
            record("r1", "m2", t0() + secs(10)),
            record("r2", "m3", t0() + secs(59)),
        ];
        let input = EvaluationInput {
            session: &session,
            interval: CleaningInterval::for_session(&session).unwrap(),
            now: t0() + secs(150),
            mappings: &mappings,
            magnets: &lookup,
            records: &records,
            checkpoint: 1,
        };

        let decision = expect_due(evaluate(&input));
        assert_eq!(decision.intervals_passed, 2);
        assert_eq!(decision.total(), 3);
        assert_eq!(
            decision.uncleaned_names(),
            vec!["Drum Magnet", "Plate Magnet", "Grill Magnet"]
        );
        assert_eq!(decision.elapsed_seconds(), 120);
    }

    #[test]
    fn dangling_and_foreign_mappings_are_ignored() {
        let session = session(60);
        let lookup = magnets(&[("m1", "Drum Magnet"), ("m9", "Other Route Magnet")]);
        let mappings = vec![
            mapping("m1"),
            mapping("ghost"),
            mapping("m1"),
            MagnetMapping {
                magnet_id: "m9".into(),
                route_id: "route-b".into(),
            },
        ];
        let input = EvaluationInput {
            session: &session,
            interval: CleaningInterval::for_session(&session).unwrap(),
            now: t0() + secs(61),
            mappings: &mappings,
            magnets: &lookup,
            records: &[],
            checkpoint: 0,
        };

        let decision = expect_due(evaluate(&input));
        assert_eq!(decision.total(), 1);
        assert_eq!(decision.uncleaned_names(), vec!["Drum Magnet"]);
    }

    #[test]
    fn route_without_magnets_is_clean() {
        let session = session(60);
        let lookup = HashMap::new();
        let input = EvaluationInput {
            session: &session,
            interval: CleaningInterval::for_session(&session).unwrap(),
            now: t0() + secs(61),
            mappings: &[],
            magnets: &lookup,
            records: &[],
            checkpoint: 0,
        };

        let decision = expect_due(evaluate(&input));
        assert!(decision.is_clean());
        assert_eq!(decision.total(), 0);
    }

    #[test]
    fn latest_record_wins_and_ties_break_on_id() {
        let at = t0() + secs(30);
        let records = vec![
            record("a", "m1", t0()),
            record("c", "m1", at),
            record("b", "m1", at),
            record("z", "m2", t0()),
        ];

        let latest = latest_cleanings(&records);
        assert_eq!(latest["m1"].id, "c");
        assert_eq!(latest["m2"].id, "z");
    }
}
