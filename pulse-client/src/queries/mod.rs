//! Read-side aggregations over the full submission history.
//!
//! The store is small and always loaded wholesale, so every query here is a
//! plain pass over a record slice.

use crate::domain::{PulseRecord, Temple};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TempleAverages {
    pub temple: Temple,
    pub record_count: usize,
    /// `None` when the temple has no records.
    pub avg_crowd_index: Option<f64>,
    pub avg_queue_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ZoneVisitors {
    pub zone: Option<String>,
    pub visitor_count: u64,
    pub submissions: usize,
}

pub fn records_for_temple(records: &[PulseRecord], temple: Temple) -> impl Iterator<Item = &PulseRecord> {
    records.iter().filter(move |r| r.temple == temple)
}

/// Rounds to two decimal places.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Average crowd index and queue time of one temple, rounded to 2 decimals.
pub fn temple_averages(records: &[PulseRecord], temple: Temple) -> TempleAverages {
    let filtered: Vec<&PulseRecord> = records_for_temple(records, temple).collect();

    TempleAverages {
        temple,
        record_count: filtered.len(),
        avg_crowd_index: mean(filtered.iter().map(|r| f64::from(r.crowd_index))).map(round2),
        avg_queue_time: mean(filtered.iter().map(|r| r.queue_time)).map(round2),
    }
}

/// Visitor totals per zone for one temple, in the order zones first appear.
pub fn zone_visitor_totals(records: &[PulseRecord], temple: Temple) -> Vec<ZoneVisitors> {
    let mut out: Vec<ZoneVisitors> = Vec::new();

    for r in records_for_temple(records, temple) {
        match out.iter_mut().find(|z| z.zone == r.zone) {
            Some(z) => {
                z.visitor_count = z.visitor_count.saturating_add(r.visitor_count);
                z.submissions += 1;
            }
            None => out.push(ZoneVisitors {
                zone: r.zone.clone(),
                visitor_count: r.visitor_count,
                submissions: 1,
            }),
        }
    }

    out
}

/// The most recent submission for a temple. Among equal timestamps the one
/// appended last wins.
pub fn latest_for_temple(records: &[PulseRecord], temple: Temple) -> Option<&PulseRecord> {
    records_for_temple(records, temple).max_by_key(|r| r.timestamp)
}

/// Newest-first view of the whole history, truncated to `limit` rows.
pub fn recent(records: &[PulseRecord], limit: usize) -> Vec<&PulseRecord> {
    let mut sorted: Vec<&PulseRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted.truncate(limit);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PaymentMode;
    use time::{macros::datetime, OffsetDateTime};

    fn record(ts: OffsetDateTime, temple: Temple, zone: Option<&str>, visitors: u64, queue: f64, index: u8) -> PulseRecord {
        PulseRecord {
            timestamp: ts,
            temple,
            zone: zone.map(str::to_string),
            visitor_count: visitors,
            queue_time: queue,
            top_services: "Darshan".to_string(),
            payment_modes: vec![PaymentMode::Cash],
            crowd_index: index,
            peak_hour_flag: Some(false),
        }
    }

    fn sample() -> Vec<PulseRecord> {
        vec![
            record(datetime!(2024-05-01 08:00:00 UTC), Temple::Somnath, Some("Entry Gate"), 120, 15.0, 4),
            record(datetime!(2024-05-01 09:00:00 UTC), Temple::Dwarka, Some("Prasad Counter"), 80, 5.0, 2),
            record(datetime!(2024-05-01 10:00:00 UTC), Temple::Somnath, Some("Prasad Counter"), 60, 10.0, 5),
            record(datetime!(2024-05-01 11:00:00 UTC), Temple::Somnath, Some("Entry Gate"), 200, 25.0, 8),
        ]
    }

    #[test]
    fn averages_are_means_of_the_temple_subset() {
        let avg = temple_averages(&sample(), Temple::Somnath);
        assert_eq!(avg.record_count, 3);
        assert_eq!(avg.avg_crowd_index, Some(5.67));
        assert_eq!(avg.avg_queue_time, Some(16.67));
    }

    #[test]
    fn averages_are_none_for_temple_without_records() {
        let avg = temple_averages(&sample(), Temple::Ambaji);
        assert_eq!(avg.record_count, 0);
        assert_eq!(avg.avg_crowd_index, None);
        assert_eq!(avg.avg_queue_time, None);
    }

    #[test]
    fn zone_totals_sum_visitors_in_first_seen_order() {
        let zones = zone_visitor_totals(&sample(), Temple::Somnath);
        assert_eq!(
            zones,
            vec![
                ZoneVisitors { zone: Some("Entry Gate".to_string()), visitor_count: 320, submissions: 2 },
                ZoneVisitors { zone: Some("Prasad Counter".to_string()), visitor_count: 60, submissions: 1 },
            ]
        );
    }

    #[test]
    fn zone_totals_saturate_instead_of_overflowing() {
        let ts = datetime!(2024-05-01 08:00:00 UTC);
        let records = vec![
            record(ts, Temple::Dwarka, Some("Gomti Ghat"), u64::MAX - 5, 1.0, 1),
            record(ts, Temple::Dwarka, Some("Gomti Ghat"), 10, 1.0, 1),
        ];
        let zones = zone_visitor_totals(&records, Temple::Dwarka);
        assert_eq!(zones[0].visitor_count, u64::MAX);
        assert_eq!(zones[0].submissions, 2);
    }

    #[test]
    fn latest_picks_max_timestamp() {
        let records = sample();
        let latest = latest_for_temple(&records, Temple::Somnath).unwrap();
        assert_eq!(latest.visitor_count, 200);
        assert!(latest_for_temple(&records, Temple::Pavagadh).is_none());
    }

    #[test]
    fn recent_is_newest_first_and_truncated() {
        let records = sample();
        let rows = recent(&records, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp, datetime!(2024-05-01 11:00:00 UTC));
        assert_eq!(rows[1].timestamp, datetime!(2024-05-01 10:00:00 UTC));
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(2.346), 2.35);
        assert_eq!(round2(2.344), 2.34);
        assert_eq!(round2(7.0), 7.0);
    }
}
