//! On-disk row shape. Column names match legacy pandas-written
//! `temple_pulse.csv` files so they load unchanged.

use pulse_client::domain::{join_payment_modes, parse_payment_modes, PulseRecord, Temple};
use serde::{Deserialize, Serialize};
use time::{
    format_description::{well_known::Rfc3339, FormatItem},
    macros::format_description,
    OffsetDateTime, PrimitiveDateTime,
};

pub const COLUMNS: [&str; 9] = [
    "timestamp",
    "temple",
    "zone",
    "visitor_count",
    "queue_time",
    "top_services",
    "payment_modes",
    "crowd_index",
    "peak_hour_flag",
];

const LEGACY_TS_FRACTIONAL: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
const LEGACY_TS: &[FormatItem<'static>] = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Every column is read as text so legacy quirks (`120.0` counts, `True`
/// flags, blank zones) can be handled explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PulseRow {
    pub timestamp: String,
    pub temple: String,
    #[serde(default)]
    pub zone: String,
    pub visitor_count: String,
    pub queue_time: String,
    #[serde(default)]
    pub top_services: String,
    #[serde(default)]
    pub payment_modes: String,
    pub crowd_index: String,
    #[serde(default)]
    pub peak_hour_flag: String,
}

pub fn format_timestamp(ts: OffsetDateTime) -> Result<String, time::error::Format> {
    ts.format(&Rfc3339)
}

/// Accepts RFC 3339 and the naive `YYYY-MM-DD HH:MM:SS[.ffffff]` form, the
/// latter read as UTC.
pub fn parse_timestamp(s: &str) -> Result<OffsetDateTime, String> {
    let s = s.trim();
    if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(ts);
    }
    PrimitiveDateTime::parse(s, LEGACY_TS_FRACTIONAL)
        .or_else(|_| PrimitiveDateTime::parse(s, LEGACY_TS))
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| format!("invalid timestamp '{s}': {e}"))
}

fn parse_whole_number(name: &str, s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Ok(v) = s.parse::<u64>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Ok(v as u64),
        _ => Err(format!("invalid {name} '{s}'")),
    }
}

fn parse_flag(s: &str) -> Result<Option<bool>, String> {
    match s.trim() {
        "" => Ok(None),
        "True" | "true" | "1" => Ok(Some(true)),
        "False" | "false" | "0" => Ok(Some(false)),
        other => Err(format!("invalid peak_hour_flag '{other}'")),
    }
}

fn optional_text(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl TryFrom<PulseRow> for PulseRecord {
    type Error = String;

    fn try_from(row: PulseRow) -> Result<Self, Self::Error> {
        let temple: Temple = row.temple.parse().map_err(|e| format!("{e}"))?;

        let queue_time: f64 = row
            .queue_time
            .trim()
            .parse()
            .map_err(|e| format!("invalid queue_time '{}': {e}", row.queue_time))?;

        let crowd_index = parse_whole_number("crowd_index", &row.crowd_index)?;
        let crowd_index =
            u8::try_from(crowd_index).map_err(|_| format!("crowd_index {crowd_index} out of range"))?;

        Ok(PulseRecord {
            timestamp: parse_timestamp(&row.timestamp)?,
            temple,
            zone: optional_text(&row.zone),
            visitor_count: parse_whole_number("visitor_count", &row.visitor_count)?,
            queue_time,
            top_services: row.top_services,
            payment_modes: parse_payment_modes(&row.payment_modes).map_err(|e| format!("{e}"))?,
            crowd_index,
            peak_hour_flag: parse_flag(&row.peak_hour_flag)?,
        })
    }
}

impl PulseRow {
    pub fn from_record(r: &PulseRecord) -> Result<Self, time::error::Format> {
        Ok(PulseRow {
            timestamp: format_timestamp(r.timestamp)?,
            temple: r.temple.to_string(),
            zone: r.zone.clone().unwrap_or_default(),
            visitor_count: r.visitor_count.to_string(),
            queue_time: r.queue_time.to_string(),
            top_services: r.top_services.clone(),
            payment_modes: join_payment_modes(&r.payment_modes),
            crowd_index: r.crowd_index.to_string(),
            peak_hour_flag: match r.peak_hour_flag {
                Some(true) => "True".to_string(),
                Some(false) => "False".to_string(),
                None => String::new(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_client::domain::PaymentMode;
    use time::macros::datetime;

    fn legacy_row() -> PulseRow {
        PulseRow {
            timestamp: "2024-05-01 13:45:10.123456".to_string(),
            temple: "Ambaji".to_string(),
            zone: "".to_string(),
            visitor_count: "150.0".to_string(),
            queue_time: "12".to_string(),
            top_services: "Prasad".to_string(),
            payment_modes: "Cash,UPI".to_string(),
            crowd_index: "6".to_string(),
            peak_hour_flag: "True".to_string(),
        }
    }

    #[test]
    fn legacy_row_converts() {
        let r = PulseRecord::try_from(legacy_row()).unwrap();
        assert_eq!(r.temple, Temple::Ambaji);
        assert_eq!(r.zone, None);
        assert_eq!(r.visitor_count, 150);
        assert_eq!(r.queue_time, 12.0);
        assert_eq!(r.payment_modes, vec![PaymentMode::Cash, PaymentMode::Upi]);
        assert_eq!(r.crowd_index, 6);
        assert_eq!(r.peak_hour_flag, Some(true));
        assert_eq!(r.timestamp.date(), datetime!(2024-05-01 00:00:00 UTC).date());
    }

    #[test]
    fn legacy_timestamp_without_fraction_parses() {
        let ts = parse_timestamp("2024-05-01 13:45:10").unwrap();
        assert_eq!(ts, datetime!(2024-05-01 13:45:10 UTC));
    }

    #[test]
    fn fractional_visitor_count_is_rejected() {
        let mut row = legacy_row();
        row.visitor_count = "12.5".to_string();
        assert!(PulseRecord::try_from(row).is_err());
    }

    #[test]
    fn unknown_temple_is_rejected() {
        let mut row = legacy_row();
        row.temple = "Kedarnath".to_string();
        let err = PulseRecord::try_from(row).unwrap_err();
        assert!(err.contains("Kedarnath"));
    }

    #[test]
    fn record_writes_pandas_style_flag_and_rfc3339_ts() {
        let r = PulseRecord::try_from(legacy_row()).unwrap();
        let row = PulseRow::from_record(&r).unwrap();
        assert_eq!(row.peak_hour_flag, "True");
        assert_eq!(row.payment_modes, "Cash,UPI");
        assert!(row.timestamp.starts_with("2024-05-01T13:45:10"));
        assert_eq!(row.zone, "");
    }
}
