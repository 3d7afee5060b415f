//! View models behind the read-only routes. Aggregation itself lives in
//! `pulse_client::queries`; this layer shapes the results for the API.

use pulse_client::{
    domain::{join_payment_modes, PulseRecord, Temple},
    queries::{latest_for_temple, records_for_temple, temple_averages, zone_visitor_totals, TempleAverages, ZoneVisitors},
};
use rand::Rng;
use serde::Serialize;
use time::OffsetDateTime;

use crate::config::HeatmapConfig;

pub const PEAK_HOUR_NOTICE: &str = "Peak hour detected - expect delays.";

#[derive(Debug, Clone, Serialize)]
pub struct TempleOverview {
    #[serde(flatten)]
    pub averages: TempleAverages,
    pub zones: Vec<ZoneVisitors>,
}

pub fn temple_overview(records: &[PulseRecord], temple: Temple) -> TempleOverview {
    TempleOverview {
        averages: temple_averages(records, temple),
        zones: zone_visitor_totals(records, temple),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatmapMarker {
    pub lat: f64,
    pub lon: f64,
    pub radius: u8,
    pub popup: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Heatmap {
    pub center: [f64; 2],
    pub zoom: u8,
    pub markers: Vec<HeatmapMarker>,
}

fn uniform<R: Rng>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if lo < hi {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

/// One marker per record. Positions are random points inside the configured
/// box, not the real location of the zone.
pub fn heatmap<R: Rng>(records: &[PulseRecord], temple: Temple, cfg: &HeatmapConfig, rng: &mut R) -> Heatmap {
    let markers = records_for_temple(records, temple)
        .map(|r| HeatmapMarker {
            lat: uniform(&mut *rng, cfg.lat_min, cfg.lat_max),
            lon: uniform(&mut *rng, cfg.lon_min, cfg.lon_max),
            radius: r.crowd_index,
            popup: format!("{} - {} ({})", r.temple, r.zone_label(), r.crowd_index),
        })
        .collect();

    Heatmap {
        center: [cfg.center_lat, cfg.center_lon],
        zoom: cfg.zoom,
        markers,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PilgrimSnapshot {
    pub temple: Temple,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub crowd_index: u8,
    pub queue_time: f64,
    pub top_services: String,
    pub payment_modes: String,
    pub peak_hour: bool,
    pub notice: Option<&'static str>,
}

/// What a pilgrim sees for a temple: the latest submission only.
pub fn pilgrim_snapshot(records: &[PulseRecord], temple: Temple) -> Option<PilgrimSnapshot> {
    latest_for_temple(records, temple).map(|r| PilgrimSnapshot {
        temple: r.temple,
        timestamp: r.timestamp,
        crowd_index: r.crowd_index,
        queue_time: r.queue_time,
        top_services: r.top_services.clone(),
        payment_modes: join_payment_modes(&r.payment_modes),
        peak_hour: r.is_peak_hour(),
        notice: r.is_peak_hour().then_some(PEAK_HOUR_NOTICE),
    })
}
