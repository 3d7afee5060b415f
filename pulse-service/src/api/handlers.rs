use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pulse_client::{
    domain::{collect_payment_modes, PulseRecord, Temple},
    queries,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::Deserialize;
use time::OffsetDateTime;

use super::{error::ApiError, AppState};
use crate::{
    alert::ScanReport,
    analysis::{self, Heatmap, PilgrimSnapshot, TempleOverview},
    export::{self, ExportFormat},
    transform::validate_pulse,
};

#[derive(Debug, Deserialize)]
pub struct IncomingPulse {
    pub temple: String,
    #[serde(default)]
    pub zone: Option<String>,
    pub visitor_count: u64,
    pub queue_time: f64,
    #[serde(default)]
    pub top_services: String,
    #[serde(default)]
    pub payment_modes: Vec<String>,
    pub crowd_index: u8,
    #[serde(default)]
    pub peak_hour_flag: Option<bool>,
}

impl IncomingPulse {
    fn into_record(self, timestamp: OffsetDateTime) -> Result<PulseRecord, ApiError> {
        let temple: Temple = self.temple.parse().map_err(|e| ApiError::Unprocessable(format!("{e}")))?;

        let payment_modes =
            collect_payment_modes(&self.payment_modes).map_err(|e| ApiError::Unprocessable(format!("{e}")))?;

        Ok(PulseRecord {
            timestamp,
            temple,
            zone: self.zone.map(|z| z.trim().to_string()).filter(|z| !z.is_empty()),
            visitor_count: self.visitor_count,
            queue_time: self.queue_time,
            top_services: self.top_services,
            payment_modes,
            crowd_index: self.crowd_index,
            peak_hour_flag: Some(self.peak_hour_flag.unwrap_or(false)),
        })
    }
}

fn parse_temple(raw: &str) -> Result<Temple, ApiError> {
    raw.parse().map_err(|e| ApiError::NotFound(format!("{e}")))
}

fn check_bearer(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.auth_bearer_token.as_deref() else {
        return Ok(());
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

pub async fn list_temples() -> Json<Vec<Temple>> {
    Json(Temple::ALL.to_vec())
}

pub async fn submit_pulse(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<IncomingPulse>,
) -> Result<(StatusCode, Json<PulseRecord>), ApiError> {
    check_bearer(&state, &headers)?;

    let record = payload.into_record(OffsetDateTime::now_utc())?;
    validate_pulse(&record).map_err(|e| ApiError::Unprocessable(e.to_string()))?;

    state
        .submissions
        .submit(record.clone())
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;

    tracing::info!(temple = %record.temple, zone = record.zone_label(), "pulse submitted");
    Ok((StatusCode::ACCEPTED, Json(record)))
}

pub async fn temple_overview(
    State(state): State<AppState>,
    Path(temple): Path<String>,
) -> Result<Json<TempleOverview>, ApiError> {
    let temple = parse_temple(&temple)?;
    let records = state.store.load().await?;
    Ok(Json(analysis::temple_overview(&records, temple)))
}

pub async fn temple_heatmap(
    State(state): State<AppState>,
    Path(temple): Path<String>,
) -> Result<Json<Heatmap>, ApiError> {
    let temple = parse_temple(&temple)?;
    let records = state.store.load().await?;
    let mut rng = StdRng::from_entropy();
    Ok(Json(analysis::heatmap(&records, temple, &state.heatmap, &mut rng)))
}

pub async fn pilgrim_snapshot(
    State(state): State<AppState>,
    Path(temple): Path<String>,
) -> Result<Json<PilgrimSnapshot>, ApiError> {
    let temple = parse_temple(&temple)?;
    let records = state.store.load().await?;
    analysis::pilgrim_snapshot(&records, temple)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no recent data available for {temple}")))
}

pub async fn crowd_alerts(State(state): State<AppState>) -> Result<Json<ScanReport>, ApiError> {
    Ok(Json(state.scanner.scan().await?))
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

pub async fn export_records(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let records = state.store.load().await?;
    let file = export::export(&records, query.format)?;

    let disposition = format!("attachment; filename=\"{}\"", file.file_name);
    Ok((
        [(header::CONTENT_TYPE, file.content_type.to_string()), (header::CONTENT_DISPOSITION, disposition)],
        file.bytes,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

pub async fn recent_logs(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<PulseRecord>>, ApiError> {
    let records = state.store.load().await?;
    let limit = query.limit.unwrap_or(state.recent_limit);
    Ok(Json(queries::recent(&records, limit).into_iter().cloned().collect()))
}
