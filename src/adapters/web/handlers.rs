//! HTTP request handlers for the level admin API.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::domain::candle::Candle;
use crate::domain::detector::detect;
use crate::domain::error::LevelwatchError;
use crate::domain::level::{LevelDirection, LevelUpdate, NewPriceLevel};
use crate::domain::signal::{
    parse_end_bound, parse_start_bound, Pagination, SignalFilter, SignalKind,
};

use super::{AppState, WebError};

pub const DEFAULT_PER_PAGE: usize = 20;

/// Treat `?pair=` the same as an absent parameter.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_direction(raw: Option<&str>) -> Result<Option<LevelDirection>, LevelwatchError> {
    raw.map(str::parse).transpose()
}

#[derive(Debug, Default, Deserialize)]
pub struct LevelsQuery {
    pub pair: Option<String>,
}

pub async fn list_levels(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LevelsQuery>, QueryRejection>,
) -> Result<Response, WebError> {
    let Query(query) = query?;
    let pair = non_empty(query.pair);
    let levels = state.levels.list_active_levels(pair.as_deref())?;
    Ok(Json(json!({ "success": true, "levels": levels })).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CreateLevelRequest {
    pub pair: Option<String>,
    pub level: Option<f64>,
    pub direction: Option<String>,
    #[serde(default)]
    pub confirm_close: bool,
}

pub async fn create_level(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateLevelRequest>, JsonRejection>,
) -> Result<Response, WebError> {
    let Json(body) = body?;
    let pair = non_empty(body.pair).ok_or_else(|| WebError::bad_request("Pair is required"))?;
    let value = body
        .level
        .ok_or_else(|| WebError::bad_request("Level is required"))?;
    let direction = parse_direction(body.direction.as_deref())?.unwrap_or(LevelDirection::Both);

    let level = state.levels.add_level(&NewPriceLevel::new(
        &pair,
        value,
        direction,
        body.confirm_close,
    ))?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "level": level })),
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateLevelRequest {
    pub level: Option<f64>,
    pub direction: Option<String>,
    pub confirm_close: Option<bool>,
}

pub async fn update_level(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateLevelRequest>, JsonRejection>,
) -> Result<Response, WebError> {
    let Path(id) = id?;
    let Json(body) = body?;
    let update = LevelUpdate {
        value: body.level,
        direction: parse_direction(body.direction.as_deref())?,
        confirm_close: body.confirm_close,
    };
    let level = state.levels.update_level(id, &update)?;
    Ok(Json(json!({ "success": true, "level": level })).into_response())
}

pub async fn delete_level(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, WebError> {
    let Path(id) = id?;
    state.levels.deactivate_level(id)?;
    Ok(Json(json!({ "success": true })).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct SignalsQuery {
    pub pair: Option<String>,
    pub signal_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub limit: Option<usize>,
}

/// `limit > 0` returns the newest `limit` rows as a single page; otherwise
/// `page`/`per_page` pagination applies.
pub async fn list_signals(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SignalsQuery>, QueryRejection>,
) -> Result<Response, WebError> {
    let Query(query) = query?;
    let mut filter = SignalFilter {
        pair: non_empty(query.pair),
        kind: non_empty(query.signal_type)
            .map(|k| k.parse::<SignalKind>())
            .transpose()?,
        start: non_empty(query.start_date)
            .map(|d| parse_start_bound(&d))
            .transpose()?,
        end: non_empty(query.end_date)
            .map(|d| parse_end_bound(&d))
            .transpose()?,
        ..SignalFilter::default()
    };

    let total = state.signals.count_signals(&filter)?;

    let pagination = match query.limit.filter(|l| *l > 0) {
        Some(limit) => {
            filter.limit = limit;
            let shown = total.min(limit);
            Pagination {
                total_count: shown,
                total_pages: 1,
                current_page: 1,
                per_page: limit,
            }
        }
        None => {
            let per_page = query.per_page.filter(|p| *p > 0).unwrap_or(DEFAULT_PER_PAGE);
            let pagination = Pagination::new(total, query.page.unwrap_or(1), per_page);
            filter.limit = pagination.per_page;
            filter.offset = pagination.offset();
            pagination
        }
    };

    let signals = state.signals.list_signals(&filter)?;
    Ok(Json(json!({
        "success": true,
        "signals": signals,
        "pagination": pagination,
    }))
    .into_response())
}

/// Posted candle. Missing or null prices become NaN, which the detector
/// treats as a malformed candle.
#[derive(Debug, Deserialize)]
pub struct CandleInput {
    pub timestamp: NaiveDateTime,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl From<CandleInput> for Candle {
    fn from(input: CandleInput) -> Self {
        Candle {
            timestamp: input.timestamp,
            open: input.open.unwrap_or(f64::NAN),
            high: input.high.unwrap_or(f64::NAN),
            low: input.low.unwrap_or(f64::NAN),
            close: input.close.unwrap_or(f64::NAN),
            volume: input.volume.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    pub pair: String,
    pub candles: Vec<CandleInput>,
}

/// Dry evaluation of posted candles against the pair's active levels.
pub async fn run_detect(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DetectRequest>, JsonRejection>,
) -> Result<Response, WebError> {
    let Json(body) = body?;
    let candles: Vec<Candle> = body.candles.into_iter().map(Candle::from).collect();
    let levels = state.levels.list_active_levels(Some(&body.pair))?;
    let events = detect(&candles, &levels);
    info!(pair = %body.pair, levels = levels.len(), events = events.len(), "detect request");
    Ok(Json(json!({ "success": true, "events": events })).into_response())
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn not_found() -> WebError {
    WebError::not_found("Not found")
}
