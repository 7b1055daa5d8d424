//! Request handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::AppState;
use super::extract::ApiJson;
use crate::error::{Result, TagplayError};
use crate::events::{AssetInfo, Direction};
use crate::media::{ByteRange, MediaResponse};
use crate::orchestrator::{Orchestrator, ScanOutcome};

/// Body of `POST /play`.
///
/// Without `asset_files` the card is resolved through the mapping.
#[derive(Debug, Default, Deserialize)]
pub struct PlayRequest {
    #[serde(default)]
    pub card_id: Option<String>,
    #[serde(default)]
    pub asset_index: Option<usize>,
    #[serde(default)]
    pub asset_files: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NavigateRequest {
    #[serde(default)]
    pub card_id: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CardRequest {
    #[serde(default)]
    pub card_id: Option<String>,
}

fn require_card_id(card_id: Option<String>) -> Result<String> {
    card_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| TagplayError::InvalidArgument("Missing card_id parameter".to_string()))
}

fn position_label(info: &AssetInfo) -> String {
    format!(
        "{} ({}/{})",
        info.asset_file,
        info.asset_index + 1,
        info.total_assets
    )
}

pub async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

pub async fn status(State(state): State<AppState>) -> Result<Json<Value>> {
    let status = state.blocking(Orchestrator::status).await?;
    Ok(Json(json!({
        "status": "running",
        "assets_played": status.counters.assets_played,
        "subscribers": status.counters.subscribers,
        "scanned_cards": status.counters.scanned_cards,
        "unknown_cards": status.counters.unknown_cards,
        "current_card": status.current_card,
        "phase": status.phase,
        "last_event": status.last_event,
        "assets_folder": status.assets_folder,
        "timestamp": Utc::now(),
    })))
}

pub async fn list_assets(State(state): State<AppState>) -> Result<Json<Value>> {
    let assets = state.blocking(Orchestrator::list_assets).await?;
    Ok(Json(json!({ "count": assets.len(), "assets": assets })))
}

pub async fn asset_bytes(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<MediaResponse> {
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(ByteRange::parse);
    state
        .blocking(move |orchestrator| orchestrator.asset_bytes(&filename, range))
        .await?
}

pub async fn current_asset(State(state): State<AppState>) -> Json<Value> {
    match state.orchestrator.current() {
        Some(event) => Json(json!(event)),
        None => Json(json!({ "asset_file": null })),
    }
}

pub async fn scanned_cards(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.orchestrator.scan_history()))
}

pub async fn unknown_cards(State(state): State<AppState>) -> Json<Value> {
    let history = state.orchestrator.scan_history();
    Json(json!({
        "count": history.total_unknown,
        "unknown_cards": history.unknown_cards,
    }))
}

pub async fn card_assets(State(state): State<AppState>) -> Result<Json<Value>> {
    let cards = state.blocking(Orchestrator::card_mapping).await?;
    Ok(Json(json!({ "count": cards.len(), "cards": cards })))
}

pub async fn play(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PlayRequest>,
) -> Result<Json<Value>> {
    let card_id = require_card_id(request.card_id)?;
    info!(card_id = %card_id, "Card scanned");

    let index = request.asset_index;
    let files = request.asset_files;
    let id = card_id.clone();
    let outcome = state
        .blocking(move |orchestrator| match files {
            Some(files) => orchestrator.play(&id, files, index).map(ScanOutcome::Played),
            None => orchestrator.scan(&id, index),
        })
        .await??;

    let body = match outcome {
        ScanOutcome::Played(info) => json!({
            "success": true,
            "card_id": card_id,
            "asset_file": info.asset_file,
            "asset_type": info.asset_type,
            "asset_index": info.asset_index,
            "total_assets": info.total_assets,
            "message": format!("Asset triggered: {}", position_label(&info)),
            "timestamp": Utc::now(),
        }),
        ScanOutcome::Unmapped => json!({
            "success": false,
            "card_id": card_id,
            "message": format!("No assets mapped to card {card_id}"),
            "timestamp": Utc::now(),
        }),
    };
    Ok(Json(body))
}

pub async fn navigate(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NavigateRequest>,
) -> Result<Json<Value>> {
    let card_id = require_card_id(request.card_id)?;
    let direction: Direction = request.direction.as_deref().unwrap_or_default().parse()?;

    let info = state.orchestrator.navigate(&card_id, direction)?;
    Ok(Json(json!({
        "success": true,
        "card_id": card_id,
        "direction": direction,
        "asset_file": info.asset_file,
        "asset_type": info.asset_type,
        "asset_index": info.asset_index,
        "total_assets": info.total_assets,
        "message": format!("Navigated {} to {}", direction.as_str(), position_label(&info)),
        "timestamp": Utc::now(),
    })))
}

pub async fn card_removed(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CardRequest>,
) -> Result<Json<Value>> {
    let card_id = require_card_id(request.card_id)?;
    let event = state.orchestrator.remove(&card_id)?;
    Ok(Json(json!({
        "success": true,
        "card_id": card_id,
        "action": "card_removed",
        "message": format!("Card {card_id} removed - returning to splash screen"),
        "timestamp": event.timestamp(),
    })))
}

pub async fn unknown_card(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CardRequest>,
) -> Result<Json<Value>> {
    let card_id = require_card_id(request.card_id)?;
    state.orchestrator.mark_unknown(&card_id)?;
    Ok(Json(json!({
        "success": true,
        "card_id": card_id,
        "message": format!("Card {card_id} marked as unknown"),
    })))
}

pub async fn refresh_mapping(State(state): State<AppState>) -> Result<Json<Value>> {
    let report = state.blocking(Orchestrator::refresh_mapping_status).await?;
    Ok(Json(json!({
        "success": true,
        "tracked": report.tracked,
        "mapped": report.mapped,
        "newly_mapped": report.newly_mapped,
    })))
}
