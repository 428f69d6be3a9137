use axum::{
    extract::{Multipart, Query, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::require_session;
use crate::error::AppError;
use crate::images::{CapturedChart, ImageError, CAPTURE_TIMEFRAMES};
use crate::models::{is_valid_pair, Trade, UpdateTradeInput};
use crate::notify::TradeEventKind;
use crate::{ApiResponse, AppState};

/// Capture/upload/delete need a session; thumbnail URLs are derived without
/// touching the image host, so that route stays open.
pub fn image_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/tradingview/capture", post(capture_chart))
        .route("/api/tradingview/capture-all", post(capture_all_charts))
        .route("/api/upload/chart", post(upload_chart))
        .route("/api/trades/upload", post(upload_trade_chart))
        .route("/api/images/delete", post(delete_image))
        .route_layer(middleware::from_fn_with_state(state, require_session))
        .route("/api/thumbnail", get(thumbnail))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
enum ChartSlot {
    EntryH1,
    EntryM15,
    ExitH1,
    ExitM15,
}

impl ChartSlot {
    fn patch(self, url: String) -> UpdateTradeInput {
        let mut input = UpdateTradeInput::default();
        match self {
            ChartSlot::EntryH1 => input.entry_chart_h1 = Some(url),
            ChartSlot::EntryM15 => input.entry_chart_m15 = Some(url),
            ChartSlot::ExitH1 => input.exit_chart_h1 = Some(url),
            ChartSlot::ExitM15 => input.exit_chart_m15 = Some(url),
        }
        input
    }

    fn for_phase(phase: &str, timeframe: &str) -> Option<ChartSlot> {
        match (phase, timeframe) {
            ("entry", "1h") => Some(ChartSlot::EntryH1),
            ("entry", "15m") => Some(ChartSlot::EntryM15),
            ("exit", "1h") => Some(ChartSlot::ExitH1),
            ("exit", "15m") => Some(ChartSlot::ExitM15),
            _ => None,
        }
    }
}

fn attach_to_trade(
    state: &AppState,
    trade_id: &str,
    slot: ChartSlot,
    url: String,
) -> Result<Trade, AppError> {
    let trade = state.storage.update_trade(trade_id, slot.patch(url))?;
    state.stats_cache.invalidate(&trade.user_id);
    state
        .bus
        .notify(TradeEventKind::Updated, &trade.id, &trade.user_id);
    Ok(trade)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptureRequest {
    pair: String,
    #[serde(default = "default_timeframe")]
    timeframe: String,
    trade_id: Option<String>,
    slot: Option<ChartSlot>,
}

fn default_timeframe() -> String {
    "1h".to_string()
}

async fn capture_chart(
    State(state): State<AppState>,
    Json(request): Json<CaptureRequest>,
) -> Result<Json<ApiResponse<CapturedChart>>, AppError> {
    if !is_valid_pair(&request.pair) {
        return Err(AppError::Validation(format!(
            "invalid instrument pair: {}",
            request.pair
        )));
    }

    let chart = state
        .capture
        .capture(&request.pair, &request.timeframe, state.image_host())
        .await?;

    if let (Some(trade_id), Some(slot)) = (request.trade_id, request.slot) {
        attach_to_trade(&state, &trade_id, slot, chart.url.clone())?;
    }
    Ok(Json(ApiResponse::success(chart)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptureAllRequest {
    pair: String,
    trade_id: Option<String>,
    /// "entry" or "exit"; which chart slots the captures land in.
    phase: Option<String>,
}

async fn capture_all_charts(
    State(state): State<AppState>,
    Json(request): Json<CaptureAllRequest>,
) -> Result<Json<ApiResponse<Vec<CapturedChart>>>, AppError> {
    if !is_valid_pair(&request.pair) {
        return Err(AppError::Validation(format!(
            "invalid instrument pair: {}",
            request.pair
        )));
    }

    let charts = state
        .capture
        .capture_all(&request.pair, state.image_host())
        .await?;

    if let (Some(trade_id), Some(phase)) = (&request.trade_id, request.phase.as_deref()) {
        for (chart, timeframe) in charts.iter().zip(CAPTURE_TIMEFRAMES) {
            let Some(slot) = ChartSlot::for_phase(phase, timeframe) else {
                return Err(AppError::Validation(format!("unknown phase: {}", phase)));
            };
            attach_to_trade(&state, trade_id, slot, chart.url.clone())?;
        }
    }
    Ok(Json(ApiResponse::success(charts)))
}

struct UploadedForm {
    bytes: Vec<u8>,
    file_name: String,
    trade_id: Option<String>,
    slot: Option<ChartSlot>,
}

/// Client file names must not escape the upload directory.
fn safe_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        None
    } else {
        Some(cleaned)
    }
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadedForm, AppError> {
    let mut bytes: Option<Vec<u8>> = None;
    let mut file_name = format!("chart-{}.png", Utc::now().timestamp_millis());
    let mut trade_id = None;
    let mut slot = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                if let Some(name) = field.file_name().and_then(safe_file_name) {
                    file_name = name;
                }
                bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?
                        .to_vec(),
                );
            }
            Some("tradeId") => {
                trade_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                )
            }
            Some("slot") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                slot = Some(
                    serde_json::from_value(serde_json::Value::String(raw.clone()))
                        .map_err(|_| AppError::Validation(format!("unknown slot: {}", raw)))?,
                );
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| AppError::Validation("missing file field".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("uploaded file is empty".to_string()));
    }
    Ok(UploadedForm { bytes, file_name, trade_id, slot })
}

async fn upload_chart(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<CapturedChart>>, AppError> {
    let form = read_upload_form(multipart).await?;
    let chart = state
        .capture
        .upload_or_fallback(form.bytes, &form.file_name, "charts", "", state.image_host())
        .await?;
    Ok(Json(ApiResponse::success(chart)))
}

/// Same as `upload_chart`, but attaches the resulting URL to one of the
/// trade's chart slots.
async fn upload_trade_chart(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<Trade>>, AppError> {
    let form = read_upload_form(multipart).await?;
    let trade_id = form
        .trade_id
        .ok_or_else(|| AppError::Validation("missing tradeId field".to_string()))?;
    let slot = form
        .slot
        .ok_or_else(|| AppError::Validation("missing slot field".to_string()))?;

    let chart = state
        .capture
        .upload_or_fallback(form.bytes, &form.file_name, "trades", "", state.image_host())
        .await?;
    let trade = attach_to_trade(&state, &trade_id, slot, chart.url)?;
    Ok(Json(ApiResponse::success(trade)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThumbnailQuery {
    public_id: String,
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
}

fn default_width() -> u32 {
    320
}

fn default_height() -> u32 {
    200
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThumbnailPayload {
    url: String,
}

async fn thumbnail(
    State(state): State<AppState>,
    Query(query): Query<ThumbnailQuery>,
) -> Result<Json<ApiResponse<ThumbnailPayload>>, AppError> {
    let host = state
        .image_host()
        .ok_or_else(|| AppError::from(ImageError::NotConfigured))?;
    let url = host.thumbnail_url(&query.public_id, query.width, query.height);
    Ok(Json(ApiResponse::success(ThumbnailPayload { url })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteImageRequest {
    public_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteImagePayload {
    deleted: bool,
}

async fn delete_image(
    State(state): State<AppState>,
    Json(request): Json<DeleteImageRequest>,
) -> Result<Json<ApiResponse<DeleteImagePayload>>, AppError> {
    let host = state
        .image_host()
        .ok_or_else(|| AppError::from(ImageError::NotConfigured))?;
    let deleted = host.destroy(&request.public_id).await?;
    Ok(Json(ApiResponse::success(DeleteImagePayload { deleted })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_patch_targets_the_right_field() {
        let input = ChartSlot::ExitM15.patch("https://img/x.png".to_string());
        assert_eq!(input.exit_chart_m15.as_deref(), Some("https://img/x.png"));
        assert!(input.entry_chart_h1.is_none());
    }

    #[test]
    fn phase_and_timeframe_resolve_slots() {
        assert_eq!(ChartSlot::for_phase("entry", "1h"), Some(ChartSlot::EntryH1));
        assert_eq!(ChartSlot::for_phase("exit", "15m"), Some(ChartSlot::ExitM15));
        assert_eq!(ChartSlot::for_phase("during", "1h"), None);
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(safe_file_name("shot.png").as_deref(), Some("shot.png"));
        assert_eq!(
            safe_file_name("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(safe_file_name("..").as_deref(), None);
        assert_eq!(safe_file_name("!!!").as_deref(), None);
    }

    #[test]
    fn slot_parses_wire_names() {
        let slot: ChartSlot =
            serde_json::from_value(serde_json::Value::String("entryM15".to_string())).unwrap();
        assert_eq!(slot, ChartSlot::EntryM15);
    }
}
