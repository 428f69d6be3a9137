use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::{
    CreateTradeInput, Direction, Trade, TradeFilters, TradeResult, TradeSession, UpdateTradeInput,
};
use crate::notify::TradeEventKind;
use crate::{ApiResponse, AppState};

pub fn trade_routes() -> Router<AppState> {
    Router::new()
        .route("/api/trades", get(list_trades).post(create_trade))
        .route("/api/trades/export", get(export_trades))
        .route("/api/trades/import", post(import_trades))
        .route(
            "/api/trades/:id",
            get(get_trade).put(update_trade).delete(delete_trade),
        )
}

async fn list_trades(
    State(state): State<AppState>,
    Query(filters): Query<TradeFilters>,
) -> Result<Json<ApiResponse<Vec<Trade>>>, AppError> {
    Ok(Json(ApiResponse::success(state.storage.list_trades(&filters))))
}

async fn get_trade(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Trade>>, AppError> {
    Ok(Json(ApiResponse::success(state.storage.get_trade(&id)?)))
}

async fn create_trade(
    State(state): State<AppState>,
    Json(input): Json<CreateTradeInput>,
) -> Result<Json<ApiResponse<Trade>>, AppError> {
    let trade = state.storage.create_trade(input)?;
    state.stats_cache.invalidate(&trade.user_id);
    state
        .bus
        .notify(TradeEventKind::Created, &trade.id, &trade.user_id);
    Ok(Json(ApiResponse::success(trade)))
}

async fn update_trade(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateTradeInput>,
) -> Result<Json<ApiResponse<Trade>>, AppError> {
    let trade = state.storage.update_trade(&id, input)?;
    state.stats_cache.invalidate(&trade.user_id);
    state
        .bus
        .notify(TradeEventKind::Updated, &trade.id, &trade.user_id);
    Ok(Json(ApiResponse::success(trade)))
}

async fn delete_trade(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let trade = state.storage.get_trade(&id)?;
    state.storage.delete_trade(&id)?;
    state.stats_cache.invalidate(&trade.user_id);
    state
        .bus
        .notify(TradeEventKind::Deleted, &trade.id, &trade.user_id);
    Ok(Json(ApiResponse::success(())))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportQuery {
    user_id: String,
}

const CSV_HEADERS: [&str; 16] = [
    "id",
    "pair",
    "direction",
    "entryPrice",
    "exitPrice",
    "stopLoss",
    "takeProfit",
    "lotSize",
    "pips",
    "profitLoss",
    "result",
    "session",
    "emotion",
    "openDate",
    "closeDate",
    "notes",
];

fn opt_num(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn opt_ts(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn enum_str<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

async fn export_trades(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    // 404 for unknown users rather than an empty file
    state.storage.get_user(&query.user_id)?;
    let trades = state.storage.list_trades(&TradeFilters {
        user_id: Some(query.user_id),
        ..Default::default()
    });

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;
    for trade in &trades {
        writer.write_record([
            trade.id.clone(),
            trade.pair.clone(),
            enum_str(&trade.direction),
            trade.entry_price.to_string(),
            opt_num(trade.exit_price),
            opt_num(trade.stop_loss),
            opt_num(trade.take_profit),
            trade.lot_size.to_string(),
            opt_num(trade.pips),
            opt_num(trade.profit_loss),
            trade.result.as_ref().map(enum_str).unwrap_or_default(),
            trade.session.as_ref().map(enum_str).unwrap_or_default(),
            trade.emotion.clone().unwrap_or_default(),
            trade.open_date.to_string(),
            opt_ts(trade.close_date),
            trade.notes.clone(),
        ])?;
    }
    let csv_bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"trades.csv\"",
            ),
        ],
        csv_bytes,
    )
        .into_response())
}

/// One imported CSV row; empty cells deserialize to None.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsvTradeRow {
    pair: String,
    direction: String,
    entry_price: f64,
    exit_price: Option<f64>,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
    lot_size: f64,
    profit_loss: Option<f64>,
    result: Option<String>,
    session: Option<String>,
    emotion: Option<String>,
    open_date: Option<i64>,
    close_date: Option<i64>,
    notes: Option<String>,
}

fn parse_direction(raw: &str) -> Result<Direction, AppError> {
    match raw.to_uppercase().as_str() {
        "BUY" => Ok(Direction::Buy),
        "SELL" => Ok(Direction::Sell),
        other => Err(AppError::Parse(format!("unknown direction: {}", other))),
    }
}

fn parse_result(raw: &str) -> Result<TradeResult, AppError> {
    match raw.to_uppercase().as_str() {
        "WIN" => Ok(TradeResult::Win),
        "LOSS" => Ok(TradeResult::Loss),
        "BREAKEVEN" | "BE" => Ok(TradeResult::Breakeven),
        other => Err(AppError::Parse(format!("unknown result: {}", other))),
    }
}

fn parse_session(raw: &str) -> Result<TradeSession, AppError> {
    match raw.to_uppercase().as_str() {
        "LONDON" => Ok(TradeSession::London),
        "NEW_YORK" | "NEWYORK" => Ok(TradeSession::NewYork),
        "ASIAN" => Ok(TradeSession::Asian),
        "SYDNEY" => Ok(TradeSession::Sydney),
        other => Err(AppError::Parse(format!("unknown session: {}", other))),
    }
}

fn row_to_input(user_id: &str, row: CsvTradeRow) -> Result<CreateTradeInput, AppError> {
    Ok(CreateTradeInput {
        user_id: user_id.to_string(),
        pair: row.pair,
        direction: parse_direction(&row.direction)?,
        entry_price: row.entry_price,
        exit_price: row.exit_price,
        stop_loss: row.stop_loss,
        take_profit: row.take_profit,
        lot_size: row.lot_size,
        profit_loss: row.profit_loss,
        strategy_id: None,
        session: row.session.as_deref().map(parse_session).transpose()?,
        emotion: row.emotion,
        open_date: row.open_date,
        close_date: row.close_date,
        result: row.result.as_deref().map(parse_result).transpose()?,
        followed_plan: true,
        revenge_trade: false,
        over_leveraged: false,
        moved_stop_loss: false,
        notes: row.notes.unwrap_or_default(),
    })
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportSummary {
    imported: usize,
    skipped: usize,
}

/// Multipart form: a `userId` text field and a `file` field holding the CSV.
/// Rows that fail to parse or validate are skipped, not fatal.
async fn import_trades(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ImportSummary>>, AppError> {
    let mut user_id: Option<String> = None;
    let mut csv_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        match field.name() {
            Some("userId") => {
                user_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                )
            }
            Some("file") => {
                csv_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?
                        .to_vec(),
                )
            }
            _ => {}
        }
    }

    let user_id = user_id.ok_or_else(|| AppError::Validation("missing userId field".to_string()))?;
    let csv_bytes = csv_bytes.ok_or_else(|| AppError::Validation("missing file field".to_string()))?;
    state.storage.get_user(&user_id)?;

    let mut reader = csv::Reader::from_reader(csv_bytes.as_slice());
    let mut imported = 0usize;
    let mut skipped = 0usize;

    for record in reader.deserialize::<CsvTradeRow>() {
        let row = match record {
            Ok(row) => row,
            Err(e) => {
                log::warn!("skipping malformed CSV row: {}", e);
                skipped += 1;
                continue;
            }
        };
        match row_to_input(&user_id, row).and_then(|input| Ok(state.storage.create_trade(input)?)) {
            Ok(_) => imported += 1,
            Err(e) => {
                log::warn!("skipping unimportable row: {}", e);
                skipped += 1;
            }
        }
    }

    if imported > 0 {
        state.stats_cache.invalidate(&user_id);
        state.bus.notify(TradeEventKind::Created, "import", &user_id);
    }
    log::info!("CSV import for {}: {} imported, {} skipped", user_id, imported, skipped);
    Ok(Json(ApiResponse::success(ImportSummary { imported, skipped })))
}
