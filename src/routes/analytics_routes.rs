use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::analytics::{self, AnalyticsReport, EquityCurvePoint};
use crate::error::AppError;
use crate::{ApiResponse, AppState};

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analytics/stats", get(get_stats))
        .route("/api/analytics/performance", get(get_performance))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyticsQuery {
    user_id: String,
    /// today | week | month | 3months | 6months | year; anything else = all time
    range: Option<String>,
}

async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ApiResponse<AnalyticsReport>>, AppError> {
    let range = query.range.as_deref();
    if let Some(report) = state.stats_cache.get(&query.user_id, range) {
        return Ok(Json(ApiResponse::success(report)));
    }

    state.storage.get_user(&query.user_id)?;
    let trades = analytics::filter_by_range(state.storage.trades_for_user(&query.user_id), range);
    let report = analytics::compute_report(&trades);
    state.stats_cache.put(&query.user_id, range, report.clone());
    Ok(Json(ApiResponse::success(report)))
}

async fn get_performance(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ApiResponse<Vec<EquityCurvePoint>>>, AppError> {
    let user = state.storage.get_user(&query.user_id)?;
    let trades = analytics::filter_by_range(
        state.storage.trades_for_user(&query.user_id),
        query.range.as_deref(),
    );
    let curve = analytics::equity_curve(&trades, user.initial_balance);
    Ok(Json(ApiResponse::success(curve)))
}
