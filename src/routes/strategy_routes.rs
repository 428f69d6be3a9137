use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::{CreateStrategyInput, TradingStrategy, UpdateStrategyInput};
use crate::{ApiResponse, AppState};

pub fn strategy_routes() -> Router<AppState> {
    Router::new()
        .route("/api/strategies", get(list_strategies).post(create_strategy))
        .route(
            "/api/strategies/:id",
            get(get_strategy).put(update_strategy).delete(delete_strategy),
        )
        .route("/api/strategies/:id/default", post(set_default))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    user_id: String,
}

async fn list_strategies(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<TradingStrategy>>>, AppError> {
    Ok(Json(ApiResponse::success(
        state.storage.strategies_for_user(&query.user_id),
    )))
}

async fn get_strategy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TradingStrategy>>, AppError> {
    Ok(Json(ApiResponse::success(state.storage.get_strategy(&id)?)))
}

async fn create_strategy(
    State(state): State<AppState>,
    Json(input): Json<CreateStrategyInput>,
) -> Result<Json<ApiResponse<TradingStrategy>>, AppError> {
    Ok(Json(ApiResponse::success(state.storage.create_strategy(input)?)))
}

async fn update_strategy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateStrategyInput>,
) -> Result<Json<ApiResponse<TradingStrategy>>, AppError> {
    Ok(Json(ApiResponse::success(state.storage.update_strategy(&id, input)?)))
}

async fn set_default(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TradingStrategy>>, AppError> {
    Ok(Json(ApiResponse::success(state.storage.set_default_strategy(&id)?)))
}

async fn delete_strategy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.storage.delete_strategy(&id)?;
    Ok(Json(ApiResponse::success(())))
}
