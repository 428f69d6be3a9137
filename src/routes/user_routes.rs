use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::error::AppError;
use crate::models::{UpdateUserInput, User};
use crate::{ApiResponse, AppState};

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/api/users/:id", get(get_user).put(update_user).delete(delete_user))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = state.storage.get_user(&id)?;
    Ok(Json(ApiResponse::success(user)))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateUserInput>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = state.storage.update_user(&id, input)?;
    // initial_balance edits shift derived stats
    state.stats_cache.invalidate(&id);
    Ok(Json(ApiResponse::success(user)))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.storage.delete_user(&id)?;
    state.sessions.revoke_user(&id);
    state.stats_cache.invalidate(&id);
    Ok(Json(ApiResponse::success(())))
}
