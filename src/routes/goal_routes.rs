use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::analytics::{goal_completed, goal_current_value};
use crate::error::AppError;
use crate::models::{CreateGoalInput, Goal, MilestoneInput, UpdateGoalInput};
use crate::{ApiResponse, AppState};

pub fn goal_routes() -> Router<AppState> {
    Router::new()
        .route("/api/goals", get(list_goals).post(create_goal))
        .route("/api/goals/:id", get(get_goal).put(update_goal).delete(delete_goal))
        .route("/api/goals/:id/milestones", post(add_milestone))
        .route(
            "/api/goals/:id/milestones/:mid",
            put(update_milestone).delete(delete_milestone),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    user_id: String,
}

/// Re-derives current_value from trade stats and caches it back on the goal.
fn refresh_progress(state: &AppState, goal: Goal) -> Result<Goal, AppError> {
    let user = state.storage.get_user(&goal.user_id)?;
    let trades = state.storage.trades_for_user(&goal.user_id);
    let current = goal_current_value(&goal, &trades, &user);
    let completed = goal.completed || goal_completed(&goal, current);
    Ok(state.storage.set_goal_progress(&goal.id, current, completed)?)
}

async fn list_goals(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Goal>>>, AppError> {
    let goals = state
        .storage
        .goals_for_user(&query.user_id)
        .into_iter()
        .map(|goal| refresh_progress(&state, goal))
        .collect::<Result<Vec<Goal>, AppError>>()?;
    Ok(Json(ApiResponse::success(goals)))
}

async fn get_goal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Goal>>, AppError> {
    let goal = state.storage.get_goal(&id)?;
    Ok(Json(ApiResponse::success(refresh_progress(&state, goal)?)))
}

async fn create_goal(
    State(state): State<AppState>,
    Json(input): Json<CreateGoalInput>,
) -> Result<Json<ApiResponse<Goal>>, AppError> {
    let goal = state.storage.create_goal(input)?;
    Ok(Json(ApiResponse::success(refresh_progress(&state, goal)?)))
}

async fn update_goal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateGoalInput>,
) -> Result<Json<ApiResponse<Goal>>, AppError> {
    let goal = state.storage.update_goal(&id, input)?;
    Ok(Json(ApiResponse::success(refresh_progress(&state, goal)?)))
}

async fn delete_goal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.storage.delete_goal(&id)?;
    Ok(Json(ApiResponse::success(())))
}

async fn add_milestone(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<MilestoneInput>,
) -> Result<Json<ApiResponse<Goal>>, AppError> {
    Ok(Json(ApiResponse::success(state.storage.add_milestone(&id, input)?)))
}

async fn update_milestone(
    State(state): State<AppState>,
    Path((id, mid)): Path<(String, String)>,
    Json(input): Json<MilestoneInput>,
) -> Result<Json<ApiResponse<Goal>>, AppError> {
    Ok(Json(ApiResponse::success(
        state.storage.update_milestone(&id, &mid, input)?,
    )))
}

async fn delete_milestone(
    State(state): State<AppState>,
    Path((id, mid)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Goal>>, AppError> {
    Ok(Json(ApiResponse::success(state.storage.delete_milestone(&id, &mid)?)))
}
