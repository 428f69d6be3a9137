use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;

use crate::auth::{hash_password, verify_password};
use crate::error::AppError;
use crate::models::{LoginInput, RegisterInput, User};
use crate::{ApiResponse, AppState};

const DEFAULT_INITIAL_BALANCE: f64 = 10_000.0;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<Json<ApiResponse<AuthPayload>>, AppError> {
    if input.password.len() < 6 {
        return Err(AppError::Validation(
            "password must be at least 6 characters".to_string(),
        ));
    }

    let password_hash = hash_password(&input.password)?;
    let user = state.storage.create_user(
        &input.username,
        &password_hash,
        input.initial_balance.unwrap_or(DEFAULT_INITIAL_BALANCE),
    )?;
    let token = state.sessions.issue(&user.id);

    log::info!("registered user {} ({})", user.username, user.id);
    Ok(Json(ApiResponse::success(AuthPayload { user, token })))
}

async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<ApiResponse<AuthPayload>>, AppError> {
    let user = state
        .storage
        .get_user_by_username(&input.username)
        .filter(|user| verify_password(&user.password_hash, &input.password))
        .ok_or_else(|| AppError::Unauthorized("invalid username or password".to_string()))?;

    let token = state.sessions.issue(&user.id);
    Ok(Json(ApiResponse::success(AuthPayload { user, token })))
}
