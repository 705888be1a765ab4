//! Registration, login and account removal

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::AuthUser;
use crate::auth::{generate_session_token, hash_password, verify_password};
use crate::error::ApiError;
use crate::state::AppState;
use crate::upstream::{AccountProfile, LinkKind};
use crate::users::NewUser;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidRequest(format!("'{}' is required", field)));
    }
    Ok(())
}

fn session_token(state: &AppState, username: &str) -> Result<String, ApiError> {
    generate_session_token(username, &state.config.jwt_secret).map_err(ApiError::Internal)
}

/// POST /auth/register/v1
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    require("firstName", &req.first_name)?;
    require("lastName", &req.last_name)?;
    require("username", &req.username)?;
    require("password", &req.password)?;

    if state.users.find(&req.username).await?.is_some() {
        return Err(ApiError::UsernameTaken);
    }

    let password_hash = hash_password(&req.password).map_err(ApiError::Internal)?;
    let render_token = state
        .accounts
        .link(
            LinkKind::Register,
            &AccountProfile {
                username: &req.username,
                password_hash: &password_hash,
                first_name: &req.first_name,
                last_name: &req.last_name,
            },
        )
        .await;

    let created = state
        .users
        .create(&NewUser {
            username: &req.username,
            first_name: &req.first_name,
            last_name: &req.last_name,
            password_hash: &password_hash,
            render_token: &render_token,
        })
        .await?;
    if !created {
        return Err(ApiError::UsernameTaken);
    }

    info!(user = %req.username, "Registered user");
    Ok(Json(json!({ "token": session_token(&state, &req.username)? })))
}

/// POST /auth/login/v1
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Credentials>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = state
        .users
        .find(&req.username)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }

    let render_token = state
        .accounts
        .link(
            LinkKind::Login,
            &AccountProfile {
                username: &user.username,
                password_hash: &user.password_hash,
                first_name: &user.first_name,
                last_name: &user.last_name,
            },
        )
        .await;
    state
        .users
        .update_render_token(&user.username, &render_token)
        .await?;

    info!(user = %user.username, since = %user.created_at, "User logged in");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "Authorization": session_token(&state, &user.username)? })),
    ))
}

/// POST /auth/remove/v1
pub async fn remove(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<Credentials>,
) -> Result<Json<&'static str>, ApiError> {
    if user.username != req.username {
        return Err(ApiError::Forbidden);
    }
    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }

    if !state.users.delete(&user.username).await? {
        return Err(ApiError::UserNotFound);
    }

    info!(user = %user.username, "Deleted user");
    Ok(Json("User deleted successfully"))
}

/// GET /auth/renderToken
pub async fn render_token(AuthUser(user): AuthUser) -> String {
    user.render_token
}
