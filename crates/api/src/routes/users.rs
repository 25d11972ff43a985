//! Account registration and login.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::UserId;
use domain::{Credentials, RegisterUser};
use serde::Serialize;
use store::{Store, User};

use super::Envelope;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// POST /api/register
#[tracing::instrument(skip(state, body))]
pub async fn register<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<RegisterUser>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<UserResponse>>), ApiError> {
    let Json(cmd) = body?;
    let user = state.users.register(cmd).await?;
    Ok((StatusCode::CREATED, Envelope::new(user.into())))
}

/// POST /api/login: exchanges credentials for a bearer token.
#[tracing::instrument(skip(state, body))]
pub async fn login<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<Envelope<TokenResponse>>, ApiError> {
    let Json(credentials) = body?;
    let user = state.users.authenticate(credentials).await?;
    let access_token = state.jwt.issue(user.id)?;
    Ok(Envelope::new(TokenResponse { access_token }))
}
