use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::common::{created_response, json_body, no_content_response, success_response};
use crate::auth::{AuthUser, TokenResponse};
use crate::errors::{ApiError, ServiceError};
use crate::models::UserProfile;
use crate::validation::{Credentials, Registration};
use crate::AppState;

/// Profile as returned to its owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub uid: String,
    pub user_id: String,
    pub email: String,
    pub nickname: String,
    pub is_seller: bool,
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            uid: profile.uid,
            user_id: profile.user_id,
            email: profile.email,
            nickname: profile.nickname,
            is_seller: profile.is_seller,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: TokenResponse,
    pub profile: ProfileResponse,
}

async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<Registration>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let form = json_body(payload)?;
    let profile = state.accounts.register(form).await?;
    Ok(created_response(ProfileResponse::from(profile)))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = json_body(payload)?;
    let profile = state.accounts.login(credentials).await?;
    let token = state
        .auth
        .generate_token(&profile)
        .map_err(ServiceError::from)?;

    info!(user_id = %profile.user_id, "User logged in");
    Ok(success_response(LoginResponse {
        token,
        profile: profile.into(),
    }))
}

async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    state.auth.revoke(&user).await;
    state.accounts.logout().await?;
    Ok(no_content_response())
}

async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state.accounts.profile(&user.uid).await?;
    Ok(success_response(ProfileResponse::from(profile)))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}
