use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};

use crate::entities::user_account::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::services::accounts::{create_account, NewAccount};
use crate::services::session;
use crate::utils::extractor::AppJson;
use crate::utils::jwt::Claims;
use crate::utils::response::ApiResponse;
use crate::utils::validation::{non_empty, validate_email, validate_user_id};
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// User id or email
    #[serde(alias = "email", alias = "user_id")]
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: user_account::Model,
}

/// Login with user id or email and password
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let (Some(username), Some(password)) = (
        non_empty(payload.username.as_ref()),
        payload.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "Username and password are required".to_string(),
        ));
    };

    let issued = session::login(&state.db, &state.config, username, password).await?;

    Ok(Json(ApiResponse::ok_with_message(
        AuthResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user: issued.user,
        },
        "Login successful",
    )))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Register a new home owner account
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<user_account::Model>>)> {
    let (Some(email), Some(password), Some(first_name), Some(last_name)) = (
        non_empty(payload.email.as_ref()),
        payload.password.as_deref(),
        non_empty(payload.first_name.as_ref()),
        non_empty(payload.last_name.as_ref()),
    ) else {
        return Err(AppError::BadRequest("Missing required fields".to_string()));
    };

    validate_email(email)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let user_id = non_empty(payload.user_id.as_ref()).map(str::to_string);
    if let Some(user_id) = &user_id {
        validate_user_id(user_id)?;
    }

    let user = create_account(
        &state.db,
        NewAccount {
            user_id,
            email: email.to_string(),
            password: password.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            role: UserRole::HomeOwner,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(user, "Registration successful")),
    ))
}

/// End the caller's session; the token stops working immediately
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<ApiResponse<()>>> {
    session::close_session(&state.db, &claims.sub).await?;
    Ok(Json(ApiResponse::message("Logged out")))
}

/// Profile of the signed-in account
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<ApiResponse<user_account::Model>>> {
    let user = user_account::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(ApiResponse::ok(user)))
}
