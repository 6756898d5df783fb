use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};

use crate::entities::user_account::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::services::accounts::{create_account, NewAccount};
use crate::services::session;
use crate::utils::extractor::{AppJson, AppPath, AppQuery};
use crate::utils::jwt::Claims;
use crate::utils::password::{generate_password, hash_password};
use crate::utils::response::ApiResponse;
use crate::utils::validation::{matches_search, non_empty, validate_email, validate_user_id};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub role: Option<UserRole>,
}

/// List accounts, optionally filtered by role and a search over id, email and name
pub async fn list_users(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UserQuery>,
) -> AppResult<Json<ApiResponse<Vec<user_account::Model>>>> {
    let mut select = user_account::Entity::find().order_by_asc(user_account::Column::UserId);
    if let Some(role) = query.role {
        select = select.filter(user_account::Column::Role.eq(role));
    }

    let search = non_empty(query.search.as_ref());
    let users = select
        .all(&state.db)
        .await?
        .into_iter()
        .filter(|u| {
            search.is_none_or(|s| {
                matches_search(
                    s,
                    &[
                        u.user_id.as_str(),
                        u.email.as_str(),
                        u.full_name().as_str(),
                    ],
                )
            })
        })
        .collect();

    Ok(Json(ApiResponse::ok(users)))
}

pub async fn get_user(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<String>,
) -> AppResult<Json<ApiResponse<user_account::Model>>> {
    let user = user_account::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(ApiResponse::ok(user)))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Serialize)]
pub struct CreatedUser {
    #[serde(flatten)]
    pub user: user_account::Model,
    /// Only present when the password was generated for the account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_password: Option<String>,
}

/// Create an account of any role
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreatedUser>>)> {
    let (Some(email), Some(first_name), Some(last_name), Some(role)) = (
        non_empty(payload.email.as_ref()),
        non_empty(payload.first_name.as_ref()),
        non_empty(payload.last_name.as_ref()),
        payload.role,
    ) else {
        return Err(AppError::BadRequest(
            "Email, first name, last name and role are required".to_string(),
        ));
    };
    validate_email(email)?;

    let user_id = non_empty(payload.user_id.as_ref()).map(str::to_string);
    if let Some(user_id) = &user_id {
        validate_user_id(user_id)?;
    }

    let (password, initial_password) = match non_empty(payload.password.as_ref()) {
        Some(password) => (password.to_string(), None),
        None => {
            let generated = generate_password();
            (generated.clone(), Some(generated))
        }
    };

    let user = create_account(
        &state.db,
        NewAccount {
            user_id,
            email: email.to_string(),
            password,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            role,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            CreatedUser {
                user,
                initial_password,
            },
            "User created",
        )),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<UserRole>,
    pub password: Option<String>,
}

/// Update profile fields; a role change ends the account's session so the
/// next token carries the new role.
pub async fn update_user(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<String>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<user_account::Model>>> {
    let email = non_empty(payload.email.as_ref());
    let first_name = non_empty(payload.first_name.as_ref());
    let last_name = non_empty(payload.last_name.as_ref());
    let password = non_empty(payload.password.as_ref());

    if email.is_none()
        && first_name.is_none()
        && last_name.is_none()
        && password.is_none()
        && payload.role.is_none()
    {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let user = user_account::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if let Some(email) = email {
        validate_email(email)?;
    }

    let role_changed = payload.role.is_some_and(|role| role != user.role);
    let mut active: user_account::ActiveModel = user.into();

    if let Some(email) = email {
        active.email = Set(email.to_string());
    }
    if let Some(first_name) = first_name {
        active.first_name = Set(first_name.to_string());
    }
    if let Some(last_name) = last_name {
        active.last_name = Set(last_name.to_string());
    }
    if let Some(password) = password {
        active.password_hash = Set(hash_password(password)?);
    }
    if let Some(role) = payload.role {
        active.role = Set(role);
    }
    if role_changed {
        active.active_session_id = Set(None);
        active.session_expires_at = Set(None);
    }

    // The unique email index decides conflicts, concurrent updates included
    let user = active.update(&state.db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("Email already registered".to_string())
        }
        _ => AppError::from(e),
    })?;

    tracing::info!(user_id = %user.user_id, role_changed, "User updated");
    Ok(Json(ApiResponse::ok_with_message(user, "User updated")))
}

#[derive(Debug, Deserialize)]
pub struct SuspensionRequest {
    pub is_suspended: Option<bool>,
}

/// Suspend or reinstate an account; suspension also ends its session
pub async fn set_suspension(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(user_id): AppPath<String>,
    AppJson(payload): AppJson<SuspensionRequest>,
) -> AppResult<Json<ApiResponse<user_account::Model>>> {
    let is_suspended = payload
        .is_suspended
        .ok_or_else(|| AppError::BadRequest("is_suspended is required".to_string()))?;

    if is_suspended && user_id == claims.sub {
        return Err(AppError::BadRequest(
            "You cannot suspend your own account".to_string(),
        ));
    }

    let user = user_account::Entity::find_by_id(user_id.clone())
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let mut active: user_account::ActiveModel = user.into();
    active.is_suspended = Set(is_suspended);
    if is_suspended {
        active.active_session_id = Set(None);
        active.session_expires_at = Set(None);
    }
    let user = active.update(&state.db).await?;

    tracing::info!(user_id = %user.user_id, is_suspended, "Suspension status changed");

    let message = if is_suspended {
        "User suspended"
    } else {
        "User reinstated"
    };
    Ok(Json(ApiResponse::ok_with_message(user, message)))
}

/// End whatever session the account currently holds
pub async fn force_logout(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    session::close_session(&state.db, &user_id).await?;
    Ok(Json(ApiResponse::message("Session ended")))
}
