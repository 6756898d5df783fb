use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::config::Config;
use crate::entities::user_account;
use crate::error::{AppError, AppResult};
use crate::utils::jwt::{create_token, Claims};
use crate::utils::password::verify_password;

/// A freshly opened session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: user_account::Model,
}

/// Look up an account by user id or email.
pub async fn find_account(
    db: &DatabaseConnection,
    identifier: &str,
) -> AppResult<Option<user_account::Model>> {
    Ok(user_account::Entity::find()
        .filter(
            Condition::any()
                .add(user_account::Column::UserId.eq(identifier))
                .add(user_account::Column::Email.eq(identifier)),
        )
        .one(db)
        .await?)
}

/// Verify credentials and open the account's single session.
pub async fn login(
    db: &DatabaseConnection,
    config: &Config,
    identifier: &str,
    password: &str,
) -> AppResult<IssuedSession> {
    let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

    let user = find_account(db, identifier).await?.ok_or_else(invalid)?;

    if !verify_password(password, &user.password_hash)? {
        tracing::warn!(user_id = %user.user_id, "Login rejected: wrong password");
        return Err(invalid());
    }

    open_session(db, config, user).await
}

/// Issue a token for `user`, unless the account is suspended or already holds
/// a live session. One session per user; other users are unaffected.
pub async fn open_session(
    db: &DatabaseConnection,
    config: &Config,
    user: user_account::Model,
) -> AppResult<IssuedSession> {
    if user.is_suspended {
        return Err(AppError::Forbidden(
            "Your account has been suspended. Please contact an administrator.".to_string(),
        ));
    }

    let now = Utc::now();
    let session_id = Uuid::new_v4().to_string();
    let expires_at = now + Duration::hours(config.jwt_expiration_hours);

    // Claim the session slot only if it is free or expired; a concurrent
    // login for the same account finds zero rows updated.
    let result = user_account::Entity::update_many()
        .set(user_account::ActiveModel {
            active_session_id: Set(Some(session_id.clone())),
            session_expires_at: Set(Some(expires_at)),
            ..Default::default()
        })
        .filter(user_account::Column::UserId.eq(user.user_id.as_str()))
        .filter(
            Condition::any()
                .add(user_account::Column::ActiveSessionId.is_null())
                .add(user_account::Column::SessionExpiresAt.is_null())
                .add(user_account::Column::SessionExpiresAt.lte(now)),
        )
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        tracing::warn!(user_id = %user.user_id, "Login rejected: session already active");
        return Err(AppError::Forbidden(
            "This account is already logged in on another session".to_string(),
        ));
    }

    let token = create_token(
        &user.user_id,
        &session_id,
        user.role,
        &config.jwt_secret,
        expires_at,
    )?;

    tracing::info!(user_id = %user.user_id, role = ?user.role, "Session opened");

    let user = user_account::Model {
        active_session_id: Some(session_id),
        session_expires_at: Some(expires_at),
        ..user
    };

    Ok(IssuedSession {
        token,
        expires_at,
        user,
    })
}

/// Check that the token still names the account's active session.
pub async fn validate(db: &DatabaseConnection, claims: &Claims) -> AppResult<user_account::Model> {
    let user = user_account::Entity::find_by_id(claims.sub.clone())
        .one(db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    if user.is_suspended {
        return Err(AppError::Forbidden("Your account has been suspended".to_string()));
    }

    if user.active_session_id.as_deref() != Some(claims.sid.as_str()) {
        return Err(AppError::Unauthorized(
            "Session is no longer active, please log in again".to_string(),
        ));
    }

    Ok(user)
}

/// End whatever session the account holds.
pub async fn close_session(db: &DatabaseConnection, user_id: &str) -> AppResult<()> {
    let user = user_account::Entity::find_by_id(user_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let mut active: user_account::ActiveModel = user.into();
    active.active_session_id = Set(None);
    active.session_expires_at = Set(None);
    active.update(db).await?;

    tracing::info!(user_id = %user_id, "Session closed");
    Ok(())
}
