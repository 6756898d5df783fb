use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
    SqlErr,
};

use crate::entities::user_account::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::utils::password::hash_password;

const USER_ID_PREFIX: &str = "user";

/// Next id in the `user01`, `user02`, ... sequence.
pub fn next_user_id<'a>(existing: impl IntoIterator<Item = &'a str>) -> String {
    let max = existing
        .into_iter()
        .filter_map(|id| id.strip_prefix(USER_ID_PREFIX))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{:02}", USER_ID_PREFIX, max + 1)
}

pub struct NewAccount {
    pub user_id: Option<String>,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

pub async fn create_account(
    db: &DatabaseConnection,
    account: NewAccount,
) -> AppResult<user_account::Model> {
    let email_taken = user_account::Entity::find()
        .filter(user_account::Column::Email.eq(account.email.as_str()))
        .one(db)
        .await?
        .is_some();
    if email_taken {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let user_id = match account.user_id {
        Some(user_id) => {
            if user_account::Entity::find_by_id(user_id.clone())
                .one(db)
                .await?
                .is_some()
            {
                return Err(AppError::Conflict("User ID already exists".to_string()));
            }
            user_id
        }
        None => {
            let ids: Vec<String> = user_account::Entity::find()
                .select_only()
                .column(user_account::Column::UserId)
                .into_tuple()
                .all(db)
                .await?;
            next_user_id(ids.iter().map(String::as_str))
        }
    };

    let password_hash = hash_password(&account.password)?;

    let user = user_account::ActiveModel {
        user_id: Set(user_id),
        email: Set(account.email),
        password_hash: Set(password_hash),
        first_name: Set(account.first_name),
        last_name: Set(account.last_name),
        role: Set(account.role),
        is_suspended: Set(false),
        active_session_id: Set(None),
        session_expires_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("User ID or email already exists".to_string())
        }
        _ => AppError::from(e),
    })?;

    tracing::info!(user_id = %user.user_id, role = ?user.role, "Account created");
    Ok(user)
}
