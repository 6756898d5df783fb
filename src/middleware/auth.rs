use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::entities::user_account::UserRole;
use crate::error::{AppError, AppResult};
use crate::services::session;
use crate::utils::jwt::{verify_token, Claims};
use crate::AppState;

/// Extract the bearer token, check it against the account's active session
/// and expose the claims to the handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let TypedHeader(auth) = bearer
        .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))?;

    let claims = verify_token(auth.token(), &state.config.jwt_secret)?;
    session::validate(&state.db, &claims).await?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn require_role(request: &Request, role: UserRole, label: &str) -> AppResult<()> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::Unauthorized("No authentication found".to_string()))?;

    if claims.role != role {
        return Err(AppError::Forbidden(format!("{} access required", label)));
    }

    Ok(())
}

/// Require home owner role
pub async fn require_home_owner(request: Request, next: Next) -> AppResult<Response> {
    require_role(&request, UserRole::HomeOwner, "Home owner")?;
    Ok(next.run(request).await)
}

/// Require home cleaner role
pub async fn require_home_cleaner(request: Request, next: Next) -> AppResult<Response> {
    require_role(&request, UserRole::HomeCleaner, "Home cleaner")?;
    Ok(next.run(request).await)
}

/// Require user admin role
pub async fn require_user_admin(request: Request, next: Next) -> AppResult<Response> {
    require_role(&request, UserRole::UserAdmin, "User admin")?;
    Ok(next.run(request).await)
}

/// Require platform manager role
pub async fn require_platform_manager(request: Request, next: Next) -> AppResult<Response> {
    require_role(&request, UserRole::PlatformManager, "Platform manager")?;
    Ok(next.run(request).await)
}
