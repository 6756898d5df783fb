use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::{
    auth, bookings, catalog, home_cleaner, home_owner, platform_manager, user_admin,
};
use crate::middleware::auth::{
    auth_middleware, require_home_cleaner, require_home_owner, require_platform_manager,
    require_user_admin,
};
use crate::middleware::rate_limit::create_public_governor;
use crate::middleware::role_rate_limit::{create_role_governor, RateLimitedRole};
use crate::AppState;

/// Attach the per-user limiter for `role` when rate limiting is enabled. Must
/// be added before the auth layers so it runs after them.
fn with_role_limit(
    router: Router<AppState>,
    role: RateLimitedRole,
    enabled: bool,
) -> Router<AppState> {
    if enabled {
        router.route_layer(create_role_governor(role))
    } else {
        router
    }
}

pub fn create_router(state: AppState) -> Router {
    let limits = state.config.rate_limit_enabled;

    // Public routes (per-IP limit)
    let mut public_routes = Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .route("/api/listings", get(catalog::list_listings))
        .route("/api/listings/{id}", get(catalog::get_listing))
        .route("/api/listings/user/{user_id}", get(catalog::provider_listings))
        .route("/api/categories", get(catalog::list_categories))
        .route("/api/categories/{code}", get(catalog::get_category))
        .route("/api/bookings/availability", get(catalog::availability));
    if limits {
        public_routes = public_routes.route_layer(create_public_governor());
    }

    // Any signed-in account; booking reads are further restricted to the parties
    let session_routes = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/bookings/user/{user_id}", get(bookings::user_bookings))
        .route(
            "/api/bookings/provider/{provider_id}",
            get(bookings::provider_bookings),
        )
        .route("/api/bookings/{id}", get(bookings::get_booking))
        .route("/api/bookings/{id}/status", put(bookings::update_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Home owner routes, 100 requests per minute per user
    let home_owner_routes = with_role_limit(
        Router::new()
            .route("/api/bookings", post(home_owner::create_booking))
            .route(
                "/api/shortlist",
                get(home_owner::list_shortlist).post(home_owner::add_to_shortlist),
            )
            .route("/api/shortlist/check", get(home_owner::check_shortlist))
            .route(
                "/api/shortlist/{listing_id}",
                delete(home_owner::remove_from_shortlist),
            ),
        RateLimitedRole::HomeOwner,
        limits,
    )
    .route_layer(middleware::from_fn(require_home_owner))
    .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Home cleaner routes, 500 requests per minute per user
    let home_cleaner_routes = with_role_limit(
        Router::new()
            .route("/api/cleaner/listings", post(home_cleaner::create_listing))
            .route(
                "/api/cleaner/listings/{id}",
                put(home_cleaner::update_listing).delete(home_cleaner::delete_listing),
            )
            .route("/api/cleaner/stats", get(home_cleaner::service_stats)),
        RateLimitedRole::HomeCleaner,
        limits,
    )
    .route_layer(middleware::from_fn(require_home_cleaner))
    .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Platform manager routes (global limiter only)
    let manager_routes = Router::new()
        .route(
            "/api/manager/categories",
            post(platform_manager::create_category),
        )
        .route(
            "/api/manager/categories/{code}",
            put(platform_manager::update_category).delete(platform_manager::delete_category),
        )
        .route("/api/manager/reports/{period}", get(platform_manager::report))
        .route_layer(middleware::from_fn(require_platform_manager))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // User admin routes (global limiter only)
    let admin_routes = Router::new()
        .route(
            "/api/admin/users",
            get(user_admin::list_users).post(user_admin::create_user),
        )
        .route(
            "/api/admin/users/{id}",
            get(user_admin::get_user).put(user_admin::update_user),
        )
        .route(
            "/api/admin/users/{id}/suspension",
            put(user_admin::set_suspension),
        )
        .route(
            "/api/admin/users/{id}/session",
            delete(user_admin::force_logout),
        )
        .route_layer(middleware::from_fn(require_user_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(home_owner_routes)
        .merge(home_cleaner_routes)
        .merge(manager_routes)
        .merge(admin_routes)
        .with_state(state)
}
