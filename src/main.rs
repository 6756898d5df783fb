use std::net::SocketAddr;

use axum::middleware;
use sea_orm::{DatabaseConnection, EntityTrait};
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cleaning_marketplace::{
    config::Config,
    db,
    entities::user_account::{self, UserRole},
    middleware::rate_limit::{create_global_governor, log_request},
    routes,
    services::accounts::{create_account, NewAccount},
    AppState,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cleaning_marketplace=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!("Starting server at {}", config.server_addr());

    // Connect to database
    let db = db::connect(&config)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Connected to database");

    // Run migrations
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    tracing::info!("Migrations complete");

    seed_admin(&db, &config).await;

    let state = AppState {
        db,
        config: config.clone(),
    };

    // Outermost first: trace, CORS, request log, then the per-IP limiter
    let mut app = routes::create_router(state);
    if config.rate_limit_enabled {
        app = app.layer(create_global_governor());
    }
    let app = app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .layer(middleware::from_fn(log_request)),
    );

    // Start server with socket address for rate limiting
    let addr: SocketAddr = config.server_addr().parse().expect("Invalid address");
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}

/// Create the configured user admin account if it doesn't exist
async fn seed_admin(db: &DatabaseConnection, config: &Config) {
    let existing = user_account::Entity::find_by_id(config.admin_user_id.clone())
        .one(db)
        .await
        .expect("Failed to check for admin");

    if existing.is_none() {
        create_account(
            db,
            NewAccount {
                user_id: Some(config.admin_user_id.clone()),
                email: config.admin_email.clone(),
                password: config.admin_password.clone(),
                first_name: "Platform".to_string(),
                last_name: "Admin".to_string(),
                role: UserRole::UserAdmin,
            },
        )
        .await
        .expect("Failed to create admin");
        tracing::info!("Admin account created: {}", config.admin_user_id);
    }
}
