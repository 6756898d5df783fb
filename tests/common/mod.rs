#![allow(dead_code)]

use std::sync::LazyLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use tower::ServiceExt;

use cleaning_marketplace::entities::listing;
use cleaning_marketplace::entities::user_account::{self, UserRole};
use cleaning_marketplace::services::session;
use cleaning_marketplace::utils::password::hash_password;
use cleaning_marketplace::{db, routes, AppState, Config};

pub const PASSWORD: &str = "password123";

// Hashing is slow in debug builds; every seeded account shares one hash.
static PASSWORD_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password(PASSWORD).expect("hash test password"));

// ── Helpers ──

pub fn test_config() -> Config {
    Config {
        // One connection keeps every query on the same in-memory database.
        database_url: "sqlite::memory:".to_string(),
        database_max_connections: 1,
        database_min_connections: 1,
        database_acquire_timeout_secs: 30,
        jwt_secret: "test-secret".to_string(),
        jwt_expiration_hours: 1,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        business_open_hour: 8,
        business_close_hour: 20,
        // Per-IP keys need ConnectInfo, which oneshot requests don't carry.
        rate_limit_enabled: false,
        admin_user_id: "admin".to_string(),
        admin_email: "admin@test.local".to_string(),
        admin_password: PASSWORD.to_string(),
    }
}

pub async fn test_state() -> AppState {
    let config = test_config();
    let db = db::connect(&config).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    AppState { db, config }
}

pub async fn seed_user(
    db: &DatabaseConnection,
    user_id: &str,
    role: UserRole,
) -> user_account::Model {
    user_account::ActiveModel {
        user_id: Set(user_id.to_string()),
        email: Set(format!("{}@test.local", user_id)),
        password_hash: Set(PASSWORD_HASH.clone()),
        first_name: Set("Test".to_string()),
        last_name: Set(user_id.to_string()),
        role: Set(role),
        is_suspended: Set(false),
        active_session_id: Set(None),
        session_expires_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_listing(
    db: &DatabaseConnection,
    owner: &str,
    title: &str,
    price: f64,
    category: Option<&str>,
) -> listing::Model {
    listing::ActiveModel {
        title: Set(title.to_string()),
        description: Set(format!("{} description", title)),
        price: Set(price),
        image_path: Set(None),
        category: Set(category.map(str::to_string)),
        user_id: Set(owner.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Open a session for `user_id` without going through password hashing.
pub async fn token_for(state: &AppState, user_id: &str) -> String {
    let user = session::find_account(&state.db, user_id)
        .await
        .unwrap()
        .expect("seeded user");
    session::open_session(&state.db, &state.config, user)
        .await
        .unwrap()
        .token
}

/// Seed an account with the given role and return its token.
pub async fn signed_in(state: &AppState, user_id: &str, role: UserRole) -> String {
    seed_user(&state.db, user_id, role).await;
    token_for(state, user_id).await
}

/// Send one request through the full router and decode the JSON body.
pub async fn send(
    state: &AppState,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = routes::create_router(state.clone())
        .oneshot(request)
        .await
        .unwrap();

    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
