mod common;

use axum::http::StatusCode;
use serde_json::json;

use cleaning_marketplace::entities::user_account::UserRole;

use common::{seed_user, send, signed_in, token_for, PASSWORD};

#[tokio::test]
async fn test_admin_routes_require_user_admin() {
    let state = common::test_state().await;
    let manager = signed_in(&state, "user09", UserRole::PlatformManager).await;

    let (status, _) = send(&state, "GET", "/api/admin/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = send(&state, "GET", "/api/admin/users", Some(&manager), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["message"], "User admin access required");
}

#[tokio::test]
async fn test_list_and_search_users() {
    let state = common::test_state().await;
    let admin = signed_in(&state, "admin", UserRole::UserAdmin).await;
    seed_user(&state.db, "user01", UserRole::HomeOwner).await;
    seed_user(&state.db, "user02", UserRole::HomeCleaner).await;
    seed_user(&state.db, "user03", UserRole::HomeCleaner).await;

    let (status, json) = send(&state, "GET", "/api/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 4);

    let (_, json) = send(&state, "GET", "/api/admin/users?role=home_cleaner", Some(&admin), None).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let (_, json) = send(&state, "GET", "/api/admin/users?search=USER03", Some(&admin), None).await;
    let found = json["data"].as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["email"], "user03@test.local");
}

#[tokio::test]
async fn test_create_user_with_generated_id_and_password() {
    let state = common::test_state().await;
    let admin = signed_in(&state, "admin", UserRole::UserAdmin).await;
    seed_user(&state.db, "user01", UserRole::HomeOwner).await;

    let (status, json) = send(
        &state,
        "POST",
        "/api/admin/users",
        Some(&admin),
        Some(json!({
            "email": "cleaner@test.local",
            "first_name": "Casey",
            "last_name": "Clean",
            "role": "home_cleaner",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["user_id"], "user02");
    assert_eq!(json["data"]["role"], "home_cleaner");
    let password = json["data"]["initial_password"].as_str().unwrap().to_string();
    assert_eq!(password.len(), 12);

    let (status, _) = send(
        &state,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "user02", "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &state,
        "POST",
        "/api/admin/users",
        Some(&admin),
        Some(json!({
            "user_id": "user01",
            "email": "other@test.local",
            "first_name": "Dup",
            "last_name": "Id",
            "role": "home_owner",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &state,
        "POST",
        "/api/admin/users",
        Some(&admin),
        Some(json!({ "email": "not-an-email", "first_name": "A", "last_name": "B", "role": "home_owner" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_role_change_ends_session() {
    let state = common::test_state().await;
    let admin = signed_in(&state, "admin", UserRole::UserAdmin).await;
    let token = signed_in(&state, "user01", UserRole::HomeOwner).await;

    let (status, _) = send(&state, "PUT", "/api/admin/users/user01", Some(&admin), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &state,
        "PUT",
        "/api/admin/users/user01",
        Some(&admin),
        Some(json!({ "role": "home_cleaner", "first_name": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["role"], "home_cleaner");
    assert_eq!(json["data"]["first_name"], "Renamed");

    let (status, _) = send(&state, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The new session carries the new role
    let token = token_for(&state, "user01").await;
    let (status, _) = send(&state, "GET", "/api/cleaner/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &state,
        "PUT",
        "/api/admin/users/user99",
        Some(&admin),
        Some(json!({ "first_name": "Ghost" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_force_logout() {
    let state = common::test_state().await;
    let admin = signed_in(&state, "admin", UserRole::UserAdmin).await;
    let token = signed_in(&state, "user01", UserRole::HomeOwner).await;

    let (status, _) = send(&state, "DELETE", "/api/admin/users/user01/session", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&state, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &state,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "user01", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_cannot_suspend_self() {
    let state = common::test_state().await;
    let admin = signed_in(&state, "admin", UserRole::UserAdmin).await;

    let (status, _) = send(
        &state,
        "PUT",
        "/api/admin/users/admin/suspension",
        Some(&admin),
        Some(json!({ "is_suspended": true })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_single_user() {
    let state = common::test_state().await;
    let admin = signed_in(&state, "admin", UserRole::UserAdmin).await;
    seed_user(&state.db, "user01", UserRole::HomeCleaner).await;

    let (status, json) = send(&state, "GET", "/api/admin/users/user01", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user_id"], "user01");
    assert_eq!(json["data"]["role"], "home_cleaner");
    assert!(json["data"].get("password_hash").is_none());

    let (status, json) = send(&state, "GET", "/api/admin/users/user99", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "User not found");
}

#[tokio::test]
async fn test_update_to_taken_email_conflicts() {
    let state = common::test_state().await;
    let admin = signed_in(&state, "admin", UserRole::UserAdmin).await;
    seed_user(&state.db, "user01", UserRole::HomeOwner).await;
    seed_user(&state.db, "user02", UserRole::HomeOwner).await;

    let (status, json) = send(
        &state,
        "PUT",
        "/api/admin/users/user02",
        Some(&admin),
        Some(json!({ "email": "user01@test.local" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["message"], "Email already registered");

    // Keeping one's own address is not a conflict
    let (status, _) = send(
        &state,
        "PUT",
        "/api/admin/users/user02",
        Some(&admin),
        Some(json!({ "email": "user02@test.local", "last_name": "Kept" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
