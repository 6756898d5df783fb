mod common;

use axum::http::StatusCode;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::{json, Value};
use tokio::task::JoinSet;

use cleaning_marketplace::entities::service_booking::{self, BookingStatus};
use cleaning_marketplace::entities::user_account::UserRole;
use cleaning_marketplace::services::booking::{insert_booking, NewBooking};
use cleaning_marketplace::{AppError, AppState};

use common::{seed_listing, seed_user, send, signed_in, token_for};

struct Marketplace {
    state: AppState,
    owner: String,
    provider: String,
    listing_id: i64,
}

/// user01 (home owner) books listing 5 of user02 (cleaner); listings 1-4
/// belong to user03.
async fn marketplace() -> Marketplace {
    let state = common::test_state().await;
    seed_user(&state.db, "user01", UserRole::HomeOwner).await;
    seed_user(&state.db, "user02", UserRole::HomeCleaner).await;
    seed_user(&state.db, "user03", UserRole::HomeCleaner).await;

    for i in 1..=4 {
        seed_listing(&state.db, "user03", &format!("Listing {}", i), 40.0, None).await;
    }
    let listing = seed_listing(&state.db, "user02", "Spotless Homes", 80.0, None).await;

    let owner = token_for(&state, "user01").await;
    let provider = token_for(&state, "user02").await;

    Marketplace {
        state,
        owner,
        provider,
        listing_id: listing.listing_id as i64,
    }
}

fn booking_body(listing_id: i64, date: &str, time: &str) -> Value {
    json!({
        "user_id": "user01",
        "listing_id": listing_id,
        "provider_id": "user02",
        "scheduled_date": date,
        "scheduled_time": time,
    })
}

async fn book(m: &Marketplace, date: &str, time: &str) -> (StatusCode, Value) {
    send(
        &m.state,
        "POST",
        "/api/bookings",
        Some(&m.owner),
        Some(booking_body(m.listing_id, date, time)),
    )
    .await
}

async fn set_status(m: &Marketplace, token: &str, booking_id: i64, status: &str) -> (StatusCode, Value) {
    send(
        &m.state,
        "PUT",
        &format!("/api/bookings/{}/status", booking_id),
        Some(token),
        Some(json!({ "status": status })),
    )
    .await
}

async fn occupied(m: &Marketplace, date: &str) -> Vec<Value> {
    let (status, json) = send(
        &m.state,
        "GET",
        &format!("/api/bookings/availability?provider_id=user02&date={}", date),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["data"]["bookings"].as_array().unwrap().clone()
}

// ── Lifecycle scenarios ──

#[tokio::test]
async fn test_create_booking_starts_pending() {
    let m = marketplace().await;
    assert_eq!(m.listing_id, 5);

    let (status, json) = book(&m, "2025-06-01", "10:00:00").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert!(json["data"]["booking_id"].as_i64().unwrap() > 0);
    assert_eq!(json["data"]["status"], "pending_approval");

    let slots = occupied(&m, "2025-06-01").await;
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0]["scheduled_date"], "2025-06-01");
    assert_eq!(slots[0]["scheduled_time"], "10:00:00");
}

#[tokio::test]
async fn test_same_slot_is_rejected() {
    let m = marketplace().await;
    let (status, _) = book(&m, "2025-06-01", "10:00:00").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = book(&m, "2025-06-01", "10:00:00").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "This time slot is already booked");

    // Another hour of the same day is still free
    let (status, _) = book(&m, "2025-06-01", "11:00:00").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_provider_drives_booking_to_completion() {
    let m = marketplace().await;
    let (_, json) = book(&m, "2025-06-01", "10:00:00").await;
    let id = json["data"]["booking_id"].as_i64().unwrap();

    let (status, json) = set_status(&m, &m.provider, id, "approved").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "approved");

    let (status, json) = set_status(&m, &m.provider, id, "completed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "completed");

    // Terminal: completed never goes back
    let (status, json) = set_status(&m, &m.provider, id, "pending_approval").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_cancelled_slot_is_released() {
    let m = marketplace().await;
    let (_, json) = book(&m, "2025-06-01", "10:00:00").await;
    let id = json["data"]["booking_id"].as_i64().unwrap();

    let (status, json) = set_status(&m, &m.owner, id, "cancelled").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "cancelled");

    assert!(occupied(&m, "2025-06-01").await.is_empty());

    // The slot can be booked again
    let (status, _) = book(&m, "2025-06-01", "10:00:00").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_concurrent_bookings_for_one_slot() {
    let m = marketplace().await;

    let mut tasks = JoinSet::new();
    for _ in 0..5 {
        let state = m.state.clone();
        let token = m.owner.clone();
        let body = booking_body(m.listing_id, "2025-07-01", "09:00:00");
        tasks.spawn(async move {
            send(&state, "POST", "/api/bookings", Some(&token), Some(body))
                .await
                .0
        });
    }

    let mut created = 0;
    let mut conflicts = 0;
    while let Some(status) = tasks.join_next().await {
        match status.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => conflicts += 1,
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, 4);
    assert_eq!(occupied(&m, "2025-07-01").await.len(), 1);
}

#[tokio::test]
async fn test_live_slot_index_reports_conflict() {
    let m = marketplace().await;
    let slot = || NewBooking {
        user_id: "user01".to_string(),
        listing_id: m.listing_id as i32,
        provider_id: "user02".to_string(),
        scheduled_date: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
        scheduled_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
    };

    let first = insert_booking(&m.state.db, slot()).await.unwrap();

    // No existence check here: only the partial unique index stands in the way
    let err = insert_booking(&m.state.db, slot()).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {:?}", err);

    // A cancelled booking no longer holds the slot
    service_booking::Entity::update_many()
        .set(service_booking::ActiveModel {
            status: Set(BookingStatus::Cancelled),
            ..Default::default()
        })
        .filter(service_booking::Column::BookingId.eq(first.booking_id))
        .exec(&m.state.db)
        .await
        .unwrap();
    let again = insert_booking(&m.state.db, slot()).await.unwrap();
    assert_eq!(again.status, BookingStatus::PendingApproval);
}

// ── Validation ──

#[tokio::test]
async fn test_missing_fields_are_rejected() {
    let m = marketplace().await;
    let (status, json) = send(
        &m.state,
        "POST",
        "/api/bookings",
        Some(&m.owner),
        Some(json!({ "user_id": "user01", "listing_id": m.listing_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Missing required fields");
}

#[tokio::test]
async fn test_date_and_time_formats() {
    let m = marketplace().await;

    let (status, _) = book(&m, "01/06/2025", "10:00:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = book(&m, "2025-06-01", "10:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Outside business hours and off the hour
    let (status, _) = book(&m, "2025-06-01", "21:00:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = book(&m, "2025-06-01", "10:30:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_fields_use_the_error_envelope() {
    let m = marketplace().await;
    let mut body = booking_body(m.listing_id, "2025-06-01", "10:00:00");
    body["listing_id"] = json!("five");

    let (status, json) = send(&m.state, "POST", "/api/bookings", Some(&m.owner), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().unwrap().starts_with("Invalid JSON data"));

    let (status, json) = send(&m.state, "GET", "/api/bookings/abc", Some(&m.owner), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().unwrap().starts_with("Invalid path parameter"));
}

#[tokio::test]
async fn test_initial_status_must_be_pending() {
    let m = marketplace().await;
    let mut body = booking_body(m.listing_id, "2025-06-01", "10:00:00");
    body["status"] = json!("approved");

    let (status, _) = send(&m.state, "POST", "/api/bookings", Some(&m.owner), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_parties_and_listing_must_exist() {
    let m = marketplace().await;

    let mut body = booking_body(m.listing_id, "2025-06-01", "10:00:00");
    body["provider_id"] = json!("user99");
    let (status, json) = send(&m.state, "POST", "/api/bookings", Some(&m.owner), Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Provider not found");

    let body = booking_body(999, "2025-06-01", "10:00:00");
    let (status, json) = send(&m.state, "POST", "/api/bookings", Some(&m.owner), Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Listing not found");

    // Listing 1 belongs to user03, not user02
    let body = booking_body(1, "2025-06-01", "10:00:00");
    let (status, _) = send(&m.state, "POST", "/api/bookings", Some(&m.owner), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Authorization ──

#[tokio::test]
async fn test_booking_requires_home_owner_session() {
    let m = marketplace().await;
    let body = booking_body(m.listing_id, "2025-06-01", "10:00:00");

    let (status, _) = send(&m.state, "POST", "/api/bookings", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&m.state, "POST", "/api/bookings", Some(&m.provider), Some(body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cannot_book_for_someone_else() {
    let m = marketplace().await;
    let other = signed_in(&m.state, "user04", UserRole::HomeOwner).await;

    let body = booking_body(m.listing_id, "2025-06-01", "10:00:00");
    let (status, _) = send(&m.state, "POST", "/api/bookings", Some(&other), Some(body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_outsider_cannot_change_status() {
    let m = marketplace().await;
    let (_, json) = book(&m, "2025-06-01", "10:00:00").await;
    let id = json["data"]["booking_id"].as_i64().unwrap();

    let outsider = signed_in(&m.state, "user05", UserRole::HomeCleaner).await;
    for target in ["approved", "cancelled", "completed", "pending_approval"] {
        let (status, _) = set_status(&m, &outsider, id, target).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "target {}", target);
    }

    // Nothing changed
    let (_, json) = send(
        &m.state,
        "GET",
        &format!("/api/bookings/{}", id),
        Some(&m.owner),
        None,
    )
    .await;
    assert_eq!(json["data"]["status"], "pending_approval");
}

#[tokio::test]
async fn test_requester_can_only_cancel() {
    let m = marketplace().await;
    let (_, json) = book(&m, "2025-06-01", "10:00:00").await;
    let id = json["data"]["booking_id"].as_i64().unwrap();

    let (status, _) = set_status(&m, &m.owner, id, "approved").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_status_update_errors() {
    let m = marketplace().await;
    let (_, json) = book(&m, "2025-06-01", "10:00:00").await;
    let id = json["data"]["booking_id"].as_i64().unwrap();

    let (status, json) = set_status(&m, &m.provider, id, "done").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    let (status, _) = set_status(&m, &m.provider, 4242, "approved").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A body user_id must name the signed-in user
    let (status, _) = send(
        &m.state,
        "PUT",
        &format!("/api/bookings/{}/status", id),
        Some(&m.provider),
        Some(json!({ "status": "approved", "user_id": "user01" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // pending_approval cannot jump to completed
    let (status, _) = set_status(&m, &m.provider, id, "completed").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// ── Queries ──

#[tokio::test]
async fn test_booking_lists_and_detail() {
    let m = marketplace().await;
    let (_, json) = book(&m, "2025-06-01", "10:00:00").await;
    let first = json["data"]["booking_id"].as_i64().unwrap();
    book(&m, "2025-06-02", "10:00:00").await;
    set_status(&m, &m.provider, first, "approved").await;

    let (status, json) = send(&m.state, "GET", "/api/bookings/user/user01", Some(&m.owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let (_, json) = send(
        &m.state,
        "GET",
        "/api/bookings/provider/user02?status=approved",
        Some(&m.provider),
        None,
    )
    .await;
    let approved = json["data"].as_array().unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0]["listing_title"], "Spotless Homes");
    assert_eq!(approved[0]["requester_name"], "Test user01");

    let (status, _) = send(
        &m.state,
        "GET",
        "/api/bookings/user/user01?status=finished",
        Some(&m.owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Someone else's list
    let (status, _) = send(&m.state, "GET", "/api/bookings/user/user01", Some(&m.provider), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(
        &m.state,
        "GET",
        &format!("/api/bookings/{}", first),
        Some(&m.provider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["provider_name"], "Test user02");
    assert_eq!(json["data"]["price"], 80.0);

    let outsider = signed_in(&m.state, "user06", UserRole::HomeOwner).await;
    let (status, _) = send(
        &m.state,
        "GET",
        &format!("/api/bookings/{}", first),
        Some(&outsider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_availability_lists_free_hours() {
    let m = marketplace().await;
    book(&m, "2025-06-01", "10:00:00").await;

    let (status, json) = send(
        &m.state,
        "GET",
        "/api/bookings/availability?provider_id=user02&date=2025-06-01",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["provider_id"], "user02");
    let free = json["data"]["available_times"].as_array().unwrap();
    assert_eq!(free.len(), 11);
    assert!(!free.contains(&json!("10:00:00")));

    // No provider: empty result, not an error
    let (status, json) = send(&m.state, "GET", "/api/bookings/availability", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(json["data"]["bookings"].as_array().unwrap().is_empty());

    let (status, _) = send(
        &m.state,
        "GET",
        "/api/bookings/availability?provider_id=user02&date=tomorrow",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_availability_without_date_starts_today() {
    let m = marketplace().await;
    let today = Utc::now().date_naive();
    let past = (today - Duration::days(3)).format("%Y-%m-%d").to_string();
    let upcoming = (today + Duration::days(3)).format("%Y-%m-%d").to_string();

    let (status, _) = book(&m, &past, "10:00:00").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = book(&m, &upcoming, "11:00:00").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(
        &m.state,
        "GET",
        "/api/bookings/availability?provider_id=user02",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let slots = json["data"]["bookings"].as_array().unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0]["scheduled_date"], upcoming.as_str());
    assert_eq!(slots[0]["scheduled_time"], "11:00:00");
    // Without a date there is no free-hour list
    assert!(json["data"].get("available_times").is_none());
}
