use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
    SqlErr, TransactionTrait,
};
use serde::Deserialize;

use crate::entities::service_booking::{self, BookingStatus};
use crate::entities::{category, listing, listing_view, shortlisted_listing};
use crate::error::{AppError, AppResult};
use crate::services::stats::{self, ServiceStats};
use crate::utils::extractor::{AppJson, AppPath};
use crate::utils::jwt::Claims;
use crate::utils::response::ApiResponse;
use crate::utils::validation::non_empty;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub image_path: Option<String>,
    pub category: Option<String>,
}

/// Listing fields after validation.
struct ListingFields {
    title: String,
    description: String,
    price: f64,
    image_path: Option<String>,
    category: Option<String>,
}

async fn validate_listing<C: ConnectionTrait>(
    db: &C,
    payload: ListingRequest,
    listing_id: Option<i32>,
) -> AppResult<ListingFields> {
    let (Some(title), Some(description), Some(price)) = (
        non_empty(payload.title.as_ref()),
        non_empty(payload.description.as_ref()),
        payload.price,
    ) else {
        return Err(AppError::BadRequest(
            "Title, description and price are required".to_string(),
        ));
    };

    if !price.is_finite() || price < 0.0 {
        return Err(AppError::BadRequest(
            "Price must be a non-negative number".to_string(),
        ));
    }

    let category = non_empty(payload.category.as_ref()).map(str::to_string);
    if let Some(name) = &category {
        let known = category::Entity::find()
            .filter(category::Column::CategoryName.eq(name.as_str()))
            .one(db)
            .await?
            .is_some();
        if !known {
            return Err(AppError::BadRequest(format!("Unknown category: {}", name)));
        }
    }

    let mut same_title = listing::Entity::find().filter(listing::Column::Title.eq(title));
    if let Some(id) = listing_id {
        same_title = same_title.filter(listing::Column::ListingId.ne(id));
    }
    if same_title.one(db).await?.is_some() {
        return Err(title_taken());
    }

    Ok(ListingFields {
        title: title.to_string(),
        description: description.to_string(),
        price,
        image_path: non_empty(payload.image_path.as_ref()).map(str::to_string),
        category,
    })
}

fn title_taken() -> AppError {
    AppError::Conflict("A listing with this title already exists".to_string())
}

fn map_unique(e: sea_orm::DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => title_taken(),
        _ => AppError::from(e),
    }
}

/// Load a listing and check that the caller owns it
async fn owned_listing<C: ConnectionTrait>(
    db: &C,
    listing_id: i32,
    user_id: &str,
) -> AppResult<listing::Model> {
    let listing = listing::Entity::find_by_id(listing_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

    if listing.user_id != user_id {
        return Err(AppError::Forbidden(
            "You can only manage your own listings".to_string(),
        ));
    }

    Ok(listing)
}

/// Publish a new service listing
pub async fn create_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<ListingRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<listing::Model>>)> {
    let fields = validate_listing(&state.db, payload, None).await?;

    let listing = listing::ActiveModel {
        title: Set(fields.title),
        description: Set(fields.description),
        price: Set(fields.price),
        image_path: Set(fields.image_path),
        category: Set(fields.category),
        user_id: Set(claims.sub.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(map_unique)?;

    tracing::info!(listing_id = listing.listing_id, user_id = %claims.sub, "Listing created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(listing, "Listing created")),
    ))
}

pub async fn update_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(listing_id): AppPath<i32>,
    AppJson(payload): AppJson<ListingRequest>,
) -> AppResult<Json<ApiResponse<listing::Model>>> {
    let existing = owned_listing(&state.db, listing_id, &claims.sub).await?;
    let fields = validate_listing(&state.db, payload, Some(listing_id)).await?;

    let mut active: listing::ActiveModel = existing.into();
    active.title = Set(fields.title);
    active.description = Set(fields.description);
    active.price = Set(fields.price);
    active.image_path = Set(fields.image_path);
    active.category = Set(fields.category);

    let listing = active.update(&state.db).await.map_err(map_unique)?;

    tracing::info!(listing_id, user_id = %claims.sub, "Listing updated");
    Ok(Json(ApiResponse::ok_with_message(listing, "Listing updated")))
}

/// Remove a listing with its shortlist entries, views and finished bookings.
/// Refused while it still has pending or approved bookings.
pub async fn delete_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(listing_id): AppPath<i32>,
) -> AppResult<Json<ApiResponse<()>>> {
    let txn = state.db.begin().await?;

    owned_listing(&txn, listing_id, &claims.sub).await?;

    let live_bookings = service_booking::Entity::find()
        .filter(service_booking::Column::ListingId.eq(listing_id))
        .filter(
            service_booking::Column::Status
                .is_in([BookingStatus::PendingApproval, BookingStatus::Approved]),
        )
        .count(&txn)
        .await?;
    if live_bookings > 0 {
        return Err(AppError::Conflict(format!(
            "Listing has {} open booking(s); complete or cancel them first",
            live_bookings
        )));
    }

    service_booking::Entity::delete_many()
        .filter(service_booking::Column::ListingId.eq(listing_id))
        .exec(&txn)
        .await?;
    shortlisted_listing::Entity::delete_many()
        .filter(shortlisted_listing::Column::ListingId.eq(listing_id))
        .exec(&txn)
        .await?;
    listing_view::Entity::delete_many()
        .filter(listing_view::Column::ListingId.eq(listing_id))
        .exec(&txn)
        .await?;
    listing::Entity::delete_by_id(listing_id).exec(&txn).await?;

    txn.commit().await?;

    tracing::info!(listing_id, user_id = %claims.sub, "Listing deleted");
    Ok(Json(ApiResponse::message("Listing deleted")))
}

/// Shortlist, view and booking counts for each of the caller's listings
pub async fn service_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<ApiResponse<Vec<ServiceStats>>>> {
    let stats = stats::service_stats(&state.db, &claims.sub).await?;
    Ok(Json(ApiResponse::ok(stats)))
}
