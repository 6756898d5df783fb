use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};

use crate::entities::service_booking::{self, BookingStatus};
use crate::entities::{listing, shortlisted_listing};
use crate::error::{AppError, AppResult};
use crate::services::booking::{self, NewBooking};
use crate::utils::extractor::{AppJson, AppPath, AppQuery};
use crate::utils::jwt::Claims;
use crate::utils::response::ApiResponse;
use crate::utils::validation::{matches_search, non_empty, parse_date, parse_time};
use crate::AppState;

// ============ Booking ============

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: Option<String>,
    pub listing_id: Option<i32>,
    pub provider_id: Option<String>,
    pub scheduled_date: Option<String>,
    pub scheduled_time: Option<String>,
    pub status: Option<String>,
}

/// Request a cleaning slot
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<service_booking::Model>>)> {
    let (Some(user_id), Some(listing_id), Some(provider_id), Some(date), Some(time)) = (
        non_empty(payload.user_id.as_ref()),
        payload.listing_id,
        non_empty(payload.provider_id.as_ref()),
        non_empty(payload.scheduled_date.as_ref()),
        non_empty(payload.scheduled_time.as_ref()),
    ) else {
        return Err(AppError::BadRequest("Missing required fields".to_string()));
    };

    let scheduled_date = parse_date(date)?;
    let scheduled_time = parse_time(time)?;
    state.config.business_hours().check(scheduled_time)?;

    if let Some(status) = non_empty(payload.status.as_ref()) {
        if status.parse::<BookingStatus>() != Ok(BookingStatus::PendingApproval) {
            return Err(AppError::BadRequest(
                "New bookings must start as pending_approval".to_string(),
            ));
        }
    }

    if user_id != claims.sub {
        return Err(AppError::Forbidden(
            "You can only book on your own behalf".to_string(),
        ));
    }

    let booking = booking::create_booking(
        &state.db,
        NewBooking {
            user_id: user_id.to_string(),
            listing_id,
            provider_id: provider_id.to_string(),
            scheduled_date,
            scheduled_time,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            booking,
            "Booking request submitted",
        )),
    ))
}

// ============ Shortlist ============

#[derive(Debug, Serialize)]
pub struct ShortlistEntry {
    pub listing_id: i32,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub image_path: Option<String>,
    pub category: Option<String>,
    pub provider_id: String,
    pub shortlisted_at: DateTime<Utc>,
}

impl ShortlistEntry {
    fn new(entry: &shortlisted_listing::Model, listing: listing::Model) -> Self {
        Self {
            listing_id: listing.listing_id,
            title: listing.title,
            description: listing.description,
            price: listing.price,
            image_path: listing.image_path,
            category: listing.category,
            provider_id: listing.user_id,
            shortlisted_at: entry.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ShortlistQuery {
    pub search: Option<String>,
}

/// The caller's shortlist, most recent first
pub async fn list_shortlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppQuery(query): AppQuery<ShortlistQuery>,
) -> AppResult<Json<ApiResponse<Vec<ShortlistEntry>>>> {
    let rows = shortlisted_listing::Entity::find()
        .filter(shortlisted_listing::Column::UserId.eq(claims.sub.as_str()))
        .find_also_related(listing::Entity)
        .order_by_desc(shortlisted_listing::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let search = non_empty(query.search.as_ref());
    let entries = rows
        .into_iter()
        .filter_map(|(entry, listing)| listing.map(|l| ShortlistEntry::new(&entry, l)))
        .filter(|e| {
            search.is_none_or(|s| {
                matches_search(
                    s,
                    &[
                        e.title.as_str(),
                        e.description.as_str(),
                        e.category.as_deref().unwrap_or_default(),
                    ],
                )
            })
        })
        .collect();

    Ok(Json(ApiResponse::ok(entries)))
}

#[derive(Debug, Deserialize)]
pub struct ShortlistRequest {
    pub listing_id: Option<i32>,
}

fn already_shortlisted() -> AppError {
    AppError::Conflict("Listing is already in your shortlist".to_string())
}

pub async fn add_to_shortlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<ShortlistRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ShortlistEntry>>)> {
    let listing_id = payload
        .listing_id
        .ok_or_else(|| AppError::BadRequest("listing_id is required".to_string()))?;

    let listing = listing::Entity::find_by_id(listing_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

    let existing = shortlisted_listing::Entity::find()
        .filter(shortlisted_listing::Column::UserId.eq(claims.sub.as_str()))
        .filter(shortlisted_listing::Column::ListingId.eq(listing_id))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(already_shortlisted());
    }

    let entry = shortlisted_listing::ActiveModel {
        user_id: Set(claims.sub.clone()),
        listing_id: Set(listing_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => already_shortlisted(),
        _ => AppError::from(e),
    })?;

    tracing::debug!(user_id = %claims.sub, listing_id, "Listing shortlisted");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(ShortlistEntry::new(&entry, listing))),
    ))
}

pub async fn remove_from_shortlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(listing_id): AppPath<i32>,
) -> AppResult<Json<ApiResponse<()>>> {
    let result = shortlisted_listing::Entity::delete_many()
        .filter(shortlisted_listing::Column::UserId.eq(claims.sub.as_str()))
        .filter(shortlisted_listing::Column::ListingId.eq(listing_id))
        .exec(&state.db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound(
            "Listing is not in your shortlist".to_string(),
        ));
    }

    Ok(Json(ApiResponse::message("Removed from shortlist")))
}

#[derive(Debug, Deserialize)]
pub struct ShortlistCheckQuery {
    pub listing_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ShortlistStatus {
    pub listing_id: i32,
    pub is_shortlisted: bool,
}

pub async fn check_shortlist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppQuery(query): AppQuery<ShortlistCheckQuery>,
) -> AppResult<Json<ApiResponse<ShortlistStatus>>> {
    let listing_id = query
        .listing_id
        .ok_or_else(|| AppError::BadRequest("listing_id is required".to_string()))?;

    let is_shortlisted = shortlisted_listing::Entity::find()
        .filter(shortlisted_listing::Column::UserId.eq(claims.sub.as_str()))
        .filter(shortlisted_listing::Column::ListingId.eq(listing_id))
        .one(&state.db)
        .await?
        .is_some();

    Ok(Json(ApiResponse::ok(ShortlistStatus {
        listing_id,
        is_shortlisted,
    })))
}
