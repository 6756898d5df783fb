use std::collections::HashMap;

use axum::{
    extract::State,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::entities::service_booking::{self, BookingStatus};
use crate::entities::{listing, user_account};
use crate::error::{AppError, AppResult};
use crate::services::booking::{party_of, transition_status};
use crate::utils::extractor::{AppJson, AppPath, AppQuery};
use crate::utils::jwt::Claims;
use crate::utils::response::ApiResponse;
use crate::utils::validation::non_empty;
use crate::AppState;

/// A booking with the listing and both parties' display fields.
#[derive(Debug, Serialize)]
pub struct BookingDetail {
    pub booking_id: i32,
    pub user_id: String,
    pub provider_id: String,
    pub listing_id: i32,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub listing_title: Option<String>,
    pub price: Option<f64>,
    pub requester_name: Option<String>,
    pub provider_name: Option<String>,
}

async fn describe(
    db: &DatabaseConnection,
    bookings: Vec<service_booking::Model>,
) -> AppResult<Vec<BookingDetail>> {
    let listing_ids: Vec<i32> = bookings.iter().map(|b| b.listing_id).collect();
    let user_ids: Vec<String> = bookings
        .iter()
        .flat_map(|b| [b.user_id.clone(), b.provider_id.clone()])
        .collect();

    let listings: HashMap<i32, listing::Model> = listing::Entity::find()
        .filter(listing::Column::ListingId.is_in(listing_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|l| (l.listing_id, l))
        .collect();

    let users: HashMap<String, user_account::Model> = user_account::Entity::find()
        .filter(user_account::Column::UserId.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.user_id.clone(), u))
        .collect();

    Ok(bookings
        .into_iter()
        .map(|b| {
            let listing = listings.get(&b.listing_id);
            BookingDetail {
                listing_title: listing.map(|l| l.title.clone()),
                price: listing.map(|l| l.price),
                requester_name: users.get(&b.user_id).map(|u| u.full_name()),
                provider_name: users.get(&b.provider_id).map(|u| u.full_name()),
                booking_id: b.booking_id,
                user_id: b.user_id,
                provider_id: b.provider_id,
                listing_id: b.listing_id,
                scheduled_date: b.scheduled_date,
                scheduled_time: b.scheduled_time,
                status: b.status,
                created_at: b.created_at,
                updated_at: b.updated_at,
            }
        })
        .collect())
}

fn parse_status(value: &str) -> AppResult<BookingStatus> {
    value.parse::<BookingStatus>().map_err(AppError::BadRequest)
}

#[derive(Debug, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<String>,
}

async fn list_for(
    db: &DatabaseConnection,
    column: service_booking::Column,
    owner_id: String,
    status: Option<BookingStatus>,
) -> AppResult<Vec<BookingDetail>> {
    let mut query = service_booking::Entity::find().filter(column.eq(owner_id));
    if let Some(status) = status {
        query = query.filter(service_booking::Column::Status.eq(status));
    }

    let bookings = query
        .order_by_desc(service_booking::Column::ScheduledDate)
        .order_by_desc(service_booking::Column::ScheduledTime)
        .all(db)
        .await?;

    describe(db, bookings).await
}

/// Bookings requested by a user
pub async fn user_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(user_id): AppPath<String>,
    AppQuery(query): AppQuery<BookingListQuery>,
) -> AppResult<Json<ApiResponse<Vec<BookingDetail>>>> {
    let status = non_empty(query.status.as_ref()).map(parse_status).transpose()?;

    if user_id != claims.sub {
        return Err(AppError::Forbidden(
            "You can only view your own bookings".to_string(),
        ));
    }

    let bookings = list_for(&state.db, service_booking::Column::UserId, user_id, status).await?;
    Ok(Json(ApiResponse::ok(bookings)))
}

/// Bookings received by a provider
pub async fn provider_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(provider_id): AppPath<String>,
    AppQuery(query): AppQuery<BookingListQuery>,
) -> AppResult<Json<ApiResponse<Vec<BookingDetail>>>> {
    let status = non_empty(query.status.as_ref()).map(parse_status).transpose()?;

    if provider_id != claims.sub {
        return Err(AppError::Forbidden(
            "You can only view bookings of your own services".to_string(),
        ));
    }

    let bookings = list_for(
        &state.db,
        service_booking::Column::ProviderId,
        provider_id,
        status,
    )
    .await?;
    Ok(Json(ApiResponse::ok(bookings)))
}

/// Booking detail, visible to its requester and provider
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(booking_id): AppPath<i32>,
) -> AppResult<Json<ApiResponse<BookingDetail>>> {
    let booking = service_booking::Entity::find_by_id(booking_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if party_of(&booking, &claims.sub).is_none() {
        return Err(AppError::Forbidden(
            "You are not authorized to view this booking".to_string(),
        ));
    }

    let detail = describe(&state.db, vec![booking])
        .await?
        .pop()
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    Ok(Json(ApiResponse::ok(detail)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
    pub user_id: Option<String>,
}

/// Move a booking along its lifecycle
pub async fn update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(booking_id): AppPath<i32>,
    AppJson(payload): AppJson<UpdateStatusRequest>,
) -> AppResult<Json<ApiResponse<service_booking::Model>>> {
    let status = non_empty(payload.status.as_ref())
        .ok_or_else(|| AppError::BadRequest("Status is required".to_string()))?;
    let next = parse_status(status)?;

    if let Some(user_id) = non_empty(payload.user_id.as_ref()) {
        if user_id != claims.sub {
            return Err(AppError::Forbidden(
                "user_id does not match the signed-in user".to_string(),
            ));
        }
    }

    let booking = transition_status(&state.db, booking_id, &claims.sub, next).await?;

    Ok(Json(ApiResponse::ok_with_message(
        booking,
        format!("Booking status updated to {}", next),
    )))
}
