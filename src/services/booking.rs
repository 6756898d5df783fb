use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime, Timelike, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::Serialize;

use crate::entities::listing;
use crate::entities::service_booking::{self, BookingStatus};
use crate::entities::user_account;
use crate::error::{AppError, AppResult};

/// Bookable hours, `open_hour..close_hour`; the last slot starts at `close_hour - 1`.
#[derive(Debug, Clone, Copy)]
pub struct BusinessHours {
    pub open_hour: u32,
    pub close_hour: u32,
}

impl BusinessHours {
    pub fn slot_starts(&self) -> impl Iterator<Item = NaiveTime> {
        (self.open_hour..self.close_hour).filter_map(|h| NaiveTime::from_hms_opt(h, 0, 0))
    }

    pub fn check(&self, time: NaiveTime) -> AppResult<()> {
        if time.minute() != 0 || time.second() != 0 {
            return Err(AppError::BadRequest(
                "Bookings start on the hour (HH:00:00)".to_string(),
            ));
        }
        if time.hour() < self.open_hour || time.hour() >= self.close_hour {
            return Err(AppError::BadRequest(format!(
                "Bookings are available between {:02}:00 and {:02}:00",
                self.open_hour, self.close_hour
            )));
        }
        Ok(())
    }
}

/// One occupied (date, hour) of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Slot {
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
}

/// Slots held by non-cancelled bookings of `provider_id`. With a date, only that
/// day; without one, every occupied slot from `today` onward.
pub async fn occupied_slots<C: ConnectionTrait>(
    db: &C,
    provider_id: &str,
    date: Option<NaiveDate>,
    today: NaiveDate,
) -> AppResult<Vec<Slot>> {
    let mut query = service_booking::Entity::find()
        .filter(service_booking::Column::ProviderId.eq(provider_id))
        .filter(service_booking::Column::Status.ne(BookingStatus::Cancelled));

    query = match date {
        Some(date) => query.filter(service_booking::Column::ScheduledDate.eq(date)),
        None => query.filter(service_booking::Column::ScheduledDate.gte(today)),
    };

    let bookings = query
        .order_by_asc(service_booking::Column::ScheduledDate)
        .order_by_asc(service_booking::Column::ScheduledTime)
        .all(db)
        .await?;

    let mut seen = HashSet::new();
    Ok(bookings
        .into_iter()
        .map(|b| Slot {
            scheduled_date: b.scheduled_date,
            scheduled_time: b.scheduled_time,
        })
        .filter(|slot| seen.insert(*slot))
        .collect())
}

/// Whole-hour starts within business hours not covered by `occupied`.
pub fn free_slots(hours: BusinessHours, date: NaiveDate, occupied: &[Slot]) -> Vec<NaiveTime> {
    hours
        .slot_starts()
        .filter(|time| {
            !occupied
                .iter()
                .any(|s| s.scheduled_date == date && s.scheduled_time == *time)
        })
        .collect()
}

/// A validated booking request.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: String,
    pub listing_id: i32,
    pub provider_id: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
}

fn slot_taken() -> AppError {
    AppError::Conflict("This time slot is already booked".to_string())
}

/// A unique violation on the live-slot index means another booking got there first.
fn slot_conflict(e: DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => slot_taken(),
        _ => AppError::from(e),
    }
}

/// Insert a `pending_approval` booking. Relies on the live-slot index alone;
/// callers check the parties and the slot first.
pub async fn insert_booking<C: ConnectionTrait>(
    db: &C,
    new: NewBooking,
) -> AppResult<service_booking::Model> {
    let now = Utc::now();
    service_booking::ActiveModel {
        user_id: Set(new.user_id),
        provider_id: Set(new.provider_id),
        listing_id: Set(new.listing_id),
        scheduled_date: Set(new.scheduled_date),
        scheduled_time: Set(new.scheduled_time),
        status: Set(BookingStatus::PendingApproval),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(slot_conflict)
}

/// Check the parties and the slot, then insert the booking as `pending_approval`.
///
/// The existence and conflict checks run in the same transaction as the insert,
/// and the partial unique index on live slots turns a concurrent double booking
/// into the same conflict error.
pub async fn create_booking(
    db: &DatabaseConnection,
    new: NewBooking,
) -> AppResult<service_booking::Model> {
    if new.user_id == new.provider_id {
        return Err(AppError::BadRequest(
            "You cannot book your own service".to_string(),
        ));
    }

    let txn = db.begin().await?;

    user_account::Entity::find_by_id(new.user_id.clone())
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    user_account::Entity::find_by_id(new.provider_id.clone())
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Provider not found".to_string()))?;

    let listing = listing::Entity::find_by_id(new.listing_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

    if listing.user_id != new.provider_id {
        return Err(AppError::BadRequest(
            "Listing is not offered by this provider".to_string(),
        ));
    }

    let existing = service_booking::Entity::find()
        .filter(service_booking::Column::ProviderId.eq(new.provider_id.as_str()))
        .filter(service_booking::Column::ScheduledDate.eq(new.scheduled_date))
        .filter(service_booking::Column::ScheduledTime.eq(new.scheduled_time))
        .filter(service_booking::Column::Status.ne(BookingStatus::Cancelled))
        .one(&txn)
        .await?;

    if existing.is_some() {
        return Err(slot_taken());
    }

    let booking = insert_booking(&txn, new).await?;
    txn.commit().await.map_err(slot_conflict)?;

    tracing::info!(
        booking_id = booking.booking_id,
        provider_id = %booking.provider_id,
        date = %booking.scheduled_date,
        time = %booking.scheduled_time,
        "Booking created"
    );

    Ok(booking)
}

/// How the acting user relates to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingParty {
    Requester,
    Provider,
}

pub fn party_of(booking: &service_booking::Model, user_id: &str) -> Option<BookingParty> {
    if booking.provider_id == user_id {
        Some(BookingParty::Provider)
    } else if booking.user_id == user_id {
        Some(BookingParty::Requester)
    } else {
        None
    }
}

/// The provider drives the booking through the transition table; the
/// requester may only cancel.
pub fn authorize_transition(
    party: BookingParty,
    current: BookingStatus,
    next: BookingStatus,
) -> AppResult<()> {
    if party == BookingParty::Requester && next != BookingStatus::Cancelled {
        return Err(AppError::Forbidden(
            "Only the provider can change a booking to this status".to_string(),
        ));
    }

    if current.is_terminal() {
        return Err(AppError::Conflict(format!(
            "Booking is already {} and can no longer change",
            current
        )));
    }

    if !current.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "Cannot change booking status from {} to {}",
            current, next
        )));
    }

    Ok(())
}

/// Move a booking to `next` on behalf of `actor_id`.
///
/// The update is conditional on the status that was read, so a concurrent
/// change is reported instead of overwritten.
pub async fn transition_status(
    db: &DatabaseConnection,
    booking_id: i32,
    actor_id: &str,
    next: BookingStatus,
) -> AppResult<service_booking::Model> {
    let booking = service_booking::Entity::find_by_id(booking_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    let party = party_of(&booking, actor_id).ok_or_else(|| {
        AppError::Forbidden("You are not authorized to update this booking".to_string())
    })?;

    authorize_transition(party, booking.status, next)?;

    let result = service_booking::Entity::update_many()
        .set(service_booking::ActiveModel {
            status: Set(next),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(service_booking::Column::BookingId.eq(booking_id))
        .filter(service_booking::Column::Status.eq(booking.status))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::Conflict(
            "Booking was modified concurrently, reload and try again".to_string(),
        ));
    }

    tracing::info!(
        booking_id,
        actor = %actor_id,
        from = %booking.status,
        to = %next,
        "Booking status updated"
    );

    service_booking::Entity::find_by_id(booking_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}
