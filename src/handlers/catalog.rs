use axum::{
    extract::State,
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::entities::{category, listing, listing_view, user_account};
use crate::error::{AppError, AppResult};
use crate::services::booking::{free_slots, occupied_slots, Slot};
use crate::services::session;
use crate::utils::extractor::{AppPath, AppQuery};
use crate::utils::jwt::verify_token;
use crate::utils::response::ApiResponse;
use crate::utils::validation::{is_category_code, matches_search, non_empty, parse_date};
use crate::AppState;

// ============ Listings ============

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub listing_id: i32,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub image_path: Option<String>,
    pub category: Option<String>,
    pub user_id: String,
    pub provider_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ListingResponse {
    pub fn new(listing: listing::Model, provider: Option<&user_account::Model>) -> Self {
        Self {
            listing_id: listing.listing_id,
            title: listing.title,
            description: listing.description,
            price: listing.price,
            image_path: listing.image_path,
            category: listing.category,
            user_id: listing.user_id,
            provider_name: provider.map(|p| p.full_name()),
            created_at: listing.created_at,
        }
    }

    fn matches(&self, search: &str) -> bool {
        matches_search(
            search,
            &[
                self.title.as_str(),
                self.description.as_str(),
                self.category.as_deref().unwrap_or_default(),
                self.provider_name.as_deref().unwrap_or_default(),
            ],
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub search: Option<String>,
    pub category: Option<String>,
}

/// List all listings, newest first
pub async fn list_listings(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListingQuery>,
) -> AppResult<Json<ApiResponse<Vec<ListingResponse>>>> {
    let rows = listing::Entity::find()
        .find_also_related(user_account::Entity)
        .order_by_desc(listing::Column::CreatedAt)
        .order_by_desc(listing::Column::ListingId)
        .all(&state.db)
        .await?;

    let search = non_empty(query.search.as_ref());
    let category = non_empty(query.category.as_ref());

    let listings = rows
        .into_iter()
        .map(|(l, provider)| ListingResponse::new(l, provider.as_ref()))
        .filter(|l| category.is_none_or(|c| l.category.as_deref() == Some(c)))
        .filter(|l| search.is_none_or(|s| l.matches(s)))
        .collect();

    Ok(Json(ApiResponse::ok(listings)))
}

/// List the listings offered by one provider
pub async fn provider_listings(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<String>,
) -> AppResult<Json<ApiResponse<Vec<ListingResponse>>>> {
    let provider = user_account::Entity::find_by_id(user_id.clone())
        .one(&state.db)
        .await?;

    let listings = listing::Entity::find()
        .filter(listing::Column::UserId.eq(user_id))
        .order_by_desc(listing::Column::CreatedAt)
        .order_by_desc(listing::Column::ListingId)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|l| ListingResponse::new(l, provider.as_ref()))
        .collect();

    Ok(Json(ApiResponse::ok(listings)))
}

/// Identify the caller when a valid session token is attached; anonymous
/// otherwise.
async fn optional_viewer(
    state: &AppState,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Option<String> {
    let TypedHeader(auth) = bearer?;
    let claims = verify_token(auth.token(), &state.config.jwt_secret).ok()?;
    session::validate(&state.db, &claims).await.ok()?;
    Some(claims.sub)
}

/// Listing detail; every fetch by someone other than the owner counts as a view
pub async fn get_listing(
    State(state): State<AppState>,
    AppPath(listing_id): AppPath<i32>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> AppResult<Json<ApiResponse<ListingResponse>>> {
    let (listing, provider) = listing::Entity::find_by_id(listing_id)
        .find_also_related(user_account::Entity)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

    let viewer = optional_viewer(&state, bearer).await;
    if viewer.as_deref() != Some(listing.user_id.as_str()) {
        let view = listing_view::ActiveModel {
            listing_id: Set(listing.listing_id),
            viewer_id: Set(viewer),
            viewed_at: Set(Utc::now()),
            ..Default::default()
        };
        // A lost view is not worth failing the read for.
        if let Err(e) = view.insert(&state.db).await {
            tracing::warn!(listing_id, error = %e, "Failed to record listing view");
        }
    }

    Ok(Json(ApiResponse::ok(ListingResponse::new(
        listing,
        provider.as_ref(),
    ))))
}

// ============ Categories ============

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub search: Option<String>,
}

/// List categories. A search shaped like a category code is tried as an
/// exact code first, then as a substring of name or code.
pub async fn list_categories(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CategoryQuery>,
) -> AppResult<Json<ApiResponse<Vec<category::Model>>>> {
    let search = non_empty(query.search.as_ref());

    if let Some(code) = search.filter(|s| is_category_code(s)) {
        if let Some(found) = category::Entity::find_by_id(code.to_uppercase())
            .one(&state.db)
            .await?
        {
            return Ok(Json(ApiResponse::ok(vec![found])));
        }
    }

    let categories = category::Entity::find()
        .order_by_asc(category::Column::CategoryCode)
        .all(&state.db)
        .await?
        .into_iter()
        .filter(|c| {
            search.is_none_or(|s| {
                matches_search(s, &[c.category_name.as_str(), c.category_code.as_str()])
            })
        })
        .collect();

    Ok(Json(ApiResponse::ok(categories)))
}

pub async fn get_category(
    State(state): State<AppState>,
    AppPath(code): AppPath<String>,
) -> AppResult<Json<ApiResponse<category::Model>>> {
    let category = category::Entity::find_by_id(code.to_uppercase())
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    Ok(Json(ApiResponse::ok(category)))
}

// ============ Availability ============

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub provider_id: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub provider_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub bookings: Vec<Slot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_times: Option<Vec<NaiveTime>>,
}

/// Occupied slots of a provider, for one date or from today onward
pub async fn availability(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<AvailabilityQuery>,
) -> AppResult<Json<ApiResponse<AvailabilityResponse>>> {
    let date = non_empty(query.date.as_ref()).map(parse_date).transpose()?;

    let Some(provider_id) = non_empty(query.provider_id.as_ref()) else {
        return Ok(Json(ApiResponse::ok(AvailabilityResponse {
            provider_id: None,
            date,
            bookings: Vec::new(),
            available_times: None,
        })));
    };

    let today = Utc::now().date_naive();
    let bookings = occupied_slots(&state.db, provider_id, date, today).await?;
    let available_times =
        date.map(|d| free_slots(state.config.business_hours(), d, &bookings));

    Ok(Json(ApiResponse::ok(AvailabilityResponse {
        provider_id: Some(provider_id.to_string()),
        date,
        bookings,
        available_times,
    })))
}
