use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter,
    QuerySelect, Set, SqlErr, TransactionTrait,
};
use serde::Deserialize;

use crate::entities::{category, listing};
use crate::error::{AppError, AppResult};
use crate::services::stats::{platform_report, report_range, Report, ReportPeriod};
use crate::utils::extractor::{AppJson, AppPath, AppQuery};
use crate::utils::response::ApiResponse;
use crate::utils::validation::{is_category_code, non_empty, parse_date};
use crate::AppState;

// ============ Categories ============

const CATEGORY_PREFIX: &str = "CAT";

/// Next code in the `CAT001`, `CAT002`, ... sequence.
pub fn next_category_code<'a>(existing: impl IntoIterator<Item = &'a str>) -> String {
    let max = existing
        .into_iter()
        .filter_map(|code| code.strip_prefix(CATEGORY_PREFIX))
        .filter_map(|digits| digits.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{:03}", CATEGORY_PREFIX, max + 1)
}

fn category_exists() -> AppError {
    AppError::Conflict("A category with this code or name already exists".to_string())
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub category_code: Option<String>,
    pub category_name: Option<String>,
    pub description: Option<String>,
}

pub async fn create_category(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<category::Model>>)> {
    let name = non_empty(payload.category_name.as_ref())
        .ok_or_else(|| AppError::BadRequest("Category name is required".to_string()))?;

    let code = match non_empty(payload.category_code.as_ref()) {
        Some(code) if is_category_code(code) => code.to_uppercase(),
        Some(_) => {
            return Err(AppError::BadRequest(
                "Category code must look like CAT001".to_string(),
            ))
        }
        None => {
            let codes: Vec<String> = category::Entity::find()
                .select_only()
                .column(category::Column::CategoryCode)
                .into_tuple()
                .all(&state.db)
                .await?;
            next_category_code(codes.iter().map(String::as_str))
        }
    };

    let duplicate = category::Entity::find()
        .filter(
            Condition::any()
                .add(category::Column::CategoryCode.eq(code.as_str()))
                .add(category::Column::CategoryName.eq(name)),
        )
        .one(&state.db)
        .await?;
    if duplicate.is_some() {
        return Err(category_exists());
    }

    let category = category::ActiveModel {
        category_code: Set(code),
        category_name: Set(name.to_string()),
        description: Set(non_empty(payload.description.as_ref())
            .unwrap_or_default()
            .to_string()),
    }
    .insert(&state.db)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => category_exists(),
        _ => AppError::from(e),
    })?;

    tracing::info!(
        code = %category.category_code,
        name = %category.category_name,
        "Category created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(category, "Category created")),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub category_name: Option<String>,
    pub description: Option<String>,
}

/// Rename or describe a category; a rename relabels its listings
pub async fn update_category(
    State(state): State<AppState>,
    AppPath(code): AppPath<String>,
    AppJson(payload): AppJson<UpdateCategoryRequest>,
) -> AppResult<Json<ApiResponse<category::Model>>> {
    let new_name = non_empty(payload.category_name.as_ref());
    if new_name.is_none() && payload.description.is_none() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let txn = state.db.begin().await?;

    let existing = category::Entity::find_by_id(code.to_uppercase())
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
    let old_name = existing.category_name.clone();

    if let Some(name) = new_name.filter(|n| *n != old_name) {
        let taken = category::Entity::find()
            .filter(category::Column::CategoryName.eq(name))
            .one(&txn)
            .await?
            .is_some();
        if taken {
            return Err(category_exists());
        }

        listing::Entity::update_many()
            .col_expr(listing::Column::Category, Expr::value(name))
            .filter(listing::Column::Category.eq(old_name.as_str()))
            .exec(&txn)
            .await?;
    }

    let mut active: category::ActiveModel = existing.into();
    if let Some(name) = new_name {
        active.category_name = Set(name.to_string());
    }
    if let Some(description) = &payload.description {
        active.description = Set(description.trim().to_string());
    }
    let category = active.update(&txn).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => category_exists(),
        _ => AppError::from(e),
    })?;

    txn.commit().await?;

    tracing::info!(
        code = %category.category_code,
        from = %old_name,
        to = %category.category_name,
        "Category updated"
    );
    Ok(Json(ApiResponse::ok_with_message(category, "Category updated")))
}

/// Delete a category and clear the label on its listings
pub async fn delete_category(
    State(state): State<AppState>,
    AppPath(code): AppPath<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let txn = state.db.begin().await?;

    let existing = category::Entity::find_by_id(code.to_uppercase())
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    let cleared = listing::Entity::update_many()
        .col_expr(listing::Column::Category, Expr::value(Option::<String>::None))
        .filter(listing::Column::Category.eq(existing.category_name.as_str()))
        .exec(&txn)
        .await?;

    category::Entity::delete_by_id(existing.category_code.clone())
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        code = %existing.category_code,
        listings_cleared = cleared.rows_affected,
        "Category deleted"
    );
    Ok(Json(ApiResponse::message("Category deleted")))
}

// ============ Reports ============

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Daily, weekly or monthly category report
pub async fn report(
    State(state): State<AppState>,
    AppPath(period): AppPath<String>,
    AppQuery(query): AppQuery<ReportQuery>,
) -> AppResult<Json<ApiResponse<Report>>> {
    let period: ReportPeriod = period.parse()?;
    let start_date = non_empty(query.start_date.as_ref())
        .map(parse_date)
        .transpose()?;
    let end_date = non_empty(query.end_date.as_ref())
        .map(parse_date)
        .transpose()?;

    let (start_date, end_date) =
        report_range(period, start_date, end_date, Utc::now().date_naive())?;

    tracing::debug!(period = period.as_str(), %start_date, %end_date, "Building report");

    let report = platform_report(&state.db, period, start_date, end_date).await?;
    Ok(Json(ApiResponse::ok(report)))
}
