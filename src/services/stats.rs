use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;

use crate::entities::service_booking::{self, BookingStatus};
use crate::entities::{listing, listing_view, shortlisted_listing};
use crate::error::{AppError, AppResult};

const UNCATEGORIZED: &str = "Uncategorized";

// ============ Cleaner service stats ============

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ViewCounts {
    pub day: u64,
    pub week: u64,
    pub month: u64,
    pub total: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct BookingCounts {
    pub pending_approval: u64,
    pub approved: u64,
    pub completed: u64,
    pub cancelled: u64,
}

impl BookingCounts {
    fn record(&mut self, status: BookingStatus) {
        match status {
            BookingStatus::PendingApproval => self.pending_approval += 1,
            BookingStatus::Approved => self.approved += 1,
            BookingStatus::Completed => self.completed += 1,
            BookingStatus::Cancelled => self.cancelled += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub listing_id: i32,
    pub title: String,
    pub shortlist_count: u64,
    pub views: ViewCounts,
    pub bookings: BookingCounts,
}

/// Per-listing shortlist, view and booking counts for one cleaner.
pub async fn service_stats(
    db: &DatabaseConnection,
    provider_id: &str,
) -> AppResult<Vec<ServiceStats>> {
    let listings = listing::Entity::find()
        .filter(listing::Column::UserId.eq(provider_id))
        .all(db)
        .await?;
    let ids: Vec<i32> = listings.iter().map(|l| l.listing_id).collect();

    let shortlists = shortlisted_listing::Entity::find()
        .filter(shortlisted_listing::Column::ListingId.is_in(ids.clone()))
        .all(db)
        .await?;
    let views = listing_view::Entity::find()
        .filter(listing_view::Column::ListingId.is_in(ids.clone()))
        .all(db)
        .await?;
    let bookings = service_booking::Entity::find()
        .filter(service_booking::Column::ListingId.is_in(ids))
        .all(db)
        .await?;

    let now = Utc::now();
    Ok(listings
        .into_iter()
        .map(|l| {
            let shortlist_count = shortlists
                .iter()
                .filter(|s| s.listing_id == l.listing_id)
                .count() as u64;

            let view_times: Vec<DateTime<Utc>> = views
                .iter()
                .filter(|v| v.listing_id == l.listing_id)
                .map(|v| v.viewed_at)
                .collect();

            let mut booking_counts = BookingCounts::default();
            bookings
                .iter()
                .filter(|b| b.listing_id == l.listing_id)
                .for_each(|b| booking_counts.record(b.status));

            ServiceStats {
                listing_id: l.listing_id,
                title: l.title,
                shortlist_count,
                views: count_views(&view_times, now),
                bookings: booking_counts,
            }
        })
        .collect())
}

pub fn count_views(viewed_at: &[DateTime<Utc>], now: DateTime<Utc>) -> ViewCounts {
    let within = |days: i64| {
        let since = now - Duration::days(days);
        viewed_at.iter().filter(|t| **t >= since).count() as u64
    };

    ViewCounts {
        day: within(1),
        week: within(7),
        month: within(30),
        total: viewed_at.len() as u64,
    }
}

// ============ Platform reports ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl ReportPeriod {
    /// Days covered when no start date is given.
    pub fn default_span_days(&self) -> i64 {
        match self {
            ReportPeriod::Daily => 7,
            ReportPeriod::Weekly => 28,
            ReportPeriod::Monthly => 90,
        }
    }

    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            ReportPeriod::Daily => date,
            ReportPeriod::Weekly => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            ReportPeriod::Monthly => date.with_day(1).unwrap_or(date),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::Daily => "daily",
            ReportPeriod::Weekly => "weekly",
            ReportPeriod::Monthly => "monthly",
        }
    }

    pub fn label(&self, bucket: NaiveDate) -> String {
        match self {
            ReportPeriod::Daily => bucket.format("%Y-%m-%d").to_string(),
            ReportPeriod::Weekly => {
                let week = bucket.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            ReportPeriod::Monthly => bucket.format("%Y-%m").to_string(),
        }
    }
}

impl FromStr for ReportPeriod {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "daily" => Ok(ReportPeriod::Daily),
            "weekly" => Ok(ReportPeriod::Weekly),
            "monthly" => Ok(ReportPeriod::Monthly),
            other => Err(AppError::BadRequest(format!(
                "Invalid report period '{}'. Must be one of: daily, weekly, monthly",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub category_name: String,
    pub period: String,
    pub views: u64,
    pub bookings: u64,
    pub completed_bookings: u64,
    pub revenue: f64,
    pub conversion_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportSummary {
    pub total_views: u64,
    pub total_bookings: u64,
    pub completed_bookings: u64,
    pub total_revenue: f64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub period: ReportPeriod,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub summary: ReportSummary,
    pub details: Vec<ReportRow>,
}

/// Facts the report is built from, already resolved to a category label.
#[derive(Debug, Clone)]
pub struct ViewFact {
    pub category: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct BookingFact {
    pub category: String,
    pub date: NaiveDate,
    pub status: BookingStatus,
    pub price: f64,
}

#[derive(Default)]
struct Tally {
    views: u64,
    bookings: u64,
    completed: u64,
    revenue: f64,
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        (part / whole * 10000.0).round() / 100.0
    }
}

/// Bucket views and bookings per (category, period). Bookings count by their
/// scheduled date and exclude cancellations; revenue is the listing price of
/// completed bookings.
pub fn build_report(
    period: ReportPeriod,
    start_date: NaiveDate,
    end_date: NaiveDate,
    views: &[ViewFact],
    bookings: &[BookingFact],
) -> Report {
    let in_range = |d: NaiveDate| d >= start_date && d <= end_date;
    let mut tallies: BTreeMap<(String, NaiveDate), Tally> = BTreeMap::new();

    for v in views.iter().filter(|v| in_range(v.date)) {
        tallies
            .entry((v.category.clone(), period.bucket_start(v.date)))
            .or_default()
            .views += 1;
    }

    for b in bookings
        .iter()
        .filter(|b| in_range(b.date) && b.status.occupies_slot())
    {
        let tally = tallies
            .entry((b.category.clone(), period.bucket_start(b.date)))
            .or_default();
        tally.bookings += 1;
        if b.status == BookingStatus::Completed {
            tally.completed += 1;
            tally.revenue += b.price;
        }
    }

    let mut summary = ReportSummary::default();
    let mut details = Vec::with_capacity(tallies.len());

    // Growth is against the calendar month before, in the same category; a
    // month without bookings (or outside the window) gives no growth figure.
    let bookings_in = |category: &str, bucket: NaiveDate| {
        tallies
            .get(&(category.to_string(), bucket))
            .map_or(0, |t| t.bookings)
    };

    for ((category, bucket), tally) in &tallies {
        let growth = match period {
            ReportPeriod::Monthly => {
                let prev = bookings_in(category, period.bucket_start(*bucket - Duration::days(1)));
                (prev > 0).then(|| percent(tally.bookings as f64 - prev as f64, prev as f64))
            }
            _ => None,
        };

        summary.total_views += tally.views;
        summary.total_bookings += tally.bookings;
        summary.completed_bookings += tally.completed;
        summary.total_revenue += tally.revenue;

        details.push(ReportRow {
            category_name: category.clone(),
            period: period.label(*bucket),
            views: tally.views,
            bookings: tally.bookings,
            completed_bookings: tally.completed,
            revenue: (tally.revenue * 100.0).round() / 100.0,
            conversion_rate: percent(tally.bookings as f64, tally.views as f64),
            growth,
        });
    }

    summary.total_revenue = (summary.total_revenue * 100.0).round() / 100.0;
    summary.conversion_rate = percent(summary.total_bookings as f64, summary.total_views as f64);
    details.sort_by(|a, b| a.period.cmp(&b.period).then(a.category_name.cmp(&b.category_name)));

    Report {
        period,
        start_date,
        end_date,
        summary,
        details,
    }
}

/// Resolve the report window, defaulting to the period's span ending today.
pub fn report_range(
    period: ReportPeriod,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    today: NaiveDate,
) -> AppResult<(NaiveDate, NaiveDate)> {
    let end = end_date.unwrap_or(today);
    let start = start_date.unwrap_or(end - Duration::days(period.default_span_days() - 1));
    if start > end {
        return Err(AppError::BadRequest(
            "start_date must not be after end_date".to_string(),
        ));
    }
    Ok((start, end))
}

/// Load the facts for `[start_date, end_date]` and build the report.
pub async fn platform_report(
    db: &DatabaseConnection,
    period: ReportPeriod,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> AppResult<Report> {
    let listings = listing::Entity::find().all(db).await?;
    let by_id: HashMap<i32, &listing::Model> =
        listings.iter().map(|l| (l.listing_id, l)).collect();
    let category_of = |listing_id: i32| {
        by_id
            .get(&listing_id)
            .and_then(|l| l.category.clone())
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    };

    let window_start = start_date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| AppError::BadRequest("Invalid start_date".to_string()))?;
    let window_end = (end_date + Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| AppError::BadRequest("Invalid end_date".to_string()))?;

    let views: Vec<ViewFact> = listing_view::Entity::find()
        .filter(listing_view::Column::ViewedAt.gte(window_start))
        .filter(listing_view::Column::ViewedAt.lt(window_end))
        .all(db)
        .await?
        .into_iter()
        .map(|v| ViewFact {
            category: category_of(v.listing_id),
            date: v.viewed_at.date_naive(),
        })
        .collect();

    let bookings: Vec<BookingFact> = service_booking::Entity::find()
        .filter(service_booking::Column::ScheduledDate.gte(start_date))
        .filter(service_booking::Column::ScheduledDate.lte(end_date))
        .all(db)
        .await?
        .into_iter()
        .map(|b| BookingFact {
            category: category_of(b.listing_id),
            date: b.scheduled_date,
            status: b.status,
            price: by_id.get(&b.listing_id).map(|l| l.price).unwrap_or_default(),
        })
        .collect();

    Ok(build_report(period, start_date, end_date, &views, &bookings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn view(category: &str, d: NaiveDate) -> ViewFact {
        ViewFact {
            category: category.to_string(),
            date: d,
        }
    }

    fn booking(category: &str, d: NaiveDate, status: BookingStatus, price: f64) -> BookingFact {
        BookingFact {
            category: category.to_string(),
            date: d,
            status,
            price,
        }
    }

    #[test]
    fn buckets_follow_the_period() {
        let wed = date(2025, 6, 4);
        assert_eq!(ReportPeriod::Daily.bucket_start(wed), wed);
        assert_eq!(ReportPeriod::Weekly.bucket_start(wed), date(2025, 6, 2));
        assert_eq!(ReportPeriod::Monthly.bucket_start(wed), date(2025, 6, 1));
        assert_eq!(ReportPeriod::Weekly.label(date(2025, 6, 2)), "2025-W23");
        assert_eq!(ReportPeriod::Monthly.label(date(2025, 6, 1)), "2025-06");
    }

    #[test]
    fn daily_report_counts_views_bookings_and_revenue() {
        let d = date(2025, 6, 1);
        let views = vec![view("Deep Cleaning", d); 4];
        let bookings = vec![
            booking("Deep Cleaning", d, BookingStatus::Completed, 80.0),
            booking("Deep Cleaning", d, BookingStatus::Approved, 80.0),
            booking("Deep Cleaning", d, BookingStatus::Cancelled, 80.0),
        ];

        let report = build_report(ReportPeriod::Daily, d, d, &views, &bookings);
        assert_eq!(report.details.len(), 1);
        let row = &report.details[0];
        assert_eq!(row.views, 4);
        assert_eq!(row.bookings, 2);
        assert_eq!(row.completed_bookings, 1);
        assert_eq!(row.revenue, 80.0);
        assert_eq!(row.conversion_rate, 50.0);
        assert_eq!(report.summary.total_revenue, 80.0);
    }

    #[test]
    fn facts_outside_the_window_are_ignored() {
        let views = vec![view("Carpet Cleaning", date(2025, 5, 31))];
        let report = build_report(
            ReportPeriod::Daily,
            date(2025, 6, 1),
            date(2025, 6, 7),
            &views,
            &[],
        );
        assert!(report.details.is_empty());
        assert_eq!(report.summary.conversion_rate, 0.0);
    }

    #[test]
    fn monthly_growth_compares_with_previous_month() {
        let bookings = vec![
            booking("Window Cleaning", date(2025, 5, 10), BookingStatus::Completed, 50.0),
            booking("Window Cleaning", date(2025, 5, 11), BookingStatus::Completed, 50.0),
            booking("Window Cleaning", date(2025, 6, 10), BookingStatus::Approved, 50.0),
            booking("Window Cleaning", date(2025, 6, 12), BookingStatus::Approved, 50.0),
            booking("Window Cleaning", date(2025, 6, 13), BookingStatus::Approved, 50.0),
        ];

        let report = build_report(
            ReportPeriod::Monthly,
            date(2025, 5, 1),
            date(2025, 6, 30),
            &[],
            &bookings,
        );
        assert_eq!(report.details.len(), 2);
        assert_eq!(report.details[0].period, "2025-05");
        assert_eq!(report.details[0].growth, None);
        assert_eq!(report.details[1].period, "2025-06");
        assert_eq!(report.details[1].growth, Some(50.0));
    }

    #[test]
    fn monthly_growth_skips_over_an_empty_month() {
        let bookings = vec![
            booking("Oven Cleaning", date(2025, 1, 5), BookingStatus::Completed, 40.0),
            booking("Oven Cleaning", date(2025, 1, 6), BookingStatus::Completed, 40.0),
            booking("Oven Cleaning", date(2025, 3, 7), BookingStatus::Approved, 40.0),
            booking("Oven Cleaning", date(2025, 4, 2), BookingStatus::Approved, 40.0),
            booking("Oven Cleaning", date(2025, 4, 3), BookingStatus::Approved, 40.0),
        ];

        let report = build_report(
            ReportPeriod::Monthly,
            date(2025, 1, 1),
            date(2025, 4, 30),
            &[],
            &bookings,
        );
        let periods: Vec<_> = report.details.iter().map(|r| r.period.as_str()).collect();
        assert_eq!(periods, ["2025-01", "2025-03", "2025-04"]);
        // February had nothing, so March is not compared with January
        assert_eq!(report.details[1].growth, None);
        assert_eq!(report.details[2].growth, Some(100.0));
    }

    #[test]
    fn default_range_ends_today() {
        let today = date(2025, 6, 30);
        let (start, end) = report_range(ReportPeriod::Daily, None, None, today).unwrap();
        assert_eq!(end, today);
        assert_eq!(start, date(2025, 6, 24));

        assert!(report_range(ReportPeriod::Daily, Some(today), Some(date(2025, 6, 1)), today).is_err());
        assert!("yearly".parse::<ReportPeriod>().is_err());
        assert_eq!("weekly".parse::<ReportPeriod>().unwrap(), ReportPeriod::Weekly);
    }

    #[test]
    fn view_windows() {
        let now = Utc::now();
        let times = [
            now - Duration::hours(2),
            now - Duration::days(3),
            now - Duration::days(20),
            now - Duration::days(90),
        ];
        let counts = count_views(&times, now);
        assert_eq!(
            counts,
            ViewCounts {
                day: 1,
                week: 2,
                month: 3,
                total: 4
            }
        );
    }
}
