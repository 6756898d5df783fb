pub mod category;
pub mod listing;
pub mod listing_view;
pub mod service_booking;
pub mod shortlisted_listing;
pub mod user_account;
