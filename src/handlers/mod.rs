pub mod auth;
pub mod bookings;
pub mod catalog;
pub mod home_cleaner;
pub mod home_owner;
pub mod platform_manager;
pub mod user_admin;
