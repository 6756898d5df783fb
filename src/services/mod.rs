pub mod accounts;
pub mod booking;
pub mod session;
pub mod stats;
