//! Database models: the request and response shapes exchanged with the repositories.

pub mod common_areas;
pub mod fees;
pub mod file_storage;
pub mod households;
pub mod maintenance;
pub mod notices;
pub mod notifications;
pub mod reports;
pub mod units;
pub mod users;
