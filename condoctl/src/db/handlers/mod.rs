//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or an open
//! transaction) and exposes strongly-typed operations returning the records in
//! [`crate::db::models`]. Table-backed entities with a full lifecycle implement the
//! [`Repository`] trait; append-only or aggregate-only tables expose plain methods.
//!
//! # Available Repositories
//!
//! - [`Users`]: accounts joined with their profile (role, full name, phone)
//! - [`Units`]: condominium units and their owners
//! - [`Vehicles`], [`Pets`], [`FamilyMembers`]: a resident's household
//! - [`ExpenseTypes`], [`Fees`], [`Payments`]: billing
//! - [`NoticeCategories`], [`Notices`]: the notice board
//! - [`CommonAreas`], [`Reservations`]: bookable amenities
//! - [`MaintenanceRequests`], [`MaintenanceComments`], [`MaintenanceAttachments`]: ticketing
//! - [`Notifications`], [`ActivityLogs`]: per-user inbox and audit trail
//! - [`Reports`]: dashboard counters and the finance report
//!
//! # Common Pattern
//!
//! ```ignore
//! use condoctl::db::handlers::{Fees, Repository};
//!
//! async fn example(pool: &sqlx::PgPool, fee_id: FeeId) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut fees = Fees::new(&mut tx);
//!
//!     if let Some(fee) = fees.lock_for_update(fee_id).await? {
//!         println!("{} owes {}", fee.unit_code, fee.amount);
//!     }
//!
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod activity_logs;
pub mod common_areas;
pub mod expense_types;
pub mod fees;
pub mod file_storage;
pub mod households;
pub mod maintenance;
pub mod notices;
pub mod notifications;
pub mod payments;
pub mod reports;
pub mod repository;
pub mod reservations;
pub mod units;
pub mod users;

pub use activity_logs::ActivityLogs;
pub use common_areas::CommonAreas;
pub use expense_types::ExpenseTypes;
pub use fees::Fees;
pub use households::{FamilyMembers, Pets, Vehicles};
pub use maintenance::{MaintenanceAttachments, MaintenanceComments, MaintenanceRequests};
pub use notices::{NoticeCategories, Notices};
pub use notifications::Notifications;
pub use payments::Payments;
pub use reports::Reports;
pub use repository::Repository;
pub use reservations::Reservations;
pub use units::Units;
pub use users::Users;

/// `LIKE` pattern matching `search` as a lowercase substring, with `%` and `_` taken literally
pub(crate) fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
