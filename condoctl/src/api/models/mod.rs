//! API request and response data models.
//!
//! These structures define the public HTTP contract. They are kept separate from the
//! database models in [`crate::db::models`] so storage and API can evolve independently,
//! and every type is annotated with `utoipa` for the generated OpenAPI document.
//!
//! - [`auth`]: login, refresh and logout payloads
//! - [`users`]: accounts, profiles and roles
//! - [`units`], [`households`]: property registry
//! - [`fees`]: expense types, fees, payments
//! - [`notices`], [`common_areas`], [`maintenance`]: community features
//! - [`notifications`]: in-app notifications and activity log
//! - [`reports`]: dashboard and finance report
//! - [`payments`]: payment gateway responses
//! - [`pagination`]: shared `skip`/`limit` handling

pub mod auth;
pub mod common_areas;
pub mod fees;
pub mod households;
pub mod maintenance;
pub mod notices;
pub mod notifications;
pub mod pagination;
pub mod payments;
pub mod reports;
pub mod units;
pub mod users;
