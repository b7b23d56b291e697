//! HTTP request handlers for all API endpoints.
//!
//! This module contains Axum route handlers organized by resource type.
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Authentication and authorization checks
//! - Business logic execution via database repositories
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`auth`]: Login, token refresh and logout
//! - [`me`]: The caller's own account and profile
//! - [`users`]: User administration
//! - [`units`]: Condominium units and their owners
//! - [`households`]: Vehicles, pets and family members of residents
//! - [`expense_types`], [`fees`]: Billing, payments and checkout preferences
//! - [`notices`]: Notice board and its categories
//! - [`common_areas`], [`reservations`]: Bookable amenities
//! - [`maintenance`]: Maintenance requests with comments and attachments
//! - [`notifications`]: Per-user inbox
//! - [`activity_logs`]: Audit trail and page-access tracking
//! - [`reports`]: Admin dashboard and finance report
//! - [`webhooks`]: Payment gateway notifications
//!
//! # Authentication
//!
//! Handlers take a [`crate::auth::permissions::RequiresPermission`] or
//! [`crate::api::models::users::CurrentUser`] extractor, which reads the bearer token or the
//! session cookie and rejects the request before the handler body runs.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which automatically converts to
//! appropriate HTTP status codes and error bodies.

pub mod activity_logs;
pub mod auth;
pub mod common_areas;
pub mod expense_types;
pub mod fees;
pub mod households;
pub mod maintenance;
pub mod me;
pub mod notices;
pub mod notifications;
pub mod reports;
pub mod reservations;
pub mod units;
pub mod users;
pub mod webhooks;
