//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/authentication/*`): Login, token refresh and logout
//! - **Caller and users** (`/api/v1/me`, `/api/v1/users/*`): Profiles and user administration
//! - **Units and households** (`/api/v1/units/*`, `/api/v1/vehicles/*`, `/api/v1/pets/*`, `/api/v1/family-members/*`)
//! - **Billing** (`/api/v1/expense-types/*`, `/api/v1/fees/*`): Fees, payments and checkout
//! - **Community** (`/api/v1/notices/*`, `/api/v1/common-areas/*`, `/api/v1/reservations/*`)
//! - **Maintenance** (`/api/v1/maintenance-requests/*`): Requests, comments and attachments
//! - **Inbox and audit** (`/api/v1/notifications/*`, `/api/v1/activity-logs/*`)
//! - **Reports** (`/api/v1/dashboard/stats`, `/api/v1/reports/finance`)
//! - **Payment webhook** (`/webhooks/payments`)
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa` annotations. The rendered reference is served
//! at `/api/docs` when the server is running.

pub mod handlers;
pub mod models;
