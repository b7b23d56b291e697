//! # condoctl: condominium management backend
//!
//! `condoctl` is the HTTP backend of a residential condominium. Administrators manage units
//! and their owners, bill monthly fees per expense type, publish notices and run the
//! maintenance desk. Residents see their own units, pay their fees, book common areas and
//! report maintenance issues. Staff work the maintenance queue.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for all persistence. Every request carries a session, either as a bearer
//! access token or as the session cookie set on login, and handlers authorize it through the
//! role-based permission extractors in [`auth::permissions`].
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) exposes the authentication routes at `/authentication/*`, the
//! payment gateway webhook at `/webhooks/payments` and the management API at `/api/v1/*`.
//!
//! The **authentication layer** ([`auth`]) issues and verifies access and refresh tokens,
//! hashes passwords and maps roles to permissions.
//!
//! The **database layer** ([`db`]) uses the repository pattern. Each entity (users, units,
//! fees, reservations and so on) has a repository wrapping a connection or a transaction.
//!
//! **Billing** ([`billing`]) records payments against fees and keeps fee status consistent
//! with the amount paid. Checkout links come from a pluggable [`payment_providers`] gateway.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use condoctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = condoctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     condoctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod billing;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod payment_providers;
pub mod seed;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::{handlers, models::users::Role},
    auth::password,
    config::CorsOrigin,
    db::handlers::{Repository, Users, file_storage::FileStorage},
    db::models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    openapi::ApiDoc,
    payment_providers::PaymentProvider,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue, Method},
    routing::{delete, get, patch, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::UserId;

/// Headroom on top of `attachments.max_file_size` for the multipart framing
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .file_storage(file_storage)
///     .payment_provider(payment_provider)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Blob store for maintenance attachments
    pub file_storage: Arc<dyn FileStorage>,
    pub payment_provider: Arc<dyn PaymentProvider>,
}

/// Get the condoctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Make sure the configured administrator account exists.
///
/// Idempotent: an existing account (matched by username, then email) is switched back to an
/// active ADMIN, and its password is replaced when one is configured.
#[instrument(skip_all, fields(username = %config.admin_username))]
pub async fn create_initial_admin_user(config: &Config, db: &PgPool) -> anyhow::Result<UserId> {
    let password_hash = match config.admin_password.as_deref() {
        Some(pwd) => Some(password::hash_password_async(pwd.to_string()).await?),
        None => None,
    };

    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    let existing = match user_repo.get_user_by_username(&config.admin_username).await? {
        Some(user) => Some(user),
        None => user_repo.get_user_by_email(&config.admin_email).await?,
    };

    let user_id = match existing {
        Some(user) => {
            let update = UserUpdateDBRequest {
                password_hash,
                is_active: Some(true),
                role: Some(Role::Admin),
                ..Default::default()
            };
            user_repo.update(user.id, &update).await?;
            debug!("Initial admin user already exists, refreshed");
            user.id
        }
        None => {
            let created = user_repo
                .create(&UserCreateDBRequest {
                    username: config.admin_username.clone(),
                    email: config.admin_email.clone(),
                    password_hash,
                    full_name: Some("Administrator".to_string()),
                    phone: None,
                    role: Role::Admin,
                })
                .await?;
            info!("Created initial admin user");
            created.id
        }
    };

    tx.commit().await?;
    Ok(user_id)
}

/// Connect to the configured database, run migrations and bootstrap the admin account
async fn setup_database(config: &Config, pool: Option<PgPool>) -> anyhow::Result<PgPool> {
    let pool = match pool {
        Some(pool) => pool,
        None => {
            let settings = &config.database.pool;
            let mut options = PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .min_connections(settings.min_connections)
                .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));
            // Zero disables the timeout
            if settings.idle_timeout_secs > 0 {
                options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
            }
            if settings.max_lifetime_secs > 0 {
                options = options.max_lifetime(Duration::from_secs(settings.max_lifetime_secs));
            }
            options.connect(&config.database.url).await?
        }
    };

    migrator().run(&pool).await?;

    create_initial_admin_user(config, &pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION, http::header::CONTENT_DISPOSITION]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Routes under `/api/v1`
fn api_routes(config: &Config) -> Router<AppState> {
    let upload_limit = usize::try_from(config.attachments.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        // Caller
        .route("/me", get(handlers::me::get_me))
        .route("/me/profile", patch(handlers::me::update_my_profile))
        // Users
        .route("/users", get(handlers::users::list_users).post(handlers::users::create_user))
        .route("/users/staff-members", get(handlers::users::list_staff_members))
        .route(
            "/users/{user_id}",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        // Units and households
        .route("/units", get(handlers::units::list_units).post(handlers::units::create_unit))
        .route(
            "/units/{unit_id}",
            get(handlers::units::get_unit)
                .patch(handlers::units::update_unit)
                .delete(handlers::units::delete_unit),
        )
        .route(
            "/vehicles",
            get(handlers::households::list_vehicles).post(handlers::households::create_vehicle),
        )
        .route(
            "/vehicles/{vehicle_id}",
            get(handlers::households::get_vehicle)
                .patch(handlers::households::update_vehicle)
                .delete(handlers::households::delete_vehicle),
        )
        .route("/pets", get(handlers::households::list_pets).post(handlers::households::create_pet))
        .route(
            "/pets/{pet_id}",
            get(handlers::households::get_pet)
                .patch(handlers::households::update_pet)
                .delete(handlers::households::delete_pet),
        )
        .route(
            "/family-members",
            get(handlers::households::list_family_members).post(handlers::households::create_family_member),
        )
        .route(
            "/family-members/{member_id}",
            get(handlers::households::get_family_member)
                .patch(handlers::households::update_family_member)
                .delete(handlers::households::delete_family_member),
        )
        // Billing
        .route(
            "/expense-types",
            get(handlers::expense_types::list_expense_types).post(handlers::expense_types::create_expense_type),
        )
        .route(
            "/expense-types/{expense_type_id}",
            get(handlers::expense_types::get_expense_type)
                .patch(handlers::expense_types::update_expense_type)
                .delete(handlers::expense_types::delete_expense_type),
        )
        .route("/fees", get(handlers::fees::list_fees).post(handlers::fees::create_fee))
        .route("/fees/issue", post(handlers::fees::issue_fees))
        .route("/fees/mark-overdue", post(handlers::fees::mark_overdue))
        .route(
            "/fees/{fee_id}",
            get(handlers::fees::get_fee)
                .patch(handlers::fees::update_fee)
                .delete(handlers::fees::delete_fee),
        )
        .route("/fees/{fee_id}/pay", post(handlers::fees::pay_fee))
        .route("/fees/{fee_id}/payments", get(handlers::fees::list_fee_payments))
        .route("/fees/{fee_id}/payment-preference", post(handlers::fees::create_payment_preference))
        // Notice board
        .route(
            "/notice-categories",
            get(handlers::notices::list_notice_categories).post(handlers::notices::create_notice_category),
        )
        .route(
            "/notice-categories/{category_id}",
            get(handlers::notices::get_notice_category)
                .patch(handlers::notices::update_notice_category)
                .delete(handlers::notices::delete_notice_category),
        )
        .route("/notices", get(handlers::notices::list_notices).post(handlers::notices::create_notice))
        .route(
            "/notices/{notice_id}",
            get(handlers::notices::get_notice)
                .patch(handlers::notices::update_notice)
                .delete(handlers::notices::delete_notice),
        )
        // Common areas
        .route(
            "/common-areas",
            get(handlers::common_areas::list_common_areas).post(handlers::common_areas::create_common_area),
        )
        .route(
            "/common-areas/{area_id}",
            get(handlers::common_areas::get_common_area)
                .patch(handlers::common_areas::update_common_area)
                .delete(handlers::common_areas::delete_common_area),
        )
        .route(
            "/reservations",
            get(handlers::reservations::list_reservations).post(handlers::reservations::create_reservation),
        )
        .route(
            "/reservations/{reservation_id}",
            get(handlers::reservations::get_reservation)
                .patch(handlers::reservations::update_reservation)
                .delete(handlers::reservations::delete_reservation),
        )
        // Maintenance
        .route(
            "/maintenance-requests",
            get(handlers::maintenance::list_maintenance_requests).post(handlers::maintenance::create_maintenance_request),
        )
        .route(
            "/maintenance-requests/{request_id}",
            get(handlers::maintenance::get_maintenance_request)
                .patch(handlers::maintenance::update_maintenance_request)
                .delete(handlers::maintenance::delete_maintenance_request),
        )
        .route(
            "/maintenance-requests/{request_id}/comments",
            get(handlers::maintenance::list_comments).post(handlers::maintenance::create_comment),
        )
        .route(
            "/maintenance-requests/{request_id}/comments/{comment_id}",
            delete(handlers::maintenance::delete_comment),
        )
        .route(
            "/maintenance-requests/{request_id}/attachments",
            get(handlers::maintenance::list_attachments)
                .post(handlers::maintenance::upload_attachment)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/maintenance-requests/{request_id}/attachments/{attachment_id}",
            delete(handlers::maintenance::delete_attachment),
        )
        .route(
            "/maintenance-requests/{request_id}/attachments/{attachment_id}/content",
            get(handlers::maintenance::get_attachment_content),
        )
        // Notifications and audit
        .route(
            "/notifications",
            get(handlers::notifications::list_notifications).post(handlers::notifications::create_notification),
        )
        .route("/notifications/mark-all-as-read", post(handlers::notifications::mark_all_as_read))
        .route(
            "/notifications/{notification_id}",
            get(handlers::notifications::get_notification)
                .patch(handlers::notifications::update_notification)
                .delete(handlers::notifications::delete_notification),
        )
        .route("/activity-logs", get(handlers::activity_logs::list_activity_logs))
        .route("/activity-logs/{entry_id}", get(handlers::activity_logs::get_activity_log))
        .route("/page-access-logs", post(handlers::activity_logs::log_page_access))
        // Reports
        .route("/dashboard/stats", get(handlers::reports::dashboard_stats))
        .route("/reports/finance", get(handlers::reports::finance_report))
}

/// Build the main application router with all endpoints and middleware.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors_layer = create_cors_layer(&state.config)?;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/authentication/login", post(handlers::auth::login))
        .route("/authentication/refresh", post(handlers::auth::refresh))
        .route("/authentication/logout", post(handlers::auth::logout))
        .route("/webhooks/payments", post(handlers::webhooks::payment_webhook))
        .nest("/api/v1", api_routes(&state.config))
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()))
        .with_state(state)
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// A configured server: database ready, router built, not yet listening.
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Like [`Application::new`], reusing `pool` instead of connecting when one is given
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting condoctl with configuration: {:#?}", config);

        let pool = setup_database(&config, pool).await?;
        let file_storage = db::handlers::file_storage::create_file_storage(&config.attachments).await?;
        let payment_provider: Arc<dyn PaymentProvider> = Arc::from(payment_providers::create_provider(config.payment.clone()));

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .file_storage(file_storage)
            .payment_provider(payment_provider)
            .build();

        let router = build_router(app_state)?;

        Ok(Self { router, config, pool })
    }

    /// The database pool, migrated and bootstrapped
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "condoctl listening on http://{}, API docs at http://localhost:{}/api/docs",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::create_initial_admin_user;
    use crate::{
        api::models::users::Role,
        auth::password,
        db::handlers::{Repository, Users},
        db::models::users::UserUpdateDBRequest,
        test_utils::*,
    };
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_healthz(pool: PgPool) {
        let server = create_test_app(pool).await;
        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_api_requires_session(pool: PgPool) {
        let server = create_test_app(pool).await;
        server.get("/api/v1/me").await.assert_status(StatusCode::UNAUTHORIZED);
        server.get("/api/v1/does-not-exist").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_docs_are_served(pool: PgPool) {
        let server = create_test_app(pool).await;
        server.get("/api/docs").await.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cors_preflight(pool: PgPool) {
        let server = create_test_app(pool).await;
        let response = server
            .method(axum::http::Method::OPTIONS, "/api/v1/me")
            .add_header(HeaderName::from_static("origin"), HeaderValue::from_static("http://localhost:5173"))
            .add_header(HeaderName::from_static("access-control-request-method"), HeaderValue::from_static("GET"))
            .await;
        assert_eq!(
            response.header("access-control-allow-origin"),
            HeaderValue::from_static("http://localhost:5173")
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_initial_admin_user_is_idempotent(pool: PgPool) {
        let mut config = create_test_config();
        config.admin_username = "root".to_string();
        config.admin_email = "root@condo.test".to_string();
        config.admin_password = Some("first-password".to_string());

        let first = create_initial_admin_user(&config, &pool).await.unwrap();

        // Demote and deactivate; the next bootstrap restores both and rotates the password
        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .update(
                first,
                &UserUpdateDBRequest {
                    role: Some(Role::Resident),
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        config.admin_password = Some("second-password".to_string());
        let second = create_initial_admin_user(&config, &pool).await.unwrap();
        assert_eq!(first, second);

        let user = Users::new(&mut conn).get_by_id(second).await.unwrap().unwrap();
        assert_eq!(user.role, Role::Admin);
        assert!(user.is_active);
        let hash = user.password_hash.unwrap();
        assert!(password::verify_password("second-password", &hash).unwrap());

        let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = 'root'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(admins, 1);
    }
}
