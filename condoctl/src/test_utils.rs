//! Test utilities shared by the handler and repository tests.

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role, UserResponse},
    auth::{password, session},
    config::{AttachmentsConfig, Config, DatabaseConfig, PaymentConfig, PoolSettings, SessionConfig},
    db::{
        handlers::{Repository, Users},
        models::users::UserCreateDBRequest,
    },
};
use axum_test::TestServer;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub async fn create_test_app(pool: PgPool) -> TestServer {
    let config = create_test_config();

    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

/// Application state over the given pool, without the HTTP layer
pub async fn create_test_state(pool: PgPool) -> AppState {
    let config = create_test_config();
    let file_storage = crate::db::handlers::file_storage::create_file_storage(&config.attachments)
        .await
        .expect("Failed to create attachment storage");
    let payment_provider = Arc::from(crate::payment_providers::create_provider(config.payment.clone()));

    AppState::builder()
        .db(pool)
        .config(config)
        .file_storage(file_storage)
        .payment_provider(payment_provider)
        .build()
}

pub fn create_test_config() -> Config {
    // Each test gets its own attachment directory
    let storage_dir = std::env::temp_dir().join(format!("condoctl-test-attachments-{}", Uuid::new_v4().simple()));

    let mut config = Config {
        database_url: None,
        database: DatabaseConfig {
            // Will get overriden by the test pool
            url: "Something".to_string(),
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 0,
                ..Default::default()
            },
        },
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_username: "admin".to_string(),
        admin_email: "admin@test.com".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        payment: PaymentConfig::default(),
        attachments: AttachmentsConfig {
            storage_dir,
            max_file_size: 1024 * 1024,
        },
        enable_otel_export: false,
        ..Default::default()
    };
    config.auth.native.session = SessionConfig {
        cookie_secure: false,
        ..Default::default()
    };
    config
}

async fn insert_user(pool: &PgPool, prefix: &str, role: Role, password_hash: Option<String>) -> UserResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users_repo = Users::new(&mut conn);
    let username = format!("{prefix}_{}", Uuid::new_v4().simple());
    let email = format!("{username}@example.com");

    let user_create = UserCreateDBRequest {
        username,
        email,
        password_hash,
        full_name: Some("Test User".to_string()),
        phone: None,
        role,
    };

    let user = users_repo.create(&user_create).await.expect("Failed to create test user");
    UserResponse::from(user)
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> UserResponse {
    insert_user(pool, "testuser", role, None).await
}

pub async fn create_test_admin_user(pool: &PgPool) -> UserResponse {
    insert_user(pool, "testadmin", Role::Admin, None).await
}

/// A user that can log in with `password`
pub async fn create_test_user_with_password(pool: &PgPool, role: Role, password: &str) -> UserResponse {
    let hash = password::hash_password_with_params(password, password::Argon2Params::fast()).expect("Failed to hash password");
    insert_user(pool, "loginuser", role, Some(hash)).await
}

/// `Authorization` header carrying a fresh access token for the user
pub fn add_auth_headers(user: &UserResponse) -> (String, String) {
    let current = CurrentUser {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        role: user.role,
    };
    let token = session::create_access_token(&current, &create_test_config()).expect("Failed to create access token");
    ("authorization".to_string(), format!("Bearer {token}"))
}
