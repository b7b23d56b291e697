use axum::{Json, extract::State, http::HeaderValue};

use crate::{
    AppState,
    api::models::{
        auth::{AuthResponse, AuthSuccessResponse, LoginRequest, LoginResponse, LogoutResponse, RefreshRequest, RefreshResponse},
        users::{CurrentUser, UserResponse},
    },
    auth::{
        password,
        session::{self, TokenType},
    },
    config::Config,
    db::{
        handlers::{ActivityLogs, Repository, Users},
        models::notifications::ActivityLogCreateDBRequest,
    },
    errors::Error,
};

pub const USER_LOGIN_SUCCESS: &str = "USER_LOGIN_SUCCESS";
pub const USER_LOGOUT: &str = "USER_LOGOUT";

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid credentials".to_string()),
    }
}

/// Login with email or username and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }

    let (identifier, password) = match (request.identifier(), request.password.as_deref().map(str::trim)) {
        (Some(identifier), Some(password)) if !password.is_empty() => (identifier.to_string(), password.to_string()),
        _ => {
            return Err(Error::BadRequest {
                message: "Missing credentials".to_string(),
            });
        }
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut tx);

    let user = user_repo.get_user_by_login(&identifier).await?.ok_or_else(invalid_credentials)?;
    if !user.is_active {
        return Err(invalid_credentials());
    }
    let password_hash = user.password_hash.clone().ok_or_else(invalid_credentials)?;

    if !password::verify_password_async(password, password_hash).await? {
        tracing::info!("Failed login attempt for {}", user.username);
        return Err(invalid_credentials());
    }

    user_repo.update_last_login(user.id).await?;
    let user = user_repo.get_by_id(user.id).await?.ok_or_else(invalid_credentials)?;

    ActivityLogs::new(&mut tx)
        .create(&ActivityLogCreateDBRequest {
            user_id: Some(user.id),
            action: USER_LOGIN_SUCCESS.to_string(),
            details: format!("User {} logged in", user.username),
        })
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let current_user = CurrentUser::from(user.clone());
    let access = session::create_access_token(&current_user, &state.config)?;
    let refresh = session::create_refresh_token(&current_user, &state.config)?;
    let cookie = create_session_cookie(&access, &state.config)?;

    let auth_response = AuthResponse {
        access,
        refresh,
        user: UserResponse::from(user),
    };

    Ok(LoginResponse { auth_response, cookie })
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/authentication/refresh",
    request_body = RefreshRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Invalid or expired refresh token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>, Json(request): Json<RefreshRequest>) -> Result<Json<RefreshResponse>, Error> {
    let claimed = session::verify_token(request.refresh.trim(), TokenType::Refresh, &state.config)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = match Users::new(&mut conn).get_by_id(claimed.id).await? {
        Some(user) if user.is_active => user,
        _ => {
            return Err(Error::Unauthenticated {
                message: Some("User not found or inactive".to_string()),
            });
        }
    };

    let access = session::create_access_token(&CurrentUser::from(user), &state.config)?;
    Ok(Json(RefreshResponse { access }))
}

/// Logout (clear session)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
        (status = 401, description = "Not authenticated"),
    ),
    security(
        ("BearerAuth" = []),
        ("CookieAuth" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, current_user: CurrentUser) -> Result<LogoutResponse, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ActivityLogs::new(&mut conn)
        .create(&ActivityLogCreateDBRequest {
            user_id: Some(current_user.id),
            action: USER_LOGOUT.to_string(),
            details: format!("User {} logged out", current_user.username),
        })
        .await?;

    // Create expired cookie to clear session
    let session_config = &state.config.auth.native.session;
    let cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite={}; Max-Age=0",
        session_config.cookie_name, session_config.cookie_same_site
    );

    let auth_response = AuthSuccessResponse {
        message: "Logout successful".to_string(),
    };

    Ok(LogoutResponse {
        auth_response,
        cookie: header_value(cookie)?,
    })
}

fn header_value(cookie: String) -> Result<HeaderValue, Error> {
    HeaderValue::try_from(cookie).map_err(|e| Error::Internal {
        operation: format!("build session cookie: {e}"),
    })
}

fn create_session_cookie(token: &str, config: &Config) -> Result<HeaderValue, Error> {
    let session_config = &config.auth.native.session;
    let max_age = config.auth.security.jwt_expiry.as_secs();
    let secure = if session_config.cookie_secure { "; Secure" } else { "" };

    header_value(format!(
        "{}={}; Path=/; HttpOnly{}; SameSite={}; Max-Age={}",
        session_config.cookie_name, token, secure, session_config.cookie_same_site, max_age
    ))
}
