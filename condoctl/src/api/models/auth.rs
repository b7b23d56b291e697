//! Authentication request/response models.

use axum::{
    http::{HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::users::UserResponse;

/// Credentials accepted by the login endpoint. Either `email` or `username` identifies the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    /// The trimmed identifier, preferring email over username
    pub fn identifier(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| self.username.as_deref().map(str::trim).filter(|s| !s.is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    /// Short-lived access token, sent as `Authorization: Bearer <access>`
    pub access: String,
    /// Long-lived token exchanged for new access tokens
    pub refresh: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub message: String,
}

/// Login response that also sets the session cookie
pub struct LoginResponse {
    pub auth_response: AuthResponse,
    pub cookie: HeaderValue,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::OK, Json(self.auth_response)).into_response();
        response.headers_mut().insert(SET_COOKIE, self.cookie);
        response
    }
}

/// Logout response that clears the session cookie
pub struct LogoutResponse {
    pub auth_response: AuthSuccessResponse,
    pub cookie: HeaderValue,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::OK, Json(self.auth_response)).into_response();
        response.headers_mut().insert(SET_COOKIE, self.cookie);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_prefers_email() {
        let request = LoginRequest {
            email: Some("  a@b.com ".to_string()),
            username: Some("bob".to_string()),
            password: None,
        };
        assert_eq!(request.identifier(), Some("a@b.com"));
    }

    #[test]
    fn test_identifier_falls_back_to_username() {
        let request = LoginRequest {
            email: Some("   ".to_string()),
            username: Some("bob".to_string()),
            password: None,
        };
        assert_eq!(request.identifier(), Some("bob"));
        assert_eq!(LoginRequest::default().identifier(), None);
    }
}
