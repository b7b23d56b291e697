use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session::{self, TokenType},
    db::{errors::DbError, handlers::Users, handlers::Repository},
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};

/// Extract an access token from `Authorization: Bearer <token>`
/// Returns:
/// - None: No Authorization header or not a Bearer token
/// - Some(Ok(user)): Valid access token
/// - Some(Err(error)): Bearer token present but invalid, expired or a refresh token
fn try_bearer_auth(parts: &Parts, config: &crate::config::Config) -> Option<Result<CurrentUser>> {
    let auth_header = parts.headers.get(axum::http::header::AUTHORIZATION)?;

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };

    let token = auth_str.strip_prefix("Bearer ")?;
    Some(session::verify_token(token.trim(), TokenType::Access, config))
}

/// Extract an access token from the session cookie
/// Returns:
/// - None: No session cookie present, or none of them verified
/// - Some(Ok(user)): Valid token found and verified
/// - Some(Err(error)): Cookie header unreadable
fn try_cookie_auth(parts: &Parts, config: &crate::config::Config) -> Option<Result<CurrentUser>> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };
    let cookie_name = &config.auth.native.session.cookie_name;

    for cookie in cookie_str.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=')
            && name == cookie_name
        {
            // Expired cookies are expected; keep looking
            if let Ok(user) = session::verify_token(value, TokenType::Access, config) {
                return Some(Ok(user));
            }
        }
    }
    None
}

/// Reload the token's subject so deactivated accounts and role changes take effect immediately
async fn load_active_user(state: &AppState, claimed: CurrentUser) -> Result<CurrentUser> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(DbError::from(e)))?;
    let user = Users::new(&mut conn).get_by_id(claimed.id).await?;

    match user {
        Some(user) if user.is_active => Ok(CurrentUser::from(user)),
        Some(_) => Err(Error::Unauthenticated {
            message: Some("User account is disabled".to_string()),
        }),
        None => Err(Error::Unauthenticated { message: None }),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // The bearer header wins over the cookie; a present-but-bad header is not retried
        // against the cookie, matching what API clients expect.
        let claimed = match try_bearer_auth(parts, &state.config) {
            Some(Ok(user)) => {
                debug!("Found bearer authenticated user: {}", user.id);
                user
            }
            Some(Err(e)) => {
                trace!("Bearer authentication failed: {:?}", e);
                return Err(e);
            }
            None => match try_cookie_auth(parts, &state.config) {
                Some(Ok(user)) => {
                    debug!("Found session cookie authenticated user: {}", user.id);
                    user
                }
                Some(Err(e)) => return Err(e),
                None => {
                    trace!("No authentication credentials found in request");
                    return Err(Error::Unauthenticated { message: None });
                }
            },
        };

        load_active_user(state, claimed).await
    }
}
