use axum::{Json, extract::State};

use crate::{
    AppState,
    api::{
        handlers::households::load_household,
        models::users::{CurrentUser, ProfileResponse, ProfileUpdate, UserResponse},
    },
    db::{
        handlers::{Repository, Users},
        models::users::ProfileUpdateDBRequest,
    },
    errors::{Error, Result},
};

/// The authenticated user together with their household registries
#[utoipa::path(
    get,
    path = "/me",
    tag = "me",
    summary = "Get current user",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: current_user.id.to_string(),
        })?;

    let (vehicles, pets, family_members) = load_household(&mut conn, user.id).await?;
    Ok(Json(UserResponse::from(user).with_household(vehicles, pets, family_members)))
}

/// Update the caller's own profile. The role is not editable here.
#[utoipa::path(
    patch,
    path = "/me/profile",
    tag = "me",
    summary = "Update own profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_my_profile(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let profile = Users::new(&mut conn)
        .update_profile(current_user.id, &ProfileUpdateDBRequest::from(update))
        .await?;
    Ok(Json(ProfileResponse::from(profile)))
}
