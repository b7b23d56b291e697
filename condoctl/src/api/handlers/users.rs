use crate::{
    AppState,
    api::{
        handlers::households::load_household,
        models::{
            pagination::PaginatedResponse,
            users::{ListUsersQuery, Role, UserCreate, UserResponse, UserUpdate},
        },
    },
    auth::{
        password,
        permissions::{RequiresPermission, operation, resource},
    },
    db::{
        errors::DbError,
        handlers::{Repository, Users, users::UserFilter},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::UserId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

fn user_not_found(user_id: UserId) -> Error {
    Error::NotFound {
        resource: "User".to_string(),
        id: user_id.to_string(),
    }
}

fn validate_identity(username: Option<&str>, email: Option<&str>) -> Result<()> {
    if username.is_some_and(|u| u.trim().is_empty()) {
        return Err(Error::BadRequest {
            message: "Username is required".to_string(),
        });
    }
    if let Some(email) = email {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::BadRequest {
                message: "A valid email address is required".to_string(),
            });
        }
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Paginated list of users", body = PaginatedResponse<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    _: RequiresPermission<resource::Users, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = UserFilter::new(skip, limit);
    if let Some(search) = query.search.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        filter = filter.with_search(search.to_string());
    }
    if let Some(role) = query.role {
        filter = filter.with_role(role);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let total_count = Users::new(&mut conn).count(&filter).await?;
    let users = Users::new(&mut conn).list(&filter).await?;

    let mut data = Vec::with_capacity(users.len());
    for user in users {
        let response = if query.includes("household") {
            let (vehicles, pets, family_members) = load_household(&mut conn, user.id).await?;
            UserResponse::from(user).with_household(vehicles, pets, family_members)
        } else {
            UserResponse::from(user)
        };
        data.push(response);
    }

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Every STAFF user, ordered by username
#[utoipa::path(
    get,
    path = "/users/staff-members",
    tag = "users",
    summary = "List staff members",
    responses(
        (status = 200, description = "Staff users", body = [UserResponse]),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_staff_members(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Users, operation::ReadAll>,
) -> Result<Json<Vec<UserResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let staff = Users::new(&mut conn)
        .list(&UserFilter::new(0, i64::MAX).with_role(Role::Staff))
        .await?;

    Ok(Json(staff.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    summary = "Create user",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Username or email already taken"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Users, operation::CreateAll>,
    Json(create): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    validate_identity(Some(&create.username), Some(&create.email))?;

    let password_hash = match create.password {
        Some(password) => {
            password::validate_password(&password, &state.config.auth.native.password)?;
            Some(password::hash_password_async(password).await?)
        }
        None => None,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            username: create.username,
            email: create.email,
            password_hash,
            full_name: create.full_name,
            phone: create.phone,
            role: create.role.unwrap_or(Role::Resident),
        })
        .await?;

    tracing::info!(user_id = %user.id, role = ?user.role, "Created user");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Get user",
    params(("user_id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User with household", body = UserResponse),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    _: RequiresPermission<resource::Users, operation::ReadAll>,
) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).get_by_id(user_id).await?.ok_or_else(|| user_not_found(user_id))?;
    let (vehicles, pets, family_members) = load_household(&mut conn, user.id).await?;
    Ok(Json(UserResponse::from(user).with_household(vehicles, pets, family_members)))
}

#[utoipa::path(
    patch,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Update user",
    request_body = UserUpdate,
    params(("user_id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    _: RequiresPermission<resource::Users, operation::UpdateAll>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserResponse>> {
    validate_identity(None, update.email.as_deref())?;

    let password_hash = match update.password {
        Some(password) => {
            password::validate_password(&password, &state.config.auth.native.password)?;
            Some(password::hash_password_async(password).await?)
        }
        None => None,
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut tx)
        .update(
            user_id,
            &UserUpdateDBRequest {
                email: update.email,
                password_hash,
                is_active: update.is_active,
                full_name: update.full_name,
                phone: update.phone,
                role: update.role,
            },
        )
        .await
        .map_err(|e| match e {
            DbError::NotFound => user_not_found(user_id),
            other => other.into(),
        })?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Delete user",
    params(("user_id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Cannot delete yourself"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: RequiresPermission<resource::Users, operation::DeleteAll>,
) -> Result<StatusCode> {
    if current_user.id == user_id {
        return Err(Error::BadRequest {
            message: "You cannot delete your own account".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Users::new(&mut conn).delete(user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(user_not_found(user_id))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{
            auth::AuthResponse,
            pagination::PaginatedResponse,
            users::{Role, UserResponse},
        },
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_creates_user_who_can_log_in(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let (name, value) = add_auth_headers(&admin);

        let response = server
            .post("/api/v1/users")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "username": "jperez",
                "email": "jperez@example.com",
                "password": "supersecret",
                "full_name": "Juan Perez",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: UserResponse = response.json();
        assert_eq!(created.role, Role::Resident);
        assert_eq!(created.full_name.as_deref(), Some("Juan Perez"));

        let login: AuthResponse = server
            .post("/authentication/login")
            .json(&json!({"username": "JPEREZ", "password": "supersecret"}))
            .await
            .json();
        assert_eq!(login.user.id, created.id);

        // Same username in another case
        server
            .post("/api/v1/users")
            .add_header(name.clone(), value.clone())
            .json(&json!({"username": "JPerez", "email": "other@example.com"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        let response = server
            .post("/api/v1/users")
            .add_header(name, value)
            .json(&json!({"username": "short", "email": "short@example.com", "password": "abc"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), "Password must be at least 8 characters long");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_non_admin_cannot_manage_users(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let staff = create_test_user(&pool, Role::Staff).await;
        let (name, value) = add_auth_headers(&staff);

        server
            .get("/api/v1/users")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .post("/api/v1/users")
            .add_header(name.clone(), value.clone())
            .json(&json!({"username": "x", "email": "x@example.com"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .get(&format!("/api/v1/users/{}", staff.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_search_and_household_include(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let resident = create_test_user(&pool, Role::Resident).await;
        create_test_user(&pool, Role::Resident).await;
        let (name, value) = add_auth_headers(&admin);

        server
            .post("/api/v1/pets")
            .add_header(name.clone(), value.clone())
            .json(&json!({"owner_id": resident.id, "name": "Michi", "species": "cat"}))
            .await
            .assert_status(StatusCode::CREATED);

        let page: PaginatedResponse<UserResponse> = server
            .get(&format!("/api/v1/users?search={}&include=household", resident.username.to_uppercase()))
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].pets.as_ref().map(Vec::len), Some(1));

        let page: PaginatedResponse<UserResponse> = server.get("/api/v1/users").add_header(name, value).await.json();
        assert_eq!(page.total_count, 3);
        assert!(page.data.iter().all(|u| u.pets.is_none()));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_staff_members_only_lists_staff(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let staff_a = create_test_user(&pool, Role::Staff).await;
        let staff_b = create_test_user(&pool, Role::Staff).await;
        create_test_user(&pool, Role::Resident).await;

        let (name, value) = add_auth_headers(&admin);
        let response = server.get("/api/v1/users/staff-members").add_header(name, value).await;
        response.assert_status_ok();
        let staff: Vec<UserResponse> = response.json();
        assert_eq!(staff.len(), 2);
        assert!(staff.iter().all(|u| u.role == Role::Staff));

        let mut expected = vec![staff_a.username, staff_b.username];
        expected.sort();
        assert_eq!(staff.into_iter().map(|u| u.username).collect::<Vec<_>>(), expected);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_and_delete_user(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let resident = create_test_user(&pool, Role::Resident).await;
        let (name, value) = add_auth_headers(&admin);

        let response = server
            .patch(&format!("/api/v1/users/{}", resident.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"role": "STAFF", "is_active": false}))
            .await;
        response.assert_status_ok();
        let updated: UserResponse = response.json();
        assert_eq!(updated.role, Role::Staff);
        assert!(!updated.is_active);

        server
            .delete(&format!("/api/v1/users/{}", admin.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .delete(&format!("/api/v1/users/{}", resident.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&format!("/api/v1/users/{}", resident.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
