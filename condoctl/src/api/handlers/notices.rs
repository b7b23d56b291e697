use crate::{
    AppState,
    api::models::{
        notices::{
            ListNoticeCategoriesQuery, ListNoticesQuery, NoticeCategoryCreate, NoticeCategoryResponse, NoticeCategoryUpdate, NoticeCreate,
            NoticeResponse, NoticeUpdate,
        },
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        errors::DbError,
        handlers::{
            NoticeCategories, Notices, Repository,
            notices::{NoticeCategoryFilter, NoticeFilter},
        },
        models::notices::{NoticeCategoryCreateDBRequest, NoticeCategoryUpdateDBRequest, NoticeCreateDBRequest, NoticeUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{NoticeCategoryId, NoticeId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;

fn category_not_found(id: NoticeCategoryId) -> Error {
    Error::NotFound {
        resource: "Notice category".to_string(),
        id: id.to_string(),
    }
}

fn notice_not_found(id: NoticeId) -> Error {
    Error::NotFound {
        resource: "Notice".to_string(),
        id: id.to_string(),
    }
}

fn require_text(field: &str, value: Option<&str>) -> Result<()> {
    if value.is_some_and(|v| v.trim().is_empty()) {
        return Err(Error::BadRequest {
            message: format!("{field} cannot be empty"),
        });
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/notice-categories",
    tag = "notices",
    summary = "List notice categories",
    params(ListNoticeCategoriesQuery),
    responses((status = 200, description = "Paginated list of categories", body = PaginatedResponse<NoticeCategoryResponse>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_notice_categories(
    State(state): State<AppState>,
    Query(query): Query<ListNoticeCategoriesQuery>,
    _: RequiresPermission<resource::NoticeCategories, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<NoticeCategoryResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = NoticeCategories::new(&mut conn);

    let total_count = repo.count().await?;
    let data = repo
        .list(&NoticeCategoryFilter::new(skip, limit))
        .await?
        .into_iter()
        .map(NoticeCategoryResponse::from)
        .collect();

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/notice-categories/{category_id}",
    tag = "notices",
    summary = "Get notice category",
    params(("category_id" = uuid::Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = NoticeCategoryResponse),
        (status = 404, description = "Category not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_notice_category(
    State(state): State<AppState>,
    Path(category_id): Path<NoticeCategoryId>,
    _: RequiresPermission<resource::NoticeCategories, operation::ReadAll>,
) -> Result<Json<NoticeCategoryResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let category = NoticeCategories::new(&mut conn)
        .get_by_id(category_id)
        .await?
        .ok_or_else(|| category_not_found(category_id))?;
    Ok(Json(NoticeCategoryResponse::from(category)))
}

#[utoipa::path(
    post,
    path = "/notice-categories",
    tag = "notices",
    summary = "Create notice category",
    request_body = NoticeCategoryCreate,
    responses(
        (status = 201, description = "Category created", body = NoticeCategoryResponse),
        (status = 409, description = "Name already exists"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_notice_category(
    State(state): State<AppState>,
    _: RequiresPermission<resource::NoticeCategories, operation::CreateAll>,
    Json(create): Json<NoticeCategoryCreate>,
) -> Result<(StatusCode, Json<NoticeCategoryResponse>)> {
    require_text("Name", Some(&create.name))?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let category = NoticeCategories::new(&mut conn)
        .create(&NoticeCategoryCreateDBRequest::from(create))
        .await?;
    Ok((StatusCode::CREATED, Json(NoticeCategoryResponse::from(category))))
}

#[utoipa::path(
    patch,
    path = "/notice-categories/{category_id}",
    tag = "notices",
    summary = "Update notice category",
    request_body = NoticeCategoryUpdate,
    params(("category_id" = uuid::Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category updated", body = NoticeCategoryResponse),
        (status = 404, description = "Category not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_notice_category(
    State(state): State<AppState>,
    Path(category_id): Path<NoticeCategoryId>,
    _: RequiresPermission<resource::NoticeCategories, operation::UpdateAll>,
    Json(update): Json<NoticeCategoryUpdate>,
) -> Result<Json<NoticeCategoryResponse>> {
    require_text("Name", update.name.as_deref())?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let category = NoticeCategories::new(&mut conn)
        .update(category_id, &NoticeCategoryUpdateDBRequest::from(update))
        .await
        .map_err(|e| match e {
            DbError::NotFound => category_not_found(category_id),
            other => other.into(),
        })?;
    Ok(Json(NoticeCategoryResponse::from(category)))
}

/// Delete a category. Its notices stay, uncategorized.
#[utoipa::path(
    delete,
    path = "/notice-categories/{category_id}",
    tag = "notices",
    summary = "Delete notice category",
    params(("category_id" = uuid::Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_notice_category(
    State(state): State<AppState>,
    Path(category_id): Path<NoticeCategoryId>,
    _: RequiresPermission<resource::NoticeCategories, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if NoticeCategories::new(&mut conn).delete(category_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(category_not_found(category_id))
    }
}

/// Published notices, newest first. Admins may include scheduled ones.
#[utoipa::path(
    get,
    path = "/notices",
    tag = "notices",
    summary = "List notices",
    params(ListNoticesQuery),
    responses((status = 200, description = "Paginated list of notices", body = PaginatedResponse<NoticeResponse>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_notices(
    State(state): State<AppState>,
    Query(query): Query<ListNoticesQuery>,
    current_user: RequiresPermission<resource::Notices, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<NoticeResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = NoticeFilter::new(skip, limit);
    if let Some(category_id) = query.category_id {
        filter = filter.with_category(category_id);
    }
    if query.include_scheduled == Some(true) && current_user.is_admin() {
        filter = filter.including_scheduled();
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Notices::new(&mut conn);
    let total_count = repo.count(&filter).await?;
    let data = repo.list(&filter).await?.into_iter().map(NoticeResponse::from).collect();

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/notices/{notice_id}",
    tag = "notices",
    summary = "Get notice",
    params(("notice_id" = uuid::Uuid, Path, description = "Notice ID")),
    responses(
        (status = 200, description = "Notice", body = NoticeResponse),
        (status = 404, description = "Notice not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_notice(
    State(state): State<AppState>,
    Path(notice_id): Path<NoticeId>,
    current_user: RequiresPermission<resource::Notices, operation::ReadAll>,
) -> Result<Json<NoticeResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match Notices::new(&mut conn).get_by_id(notice_id).await? {
        // Scheduled notices stay hidden until their publish date, except for admins
        Some(notice) if notice.publish_date <= Utc::now() || current_user.is_admin() => Ok(Json(NoticeResponse::from(notice))),
        _ => Err(notice_not_found(notice_id)),
    }
}

#[utoipa::path(
    post,
    path = "/notices",
    tag = "notices",
    summary = "Create notice",
    request_body = NoticeCreate,
    responses(
        (status = 201, description = "Notice created", body = NoticeResponse),
        (status = 400, description = "Invalid request"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_notice(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Notices, operation::CreateAll>,
    Json(create): Json<NoticeCreate>,
) -> Result<(StatusCode, Json<NoticeResponse>)> {
    require_text("Title", Some(&create.title))?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let notice = Notices::new(&mut conn)
        .create(&NoticeCreateDBRequest {
            title: create.title.trim().to_string(),
            body: create.body,
            category_id: create.category_id,
            publish_date: create.publish_date,
            created_by: current_user.id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(NoticeResponse::from(notice))))
}

#[utoipa::path(
    patch,
    path = "/notices/{notice_id}",
    tag = "notices",
    summary = "Update notice",
    request_body = NoticeUpdate,
    params(("notice_id" = uuid::Uuid, Path, description = "Notice ID")),
    responses(
        (status = 200, description = "Notice updated", body = NoticeResponse),
        (status = 404, description = "Notice not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_notice(
    State(state): State<AppState>,
    Path(notice_id): Path<NoticeId>,
    _: RequiresPermission<resource::Notices, operation::UpdateAll>,
    Json(update): Json<NoticeUpdate>,
) -> Result<Json<NoticeResponse>> {
    require_text("Title", update.title.as_deref())?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let notice = Notices::new(&mut conn)
        .update(notice_id, &NoticeUpdateDBRequest::from(update))
        .await
        .map_err(|e| match e {
            DbError::NotFound => notice_not_found(notice_id),
            other => other.into(),
        })?;
    Ok(Json(NoticeResponse::from(notice)))
}

#[utoipa::path(
    delete,
    path = "/notices/{notice_id}",
    tag = "notices",
    summary = "Delete notice",
    params(("notice_id" = uuid::Uuid, Path, description = "Notice ID")),
    responses(
        (status = 204, description = "Notice deleted"),
        (status = 404, description = "Notice not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_notice(
    State(state): State<AppState>,
    Path(notice_id): Path<NoticeId>,
    _: RequiresPermission<resource::Notices, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Notices::new(&mut conn).delete(notice_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(notice_not_found(notice_id))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{
            notices::{NoticeCategoryResponse, NoticeResponse},
            pagination::PaginatedResponse,
            users::Role,
        },
        test_utils::*,
    };
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_notice_lifecycle_with_category(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let (name, value) = add_auth_headers(&admin);

        let category: NoticeCategoryResponse = server
            .post("/api/v1/notice-categories")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "General"}))
            .await
            .json();
        server
            .post("/api/v1/notice-categories")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "General"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        let response = server
            .post("/api/v1/notices")
            .add_header(name.clone(), value.clone())
            .json(&json!({"title": "Water cut", "body": "Tuesday 9-12", "category_id": category.id}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let notice: NoticeResponse = response.json();
        assert_eq!(notice.created_by, Some(admin.id));
        assert_eq!(notice.category_name.as_deref(), Some("General"));

        let updated: NoticeResponse = server
            .patch(&format!("/api/v1/notices/{}", notice.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"body": "Tuesday 10-13"}))
            .await
            .json();
        assert_eq!(updated.body, "Tuesday 10-13");

        server
            .delete(&format!("/api/v1/notice-categories/{}", category.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let orphan: NoticeResponse = server
            .get(&format!("/api/v1/notices/{}", notice.id))
            .add_header(name, value)
            .await
            .json();
        assert!(orphan.category_id.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_scheduled_notices_hidden_from_residents(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let resident = create_test_user(&pool, Role::Resident).await;
        let (admin_name, admin_value) = add_auth_headers(&admin);

        server
            .post("/api/v1/notices")
            .add_header(admin_name.clone(), admin_value.clone())
            .json(&json!({"title": "Now", "body": "published"}))
            .await
            .assert_status(StatusCode::CREATED);
        let scheduled: NoticeResponse = server
            .post("/api/v1/notices")
            .add_header(admin_name.clone(), admin_value.clone())
            .json(&json!({"title": "Later", "body": "scheduled", "publish_date": Utc::now() + Duration::days(3)}))
            .await
            .json();

        let (name, value) = add_auth_headers(&resident);
        let page: PaginatedResponse<NoticeResponse> = server
            .get("/api/v1/notices?include_scheduled=true")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].title, "Now");
        server
            .get(&format!("/api/v1/notices/{}", scheduled.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/api/v1/notices")
            .add_header(name, value)
            .json(&json!({"title": "Mine", "body": "x"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let page: PaginatedResponse<NoticeResponse> = server
            .get("/api/v1/notices?include_scheduled=true")
            .add_header(admin_name, admin_value)
            .await
            .json();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.data[0].title, "Later");
    }
}
