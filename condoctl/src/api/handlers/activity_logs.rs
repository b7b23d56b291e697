use crate::{
    AppState,
    api::models::{
        notifications::{ActivityLogResponse, ListActivityLogsQuery, PageAccessRequest},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{ActivityLogs, activity_logs::ActivityLogFilter},
        models::notifications::ActivityLogCreateDBRequest,
    },
    errors::{Error, Result},
    types::ActivityLogId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

/// Audit trail, newest first
#[utoipa::path(
    get,
    path = "/activity-logs",
    tag = "activity_logs",
    summary = "List activity log entries",
    params(ListActivityLogsQuery),
    responses((status = 200, description = "Paginated list of activity log entries", body = PaginatedResponse<ActivityLogResponse>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_activity_logs(
    State(state): State<AppState>,
    Query(query): Query<ListActivityLogsQuery>,
    _: RequiresPermission<resource::ActivityLogs, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<ActivityLogResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = ActivityLogFilter::new(skip, limit);
    if let Some(user_id) = query.user_id {
        filter = filter.with_user(user_id);
    }
    if let Some(action) = query.action.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()) {
        filter = filter.with_action(action);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ActivityLogs::new(&mut conn);
    let total_count = repo.count(&filter).await?;
    let data = repo.list(&filter).await?.into_iter().map(ActivityLogResponse::from).collect();

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/activity-logs/{entry_id}",
    tag = "activity_logs",
    summary = "Get activity log entry",
    params(("entry_id" = uuid::Uuid, Path, description = "Activity log entry ID")),
    responses(
        (status = 200, description = "Activity log entry", body = ActivityLogResponse),
        (status = 404, description = "Entry not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_activity_log(
    State(state): State<AppState>,
    Path(entry_id): Path<ActivityLogId>,
    _: RequiresPermission<resource::ActivityLogs, operation::ReadAll>,
) -> Result<Json<ActivityLogResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match ActivityLogs::new(&mut conn).get_by_id(entry_id).await? {
        Some(entry) => Ok(Json(ActivityLogResponse::from(entry))),
        None => Err(Error::NotFound {
            resource: "Activity log entry".to_string(),
            id: entry_id.to_string(),
        }),
    }
}

/// Record that the caller opened a page of the web client. Blank page names are accepted
/// and ignored.
#[utoipa::path(
    post,
    path = "/page-access-logs",
    tag = "activity_logs",
    summary = "Record page access",
    request_body = PageAccessRequest,
    responses((status = 201, description = "Page access recorded")),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn log_page_access(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::ActivityLogs, operation::CreateOwn>,
    Json(request): Json<PageAccessRequest>,
) -> Result<StatusCode> {
    if let Some(page_name) = request.page_name.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        ActivityLogs::new(&mut conn)
            .create(&ActivityLogCreateDBRequest {
                user_id: Some(current_user.id),
                action: "PAGE_ACCESS".to_string(),
                details: format!("Accessed: {page_name}"),
            })
            .await?;
    }
    Ok(StatusCode::CREATED)
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{notifications::ActivityLogResponse, pagination::PaginatedResponse, users::Role},
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_page_access_is_logged(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let resident = create_test_user(&pool, Role::Resident).await;

        let (name, value) = add_auth_headers(&resident);
        for body in [json!({"page_name": "Fees"}), json!({"page_name": "  "}), json!({})] {
            server
                .post("/api/v1/page-access-logs")
                .add_header(name.clone(), value.clone())
                .json(&body)
                .await
                .assert_status(StatusCode::CREATED);
        }

        // Residents cannot read the log
        server
            .get("/api/v1/activity-logs")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = add_auth_headers(&admin);
        let page: PaginatedResponse<ActivityLogResponse> = server
            .get(&format!("/api/v1/activity-logs?action=PAGE_ACCESS&user_id={}", resident.id))
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].details, "Accessed: Fees");
        assert_eq!(page.data[0].username.as_deref(), Some(resident.username.as_str()));

        let entry: ActivityLogResponse = server
            .get(&format!("/api/v1/activity-logs/{}", page.data[0].id))
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(entry.action, "PAGE_ACCESS");

        server
            .get(&format!("/api/v1/activity-logs/{}", uuid::Uuid::new_v4()))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
