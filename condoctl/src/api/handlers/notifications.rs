use crate::{
    AppState,
    api::models::{
        notifications::{ListNotificationsQuery, NotificationCreate, NotificationResponse, NotificationUpdate},
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::{Notifications, notifications::NotificationFilter},
        models::notifications::{NotificationCreateDBRequest, NotificationDBResponse},
    },
    errors::{Error, Result},
    types::NotificationId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

/// Notifications are private to their recipient, admins included
async fn own_notification(conn: &mut PgConnection, user: &CurrentUser, notification_id: NotificationId) -> Result<NotificationDBResponse> {
    match Notifications::new(conn).get_by_id(notification_id).await? {
        Some(notification) if notification.user_id == user.id => Ok(notification),
        _ => Err(Error::NotFound {
            resource: "Notification".to_string(),
            id: notification_id.to_string(),
        }),
    }
}

/// The caller's inbox, newest first
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    summary = "List notifications",
    params(ListNotificationsQuery),
    responses((status = 200, description = "Paginated list of notifications", body = PaginatedResponse<NotificationResponse>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
    current_user: RequiresPermission<resource::Notifications, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<NotificationResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = NotificationFilter::new(skip, limit).for_user(current_user.id);
    if query.unread_only == Some(true) {
        filter = filter.unread();
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Notifications::new(&mut conn);
    let total_count = repo.count(&filter).await?;
    let data = repo.list(&filter).await?.into_iter().map(NotificationResponse::from).collect();

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/notifications/{notification_id}",
    tag = "notifications",
    summary = "Get notification",
    params(("notification_id" = uuid::Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification", body = NotificationResponse),
        (status = 404, description = "Notification not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<NotificationId>,
    current_user: RequiresPermission<resource::Notifications, operation::ReadOwn>,
) -> Result<Json<NotificationResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let notification = own_notification(&mut conn, &current_user, notification_id).await?;
    Ok(Json(NotificationResponse::from(notification)))
}

/// Send a notification to any user
#[utoipa::path(
    post,
    path = "/notifications",
    tag = "notifications",
    summary = "Create notification",
    request_body = NotificationCreate,
    responses(
        (status = 201, description = "Notification created", body = NotificationResponse),
        (status = 400, description = "Unknown recipient or empty title"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_notification(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Notifications, operation::CreateAll>,
    Json(create): Json<NotificationCreate>,
) -> Result<(StatusCode, Json<NotificationResponse>)> {
    if create.title.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Title is required".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let notification = Notifications::new(&mut conn)
        .create(&NotificationCreateDBRequest {
            user_id: create.user_id,
            title: create.title,
            message: create.message,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(NotificationResponse::from(notification))))
}

#[utoipa::path(
    patch,
    path = "/notifications/{notification_id}",
    tag = "notifications",
    summary = "Mark notification read or unread",
    request_body = NotificationUpdate,
    params(("notification_id" = uuid::Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification updated", body = NotificationResponse),
        (status = 404, description = "Notification not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<NotificationId>,
    current_user: RequiresPermission<resource::Notifications, operation::UpdateOwn>,
    Json(update): Json<NotificationUpdate>,
) -> Result<Json<NotificationResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    own_notification(&mut conn, &current_user, notification_id).await?;
    let notification = Notifications::new(&mut conn).set_read(notification_id, update.is_read).await?;
    Ok(Json(NotificationResponse::from(notification)))
}

#[utoipa::path(
    delete,
    path = "/notifications/{notification_id}",
    tag = "notifications",
    summary = "Delete notification",
    params(("notification_id" = uuid::Uuid, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<NotificationId>,
    current_user: RequiresPermission<resource::Notifications, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    own_notification(&mut conn, &current_user, notification_id).await?;
    Notifications::new(&mut conn).delete(notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/notifications/mark-all-as-read",
    tag = "notifications",
    summary = "Mark all notifications read",
    responses((status = 204, description = "All of the caller's notifications are read")),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn mark_all_as_read(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Notifications, operation::UpdateOwn>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let updated = Notifications::new(&mut conn).mark_all_read(current_user.id).await?;
    tracing::debug!("Marked {} notifications as read", updated);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{notifications::NotificationResponse, pagination::PaginatedResponse, users::Role},
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_inbox_flow(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let resident = create_test_user(&pool, Role::Resident).await;
        let (admin_name, admin_value) = add_auth_headers(&admin);

        let mut sent = Vec::new();
        for title in ["Water cut", "Assembly"] {
            let notification: NotificationResponse = server
                .post("/api/v1/notifications")
                .add_header(admin_name.clone(), admin_value.clone())
                .json(&json!({"user_id": resident.id, "title": title, "message": "See the notice board"}))
                .await
                .json();
            sent.push(notification);
        }

        let (name, value) = add_auth_headers(&resident);
        let read: NotificationResponse = server
            .patch(&format!("/api/v1/notifications/{}", sent[0].id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"is_read": true}))
            .await
            .json();
        assert!(read.is_read);

        let unread: PaginatedResponse<NotificationResponse> = server
            .get("/api/v1/notifications?unread_only=true")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(unread.total_count, 1);
        assert_eq!(unread.data[0].title, "Assembly");

        server
            .post("/api/v1/notifications/mark-all-as-read")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let unread: PaginatedResponse<NotificationResponse> = server
            .get("/api/v1/notifications?unread_only=true")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(unread.total_count, 0);

        server
            .delete(&format!("/api/v1/notifications/{}", sent[1].id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let all: PaginatedResponse<NotificationResponse> = server.get("/api/v1/notifications").add_header(name, value).await.json();
        assert_eq!(all.total_count, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_notifications_private_to_recipient(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let alice = create_test_user(&pool, Role::Resident).await;
        let bob = create_test_user(&pool, Role::Resident).await;
        let (admin_name, admin_value) = add_auth_headers(&admin);

        let notification: NotificationResponse = server
            .post("/api/v1/notifications")
            .add_header(admin_name.clone(), admin_value.clone())
            .json(&json!({"user_id": alice.id, "title": "Hello", "message": "Welcome"}))
            .await
            .json();

        let (name, value) = add_auth_headers(&bob);
        server
            .get(&format!("/api/v1/notifications/{}", notification.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/api/v1/notifications")
            .add_header(name, value)
            .json(&json!({"user_id": alice.id, "title": "Spam", "message": "x"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        server
            .get(&format!("/api/v1/notifications/{}", notification.id))
            .add_header(admin_name, admin_value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
