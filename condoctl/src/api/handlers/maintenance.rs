use crate::{
    AppState,
    api::models::{
        maintenance::{
            AttachmentResponse, AttachmentUpload, CommentCreate, CommentResponse, ListMaintenanceRequestsQuery, MaintenancePriority,
            MaintenanceRequestCreate, MaintenanceRequestResponse, MaintenanceRequestUpdate, MaintenanceStatus,
        },
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    auth::permissions::{
        RequiresPermission, can_delete_own_resource, can_read_all_resources, can_read_own_resource, can_update_own_resource, operation,
        require_permission, resource,
    },
    db::{
        handlers::{
            MaintenanceAttachments, MaintenanceComments, MaintenanceRequests, Notifications, Repository, Units,
            maintenance::MaintenanceRequestFilter,
        },
        models::{
            file_storage::FileStorageRequest,
            maintenance::{
                AttachmentCreateDBRequest, CommentCreateDBRequest, MaintenanceRequestCreateDBRequest, MaintenanceRequestDBResponse,
                MaintenanceRequestUpdateDBRequest,
            },
            notifications::NotificationCreateDBRequest,
        },
    },
    errors::{Error, Result},
    types::{AttachmentId, CommentId, MaintenanceRequestId, Operation, Resource, abbrev_uuid},
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use sqlx::PgConnection;

fn request_not_found(request_id: MaintenanceRequestId) -> Error {
    Error::NotFound {
        resource: "Maintenance request".to_string(),
        id: request_id.to_string(),
    }
}

/// Load a request the caller is allowed to see; anything else is reported as missing
async fn visible_request(
    conn: &mut PgConnection,
    user: &CurrentUser,
    request_id: MaintenanceRequestId,
) -> Result<MaintenanceRequestDBResponse> {
    match MaintenanceRequests::new(conn).get_by_id(request_id).await? {
        Some(request) if can_read_own_resource(user, Resource::MaintenanceRequests, request.reported_by) => Ok(request),
        _ => Err(request_not_found(request_id)),
    }
}

/// Requests ordered by creation time, newest first.
///
/// Admins and staff see every request; residents only the ones they reported.
#[utoipa::path(
    get,
    path = "/maintenance-requests",
    tag = "maintenance",
    summary = "List maintenance requests",
    params(ListMaintenanceRequestsQuery),
    responses((status = 200, description = "Paginated list of maintenance requests", body = PaginatedResponse<MaintenanceRequestResponse>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_maintenance_requests(
    State(state): State<AppState>,
    Query(query): Query<ListMaintenanceRequestsQuery>,
    current_user: RequiresPermission<resource::MaintenanceRequests, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<MaintenanceRequestResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = MaintenanceRequestFilter::new(skip, limit);
    if !can_read_all_resources(&current_user, Resource::MaintenanceRequests) {
        filter = filter.with_reporter(current_user.id);
    }
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }
    if let Some(unit_id) = query.unit_id {
        filter = filter.with_unit(unit_id);
    }
    if let Some(assigned_to) = query.assigned_to {
        filter = filter.with_assignee(assigned_to);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = MaintenanceRequests::new(&mut conn);
    let total_count = repo.count(&filter).await?;
    let data = repo.list(&filter).await?.into_iter().map(MaintenanceRequestResponse::from).collect();

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/maintenance-requests/{request_id}",
    tag = "maintenance",
    summary = "Get maintenance request",
    params(("request_id" = uuid::Uuid, Path, description = "Maintenance request ID")),
    responses(
        (status = 200, description = "Maintenance request", body = MaintenanceRequestResponse),
        (status = 404, description = "Maintenance request not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_maintenance_request(
    State(state): State<AppState>,
    Path(request_id): Path<MaintenanceRequestId>,
    current_user: RequiresPermission<resource::MaintenanceRequests, operation::ReadOwn>,
) -> Result<Json<MaintenanceRequestResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let request = visible_request(&mut conn, &current_user, request_id).await?;
    Ok(Json(MaintenanceRequestResponse::from(request)))
}

#[utoipa::path(
    post,
    path = "/maintenance-requests",
    tag = "maintenance",
    summary = "Report a maintenance issue",
    request_body = MaintenanceRequestCreate,
    responses(
        (status = 201, description = "Maintenance request created", body = MaintenanceRequestResponse),
        (status = 400, description = "Invalid request or unit not owned by the caller"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_maintenance_request(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::MaintenanceRequests, operation::CreateOwn>,
    Json(create): Json<MaintenanceRequestCreate>,
) -> Result<(StatusCode, Json<MaintenanceRequestResponse>)> {
    let title = create.title.trim();
    if title.is_empty() {
        return Err(Error::BadRequest {
            message: "Title is required".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if let Some(unit_id) = create.unit_id {
        let unit = Units::new(&mut conn).get_by_id(unit_id).await?;
        let allowed = match &unit {
            Some(_) if current_user.is_admin() => true,
            Some(unit) => unit.owner_id == Some(current_user.id),
            None => false,
        };
        if !allowed {
            return Err(Error::BadRequest {
                message: "You can only report issues for units you own".to_string(),
            });
        }
    }

    let request = MaintenanceRequests::new(&mut conn)
        .create(&MaintenanceRequestCreateDBRequest {
            unit_id: create.unit_id,
            reported_by: current_user.id,
            title: title.to_string(),
            description: create.description,
            priority: create.priority.unwrap_or(MaintenancePriority::Medium),
            status: MaintenanceStatus::Pending,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(MaintenanceRequestResponse::from(request))))
}

/// Edit a request. Changing the status or the assignee is reserved to staff and admins;
/// a status change notifies the reporter.
#[utoipa::path(
    patch,
    path = "/maintenance-requests/{request_id}",
    tag = "maintenance",
    summary = "Update maintenance request",
    request_body = MaintenanceRequestUpdate,
    params(("request_id" = uuid::Uuid, Path, description = "Maintenance request ID")),
    responses(
        (status = 200, description = "Maintenance request updated", body = MaintenanceRequestResponse),
        (status = 403, description = "Workflow fields require staff permissions"),
        (status = 404, description = "Maintenance request not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_maintenance_request(
    State(state): State<AppState>,
    Path(request_id): Path<MaintenanceRequestId>,
    current_user: RequiresPermission<resource::MaintenanceRequests, operation::UpdateOwn>,
    Json(update): Json<MaintenanceRequestUpdate>,
) -> Result<Json<MaintenanceRequestResponse>> {
    if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(Error::BadRequest {
            message: "Title is required".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let existing = visible_request(&mut tx, &current_user, request_id).await?;
    if !can_update_own_resource(&current_user, Resource::MaintenanceRequests, existing.reported_by) {
        return Err(request_not_found(request_id));
    }
    if update.touches_workflow() {
        require_permission(&current_user, Resource::MaintenanceRequests, Operation::UpdateAll)?;
    }

    let new_status = update.status.filter(|status| *status != existing.status);
    let updated = MaintenanceRequests::new(&mut tx)
        .update(request_id, &MaintenanceRequestUpdateDBRequest::from(update))
        .await?;

    if let Some(status) = new_status {
        Notifications::new(&mut tx)
            .create(&NotificationCreateDBRequest {
                user_id: updated.reported_by,
                title: "Maintenance update".to_string(),
                message: format!("Your request '{}' is now {}", updated.title, status.label()),
            })
            .await?;
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(MaintenanceRequestResponse::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/maintenance-requests/{request_id}",
    tag = "maintenance",
    summary = "Delete maintenance request",
    params(("request_id" = uuid::Uuid, Path, description = "Maintenance request ID")),
    responses(
        (status = 204, description = "Maintenance request deleted"),
        (status = 404, description = "Maintenance request not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_maintenance_request(
    State(state): State<AppState>,
    Path(request_id): Path<MaintenanceRequestId>,
    current_user: RequiresPermission<resource::MaintenanceRequests, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let request = visible_request(&mut tx, &current_user, request_id).await?;
    if !can_delete_own_resource(&current_user, Resource::MaintenanceRequests, request.reported_by) {
        return Err(request_not_found(request_id));
    }

    let storage_keys = MaintenanceAttachments::new(&mut tx).storage_keys_for_request(request_id).await?;
    MaintenanceRequests::new(&mut tx).delete(request_id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    // Metadata rows are gone with the request; blobs are best effort
    for key in storage_keys {
        if let Err(e) = state.file_storage.delete(&key).await {
            tracing::warn!("Failed to delete attachment blob {}: {:#}", key, e);
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/maintenance-requests/{request_id}/comments",
    tag = "maintenance",
    summary = "List comments",
    params(("request_id" = uuid::Uuid, Path, description = "Maintenance request ID")),
    responses(
        (status = 200, description = "Comments, oldest first", body = Vec<CommentResponse>),
        (status = 404, description = "Maintenance request not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(request_id): Path<MaintenanceRequestId>,
    current_user: RequiresPermission<resource::MaintenanceRequests, operation::ReadOwn>,
) -> Result<Json<Vec<CommentResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    visible_request(&mut conn, &current_user, request_id).await?;
    let comments = MaintenanceComments::new(&mut conn).list_for_request(request_id).await?;
    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/maintenance-requests/{request_id}/comments",
    tag = "maintenance",
    summary = "Add comment",
    request_body = CommentCreate,
    params(("request_id" = uuid::Uuid, Path, description = "Maintenance request ID")),
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Empty comment"),
        (status = 404, description = "Maintenance request not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_comment(
    State(state): State<AppState>,
    Path(request_id): Path<MaintenanceRequestId>,
    current_user: RequiresPermission<resource::MaintenanceRequests, operation::CreateOwn>,
    Json(create): Json<CommentCreate>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    let body = create.body.trim();
    if body.is_empty() {
        return Err(Error::BadRequest {
            message: "Comment body is required".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    visible_request(&mut conn, &current_user, request_id).await?;
    let comment = MaintenanceComments::new(&mut conn)
        .create(&CommentCreateDBRequest {
            request_id,
            user_id: current_user.id,
            body: body.to_string(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

/// Only the author or an admin may remove a comment
#[utoipa::path(
    delete,
    path = "/maintenance-requests/{request_id}/comments/{comment_id}",
    tag = "maintenance",
    summary = "Delete comment",
    params(
        ("request_id" = uuid::Uuid, Path, description = "Maintenance request ID"),
        ("comment_id" = uuid::Uuid, Path, description = "Comment ID"),
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 404, description = "Comment not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_comment(
    State(state): State<AppState>,
    Path((request_id, comment_id)): Path<(MaintenanceRequestId, CommentId)>,
    current_user: RequiresPermission<resource::MaintenanceRequests, operation::ReadOwn>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    visible_request(&mut conn, &current_user, request_id).await?;

    let mut comments = MaintenanceComments::new(&mut conn);
    match comments.get_by_id(comment_id).await? {
        Some(comment) if comment.request_id == request_id && (current_user.is_admin() || comment.user_id == Some(current_user.id)) => {
            comments.delete(comment_id).await?;
            Ok(StatusCode::NO_CONTENT)
        }
        _ => Err(Error::NotFound {
            resource: "Comment".to_string(),
            id: comment_id.to_string(),
        }),
    }
}

#[utoipa::path(
    get,
    path = "/maintenance-requests/{request_id}/attachments",
    tag = "maintenance",
    summary = "List attachments",
    params(("request_id" = uuid::Uuid, Path, description = "Maintenance request ID")),
    responses(
        (status = 200, description = "Attachment metadata", body = Vec<AttachmentResponse>),
        (status = 404, description = "Maintenance request not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_attachments(
    State(state): State<AppState>,
    Path(request_id): Path<MaintenanceRequestId>,
    current_user: RequiresPermission<resource::MaintenanceRequests, operation::ReadOwn>,
) -> Result<Json<Vec<AttachmentResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    visible_request(&mut conn, &current_user, request_id).await?;
    let attachments = MaintenanceAttachments::new(&mut conn).list_for_request(request_id).await?;
    Ok(Json(attachments.into_iter().map(AttachmentResponse::from).collect()))
}

fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { message: e.body_text() }
    } else {
        Error::BadRequest {
            message: format!("Failed to parse multipart data: {}", e.body_text()),
        }
    }
}

/// Upload a file (multipart field `file`) and attach it to the request
#[utoipa::path(
    post,
    path = "/maintenance-requests/{request_id}/attachments",
    tag = "maintenance",
    summary = "Upload attachment",
    request_body(content = AttachmentUpload, content_type = "multipart/form-data"),
    params(("request_id" = uuid::Uuid, Path, description = "Maintenance request ID")),
    responses(
        (status = 201, description = "Attachment stored", body = AttachmentResponse),
        (status = 400, description = "Missing file field"),
        (status = 404, description = "Maintenance request not found"),
        (status = 413, description = "File exceeds the configured maximum size"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn upload_attachment(
    State(state): State<AppState>,
    Path(request_id): Path<MaintenanceRequestId>,
    current_user: RequiresPermission<resource::MaintenanceRequests, operation::CreateOwn>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AttachmentResponse>)> {
    {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        visible_request(&mut conn, &current_user, request_id).await?;
    }

    let max_file_size = state.config.attachments.max_file_size;
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(str::to_string).unwrap_or_else(|| "attachment".to_string());
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| mime_guess::from_path(&file_name).first_or_octet_stream().to_string());

        let mut content = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            // Fail as soon as the limit is crossed instead of buffering the whole body
            if (content.len() + chunk.len()) as u64 > max_file_size {
                tracing::warn!(
                    request_id = %abbrev_uuid(&request_id),
                    max_file_size = max_file_size,
                    "Attachment size limit exceeded, aborting upload"
                );
                return Err(Error::PayloadTooLarge {
                    message: format!("File size exceeds maximum allowed size of {max_file_size} bytes"),
                });
            }
            content.extend_from_slice(&chunk);
        }
        upload = Some((file_name, content_type, content));
        break;
    }

    let Some((file_name, content_type, content)) = upload else {
        return Err(Error::BadRequest {
            message: "Multipart field 'file' is required".to_string(),
        });
    };

    let size_bytes = content.len() as i64;
    let stored = state
        .file_storage
        .store(FileStorageRequest {
            content,
            content_type: content_type.clone(),
        })
        .await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let created = MaintenanceAttachments::new(&mut conn)
        .create(&AttachmentCreateDBRequest {
            request_id,
            uploaded_by: current_user.id,
            file_name,
            content_type,
            size_bytes,
            storage_key: stored.storage_key.clone(),
        })
        .await;

    match created {
        Ok(attachment) => {
            tracing::info!(
                "Stored attachment {} ({} bytes) on request {}",
                abbrev_uuid(&attachment.id),
                size_bytes,
                abbrev_uuid(&request_id)
            );
            Ok((StatusCode::CREATED, Json(AttachmentResponse::from(attachment))))
        }
        Err(e) => {
            // Don't leave an orphaned blob behind
            if let Err(cleanup) = state.file_storage.delete(&stored.storage_key).await {
                tracing::warn!("Failed to remove orphaned attachment blob {}: {:#}", stored.storage_key, cleanup);
            }
            Err(e.into())
        }
    }
}

fn attachment_not_found(attachment_id: AttachmentId) -> Error {
    Error::NotFound {
        resource: "Attachment".to_string(),
        id: attachment_id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/maintenance-requests/{request_id}/attachments/{attachment_id}/content",
    tag = "maintenance",
    summary = "Download attachment",
    params(
        ("request_id" = uuid::Uuid, Path, description = "Maintenance request ID"),
        ("attachment_id" = uuid::Uuid, Path, description = "Attachment ID"),
    ),
    responses(
        (status = 200, description = "Attachment content", content_type = "application/octet-stream"),
        (status = 404, description = "Attachment not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_attachment_content(
    State(state): State<AppState>,
    Path((request_id, attachment_id)): Path<(MaintenanceRequestId, AttachmentId)>,
    current_user: RequiresPermission<resource::MaintenanceRequests, operation::ReadOwn>,
) -> Result<Response> {
    let attachment = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        visible_request(&mut conn, &current_user, request_id).await?;
        match MaintenanceAttachments::new(&mut conn).get_by_id(attachment_id).await? {
            Some(attachment) if attachment.request_id == request_id => attachment,
            _ => return Err(attachment_not_found(attachment_id)),
        }
    };

    let content = state.file_storage.retrieve(&attachment.storage_key).await?;
    let disposition = format!("attachment; filename=\"{}\"", attachment.file_name.replace('"', ""));

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, attachment.content_type), (header::CONTENT_DISPOSITION, disposition)],
        content,
    )
        .into_response())
}

/// Only the uploader or an admin may remove an attachment
#[utoipa::path(
    delete,
    path = "/maintenance-requests/{request_id}/attachments/{attachment_id}",
    tag = "maintenance",
    summary = "Delete attachment",
    params(
        ("request_id" = uuid::Uuid, Path, description = "Maintenance request ID"),
        ("attachment_id" = uuid::Uuid, Path, description = "Attachment ID"),
    ),
    responses(
        (status = 204, description = "Attachment deleted"),
        (status = 404, description = "Attachment not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_attachment(
    State(state): State<AppState>,
    Path((request_id, attachment_id)): Path<(MaintenanceRequestId, AttachmentId)>,
    current_user: RequiresPermission<resource::MaintenanceRequests, operation::ReadOwn>,
) -> Result<StatusCode> {
    let storage_key = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        visible_request(&mut conn, &current_user, request_id).await?;

        let mut attachments = MaintenanceAttachments::new(&mut conn);
        match attachments.get_by_id(attachment_id).await? {
            Some(attachment)
                if attachment.request_id == request_id
                    && (current_user.is_admin() || attachment.uploaded_by == Some(current_user.id)) =>
            {
                attachments.delete(attachment_id).await?;
                attachment.storage_key
            }
            _ => return Err(attachment_not_found(attachment_id)),
        }
    };

    // The metadata row is gone; the blob is best effort
    if let Err(e) = state.file_storage.delete(&storage_key).await {
        tracing::warn!("Failed to delete attachment blob {}: {:#}", storage_key, e);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{
            maintenance::{AttachmentResponse, CommentResponse, MaintenanceRequestResponse, MaintenanceStatus},
            notifications::NotificationResponse,
            pagination::PaginatedResponse,
            units::UnitResponse,
            users::{Role, UserResponse},
        },
        test_utils::*,
    };
    use axum::http::StatusCode;
    use axum_test::{
        TestServer,
        multipart::{MultipartForm, Part},
    };
    use serde_json::json;
    use sqlx::PgPool;

    async fn create_unit(server: &TestServer, admin: &UserResponse, code: &str, owner: &UserResponse) -> UnitResponse {
        let (name, value) = add_auth_headers(admin);
        server
            .post("/api/v1/units")
            .add_header(name, value)
            .json(&json!({"code": code, "owner_id": owner.id}))
            .await
            .json()
    }

    async fn report(server: &TestServer, user: &UserResponse, title: &str) -> MaintenanceRequestResponse {
        let (name, value) = add_auth_headers(user);
        let response = server
            .post("/api/v1/maintenance-requests")
            .add_header(name, value)
            .json(&json!({"title": title, "description": "Water on the floor"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_residents_only_reference_owned_units(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let alice = create_test_user(&pool, Role::Resident).await;
        let bob = create_test_user(&pool, Role::Resident).await;
        let alice_unit = create_unit(&server, &admin, "TA-1-A", &alice).await;

        let (name, value) = add_auth_headers(&bob);
        server
            .post("/api/v1/maintenance-requests")
            .add_header(name, value)
            .json(&json!({"unit_id": alice_unit.id, "title": "Leak"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (name, value) = add_auth_headers(&alice);
        let created: MaintenanceRequestResponse = server
            .post("/api/v1/maintenance-requests")
            .add_header(name, value)
            .json(&json!({"unit_id": alice_unit.id, "title": "Leak", "priority": "HIGH"}))
            .await
            .json();
        assert_eq!(created.unit_code.as_deref(), Some("TA-1-A"));
        assert_eq!(created.status, MaintenanceStatus::Pending);
        assert_eq!(created.reported_by, alice.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_visibility_by_role(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let alice = create_test_user(&pool, Role::Resident).await;
        let bob = create_test_user(&pool, Role::Resident).await;
        let staff = create_test_user(&pool, Role::Staff).await;

        let alice_request = report(&server, &alice, "Broken light").await;
        report(&server, &bob, "Noisy pump").await;

        let (name, value) = add_auth_headers(&bob);
        let page: PaginatedResponse<MaintenanceRequestResponse> =
            server.get("/api/v1/maintenance-requests").add_header(name.clone(), value.clone()).await.json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].title, "Noisy pump");
        server
            .get(&format!("/api/v1/maintenance-requests/{}", alice_request.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let (name, value) = add_auth_headers(&staff);
        let page: PaginatedResponse<MaintenanceRequestResponse> =
            server.get("/api/v1/maintenance-requests").add_header(name, value).await.json();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.data[0].title, "Noisy pump");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_status_changes_need_staff_and_notify_reporter(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let resident = create_test_user(&pool, Role::Resident).await;
        let staff = create_test_user(&pool, Role::Staff).await;
        let request = report(&server, &resident, "Elevator stuck").await;
        let path = format!("/api/v1/maintenance-requests/{}", request.id);

        let (name, value) = add_auth_headers(&resident);
        server
            .patch(&path)
            .add_header(name.clone(), value.clone())
            .json(&json!({"status": "RESOLVED"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        let retitled: MaintenanceRequestResponse = server
            .patch(&path)
            .add_header(name.clone(), value.clone())
            .json(&json!({"title": "Elevator stuck on 3rd floor"}))
            .await
            .json();
        assert_eq!(retitled.title, "Elevator stuck on 3rd floor");

        let (staff_name, staff_value) = add_auth_headers(&staff);
        let resolved: MaintenanceRequestResponse = server
            .patch(&path)
            .add_header(staff_name.clone(), staff_value.clone())
            .json(&json!({"status": "RESOLVED", "assigned_to": staff.id}))
            .await
            .json();
        assert_eq!(resolved.status, MaintenanceStatus::Resolved);
        assert_eq!(resolved.assigned_to, Some(staff.id));
        assert!(resolved.resolved_at.is_some());

        // Same status again is not a change
        server
            .patch(&path)
            .add_header(staff_name, staff_value)
            .json(&json!({"status": "RESOLVED"}))
            .await
            .assert_status_ok();

        let inbox: PaginatedResponse<NotificationResponse> = server.get("/api/v1/notifications").add_header(name, value).await.json();
        assert_eq!(inbox.total_count, 1);
        assert_eq!(inbox.data[0].title, "Maintenance update");
        assert!(inbox.data[0].message.contains("resolved"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_comments(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let resident = create_test_user(&pool, Role::Resident).await;
        let staff = create_test_user(&pool, Role::Staff).await;
        let request = report(&server, &resident, "Gate does not close").await;
        let path = format!("/api/v1/maintenance-requests/{}/comments", request.id);

        let (staff_name, staff_value) = add_auth_headers(&staff);
        let staff_comment: CommentResponse = server
            .post(&path)
            .add_header(staff_name.clone(), staff_value.clone())
            .json(&json!({"body": "Technician booked for Monday"}))
            .await
            .json();
        assert_eq!(staff_comment.user_id, Some(staff.id));

        let (name, value) = add_auth_headers(&resident);
        server
            .post(&path)
            .add_header(name.clone(), value.clone())
            .json(&json!({"body": "   "}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .post(&path)
            .add_header(name.clone(), value.clone())
            .json(&json!({"body": "Thanks"}))
            .await
            .assert_status(StatusCode::CREATED);

        let comments: Vec<CommentResponse> = server.get(&path).add_header(name.clone(), value.clone()).await.json();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].body, "Technician booked for Monday");

        // Not the author
        server
            .delete(&format!("{path}/{}", staff_comment.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete(&format!("{path}/{}", staff_comment.id))
            .add_header(staff_name, staff_value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_attachment_lifecycle(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let resident = create_test_user(&pool, Role::Resident).await;
        let request = report(&server, &resident, "Cracked window").await;
        let path = format!("/api/v1/maintenance-requests/{}/attachments", request.id);
        let (name, value) = add_auth_headers(&resident);

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"window photo".to_vec()).file_name("window.txt").mime_type("text/plain"),
        );
        let response = server.post(&path).add_header(name.clone(), value.clone()).multipart(form).await;
        response.assert_status(StatusCode::CREATED);
        let attachment: AttachmentResponse = response.json();
        assert_eq!(attachment.file_name, "window.txt");
        assert_eq!(attachment.size_bytes, 12);

        let listed: Vec<AttachmentResponse> = server.get(&path).add_header(name.clone(), value.clone()).await.json();
        assert_eq!(listed.len(), 1);

        let content = server
            .get(&format!("{path}/{}/content", attachment.id))
            .add_header(name.clone(), value.clone())
            .await;
        content.assert_status_ok();
        assert_eq!(content.text(), "window photo");

        server
            .delete(&format!("{path}/{}", attachment.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&format!("{path}/{}/content", attachment.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_attachment_delete_survives_blob_failure(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let resident = create_test_user(&pool, Role::Resident).await;
        let request = report(&server, &resident, "Broken tile").await;
        let path = format!("/api/v1/maintenance-requests/{}/attachments", request.id);
        let (name, value) = add_auth_headers(&resident);

        let form = MultipartForm::new().add_part("file", Part::bytes(b"tile".to_vec()).file_name("tile.txt"));
        let attachment: AttachmentResponse = server.post(&path).add_header(name.clone(), value.clone()).multipart(form).await.json();

        // A key the storage backend refuses makes the blob delete fail
        sqlx::query("UPDATE maintenance_attachments SET storage_key = '../outside.dat' WHERE id = $1")
            .bind(attachment.id)
            .execute(&pool)
            .await
            .unwrap();

        server
            .delete(&format!("{path}/{}", attachment.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let listed: Vec<AttachmentResponse> = server.get(&path).add_header(name, value).await.json();
        assert!(listed.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_oversized_attachment_rejected(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let resident = create_test_user(&pool, Role::Resident).await;
        let request = report(&server, &resident, "Mould").await;
        let (name, value) = add_auth_headers(&resident);

        // Test config allows 1 MiB
        let form = MultipartForm::new().add_part("file", Part::bytes(vec![0u8; 1024 * 1024 + 1]).file_name("big.bin"));
        server
            .post(&format!("/api/v1/maintenance-requests/{}/attachments", request.id))
            .add_header(name, value)
            .multipart(form)
            .await
            .assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_request(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let resident = create_test_user(&pool, Role::Resident).await;
        let staff = create_test_user(&pool, Role::Staff).await;
        let admin = create_test_admin_user(&pool).await;
        let first = report(&server, &resident, "Paint peeling").await;
        let second = report(&server, &resident, "Door squeaks").await;

        // Staff can read everything but only delete their own
        let (name, value) = add_auth_headers(&staff);
        server
            .delete(&format!("/api/v1/maintenance-requests/{}", first.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let (name, value) = add_auth_headers(&resident);
        server
            .delete(&format!("/api/v1/maintenance-requests/{}", first.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let (name, value) = add_auth_headers(&admin);
        server
            .delete(&format!("/api/v1/maintenance-requests/{}", second.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }
}
