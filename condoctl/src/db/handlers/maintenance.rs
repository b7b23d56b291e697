//! Database repositories for maintenance requests and the comments and attachments hanging off them.

use crate::api::models::maintenance::MaintenanceStatus;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::maintenance::{
        AttachmentCreateDBRequest, AttachmentDBResponse, CommentCreateDBRequest, CommentDBResponse, MaintenanceRequestCreateDBRequest,
        MaintenanceRequestDBResponse, MaintenanceRequestUpdateDBRequest,
    },
};
use crate::types::{AttachmentId, CommentId, MaintenanceRequestId, UnitId, UserId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct MaintenanceRequestFilter {
    pub skip: i64,
    pub limit: i64,
    pub reported_by: Option<UserId>,
    pub status: Option<MaintenanceStatus>,
    pub unit_id: Option<UnitId>,
    pub assigned_to: Option<UserId>,
}

impl MaintenanceRequestFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            reported_by: None,
            status: None,
            unit_id: None,
            assigned_to: None,
        }
    }

    pub fn with_reporter(mut self, user_id: UserId) -> Self {
        self.reported_by = Some(user_id);
        self
    }

    pub fn with_status(mut self, status: MaintenanceStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_unit(mut self, unit_id: UnitId) -> Self {
        self.unit_id = Some(unit_id);
        self
    }

    pub fn with_assignee(mut self, user_id: UserId) -> Self {
        self.assigned_to = Some(user_id);
        self
    }
}

const REQUEST_SELECT: &str = r#"
    SELECT m.id, m.unit_id, un.code AS unit_code,
           m.reported_by, reporter.username AS reported_by_username,
           m.assigned_to, assignee.username AS assigned_to_username,
           m.title, m.description, m.status, m.priority,
           m.created_at, m.updated_at, m.resolved_at
    FROM maintenance_requests m
    JOIN users reporter ON reporter.id = m.reported_by
    LEFT JOIN users assignee ON assignee.id = m.assigned_to
    LEFT JOIN units un ON un.id = m.unit_id
"#;

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &MaintenanceRequestFilter) {
    if let Some(reported_by) = filter.reported_by {
        query.push(" AND m.reported_by = ");
        query.push_bind(reported_by);
    }
    if let Some(status) = filter.status {
        query.push(" AND m.status = ");
        query.push_bind(status);
    }
    if let Some(unit_id) = filter.unit_id {
        query.push(" AND m.unit_id = ");
        query.push_bind(unit_id);
    }
    if let Some(assigned_to) = filter.assigned_to {
        query.push(" AND m.assigned_to = ");
        query.push_bind(assigned_to);
    }
}

pub struct MaintenanceRequests<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for MaintenanceRequests<'c> {
    type CreateRequest = MaintenanceRequestCreateDBRequest;
    type UpdateRequest = MaintenanceRequestUpdateDBRequest;
    type Response = MaintenanceRequestDBResponse;
    type Id = MaintenanceRequestId;
    type Filter = MaintenanceRequestFilter;

    #[instrument(skip(self, request), fields(reported_by = %abbrev_uuid(&request.reported_by)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id = sqlx::query_scalar::<_, MaintenanceRequestId>(
            r#"
            INSERT INTO maintenance_requests (unit_id, reported_by, title, description, priority, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(request.unit_id)
        .bind(request.reported_by)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.priority)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(request_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let request = sqlx::query_as::<_, MaintenanceRequestDBResponse>(&format!("{REQUEST_SELECT} WHERE m.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(request)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let requests = sqlx::query_as::<_, MaintenanceRequestDBResponse>(&format!("{REQUEST_SELECT} WHERE m.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(requests.into_iter().map(|r| (r.id, r)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(REQUEST_SELECT);
        query.push(" WHERE 1=1");
        push_filters(&mut query, filter);

        query.push(" ORDER BY m.created_at DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let requests = query
            .build_query_as::<MaintenanceRequestDBResponse>()
            .fetch_all(&mut *self.db)
            .await?;
        Ok(requests)
    }

    #[instrument(skip(self), fields(request_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM maintenance_requests WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(request_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // resolved_at follows the status: stamped on entering RESOLVED, cleared on leaving it
        sqlx::query_scalar::<_, MaintenanceRequestId>(
            r#"
            UPDATE maintenance_requests SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                priority = COALESCE($4, priority),
                status = COALESCE($5, status),
                assigned_to = COALESCE($6, assigned_to),
                resolved_at = CASE
                    WHEN $5::maintenance_status IS NULL THEN resolved_at
                    WHEN $5::maintenance_status = 'RESOLVED' THEN COALESCE(resolved_at, NOW())
                    ELSE NULL
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.priority)
        .bind(request.status)
        .bind(request.assigned_to)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> MaintenanceRequests<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &MaintenanceRequestFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM maintenance_requests m WHERE 1=1");
        push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }
}

/// Comments are immutable once posted
pub struct MaintenanceComments<'c> {
    db: &'c mut PgConnection,
}

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.request_id, c.user_id, u.username, c.body, c.created_at
    FROM maintenance_comments c
    LEFT JOIN users u ON u.id = c.user_id
"#;

impl<'c> MaintenanceComments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(request_id = %abbrev_uuid(&request.request_id)), err)]
    pub async fn create(&mut self, request: &CommentCreateDBRequest) -> Result<CommentDBResponse> {
        let comment = sqlx::query_as::<_, CommentDBResponse>(
            r#"
            WITH inserted AS (
                INSERT INTO maintenance_comments (request_id, user_id, body)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            SELECT c.id, c.request_id, c.user_id, u.username, c.body, c.created_at
            FROM inserted c
            LEFT JOIN users u ON u.id = c.user_id
            "#,
        )
        .bind(request.request_id)
        .bind(request.user_id)
        .bind(&request.body)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(comment)
    }

    /// Comments of one request, oldest first
    #[instrument(skip(self), fields(request_id = %abbrev_uuid(&request_id)), err)]
    pub async fn list_for_request(&mut self, request_id: MaintenanceRequestId) -> Result<Vec<CommentDBResponse>> {
        let comments = sqlx::query_as::<_, CommentDBResponse>(&format!(
            "{COMMENT_SELECT} WHERE c.request_id = $1 ORDER BY c.created_at ASC"
        ))
        .bind(request_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(comments)
    }

    #[instrument(skip(self), fields(comment_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: CommentId) -> Result<Option<CommentDBResponse>> {
        let comment = sqlx::query_as::<_, CommentDBResponse>(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(comment)
    }

    #[instrument(skip(self), fields(comment_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: CommentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM maintenance_comments WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct MaintenanceAttachments<'c> {
    db: &'c mut PgConnection,
}

const ATTACHMENT_COLUMNS: &str = "id, request_id, uploaded_by, file_name, content_type, size_bytes, storage_key, uploaded_at";

impl<'c> MaintenanceAttachments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(request_id = %abbrev_uuid(&request.request_id), size = request.size_bytes), err)]
    pub async fn create(&mut self, request: &AttachmentCreateDBRequest) -> Result<AttachmentDBResponse> {
        let attachment = sqlx::query_as::<_, AttachmentDBResponse>(&format!(
            r#"
            INSERT INTO maintenance_attachments (request_id, uploaded_by, file_name, content_type, size_bytes, storage_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ATTACHMENT_COLUMNS}
            "#
        ))
        .bind(request.request_id)
        .bind(request.uploaded_by)
        .bind(&request.file_name)
        .bind(&request.content_type)
        .bind(request.size_bytes)
        .bind(&request.storage_key)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(attachment)
    }

    #[instrument(skip(self), fields(attachment_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: AttachmentId) -> Result<Option<AttachmentDBResponse>> {
        let attachment = sqlx::query_as::<_, AttachmentDBResponse>(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM maintenance_attachments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(attachment)
    }

    #[instrument(skip(self), fields(request_id = %abbrev_uuid(&request_id)), err)]
    pub async fn list_for_request(&mut self, request_id: MaintenanceRequestId) -> Result<Vec<AttachmentDBResponse>> {
        let attachments = sqlx::query_as::<_, AttachmentDBResponse>(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM maintenance_attachments WHERE request_id = $1 ORDER BY uploaded_at ASC"
        ))
        .bind(request_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(attachments)
    }

    #[instrument(skip(self), fields(attachment_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: AttachmentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM maintenance_attachments WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Storage keys of every attachment of a request, used to clean up blobs on deletion
    pub async fn storage_keys_for_request(&mut self, request_id: MaintenanceRequestId) -> Result<Vec<String>> {
        let keys = sqlx::query_scalar::<_, String>("SELECT storage_key FROM maintenance_attachments WHERE request_id = $1")
            .bind(request_id)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::maintenance::MaintenancePriority;
    use sqlx::PgPool;

    async fn create_user(conn: &mut PgConnection, username: &str) -> UserId {
        sqlx::query_scalar("INSERT INTO users (username, email) VALUES ($1, $1 || '@example.com') RETURNING id")
            .bind(username)
            .fetch_one(conn)
            .await
            .unwrap()
    }

    fn new_request(reported_by: UserId, title: &str) -> MaintenanceRequestCreateDBRequest {
        MaintenanceRequestCreateDBRequest {
            unit_id: None,
            reported_by,
            title: title.to_string(),
            description: "Leaking since Monday".to_string(),
            priority: MaintenancePriority::Medium,
            status: MaintenanceStatus::Pending,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_resolving_sets_and_clears_resolved_at(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let reporter = create_user(&mut conn, "reporter").await;
        let staff = create_user(&mut conn, "fixer").await;
        let mut repo = MaintenanceRequests::new(&mut conn);

        let created = repo.create(&new_request(reporter, "Leaking pipe")).await.unwrap();
        assert_eq!(created.status, MaintenanceStatus::Pending);
        assert_eq!(created.reported_by_username, "reporter");
        assert!(created.resolved_at.is_none());

        let resolved = repo
            .update(
                created.id,
                &MaintenanceRequestUpdateDBRequest {
                    status: Some(MaintenanceStatus::Resolved),
                    assigned_to: Some(staff),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(resolved.resolved_at.is_some());
        assert_eq!(resolved.assigned_to_username.as_deref(), Some("fixer"));

        let reopened = repo
            .update(
                created.id,
                &MaintenanceRequestUpdateDBRequest {
                    status: Some(MaintenanceStatus::InProgress),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(reopened.resolved_at.is_none());
        assert_eq!(reopened.assigned_to, Some(staff));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let alice = create_user(&mut conn, "alice").await;
        let bob = create_user(&mut conn, "bob").await;
        let mut repo = MaintenanceRequests::new(&mut conn);
        repo.create(&new_request(alice, "Door")).await.unwrap();
        repo.create(&new_request(alice, "Window")).await.unwrap();
        repo.create(&new_request(bob, "Light")).await.unwrap();

        let mine = MaintenanceRequestFilter::new(0, 10).with_reporter(alice);
        assert_eq!(repo.list(&mine).await.unwrap().len(), 2);
        assert_eq!(repo.count(&mine).await.unwrap(), 2);

        let pending = MaintenanceRequestFilter::new(0, 10).with_status(MaintenanceStatus::Pending);
        assert_eq!(repo.count(&pending).await.unwrap(), 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_comments_and_attachments(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let reporter = create_user(&mut conn, "commenter").await;
        let request = MaintenanceRequests::new(&mut conn)
            .create(&new_request(reporter, "Elevator"))
            .await
            .unwrap();

        let comment = MaintenanceComments::new(&mut conn)
            .create(&CommentCreateDBRequest {
                request_id: request.id,
                user_id: reporter,
                body: "Still broken".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(comment.username.as_deref(), Some("commenter"));

        let attachment = MaintenanceAttachments::new(&mut conn)
            .create(&AttachmentCreateDBRequest {
                request_id: request.id,
                uploaded_by: reporter,
                file_name: "photo.jpg".to_string(),
                content_type: "image/jpeg".to_string(),
                size_bytes: 1024,
                storage_key: "ab/abc.dat".to_string(),
            })
            .await
            .unwrap();

        let mut attachments = MaintenanceAttachments::new(&mut conn);
        assert_eq!(attachments.list_for_request(request.id).await.unwrap().len(), 1);
        assert_eq!(attachments.storage_keys_for_request(request.id).await.unwrap(), vec!["ab/abc.dat".to_string()]);

        assert!(MaintenanceRequests::new(&mut conn).delete(request.id).await.unwrap());
        assert!(MaintenanceAttachments::new(&mut conn).get_by_id(attachment.id).await.unwrap().is_none());
        assert!(MaintenanceComments::new(&mut conn).list_for_request(request.id).await.unwrap().is_empty());
    }
}
