//! Database repository for in-app notifications.

use crate::db::{
    errors::{DbError, Result},
    models::notifications::{NotificationCreateDBRequest, NotificationDBResponse},
};
use crate::types::{NotificationId, UserId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct NotificationFilter {
    pub skip: i64,
    pub limit: i64,
    pub user_id: Option<UserId>,
    pub unread_only: bool,
}

impl NotificationFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            user_id: None,
            unread_only: false,
        }
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn unread(mut self) -> Self {
        self.unread_only = true;
        self
    }
}

const COLUMNS: &str = "id, user_id, title, message, is_read, created_at";

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &NotificationFilter) {
    if let Some(user_id) = filter.user_id {
        query.push(" AND user_id = ");
        query.push_bind(user_id);
    }
    if filter.unread_only {
        query.push(" AND NOT is_read");
    }
}

pub struct Notifications<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Notifications<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), title = %request.title), err)]
    pub async fn create(&mut self, request: &NotificationCreateDBRequest) -> Result<NotificationDBResponse> {
        let notification = sqlx::query_as::<_, NotificationDBResponse>(&format!(
            "INSERT INTO notifications (user_id, title, message) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        ))
        .bind(request.user_id)
        .bind(&request.title)
        .bind(&request.message)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(notification)
    }

    #[instrument(skip(self), fields(notification_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: NotificationId) -> Result<Option<NotificationDBResponse>> {
        let notification = sqlx::query_as::<_, NotificationDBResponse>(&format!("SELECT {COLUMNS} FROM notifications WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(notification)
    }

    /// Newest first
    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &NotificationFilter) -> Result<Vec<NotificationDBResponse>> {
        let mut query = QueryBuilder::new(format!("SELECT {COLUMNS} FROM notifications WHERE 1=1"));
        push_filters(&mut query, filter);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let notifications = query.build_query_as::<NotificationDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(notifications)
    }

    pub async fn count(&mut self, filter: &NotificationFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM notifications WHERE 1=1");
        push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(notification_id = %abbrev_uuid(&id)), err)]
    pub async fn set_read(&mut self, id: NotificationId, is_read: bool) -> Result<NotificationDBResponse> {
        let notification = sqlx::query_as::<_, NotificationDBResponse>(&format!(
            "UPDATE notifications SET is_read = $2 WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(is_read)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(notification)
    }

    /// Mark every unread notification of a user as read, returning how many changed
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn mark_all_read(&mut self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(notification_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: NotificationId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
