//! Database repository for the audit trail of user activity.

use crate::db::{
    errors::Result,
    models::notifications::{ActivityLogCreateDBRequest, ActivityLogDBResponse},
};
use crate::types::{ActivityLogId, UserId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct ActivityLogFilter {
    pub skip: i64,
    pub limit: i64,
    pub user_id: Option<UserId>,
    pub action: Option<String>,
}

impl ActivityLogFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            user_id: None,
            action: None,
        }
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_action(mut self, action: String) -> Self {
        self.action = Some(action);
        self
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ActivityLogFilter) {
    if let Some(user_id) = filter.user_id {
        query.push(" AND l.user_id = ");
        query.push_bind(user_id);
    }
    if let Some(ref action) = filter.action {
        query.push(" AND l.action = ");
        query.push_bind(action.clone());
    }
}

/// Entries are append-only
pub struct ActivityLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ActivityLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(action = %request.action), err)]
    pub async fn create(&mut self, request: &ActivityLogCreateDBRequest) -> Result<ActivityLogDBResponse> {
        let entry = sqlx::query_as::<_, ActivityLogDBResponse>(
            r#"
            WITH inserted AS (
                INSERT INTO activity_logs (user_id, action, details)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            SELECT l.id, l.user_id, u.username, l.action, l.details, l.created_at
            FROM inserted l
            LEFT JOIN users u ON u.id = l.user_id
            "#,
        )
        .bind(request.user_id)
        .bind(&request.action)
        .bind(&request.details)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(entry)
    }

    #[instrument(skip(self), fields(entry_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: ActivityLogId) -> Result<Option<ActivityLogDBResponse>> {
        let entry = sqlx::query_as::<_, ActivityLogDBResponse>(
            "SELECT l.id, l.user_id, u.username, l.action, l.details, l.created_at FROM activity_logs l LEFT JOIN users u ON u.id = l.user_id WHERE l.id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(entry)
    }

    /// Newest first
    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &ActivityLogFilter) -> Result<Vec<ActivityLogDBResponse>> {
        let mut query = QueryBuilder::new(
            "SELECT l.id, l.user_id, u.username, l.action, l.details, l.created_at FROM activity_logs l LEFT JOIN users u ON u.id = l.user_id WHERE 1=1",
        );
        push_filters(&mut query, filter);
        query.push(" ORDER BY l.created_at DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let entries = query.build_query_as::<ActivityLogDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(entries)
    }

    pub async fn count(&mut self, filter: &ActivityLogFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM activity_logs l WHERE 1=1");
        push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }
}
