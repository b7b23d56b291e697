//! Database repository for common area reservations.

use crate::api::models::common_areas::ReservationStatus;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::common_areas::{ReservationCreateDBRequest, ReservationDBResponse, ReservationUpdateDBRequest},
};
use crate::types::{CommonAreaId, ReservationId, UserId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct ReservationFilter {
    pub skip: i64,
    pub limit: i64,
    pub user_id: Option<UserId>,
    pub area_id: Option<CommonAreaId>,
    pub status: Option<ReservationStatus>,
}

impl ReservationFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            user_id: None,
            area_id: None,
            status: None,
        }
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_area(mut self, area_id: CommonAreaId) -> Self {
        self.area_id = Some(area_id);
        self
    }

    pub fn with_status(mut self, status: ReservationStatus) -> Self {
        self.status = Some(status);
        self
    }
}

const RESERVATION_SELECT: &str = r#"
    SELECT r.id, r.area_id, a.name AS area_name, r.user_id, u.username,
           r.start_time, r.end_time, r.status, r.notes, r.created_at, r.updated_at
    FROM reservations r
    JOIN common_areas a ON a.id = r.area_id
    JOIN users u ON u.id = r.user_id
"#;

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ReservationFilter) {
    if let Some(user_id) = filter.user_id {
        query.push(" AND r.user_id = ");
        query.push_bind(user_id);
    }
    if let Some(area_id) = filter.area_id {
        query.push(" AND r.area_id = ");
        query.push_bind(area_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND r.status = ");
        query.push_bind(status);
    }
}

pub struct Reservations<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Reservations<'c> {
    type CreateRequest = ReservationCreateDBRequest;
    type UpdateRequest = ReservationUpdateDBRequest;
    type Response = ReservationDBResponse;
    type Id = ReservationId;
    type Filter = ReservationFilter;

    #[instrument(skip(self, request), fields(area_id = %abbrev_uuid(&request.area_id), user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id = sqlx::query_scalar::<_, ReservationId>(
            "INSERT INTO reservations (area_id, user_id, start_time, end_time, notes) VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(request.area_id)
        .bind(request.user_id)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(&request.notes)
        .fetch_one(&mut *self.db)
        .await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(reservation_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let reservation = sqlx::query_as::<_, ReservationDBResponse>(&format!("{RESERVATION_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(reservation)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let reservations = sqlx::query_as::<_, ReservationDBResponse>(&format!("{RESERVATION_SELECT} WHERE r.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(reservations.into_iter().map(|r| (r.id, r)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(RESERVATION_SELECT);
        query.push(" WHERE 1=1");
        push_filters(&mut query, filter);

        query.push(" ORDER BY r.start_time DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let reservations = query.build_query_as::<ReservationDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(reservations)
    }

    #[instrument(skip(self), fields(reservation_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(reservation_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        sqlx::query_scalar::<_, ReservationId>(
            r#"
            UPDATE reservations SET
                start_time = COALESCE($2, start_time),
                end_time = COALESCE($3, end_time),
                notes = COALESCE($4, notes),
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(&request.notes)
        .bind(request.status)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Reservations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &ReservationFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM reservations r WHERE 1=1");
        push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::CommonAreas;
    use crate::db::models::common_areas::CommonAreaCreateDBRequest;
    use chrono::{Duration, Utc};
    use sqlx::PgPool;

    async fn setup(conn: &mut PgConnection) -> (CommonAreaId, UserId) {
        let area = CommonAreas::new(&mut *conn)
            .create(&CommonAreaCreateDBRequest {
                name: "Event Hall".to_string(),
                description: None,
                capacity: 50,
                is_active: true,
            })
            .await
            .unwrap();
        let user: UserId = sqlx::query_scalar("INSERT INTO users (username, email) VALUES ('booker', 'booker@example.com') RETURNING id")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        (area.id, user)
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_cancel_reservation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (area_id, user_id) = setup(&mut conn).await;
        let mut repo = Reservations::new(&mut conn);

        let start = Utc::now() + Duration::days(1);
        let created = repo
            .create(&ReservationCreateDBRequest {
                area_id,
                user_id,
                start_time: start,
                end_time: start + Duration::hours(3),
                notes: Some("Birthday".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(created.status, ReservationStatus::Pending);
        assert_eq!(created.area_name, "Event Hall");
        assert_eq!(created.username, "booker");

        let cancelled = repo
            .update(
                created.id,
                &ReservationUpdateDBRequest {
                    status: Some(ReservationStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        assert_eq!(cancelled.notes.as_deref(), Some("Birthday"));

        let filter = ReservationFilter::new(0, 10).with_user(user_id).with_status(ReservationStatus::Cancelled);
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_end_before_start_rejected(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (area_id, user_id) = setup(&mut conn).await;
        let start = Utc::now();
        let err = Reservations::new(&mut conn)
            .create(&ReservationCreateDBRequest {
                area_id,
                user_id,
                start_time: start,
                end_time: start - Duration::hours(1),
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
