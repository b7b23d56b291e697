//! Database repository for common areas.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::common_areas::{CommonAreaCreateDBRequest, CommonAreaDBResponse, CommonAreaUpdateDBRequest},
};
use crate::types::{CommonAreaId, abbrev_uuid};
use sqlx::{PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct CommonAreaFilter {
    pub skip: i64,
    pub limit: i64,
    pub active_only: bool,
}

impl CommonAreaFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            active_only: true,
        }
    }

    pub fn including_inactive(mut self) -> Self {
        self.active_only = false;
        self
    }
}

const COLUMNS: &str = "id, name, description, capacity, is_active, created_at, updated_at";

pub struct CommonAreas<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for CommonAreas<'c> {
    type CreateRequest = CommonAreaCreateDBRequest;
    type UpdateRequest = CommonAreaUpdateDBRequest;
    type Response = CommonAreaDBResponse;
    type Id = CommonAreaId;
    type Filter = CommonAreaFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let area = sqlx::query_as::<_, CommonAreaDBResponse>(&format!(
            "INSERT INTO common_areas (name, description, capacity, is_active) VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
        ))
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.capacity)
        .bind(request.is_active)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(area)
    }

    #[instrument(skip(self), fields(area_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let area = sqlx::query_as::<_, CommonAreaDBResponse>(&format!("SELECT {COLUMNS} FROM common_areas WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(area)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let areas = sqlx::query_as::<_, CommonAreaDBResponse>(&format!("SELECT {COLUMNS} FROM common_areas WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(areas.into_iter().map(|a| (a.id, a)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip, active_only = filter.active_only), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(format!("SELECT {COLUMNS} FROM common_areas WHERE 1=1"));
        if filter.active_only {
            query.push(" AND is_active");
        }
        query.push(" ORDER BY name LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let areas = query.build_query_as::<CommonAreaDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(areas)
    }

    #[instrument(skip(self), fields(area_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM common_areas WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(area_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let area = sqlx::query_as::<_, CommonAreaDBResponse>(&format!(
            r#"
            UPDATE common_areas SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                capacity = COALESCE($4, capacity),
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.capacity)
        .bind(request.is_active)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(area)
    }
}

impl<'c> CommonAreas<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn count(&mut self, filter: &CommonAreaFilter) -> Result<i64> {
        let sql = if filter.active_only {
            "SELECT COUNT(*) FROM common_areas WHERE is_active"
        } else {
            "SELECT COUNT(*) FROM common_areas"
        };
        let count: i64 = sqlx::query_scalar(sql).fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<CommonAreaDBResponse>> {
        let area = sqlx::query_as::<_, CommonAreaDBResponse>(&format!("SELECT {COLUMNS} FROM common_areas WHERE name = $1"))
            .bind(name)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn area(name: &str, capacity: i32, is_active: bool) -> CommonAreaCreateDBRequest {
        CommonAreaCreateDBRequest {
            name: name.to_string(),
            description: None,
            capacity,
            is_active,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_inactive_areas_hidden_by_default(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = CommonAreas::new(&mut conn);
        repo.create(&area("Pool", 20, true)).await.unwrap();
        repo.create(&area("Gym", 10, false)).await.unwrap();

        let active = repo.list(&CommonAreaFilter::new(0, 10)).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Pool");

        let all = CommonAreaFilter::new(0, 10).including_inactive();
        assert_eq!(repo.list(&all).await.unwrap().len(), 2);
        assert_eq!(repo.count(&all).await.unwrap(), 2);
        assert_eq!(repo.count(&CommonAreaFilter::new(0, 10)).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_capacity_must_be_positive(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let err = CommonAreas::new(&mut conn).create(&area("Roof", 0, true)).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
