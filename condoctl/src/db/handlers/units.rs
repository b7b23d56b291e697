//! Database repository for units.

use crate::api::models::units::UnitOrdering;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::units::{UnitCreateDBRequest, UnitDBResponse, UnitUpdateDBRequest},
};
use crate::types::{UnitId, UserId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct UnitFilter {
    pub skip: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub owner_id: Option<UserId>,
    pub ordering: UnitOrdering,
    pub descending: bool,
}

impl UnitFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            search: None,
            owner_id: None,
            ordering: UnitOrdering::default(),
            descending: false,
        }
    }

    pub fn with_search(mut self, search: String) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_owner(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_ordering(mut self, ordering: UnitOrdering, descending: bool) -> Self {
        self.ordering = ordering;
        self.descending = descending;
        self
    }
}

const UNIT_SELECT: &str = r#"
    SELECT un.id, un.code, un.tower, un.number, un.owner_id,
           u.username AS owner_username, p.full_name AS owner_full_name,
           un.created_at, un.updated_at
    FROM units un
    LEFT JOIN users u ON u.id = un.owner_id
    LEFT JOIN profiles p ON p.user_id = un.owner_id
"#;

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &UnitFilter) {
    if let Some(owner_id) = filter.owner_id {
        query.push(" AND un.owner_id = ");
        query.push_bind(owner_id);
    }

    if let Some(ref search) = filter.search {
        let pattern = super::contains_pattern(search);
        query.push(" AND (LOWER(un.code) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(un.tower) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(un.number) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(COALESCE(u.username, '')) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(COALESCE(p.full_name, '')) LIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
}

pub struct Units<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Units<'c> {
    type CreateRequest = UnitCreateDBRequest;
    type UpdateRequest = UnitUpdateDBRequest;
    type Response = UnitDBResponse;
    type Id = UnitId;
    type Filter = UnitFilter;

    #[instrument(skip(self, request), fields(code = %request.code), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id = sqlx::query_scalar::<_, UnitId>("INSERT INTO units (code, tower, number, owner_id) VALUES ($1, $2, $3, $4) RETURNING id")
            .bind(&request.code)
            .bind(&request.tower)
            .bind(&request.number)
            .bind(request.owner_id)
            .fetch_one(&mut *self.db)
            .await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(unit_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let unit = sqlx::query_as::<_, UnitDBResponse>(&format!("{UNIT_SELECT} WHERE un.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(unit)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let units = sqlx::query_as::<_, UnitDBResponse>(&format!("{UNIT_SELECT} WHERE un.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(units.into_iter().map(|u| (u.id, u)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(UNIT_SELECT);
        query.push(" WHERE 1=1");
        push_filters(&mut query, filter);

        let column = match filter.ordering {
            UnitOrdering::Code => "un.code",
            UnitOrdering::Tower => "un.tower",
            UnitOrdering::Number => "un.number",
            UnitOrdering::OwnerUsername => "u.username",
        };
        let direction = if filter.descending { "DESC" } else { "ASC" };
        // Code is unique, so it breaks ties deterministically
        query.push(format!(" ORDER BY {column} {direction}, un.code ASC LIMIT "));
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let units = query.build_query_as::<UnitDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(units)
    }

    #[instrument(skip(self), fields(unit_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM units WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(unit_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        sqlx::query_scalar::<_, UnitId>(
            r#"
            UPDATE units SET
                code = COALESCE($2, code),
                tower = COALESCE($3, tower),
                number = COALESCE($4, number),
                owner_id = COALESCE($5, owner_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&request.code)
        .bind(&request.tower)
        .bind(&request.number)
        .bind(request.owner_id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Units<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &UnitFilter) -> Result<i64> {
        let mut query = QueryBuilder::new(
            "SELECT COUNT(*) FROM units un LEFT JOIN users u ON u.id = un.owner_id LEFT JOIN profiles p ON p.user_id = un.owner_id WHERE 1=1",
        );
        push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// All units owned by a user, ordered by code
    #[instrument(skip(self), fields(owner_id = %abbrev_uuid(&owner_id)), err)]
    pub async fn list_by_owner(&mut self, owner_id: UserId) -> Result<Vec<UnitDBResponse>> {
        let units = sqlx::query_as::<_, UnitDBResponse>(&format!("{UNIT_SELECT} WHERE un.owner_id = $1 ORDER BY un.code"))
            .bind(owner_id)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(units)
    }
}
