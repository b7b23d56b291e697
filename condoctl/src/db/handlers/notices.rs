//! Database repositories for notice categories and notices.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::notices::{
        NoticeCategoryCreateDBRequest, NoticeCategoryDBResponse, NoticeCategoryUpdateDBRequest, NoticeCreateDBRequest, NoticeDBResponse,
        NoticeUpdateDBRequest,
    },
};
use crate::types::{NoticeCategoryId, NoticeId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct NoticeCategoryFilter {
    pub skip: i64,
    pub limit: i64,
}

impl NoticeCategoryFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

const CATEGORY_COLUMNS: &str = "id, name, description, created_at";

pub struct NoticeCategories<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for NoticeCategories<'c> {
    type CreateRequest = NoticeCategoryCreateDBRequest;
    type UpdateRequest = NoticeCategoryUpdateDBRequest;
    type Response = NoticeCategoryDBResponse;
    type Id = NoticeCategoryId;
    type Filter = NoticeCategoryFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let category = sqlx::query_as::<_, NoticeCategoryDBResponse>(&format!(
            "INSERT INTO notice_categories (name, description) VALUES ($1, $2) RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(&request.name)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(category)
    }

    #[instrument(skip(self), fields(category_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let category = sqlx::query_as::<_, NoticeCategoryDBResponse>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM notice_categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(category)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let categories = sqlx::query_as::<_, NoticeCategoryDBResponse>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM notice_categories WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(categories.into_iter().map(|c| (c.id, c)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(format!("SELECT {CATEGORY_COLUMNS} FROM notice_categories ORDER BY name LIMIT "));
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let categories = query.build_query_as::<NoticeCategoryDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(categories)
    }

    #[instrument(skip(self), fields(category_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notice_categories WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(category_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let category = sqlx::query_as::<_, NoticeCategoryDBResponse>(&format!(
            r#"
            UPDATE notice_categories SET
                name = COALESCE($2, name),
                description = COALESCE($3, description)
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(category)
    }
}

impl<'c> NoticeCategories<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notice_categories")
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}

#[derive(Debug, Clone)]
pub struct NoticeFilter {
    pub skip: i64,
    pub limit: i64,
    pub category_id: Option<NoticeCategoryId>,
    /// Hide notices whose publish date is still in the future
    pub published_only: bool,
}

impl NoticeFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            category_id: None,
            published_only: true,
        }
    }

    pub fn with_category(mut self, category_id: NoticeCategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn including_scheduled(mut self) -> Self {
        self.published_only = false;
        self
    }
}

const NOTICE_SELECT: &str = r#"
    SELECT n.id, n.title, n.body, n.category_id, c.name AS category_name,
           n.publish_date, n.created_by, u.username AS created_by_username,
           n.created_at, n.updated_at
    FROM notices n
    LEFT JOIN notice_categories c ON c.id = n.category_id
    LEFT JOIN users u ON u.id = n.created_by
"#;

fn push_notice_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &NoticeFilter) {
    if filter.published_only {
        query.push(" AND n.publish_date <= NOW()");
    }
    if let Some(category_id) = filter.category_id {
        query.push(" AND n.category_id = ");
        query.push_bind(category_id);
    }
}

pub struct Notices<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Notices<'c> {
    type CreateRequest = NoticeCreateDBRequest;
    type UpdateRequest = NoticeUpdateDBRequest;
    type Response = NoticeDBResponse;
    type Id = NoticeId;
    type Filter = NoticeFilter;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id = sqlx::query_scalar::<_, NoticeId>(
            r#"
            INSERT INTO notices (title, body, category_id, publish_date, created_by)
            VALUES ($1, $2, $3, COALESCE($4, NOW()), $5)
            RETURNING id
            "#,
        )
        .bind(&request.title)
        .bind(&request.body)
        .bind(request.category_id)
        .bind(request.publish_date)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(notice_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let notice = sqlx::query_as::<_, NoticeDBResponse>(&format!("{NOTICE_SELECT} WHERE n.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(notice)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let notices = sqlx::query_as::<_, NoticeDBResponse>(&format!("{NOTICE_SELECT} WHERE n.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(notices.into_iter().map(|n| (n.id, n)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(NOTICE_SELECT);
        query.push(" WHERE 1=1");
        push_notice_filters(&mut query, filter);

        query.push(" ORDER BY n.publish_date DESC, n.created_at DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let notices = query.build_query_as::<NoticeDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(notices)
    }

    #[instrument(skip(self), fields(notice_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notices WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(notice_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        sqlx::query_scalar::<_, NoticeId>(
            r#"
            UPDATE notices SET
                title = COALESCE($2, title),
                body = COALESCE($3, body),
                category_id = COALESCE($4, category_id),
                publish_date = COALESCE($5, publish_date),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.body)
        .bind(request.category_id)
        .bind(request.publish_date)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Notices<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &NoticeFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM notices n WHERE 1=1");
        push_notice_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }
}
