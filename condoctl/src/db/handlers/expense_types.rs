//! Database repository for expense types.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::fees::{ExpenseTypeCreateDBRequest, ExpenseTypeDBResponse, ExpenseTypeUpdateDBRequest},
};
use crate::types::{ExpenseTypeId, abbrev_uuid};
use sqlx::{PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct ExpenseTypeFilter {
    pub skip: i64,
    pub limit: i64,
}

impl ExpenseTypeFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

const COLUMNS: &str = "id, name, description, amount_default, created_at, updated_at";

pub struct ExpenseTypes<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for ExpenseTypes<'c> {
    type CreateRequest = ExpenseTypeCreateDBRequest;
    type UpdateRequest = ExpenseTypeUpdateDBRequest;
    type Response = ExpenseTypeDBResponse;
    type Id = ExpenseTypeId;
    type Filter = ExpenseTypeFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let expense_type = sqlx::query_as::<_, ExpenseTypeDBResponse>(&format!(
            "INSERT INTO expense_types (name, description, amount_default) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        ))
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.amount_default)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(expense_type)
    }

    #[instrument(skip(self), fields(expense_type_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let expense_type = sqlx::query_as::<_, ExpenseTypeDBResponse>(&format!("SELECT {COLUMNS} FROM expense_types WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(expense_type)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let rows = sqlx::query_as::<_, ExpenseTypeDBResponse>(&format!("SELECT {COLUMNS} FROM expense_types WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(rows.into_iter().map(|e| (e.id, e)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(format!("SELECT {COLUMNS} FROM expense_types ORDER BY name LIMIT "));
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let rows = query.build_query_as::<ExpenseTypeDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(expense_type_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        // Fails with a foreign key violation while fees still reference the type
        let result = sqlx::query("DELETE FROM expense_types WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(expense_type_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let expense_type = sqlx::query_as::<_, ExpenseTypeDBResponse>(&format!(
            r#"
            UPDATE expense_types SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                amount_default = COALESCE($4, amount_default),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.amount_default)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(expense_type)
    }
}

impl<'c> ExpenseTypes<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM expense_types")
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<ExpenseTypeDBResponse>> {
        let expense_type = sqlx::query_as::<_, ExpenseTypeDBResponse>(&format!("SELECT {COLUMNS} FROM expense_types WHERE name = $1"))
            .bind(name)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(expense_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_expense_type_crud(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ExpenseTypes::new(&mut conn);

        let created = repo
            .create(&ExpenseTypeCreateDBRequest {
                name: "Maintenance Fee".to_string(),
                description: None,
                amount_default: Decimal::new(150000, 2),
            })
            .await
            .unwrap();
        assert_eq!(created.amount_default.to_string(), "1500.00");

        let updated = repo
            .update(
                created.id,
                &ExpenseTypeUpdateDBRequest {
                    amount_default: Some(Decimal::new(160000, 2)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Maintenance Fee");
        assert_eq!(updated.amount_default, Decimal::new(160000, 2));

        assert!(repo.get_by_name("Maintenance Fee").await.unwrap().is_some());
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.delete(created.id).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_negative_default_amount_rejected(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ExpenseTypes::new(&mut conn);
        let err = repo
            .create(&ExpenseTypeCreateDBRequest {
                name: "Refund".to_string(),
                description: None,
                amount_default: Decimal::new(-100, 2),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
