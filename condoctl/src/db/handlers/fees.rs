//! Database repository for fees.

use crate::api::models::fees::FeeStatus;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::fees::{FeeCreateDBRequest, FeeDBResponse, FeeUpdateDBRequest},
};
use crate::types::{ExpenseTypeId, FeeId, UnitId, UserId, abbrev_uuid};
use chrono::NaiveDate;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct FeeFilter {
    pub skip: i64,
    pub limit: i64,
    /// Only fees of units owned by this user
    pub owner_id: Option<UserId>,
    pub period: Option<String>,
    pub status: Option<FeeStatus>,
    pub unit_id: Option<UnitId>,
}

impl FeeFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            owner_id: None,
            period: None,
            status: None,
            unit_id: None,
        }
    }

    pub fn with_owner(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_period(mut self, period: String) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_status(mut self, status: FeeStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_unit(mut self, unit_id: UnitId) -> Self {
        self.unit_id = Some(unit_id);
        self
    }
}

/// Result of issuing a billing period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueOutcome {
    pub created: u64,
    pub skipped: u64,
}

const FEE_SELECT: &str = r#"
    SELECT f.id, f.unit_id, un.code AS unit_code, un.owner_id,
           f.expense_type_id, et.name AS expense_type_name,
           f.period, f.amount, f.status, f.issued_at, f.due_date, f.paid_at
    FROM fees f
    JOIN units un ON un.id = f.unit_id
    JOIN expense_types et ON et.id = f.expense_type_id
"#;

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &FeeFilter) {
    if let Some(owner_id) = filter.owner_id {
        query.push(" AND un.owner_id = ");
        query.push_bind(owner_id);
    }
    if let Some(ref period) = filter.period {
        query.push(" AND f.period = ");
        query.push_bind(period.clone());
    }
    if let Some(status) = filter.status {
        query.push(" AND f.status = ");
        query.push_bind(status);
    }
    if let Some(unit_id) = filter.unit_id {
        query.push(" AND f.unit_id = ");
        query.push_bind(unit_id);
    }
}

pub struct Fees<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Fees<'c> {
    type CreateRequest = FeeCreateDBRequest;
    type UpdateRequest = FeeUpdateDBRequest;
    type Response = FeeDBResponse;
    type Id = FeeId;
    type Filter = FeeFilter;

    #[instrument(skip(self, request), fields(unit_id = %abbrev_uuid(&request.unit_id), period = %request.period), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id = sqlx::query_scalar::<_, FeeId>(
            r#"
            INSERT INTO fees (unit_id, expense_type_id, period, amount, status, due_date, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN $5 = 'PAID'::fee_status THEN NOW() END)
            RETURNING id
            "#,
        )
        .bind(request.unit_id)
        .bind(request.expense_type_id)
        .bind(&request.period)
        .bind(request.amount)
        .bind(request.status)
        .bind(request.due_date)
        .fetch_one(&mut *self.db)
        .await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(fee_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let fee = sqlx::query_as::<_, FeeDBResponse>(&format!("{FEE_SELECT} WHERE f.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(fee)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let fees = sqlx::query_as::<_, FeeDBResponse>(&format!("{FEE_SELECT} WHERE f.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(fees.into_iter().map(|f| (f.id, f)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(FEE_SELECT);
        query.push(" WHERE 1=1");
        push_filters(&mut query, filter);

        query.push(" ORDER BY f.issued_at DESC, un.code ASC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let fees = query.build_query_as::<FeeDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(fees)
    }

    #[instrument(skip(self), fields(fee_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM fees WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(fee_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Moving to PAID stamps paid_at once; any other status clears it
        sqlx::query_scalar::<_, FeeId>(
            r#"
            UPDATE fees SET
                period = COALESCE($2, period),
                amount = COALESCE($3, amount),
                due_date = COALESCE($4, due_date),
                status = COALESCE($5, status),
                paid_at = CASE
                    WHEN $5::fee_status IS NULL THEN paid_at
                    WHEN $5::fee_status = 'PAID' THEN COALESCE(paid_at, NOW())
                    ELSE NULL
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&request.period)
        .bind(request.amount)
        .bind(request.due_date)
        .bind(request.status)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Fees<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &FeeFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM fees f JOIN units un ON un.id = f.unit_id WHERE 1=1");
        push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Load a fee and hold a row lock on it until the surrounding transaction ends
    #[instrument(skip(self), fields(fee_id = %abbrev_uuid(&id)), err)]
    pub async fn lock_for_update(&mut self, id: FeeId) -> Result<Option<FeeDBResponse>> {
        let fee = sqlx::query_as::<_, FeeDBResponse>(&format!("{FEE_SELECT} WHERE f.id = $1 FOR UPDATE OF f"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(fee)
    }

    #[instrument(skip(self), fields(fee_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_paid(&mut self, id: FeeId) -> Result<()> {
        sqlx::query("UPDATE fees SET status = 'PAID', paid_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    /// Create one fee per unit and expense type for the period, at the type's default amount.
    /// Combinations that already have a fee are left untouched and counted as skipped.
    #[instrument(skip(self), err)]
    pub async fn issue_period(
        &mut self,
        period: &str,
        expense_type_id: Option<ExpenseTypeId>,
        due_date: Option<NaiveDate>,
    ) -> Result<IssueOutcome> {
        let candidates: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM units un CROSS JOIN expense_types et WHERE ($1::uuid IS NULL OR et.id = $1)",
        )
        .bind(expense_type_id)
        .fetch_one(&mut *self.db)
        .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO fees (unit_id, expense_type_id, period, amount, due_date)
            SELECT un.id, et.id, $1, et.amount_default, $3
            FROM units un
            CROSS JOIN expense_types et
            WHERE ($2::uuid IS NULL OR et.id = $2)
            ON CONFLICT ON CONSTRAINT fees_unit_type_period_key DO NOTHING
            "#,
        )
        .bind(period)
        .bind(expense_type_id)
        .bind(due_date)
        .execute(&mut *self.db)
        .await?;

        let created = result.rows_affected();
        Ok(IssueOutcome {
            created,
            skipped: (candidates.max(0) as u64).saturating_sub(created),
        })
    }

    /// Flip ISSUED fees whose due date is before `as_of` to OVERDUE
    #[instrument(skip(self), err)]
    pub async fn mark_overdue(&mut self, as_of: NaiveDate) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE fees SET status = 'OVERDUE', updated_at = NOW() WHERE status = 'ISSUED' AND due_date IS NOT NULL AND due_date < $1",
        )
        .bind(as_of)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected())
    }
}
