//! Database access for payments recorded against fees.
//!
//! Payments are append-only, so this is a plain accessor rather than a full [`Repository`](super::Repository).

use crate::db::{
    errors::Result,
    models::fees::{PaymentCreateDBRequest, PaymentDBResponse},
};
use crate::types::{FeeId, abbrev_uuid};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::instrument;

const COLUMNS: &str = "id, fee_id, amount, method, note, recorded_by, paid_at";

pub struct Payments<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Payments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(fee_id = %abbrev_uuid(&request.fee_id), amount = %request.amount), err)]
    pub async fn create(&mut self, request: &PaymentCreateDBRequest) -> Result<PaymentDBResponse> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>(&format!(
            "INSERT INTO payments (fee_id, amount, method, note, recorded_by) VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
        ))
        .bind(request.fee_id)
        .bind(request.amount)
        .bind(&request.method)
        .bind(&request.note)
        .bind(request.recorded_by)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(payment)
    }

    /// Payments of one fee, oldest first
    #[instrument(skip(self), fields(fee_id = %abbrev_uuid(&fee_id)), err)]
    pub async fn list_for_fee(&mut self, fee_id: FeeId) -> Result<Vec<PaymentDBResponse>> {
        let payments = sqlx::query_as::<_, PaymentDBResponse>(&format!(
            "SELECT {COLUMNS} FROM payments WHERE fee_id = $1 ORDER BY paid_at ASC"
        ))
        .bind(fee_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(payments)
    }

    #[instrument(skip(self), fields(fee_id = %abbrev_uuid(&fee_id)), err)]
    pub async fn total_for_fee(&mut self, fee_id: FeeId) -> Result<Decimal> {
        let total: Decimal = sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM payments WHERE fee_id = $1")
            .bind(fee_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(total)
    }
}
