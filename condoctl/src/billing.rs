//! Payment registration against fees.
//!
//! The fee row is locked for the whole transaction, so concurrent payments on the same fee
//! serialize and only one of them can flip the status to PAID.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use crate::{
    api::models::fees::{FeeResponse, FeeStatus, PaymentReceipt, PaymentResponse},
    db::{
        errors::DbError,
        handlers::{Fees, Notifications, Payments},
        models::{
            fees::{FeeDBResponse, PaymentCreateDBRequest, PaymentDBResponse},
            notifications::NotificationCreateDBRequest,
        },
    },
    errors::{Error, Result},
    types::{FeeId, UserId, abbrev_uuid},
};

pub const DEFAULT_PAYMENT_METHOD: &str = "manual";
pub const DEFAULT_PAYMENT_NOTE: &str = "Payment registered by administrator.";

/// A payment to record against a fee
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount: Decimal,
    pub method: String,
    pub note: String,
    pub recorded_by: Option<UserId>,
}

/// The fee after the payment, with running totals
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub fee: FeeDBResponse,
    pub payment: PaymentDBResponse,
    pub paid_total: Decimal,
    pub remaining: Decimal,
}

impl From<PaymentOutcome> for PaymentReceipt {
    fn from(outcome: PaymentOutcome) -> Self {
        Self {
            fee: FeeResponse::from(outcome.fee),
            payment: PaymentResponse::from(outcome.payment),
            paid_total: outcome.paid_total,
            remaining: outcome.remaining,
        }
    }
}

/// Record a payment and mark the fee PAID once its payments cover the amount.
///
/// The owner of the fee's unit is notified in the same transaction.
#[instrument(skip(pool, payment), fields(fee_id = %abbrev_uuid(&fee_id), amount = %payment.amount), err)]
pub async fn register_payment(pool: &PgPool, fee_id: FeeId, payment: NewPayment) -> Result<PaymentOutcome> {
    if payment.amount <= Decimal::ZERO {
        return Err(Error::BadRequest {
            message: "Amount must be greater than zero".to_string(),
        });
    }

    let mut tx = pool.begin().await.map_err(|e| Error::Database(e.into()))?;

    let fee = Fees::new(&mut tx).lock_for_update(fee_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Fee".to_string(),
        id: fee_id.to_string(),
    })?;

    if fee.status == FeeStatus::Paid {
        return Err(Error::BadRequest {
            message: format!("Fee {} for period {} is already paid", fee.unit_code, fee.period),
        });
    }

    let recorded = Payments::new(&mut tx)
        .create(&PaymentCreateDBRequest {
            fee_id,
            amount: payment.amount,
            method: payment.method,
            note: payment.note,
            recorded_by: payment.recorded_by,
        })
        .await?;

    let paid_total = Payments::new(&mut tx).total_for_fee(fee_id).await?;
    let remaining = (fee.amount - paid_total).max(Decimal::ZERO);

    let fee = if remaining.is_zero() {
        let mut fees = Fees::new(&mut tx);
        fees.mark_paid(fee_id).await?;
        fees.lock_for_update(fee_id).await?.ok_or(Error::Database(DbError::NotFound))?
    } else {
        fee
    };

    if let Some(owner_id) = fee.owner_id {
        let message = if remaining.is_zero() {
            format!("Your {} fee for {} ({}) is fully paid.", fee.expense_type_name, fee.period, fee.unit_code)
        } else {
            format!(
                "A payment of {} was registered for your {} fee for {} ({}). Remaining: {}.",
                recorded.amount, fee.expense_type_name, fee.period, fee.unit_code, remaining
            )
        };
        Notifications::new(&mut tx)
            .create(&NotificationCreateDBRequest {
                user_id: owner_id,
                title: "Payment registered".to_string(),
                message,
            })
            .await?;
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(
        "Registered payment {} on fee {} (paid {} of {})",
        abbrev_uuid(&recorded.id),
        abbrev_uuid(&fee.id),
        paid_total,
        fee.amount
    );

    Ok(PaymentOutcome {
        fee,
        payment: recorded,
        paid_total,
        remaining,
    })
}
