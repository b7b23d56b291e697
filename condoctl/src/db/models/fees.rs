//! Database models for expense types, fees and payments.

use crate::api::models::fees::{ExpenseTypeCreate, ExpenseTypeUpdate, FeeStatus, FeeUpdate};
use crate::types::{ExpenseTypeId, FeeId, PaymentId, UnitId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct ExpenseTypeCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
    pub amount_default: Decimal,
}

impl From<ExpenseTypeCreate> for ExpenseTypeCreateDBRequest {
    fn from(api: ExpenseTypeCreate) -> Self {
        Self {
            name: api.name.trim().to_string(),
            description: api.description,
            amount_default: api.amount_default,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpenseTypeUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub amount_default: Option<Decimal>,
}

impl From<ExpenseTypeUpdate> for ExpenseTypeUpdateDBRequest {
    fn from(api: ExpenseTypeUpdate) -> Self {
        Self {
            name: api.name.map(|n| n.trim().to_string()),
            description: api.description,
            amount_default: api.amount_default,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ExpenseTypeDBResponse {
    pub id: ExpenseTypeId,
    pub name: String,
    pub description: Option<String>,
    pub amount_default: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fully resolved fee creation; the amount default is applied by the caller
#[derive(Debug, Clone)]
pub struct FeeCreateDBRequest {
    pub unit_id: UnitId,
    pub expense_type_id: ExpenseTypeId,
    pub period: String,
    pub amount: Decimal,
    pub status: FeeStatus,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct FeeUpdateDBRequest {
    pub period: Option<String>,
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<FeeStatus>,
}

impl From<FeeUpdate> for FeeUpdateDBRequest {
    fn from(api: FeeUpdate) -> Self {
        Self {
            period: api.period,
            amount: api.amount,
            due_date: api.due_date,
            status: api.status,
        }
    }
}

/// A fee joined with its unit (code, owner) and expense type name
#[derive(Debug, Clone, FromRow)]
pub struct FeeDBResponse {
    pub id: FeeId,
    pub unit_id: UnitId,
    pub unit_code: String,
    pub owner_id: Option<UserId>,
    pub expense_type_id: ExpenseTypeId,
    pub expense_type_name: String,
    pub period: String,
    pub amount: Decimal,
    pub status: FeeStatus,
    pub issued_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PaymentCreateDBRequest {
    pub fee_id: FeeId,
    pub amount: Decimal,
    pub method: String,
    pub note: String,
    pub recorded_by: Option<UserId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PaymentDBResponse {
    pub id: PaymentId,
    pub fee_id: FeeId,
    pub amount: Decimal,
    pub method: String,
    pub note: String,
    pub recorded_by: Option<UserId>,
    pub paid_at: DateTime<Utc>,
}
