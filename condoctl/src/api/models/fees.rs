//! API models for expense types, fees and payments.

use super::pagination::Pagination;
use crate::db::models::fees::{ExpenseTypeDBResponse, FeeDBResponse, PaymentDBResponse};
use crate::types::{ExpenseTypeId, FeeId, PaymentId, UnitId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Lifecycle of a fee: ISSUED -> PAID | OVERDUE, OVERDUE -> PAID
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "fee_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeStatus {
    Issued,
    Paid,
    Overdue,
}

/// Validate a billing period of the form `YYYY-MM`
pub fn is_valid_period(period: &str) -> bool {
    period.len() == 7 && NaiveDate::parse_from_str(&format!("{period}-01"), "%Y-%m-%d").is_ok()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExpenseTypeCreate {
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "1500.00")]
    pub amount_default: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ExpenseTypeUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, example = "1500.00")]
    pub amount_default: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExpenseTypeResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ExpenseTypeId,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "1500.00")]
    pub amount_default: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeeCreate {
    #[schema(value_type = String, format = "uuid")]
    pub unit_id: UnitId,
    #[schema(value_type = String, format = "uuid")]
    pub expense_type_id: ExpenseTypeId,
    /// Billing period, `YYYY-MM`
    pub period: String,
    /// Defaults to the expense type's default amount
    #[schema(value_type = Option<String>, example = "1500.00")]
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<FeeStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct FeeUpdate {
    pub period: Option<String>,
    #[schema(value_type = Option<String>, example = "1500.00")]
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<FeeStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeeResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: FeeId,
    #[schema(value_type = String, format = "uuid")]
    pub unit_id: UnitId,
    pub unit_code: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
    #[schema(value_type = String, format = "uuid")]
    pub expense_type_id: ExpenseTypeId,
    pub expense_type_name: String,
    pub period: String,
    #[schema(value_type = String, example = "1500.00")]
    pub amount: Decimal,
    pub status: FeeStatus,
    pub issued_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListFeesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// `1` or `true` restricts to fees of units owned by the caller
    pub mine: Option<String>,

    /// Billing period, `YYYY-MM`
    pub period: Option<String>,

    pub status: Option<FeeStatus>,

    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub unit_id: Option<UnitId>,
}

impl ListFeesQuery {
    pub fn mine(&self) -> bool {
        matches!(self.mine.as_deref(), Some("1") | Some("true") | Some("True"))
    }
}

/// Body of the "pay" action. Amount is optional here so its absence can be reported as a 400.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PayFeeRequest {
    #[schema(value_type = Option<String>, example = "1500.00")]
    pub amount: Option<Decimal>,
    pub method: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PaymentId,
    #[schema(value_type = String, format = "uuid")]
    pub fee_id: FeeId,
    #[schema(value_type = String, example = "1500.00")]
    pub amount: Decimal,
    pub method: String,
    pub note: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub recorded_by: Option<UserId>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentReceipt {
    pub fee: FeeResponse,
    pub payment: PaymentResponse,
    /// Sum of all payments recorded against the fee
    #[schema(value_type = String, example = "1500.00")]
    pub paid_total: Decimal,
    /// What is still owed, never negative
    #[schema(value_type = String, example = "0.00")]
    pub remaining: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssueFeesRequest {
    /// Billing period, `YYYY-MM`
    pub period: String,
    /// Restrict issuing to one expense type
    #[schema(value_type = Option<String>, format = "uuid")]
    pub expense_type_id: Option<ExpenseTypeId>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssueFeesResponse {
    pub created: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MarkOverdueRequest {
    /// Fees due before this date become overdue (defaults to today)
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MarkOverdueResponse {
    pub updated: u64,
}

impl From<ExpenseTypeDBResponse> for ExpenseTypeResponse {
    fn from(db: ExpenseTypeDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            amount_default: db.amount_default,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<FeeDBResponse> for FeeResponse {
    fn from(db: FeeDBResponse) -> Self {
        Self {
            id: db.id,
            unit_id: db.unit_id,
            unit_code: db.unit_code,
            owner_id: db.owner_id,
            expense_type_id: db.expense_type_id,
            expense_type_name: db.expense_type_name,
            period: db.period,
            amount: db.amount,
            status: db.status,
            issued_at: db.issued_at,
            due_date: db.due_date,
            paid_at: db.paid_at,
        }
    }
}

impl From<PaymentDBResponse> for PaymentResponse {
    fn from(db: PaymentDBResponse) -> Self {
        Self {
            id: db.id,
            fee_id: db.fee_id,
            amount: db.amount,
            method: db.method,
            note: db.note,
            recorded_by: db.recorded_by,
            paid_at: db.paid_at,
        }
    }
}
