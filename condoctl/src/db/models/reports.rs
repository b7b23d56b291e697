//! Aggregate rows produced by the reporting queries.

use rust_decimal::Decimal;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct DashboardStatsDB {
    pub total_users: i64,
    pub active_units: i64,
    pub pending_fees_total: Decimal,
    pub open_maintenance_requests: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct FinanceTotalsRow {
    pub issued: Decimal,
    pub paid: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct FinanceByTypeRow {
    pub expense_type: String,
    pub count: i64,
    pub issued: Decimal,
    pub paid: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct FinanceByPeriodRow {
    pub period: String,
    pub issued: Decimal,
    pub paid: Decimal,
}

#[derive(Debug, Clone)]
pub struct FinanceReportDB {
    pub overall: FinanceTotalsRow,
    pub by_type: Vec<FinanceByTypeRow>,
    pub by_period: Vec<FinanceByPeriodRow>,
}
