//! API models for the admin dashboard and the finance report.

use crate::db::models::reports::{DashboardStatsDB, FinanceReportDB};
use crate::types::UserId;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub total_users: i64,
    pub active_units: i64,
    /// Sum of ISSUED and OVERDUE fee amounts
    pub pending_fees_total: f64,
    /// Requests that are PENDING or IN_PROGRESS
    pub open_maintenance_requests: i64,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct FinanceReportQuery {
    /// First period included, `YYYY-MM`
    pub from: Option<String>,
    /// Last period included, `YYYY-MM`
    pub to: Option<String>,
    /// Only fees of units owned by this user (ignored for non-admins)
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinanceTotals {
    pub issued: f64,
    pub paid: f64,
    pub outstanding: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinanceByType {
    #[serde(rename = "type")]
    pub expense_type: String,
    pub count: i64,
    pub issued: f64,
    pub paid: f64,
    pub outstanding: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinanceByPeriod {
    pub period: String,
    pub issued: f64,
    pub paid: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinanceReport {
    pub overall: FinanceTotals,
    pub by_type: Vec<FinanceByType>,
    pub by_period: Vec<FinanceByPeriod>,
}

impl From<DashboardStatsDB> for DashboardStats {
    fn from(db: DashboardStatsDB) -> Self {
        Self {
            total_users: db.total_users,
            active_units: db.active_units,
            pending_fees_total: to_f64(db.pending_fees_total),
            open_maintenance_requests: db.open_maintenance_requests,
        }
    }
}

impl From<FinanceReportDB> for FinanceReport {
    fn from(db: FinanceReportDB) -> Self {
        Self {
            overall: FinanceTotals {
                issued: to_f64(db.overall.issued),
                paid: to_f64(db.overall.paid),
                outstanding: to_f64(db.overall.issued - db.overall.paid),
            },
            by_type: db
                .by_type
                .into_iter()
                .map(|row| FinanceByType {
                    expense_type: row.expense_type,
                    count: row.count,
                    issued: to_f64(row.issued),
                    paid: to_f64(row.paid),
                    outstanding: to_f64(row.issued - row.paid),
                })
                .collect(),
            by_period: db
                .by_period
                .into_iter()
                .map(|row| FinanceByPeriod {
                    period: row.period,
                    issued: to_f64(row.issued),
                    paid: to_f64(row.paid),
                })
                .collect(),
        }
    }
}
