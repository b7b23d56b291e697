//! Read-only aggregate queries behind the dashboard and the finance report.

use crate::db::{
    errors::Result,
    models::reports::{DashboardStatsDB, FinanceByPeriodRow, FinanceByTypeRow, FinanceReportDB, FinanceTotalsRow},
};
use crate::types::UserId;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

/// Fees included in a finance report. Period bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct FinanceFilter {
    pub from_period: Option<String>,
    pub to_period: Option<String>,
    pub owner_id: Option<UserId>,
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &FinanceFilter) {
    if let Some(ref from) = filter.from_period {
        query.push(" AND f.period >= ");
        query.push_bind(from.clone());
    }
    if let Some(ref to) = filter.to_period {
        query.push(" AND f.period <= ");
        query.push_bind(to.clone());
    }
    if let Some(owner_id) = filter.owner_id {
        query.push(" AND un.owner_id = ");
        query.push_bind(owner_id);
    }
}

const ISSUED_PAID: &str = "COALESCE(SUM(f.amount), 0) AS issued, COALESCE(SUM(f.amount) FILTER (WHERE f.status = 'PAID'), 0) AS paid";

pub struct Reports<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Reports<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn dashboard_stats(&mut self) -> Result<DashboardStatsDB> {
        let stats = sqlx::query_as::<_, DashboardStatsDB>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM units) AS active_units,
                (SELECT COALESCE(SUM(amount), 0) FROM fees WHERE status IN ('ISSUED', 'OVERDUE')) AS pending_fees_total,
                (SELECT COUNT(*) FROM maintenance_requests WHERE status IN ('PENDING', 'IN_PROGRESS')) AS open_maintenance_requests
            "#,
        )
        .fetch_one(&mut *self.db)
        .await?;
        Ok(stats)
    }

    /// Issued is the sum of all fee amounts, paid the sum of fees in PAID status
    #[instrument(skip(self), err)]
    pub async fn finance(&mut self, filter: &FinanceFilter) -> Result<FinanceReportDB> {
        const FROM: &str = " FROM fees f JOIN units un ON un.id = f.unit_id JOIN expense_types et ON et.id = f.expense_type_id WHERE 1=1";

        let mut overall = QueryBuilder::new(format!("SELECT {ISSUED_PAID}{FROM}"));
        push_filters(&mut overall, filter);
        let overall = overall.build_query_as::<FinanceTotalsRow>().fetch_one(&mut *self.db).await?;

        let mut by_type = QueryBuilder::new(format!("SELECT et.name AS expense_type, COUNT(*) AS count, {ISSUED_PAID}{FROM}"));
        push_filters(&mut by_type, filter);
        by_type.push(" GROUP BY et.name ORDER BY issued DESC, et.name ASC");
        let by_type = by_type.build_query_as::<FinanceByTypeRow>().fetch_all(&mut *self.db).await?;

        let mut by_period = QueryBuilder::new(format!("SELECT f.period::TEXT AS period, {ISSUED_PAID}{FROM}"));
        push_filters(&mut by_period, filter);
        by_period.push(" GROUP BY f.period ORDER BY f.period ASC");
        let by_period = by_period.build_query_as::<FinanceByPeriodRow>().fetch_all(&mut *self.db).await?;

        Ok(FinanceReportDB {
            overall,
            by_type,
            by_period,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::fees::FeeStatus;
    use crate::db::handlers::{ExpenseTypes, Fees, Repository, Units};
    use crate::db::models::fees::{ExpenseTypeCreateDBRequest, FeeCreateDBRequest};
    use crate::db::models::units::UnitCreateDBRequest;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_empty_database_reports_zeroes(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reports::new(&mut conn);

        let stats = repo.dashboard_stats().await.unwrap();
        assert_eq!(stats.total_users, 0);
        assert_eq!(stats.pending_fees_total, Decimal::ZERO);

        let report = repo.finance(&FinanceFilter::default()).await.unwrap();
        assert_eq!(report.overall.issued, Decimal::ZERO);
        assert_eq!(report.overall.paid, Decimal::ZERO);
        assert!(report.by_type.is_empty());
        assert!(report.by_period.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_finance_groups_and_filters(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let unit = Units::new(&mut conn)
            .create(&UnitCreateDBRequest {
                code: "R-1".to_string(),
                tower: "R".to_string(),
                number: "1".to_string(),
                owner_id: None,
            })
            .await
            .unwrap();
        let maintenance = ExpenseTypes::new(&mut conn)
            .create(&ExpenseTypeCreateDBRequest {
                name: "Maintenance Fee".to_string(),
                description: None,
                amount_default: Decimal::new(150000, 2),
            })
            .await
            .unwrap();
        let reserve = ExpenseTypes::new(&mut conn)
            .create(&ExpenseTypeCreateDBRequest {
                name: "Reserve Fund".to_string(),
                description: None,
                amount_default: Decimal::new(50000, 2),
            })
            .await
            .unwrap();

        let mut fees = Fees::new(&mut conn);
        for (expense_type_id, period, cents, status) in [
            (maintenance.id, "2025-07", 150000, FeeStatus::Paid),
            (maintenance.id, "2025-08", 150000, FeeStatus::Issued),
            (reserve.id, "2025-08", 50000, FeeStatus::Overdue),
        ] {
            fees.create(&FeeCreateDBRequest {
                unit_id: unit.id,
                expense_type_id,
                period: period.to_string(),
                amount: Decimal::new(cents, 2),
                status,
                due_date: None,
            })
            .await
            .unwrap();
        }

        let mut repo = Reports::new(&mut conn);
        let report = repo.finance(&FinanceFilter::default()).await.unwrap();
        assert_eq!(report.overall.issued, Decimal::new(350000, 2));
        assert_eq!(report.overall.paid, Decimal::new(150000, 2));

        assert_eq!(report.by_type[0].expense_type, "Maintenance Fee");
        assert_eq!(report.by_type[0].count, 2);
        assert_eq!(report.by_type[1].paid, Decimal::ZERO);

        let periods: Vec<_> = report.by_period.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(periods, vec!["2025-07", "2025-08"]);

        let august = repo
            .finance(&FinanceFilter {
                from_period: Some("2025-08".to_string()),
                to_period: Some("2025-08".to_string()),
                owner_id: None,
            })
            .await
            .unwrap();
        assert_eq!(august.overall.issued, Decimal::new(200000, 2));
        assert_eq!(august.overall.paid, Decimal::ZERO);

        let stats = repo.dashboard_stats().await.unwrap();
        assert_eq!(stats.active_units, 1);
        assert_eq!(stats.pending_fees_total, Decimal::new(200000, 2));
    }
}
