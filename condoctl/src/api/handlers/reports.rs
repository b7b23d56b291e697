use crate::{
    AppState,
    api::models::{
        fees::is_valid_period,
        reports::{DashboardStats, FinanceReport, FinanceReportQuery},
    },
    auth::permissions::{RequiresPermission, can_read_all_resources, operation, resource},
    db::handlers::{Reports, reports::FinanceFilter},
    errors::{Error, Result},
    types::Resource,
};
use axum::{
    Json,
    extract::{Query, State},
};

#[utoipa::path(
    get,
    path = "/dashboard/stats",
    tag = "reports",
    summary = "Dashboard counters",
    responses((status = 200, description = "Dashboard counters", body = DashboardStats)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn dashboard_stats(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Dashboard, operation::ReadAll>,
) -> Result<Json<DashboardStats>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let stats = Reports::new(&mut conn).dashboard_stats().await?;
    Ok(Json(DashboardStats::from(stats)))
}

fn period_bound(name: &str, value: Option<String>) -> Result<Option<String>> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(period) if !is_valid_period(&period) => Err(Error::BadRequest {
            message: format!("Invalid {name} period '{period}', expected YYYY-MM"),
        }),
        other => Ok(other),
    }
}

/// Issued, paid and outstanding totals, overall and broken down by expense type and period.
///
/// Non-admins always get the report for their own units.
#[utoipa::path(
    get,
    path = "/reports/finance",
    tag = "reports",
    summary = "Finance report",
    params(FinanceReportQuery),
    responses(
        (status = 200, description = "Finance report", body = FinanceReport),
        (status = 400, description = "Invalid period bounds"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn finance_report(
    State(state): State<AppState>,
    Query(query): Query<FinanceReportQuery>,
    current_user: RequiresPermission<resource::Reports, operation::ReadOwn>,
) -> Result<Json<FinanceReport>> {
    let from_period = period_bound("from", query.from)?;
    let to_period = period_bound("to", query.to)?;
    if let (Some(from), Some(to)) = (&from_period, &to_period)
        && from > to
    {
        return Err(Error::BadRequest {
            message: format!("Period range is empty: {from} is after {to}"),
        });
    }

    let owner_id = if can_read_all_resources(&current_user, Resource::Reports) {
        query.owner
    } else {
        Some(current_user.id)
    };

    let filter = FinanceFilter {
        from_period,
        to_period,
        owner_id,
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let report = Reports::new(&mut conn).finance(&filter).await?;
    Ok(Json(FinanceReport::from(report)))
}
