//! Fee billing: listing and administration of fees, payment registration, batch issuing
//! and the gateway checkout for residents.

use crate::{
    AppState,
    api::models::{
        fees::{
            FeeCreate, FeeResponse, FeeStatus, FeeUpdate, IssueFeesRequest, IssueFeesResponse, ListFeesQuery, MarkOverdueRequest,
            MarkOverdueResponse, PayFeeRequest, PaymentReceipt, PaymentResponse, is_valid_period,
        },
        pagination::PaginatedResponse,
        payments::PaymentPreferenceResponse,
        users::CurrentUser,
    },
    auth::permissions::{RequiresPermission, can_read_all_resources, can_read_own_resource, operation, resource},
    billing::{self, DEFAULT_PAYMENT_METHOD, DEFAULT_PAYMENT_NOTE, NewPayment},
    db::{
        errors::DbError,
        handlers::{ExpenseTypes, Fees, Payments, Repository, fees::FeeFilter},
        models::fees::{FeeCreateDBRequest, FeeDBResponse, FeeUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{FeeId, Resource},
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use sqlx::PgConnection;

fn fee_not_found(fee_id: FeeId) -> Error {
    Error::NotFound {
        resource: "Fee".to_string(),
        id: fee_id.to_string(),
    }
}

fn validate_period(period: &str) -> Result<()> {
    if is_valid_period(period) {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: format!("Invalid period '{period}', expected YYYY-MM"),
        })
    }
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount < Decimal::ZERO {
        return Err(Error::BadRequest {
            message: "Amount cannot be negative".to_string(),
        });
    }
    Ok(())
}

/// Load a fee the caller may see. Fees of other owners' units answer 404.
async fn visible_fee(conn: &mut PgConnection, user: &CurrentUser, fee_id: FeeId) -> Result<FeeDBResponse> {
    let fee = Fees::new(conn).get_by_id(fee_id).await?.ok_or_else(|| fee_not_found(fee_id))?;
    let visible = match fee.owner_id {
        Some(owner_id) => can_read_own_resource(user, Resource::Fees, owner_id),
        None => can_read_all_resources(user, Resource::Fees),
    };
    if visible { Ok(fee) } else { Err(fee_not_found(fee_id)) }
}

/// List fees, newest first. Non-admins only see fees of units they own.
#[utoipa::path(
    get,
    path = "/fees",
    tag = "fees",
    summary = "List fees",
    params(ListFeesQuery),
    responses(
        (status = 200, description = "Paginated list of fees", body = PaginatedResponse<FeeResponse>),
        (status = 400, description = "Invalid period"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_fees(
    State(state): State<AppState>,
    Query(query): Query<ListFeesQuery>,
    current_user: RequiresPermission<resource::Fees, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<FeeResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = FeeFilter::new(skip, limit);

    if query.mine() || !can_read_all_resources(&current_user, Resource::Fees) {
        filter = filter.with_owner(current_user.id);
    }
    if let Some(period) = query.period.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        validate_period(period)?;
        filter = filter.with_period(period.to_string());
    }
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }
    if let Some(unit_id) = query.unit_id {
        filter = filter.with_unit(unit_id);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Fees::new(&mut conn);
    let total_count = repo.count(&filter).await?;
    let data = repo.list(&filter).await?.into_iter().map(FeeResponse::from).collect();

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/fees/{fee_id}",
    tag = "fees",
    summary = "Get fee",
    params(("fee_id" = uuid::Uuid, Path, description = "Fee ID")),
    responses(
        (status = 200, description = "Fee", body = FeeResponse),
        (status = 404, description = "Fee not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_fee(
    State(state): State<AppState>,
    Path(fee_id): Path<FeeId>,
    current_user: RequiresPermission<resource::Fees, operation::ReadOwn>,
) -> Result<Json<FeeResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let fee = visible_fee(&mut conn, &current_user, fee_id).await?;
    Ok(Json(FeeResponse::from(fee)))
}

/// Create a fee. The amount defaults to the expense type's default amount.
#[utoipa::path(
    post,
    path = "/fees",
    tag = "fees",
    summary = "Create fee",
    request_body = FeeCreate,
    responses(
        (status = 201, description = "Fee created", body = FeeResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Fee already exists for unit, type and period"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_fee(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Fees, operation::CreateAll>,
    Json(create): Json<FeeCreate>,
) -> Result<(StatusCode, Json<FeeResponse>)> {
    let period = create.period.trim().to_string();
    validate_period(&period)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let expense_type = ExpenseTypes::new(&mut conn)
        .get_by_id(create.expense_type_id)
        .await?
        .ok_or_else(|| Error::BadRequest {
            message: format!("Expense type {} does not exist", create.expense_type_id),
        })?;

    let amount = create.amount.unwrap_or(expense_type.amount_default);
    validate_amount(amount)?;

    let fee = Fees::new(&mut conn)
        .create(&FeeCreateDBRequest {
            unit_id: create.unit_id,
            expense_type_id: expense_type.id,
            period,
            amount,
            status: create.status.unwrap_or(FeeStatus::Issued),
            due_date: create.due_date,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(FeeResponse::from(fee))))
}

/// Update a fee. Setting PAID stamps `paid_at`; any other status clears it.
#[utoipa::path(
    patch,
    path = "/fees/{fee_id}",
    tag = "fees",
    summary = "Update fee",
    request_body = FeeUpdate,
    params(("fee_id" = uuid::Uuid, Path, description = "Fee ID")),
    responses(
        (status = 200, description = "Fee updated", body = FeeResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Fee not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_fee(
    State(state): State<AppState>,
    Path(fee_id): Path<FeeId>,
    _: RequiresPermission<resource::Fees, operation::UpdateAll>,
    Json(mut update): Json<FeeUpdate>,
) -> Result<Json<FeeResponse>> {
    if let Some(period) = update.period.as_mut() {
        *period = period.trim().to_string();
        validate_period(period)?;
    }
    if let Some(amount) = update.amount {
        validate_amount(amount)?;
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let fee = Fees::new(&mut conn)
        .update(fee_id, &FeeUpdateDBRequest::from(update))
        .await
        .map_err(|e| match e {
            DbError::NotFound => fee_not_found(fee_id),
            other => other.into(),
        })?;
    Ok(Json(FeeResponse::from(fee)))
}

#[utoipa::path(
    delete,
    path = "/fees/{fee_id}",
    tag = "fees",
    summary = "Delete fee",
    params(("fee_id" = uuid::Uuid, Path, description = "Fee ID")),
    responses(
        (status = 204, description = "Fee deleted"),
        (status = 404, description = "Fee not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_fee(
    State(state): State<AppState>,
    Path(fee_id): Path<FeeId>,
    _: RequiresPermission<resource::Fees, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Fees::new(&mut conn).delete(fee_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(fee_not_found(fee_id))
    }
}

/// Register a payment against a fee.
///
/// Every failure of the registration, including a malformed body or a missing fee,
/// is reported as 400 with the failure message.
#[utoipa::path(
    post,
    path = "/fees/{fee_id}/pay",
    tag = "fees",
    summary = "Register payment",
    request_body = PayFeeRequest,
    params(("fee_id" = uuid::Uuid, Path, description = "Fee ID")),
    responses(
        (status = 200, description = "Payment registered", body = PaymentReceipt),
        (status = 400, description = "Payment could not be registered"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn pay_fee(
    State(state): State<AppState>,
    Path(fee_id): Path<FeeId>,
    current_user: RequiresPermission<resource::Payments, operation::CreateAll>,
    body: Bytes,
) -> Result<Json<PaymentReceipt>> {
    let registration = async {
        let request: PayFeeRequest = if body.is_empty() {
            PayFeeRequest::default()
        } else {
            serde_json::from_slice(&body).map_err(|e| Error::BadRequest {
                message: format!("Invalid request body: {e}"),
            })?
        };
        let amount = request.amount.ok_or_else(|| Error::BadRequest {
            message: "Amount is required".to_string(),
        })?;

        let payment = NewPayment {
            amount,
            method: request
                .method
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            note: request
                .note
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PAYMENT_NOTE.to_string()),
            recorded_by: Some(current_user.id),
        };
        billing::register_payment(&state.db, fee_id, payment).await
    };

    match registration.await {
        Ok(outcome) => Ok(Json(PaymentReceipt::from(outcome))),
        Err(e) => {
            tracing::info!("Payment on fee {} rejected: {}", fee_id, e);
            Err(Error::BadRequest {
                message: e.user_message(),
            })
        }
    }
}

#[utoipa::path(
    get,
    path = "/fees/{fee_id}/payments",
    tag = "fees",
    summary = "List payments of a fee",
    params(("fee_id" = uuid::Uuid, Path, description = "Fee ID")),
    responses(
        (status = 200, description = "Payments, oldest first", body = [PaymentResponse]),
        (status = 404, description = "Fee not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_fee_payments(
    State(state): State<AppState>,
    Path(fee_id): Path<FeeId>,
    current_user: RequiresPermission<resource::Payments, operation::ReadOwn>,
) -> Result<Json<Vec<PaymentResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let fee = visible_fee(&mut conn, &current_user, fee_id).await?;
    let payments = Payments::new(&mut conn).list_for_fee(fee.id).await?;
    Ok(Json(payments.into_iter().map(PaymentResponse::from).collect()))
}

/// Issue the fees of a period for every unit and expense type, skipping existing ones
#[utoipa::path(
    post,
    path = "/fees/issue",
    tag = "fees",
    summary = "Issue fees for a period",
    request_body = IssueFeesRequest,
    responses(
        (status = 200, description = "Issue summary", body = IssueFeesResponse),
        (status = 400, description = "Invalid period"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn issue_fees(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Fees, operation::CreateAll>,
    Json(request): Json<IssueFeesRequest>,
) -> Result<Json<IssueFeesResponse>> {
    let period = request.period.trim();
    validate_period(period)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    if let Some(expense_type_id) = request.expense_type_id
        && ExpenseTypes::new(&mut tx).get_by_id(expense_type_id).await?.is_none()
    {
        return Err(Error::BadRequest {
            message: format!("Expense type {expense_type_id} does not exist"),
        });
    }
    let outcome = Fees::new(&mut tx)
        .issue_period(period, request.expense_type_id, request.due_date)
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!("Issued fees for {}: {} created, {} skipped", period, outcome.created, outcome.skipped);
    Ok(Json(IssueFeesResponse {
        created: outcome.created,
        skipped: outcome.skipped,
    }))
}

/// Flip ISSUED fees past their due date to OVERDUE
#[utoipa::path(
    post,
    path = "/fees/mark-overdue",
    tag = "fees",
    summary = "Mark overdue fees",
    request_body = MarkOverdueRequest,
    responses((status = 200, description = "Number of fees marked overdue", body = MarkOverdueResponse)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn mark_overdue(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Fees, operation::UpdateAll>,
    request: Option<Json<MarkOverdueRequest>>,
) -> Result<Json<MarkOverdueResponse>> {
    let as_of = request
        .and_then(|Json(r)| r.as_of)
        .unwrap_or_else(|| chrono::Utc::now().date_naive());

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let updated = Fees::new(&mut conn).mark_overdue(as_of).await?;

    tracing::info!("Marked {} fees overdue as of {}", updated, as_of);
    Ok(Json(MarkOverdueResponse { updated }))
}

/// Gateway checkout for a fee. Non-admins can only pay fees of their own units.
#[utoipa::path(
    post,
    path = "/fees/{fee_id}/payment-preference",
    tag = "fees",
    summary = "Create payment preference",
    params(("fee_id" = uuid::Uuid, Path, description = "Fee ID")),
    responses(
        (status = 200, description = "Checkout data", body = PaymentPreferenceResponse),
        (status = 400, description = "Fee cannot be paid"),
        (status = 404, description = "Fee not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_payment_preference(
    State(state): State<AppState>,
    Path(fee_id): Path<FeeId>,
    current_user: CurrentUser,
) -> Result<Json<PaymentPreferenceResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let fee = Fees::new(&mut conn).get_by_id(fee_id).await?;
    drop(conn);

    let fee = match fee {
        Some(fee) if current_user.is_admin() || fee.owner_id == Some(current_user.id) => fee,
        _ => {
            return Err(Error::NotFound {
                resource: "Fee".to_string(),
                id: fee_id.to_string(),
            });
        }
    };

    let preference = state.payment_provider.create_payment_preference(&fee).await?;
    Ok(Json(PaymentPreferenceResponse::from(preference)))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{
            fees::{ExpenseTypeResponse, FeeResponse, FeeStatus, IssueFeesResponse, MarkOverdueResponse, PaymentReceipt, PaymentResponse},
            notifications::NotificationResponse,
            pagination::PaginatedResponse,
            payments::PaymentPreferenceResponse,
            units::UnitResponse,
            users::{Role, UserResponse},
        },
        test_utils::*,
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;
    use std::str::FromStr;

    struct Fixture {
        admin: UserResponse,
        owner: UserResponse,
        unit: UnitResponse,
        expense_type: ExpenseTypeResponse,
    }

    async fn fixture(server: &TestServer, pool: &PgPool) -> Fixture {
        let admin = create_test_admin_user(pool).await;
        let owner = create_test_user(pool, Role::Resident).await;
        let (name, value) = add_auth_headers(&admin);

        let unit: UnitResponse = server
            .post("/api/v1/units")
            .add_header(name.clone(), value.clone())
            .json(&json!({"code": "TA-1-A", "tower": "A", "number": "1", "owner_id": owner.id}))
            .await
            .json();
        let expense_type: ExpenseTypeResponse = server
            .post("/api/v1/expense-types")
            .add_header(name, value)
            .json(&json!({"name": "Maintenance Fee", "amount_default": "1500.00"}))
            .await
            .json();

        Fixture {
            admin,
            owner,
            unit,
            expense_type,
        }
    }

    async fn create_fee(server: &TestServer, f: &Fixture, period: &str) -> FeeResponse {
        let (name, value) = add_auth_headers(&f.admin);
        let response = server
            .post("/api/v1/fees")
            .add_header(name, value)
            .json(&json!({"unit_id": f.unit.id, "expense_type_id": f.expense_type.id, "period": period}))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_fee_defaults_amount_and_validates_period(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let f = fixture(&server, &pool).await;

        let fee = create_fee(&server, &f, "2025-08").await;
        assert_eq!(fee.amount, dec("1500.00"));
        assert_eq!(fee.status, FeeStatus::Issued);
        assert_eq!(fee.owner_id, Some(f.owner.id));
        assert!(fee.paid_at.is_none());

        let (name, value) = add_auth_headers(&f.admin);
        server
            .post("/api/v1/fees")
            .add_header(name.clone(), value.clone())
            .json(&json!({"unit_id": f.unit.id, "expense_type_id": f.expense_type.id, "period": "2025-08"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        server
            .post("/api/v1/fees")
            .add_header(name, value)
            .json(&json!({"unit_id": f.unit.id, "expense_type_id": f.expense_type.id, "period": "08/2025"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_fee_visibility_for_residents(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let f = fixture(&server, &pool).await;
        let fee = create_fee(&server, &f, "2025-08").await;
        let stranger = create_test_user(&pool, Role::Resident).await;

        let (name, value) = add_auth_headers(&f.owner);
        let page: PaginatedResponse<FeeResponse> = server.get("/api/v1/fees").add_header(name.clone(), value.clone()).await.json();
        assert_eq!(page.total_count, 1);
        server
            .get(&format!("/api/v1/fees/{}", fee.id))
            .add_header(name, value)
            .await
            .assert_status_ok();

        let (name, value) = add_auth_headers(&stranger);
        let page: PaginatedResponse<FeeResponse> = server.get("/api/v1/fees").add_header(name.clone(), value.clone()).await.json();
        assert_eq!(page.total_count, 0);
        server
            .get(&format!("/api/v1/fees/{}", fee.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get(&format!("/api/v1/fees/{}/payments", fee.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        // Admin sees everything unless asking for their own
        let (name, value) = add_auth_headers(&f.admin);
        let page: PaginatedResponse<FeeResponse> = server.get("/api/v1/fees").add_header(name.clone(), value.clone()).await.json();
        assert_eq!(page.total_count, 1);
        let page: PaginatedResponse<FeeResponse> = server.get("/api/v1/fees?mine=1").add_header(name, value).await.json();
        assert_eq!(page.total_count, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_pay_fee_marks_paid_and_updates_report(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let f = fixture(&server, &pool).await;
        let fee = create_fee(&server, &f, "2025-08").await;
        let (name, value) = add_auth_headers(&f.admin);

        let response = server
            .post(&format!("/api/v1/fees/{}/pay", fee.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"amount": "1000.00"}))
            .await;
        response.assert_status_ok();
        let receipt: PaymentReceipt = response.json();
        assert_eq!(receipt.fee.status, FeeStatus::Issued);
        assert_eq!(receipt.remaining, dec("500.00"));
        assert_eq!(receipt.payment.method, "manual");
        assert_eq!(receipt.payment.note, "Payment registered by administrator.");

        let report: serde_json::Value = server
            .get("/api/v1/reports/finance")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(report["overall"]["paid"], json!(0.0));

        let receipt: PaymentReceipt = server
            .post(&format!("/api/v1/fees/{}/pay", fee.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"amount": 500, "method": "transfer"}))
            .await
            .json();
        assert_eq!(receipt.fee.status, FeeStatus::Paid);
        assert!(receipt.fee.paid_at.is_some());
        assert_eq!(receipt.paid_total, dec("1500.00"));

        let report: serde_json::Value = server
            .get("/api/v1/reports/finance")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(report["overall"]["paid"], json!(1500.0));
        assert_eq!(report["overall"]["outstanding"], json!(0.0));

        let payments: Vec<PaymentResponse> = server
            .get(&format!("/api/v1/fees/{}/payments", fee.id))
            .add_header(name, value)
            .await
            .json();
        assert_eq!(payments.len(), 2);

        let (name, value) = add_auth_headers(&f.owner);
        let notifications: PaginatedResponse<NotificationResponse> =
            server.get("/api/v1/notifications").add_header(name, value).await.json();
        assert_eq!(notifications.total_count, 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_pay_fee_failures_are_bad_requests(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let f = fixture(&server, &pool).await;
        let fee = create_fee(&server, &f, "2025-08").await;
        let (name, value) = add_auth_headers(&f.admin);
        let pay = format!("/api/v1/fees/{}/pay", fee.id);

        let response = server.post(&pay).add_header(name.clone(), value.clone()).json(&json!({})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), "Amount is required");

        server
            .post(&pay)
            .add_header(name.clone(), value.clone())
            .bytes("not json".into())
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post(&pay)
            .add_header(name.clone(), value.clone())
            .json(&json!({"amount": "0"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post(&format!("/api/v1/fees/{}/pay", uuid::Uuid::new_v4()))
            .add_header(name.clone(), value.clone())
            .json(&json!({"amount": "10"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.text().contains("not found"));

        server
            .post(&pay)
            .add_header(name.clone(), value.clone())
            .json(&json!({"amount": "1500"}))
            .await
            .assert_status_ok();
        server
            .post(&pay)
            .add_header(name, value)
            .json(&json!({"amount": "1"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (name, value) = add_auth_headers(&f.owner);
        server
            .post(&pay)
            .add_header(name, value)
            .json(&json!({"amount": "1"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_status_stamps_paid_at(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let f = fixture(&server, &pool).await;
        let fee = create_fee(&server, &f, "2025-07").await;
        let (name, value) = add_auth_headers(&f.admin);

        let paid: FeeResponse = server
            .patch(&format!("/api/v1/fees/{}", fee.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"status": "PAID"}))
            .await
            .json();
        assert!(paid.paid_at.is_some());

        let reopened: FeeResponse = server
            .patch(&format!("/api/v1/fees/{}", fee.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"status": "OVERDUE"}))
            .await
            .json();
        assert_eq!(reopened.status, FeeStatus::Overdue);
        assert!(reopened.paid_at.is_none());

        server
            .delete(&format!("/api/v1/fees/{}", fee.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_issue_and_mark_overdue(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let f = fixture(&server, &pool).await;
        create_fee(&server, &f, "2025-09").await;
        let (name, value) = add_auth_headers(&f.admin);

        server
            .post("/api/v1/expense-types")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Reserve Fund", "amount_default": "500.00"}))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/api/v1/fees/issue")
            .add_header(name.clone(), value.clone())
            .json(&json!({"period": "2025-09", "due_date": "2025-09-10"}))
            .await;
        response.assert_status_ok();
        let issued: IssueFeesResponse = response.json();
        assert_eq!(issued.created, 1);
        assert_eq!(issued.skipped, 1);

        server
            .post("/api/v1/fees/issue")
            .add_header(name.clone(), value.clone())
            .json(&json!({"period": "2025-9"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/api/v1/fees/mark-overdue")
            .add_header(name.clone(), value.clone())
            .json(&json!({"as_of": "2025-10-01"}))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<MarkOverdueResponse>().updated, 1);

        let page: PaginatedResponse<FeeResponse> = server
            .get("/api/v1/fees?status=OVERDUE&period=2025-09")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(page.total_count, 1);

        let (name, value) = add_auth_headers(&f.owner);
        server
            .post("/api/v1/fees/issue")
            .add_header(name, value)
            .json(&json!({"period": "2025-10"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_payment_preference_for_owner_only(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let f = fixture(&server, &pool).await;
        let fee = create_fee(&server, &f, "2025-08").await;
        let stranger = create_test_user(&pool, Role::Resident).await;
        let path = format!("/api/v1/fees/{}/payment-preference", fee.id);

        let (name, value) = add_auth_headers(&f.owner);
        let response = server.post(&path).add_header(name, value).await;
        response.assert_status_ok();
        let preference: PaymentPreferenceResponse = response.json();
        assert_eq!(
            preference.init_point,
            format!("https://www.mercadopago.com.ar/pagar/con/qr/{}", fee.id)
        );
        assert!(!preference.point_of_interaction.transaction_data.qr_code_base64.is_empty());

        let (name, value) = add_auth_headers(&stranger);
        let response = server.post(&path).add_header(name, value).await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.text(), format!("Fee with ID {} not found", fee.id));
    }
}
