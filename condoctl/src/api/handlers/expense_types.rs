use crate::{
    AppState,
    api::models::{
        fees::{ExpenseTypeCreate, ExpenseTypeResponse, ExpenseTypeUpdate},
        pagination::{PaginatedResponse, Pagination},
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        errors::DbError,
        handlers::{ExpenseTypes, Repository, expense_types::ExpenseTypeFilter},
        models::fees::{ExpenseTypeCreateDBRequest, ExpenseTypeUpdateDBRequest},
    },
    errors::{Error, Result},
    types::ExpenseTypeId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;

fn expense_type_not_found(id: ExpenseTypeId) -> Error {
    Error::NotFound {
        resource: "Expense type".to_string(),
        id: id.to_string(),
    }
}

fn validate(name: Option<&str>, amount_default: Option<Decimal>) -> Result<()> {
    if name.is_some_and(|n| n.trim().is_empty()) {
        return Err(Error::BadRequest {
            message: "Name is required".to_string(),
        });
    }
    if amount_default.is_some_and(|a| a < Decimal::ZERO) {
        return Err(Error::BadRequest {
            message: "Default amount cannot be negative".to_string(),
        });
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/expense-types",
    tag = "fees",
    summary = "List expense types",
    params(Pagination),
    responses((status = 200, description = "Paginated list of expense types", body = PaginatedResponse<ExpenseTypeResponse>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_expense_types(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    _: RequiresPermission<resource::ExpenseTypes, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<ExpenseTypeResponse>>> {
    let (skip, limit) = pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ExpenseTypes::new(&mut conn);

    let total_count = repo.count().await?;
    let data = repo
        .list(&ExpenseTypeFilter::new(skip, limit))
        .await?
        .into_iter()
        .map(ExpenseTypeResponse::from)
        .collect();

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/expense-types/{expense_type_id}",
    tag = "fees",
    summary = "Get expense type",
    params(("expense_type_id" = uuid::Uuid, Path, description = "Expense type ID")),
    responses(
        (status = 200, description = "Expense type", body = ExpenseTypeResponse),
        (status = 404, description = "Expense type not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_expense_type(
    State(state): State<AppState>,
    Path(expense_type_id): Path<ExpenseTypeId>,
    _: RequiresPermission<resource::ExpenseTypes, operation::ReadAll>,
) -> Result<Json<ExpenseTypeResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let expense_type = ExpenseTypes::new(&mut conn)
        .get_by_id(expense_type_id)
        .await?
        .ok_or_else(|| expense_type_not_found(expense_type_id))?;
    Ok(Json(ExpenseTypeResponse::from(expense_type)))
}

#[utoipa::path(
    post,
    path = "/expense-types",
    tag = "fees",
    summary = "Create expense type",
    request_body = ExpenseTypeCreate,
    responses(
        (status = 201, description = "Expense type created", body = ExpenseTypeResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Name already exists"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_expense_type(
    State(state): State<AppState>,
    _: RequiresPermission<resource::ExpenseTypes, operation::CreateAll>,
    Json(create): Json<ExpenseTypeCreate>,
) -> Result<(StatusCode, Json<ExpenseTypeResponse>)> {
    validate(Some(&create.name), Some(create.amount_default))?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let expense_type = ExpenseTypes::new(&mut conn).create(&ExpenseTypeCreateDBRequest::from(create)).await?;
    Ok((StatusCode::CREATED, Json(ExpenseTypeResponse::from(expense_type))))
}

#[utoipa::path(
    patch,
    path = "/expense-types/{expense_type_id}",
    tag = "fees",
    summary = "Update expense type",
    request_body = ExpenseTypeUpdate,
    params(("expense_type_id" = uuid::Uuid, Path, description = "Expense type ID")),
    responses(
        (status = 200, description = "Expense type updated", body = ExpenseTypeResponse),
        (status = 404, description = "Expense type not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_expense_type(
    State(state): State<AppState>,
    Path(expense_type_id): Path<ExpenseTypeId>,
    _: RequiresPermission<resource::ExpenseTypes, operation::UpdateAll>,
    Json(update): Json<ExpenseTypeUpdate>,
) -> Result<Json<ExpenseTypeResponse>> {
    validate(update.name.as_deref(), update.amount_default)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let expense_type = ExpenseTypes::new(&mut conn)
        .update(expense_type_id, &ExpenseTypeUpdateDBRequest::from(update))
        .await
        .map_err(|e| match e {
            DbError::NotFound => expense_type_not_found(expense_type_id),
            other => other.into(),
        })?;
    Ok(Json(ExpenseTypeResponse::from(expense_type)))
}

/// Delete an expense type. Types still referenced by fees cannot be removed.
#[utoipa::path(
    delete,
    path = "/expense-types/{expense_type_id}",
    tag = "fees",
    summary = "Delete expense type",
    params(("expense_type_id" = uuid::Uuid, Path, description = "Expense type ID")),
    responses(
        (status = 204, description = "Expense type deleted"),
        (status = 400, description = "Expense type is in use"),
        (status = 404, description = "Expense type not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_expense_type(
    State(state): State<AppState>,
    Path(expense_type_id): Path<ExpenseTypeId>,
    _: RequiresPermission<resource::ExpenseTypes, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if ExpenseTypes::new(&mut conn).delete(expense_type_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(expense_type_not_found(expense_type_id))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{fees::ExpenseTypeResponse, pagination::PaginatedResponse, users::Role},
        test_utils::*,
    };
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;
    use std::str::FromStr;

    #[sqlx::test]
    #[test_log::test]
    async fn test_expense_type_crud(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let (name, value) = add_auth_headers(&admin);

        let response = server
            .post("/api/v1/expense-types")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Maintenance Fee", "amount_default": "1500.00"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: ExpenseTypeResponse = response.json();
        assert_eq!(created.amount_default, Decimal::from_str("1500.00").unwrap());

        server
            .post("/api/v1/expense-types")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Maintenance Fee", "amount_default": "10"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        server
            .post("/api/v1/expense-types")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Negative", "amount_default": "-1"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .patch(&format!("/api/v1/expense-types/{}", created.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"amount_default": "1750.50"}))
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<ExpenseTypeResponse>().amount_default,
            Decimal::from_str("1750.50").unwrap()
        );

        server
            .delete(&format!("/api/v1/expense-types/{}", created.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_residents_read_but_cannot_write(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let resident = create_test_user(&pool, Role::Resident).await;

        let (name, value) = add_auth_headers(&admin);
        server
            .post("/api/v1/expense-types")
            .add_header(name, value)
            .json(&json!({"name": "Reserve Fund", "amount_default": "500"}))
            .await
            .assert_status(StatusCode::CREATED);

        let (name, value) = add_auth_headers(&resident);
        let page: PaginatedResponse<ExpenseTypeResponse> =
            server.get("/api/v1/expense-types").add_header(name.clone(), value.clone()).await.json();
        assert_eq!(page.total_count, 1);

        server
            .post("/api/v1/expense-types")
            .add_header(name, value)
            .json(&json!({"name": "Sneaky", "amount_default": "1"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
