use crate::{
    AppState,
    api::models::{
        common_areas::{ListReservationsQuery, ReservationCreate, ReservationResponse, ReservationStatus, ReservationUpdate},
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    auth::permissions::{
        RequiresPermission, can_delete_own_resource, can_read_all_resources, can_read_own_resource, can_update_own_resource, operation,
        resource,
    },
    db::{
        handlers::{CommonAreas, Repository, Reservations, reservations::ReservationFilter},
        models::common_areas::{ReservationCreateDBRequest, ReservationDBResponse, ReservationUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{ReservationId, Resource},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

fn reservation_not_found(reservation_id: ReservationId) -> Error {
    Error::NotFound {
        resource: "Reservation".to_string(),
        id: reservation_id.to_string(),
    }
}

fn validate_window(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Result<()> {
    if end_time <= start_time {
        return Err(Error::BadRequest {
            message: "End time must be after start time".to_string(),
        });
    }
    Ok(())
}

async fn visible_reservation(conn: &mut PgConnection, user: &CurrentUser, reservation_id: ReservationId) -> Result<ReservationDBResponse> {
    match Reservations::new(conn).get_by_id(reservation_id).await? {
        Some(reservation) if can_read_own_resource(user, Resource::Reservations, reservation.user_id) => Ok(reservation),
        _ => Err(reservation_not_found(reservation_id)),
    }
}

/// Reservations, latest start first. Non-admins only see their own.
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    summary = "List reservations",
    params(ListReservationsQuery),
    responses((status = 200, description = "Paginated list of reservations", body = PaginatedResponse<ReservationResponse>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_reservations(
    State(state): State<AppState>,
    Query(query): Query<ListReservationsQuery>,
    current_user: RequiresPermission<resource::Reservations, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<ReservationResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = ReservationFilter::new(skip, limit);
    if !can_read_all_resources(&current_user, Resource::Reservations) {
        filter = filter.with_user(current_user.id);
    }
    if let Some(area_id) = query.area_id {
        filter = filter.with_area(area_id);
    }
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Reservations::new(&mut conn);
    let total_count = repo.count(&filter).await?;
    let data = repo.list(&filter).await?.into_iter().map(ReservationResponse::from).collect();

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/reservations/{reservation_id}",
    tag = "reservations",
    summary = "Get reservation",
    params(("reservation_id" = uuid::Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation", body = ReservationResponse),
        (status = 404, description = "Reservation not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<ReservationId>,
    current_user: RequiresPermission<resource::Reservations, operation::ReadOwn>,
) -> Result<Json<ReservationResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let reservation = visible_reservation(&mut conn, &current_user, reservation_id).await?;
    Ok(Json(ReservationResponse::from(reservation)))
}

/// Book a common area. The area must exist and be active.
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    summary = "Create reservation",
    request_body = ReservationCreate,
    responses(
        (status = 201, description = "Reservation created", body = ReservationResponse),
        (status = 400, description = "Invalid time window or inactive area"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_reservation(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Reservations, operation::CreateOwn>,
    Json(create): Json<ReservationCreate>,
) -> Result<(StatusCode, Json<ReservationResponse>)> {
    validate_window(create.start_time, create.end_time)?;

    // Only admins may book on behalf of someone else
    let user_id = match create.user_id {
        Some(user_id) if current_user.is_admin() => user_id,
        _ => current_user.id,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    match CommonAreas::new(&mut conn).get_by_id(create.area_id).await? {
        Some(area) if area.is_active => {}
        Some(area) => {
            return Err(Error::BadRequest {
                message: format!("{} is not available for reservations", area.name),
            });
        }
        None => {
            return Err(Error::BadRequest {
                message: format!("Common area {} does not exist", create.area_id),
            });
        }
    }

    let reservation = Reservations::new(&mut conn)
        .create(&ReservationCreateDBRequest {
            area_id: create.area_id,
            user_id,
            start_time: create.start_time,
            end_time: create.end_time,
            notes: create.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ReservationResponse::from(reservation))))
}

/// Update times, notes or status. Non-admins can only cancel.
#[utoipa::path(
    patch,
    path = "/reservations/{reservation_id}",
    tag = "reservations",
    summary = "Update reservation",
    request_body = ReservationUpdate,
    params(("reservation_id" = uuid::Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation updated", body = ReservationResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Status change not allowed"),
        (status = 404, description = "Reservation not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<ReservationId>,
    current_user: RequiresPermission<resource::Reservations, operation::UpdateOwn>,
    Json(update): Json<ReservationUpdate>,
) -> Result<Json<ReservationResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let existing = visible_reservation(&mut tx, &current_user, reservation_id).await?;
    if !can_update_own_resource(&current_user, Resource::Reservations, existing.user_id) {
        return Err(reservation_not_found(reservation_id));
    }

    if let Some(status) = update.status
        && status != ReservationStatus::Cancelled
        && !current_user.is_admin()
    {
        return Err(Error::BadRequest {
            message: "Only administrators can confirm reservations".to_string(),
        });
    }
    validate_window(
        update.start_time.unwrap_or(existing.start_time),
        update.end_time.unwrap_or(existing.end_time),
    )?;

    let reservation = Reservations::new(&mut tx)
        .update(reservation_id, &ReservationUpdateDBRequest::from(update))
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ReservationResponse::from(reservation)))
}

#[utoipa::path(
    delete,
    path = "/reservations/{reservation_id}",
    tag = "reservations",
    summary = "Delete reservation",
    params(("reservation_id" = uuid::Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 204, description = "Reservation deleted"),
        (status = 404, description = "Reservation not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<ReservationId>,
    current_user: RequiresPermission<resource::Reservations, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let reservation = visible_reservation(&mut conn, &current_user, reservation_id).await?;
    if !can_delete_own_resource(&current_user, Resource::Reservations, reservation.user_id) {
        return Err(reservation_not_found(reservation_id));
    }

    Reservations::new(&mut conn).delete(reservation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{
            common_areas::{CommonAreaResponse, ReservationResponse, ReservationStatus},
            pagination::PaginatedResponse,
            users::{Role, UserResponse},
        },
        test_utils::*,
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use sqlx::PgPool;

    async fn create_area(server: &TestServer, admin: &UserResponse, name: &str, active: bool) -> CommonAreaResponse {
        let (header, value) = add_auth_headers(admin);
        server
            .post("/api/v1/common-areas")
            .add_header(header, value)
            .json(&json!({"name": name, "capacity": 10, "is_active": active}))
            .await
            .json()
    }

    fn booking(area: &CommonAreaResponse, hours_from_now: i64) -> serde_json::Value {
        let start = Utc::now() + Duration::hours(hours_from_now);
        json!({"area_id": area.id, "start_time": start, "end_time": start + Duration::hours(2)})
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_resident_books_and_cancels(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let resident = create_test_user(&pool, Role::Resident).await;
        let area = create_area(&server, &admin, "Pool", true).await;
        let (name, value) = add_auth_headers(&resident);

        let response = server
            .post("/api/v1/reservations")
            .add_header(name.clone(), value.clone())
            .json(&booking(&area, 24))
            .await;
        response.assert_status(StatusCode::CREATED);
        let reservation: ReservationResponse = response.json();
        assert_eq!(reservation.user_id, resident.id);
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.area_name, "Pool");

        server
            .patch(&format!("/api/v1/reservations/{}", reservation.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"status": "CONFIRMED"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let cancelled: ReservationResponse = server
            .patch(&format!("/api/v1/reservations/{}", reservation.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"status": "CANCELLED"}))
            .await
            .json();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);

        let (admin_name, admin_value) = add_auth_headers(&admin);
        let confirmed: ReservationResponse = server
            .patch(&format!("/api/v1/reservations/{}", reservation.id))
            .add_header(admin_name, admin_value)
            .json(&json!({"status": "CONFIRMED"}))
            .await
            .json();
        assert_eq!(confirmed.status, ReservationStatus::Confirmed);

        server
            .delete(&format!("/api/v1/reservations/{}", reservation.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reservation_validation(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let resident = create_test_user(&pool, Role::Resident).await;
        let open = create_area(&server, &admin, "Gym", true).await;
        let closed = create_area(&server, &admin, "Event Hall", false).await;
        let (name, value) = add_auth_headers(&resident);

        let start = Utc::now() + Duration::hours(5);
        server
            .post("/api/v1/reservations")
            .add_header(name.clone(), value.clone())
            .json(&json!({"area_id": open.id, "start_time": start, "end_time": start}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post("/api/v1/reservations")
            .add_header(name.clone(), value.clone())
            .json(&booking(&closed, 5))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let reservation: ReservationResponse = server
            .post("/api/v1/reservations")
            .add_header(name.clone(), value.clone())
            .json(&booking(&open, 5))
            .await
            .json();
        server
            .patch(&format!("/api/v1/reservations/{}", reservation.id))
            .add_header(name, value)
            .json(&json!({"end_time": reservation.start_time - Duration::minutes(30)}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reservations_scoped_to_owner(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let alice = create_test_user(&pool, Role::Resident).await;
        let bob = create_test_user(&pool, Role::Resident).await;
        let area = create_area(&server, &admin, "Pool", true).await;

        let (alice_name, alice_value) = add_auth_headers(&alice);
        let alice_booking: ReservationResponse = server
            .post("/api/v1/reservations")
            .add_header(alice_name.clone(), alice_value.clone())
            .json(&booking(&area, 10))
            .await
            .json();

        // Non-admins cannot book for someone else
        let (bob_name, bob_value) = add_auth_headers(&bob);
        let mut body = booking(&area, 20);
        body["user_id"] = json!(alice.id);
        let bob_booking: ReservationResponse = server
            .post("/api/v1/reservations")
            .add_header(bob_name.clone(), bob_value.clone())
            .json(&body)
            .await
            .json();
        assert_eq!(bob_booking.user_id, bob.id);

        let page: PaginatedResponse<ReservationResponse> =
            server.get("/api/v1/reservations").add_header(bob_name.clone(), bob_value.clone()).await.json();
        assert_eq!(page.total_count, 1);

        server
            .get(&format!("/api/v1/reservations/{}", alice_booking.id))
            .add_header(bob_name.clone(), bob_value.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete(&format!("/api/v1/reservations/{}", alice_booking.id))
            .add_header(bob_name, bob_value)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let (name, value) = add_auth_headers(&admin);
        let page: PaginatedResponse<ReservationResponse> = server.get("/api/v1/reservations").add_header(name, value).await.json();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.data[0].id, bob_booking.id);
    }
}
