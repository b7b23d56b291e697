//! OpenAPI documentation, served by Scalar at `/api/docs`.
//!
//! [`ApiDoc`] covers the root routes (authentication and the payment webhook) and nests
//! [`V1ApiDoc`], whose paths are relative to `/api/v1`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api::{handlers, models};

/// Registers the two ways a request can carry a session
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "BearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some(
                        "Access token returned by `POST /authentication/login`:\n\n\
                        ```\nAuthorization: Bearer ACCESS_TOKEN\n```",
                    ))
                    .build(),
            ),
        );
        components.add_security_scheme(
            "CookieAuth",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "condoctl_session",
                "Session cookie set on login, for browser clients",
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::me::get_me,
        handlers::me::update_my_profile,
        handlers::users::list_users,
        handlers::users::list_staff_members,
        handlers::users::create_user,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::delete_user,
        handlers::units::list_units,
        handlers::units::get_unit,
        handlers::units::create_unit,
        handlers::units::update_unit,
        handlers::units::delete_unit,
        handlers::households::list_vehicles,
        handlers::households::create_vehicle,
        handlers::households::get_vehicle,
        handlers::households::update_vehicle,
        handlers::households::delete_vehicle,
        handlers::households::list_pets,
        handlers::households::create_pet,
        handlers::households::get_pet,
        handlers::households::update_pet,
        handlers::households::delete_pet,
        handlers::households::list_family_members,
        handlers::households::create_family_member,
        handlers::households::get_family_member,
        handlers::households::update_family_member,
        handlers::households::delete_family_member,
        handlers::expense_types::list_expense_types,
        handlers::expense_types::get_expense_type,
        handlers::expense_types::create_expense_type,
        handlers::expense_types::update_expense_type,
        handlers::expense_types::delete_expense_type,
        handlers::fees::list_fees,
        handlers::fees::get_fee,
        handlers::fees::create_fee,
        handlers::fees::update_fee,
        handlers::fees::delete_fee,
        handlers::fees::pay_fee,
        handlers::fees::list_fee_payments,
        handlers::fees::issue_fees,
        handlers::fees::mark_overdue,
        handlers::fees::create_payment_preference,
        handlers::notices::list_notice_categories,
        handlers::notices::get_notice_category,
        handlers::notices::create_notice_category,
        handlers::notices::update_notice_category,
        handlers::notices::delete_notice_category,
        handlers::notices::list_notices,
        handlers::notices::get_notice,
        handlers::notices::create_notice,
        handlers::notices::update_notice,
        handlers::notices::delete_notice,
        handlers::common_areas::list_common_areas,
        handlers::common_areas::get_common_area,
        handlers::common_areas::create_common_area,
        handlers::common_areas::update_common_area,
        handlers::common_areas::delete_common_area,
        handlers::reservations::list_reservations,
        handlers::reservations::get_reservation,
        handlers::reservations::create_reservation,
        handlers::reservations::update_reservation,
        handlers::reservations::delete_reservation,
        handlers::maintenance::list_maintenance_requests,
        handlers::maintenance::get_maintenance_request,
        handlers::maintenance::create_maintenance_request,
        handlers::maintenance::update_maintenance_request,
        handlers::maintenance::delete_maintenance_request,
        handlers::maintenance::list_comments,
        handlers::maintenance::create_comment,
        handlers::maintenance::delete_comment,
        handlers::maintenance::list_attachments,
        handlers::maintenance::upload_attachment,
        handlers::maintenance::get_attachment_content,
        handlers::maintenance::delete_attachment,
        handlers::notifications::list_notifications,
        handlers::notifications::get_notification,
        handlers::notifications::create_notification,
        handlers::notifications::update_notification,
        handlers::notifications::delete_notification,
        handlers::notifications::mark_all_as_read,
        handlers::activity_logs::list_activity_logs,
        handlers::activity_logs::get_activity_log,
        handlers::activity_logs::log_page_access,
        handlers::reports::dashboard_stats,
        handlers::reports::finance_report,
    ),
    components(schemas(
        models::users::Role,
        models::users::UserCreate,
        models::users::UserUpdate,
        models::users::ProfileUpdate,
        models::users::ProfileResponse,
        models::users::UserResponse,
        models::users::CurrentUser,
        models::units::UnitCreate,
        models::units::UnitUpdate,
        models::units::UnitResponse,
        models::units::UnitDetailResponse,
        models::households::VehicleCreate,
        models::households::VehicleUpdate,
        models::households::VehicleResponse,
        models::households::PetCreate,
        models::households::PetUpdate,
        models::households::PetResponse,
        models::households::FamilyMemberCreate,
        models::households::FamilyMemberUpdate,
        models::households::FamilyMemberResponse,
        models::fees::FeeStatus,
        models::fees::ExpenseTypeCreate,
        models::fees::ExpenseTypeUpdate,
        models::fees::ExpenseTypeResponse,
        models::fees::FeeCreate,
        models::fees::FeeUpdate,
        models::fees::FeeResponse,
        models::fees::PayFeeRequest,
        models::fees::PaymentResponse,
        models::fees::PaymentReceipt,
        models::fees::IssueFeesRequest,
        models::fees::IssueFeesResponse,
        models::fees::MarkOverdueRequest,
        models::fees::MarkOverdueResponse,
        models::payments::PaymentPreferenceResponse,
        models::notices::NoticeCategoryCreate,
        models::notices::NoticeCategoryUpdate,
        models::notices::NoticeCategoryResponse,
        models::notices::NoticeCreate,
        models::notices::NoticeUpdate,
        models::notices::NoticeResponse,
        models::common_areas::ReservationStatus,
        models::common_areas::CommonAreaCreate,
        models::common_areas::CommonAreaUpdate,
        models::common_areas::CommonAreaResponse,
        models::common_areas::ReservationCreate,
        models::common_areas::ReservationUpdate,
        models::common_areas::ReservationResponse,
        models::maintenance::MaintenanceStatus,
        models::maintenance::MaintenancePriority,
        models::maintenance::MaintenanceRequestCreate,
        models::maintenance::MaintenanceRequestUpdate,
        models::maintenance::MaintenanceRequestResponse,
        models::maintenance::CommentCreate,
        models::maintenance::CommentResponse,
        models::maintenance::AttachmentResponse,
        models::maintenance::AttachmentUpload,
        models::notifications::NotificationCreate,
        models::notifications::NotificationUpdate,
        models::notifications::NotificationResponse,
        models::notifications::ActivityLogResponse,
        models::notifications::PageAccessRequest,
        models::reports::DashboardStats,
        models::reports::FinanceTotals,
        models::reports::FinanceByType,
        models::reports::FinanceByPeriod,
        models::reports::FinanceReport,
    )),
    tags(
        (name = "me", description = "The caller's own account and profile"),
        (name = "users", description = "User administration"),
        (name = "units", description = "Condominium units and their owners"),
        (name = "households", description = "Vehicles, pets and family members registered by residents"),
        (name = "fees", description = "Expense types, monthly fees, payments and checkout"),
        (name = "notices", description = "The notice board and its categories"),
        (name = "common_areas", description = "Bookable amenities"),
        (name = "reservations", description = "Time-slot bookings of common areas"),
        (name = "maintenance", description = "Maintenance requests with comments and attachments"),
        (name = "notifications", description = "Per-user inbox"),
        (name = "activity_logs", description = "Audit trail"),
        (name = "reports", description = "Admin dashboard and finance report"),
    )
)]
pub struct V1ApiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::webhooks::payment_webhook,
    ),
    components(schemas(
        models::auth::LoginRequest,
        models::auth::AuthResponse,
        models::auth::RefreshRequest,
        models::auth::RefreshResponse,
        models::auth::AuthSuccessResponse,
        models::payments::WebhookAck,
    )),
    nest((path = "/api/v1", api = V1ApiDoc)),
    modifiers(&SecurityAddon),
    tags(
        (name = "authentication", description = "Login, token refresh and logout"),
        (name = "payments", description = "Payment gateway notifications"),
    ),
    info(
        title = "condoctl API",
        version = "1.0.0",
        description = "Condominium management backend.

## Authentication

`POST /authentication/login` returns an access token and a refresh token and also sets a session cookie.
Every `/api/v1` route accepts either the cookie or the access token:

```
Authorization: Bearer ACCESS_TOKEN
```

## Roles

- **ADMIN** manages everything
- **STAFF** works maintenance requests and reads the notice board
- **RESIDENT** sees their own units, fees, reservations and requests

## Errors

Error bodies are a plain-text message, except uniqueness conflicts (`409`), which return `{message, resource}` JSON. Records the caller may not see are reported as `404`.",
    ),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versioned_paths_are_nested() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/authentication/login"));
        assert!(doc.paths.paths.contains_key("/webhooks/payments"));
        assert!(doc.paths.paths.contains_key("/api/v1/fees/{fee_id}/pay"));
        assert!(doc.paths.paths.contains_key("/api/v1/maintenance-requests/{request_id}/attachments"));
        assert!(!doc.paths.paths.contains_key("/fees"));
    }

    #[test]
    fn test_security_schemes_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("BearerAuth"));
        assert!(components.security_schemes.contains_key("CookieAuth"));
    }
}
