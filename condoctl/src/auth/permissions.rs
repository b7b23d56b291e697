//! Role-based access control.
//!
//! Every role maps to a fixed set of `(Resource, Operation)` grants. Handlers either
//! declare a static requirement with the [`RequiresPermission`] extractor, or take a
//! plain [`CurrentUser`] and decide between "all" and "own" access with the helpers below.
//!
//! ```ignore
//! pub async fn create_unit(
//!     State(state): State<AppState>,
//!     _: RequiresPermission<resource::Units, operation::CreateAll>,
//!     Json(body): Json<UnitCreate>,
//! ) -> Result<(StatusCode, Json<UnitResponse>)> { ... }
//! ```

use std::{marker::PhantomData, ops::Deref};

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    errors::Error,
    types::{Operation, Permission, Resource, UserId},
};

/// Type-level stand-in for a [`Resource`] value
pub trait ResourceMarker: Send + Sync + 'static {
    const RESOURCE: Resource;
}

/// Type-level stand-in for an [`Operation`] value
pub trait OperationMarker: Send + Sync + 'static {
    const OPERATION: Operation;
}

macro_rules! markers {
    ($module:ident, $trait:ident, $konst:ident, $enum:ident, [$($variant:ident),* $(,)?]) => {
        paste::paste! {
            #[doc = "Marker types for each [`" $enum "`] variant."]
            pub mod $module {
                use super::$trait;
                use crate::types::$enum;

                $(
                    #[doc = "Marker for [`" $enum "::" $variant "`]"]
                    pub struct $variant;

                    impl $trait for $variant {
                        const $konst: $enum = $enum::$variant;
                    }
                )*
            }
        }
    };
}

markers!(
    resource,
    ResourceMarker,
    RESOURCE,
    Resource,
    [
        Users,
        Units,
        Vehicles,
        Pets,
        FamilyMembers,
        ExpenseTypes,
        Fees,
        Payments,
        NoticeCategories,
        Notices,
        CommonAreas,
        Reservations,
        MaintenanceRequests,
        Notifications,
        ActivityLogs,
        Dashboard,
        Reports,
    ]
);

markers!(
    operation,
    OperationMarker,
    OPERATION,
    Operation,
    [CreateAll, CreateOwn, ReadAll, ReadOwn, UpdateAll, UpdateOwn, DeleteAll, DeleteOwn]
);

const ALL: &[Operation] = &[
    Operation::CreateAll,
    Operation::ReadAll,
    Operation::UpdateAll,
    Operation::DeleteAll,
];
const OWN_CRUD: &[Operation] = &[
    Operation::CreateOwn,
    Operation::ReadOwn,
    Operation::UpdateOwn,
    Operation::DeleteOwn,
];
const READ_ALL: &[Operation] = &[Operation::ReadAll];
const READ_OWN: &[Operation] = &[Operation::ReadOwn];

/// Operations a role holds on a resource. `*All` grants imply the matching `*Own`.
pub fn role_grants(role: Role, resource: Resource) -> &'static [Operation] {
    use Resource::*;

    match role {
        Role::Admin => match resource {
            Dashboard | Reports => READ_ALL,
            _ => ALL,
        },
        Role::Staff | Role::Resident => match resource {
            Users => &[Operation::ReadOwn, Operation::UpdateOwn],
            Units | Fees | Payments | Reports => READ_OWN,
            ExpenseTypes | NoticeCategories | Notices | CommonAreas => READ_ALL,
            Reservations => OWN_CRUD,
            MaintenanceRequests if role == Role::Staff => &[
                Operation::CreateOwn,
                Operation::ReadAll,
                Operation::UpdateAll,
                Operation::DeleteOwn,
            ],
            MaintenanceRequests => OWN_CRUD,
            Notifications => &[Operation::ReadOwn, Operation::UpdateOwn, Operation::DeleteOwn],
            ActivityLogs => &[Operation::CreateOwn],
            Vehicles | Pets | FamilyMembers | Dashboard => &[],
        },
    }
}

pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    let grants = role_grants(user.role, resource);
    grants.contains(&operation) || grants.contains(&operation.unrestricted())
}

pub fn can_read_all_resources(user: &CurrentUser, resource: Resource) -> bool {
    has_permission(user, resource, Operation::ReadAll)
}

/// Whether the user may read a record owned by `owner_id`
pub fn can_read_own_resource(user: &CurrentUser, resource: Resource, owner_id: UserId) -> bool {
    can_read_all_resources(user, resource) || (user.id == owner_id && has_permission(user, resource, Operation::ReadOwn))
}

/// Whether the user may modify a record owned by `owner_id`
pub fn can_update_own_resource(user: &CurrentUser, resource: Resource, owner_id: UserId) -> bool {
    has_permission(user, resource, Operation::UpdateAll) || (user.id == owner_id && has_permission(user, resource, Operation::UpdateOwn))
}

/// Whether the user may delete a record owned by `owner_id`
pub fn can_delete_own_resource(user: &CurrentUser, resource: Resource, owner_id: UserId) -> bool {
    has_permission(user, resource, Operation::DeleteAll) || (user.id == owner_id && has_permission(user, resource, Operation::DeleteOwn))
}

/// Fail with 403 unless the user holds the permission
pub fn require_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> Result<(), Error> {
    if has_permission(user, resource, operation) {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: Permission::Allow(resource, operation),
            action: operation,
            resource: resource.to_string(),
        })
    }
}

/// Extractor that authenticates the caller and checks a static permission.
///
/// Dereferences to the authenticated [`CurrentUser`].
pub struct RequiresPermission<R, O> {
    user: CurrentUser,
    _marker: PhantomData<fn() -> (R, O)>,
}

impl<R, O> RequiresPermission<R, O> {
    pub fn into_user(self) -> CurrentUser {
        self.user
    }
}

impl<R, O> Deref for RequiresPermission<R, O> {
    type Target = CurrentUser;

    fn deref(&self) -> &CurrentUser {
        &self.user
    }
}

impl<R: ResourceMarker, O: OperationMarker> FromRequestParts<AppState> for RequiresPermission<R, O> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        require_permission(&user, R::RESOURCE, O::OPERATION)?;
        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}
