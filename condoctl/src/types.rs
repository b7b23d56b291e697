//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (UserId, UnitId, FeeId, etc.)
//! - Resource and operation enums for access control
//!
//! # Permission System
//!
//! - [`Resource`]: What entity type is being accessed (Units, Fees, Reservations, etc.)
//! - [`Operation`]: What action is being performed (Read, Create, Update, Delete)
//! - [`Permission`]: Authorization requirement combining resource and operation
//!
//! Operations come in two flavors:
//! - **All**: Unrestricted access to all entities (e.g., `ReadAll`, `DeleteAll`)
//! - **Own**: Restricted to the caller's own entities (e.g., `ReadOwn`, `UpdateOwn`)
//!
//! Holding an `All` operation implies the matching `Own` one.

use std::fmt;
use uuid::Uuid;

pub type UserId = Uuid;
pub type UnitId = Uuid;
pub type VehicleId = Uuid;
pub type PetId = Uuid;
pub type FamilyMemberId = Uuid;
pub type ExpenseTypeId = Uuid;
pub type FeeId = Uuid;
pub type PaymentId = Uuid;
pub type NoticeCategoryId = Uuid;
pub type NoticeId = Uuid;
pub type CommonAreaId = Uuid;
pub type ReservationId = Uuid;
pub type MaintenanceRequestId = Uuid;
pub type CommentId = Uuid;
pub type AttachmentId = Uuid;
pub type NotificationId = Uuid;
pub type ActivityLogId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// *-All means unrestricted access, *-Own means restricted to own resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

impl Operation {
    /// The unrestricted counterpart of an `Own` operation (identity for `All` operations).
    pub fn unrestricted(self) -> Operation {
        match self {
            Operation::CreateOwn => Operation::CreateAll,
            Operation::ReadOwn => Operation::ReadAll,
            Operation::UpdateOwn => Operation::UpdateAll,
            Operation::DeleteOwn => Operation::DeleteAll,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
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
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "Create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "Read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "Update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "Delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Users => "users",
            Resource::Units => "units",
            Resource::Vehicles => "vehicles",
            Resource::Pets => "pets",
            Resource::FamilyMembers => "family members",
            Resource::ExpenseTypes => "expense types",
            Resource::Fees => "fees",
            Resource::Payments => "payments",
            Resource::NoticeCategories => "notice categories",
            Resource::Notices => "notices",
            Resource::CommonAreas => "common areas",
            Resource::Reservations => "reservations",
            Resource::MaintenanceRequests => "maintenance requests",
            Resource::Notifications => "notifications",
            Resource::ActivityLogs => "activity logs",
            Resource::Dashboard => "dashboard",
            Resource::Reports => "reports",
        };
        f.write_str(name)
    }
}
