//! API request/response models for users and profiles.

use super::households::{FamilyMemberResponse, PetResponse, VehicleResponse};
use super::pagination::Pagination;
use crate::db::models::users::{ProfileDBResponse, UserDBResponse};
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Role stored on a user's profile
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Staff,
    Resident,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    pub username: String,
    pub email: String,
    /// Users created without a password cannot log in until one is set
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    /// Defaults to RESIDENT
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    /// Household registries (only included if requested)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicles: Option<Vec<VehicleResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pets: Option<Vec<PetResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_members: Option<Vec<FamilyMemberResponse>>,
}

/// Query parameters for listing users
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListUsersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Include related data (comma-separated: "household")
    pub include: Option<String>,

    /// Case-insensitive substring match on username, email or full name
    pub search: Option<String>,

    /// Only users with this role
    pub role: Option<Role>,
}

impl ListUsersQuery {
    pub fn includes(&self, relation: &str) -> bool {
        self.include
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .any(|s| s == relation)
    }
}

/// The authenticated caller, as carried in session tokens
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            role: db.role,
        }
    }
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            is_active: db.is_active,
            full_name: db.full_name,
            phone: db.phone,
            role: db.role,
            created_at: db.created_at,
            updated_at: db.updated_at,
            last_login: db.last_login,
            vehicles: None,
            pets: None,
            family_members: None,
        }
    }
}

impl From<ProfileDBResponse> for ProfileResponse {
    fn from(db: ProfileDBResponse) -> Self {
        Self {
            user_id: db.user_id,
            full_name: db.full_name,
            phone: db.phone,
            role: db.role,
            updated_at: db.updated_at,
        }
    }
}

impl UserResponse {
    /// Attach the user's vehicles, pets and family members
    pub fn with_household(mut self, vehicles: Vec<VehicleResponse>, pets: Vec<PetResponse>, family_members: Vec<FamilyMemberResponse>) -> Self {
        self.vehicles = Some(vehicles);
        self.pets = Some(pets);
        self.family_members = Some(family_members);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Resident).unwrap(), "\"RESIDENT\"");
        let role: Role = serde_json::from_str("\"STAFF\"").unwrap();
        assert_eq!(role, Role::Staff);
    }

    #[test]
    fn test_includes_parsing() {
        let query = ListUsersQuery {
            include: Some("foo, household".to_string()),
            ..Default::default()
        };
        assert!(query.includes("household"));
        assert!(!query.includes("groups"));
    }
}
