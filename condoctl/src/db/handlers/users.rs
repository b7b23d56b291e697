//! Database repository for users and their profiles.

use crate::api::models::users::Role;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::users::{ProfileDBResponse, ProfileUpdateDBRequest, UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::types::{UserId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
    pub search: Option<String>, // Case-insensitive substring search on username, email and full name
    pub role: Option<Role>,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            search: None,
            role: None,
        }
    }

    pub fn with_search(mut self, search: String) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

const USER_SELECT: &str = r#"
    SELECT u.id, u.username, u.email, u.password_hash, u.is_active,
           p.full_name, p.phone, COALESCE(p.role, 'RESIDENT'::user_role) AS role,
           u.created_at, u.updated_at, u.last_login
    FROM users u
    LEFT JOIN profiles p ON p.user_id = u.id
"#;

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    if let Some(ref search) = filter.search {
        let search_pattern = super::contains_pattern(search);
        query.push(" AND (LOWER(u.username) LIKE ");
        query.push_bind(search_pattern.clone());
        query.push(" OR LOWER(u.email) LIKE ");
        query.push_bind(search_pattern.clone());
        query.push(" OR LOWER(COALESCE(p.full_name, '')) LIKE ");
        query.push_bind(search_pattern);
        query.push(")");
    }

    if let Some(role) = filter.role {
        query.push(" AND COALESCE(p.role, 'RESIDENT'::user_role) = ");
        query.push_bind(role);
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        // User and profile are inserted by a single statement so neither can exist without the other
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            WITH new_user AS (
                INSERT INTO users (username, email, password_hash)
                VALUES ($1, $2, $3)
                RETURNING *
            ), new_profile AS (
                INSERT INTO profiles (user_id, full_name, phone, role)
                SELECT id, $4, $5, $6 FROM new_user
                RETURNING *
            )
            SELECT u.id, u.username, u.email, u.password_hash, u.is_active,
                   p.full_name, p.phone, p.role,
                   u.created_at, u.updated_at, u.last_login
            FROM new_user u
            JOIN new_profile p ON p.user_id = u.id
            "#,
        )
        .bind(request.username.trim())
        .bind(request.email.trim())
        .bind(&request.password_hash)
        .bind(&request.full_name)
        .bind(&request.phone)
        .bind(request.role)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("{USER_SELECT} WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<UserId>) -> Result<HashMap<UserId, UserDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = sqlx::query_as::<_, UserDBResponse>(&format!("{USER_SELECT} WHERE u.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(USER_SELECT);
        query.push(" WHERE 1=1");
        push_filters(&mut query, filter);

        query.push(" ORDER BY u.username LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let users = query.build_query_as::<UserDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(users)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        sqlx::query_scalar::<_, UserId>(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                password_hash = COALESCE($3, password_hash),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(request.email.as_deref().map(str::trim))
        .bind(&request.password_hash)
        .bind(request.is_active)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        if request.full_name.is_some() || request.phone.is_some() || request.role.is_some() {
            self.upsert_profile_row(id, request.full_name.as_deref(), request.phone.as_deref(), request.role)
                .await?;
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &UserFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM users u LEFT JOIN profiles p ON p.user_id = u.id WHERE 1=1");
        push_filters(&mut query, filter);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Look up a user by login identifier: an email when it contains `@`, a username otherwise.
    /// Both comparisons are case-insensitive.
    #[instrument(skip(self), err)]
    pub async fn get_user_by_login(&mut self, identifier: &str) -> Result<Option<UserDBResponse>> {
        let column = if identifier.contains('@') { "u.email" } else { "u.username" };
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("{USER_SELECT} WHERE LOWER({column}) = LOWER($1)"))
            .bind(identifier)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("{USER_SELECT} WHERE LOWER(u.email) = LOWER($1)"))
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self), err)]
    pub async fn get_user_by_username(&mut self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("{USER_SELECT} WHERE LOWER(u.username) = LOWER($1)"))
            .bind(username)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn update_last_login(&mut self, id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_profile(&mut self, user_id: UserId) -> Result<Option<ProfileDBResponse>> {
        let profile = sqlx::query_as::<_, ProfileDBResponse>("SELECT user_id, full_name, phone, role, updated_at FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(profile)
    }

    /// Get-or-create the user's profile, then apply the partial update
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn update_profile(&mut self, user_id: UserId, request: &ProfileUpdateDBRequest) -> Result<ProfileDBResponse> {
        self.upsert_profile_row(user_id, request.full_name.as_deref(), request.phone.as_deref(), None)
            .await
    }

    async fn upsert_profile_row(
        &mut self,
        user_id: UserId,
        full_name: Option<&str>,
        phone: Option<&str>,
        role: Option<Role>,
    ) -> Result<ProfileDBResponse> {
        let profile = sqlx::query_as::<_, ProfileDBResponse>(
            r#"
            INSERT INTO profiles (user_id, full_name, phone, role)
            VALUES ($1, $2, $3, COALESCE($4, 'RESIDENT'::user_role))
            ON CONFLICT (user_id) DO UPDATE SET
                full_name = COALESCE($2, profiles.full_name),
                phone = COALESCE($3, profiles.phone),
                role = COALESCE($4, profiles.role),
                updated_at = NOW()
            RETURNING user_id, full_name, phone, role, updated_at
            "#,
        )
        .bind(user_id)
        .bind(full_name)
        .bind(phone)
        .bind(role)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn create_request(username: &str, role: Role) -> UserCreateDBRequest {
        UserCreateDBRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: None,
            full_name: Some(format!("{username} full")),
            phone: None,
            role,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_user_with_profile(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&create_request("maria", Role::Staff)).await.unwrap();
        assert_eq!(user.username, "maria");
        assert_eq!(user.role, Role::Staff);
        assert_eq!(user.full_name.as_deref(), Some("maria full"));
        assert!(user.is_active);

        let profile = repo.get_profile(user.id).await.unwrap().unwrap();
        assert_eq!(profile.role, Role::Staff);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_lookup_is_case_insensitive(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        let user = repo.create(&create_request("Carlos", Role::Resident)).await.unwrap();

        let by_email = repo.get_user_by_login("CARLOS@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        let by_username = repo.get_user_by_login("carlos").await.unwrap().unwrap();
        assert_eq!(by_username.id, user.id);

        assert!(repo.get_user_by_login("nobody").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_username_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        repo.create(&create_request("ana", Role::Resident)).await.unwrap();

        let mut duplicate = create_request("ANA", Role::Resident);
        duplicate.email = "other@example.com".to_string();
        let err = repo.create(&duplicate).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_user_and_profile(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        let user = repo.create(&create_request("luis", Role::Resident)).await.unwrap();

        let updated = repo
            .update(
                user.id,
                &UserUpdateDBRequest {
                    role: Some(Role::Admin),
                    phone: Some("555-1234".to_string()),
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.role, Role::Admin);
        assert_eq!(updated.phone.as_deref(), Some("555-1234"));
        assert_eq!(updated.full_name.as_deref(), Some("luis full"));
        assert!(!updated.is_active);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_profile_creates_missing_profile(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let id: UserId = sqlx::query_scalar("INSERT INTO users (username, email) VALUES ('bare', 'bare@example.com') RETURNING id")
            .fetch_one(&mut *conn)
            .await
            .unwrap();

        let mut repo = Users::new(&mut conn);
        assert!(repo.get_profile(id).await.unwrap().is_none());

        let profile = repo
            .update_profile(
                id,
                &ProfileUpdateDBRequest {
                    full_name: Some("Bare User".to_string()),
                    phone: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Bare User"));
        assert_eq!(profile.role, Role::Resident);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_by_role_and_search(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);
        repo.create(&create_request("zoe", Role::Staff)).await.unwrap();
        repo.create(&create_request("adam", Role::Staff)).await.unwrap();
        repo.create(&create_request("bruno", Role::Resident)).await.unwrap();

        let staff = repo.list(&UserFilter::new(0, 10).with_role(Role::Staff)).await.unwrap();
        let names: Vec<_> = staff.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["adam", "zoe"]);
        assert_eq!(repo.count(&UserFilter::new(0, 10).with_role(Role::Staff)).await.unwrap(), 2);

        let found = repo.list(&UserFilter::new(0, 10).with_search("BRU".to_string())).await.unwrap();
        assert_eq!(found.len(), 1);

        repo.create(&create_request("ana_b", Role::Resident)).await.unwrap();
        repo.create(&create_request("anaxb", Role::Resident)).await.unwrap();
        let found = repo.list(&UserFilter::new(0, 10).with_search("a_b".to_string())).await.unwrap();
        let names: Vec<_> = found.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["ana_b"]);
    }
}
