//! The CRUD contract shared by table-backed repositories.

use crate::db::errors::Result;
use std::collections::HashMap;

/// CRUD over one table (or a table joined with its one-to-one companions, as users are
/// with profiles).
///
/// Implementors hold a `&mut PgConnection`, so the same repository works on a pooled
/// connection or inside a transaction. Records the caller may not see are filtered by
/// the API layer, never here.
#[async_trait::async_trait]
pub trait Repository {
    type CreateRequest;
    type UpdateRequest;
    /// Row type returned by every operation
    type Response;
    type Id: Send + Sync;
    /// Pagination plus the table's list filters
    type Filter: Send + Sync;

    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Several rows by id, keyed by id; missing ids are simply absent
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>>;

    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// `false` when no row had that id
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Fields left `None` in the request keep their value. Fails with
    /// [`crate::db::errors::DbError::NotFound`] for an unknown id.
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
