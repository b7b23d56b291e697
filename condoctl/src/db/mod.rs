//! Persistence: PostgreSQL through SQLx, organised as repositories.
//!
//! - [`handlers`]: one repository per table family, each wrapping a `&mut PgConnection`
//! - [`models`]: row types returned by the repositories and the request types they accept
//! - [`errors`]: [`errors::DbError`], which sorts constraint violations from other failures
//!
//! Handlers open a pooled connection for reads and a transaction whenever several writes
//! must land together (recording a payment, updating a reservation, bootstrapping the admin):
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! if let Some(fee) = Fees::new(&mut tx).lock_for_update(fee_id).await? {
//!     Payments::new(&mut tx).create(&payment).await?;
//! }
//! tx.commit().await?;
//! ```
//!
//! The schema lives in `migrations/` and is applied on startup by [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
