//! Authentication and authorization.
//!
//! - [`password`]: Argon2id hashing and password rules
//! - [`session`]: JWT access and refresh tokens
//! - [`current_user`]: the [`CurrentUser`](crate::api::models::users::CurrentUser) extractor
//!   (bearer token, then session cookie)
//! - [`permissions`]: the role grant table and the `RequiresPermission` extractor

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
