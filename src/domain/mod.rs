//! Domain layer: identity entities and the storage interfaces they depend on.

pub mod role;
pub mod user;

pub use role::{model::ADMIN_ROLE, Role, RoleAssigner};
pub use user::{normalize_email, normalize_username, CreateUserDto, CredentialStore, User};

pub use crate::support::errors::{IdentityError, IdentityResult};
