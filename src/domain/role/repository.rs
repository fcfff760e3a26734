use async_trait::async_trait;

use super::Role;
use crate::support::IdentityResult;

/// Associates users with named roles.
#[async_trait]
pub trait RoleAssigner: Send + Sync {
    /// Create the role if it does not exist yet and return it.
    async fn ensure_role(&self, name: &str) -> IdentityResult<Role>;

    async fn role_exists(&self, name: &str) -> IdentityResult<bool>;

    /// Link `role` to the user. Assigning a role the user already has is a no-op.
    ///
    /// Fails `NotFound` for an unknown user and `ValidationFailed` for an
    /// unknown role.
    async fn assign_role(&self, user_id: &str, role: &str) -> IdentityResult<()>;
}
