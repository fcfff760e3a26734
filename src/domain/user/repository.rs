use async_trait::async_trait;

use super::{CreateUserDto, User};
use crate::support::IdentityResult;

/// Persistence for user records and hashed credentials.
///
/// `create_user` must perform the uniqueness check and the insert atomically:
/// a duplicate email or username fails with `IdentityError::AlreadyRegistered`
/// and leaves nothing behind, even when two calls race.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create_user(&self, dto: CreateUserDto) -> IdentityResult<User>;

    async fn list_users(&self) -> IdentityResult<Vec<User>>;
    async fn count_users(&self) -> IdentityResult<u64>;
    async fn get_user_by_id(&self, id: &str) -> IdentityResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> IdentityResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> IdentityResult<Option<User>>;
}
