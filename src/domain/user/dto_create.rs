/// Input for [`CredentialStore::create_user`](super::CredentialStore::create_user).
///
/// The password is already hashed; `roles` must name existing roles and are
/// linked in the same atomic write as the user row.
#[derive(Debug, Clone)]
pub struct CreateUserDto {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub age: u32,
    pub password_hash: String,
    pub roles: Vec<String>,
}
