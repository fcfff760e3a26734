//! Users DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::application::{AuthResult, RegisterUserCommand};
use crate::domain::User;

/// Registration body. Field names follow the public camelCase contract.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[validate(length(min = 1, max = 256, message = "full name is required"))]
    #[schema(example = "Ada Lovelace")]
    pub full_name: String,
    #[validate(length(min = 3, max = 50, message = "must be 3-50 characters"))]
    #[schema(example = "ada")]
    pub user_name: String,
    #[validate(email(message = "invalid email format"))]
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[validate(range(max = 150, message = "must be at most 150"))]
    pub age: u32,
    #[validate(length(min = 6, max = 128, message = "must be 6-128 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "confirm password is required"))]
    pub confirm_password: String,
    #[serde(default)]
    #[schema(example = json!(["User"]))]
    pub roles: Vec<String>,
}

impl From<RegistrationRequest> for RegisterUserCommand {
    fn from(req: RegistrationRequest) -> Self {
        Self {
            full_name: req.full_name,
            username: req.user_name,
            email: req.email,
            age: req.age,
            password: req.password,
            confirm_password: req.confirm_password,
            roles: req.roles,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email format"))]
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignRoleRequest {
    #[validate(length(min = 1, max = 64, message = "role name is required"))]
    #[schema(example = "Admin")]
    pub role: String,
}

/// Public view of a user; the password hash never leaves the service.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserDto {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub age: u32,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        let roles = u.role_list();
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            age: u.age,
            roles,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Token payload returned by both registration and login
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub user: UserDto,
}

impl From<AuthResult> for AuthResponse {
    fn from(r: AuthResult) -> Self {
        Self {
            token: r.token,
            token_type: r.token_type,
            expires_in: r.expires_in,
            user: r.user.into(),
        }
    }
}
