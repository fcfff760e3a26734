use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Validation: {0}")]
    ValidationFailed(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    #[error("User not found with this email")]
    UserNotFound,

    #[error("Password is invalid")]
    InvalidCredentials,

    #[error("There is an issue with signing in: {0}")]
    SignInFailure(String),

    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl IdentityError {
    pub fn user_not_found(id: &str) -> Self {
        Self::NotFound {
            entity: "User",
            field: "id",
            value: id.to_string(),
        }
    }

    /// Whether the failure is a server-side fault rather than a client error.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::SignInFailure(_) | Self::Infra(_))
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sea_orm::DbErr> for IdentityError {
    fn from(e: sea_orm::DbErr) -> Self {
        Self::Infra(InfraError::Database(e))
    }
}

impl From<bcrypt::BcryptError> for IdentityError {
    fn from(e: bcrypt::BcryptError) -> Self {
        Self::Infra(InfraError::Crypto(e.to_string()))
    }
}

/// Result type for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_flagged() {
        assert!(IdentityError::SignInFailure("boom".into()).is_internal());
        assert!(IdentityError::Infra(InfraError::Crypto("bad".into())).is_internal());
        assert!(!IdentityError::PasswordMismatch.is_internal());
        assert!(!IdentityError::user_not_found("42").is_internal());
    }

    #[test]
    fn not_found_message_names_the_entity() {
        let err = IdentityError::user_not_found("abc");
        assert_eq!(err.to_string(), "Not found: User with id=abc");
    }
}
