//! Password hashing utilities

use bcrypt::{hash, verify};

/// bcrypt hasher with a configurable work factor.
///
/// Keeps a hash of a throwaway password so that a login for an unknown
/// account can spend the same verification time as a real one.
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, bcrypt::BcryptError> {
        let dummy_hash = hash("identity-service-timing-guard", cost)?;
        Ok(Self { cost, dummy_hash })
    }

    /// Hash a password using bcrypt
    pub fn hash_password(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        hash(password, self.cost)
    }

    /// Verify a password against a hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
        verify(password, hash)
    }

    /// Burn one verification against the throwaway hash.
    pub fn verify_dummy(&self, password: &str) {
        let _ = verify(password, &self.dummy_hash);
    }
}
