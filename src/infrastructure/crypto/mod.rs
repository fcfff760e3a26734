//! Password hashing and token signing

pub mod jwt;
pub mod password;

pub use jwt::{IssuedToken, JwtConfig, TokenClaims, TokenIssuer};
pub use password::PasswordHasher;
