//! Application layer — identity use cases

pub mod identity;

pub use identity::{AuthResult, AuthService, RegisterUserCommand};
