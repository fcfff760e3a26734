//! Identity module — registration, login and user queries
//!
//! Contains the `AuthService` which orchestrates the credential store,
//! role assigner and token issuer.

pub mod service;

pub use service::{AuthResult, AuthService, RegisterUserCommand};
