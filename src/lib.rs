//! # Identity Service
//!
//! User registration, login and role management over HTTP, issuing stateless
//! JWT bearer tokens.
//!
//! ## Architecture
//!
//! - **domain**: users, roles and the store traits (`CredentialStore`, `RoleAssigner`)
//! - **application**: `AuthService`, the registration/login/query use cases
//! - **infrastructure**: SeaORM persistence, in-memory store, JWT and bcrypt
//! - **interfaces**: REST API with Swagger documentation
//! - **support**: error types and graceful shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod support;

pub use config::{default_config_path, AppConfig};

pub use infrastructure::{init_database, DatabaseConfig};

pub use interfaces::http::create_api_router;
