//! User aggregate
//!
//! Contains the User entity, the creation DTO, and the credential store interface.

pub mod model;
pub mod repository;

mod dto_create;

pub use model::{normalize_email, normalize_username, User};
pub use dto_create::CreateUserDto;
pub use repository::CredentialStore;
