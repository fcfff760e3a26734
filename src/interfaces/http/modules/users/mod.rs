//! Users module: registration, login, listing and role administration

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
