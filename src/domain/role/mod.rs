//! Role aggregate

pub mod model;
pub mod repository;

pub use model::Role;
pub use repository::RoleAssigner;
