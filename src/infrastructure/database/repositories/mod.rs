//! SeaORM implementations of the credential store and role assigner

pub mod role_repository;
pub mod user_repository;

pub use role_repository::RoleRepository;
pub use user_repository::UserRepository;

use sea_orm::{DbErr, SqlErr};

/// Unique index violations signal a lost race on a uniqueness invariant.
pub(crate) fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
