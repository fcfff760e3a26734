//! Cross-cutting support: error types and shutdown coordination.

pub mod errors;
pub mod shutdown;

pub use errors::{IdentityError, IdentityResult, InfraError};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
