pub mod cli;
pub mod core;
pub mod error;

pub use crate::core::auth::{CredentialStore, RawCredentials};
pub use crate::core::bootstrap::{BootstrapState, FailureReason};
pub use crate::core::client::{Session, SessionConfig};
pub use crate::core::variant::PortalVariant;
pub use error::{PortalError, Result};
