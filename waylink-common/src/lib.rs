//! Common types for the waylink toolkit.
//!
//! Currently this is just the shared error taxonomy; every waylink crate
//! reports failures through the types in [`error`].

pub mod error;

pub use error::{InvalidRequest, InvariantViolation, PointNotFound, RouteError};
