//! # exkit-error
//!
//! Errors the exkit engine reports about its own use: a regex that does not
//! compile, a kind registered under an unknown parent, a malformed config.
//!
//! These are not the structured errors the engine manages on behalf of user
//! code (see `exkit_core::ErrorRecord`). They surface at setup time, before
//! any protected work runs.
//!
//! ## Usage
//!
//! ```rust
//! use exkit_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::UnknownKind, "parent kind is not registered")
//!         .with_operation("kinds::register")
//!         .with_context("kind", "io.open")
//!         .with_context("parent", "io"))
//! }
//! ```

mod error;
mod kind;

pub use error::Error;
pub use kind::ErrorKind;

/// Result type alias using exkit Error
pub type Result<T> = std::result::Result<T, Error>;
