//! # crewgen-error
//!
//! Unified error handling for crewgen, following OpenDAL's error handling practices.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., AgentNotFound, InvalidResponse)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use crewgen_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::AgentNotFound, "agent 'seo_specialist' not in config")
//!         .with_operation("materialize::link_tasks")
//!         .with_context("agent", "seo_specialist")
//!         .with_context("task", "implement_seo_practices"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All functions return `Result<T, crewgen_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using crewgen Error
pub type Result<T> = std::result::Result<T, Error>;
