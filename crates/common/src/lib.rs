//! Shared types for the WSKey workspace
//!
//! `Secret` wraps key secrets so they never reach logs; `Error` covers
//! configuration loading in the binaries.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
