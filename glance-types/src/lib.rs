//! Glance shared types.
//!
//! Serializable types shared between the capture core and its front ends,
//! plus platform log-directory resolution.

pub mod logging;
pub mod types;

pub use types::*;
