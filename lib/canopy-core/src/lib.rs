//! Core router abstractions shared by every backend
//!
//! This library provides:
//! - BackendRouter, the capability every router backend exposes
//! - RouterOpts, the per-app option set and its annotation round-trip
//! - The RouterError taxonomy

pub mod error;
pub mod opts;
pub mod router;

pub use error::{Result, RouterError};
pub use opts::RouterOpts;
pub use router::BackendRouter;
