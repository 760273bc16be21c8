//! Harvest Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the harvest workspace.
//!
//! # Overview
//!
//! - **Error Handling**: Low-level error type and result alias
//! - **Checksums**: SHA-256 digests used for stable document identifiers
//! - **Types**: Change-feed positions and pagination parameters
//! - **Logging**: Centralized `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use harvest_common::checksum::sha256_hex;
//! use harvest_common::types::Position;
//!
//! let since: Position = "1024".parse().unwrap();
//! assert_eq!(since, Position::Seq(1024));
//! let digest = sha256_hex("couch-doc-id");
//! assert_eq!(digest.len(), 64);
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::{Pagination, Position};
