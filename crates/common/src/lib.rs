//! # Common — shared foundations for the EmberKV storage engine
//!
//! Everything the other crates agree on lives here:
//!
//! - [`error`] — the structured error type carried across every layer
//!   (category + machine-readable code + context fields + cause chain).
//! - [`options`] — configuration with defaults, bounds, and builder-style
//!   setters.
//! - [`checksum`] — the [`checksum::Checksummer`] trait and its CRC32/IEEE
//!   implementation used for record integrity.
//! - [`clock`] — unix-epoch time helpers shared by storage and the index.

pub mod checksum;
pub mod clock;
pub mod error;
pub mod options;

pub use error::{Category, Error, ErrorCode, Result};
pub use options::{Options, SegmentOptions};
