#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for I/O operations.
///
/// Defines [`error::IoError`] variants for file access and decoding/encoding failures.
pub mod error;

/// High-level image reading and writing functions.
///
/// Provides the readers for the stereo views and the disparity field, and the
/// writer for the filtered output. Any format supported by the `image` crate
/// is accepted.
pub mod functional;

pub use crate::error::IoError;
