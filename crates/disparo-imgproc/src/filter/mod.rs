//! Filter operations
//!
//! This module provides the disparity-guided joint bilateral filter for stereo
//! image pairs.

/// Filter kernels
pub mod kernels;

/// Per-neighbor weighting terms
pub mod weights;

/// Filter parameters
mod params;
pub use params::*;

/// Filter errors
mod error;
pub use error::*;

/// Filter operations
mod ops;
pub use ops::*;

/// Stateful filter with snapshot semantics
mod driver;
pub use driver::*;
