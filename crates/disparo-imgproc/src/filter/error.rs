use disparo_image::{ImageError, ImageSize};

use crate::parallel::ParallelError;

/// Errors related to the disparity filter.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// A bandwidth was not a finite, strictly positive number.
    #[error("invalid parameter `{name}`: expected a finite value > 0, got {value}")]
    InvalidParameter {
        /// The parameter name.
        name: &'static str,
        /// The rejected value.
        value: f32,
    },

    /// An input or output image does not match the reference (left) image size.
    #[error("dimension mismatch: `{name}` has {found}, expected {expected}")]
    DimensionMismatch {
        /// The name of the offending image.
        name: &'static str,
        /// The size of the left image.
        expected: ImageSize,
        /// The size of the offending image.
        found: ImageSize,
    },

    /// The filter pass was cancelled before completion.
    #[error("filter pass was cancelled")]
    Cancelled,

    /// Error from the image module.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Error from the parallel execution module.
    #[error(transparent)]
    Parallel(ParallelError),
}

impl From<ParallelError> for FilterError {
    fn from(err: ParallelError) -> Self {
        match err {
            ParallelError::Cancelled => FilterError::Cancelled,
            other => FilterError::Parallel(other),
        }
    }
}

/// Check that `found` matches `expected`, naming the image on failure.
pub(crate) fn ensure_same_size(
    name: &'static str,
    expected: ImageSize,
    found: ImageSize,
) -> Result<(), FilterError> {
    if expected != found {
        return Err(FilterError::DimensionMismatch {
            name,
            expected,
            found,
        });
    }
    Ok(())
}
