#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use disparo_image as image;

#[doc(inline)]
pub use disparo_imgproc as imgproc;

#[doc(inline)]
pub use disparo_io as io;

/// Load a stereo pair and disparity map from disk, filter and write the result.
pub mod execute;

pub use crate::execute::{execute, ExecuteError};
