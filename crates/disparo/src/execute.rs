use std::path::Path;

use disparo_image::{ops, Image};
use disparo_imgproc::filter::{DisparityFilter, FilterError};
use disparo_io::{functional as F, IoError};

/// An error type for [`execute`].
#[derive(thiserror::Error, Debug)]
pub enum ExecuteError {
    /// Error reading the inputs or writing the output.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Error raised by the filter.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

fn read_color(file_path: &Path) -> Result<Image<f32, 3>, ExecuteError> {
    let image = F::read_image_any_rgb8(file_path)?;
    let mut image_f32 = Image::from_size_val(image.size(), 0.0f32).map_err(IoError::from)?;
    ops::cast_and_scale(&image, &mut image_f32, 1.0 / 255.0).map_err(IoError::from)?;
    Ok(image_f32)
}

/// Filter a stereo pair stored on disk.
///
/// Reads the left and right views as color images and the disparity map as a
/// single channel image (integer formats normalized to `[0, 1]`), applies the
/// filter with its current configuration and writes the RGBA result.
///
/// # Arguments
///
/// * `left_path` - The path to the left view.
/// * `right_path` - The path to the right view.
/// * `disparity_path` - The path to the disparity map.
/// * `output_path` - The path of the image to write.
/// * `filter` - The configured filter.
///
/// # Returns
///
/// The filtered image that was written to `output_path`.
///
/// # Errors
///
/// Any failure to read or write an image, or any error raised by the filter.
pub fn execute(
    left_path: impl AsRef<Path>,
    right_path: impl AsRef<Path>,
    disparity_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    filter: &DisparityFilter,
) -> Result<Image<f32, 4>, ExecuteError> {
    let left = read_color(left_path.as_ref())?;
    let right = read_color(right_path.as_ref())?;
    let disparity = F::read_image_any_mono_f32(disparity_path.as_ref())?;
    log::info!(
        "loaded stereo pair {} with disparity {}",
        left.size(),
        disparity.size()
    );

    let output = filter.apply(&left, &right, &disparity)?;

    F::write_image_any_rgba_f32(output_path.as_ref(), &output)?;
    log::info!("wrote {}", output_path.as_ref().display());

    Ok(output)
}
