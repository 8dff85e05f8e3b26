use super::FilterError;

/// Check that a bandwidth is finite and strictly positive.
pub(crate) fn check_bandwidth(name: &'static str, value: f32) -> Result<f32, FilterError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(FilterError::InvalidParameter { name, value })
    }
}

/// Unnormalized gaussian `exp(-delta^2 / (2 sigma^2))`.
///
/// Evaluated as `exp(-t^2 / 2)` with `t = delta / sigma`, so a zero difference
/// gives exactly one for any positive `sigma`, however small.
#[inline]
pub(crate) fn gaussian(delta: f32, sigma: f32) -> f32 {
    let t = delta / sigma;
    (-0.5 * t * t).exp()
}

/// Largest window half-radius accepted by [`half_kernel_size`].
pub const MAX_HALF_KERNEL_SIZE: usize = 4096;

/// Compute the window half-radius for a spatial bandwidth.
///
/// The window spans `ceil(3 * sigma_s)` pixels on each side of the center,
/// which leaves less than one percent of the Gaussian mass outside the window.
///
/// # Arguments
///
/// * `sigma_s` - The spatial bandwidth in pixels.
///
/// # Returns
///
/// The half-radius `r`; the full window is `(2r + 1) x (2r + 1)`.
///
/// # Errors
///
/// Returns [`FilterError::InvalidParameter`] if `sigma_s` is not finite and > 0,
/// or if the resulting radius exceeds [`MAX_HALF_KERNEL_SIZE`].
///
/// # Example
///
/// ```
/// use disparo_imgproc::filter::kernels::half_kernel_size;
///
/// assert_eq!(half_kernel_size(2.0).unwrap(), 6);
/// assert_eq!(half_kernel_size(0.1).unwrap(), 1);
/// assert!(half_kernel_size(0.0).is_err());
/// ```
pub fn half_kernel_size(sigma_s: f32) -> Result<usize, FilterError> {
    let sigma_s = check_bandwidth("sigma_s", sigma_s)?;
    let radius = (3.0 * sigma_s).ceil();
    if radius > MAX_HALF_KERNEL_SIZE as f32 {
        return Err(FilterError::InvalidParameter {
            name: "sigma_s",
            value: sigma_s,
        });
    }
    Ok(radius as usize)
}

/// Create an unnormalized 1D spatial gaussian table.
///
/// Entry `i` holds `exp(-(i - r)^2 / (2 sigma_s^2))`, so the center tap is
/// exactly one and the 2D spatial weight of an offset `(dx, dy)` is the
/// product of the taps at `dx` and `dy`.
///
/// # Arguments
///
/// * `half_kernel_size` - The window half-radius `r`.
/// * `sigma_s` - The spatial bandwidth.
///
/// # Returns
///
/// A vector of `2r + 1` taps.
pub fn spatial_kernel_1d(half_kernel_size: usize, sigma_s: f32) -> Vec<f32> {
    let r = half_kernel_size as f32;

    (0..2 * half_kernel_size + 1)
        .map(|i| gaussian(i as f32 - r, sigma_s))
        .collect()
}
