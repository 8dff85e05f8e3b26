//! Gaussian weighting terms of the disparity-guided joint bilateral filter.
//!
//! The weight of a neighbor relative to a reference pixel is the product of
//! three independent Gaussian terms: spatial proximity, disparity similarity
//! and (optionally) color similarity. Every term is one for identical samples,
//! lies in `(0, 1]` otherwise (reaching zero only by underflow) and depends
//! only on squared differences, so it is symmetric under swapping the
//! reference and the neighbor.

use super::{
    kernels::{gaussian, half_kernel_size, spatial_kernel_1d, MAX_HALF_KERNEL_SIZE},
    DisparityFilterParams, FilterError,
};

/// The weighting terms of one filter configuration.
///
/// Holds the bandwidths, the window half-radius and the tabulated spatial
/// term for offsets inside the window.
#[derive(Debug, Clone, PartialEq)]
pub struct DisparityWeights {
    sigma: f32,
    sigma_s: f32,
    sigma_r: f32,
    use_color_weight: bool,
    half_kernel_size: usize,
    spatial_kernel: Vec<f32>,
}

impl DisparityWeights {
    /// Build the weighting terms from validated parameters.
    ///
    /// The window half-radius is derived from `sigma_s` with [`half_kernel_size`].
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidParameter`] if any bandwidth is not finite and > 0.
    pub fn new(params: &DisparityFilterParams) -> Result<Self, FilterError> {
        params.validate()?;
        Self::with_half_kernel_size(params, half_kernel_size(params.sigma_s)?)
    }

    /// Build the weighting terms for an explicit window half-radius.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidParameter`] if any bandwidth is not finite and > 0,
    /// or if the radius exceeds [`MAX_HALF_KERNEL_SIZE`].
    pub fn with_half_kernel_size(
        params: &DisparityFilterParams,
        half_kernel_size: usize,
    ) -> Result<Self, FilterError> {
        params.validate()?;
        if half_kernel_size > MAX_HALF_KERNEL_SIZE {
            return Err(FilterError::InvalidParameter {
                name: "half_kernel_size",
                value: half_kernel_size as f32,
            });
        }

        Ok(Self {
            sigma: params.sigma,
            sigma_s: params.sigma_s,
            sigma_r: params.sigma_r,
            use_color_weight: params.use_color_weight,
            half_kernel_size,
            spatial_kernel: spatial_kernel_1d(half_kernel_size, params.sigma_s),
        })
    }

    /// Spatial term `exp(-(dx^2 + dy^2) / (2 sigma_s^2))`.
    ///
    /// Offsets inside the window are read from the tabulated kernel.
    #[inline]
    pub fn spatial(&self, dx: i32, dy: i32) -> f32 {
        self.spatial_tap(dx) * self.spatial_tap(dy)
    }

    #[inline]
    fn spatial_tap(&self, d: i32) -> f32 {
        let idx = d as isize + self.half_kernel_size as isize;
        usize::try_from(idx)
            .ok()
            .and_then(|idx| self.spatial_kernel.get(idx).copied())
            .unwrap_or_else(|| gaussian(d as f32, self.sigma_s))
    }

    /// Disparity term `exp(-(d_nb - d_ref)^2 / (2 sigma_r^2))`.
    #[inline]
    pub fn disparity(&self, d_ref: f32, d_nb: f32) -> f32 {
        gaussian(d_nb - d_ref, self.sigma_r)
    }

    /// Color term `exp(-|c_nb - c_ref|^2 / (2 sigma^2))`, or one when disabled.
    #[inline]
    pub fn color(&self, c_ref: &[f32], c_nb: &[f32]) -> f32 {
        if !self.use_color_weight {
            return 1.0;
        }

        let t_sq = c_ref
            .iter()
            .zip(c_nb.iter())
            .map(|(a, b)| {
                let t = (b - a) / self.sigma;
                t * t
            })
            .sum::<f32>();

        (-0.5 * t_sq).exp()
    }

    /// Product of the spatial, disparity and color terms.
    #[inline]
    pub fn combined(
        &self,
        (dx, dy): (i32, i32),
        (d_ref, d_nb): (f32, f32),
        (c_ref, c_nb): (&[f32], &[f32]),
    ) -> f32 {
        self.spatial(dx, dy) * self.disparity(d_ref, d_nb) * self.color(c_ref, c_nb)
    }

    /// The window half-radius `r`.
    pub fn half_kernel_size(&self) -> usize {
        self.half_kernel_size
    }

    /// The tabulated 1D spatial term, `2r + 1` taps centered on offset zero.
    pub fn spatial_kernel(&self) -> &[f32] {
        &self.spatial_kernel
    }

    /// The spatial bandwidth the spatial term was built from.
    pub fn spatial_sigma(&self) -> f32 {
        self.sigma_s
    }

    /// Whether the color term is active.
    pub fn use_color_weight(&self) -> bool {
        self.use_color_weight
    }
}
