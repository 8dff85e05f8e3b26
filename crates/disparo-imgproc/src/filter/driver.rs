use std::sync::{atomic::AtomicBool, Arc, PoisonError, RwLock};

use disparo_image::Image;

use super::{
    disparity_bilateral_filter, disparity_fusion_filter, error::ensure_same_size,
    weights::DisparityWeights, DisparityFilterParams, FilterError, OUTPUT_CHANNELS,
};
use crate::parallel::ExecutionStrategy;

/// A validated, immutable filter configuration.
///
/// Holds the parameters together with the state derived from them: the
/// weighting terms, the window half-radius and the spatial table. A snapshot
/// is never modified; reconfiguring a [`DisparityFilter`] installs a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSnapshot {
    params: DisparityFilterParams,
    weights: DisparityWeights,
}

impl FilterSnapshot {
    /// Validate the parameters and derive the weighting terms.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidParameter`] if any bandwidth is not finite and > 0.
    pub fn new(params: DisparityFilterParams) -> Result<Self, FilterError> {
        let weights = DisparityWeights::new(&params)?;
        Ok(Self { params, weights })
    }

    /// The parameters of this snapshot.
    pub fn params(&self) -> &DisparityFilterParams {
        &self.params
    }

    /// The weighting terms derived from the parameters.
    pub fn weights(&self) -> &DisparityWeights {
        &self.weights
    }

    /// The window half-radius derived from `sigma_s`.
    pub fn half_kernel_size(&self) -> usize {
        self.weights.half_kernel_size()
    }
}

/// Disparity-guided joint bilateral filter for stereo pairs.
///
/// The filter smooths the left view using a per-pixel disparity field as a
/// guide, so that colors are not blended across depth discontinuities.
///
/// Configuration is held as an immutable [`FilterSnapshot`]. Every call to one
/// of the `apply` methods works on the snapshot that is current when the call
/// starts, so the filter can be shared between threads and reconfigured
/// concurrently without external locking.
///
/// # Example
///
/// ```
/// use disparo_image::{Image, ImageSize};
/// use disparo_imgproc::filter::{DisparityFilter, DisparityFilterParams};
///
/// let size = ImageSize { width: 8, height: 6 };
/// let left = Image::<f32, 3>::from_size_val(size, 0.25).unwrap();
/// let right = Image::<f32, 3>::from_size_val(size, 0.25).unwrap();
/// let disparity = Image::<f32, 1>::from_size_val(size, 0.5).unwrap();
///
/// let filter = DisparityFilter::new(DisparityFilterParams::default()).unwrap();
/// let output = filter.apply(&left, &right, &disparity).unwrap();
///
/// assert_eq!(output.size(), size);
/// assert_eq!(output.get_pixel(3, 2, 0).unwrap(), &0.25);
/// assert_eq!(output.get_pixel(3, 2, 3).unwrap(), &1.0);
/// ```
#[derive(Debug)]
pub struct DisparityFilter {
    snapshot: RwLock<Arc<FilterSnapshot>>,
    strategy: ExecutionStrategy,
}

impl DisparityFilter {
    /// Create a new filter with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidParameter`] if any bandwidth is not finite and > 0.
    pub fn new(params: DisparityFilterParams) -> Result<Self, FilterError> {
        let snapshot = FilterSnapshot::new(params)?;
        log::debug!(
            "disparity filter created: {:?}, half_kernel_size={}",
            params,
            snapshot.half_kernel_size()
        );

        Ok(Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            strategy: ExecutionStrategy::default(),
        })
    }

    /// Set the execution strategy used by the filter passes.
    pub fn with_execution_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replace the current configuration.
    ///
    /// The new parameters are validated before anything is changed; on error
    /// the previous configuration stays in effect.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidParameter`] if any bandwidth is not finite and > 0.
    pub fn configure(&self, params: DisparityFilterParams) -> Result<(), FilterError> {
        let snapshot = Arc::new(FilterSnapshot::new(params)?);
        log::debug!(
            "disparity filter configured: {:?}, half_kernel_size={}",
            params,
            snapshot.half_kernel_size()
        );

        // a poisoned lock still guards a complete snapshot
        let mut current = self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = snapshot;

        Ok(())
    }

    /// The configuration currently in effect.
    pub fn snapshot(&self) -> Arc<FilterSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The parameters currently in effect.
    pub fn params(&self) -> DisparityFilterParams {
        *self.snapshot().params()
    }

    /// The window half-radius currently in effect.
    pub fn half_kernel_size(&self) -> usize {
        self.snapshot().half_kernel_size()
    }

    /// The execution strategy used by the filter passes.
    pub fn execution_strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    /// Filter the left view guided by the disparity field.
    ///
    /// # Arguments
    ///
    /// * `left` - The left color image with shape (H, W, 3).
    /// * `right` - The right color image with shape (H, W, 3).
    /// * `disparity` - The disparity field with shape (H, W, 1).
    ///
    /// # Returns
    ///
    /// A new image with shape (H, W, 4) whose alpha channel is one.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::DimensionMismatch`] if the inputs differ in size.
    pub fn apply(
        &self,
        left: &Image<f32, 3>,
        right: &Image<f32, 3>,
        disparity: &Image<f32, 1>,
    ) -> Result<Image<f32, OUTPUT_CHANNELS>, FilterError> {
        self.apply_impl(left, right, disparity, None)
    }

    /// Same as [`DisparityFilter::apply`], polling `cancel` once per row.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Cancelled`] if `cancel` is raised before the pass
    /// completes; no output is produced in that case.
    pub fn apply_cancellable(
        &self,
        left: &Image<f32, 3>,
        right: &Image<f32, 3>,
        disparity: &Image<f32, 1>,
        cancel: &AtomicBool,
    ) -> Result<Image<f32, OUTPUT_CHANNELS>, FilterError> {
        self.apply_impl(left, right, disparity, Some(cancel))
    }

    /// Filter the left view and blend in disparity-shifted right-view samples.
    ///
    /// This is an alternative blending rule and is never used by
    /// [`DisparityFilter::apply`]. See [`disparity_fusion_filter`].
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::DimensionMismatch`] if the inputs differ in size.
    pub fn apply_with_right_view_fusion(
        &self,
        left: &Image<f32, 3>,
        right: &Image<f32, 3>,
        disparity: &Image<f32, 1>,
    ) -> Result<Image<f32, OUTPUT_CHANNELS>, FilterError> {
        let snapshot = self.snapshot();
        ensure_same_size("right", left.size(), right.size())?;
        ensure_same_size("disparity", left.size(), disparity.size())?;

        let mut dst = Image::from_size_val(left.size(), 0.0)?;
        let degenerate = disparity_fusion_filter(
            left,
            right,
            disparity,
            &mut dst,
            snapshot.weights(),
            snapshot.params().reference_view,
            self.strategy,
        )?;
        report_degenerate(degenerate);

        Ok(dst)
    }

    fn apply_impl(
        &self,
        left: &Image<f32, 3>,
        right: &Image<f32, 3>,
        disparity: &Image<f32, 1>,
        cancel: Option<&AtomicBool>,
    ) -> Result<Image<f32, OUTPUT_CHANNELS>, FilterError> {
        let snapshot = self.snapshot();
        ensure_same_size("right", left.size(), right.size())?;
        ensure_same_size("disparity", left.size(), disparity.size())?;

        let mut dst = Image::from_size_val(left.size(), 0.0)?;
        let degenerate = disparity_bilateral_filter(
            left,
            disparity,
            &mut dst,
            snapshot.weights(),
            self.strategy,
            cancel,
        )?;
        report_degenerate(degenerate);

        Ok(dst)
    }
}

fn report_degenerate(count: usize) {
    if count > 0 {
        log::warn!("{count} pixel(s) had no positive weight and kept their reference color");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ReferenceView;

    #[test]
    fn test_snapshot_derives_radius() -> Result<(), FilterError> {
        let snapshot = FilterSnapshot::new(DisparityFilterParams::default().with_sigma_s(1.0))?;
        assert_eq!(snapshot.half_kernel_size(), 3);
        assert_eq!(snapshot.weights().spatial_sigma(), 1.0);
        assert_eq!(snapshot.weights().spatial_kernel().len(), 7);
        Ok(())
    }

    #[test]
    fn test_configure_refreshes_radius() -> Result<(), FilterError> {
        let filter = DisparityFilter::new(DisparityFilterParams::default())?;
        assert_eq!(filter.half_kernel_size(), 6);

        filter.configure(DisparityFilterParams::default().with_sigma_s(0.5))?;
        assert_eq!(filter.half_kernel_size(), 2);
        assert_eq!(filter.params().sigma_s, 0.5);
        Ok(())
    }

    #[test]
    fn test_configure_invalid_keeps_previous() -> Result<(), FilterError> {
        let params = DisparityFilterParams::default()
            .with_sigma_r(0.2)
            .with_reference_view(ReferenceView::Left);
        let filter = DisparityFilter::new(params)?;
        let before = filter.snapshot();

        for bad in [
            params.with_sigma(0.0),
            params.with_sigma_s(-2.0),
            params.with_sigma_r(f32::NAN),
        ] {
            assert!(matches!(
                filter.configure(bad),
                Err(FilterError::InvalidParameter { .. })
            ));
            assert_eq!(*filter.snapshot(), *before);
        }
        Ok(())
    }

    #[test]
    fn test_new_rejects_invalid() {
        let res = DisparityFilter::new(DisparityFilterParams::default().with_sigma(0.0));
        assert!(matches!(
            res,
            Err(FilterError::InvalidParameter { name: "sigma", .. })
        ));
    }

    #[test]
    fn test_apply_dimension_mismatch() -> Result<(), FilterError> {
        let filter = DisparityFilter::new(DisparityFilterParams::default())?;
        let left = Image::<f32, 3>::from_size_val([4, 4].into(), 0.0)?;
        let right = Image::<f32, 3>::from_size_val([5, 4].into(), 0.0)?;
        let disparity = Image::<f32, 1>::from_size_val([4, 4].into(), 0.0)?;

        assert_eq!(
            filter.apply(&left, &right, &disparity),
            Err(FilterError::DimensionMismatch {
                name: "right",
                expected: [4, 4].into(),
                found: [5, 4].into(),
            })
        );
        assert!(matches!(
            filter.apply_with_right_view_fusion(&left, &right, &disparity),
            Err(FilterError::DimensionMismatch { name: "right", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_apply_cancelled() -> Result<(), FilterError> {
        let filter = DisparityFilter::new(DisparityFilterParams::default())?;
        let left = Image::<f32, 3>::from_size_val([4, 4].into(), 0.0)?;
        let right = left.clone();
        let disparity = Image::<f32, 1>::from_size_val([4, 4].into(), 0.0)?;

        let cancel = AtomicBool::new(true);
        assert_eq!(
            filter.apply_cancellable(&left, &right, &disparity, &cancel),
            Err(FilterError::Cancelled)
        );

        let cancel = AtomicBool::new(false);
        let output = filter.apply_cancellable(&left, &right, &disparity, &cancel)?;
        assert_eq!(output.size(), left.size());
        Ok(())
    }
}
