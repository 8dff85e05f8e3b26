use super::{kernels::check_bandwidth, FilterError};

/// The stereo view whose pixel grid the disparity field is indexed in.
///
/// Selects the sign of the horizontal shift used to fetch the corresponding
/// sample in the other view: `x + d` for [`ReferenceView::Left`] and `x - d`
/// for [`ReferenceView::Right`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ReferenceView {
    /// Disparity is indexed in the left view.
    Left,
    /// Disparity is indexed in the right view.
    #[default]
    Right,
}

impl ReferenceView {
    /// The sign applied to a disparity value to obtain the horizontal shift.
    pub fn shift_sign(self) -> f32 {
        match self {
            ReferenceView::Left => 1.0,
            ReferenceView::Right => -1.0,
        }
    }

    /// Column in the other view that corresponds to column `x`.
    ///
    /// The shifted coordinate is truncated towards zero and clamped to
    /// `[0, width - 1]`. A NaN disparity yields no shift.
    ///
    /// PRECONDITION: `width > 0`.
    pub fn corresponding_column(self, x: usize, disparity: f32, width: usize) -> usize {
        // float-to-int casts saturate and map NaN to 0
        let shift = (self.shift_sign() * disparity) as isize;
        (x as isize)
            .saturating_add(shift)
            .clamp(0, width as isize - 1) as usize
    }
}

impl std::str::FromStr for ReferenceView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(ReferenceView::Left),
            "right" => Ok(ReferenceView::Right),
            _ => Err(format!("unknown reference view `{s}`, expected `left` or `right`")),
        }
    }
}

/// Parameters of the disparity-guided joint bilateral filter.
///
/// # Example
///
/// ```
/// use disparo_imgproc::filter::{DisparityFilterParams, ReferenceView};
///
/// let params = DisparityFilterParams::default()
///     .with_sigma_s(1.5)
///     .with_reference_view(ReferenceView::Left);
///
/// assert!(params.validate().is_ok());
/// assert!(params.with_sigma_r(0.0).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DisparityFilterParams {
    /// Color-similarity bandwidth.
    pub sigma: f32,
    /// Spatial bandwidth in pixels.
    pub sigma_s: f32,
    /// Disparity-similarity bandwidth.
    pub sigma_r: f32,
    /// Whether the color-similarity term participates in the weight.
    pub use_color_weight: bool,
    /// The view the disparity field is indexed in.
    pub reference_view: ReferenceView,
}

impl Default for DisparityFilterParams {
    fn default() -> Self {
        Self {
            sigma: 2.0,
            sigma_s: 2.0,
            sigma_r: 0.05,
            use_color_weight: true,
            reference_view: ReferenceView::Right,
        }
    }
}

impl DisparityFilterParams {
    /// Set the color-similarity bandwidth.
    pub fn with_sigma(mut self, sigma: f32) -> Self {
        self.sigma = sigma;
        self
    }

    /// Set the spatial bandwidth.
    pub fn with_sigma_s(mut self, sigma_s: f32) -> Self {
        self.sigma_s = sigma_s;
        self
    }

    /// Set the disparity-similarity bandwidth.
    pub fn with_sigma_r(mut self, sigma_r: f32) -> Self {
        self.sigma_r = sigma_r;
        self
    }

    /// Enable or disable the color-similarity term.
    pub fn with_color_weight(mut self, use_color_weight: bool) -> Self {
        self.use_color_weight = use_color_weight;
        self
    }

    /// Set the view the disparity field is indexed in.
    pub fn with_reference_view(mut self, reference_view: ReferenceView) -> Self {
        self.reference_view = reference_view;
        self
    }

    /// Check that all bandwidths are finite and strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidParameter`] naming the first offending bandwidth.
    pub fn validate(&self) -> Result<(), FilterError> {
        check_bandwidth("sigma", self.sigma)?;
        check_bandwidth("sigma_s", self.sigma_s)?;
        check_bandwidth("sigma_r", self.sigma_r)?;
        Ok(())
    }
}
