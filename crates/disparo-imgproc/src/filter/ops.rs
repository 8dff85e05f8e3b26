use std::sync::atomic::AtomicBool;

use disparo_image::Image;

use super::{error::ensure_same_size, weights::DisparityWeights, FilterError, ReferenceView};
use crate::parallel::{par_iter_rows_indexed, ExecutionStrategy};

/// Number of channels of the output image (RGB plus a constant alpha).
pub const OUTPUT_CHANNELS: usize = 4;

#[inline]
fn clamp_to_edge(pos: isize, len: usize) -> usize {
    pos.clamp(0, len as isize - 1) as usize
}

/// Apply the disparity-guided joint bilateral filter to the left view.
///
/// Every output pixel is the normalized weighted average of the left colors in
/// a `(2r + 1) x (2r + 1)` window, weighted by [`DisparityWeights`]. Samples
/// outside the image are clamped to the nearest edge pixel. The alpha channel
/// of the output is set to one.
///
/// Neighbors whose combined weight is not a positive number are skipped. A
/// pixel left without any positive weight keeps its own color and is counted
/// as degenerate.
///
/// # Arguments
///
/// * `left` - The left color image with shape (H, W, 3).
/// * `disparity` - The disparity field with shape (H, W, 1).
/// * `dst` - The destination image with shape (H, W, 4).
/// * `weights` - The weighting terms, including the window half-radius `r`.
/// * `strategy` - The execution strategy.
/// * `cancel` - Optional cooperative cancellation flag, polled once per row.
///
/// # Returns
///
/// The number of degenerate pixels.
///
/// PRECONDITION: `left`, `disparity` and `dst` must have the same size.
pub fn disparity_bilateral_filter(
    left: &Image<f32, 3>,
    disparity: &Image<f32, 1>,
    dst: &mut Image<f32, OUTPUT_CHANNELS>,
    weights: &DisparityWeights,
    strategy: ExecutionStrategy,
    cancel: Option<&AtomicBool>,
) -> Result<usize, FilterError> {
    ensure_same_size("disparity", left.size(), disparity.size())?;
    ensure_same_size("output", left.size(), dst.size())?;

    let (width, height) = (left.width(), left.height());
    if width == 0 || height == 0 {
        return Ok(0);
    }

    let radius = weights.half_kernel_size() as i32;
    let left_data = left.as_slice();
    let disp_data = disparity.as_slice();

    let degenerate = par_iter_rows_indexed(
        dst.as_slice_mut(),
        width * OUTPUT_CHANNELS,
        strategy,
        cancel,
        |y, dst_row| {
            let mut degenerate = 0;

            for (x, dst_pixel) in dst_row.chunks_exact_mut(OUTPUT_CHANNELS).enumerate() {
                let ref_idx = y * width + x;
                let c_ref = &left_data[ref_idx * 3..ref_idx * 3 + 3];
                let d_ref = disp_data[ref_idx];

                // accumulate differences to the reference color so that
                // uniform neighborhoods reproduce the input exactly
                let mut acc = [0.0f32; 3];
                let mut tot = 0.0f32;

                for dy in -radius..=radius {
                    let yy = clamp_to_edge(y as isize + dy as isize, height);

                    for dx in -radius..=radius {
                        let xx = clamp_to_edge(x as isize + dx as isize, width);
                        let nb_idx = yy * width + xx;
                        let c_nb = &left_data[nb_idx * 3..nb_idx * 3 + 3];

                        let w = weights.combined(
                            (dx, dy),
                            (d_ref, disp_data[nb_idx]),
                            (c_ref, c_nb),
                        );

                        // zero by underflow or NaN from a corrupt sample
                        if !(w > 0.0) {
                            continue;
                        }

                        acc.iter_mut()
                            .zip(c_nb.iter().zip(c_ref.iter()))
                            .for_each(|(a, (nb, r))| *a += w * (nb - r));
                        tot += w;
                    }
                }

                if tot > 0.0 {
                    for ch in 0..3 {
                        dst_pixel[ch] = c_ref[ch] + acc[ch] / tot;
                    }
                } else {
                    dst_pixel[..3].copy_from_slice(c_ref);
                    degenerate += 1;
                }
                dst_pixel[3] = 1.0;
            }

            degenerate
        },
    )?;

    Ok(degenerate)
}

/// Apply the disparity filter blending in right-view samples.
///
/// For every neighbor the right view is sampled at the column shifted by the
/// neighbor's disparity (see [`ReferenceView::corresponding_column`]) and
/// blended as
///
/// ```text
/// acc += (c_left + c_right * wc) * ws * wd
/// tot += (1 + wc) * ws * wd
/// ```
///
/// With the color term disabled this averages the left and right samples with
/// equal weight.
///
/// # Arguments
///
/// * `left` - The left color image with shape (H, W, 3).
/// * `right` - The right color image with shape (H, W, 3).
/// * `disparity` - The disparity field with shape (H, W, 1).
/// * `dst` - The destination image with shape (H, W, 4).
/// * `weights` - The weighting terms, including the window half-radius `r`.
/// * `reference_view` - The view the disparity field is indexed in.
/// * `strategy` - The execution strategy.
///
/// # Returns
///
/// The number of degenerate pixels.
pub fn disparity_fusion_filter(
    left: &Image<f32, 3>,
    right: &Image<f32, 3>,
    disparity: &Image<f32, 1>,
    dst: &mut Image<f32, OUTPUT_CHANNELS>,
    weights: &DisparityWeights,
    reference_view: ReferenceView,
    strategy: ExecutionStrategy,
) -> Result<usize, FilterError> {
    ensure_same_size("right", left.size(), right.size())?;
    ensure_same_size("disparity", left.size(), disparity.size())?;
    ensure_same_size("output", left.size(), dst.size())?;

    let (width, height) = (left.width(), left.height());
    if width == 0 || height == 0 {
        return Ok(0);
    }

    let radius = weights.half_kernel_size() as i32;
    let left_data = left.as_slice();
    let right_data = right.as_slice();
    let disp_data = disparity.as_slice();

    let degenerate = par_iter_rows_indexed(
        dst.as_slice_mut(),
        width * OUTPUT_CHANNELS,
        strategy,
        None,
        |y, dst_row| {
            let mut degenerate = 0;

            for (x, dst_pixel) in dst_row.chunks_exact_mut(OUTPUT_CHANNELS).enumerate() {
                let ref_idx = y * width + x;
                let c_ref = &left_data[ref_idx * 3..ref_idx * 3 + 3];
                let d_ref = disp_data[ref_idx];

                let mut acc = [0.0f32; 3];
                let mut tot = 0.0f32;

                for dy in -radius..=radius {
                    let yy = clamp_to_edge(y as isize + dy as isize, height);

                    for dx in -radius..=radius {
                        let xx = clamp_to_edge(x as isize + dx as isize, width);
                        let nb_idx = yy * width + xx;
                        let c_nb = &left_data[nb_idx * 3..nb_idx * 3 + 3];
                        let d_nb = disp_data[nb_idx];

                        let xr = reference_view.corresponding_column(xx, d_nb, width);
                        let right_idx = yy * width + xr;
                        let c_right = &right_data[right_idx * 3..right_idx * 3 + 3];

                        let w = weights.spatial(dx, dy) * weights.disparity(d_ref, d_nb);
                        let wc = weights.color(c_ref, c_nb);
                        if !(w > 0.0) || wc.is_nan() {
                            continue;
                        }

                        for ch in 0..3 {
                            acc[ch] += (c_nb[ch] + c_right[ch] * wc) * w;
                        }
                        tot += (1.0 + wc) * w;
                    }
                }

                if tot > 0.0 {
                    for ch in 0..3 {
                        dst_pixel[ch] = acc[ch] / tot;
                    }
                } else {
                    dst_pixel[..3].copy_from_slice(c_ref);
                    degenerate += 1;
                }
                dst_pixel[3] = 1.0;
            }

            degenerate
        },
    )?;

    Ok(degenerate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DisparityFilterParams;
    use disparo_image::ImageSize;

    fn weights(params: &DisparityFilterParams, half_kernel_size: usize) -> DisparityWeights {
        DisparityWeights::with_half_kernel_size(params, half_kernel_size).expect("valid params")
    }

    fn ramp_rgb(size: ImageSize) -> Image<f32, 3> {
        let data = (0..size.width * size.height * 3)
            .map(|i| (i % 17) as f32 / 16.0)
            .collect();
        Image::new(size, data).expect("valid image")
    }

    #[test]
    fn test_radius_zero_is_identity() -> Result<(), FilterError> {
        let size = ImageSize {
            width: 7,
            height: 5,
        };
        let left = ramp_rgb(size);
        let disparity = Image::new(size, (0..35).map(|i| i as f32 * 0.3).collect())?;
        let mut dst = Image::from_size_val(size, 0.0)?;
        let params = DisparityFilterParams::default();

        let degenerate = disparity_bilateral_filter(
            &left,
            &disparity,
            &mut dst,
            &weights(&params, 0),
            ExecutionStrategy::Serial,
            None,
        )?;

        assert_eq!(degenerate, 0);
        for (out, inp) in dst.as_slice().chunks_exact(4).zip(left.as_slice().chunks_exact(3)) {
            assert_eq!(&out[..3], inp);
            assert_eq!(out[3], 1.0);
        }
        Ok(())
    }

    #[test]
    fn test_nan_disparity_is_degenerate_and_isolated() -> Result<(), FilterError> {
        let size = ImageSize {
            width: 5,
            height: 5,
        };
        let left = ramp_rgb(size);
        let mut disparity = Image::from_size_val(size, 1.0)?;
        disparity.set_pixel(2, 2, 0, f32::NAN)?;
        let mut dst = Image::from_size_val(size, 0.0)?;
        let params = DisparityFilterParams::default().with_sigma_s(1.0);

        let degenerate = disparity_bilateral_filter(
            &left,
            &disparity,
            &mut dst,
            &weights(&params, 1),
            ExecutionStrategy::ParallelRows,
            None,
        )?;

        assert_eq!(degenerate, 1);
        for ch in 0..3 {
            assert_eq!(dst.get_pixel(2, 2, ch)?, left.get_pixel(2, 2, ch)?);
        }
        assert!(dst.as_slice().iter().all(|v| v.is_finite()));
        Ok(())
    }

    #[test]
    fn test_tiny_bandwidths_are_not_degenerate() -> Result<(), FilterError> {
        let size = ImageSize {
            width: 3,
            height: 1,
        };
        let left = Image::new(size, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0])?;
        let disparity = Image::from_size_val(size, 0.5)?;
        let base = DisparityFilterParams::default()
            .with_sigma_s(1.0)
            .with_color_weight(false);

        for params in [
            base.with_sigma_r(1e-20),
            base.with_sigma_s(1e-20),
            base.with_color_weight(true).with_sigma(1e-20),
        ] {
            let mut dst = Image::from_size_val(size, 0.0)?;
            let degenerate = disparity_bilateral_filter(
                &left,
                &disparity,
                &mut dst,
                &weights(&params, 1),
                ExecutionStrategy::Serial,
                None,
            )?;
            assert_eq!(degenerate, 0);
            assert!(dst.as_slice().iter().all(|v| v.is_finite()));
        }

        // flat disparity still blurs spatially
        let mut dst = Image::from_size_val(size, 0.0)?;
        disparity_bilateral_filter(
            &left,
            &disparity,
            &mut dst,
            &weights(&base.with_sigma_r(1e-20), 1),
            ExecutionStrategy::Serial,
            None,
        )?;
        let g1 = (-0.5f32).exp();
        let center = *dst.get_pixel(1, 0, 0)?;
        assert!((center - 1.0 / (1.0 + 2.0 * g1)).abs() < 1e-6);
        assert!(center < 0.5);
        Ok(())
    }

    #[test]
    fn test_size_mismatch() -> Result<(), FilterError> {
        let left = Image::<f32, 3>::from_size_val([4, 4].into(), 0.0)?;
        let disparity = Image::<f32, 1>::from_size_val([4, 3].into(), 0.0)?;
        let mut dst = Image::from_size_val([4, 4].into(), 0.0)?;
        let params = DisparityFilterParams::default();

        let res = disparity_bilateral_filter(
            &left,
            &disparity,
            &mut dst,
            &weights(&params, 1),
            ExecutionStrategy::Serial,
            None,
        );

        assert_eq!(
            res,
            Err(FilterError::DimensionMismatch {
                name: "disparity",
                expected: [4, 4].into(),
                found: [4, 3].into(),
            })
        );
        Ok(())
    }

    #[test]
    fn test_empty_image() -> Result<(), FilterError> {
        let size = ImageSize {
            width: 0,
            height: 3,
        };
        let left = Image::<f32, 3>::from_size_val(size, 0.0)?;
        let disparity = Image::<f32, 1>::from_size_val(size, 0.0)?;
        let mut dst = Image::from_size_val(size, 0.0)?;
        let params = DisparityFilterParams::default();

        let degenerate = disparity_bilateral_filter(
            &left,
            &disparity,
            &mut dst,
            &weights(&params, 2),
            ExecutionStrategy::Serial,
            None,
        )?;
        assert_eq!(degenerate, 0);
        Ok(())
    }

    #[test]
    fn test_fusion_shift_direction() -> Result<(), FilterError> {
        let size = ImageSize {
            width: 6,
            height: 1,
        };
        let left = Image::from_size_val(size, 0.0)?;
        // right view encodes the column index in every channel
        let right = Image::new(
            size,
            (0..6).flat_map(|x| [x as f32; 3]).collect::<Vec<f32>>(),
        )?;
        let disparity = Image::from_size_val(size, 2.0)?;
        let params = DisparityFilterParams::default().with_color_weight(false);

        for (view, expected) in [
            (ReferenceView::Left, [2.0, 3.0, 4.0, 5.0, 5.0, 5.0]),
            (ReferenceView::Right, [0.0, 0.0, 0.0, 1.0, 2.0, 3.0]),
        ] {
            let mut dst = Image::from_size_val(size, 0.0)?;
            disparity_fusion_filter(
                &left,
                &right,
                &disparity,
                &mut dst,
                &weights(&params, 0),
                view,
                ExecutionStrategy::Serial,
            )?;

            for (x, &e) in expected.iter().enumerate() {
                // equal-weight average of the left (zero) and right samples
                assert_eq!(*dst.get_pixel(x, 0, 0)?, e / 2.0);
                assert_eq!(*dst.get_pixel(x, 0, 3)?, 1.0);
            }
        }
        Ok(())
    }

    #[test]
    fn test_fusion_uniform_fixed_point() -> Result<(), FilterError> {
        let size = ImageSize {
            width: 5,
            height: 4,
        };
        let left = Image::from_size_val(size, 0.5)?;
        let right = Image::from_size_val(size, 0.5)?;
        let disparity = Image::from_size_val(size, 1.0)?;
        let mut dst = Image::from_size_val(size, 0.0)?;
        let params = DisparityFilterParams::default();

        disparity_fusion_filter(
            &left,
            &right,
            &disparity,
            &mut dst,
            &weights(&params, 2),
            ReferenceView::Right,
            ExecutionStrategy::ParallelRows,
        )?;

        for px in dst.as_slice().chunks_exact(4) {
            for &v in &px[..3] {
                assert!((v - 0.5).abs() < 1e-6);
            }
        }
        Ok(())
    }
}
