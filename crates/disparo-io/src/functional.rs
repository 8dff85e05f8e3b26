use std::path::Path;

use disparo_image::{Image, ImageSize};

use crate::error::IoError;

fn decode_image_any(file_path: &Path) -> Result<image::DynamicImage, IoError> {
    // verify the file exists
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let img = image::ImageReader::open(file_path)?
        .with_guessed_format()?
        .decode()?;

    log::debug!(
        "decoded {} ({}x{}, {:?})",
        file_path.display(),
        img.width(),
        img.height(),
        img.color()
    );

    Ok(img)
}

fn image_size(img: &image::DynamicImage) -> ImageSize {
    ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    }
}

/// Reads an image from the given file path as 8-bit RGB.
///
/// The method reads any image format supported by the image crate and converts
/// it to three 8-bit channels.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
///
/// # Returns
///
/// An RGB image with three channels (rgb8).
pub fn read_image_any_rgb8(file_path: impl AsRef<Path>) -> Result<Image<u8, 3>, IoError> {
    let img = decode_image_any(file_path.as_ref())?;
    let size = image_size(&img);
    Ok(Image::new(size, img.into_rgb8().into_raw())?)
}

/// Reads a single channel floating point image, such as a disparity map.
///
/// Integer formats are normalized to `[0, 1]`; floating point formats are
/// returned unchanged. Color images are converted to luminance.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
///
/// # Returns
///
/// A single channel image (mono f32).
pub fn read_image_any_mono_f32(file_path: impl AsRef<Path>) -> Result<Image<f32, 1>, IoError> {
    let img = decode_image_any(file_path.as_ref())?;
    let size = image_size(&img);
    Ok(Image::new(size, img.to_luma32f().into_raw())?)
}

/// Writes a floating point RGBA image quantized to 8 bits.
///
/// Values are scaled by 255, rounded and clamped to `[0, 255]`. The format is
/// chosen from the file extension; the alpha channel is dropped for JPEG.
///
/// # Arguments
///
/// * `file_path` - The path to the output image.
/// * `image` - The image with values in `[0, 1]`.
pub fn write_image_any_rgba_f32(
    file_path: impl AsRef<Path>,
    image: &Image<f32, 4>,
) -> Result<(), IoError> {
    let file_path = file_path.as_ref();

    let (Ok(width), Ok(height)) = (
        u32::try_from(image.width()),
        u32::try_from(image.height()),
    ) else {
        return Err(IoError::ImageTooLarge(image.size()));
    };

    let data = image
        .as_slice()
        .iter()
        .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect::<Vec<_>>();

    let rgba = image::RgbaImage::from_raw(width, height, data)
        .ok_or(IoError::ImageTooLarge(image.size()))?;

    let is_jpeg = file_path.extension().is_some_and(|ext| {
        ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg")
    });

    if is_jpeg {
        image::DynamicImage::ImageRgba8(rgba)
            .into_rgb8()
            .save(file_path)?;
    } else {
        rgba.save(file_path)?;
    }

    log::debug!("wrote {} ({}x{})", file_path.display(), width, height);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_rgba(size: ImageSize) -> Result<Image<f32, 4>, IoError> {
        let mut data = Vec::with_capacity(size.width * size.height * 4);
        for y in 0..size.height {
            for x in 0..size.width {
                data.extend_from_slice(&[
                    x as f32 / (size.width - 1) as f32,
                    y as f32 / (size.height - 1) as f32,
                    0.5,
                    1.0,
                ]);
            }
        }
        Ok(Image::new(size, data)?)
    }

    #[test]
    fn write_read_png() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("gradient.png");

        let size = ImageSize {
            width: 4,
            height: 3,
        };
        write_image_any_rgba_f32(&file_path, &gradient_rgba(size)?)?;
        assert!(file_path.exists(), "File does not exist: {:?}", file_path);

        let rgb = read_image_any_rgb8(&file_path)?;
        assert_eq!(rgb.size(), size);
        assert_eq!(rgb.get_pixel(0, 0, 0)?, &0);
        assert_eq!(rgb.get_pixel(3, 0, 0)?, &255);
        assert_eq!(rgb.get_pixel(0, 2, 1)?, &255);
        assert_eq!(rgb.get_pixel(1, 1, 2)?, &128);

        let mono = read_image_any_mono_f32(&file_path)?;
        assert_eq!(mono.size(), size);
        assert!(mono.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));

        Ok(())
    }

    #[test]
    fn write_jpeg_drops_alpha() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("gradient.jpg");

        let size = ImageSize {
            width: 8,
            height: 8,
        };
        write_image_any_rgba_f32(&file_path, &gradient_rgba(size)?)?;

        let rgb = read_image_any_rgb8(&file_path)?;
        assert_eq!(rgb.size(), size);

        Ok(())
    }

    #[test]
    fn read_missing_file() {
        let res = read_image_any_rgb8("does/not/exist.png");
        assert!(matches!(res, Err(IoError::FileDoesNotExist(_))));
    }
}
