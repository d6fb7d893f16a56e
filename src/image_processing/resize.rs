use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;

use super::geometry::CropRegion;
use crate::error::{GeometryDefect, ProcessingError, Result};

/// Crop `img` to `region` and resize the square result to
/// `output_side x output_side` with a Lanczos3 filter.
///
/// The region must be square, so the resize never changes the aspect ratio.
pub fn resize_square(img: &RgbImage, region: &CropRegion, output_side: u32) -> Result<RgbImage> {
    let (img_width, img_height) = img.dimensions();
    region.validate(img_width, img_height)?;

    if output_side == 0 {
        return Err(GeometryDefect::Degenerate { side: 0 }.into());
    }

    let cropped = crop_image(img, region)?;
    resize_image(&cropped, output_side, output_side)
}

/// Crop an image to the given region
pub fn crop_image(img: &RgbImage, region: &CropRegion) -> Result<RgbImage> {
    let (img_width, img_height) = img.dimensions();

    if region.x2 > img_width || region.y2 > img_height || region.x1 >= region.x2 || region.y1 >= region.y2 {
        return Err(GeometryDefect::OutOfBounds {
            x1: region.x1,
            y1: region.y1,
            x2: region.x2,
            y2: region.y2,
            width: img_width,
            height: img_height,
        }
        .into());
    }

    if region.x1 == 0 && region.y1 == 0 && region.x2 == img_width && region.y2 == img_height {
        return Ok(img.clone());
    }

    Ok(image::imageops::crop_imm(img, region.x1, region.y1, region.width(), region.height()).to_image())
}

/// Resize an image to exact dimensions using a high-quality filter
fn resize_image(img: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    let (src_width, src_height) = img.dimensions();

    if src_width == width && src_height == height {
        return Ok(img.clone());
    }

    let src_image = Image::from_vec_u8(src_width, src_height, img.as_raw().clone(), PixelType::U8x3)
        .map_err(|e| ProcessingError::Resize(format!("invalid source buffer: {}", e)))?;

    let mut dst_image = Image::new(width, height, PixelType::U8x3);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3));
    let mut resizer = Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| ProcessingError::Resize(e.to_string()))?;

    ImageBuffer::from_raw(width, height, dst_image.into_vec()).ok_or_else(|| {
        ProcessingError::Resize(format!("resized buffer does not match {}x{}", width, height))
    })
}

/// Encode `img` in the format implied by `path` and replace the file.
///
/// Encoding happens in memory first so a failure leaves the original intact.
pub fn save_image(img: &RgbImage, path: &Path, jpeg_quality: u8) -> Result<()> {
    let encoded = encode_image(img, path, jpeg_quality)?;
    std::fs::write(path, encoded).map_err(|source| ProcessingError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn encode_image(img: &RgbImage, path: &Path, jpeg_quality: u8) -> Result<Vec<u8>> {
    let encode_err = |source| ProcessingError::Encode {
        path: path.to_path_buf(),
        source,
    };

    let format = ImageFormat::from_path(path).map_err(encode_err)?;
    let mut buffer = Cursor::new(Vec::new());

    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality);
            img.write_with_encoder(encoder).map_err(encode_err)?;
        }
        other => {
            img.write_to(&mut buffer, other).map_err(encode_err)?;
        }
    }

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn create_test_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_crop_image() {
        let img = create_test_image(100, 100);
        let cropped = crop_image(&img, &CropRegion::square(10, 10, 50)).unwrap();

        assert_eq!(cropped.dimensions(), (50, 50));
        assert_eq!(img.get_pixel(15, 15), cropped.get_pixel(5, 5));
    }

    #[test]
    fn test_crop_bounds_validation() {
        let img = create_test_image(50, 50);
        assert!(crop_image(&img, &CropRegion::square(10, 10, 50)).is_err());
        assert!(crop_image(&img, &CropRegion::square(10, 10, 40)).is_ok());
    }

    #[test]
    fn test_resize_square_output_side() {
        let img = create_test_image(2000, 1500);
        let resized = resize_square(&img, &CropRegion::square(700, 350, 600), 256).unwrap();
        assert_eq!(resized.dimensions(), (256, 256));
    }

    #[test]
    fn test_resize_square_upscales_small_crop() {
        let img = create_test_image(300, 200);
        let resized = resize_square(&img, &CropRegion::square(0, 0, 100), 128).unwrap();
        assert_eq!(resized.dimensions(), (128, 128));
    }

    #[test]
    fn test_resize_square_is_idempotent_on_normalized_image() {
        let img = create_test_image(64, 64);
        let resized = resize_square(&img, &CropRegion::square(0, 0, 64), 64).unwrap();
        assert_eq!(resized, img);
    }

    #[test]
    fn test_resize_square_rejects_non_square_region() {
        let img = create_test_image(100, 100);
        let region = CropRegion {
            x1: 0,
            y1: 0,
            x2: 50,
            y2: 60,
        };
        let err = resize_square(&img, &region, 32).unwrap_err();
        assert!(err.is_geometry_defect());
    }

    #[test]
    fn test_save_image_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        create_test_image(40, 30).save(&path).unwrap();

        let replacement = create_test_image(16, 16);
        save_image(&replacement, &path, 95).unwrap();

        let reloaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(reloaded, replacement);
    }

    #[test]
    fn test_save_image_jpeg_quality() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        save_image(&create_test_image(32, 32), &path, 90).unwrap();
        assert_eq!(image::image_dimensions(&path).unwrap(), (32, 32));
    }

    #[test]
    fn test_save_image_unknown_extension_keeps_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.unknown");
        assert!(save_image(&create_test_image(8, 8), &path, 90).is_err());
        assert!(!path.exists());
    }
}
