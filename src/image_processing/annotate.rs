use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::geometry::{BoundingBox, CropRegion, DetectionSet};

const DETECTION_COLOR: Rgb<u8> = Rgb([255, 215, 0]);
const SUBJECT_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
const CROP_COLOR: Rgb<u8> = Rgb([230, 0, 0]);

/// Draw every detection, the chosen subject and the crop region on a copy of
/// the source image.
pub fn draw_crop_debug(
    img: &RgbImage,
    detections: &DetectionSet,
    subject: &BoundingBox,
    region: &CropRegion,
) -> RgbImage {
    let mut debug_img = img.clone();
    let (width, height) = img.dimensions();

    // Line width scales with the image so it stays visible after downscaling
    let thickness = (width.min(height) / 300).max(1);

    for detection in detections {
        if let Some(rect) = box_to_rect(detection, width, height) {
            draw_thick_rect(&mut debug_img, rect, thickness, DETECTION_COLOR);
        }
    }

    if let Some(rect) = box_to_rect(subject, width, height) {
        draw_thick_rect(&mut debug_img, rect, thickness * 2, SUBJECT_COLOR);
    }

    let crop_rect = Rect::at(region.x1 as i32, region.y1 as i32).of_size(region.width().max(1), region.height().max(1));
    draw_thick_rect(&mut debug_img, crop_rect, thickness * 2, CROP_COLOR);

    debug_img
}

/// Convert a real-valued box to a pixel rect clipped to the image
fn box_to_rect(bbox: &BoundingBox, width: u32, height: u32) -> Option<Rect> {
    let x1 = bbox.x1.max(0.0).round() as i64;
    let y1 = bbox.y1.max(0.0).round() as i64;
    let x2 = (bbox.x2.round() as i64).min(width as i64);
    let y2 = (bbox.y2.round() as i64).min(height as i64);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(Rect::at(x1 as i32, y1 as i32).of_size((x2 - x1) as u32, (y2 - y1) as u32))
}

/// Draw `thickness` nested outlines, growing inwards
fn draw_thick_rect(img: &mut RgbImage, rect: Rect, thickness: u32, color: Rgb<u8>) {
    for inset in 0..thickness {
        let w = rect.width().saturating_sub(inset * 2);
        let h = rect.height().saturating_sub(inset * 2);
        if w == 0 || h == 0 {
            break;
        }
        let inner = Rect::at(rect.left() + inset as i32, rect.top() + inset as i32).of_size(w, h);
        draw_hollow_rect_mut(img, inner, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_to_rect_clips() {
        let bbox = BoundingBox::new(-10.0, 5.0, 120.0, 50.4).unwrap();
        let rect = box_to_rect(&bbox, 100, 100).unwrap();
        assert_eq!((rect.left(), rect.top()), (0, 5));
        assert_eq!((rect.width(), rect.height()), (100, 45));

        let outside = BoundingBox::new(150.0, 150.0, 160.0, 160.0).unwrap();
        assert!(box_to_rect(&outside, 100, 100).is_none());
    }

    #[test]
    fn test_draw_crop_debug_marks_regions() {
        let img = RgbImage::new(200, 200);
        let subject = BoundingBox::new(50.0, 50.0, 100.0, 120.0).unwrap();
        let detections: DetectionSet = vec![subject, BoundingBox::new(150.0, 10.0, 190.0, 40.0).unwrap()].into();
        let region = CropRegion::square(33, 43, 84);

        let debug_img = draw_crop_debug(&img, &detections, &subject, &region);

        assert_eq!(debug_img.dimensions(), img.dimensions());
        assert_eq!(*debug_img.get_pixel(33, 43), CROP_COLOR);
        assert_eq!(*debug_img.get_pixel(150, 10), DETECTION_COLOR);
        assert_eq!(*debug_img.get_pixel(50, 80), SUBJECT_COLOR);
        assert_eq!(*debug_img.get_pixel(0, 199), Rgb([0, 0, 0]));
    }
}
