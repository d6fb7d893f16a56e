use crate::error::GeometryDefect;

/// Default multiplicative expansion applied to the subject box before squaring
pub const DEFAULT_PADDING_FACTOR: f64 = 1.2;

/// Axis-aligned subject box in source-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Build a box, returning `None` unless the coordinates are finite with
    /// `x1 < x2` and `y1 < y2`
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Option<Self> {
        let bbox = Self { x1, y1, x2, y2 };
        bbox.is_valid().then_some(bbox)
    }

    pub fn is_valid(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
            && self.x1 < self.x2
            && self.y1 < self.y2
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// Boxes returned by a detector for one image, in detector order.
///
/// Every box implicitly belongs to the requested subject class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSet {
    boxes: Vec<BoundingBox>,
}

impl DetectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a box, silently dropping invalid ones
    pub fn push(&mut self, bbox: BoundingBox) {
        if bbox.is_valid() {
            self.boxes.push(bbox);
        }
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BoundingBox> {
        self.boxes.iter()
    }

    pub fn as_slice(&self) -> &[BoundingBox] {
        &self.boxes
    }
}

impl From<Vec<BoundingBox>> for DetectionSet {
    fn from(boxes: Vec<BoundingBox>) -> Self {
        boxes.into_iter().collect()
    }
}

impl FromIterator<BoundingBox> for DetectionSet {
    fn from_iter<I: IntoIterator<Item = BoundingBox>>(iter: I) -> Self {
        let mut set = DetectionSet::new();
        for bbox in iter {
            set.push(bbox);
        }
        set
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a BoundingBox;
    type IntoIter = std::slice::Iter<'a, BoundingBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.iter()
    }
}

/// Integer crop bounds `[x1, x2) x [y1, y2)` inside the source image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropRegion {
    /// Square region with top-left corner at `(x, y)`
    pub fn square(x: u32, y: u32, side: u32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + side,
            y2: y + side,
        }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn is_square(&self) -> bool {
        self.width() == self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.x1 as f64 + self.x2 as f64) / 2.0,
            (self.y1 as f64 + self.y2 as f64) / 2.0,
        )
    }

    /// Check the square, non-empty and in-bounds postconditions
    pub fn validate(&self, image_width: u32, image_height: u32) -> Result<(), GeometryDefect> {
        if !self.is_square() {
            return Err(GeometryDefect::NotSquare {
                width: self.width(),
                height: self.height(),
            });
        }
        if self.width() == 0 {
            return Err(GeometryDefect::Degenerate { side: 0 });
        }
        if self.x1 >= self.x2
            || self.y1 >= self.y2
            || self.x2 > image_width
            || self.y2 > image_height
        {
            return Err(GeometryDefect::OutOfBounds {
                x1: self.x1,
                y1: self.y1,
                x2: self.x2,
                y2: self.y2,
                width: image_width,
                height: image_height,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for CropRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Compute the square crop centered on `subject`, padded by `padding_factor`
/// and pinned inside a `image_width x image_height` image.
///
/// The clamping order matters near the edges:
/// 1. the side is clamped to the smaller image dimension,
/// 2. the real-valued top-left is clamped to `>= 0`, then to
///    `<= extent - side` and again to `>= 0`,
/// 3. corner and side are rounded independently (half to even) and the
///    corner is clamped once more against the rounded side.
///
/// The returned region is always square, at least one pixel wide and inside
/// the image; anything else comes back as a [`GeometryDefect`].
pub fn compute_crop(
    image_width: u32,
    image_height: u32,
    subject: &BoundingBox,
    padding_factor: f64,
) -> Result<CropRegion, GeometryDefect> {
    if image_width == 0 || image_height == 0 {
        return Err(GeometryDefect::InvalidImage {
            width: image_width,
            height: image_height,
        });
    }
    if !subject.is_valid() || !padding_factor.is_finite() || padding_factor <= 0.0 {
        return Err(GeometryDefect::InvalidBox {
            x1: subject.x1,
            y1: subject.y1,
            x2: subject.x2,
            y2: subject.y2,
        });
    }

    let width = image_width as f64;
    let height = image_height as f64;

    let (center_x, center_y) = subject.center();
    let padded_width = subject.width() * padding_factor;
    let padded_height = subject.height() * padding_factor;

    let desired_side = padded_width.max(padded_height);
    let final_side = desired_side.min(width).min(height);

    let ideal_x1 = center_x - final_side / 2.0;
    let ideal_y1 = center_y - final_side / 2.0;

    let crop_x1 = ideal_x1.max(0.0);
    let crop_y1 = ideal_y1.max(0.0);

    let crop_x1 = crop_x1.min(width - final_side).max(0.0);
    let crop_y1 = crop_y1.min(height - final_side).max(0.0);

    let int_side = final_side.round_ties_even() as i64;
    if int_side < 1 {
        return Err(GeometryDefect::Degenerate { side: 0 });
    }

    let int_x1 = (crop_x1.round_ties_even() as i64)
        .min(image_width as i64 - int_side)
        .max(0);
    let int_y1 = (crop_y1.round_ties_even() as i64)
        .min(image_height as i64 - int_side)
        .max(0);

    let region = CropRegion {
        x1: int_x1 as u32,
        y1: int_y1 as u32,
        x2: (int_x1 + int_side) as u32,
        y2: (int_y1 + int_side) as u32,
    };
    region.validate(image_width, image_height)?;

    Ok(region)
}
