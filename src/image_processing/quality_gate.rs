use super::geometry::{compute_crop, BoundingBox, CropRegion, DetectionSet, DEFAULT_PADDING_FACTOR};
use super::selection::select_subject;
use crate::error::GeometryDefect;

/// Default training resolution; also the default minimum accepted side
pub const DEFAULT_OUTPUT_SIDE: u32 = 1024;

/// Parameters of the crop pipeline for a single image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropSettings {
    /// Side of the square written back to disk
    pub output_side: u32,
    /// Images narrower or shorter than this are rejected
    pub min_side: u32,
    pub padding_factor: f64,
}

impl CropSettings {
    /// Settings for `output_side` with the gate threshold tied to it
    pub fn new(output_side: u32) -> Self {
        Self {
            output_side,
            min_side: output_side,
            padding_factor: DEFAULT_PADDING_FACTOR,
        }
    }
}

impl Default for CropSettings {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_SIDE)
    }
}

/// One-shot size check run before detection
pub fn admit(width: u32, height: u32, min_side: u32) -> bool {
    width >= min_side && height >= min_side
}

/// Decision for one image, independent of what the caller does with rejects
#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    Accepted {
        subject: BoundingBox,
        region: CropRegion,
    },
    RejectedTooSmall {
        width: u32,
        height: u32,
    },
    RejectedNoSubject,
}

impl Assessment {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Assessment::Accepted { .. })
    }
}

/// Run gate, subject selection and crop geometry for one image.
///
/// A geometry defect is returned as an error so the caller never persists a
/// malformed crop.
pub fn assess(
    width: u32,
    height: u32,
    detections: &DetectionSet,
    settings: &CropSettings,
) -> Result<Assessment, GeometryDefect> {
    if !admit(width, height, settings.min_side) {
        return Ok(Assessment::RejectedTooSmall { width, height });
    }

    let Some(subject) = select_subject(detections) else {
        return Ok(Assessment::RejectedNoSubject);
    };

    let region = compute_crop(width, height, &subject, settings.padding_factor)?;
    Ok(Assessment::Accepted { subject, region })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_threshold() {
        assert!(admit(1024, 1024, 1024));
        assert!(admit(4000, 3000, 1024));
        assert!(!admit(1023, 2000, 1024));
        assert!(!admit(2000, 1023, 1024));
        assert!(admit(600, 600, 512));
    }

    #[test]
    fn test_default_settings() {
        let settings = CropSettings::default();
        assert_eq!(settings.output_side, 1024);
        assert_eq!(settings.min_side, 1024);
        assert_eq!(settings.padding_factor, 1.2);
    }

    #[test]
    fn test_assess_too_small_wins_over_detections() {
        let set: DetectionSet = vec![BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap()].into();
        let assessment = assess(800, 1200, &set, &CropSettings::default()).unwrap();
        assert_eq!(
            assessment,
            Assessment::RejectedTooSmall {
                width: 800,
                height: 1200
            }
        );
    }

    #[test]
    fn test_assess_no_subject() {
        let assessment = assess(2000, 1500, &DetectionSet::new(), &CropSettings::default()).unwrap();
        assert_eq!(assessment, Assessment::RejectedNoSubject);
        assert!(!assessment.is_accepted());
    }

    #[test]
    fn test_assess_accepts_largest_subject() {
        let set: DetectionSet = vec![
            BoundingBox::new(10.0, 10.0, 60.0, 60.0).unwrap(),
            BoundingBox::new(800.0, 400.0, 1200.0, 900.0).unwrap(),
        ]
        .into();
        let assessment = assess(2000, 1500, &set, &CropSettings::default()).unwrap();
        match assessment {
            Assessment::Accepted { subject, region } => {
                assert_eq!(subject.x1, 800.0);
                assert_eq!(region, CropRegion::square(700, 350, 600));
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_assess_surfaces_geometry_defect() {
        let set: DetectionSet = vec![BoundingBox::new(5.0, 5.0, 5.2, 5.2).unwrap()].into();
        let result = assess(2000, 2000, &set, &CropSettings::default());
        assert!(matches!(result, Err(GeometryDefect::Degenerate { .. })));
    }
}
