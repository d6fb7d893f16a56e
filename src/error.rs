//! Error types for the per-image pipeline.
//!
//! Rejections (too small, no subject) are not errors: they are reported through
//! [`crate::image_processing::quality_gate::Assessment`]. Everything here is a
//! genuine failure of one image, which the batch logs and then moves past.

use std::path::PathBuf;
use thiserror::Error;

/// A crop that would violate the square / in-bounds / non-empty invariant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryDefect {
    #[error("invalid bounding box ({x1}, {y1}, {x2}, {y2})")]
    InvalidBox { x1: f64, y1: f64, x2: f64, y2: f64 },

    #[error("invalid image dimensions {width}x{height}")]
    InvalidImage { width: u32, height: u32 },

    #[error("crop side rounds to {side} pixels")]
    Degenerate { side: u32 },

    #[error("crop region is not square: {width}x{height}")]
    NotSquare { width: u32, height: u32 },

    #[error("crop region ({x1}, {y1}, {x2}, {y2}) exceeds {width}x{height} image")]
    OutOfBounds {
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        width: u32,
        height: u32,
    },
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("failed to open image {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("subject detection failed: {0:#}")]
    Detection(anyhow::Error),

    #[error("crop geometry defect: {0}")]
    Geometry(#[from] GeometryDefect),

    #[error("resize failed: {0}")]
    Resize(String),

    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl ProcessingError {
    pub fn is_geometry_defect(&self) -> bool {
        matches!(self, ProcessingError::Geometry(_))
    }
}

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_defect_is_flagged() {
        let err: ProcessingError = GeometryDefect::NotSquare {
            width: 10,
            height: 11,
        }
        .into();
        assert!(err.is_geometry_defect());
        assert_eq!(
            err.to_string(),
            "crop geometry defect: crop region is not square: 10x11"
        );

        let err = ProcessingError::Detection(anyhow::anyhow!("model missing"));
        assert!(!err.is_geometry_defect());
        assert_eq!(err.to_string(), "subject detection failed: model missing");
    }
}
