// Library exports for reuse by the binary and other applications
pub mod cli;
pub mod config_file;
pub mod error;
pub mod image_processing;
pub mod json_output;
pub mod utils;

// Re-export commonly used types
pub use cli::{Args, DetectorKind, RejectAction};
pub use error::{GeometryDefect, ProcessingError};
pub use image_processing::batch::{BatchReport, Disposition, ImageOutcome, ImageResult, RejectReason};
pub use image_processing::geometry::{compute_crop, BoundingBox, CropRegion, DetectionSet};
pub use image_processing::quality_gate::{admit, assess, Assessment, CropSettings};
pub use image_processing::selection::select_subject;
pub use image_processing::subject_detection::SubjectDetector;
pub use image_processing::{ProcessingConfig, ProcessingEngine};
pub use json_output::JsonMessage;
