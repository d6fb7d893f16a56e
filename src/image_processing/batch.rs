use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::geometry::{BoundingBox, CropRegion};
use crate::error::ProcessingError;
use crate::utils::format_duration;

/// Batch progress tracking shared across worker threads
pub struct BatchProcessor {
    pub total_files: usize,
    pub processed_count: AtomicUsize,
    pub start_time: Instant,
}

impl BatchProcessor {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            processed_count: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Increment processed count and return current count
    pub fn increment(&self) -> usize {
        self.processed_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get current progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_files == 0 {
            1.0
        } else {
            (self.processed_count.load(Ordering::Relaxed) as f64) / (self.total_files as f64)
        }
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Option<Duration> {
        let processed = self.processed_count.load(Ordering::Relaxed);
        if processed == 0 {
            return None;
        }

        let remaining = self.total_files.saturating_sub(processed);
        if remaining == 0 {
            return Some(Duration::new(0, 0));
        }

        let time_per_item = self.start_time.elapsed() / processed as u32;
        Some(time_per_item * remaining as u32)
    }

    /// Completion bar message for `count` processed images
    pub fn status(&self, count: usize) -> String {
        let eta = self.eta().map(format_duration).unwrap_or_else(|| "unknown".to_string());
        format!("Processing: {}/{} (ETA {})", count, self.total_files, eta)
    }
}

/// Why an image was left out of the output set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TooSmall { width: u32, height: u32 },
    NoSubject,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::TooSmall { width, height } => write!(f, "too small ({}x{})", width, height),
            RejectReason::NoSubject => write!(f, "no subject detected"),
        }
    }
}

/// What happened to a rejected file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Deleted,
    Moved(PathBuf),
    Kept,
    /// Dry run: nothing was touched
    Untouched,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    Cropped {
        input_path: PathBuf,
        original_size: (u32, u32),
        subject: BoundingBox,
        detection_count: usize,
        region: CropRegion,
        output_side: u32,
        written: bool,
        processing_time: Duration,
    },
    Rejected {
        input_path: PathBuf,
        reason: RejectReason,
        disposition: Disposition,
    },
}

impl ImageOutcome {
    pub fn input_path(&self) -> &Path {
        match self {
            ImageOutcome::Cropped { input_path, .. } | ImageOutcome::Rejected { input_path, .. } => {
                input_path
            }
        }
    }
}

/// Failure of one image, tagged with its path
#[derive(Debug)]
pub struct ImageFailure {
    pub input_path: PathBuf,
    pub error: ProcessingError,
}

pub type ImageResult = std::result::Result<ImageOutcome, ImageFailure>;

/// Aggregated counts for a finished batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub total_files: usize,
    pub cropped: usize,
    pub rejected_too_small: usize,
    pub rejected_no_subject: usize,
    pub deleted: usize,
    pub moved: usize,
    pub kept: usize,
    pub geometry_defects: usize,
    pub failed: usize,
    pub total_duration: Duration,
}

impl BatchReport {
    pub fn from_results(results: &[ImageResult], total_duration: Duration) -> Self {
        let mut report = BatchReport {
            total_files: results.len(),
            total_duration,
            ..Default::default()
        };

        for result in results {
            match result {
                Ok(ImageOutcome::Cropped { .. }) => report.cropped += 1,
                Ok(ImageOutcome::Rejected {
                    reason,
                    disposition,
                    ..
                }) => {
                    match reason {
                        RejectReason::TooSmall { .. } => report.rejected_too_small += 1,
                        RejectReason::NoSubject => report.rejected_no_subject += 1,
                    }
                    match disposition {
                        Disposition::Deleted => report.deleted += 1,
                        Disposition::Moved(_) => report.moved += 1,
                        Disposition::Kept => report.kept += 1,
                        Disposition::Untouched => {}
                    }
                }
                Err(failure) if failure.error.is_geometry_defect() => report.geometry_defects += 1,
                Err(_) => report.failed += 1,
            }
        }

        report
    }

    pub fn rejected(&self) -> usize {
        self.rejected_too_small + self.rejected_no_subject
    }

    pub fn average_duration(&self) -> Duration {
        if self.total_files == 0 {
            Duration::new(0, 0)
        } else {
            self.total_duration / self.total_files as u32
        }
    }
}
