//! JSON output for tool integration
//!
//! When --json-progress flag is enabled, all progress and status information
//! is emitted as JSON lines to stdout, suppressing all other output.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::image_processing::batch::BatchReport;
use crate::image_processing::geometry::CropRegion;

/// Last progress emission timestamp (milliseconds since epoch)
/// Used for throttling progress updates to ~25 FPS (40ms between updates)
static LAST_PROGRESS_MS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Progress update
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    /// Image cropped (or would have been, in a dry run)
    FileCompleted {
        input_path: String,
        crop: [u32; 4],
        written: bool,
        processing_time_ms: u64,
    },
    /// Image rejected by the quality gate or for lack of a subject
    FileRejected { input_path: String, reason: String },
    /// File processing failed
    FileFailed { input_path: String, error: String },
    /// Processing summary
    Summary {
        total_files: usize,
        cropped: usize,
        rejected: usize,
        deleted: usize,
        moved: usize,
        kept: usize,
        geometry_defects: usize,
        failed: usize,
        duration_secs: f64,
    },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Create and emit progress message (throttled to ~25 FPS)
    ///
    /// The final progress (current == total) is always emitted to ensure 100% completion.
    pub fn progress(current: usize, total: usize, message: impl Into<String>) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let last_ms = LAST_PROGRESS_MS.load(Ordering::Relaxed);

        if now_ms.saturating_sub(last_ms) >= 40 || current == total {
            LAST_PROGRESS_MS.store(now_ms, Ordering::Relaxed);
            Self::Progress {
                current,
                total,
                message: message.into(),
            }
            .emit();
        }
    }

    pub fn file_completed(input_path: &Path, region: &CropRegion, written: bool, processing_time_ms: u64) {
        Self::FileCompleted {
            input_path: input_path.display().to_string(),
            crop: [region.x1, region.y1, region.x2, region.y2],
            written,
            processing_time_ms,
        }
        .emit();
    }

    pub fn file_rejected(input_path: &Path, reason: impl Into<String>) {
        Self::FileRejected {
            input_path: input_path.display().to_string(),
            reason: reason.into(),
        }
        .emit();
    }

    pub fn file_failed(input_path: &Path, error: impl Into<String>) {
        Self::FileFailed {
            input_path: input_path.display().to_string(),
            error: error.into(),
        }
        .emit();
    }

    pub fn summary(report: &BatchReport) -> Self {
        Self::Summary {
            total_files: report.total_files,
            cropped: report.cropped,
            rejected: report.rejected(),
            deleted: report.deleted,
            moved: report.moved,
            kept: report.kept,
            geometry_defects: report.geometry_defects,
            failed: report.failed,
            duration_secs: report.total_duration.as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_message_tagging() {
        let message = JsonMessage::FileRejected {
            input_path: "a.jpg".to_string(),
            reason: "no subject detected".to_string(),
        };
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(
            json,
            r#"{"type":"file_rejected","input_path":"a.jpg","reason":"no subject detected"}"#
        );
    }

    #[test]
    fn test_summary_from_report() {
        let report = BatchReport {
            total_files: 10,
            cropped: 6,
            rejected_too_small: 2,
            rejected_no_subject: 1,
            deleted: 1,
            moved: 2,
            kept: 0,
            geometry_defects: 0,
            failed: 1,
            total_duration: Duration::from_millis(2500),
            ..Default::default()
        };

        let value = serde_json::to_value(JsonMessage::summary(&report)).unwrap();
        assert_eq!(value["type"], "summary");
        assert_eq!(value["cropped"], 6);
        assert_eq!(value["rejected"], 3);
        assert_eq!(value["deleted"], 1);
        assert_eq!(value["moved"], 2);
        assert_eq!(value["kept"], 0);
        assert_eq!(value["duration_secs"], 2.5);
    }

    #[test]
    fn test_file_completed_round_trip() {
        let json = r#"{"type":"file_completed","input_path":"x.jpg","crop":[700,350,1300,950],"written":true,"processing_time_ms":12}"#;
        let message: JsonMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            message,
            JsonMessage::FileCompleted {
                input_path: "x.jpg".to_string(),
                crop: [700, 350, 1300, 950],
                written: true,
                processing_time_ms: 12,
            }
        );
    }
}
