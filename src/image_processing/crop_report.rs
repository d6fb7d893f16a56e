/// Per-image report table for `--report`
///
/// One row per input file with the size it had, the subject the crop was
/// centered on, the crop region and what happened to the file.
use prettytable::{format, Cell, Row, Table};
use std::path::Path;

use super::batch::{Disposition, ImageOutcome, ImageResult};

#[derive(Debug, Clone, PartialEq)]
pub struct CropReportEntry {
    pub input_filename: String,
    pub original_size: String,
    pub subject: String,
    pub region: String,
    pub status: String,
}

impl CropReportEntry {
    pub fn from_result(result: &ImageResult) -> Self {
        match result {
            Ok(ImageOutcome::Cropped {
                input_path,
                original_size,
                subject,
                detection_count,
                region,
                output_side,
                written,
                ..
            }) => Self {
                input_filename: extract_filename(input_path),
                original_size: format!("{}x{}", original_size.0, original_size.1),
                subject: format!(
                    "({:.0}, {:.0}, {:.0}, {:.0}) of {}",
                    subject.x1, subject.y1, subject.x2, subject.y2, detection_count
                ),
                region: region.to_string(),
                status: if *written {
                    format!("✓ {}px", output_side)
                } else {
                    format!("○ {}px (dry run)", output_side)
                },
            },
            Ok(ImageOutcome::Rejected {
                input_path,
                reason,
                disposition,
            }) => Self {
                input_filename: extract_filename(input_path),
                original_size: String::new(),
                subject: String::new(),
                region: String::new(),
                status: format!("✗ {} ({})", reason, format_disposition(disposition)),
            },
            Err(failure) => Self {
                input_filename: extract_filename(&failure.input_path),
                original_size: String::new(),
                subject: String::new(),
                region: String::new(),
                status: format!("⚠ {}", failure.error),
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct CropReport {
    pub entries: Vec<CropReportEntry>,
}

impl CropReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results(results: &[ImageResult]) -> Self {
        Self {
            entries: results.iter().map(CropReportEntry::from_result).collect(),
        }
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);

        table.add_row(Row::new(vec![
            Cell::new("Input"),
            Cell::new("Original"),
            Cell::new("Subject"),
            Cell::new("Crop"),
            Cell::new("Status"),
        ]));

        for entry in &self.entries {
            table.add_row(Row::new(vec![
                Cell::new(&truncate(&entry.input_filename, 30)),
                Cell::new(&entry.original_size),
                Cell::new(&entry.subject),
                Cell::new(&entry.region),
                Cell::new(&truncate(&entry.status, 60)),
            ]));
        }

        table
    }

    pub fn print(&self) {
        println!("\n📋 CROP REPORT ({} images)\n", self.entries.len());
        self.to_table().printstd();
        println!();
    }
}

fn format_disposition(disposition: &Disposition) -> String {
    match disposition {
        Disposition::Deleted => "deleted".to_string(),
        Disposition::Moved(path) => format!("moved to {}", path.display()),
        Disposition::Kept => "kept".to_string(),
        Disposition::Untouched => "dry run".to_string(),
    }
}

/// Truncate string to fit in column
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

/// Helper to extract filename from path
pub fn extract_filename(path: &Path) -> String {
    path.file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::batch::{ImageFailure, RejectReason};
    use crate::image_processing::geometry::{BoundingBox, CropRegion};
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
        assert_eq!(truncate("日本語の写真", 4), "日本語…");
    }

    #[test]
    fn test_entries_from_results() {
        let results: Vec<ImageResult> = vec![
            Ok(ImageOutcome::Cropped {
                input_path: PathBuf::from("/photos/IMG_1.jpg"),
                original_size: (2000, 1500),
                subject: BoundingBox::new(800.0, 400.0, 1200.0, 900.0).unwrap(),
                detection_count: 2,
                region: CropRegion::square(700, 350, 600),
                output_side: 1024,
                written: true,
                processing_time: Duration::from_millis(12),
            }),
            Ok(ImageOutcome::Rejected {
                input_path: PathBuf::from("/photos/IMG_2.jpg"),
                reason: RejectReason::NoSubject,
                disposition: Disposition::Deleted,
            }),
            Err(ImageFailure {
                input_path: PathBuf::from("/photos/IMG_3.jpg"),
                error: crate::error::ProcessingError::Resize("bad buffer".to_string()),
            }),
        ];

        let report = CropReport::from_results(&results);
        assert_eq!(report.entries.len(), 3);

        let cropped = &report.entries[0];
        assert_eq!(cropped.input_filename, "IMG_1.jpg");
        assert_eq!(cropped.original_size, "2000x1500");
        assert_eq!(cropped.subject, "(800, 400, 1200, 900) of 2");
        assert_eq!(cropped.region, "(700, 350, 1300, 950)");
        assert_eq!(cropped.status, "✓ 1024px");

        assert_eq!(report.entries[1].status, "✗ no subject detected (deleted)");
        assert!(report.entries[2].status.contains("bad buffer"));

        assert_eq!(report.to_table().len(), 4);
    }
}
