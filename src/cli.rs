use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::image_processing::quality_gate::CropSettings;

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum RejectAction {
    /// Delete rejected files (default)
    #[value(name = "delete")]
    Delete,
    /// Move rejected files into --rejected-dir
    #[value(name = "move")]
    Move,
    /// Leave rejected files in place and only report them
    #[value(name = "keep")]
    Keep,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum DetectorKind {
    /// External detector script speaking the JSON detection protocol
    #[value(name = "script")]
    Script,
    /// Native YOLO ONNX model (requires the `ai` feature)
    #[value(name = "onnx")]
    Onnx,
}

#[derive(Parser, Debug)]
#[command(
    name = "subject-cropper",
    version,
    about = "Subject-centered square cropping for training image sets",
    long_about = "
Subject Cropper

Prepares a folder of photos for training: every image is checked against a
minimum size, run through an object detector, and replaced in place by a
square crop centered on the largest detected subject, resampled to a fixed
resolution. Images that are too small or contain no subject are deleted,
moved aside or kept, depending on --rejected.

Example Usage:
  # Crop every JPEG under ~/dataset to 1024x1024 around the largest person
  subject-cropper -i ~/dataset --detector-script ./detect.py

  # 512px output, keep rejected images in a separate folder
  subject-cropper -i ~/dataset -s 512 --rejected move --rejected-dir ~/rejected \\
    --detector-script ./detect.py --verbose

  # Native ONNX detection with debug overlays and a report table
  subject-cropper -i ~/dataset --detector onnx --model yolo11n.onnx \\
    --debug-dir ~/debug --report

  # Dry run: compute everything, touch nothing
  subject-cropper -i ~/dataset --detector-script ./detect.py --dry-run --report"
)]
pub struct Args {
    /// Input directories or single image files (can be specified multiple times)
    #[arg(short = 'i', long = "input", value_name = "DIR|FILE")]
    pub input_paths: Vec<PathBuf>,

    /// Side length of the square output in pixels
    #[arg(short = 's', long = "size", default_value = "1024", value_name = "PIXELS")]
    pub size: u32,

    /// Minimum width and height an image must have (defaults to --size)
    #[arg(long = "min-side", value_name = "PIXELS")]
    pub min_side: Option<u32>,

    /// Padding factor applied to the subject box before squaring
    #[arg(long = "padding", default_value = "1.2", value_name = "FACTOR")]
    pub padding: f64,

    /// Comma-separated list of image extensions to process
    #[arg(long = "extensions", default_value = "jpg,jpeg")]
    pub extensions_str: String,

    /// What to do with images that are too small or have no subject
    #[arg(long = "rejected", default_value = "delete", value_name = "ACTION")]
    pub rejected: RejectAction,

    /// Destination for rejected images when --rejected move is used
    #[arg(long = "rejected-dir", value_name = "DIR")]
    pub rejected_dir: Option<PathBuf>,

    /// Detection backend
    #[arg(long = "detector", default_value = "script", value_name = "KIND")]
    pub detector: DetectorKind,

    /// Path to the detector script used by --detector script
    #[arg(long = "detector-script", value_name = "FILE")]
    pub detector_script: Option<PathBuf>,

    /// Interpreter used to run the detector script
    #[arg(long = "interpreter", default_value = "python3", value_name = "PROGRAM")]
    pub interpreter: String,

    /// Detector class id treated as the subject (0 = person for COCO models)
    #[arg(long = "class", default_value = "0", value_name = "ID")]
    pub class_id: u32,

    /// Path to the ONNX model used by --detector onnx
    #[arg(long = "model", value_name = "FILE")]
    pub model: Option<PathBuf>,

    /// Confidence threshold for detections (0.0-1.0)
    #[arg(long = "confidence", default_value = "0.25", value_name = "THRESHOLD")]
    pub confidence: f32,

    /// Number of parallel processing jobs (0 = auto-detect CPU cores)
    #[arg(short = 'j', long = "jobs", default_value = "0", value_name = "N")]
    pub jobs: usize,

    /// JPEG quality for rewritten images (1-100)
    #[arg(long = "jpeg-quality", default_value = "95", value_name = "QUALITY")]
    pub jpeg_quality: u8,

    /// Write detection and crop overlays to this directory
    #[arg(long = "debug-dir", value_name = "DIR")]
    pub debug_dir: Option<PathBuf>,

    /// Generate processing report table at the end
    #[arg(long = "report")]
    pub report: bool,

    /// Emit progress as JSON lines on stdout and suppress all other output
    #[arg(long = "json-progress")]
    pub json_progress: bool,

    /// Compute every crop but do not write, delete or move any file
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// JSON configuration file; command-line flags take precedence
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,
}

impl Args {
    /// Parse the extensions string into a vector
    pub fn parse_extensions(&self) -> Vec<String> {
        self.extensions_str
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Quality gate threshold, falling back to the output side
    pub fn min_side(&self) -> u32 {
        self.min_side.unwrap_or(self.size)
    }

    pub fn crop_settings(&self) -> CropSettings {
        CropSettings {
            output_side: self.size,
            min_side: self.min_side(),
            padding_factor: self.padding,
        }
    }

    /// Worker count with 0 resolved to the number of CPUs
    pub fn parallel_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}


// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            input_paths: vec![],
            size: 1024,
            min_side: None,
            padding: 1.2,
            extensions_str: "jpg,jpeg".to_string(),
            rejected: RejectAction::Delete,
            rejected_dir: None,
            detector: DetectorKind::Script,
            detector_script: None,
            interpreter: "python3".to_string(),
            class_id: 0,
            model: None,
            confidence: 0.25,
            jobs: 0,
            jpeg_quality: 95,
            debug_dir: None,
            report: false,
            json_progress: false,
            dry_run: false,
            verbose: false,
            config_file: None,
        }
    }
}
