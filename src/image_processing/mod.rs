pub mod annotate;
pub mod batch;
pub mod crop_report;
pub mod geometry;
#[cfg(feature = "ai")]
pub mod onnx_detection;
pub mod quality_gate;
pub mod resize;
pub mod selection;
pub mod subject_detection;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use rayon::prelude::*;
use image::RgbImage;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use walkdir::WalkDir;

use crate::cli::{Args, DetectorKind, RejectAction};
use crate::error::ProcessingError;
use crate::json_output::JsonMessage;
use crate::utils::{has_valid_extension, verbose_println, warn_println};

use batch::{BatchProcessor, Disposition, ImageFailure, ImageOutcome, ImageResult, RejectReason};
use quality_gate::{admit, assess, Assessment, CropSettings};
use subject_detection::{ScriptDetector, SubjectDetector};

/// JPEG quality used for debug overlays
const DEBUG_JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub crop: CropSettings,
    pub extensions: Vec<String>,
    pub verbose: bool,
    pub parallel_jobs: usize,
    pub reject_action: RejectAction,
    pub rejected_dir: Option<PathBuf>,
    pub jpeg_quality: u8,
    pub debug_dir: Option<PathBuf>,
    pub dry_run: bool,
    pub json_progress: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            crop: CropSettings::default(),
            extensions: vec!["jpg".to_string(), "jpeg".to_string()],
            verbose: false,
            parallel_jobs: 1,
            reject_action: RejectAction::Delete,
            rejected_dir: None,
            jpeg_quality: 95,
            debug_dir: None,
            dry_run: false,
            json_progress: false,
        }
    }
}

impl ProcessingConfig {
    /// Resolve validated command-line arguments into an engine configuration
    pub fn from_args(args: &Args) -> Self {
        Self {
            crop: args.crop_settings(),
            extensions: args.parse_extensions(),
            verbose: args.verbose && !args.json_progress,
            parallel_jobs: args.parallel_jobs(),
            reject_action: args.rejected,
            rejected_dir: args.rejected_dir.clone(),
            jpeg_quality: args.jpeg_quality,
            debug_dir: args.debug_dir.clone(),
            dry_run: args.dry_run,
            json_progress: args.json_progress,
        }
    }
}

/// Build the detector selected on the command line
pub fn create_detector(args: &Args) -> Result<Arc<dyn SubjectDetector>> {
    match args.detector {
        DetectorKind::Script => {
            let script = args
                .detector_script
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("No detector script configured"))?;
            let detector = ScriptDetector::new(&args.interpreter, script, args.class_id, args.confidence)?;
            Ok(Arc::new(detector))
        }
        #[cfg(feature = "ai")]
        DetectorKind::Onnx => {
            let model = args
                .model
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("No ONNX model configured"))?;
            let detector = onnx_detection::OnnxDetector::new(model, args.class_id, args.confidence)?;
            Ok(Arc::new(detector))
        }
        #[cfg(not(feature = "ai"))]
        DetectorKind::Onnx => Err(anyhow::anyhow!(
            "ONNX detection is not available. Rebuild with --features ai"
        )),
    }
}

pub struct ProcessingEngine {
    config: ProcessingConfig,
    detector: Arc<dyn SubjectDetector>,
    pool: rayon::ThreadPool,
}

impl ProcessingEngine {
    pub fn new(config: ProcessingConfig, detector: Arc<dyn SubjectDetector>) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_jobs.max(1))
            .build()
            .context("Failed to initialize thread pool")?;

        Ok(Self {
            config,
            detector,
            pool,
        })
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Discover all image files in the input paths, skipping the rejected and debug directories
    pub fn discover_images(&self, input_paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let excluded: Vec<PathBuf> = [&self.config.rejected_dir, &self.config.debug_dir]
            .into_iter()
            .flatten()
            .filter_map(|dir| std::fs::canonicalize(dir).ok())
            .collect();

        let is_excluded = |path: &Path| {
            std::fs::canonicalize(path)
                .map(|canonical| excluded.contains(&canonical))
                .unwrap_or(false)
        };

        let mut image_files = Vec::new();

        for input_path in input_paths {
            verbose_println(
                self.config.verbose,
                &format!("Scanning: {}", input_path.display()),
            );

            let walker = WalkDir::new(input_path)
                .follow_links(false)
                .max_depth(10)
                .into_iter()
                .filter_entry(|entry| !(entry.file_type().is_dir() && is_excluded(entry.path())));

            for entry in walker {
                let entry = entry.context("Failed to read directory entry")?;
                let path = entry.path();

                if path.is_file() && has_valid_extension(path, &self.config.extensions) {
                    image_files.push(path.to_path_buf());
                }
            }
        }

        // Sort for consistent processing order
        image_files.sort();
        image_files.dedup();

        verbose_println(
            self.config.verbose,
            &format!("Found {} image files", image_files.len()),
        );
        Ok(image_files)
    }

    /// Process a batch without progress bars; results follow `image_files` order
    pub fn process_batch(&self, image_files: &[PathBuf]) -> Vec<ImageResult> {
        let hidden = ProgressBar::hidden();
        self.process_batch_with_progress(image_files, &hidden, &[], &hidden)
    }

    /// Process a batch of images with multi-progress support
    pub fn process_batch_with_progress(
        &self,
        image_files: &[PathBuf],
        main_progress: &ProgressBar,
        thread_progress_bars: &[ProgressBar],
        completion_progress: &ProgressBar,
    ) -> Vec<ImageResult> {
        let tracker = BatchProcessor::new(image_files.len());
        let thread_assignment = Mutex::new(HashMap::new());
        let next_thread_id = AtomicUsize::new(0);
        let hidden = ProgressBar::hidden();

        completion_progress.set_message("Processing images...");

        let results = self.pool.install(|| {
            image_files
                .par_iter()
                .map(|image_path| {
                    let thread_pb = if thread_progress_bars.is_empty() {
                        &hidden
                    } else {
                        let current_thread_id = rayon::current_thread_index().unwrap_or(0);
                        let pb_index = match thread_assignment.lock() {
                            Ok(mut assignment) => *assignment.entry(current_thread_id).or_insert_with(|| {
                                next_thread_id.fetch_add(1, Ordering::Relaxed) % thread_progress_bars.len()
                            }),
                            Err(_) => current_thread_id % thread_progress_bars.len(),
                        };
                        &thread_progress_bars[pb_index]
                    };

                    let result = self.process_single_image(image_path, thread_pb);

                    if self.config.json_progress {
                        emit_json_result(&result);
                    }

                    let count = tracker.increment();
                    main_progress.inc(1);
                    main_progress.set_message(format!("Completed: {}/{}", count, image_files.len()));

                    completion_progress.set_position((tracker.progress() * 100.0) as u64);
                    completion_progress.set_message(tracker.status(count));

                    if self.config.json_progress {
                        JsonMessage::progress(count, image_files.len(), format!("Processed {}", filename_of(image_path)));
                    }

                    thread_pb.set_message("Idle");
                    result
                })
                .collect()
        });

        completion_progress.set_message("Finalizing results...");
        results
    }

    /// Run gate, detection, selection, crop and resize for one file
    pub fn process_single_image(&self, input_path: &Path, progress_bar: &ProgressBar) -> ImageResult {
        self.crop_single_image(input_path, progress_bar)
            .map_err(|error| ImageFailure {
                input_path: input_path.to_path_buf(),
                error,
            })
    }

    fn crop_single_image(
        &self,
        input_path: &Path,
        progress_bar: &ProgressBar,
    ) -> std::result::Result<ImageOutcome, ProcessingError> {
        let start = Instant::now();
        let filename = filename_of(input_path);
        let settings = &self.config.crop;

        verbose_println(self.config.verbose, &format!("Processing: {}", input_path.display()));

        // Stage 1: Load image (10%)
        progress_bar.set_position(10);
        progress_bar.set_message(format!("{} - Loading", filename));
        let img = image::open(input_path)
            .map_err(|source| ProcessingError::Open {
                path: input_path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        let (width, height) = img.dimensions();

        verbose_println(self.config.verbose, &format!("{}: original dimensions {}x{}", filename, width, height));

        // Stage 2: Size gate before paying for detection (20%)
        progress_bar.set_position(20);
        progress_bar.set_message(format!("{} - Checking size", filename));
        if !admit(width, height, settings.min_side) {
            return self.reject(input_path, RejectReason::TooSmall { width, height });
        }

        // Stage 3: Detect subjects (30%)
        progress_bar.set_position(30);
        progress_bar.set_message(format!("{} - Detecting subject ({})", filename, self.detector.name()));
        let detections = self.detector.detect(&img).map_err(ProcessingError::Detection)?;

        // Stage 4: Select subject and compute crop (60%)
        progress_bar.set_position(60);
        progress_bar.set_message(format!("{} - Computing crop", filename));
        let (subject, region) = match assess(width, height, &detections, settings)? {
            Assessment::Accepted { subject, region } => (subject, region),
            Assessment::RejectedTooSmall { width, height } => {
                return self.reject(input_path, RejectReason::TooSmall { width, height });
            }
            Assessment::RejectedNoSubject => return self.reject(input_path, RejectReason::NoSubject),
        };

        let (center_x, center_y) = subject.center();
        verbose_println(
            self.config.verbose,
            &format!(
                "{}: subject [{:.1}, {:.1}, {:.1}, {:.1}] (largest of {}), center ({:.1}, {:.1}), crop {}",
                filename,
                subject.x1,
                subject.y1,
                subject.x2,
                subject.y2,
                detections.len(),
                center_x,
                center_y,
                region
            ),
        );

        if let (Some(debug_dir), false) = (&self.config.debug_dir, self.config.dry_run) {
            let overlay = annotate::draw_crop_debug(&img, &detections, &subject, &region);
            if let Err(e) = write_debug_overlay(&overlay, debug_dir, input_path) {
                if !self.config.json_progress {
                    warn_println(&format!("{}: debug overlay not written: {}", filename, e));
                }
            }
        }

        // Stage 5: Crop and resample (70%)
        progress_bar.set_position(70);
        progress_bar.set_message(format!("{} - Resizing", filename));
        let resized = resize::resize_square(&img, &region, settings.output_side)?;

        // Stage 6: Overwrite the original (90%)
        let written = if self.config.dry_run {
            false
        } else {
            progress_bar.set_position(90);
            progress_bar.set_message(format!("{} - Saving", filename));
            resize::save_image(&resized, input_path, self.config.jpeg_quality)?;
            true
        };

        progress_bar.set_position(100);
        progress_bar.set_message(format!("{} - Complete", filename));

        Ok(ImageOutcome::Cropped {
            input_path: input_path.to_path_buf(),
            original_size: (width, height),
            subject,
            detection_count: detections.len(),
            region,
            output_side: settings.output_side,
            written,
            processing_time: start.elapsed(),
        })
    }

    /// Apply the configured reject action to a file
    fn reject(
        &self,
        input_path: &Path,
        reason: RejectReason,
    ) -> std::result::Result<ImageOutcome, ProcessingError> {
        let io_err = |source| ProcessingError::Io {
            path: input_path.to_path_buf(),
            source,
        };

        let disposition = if self.config.dry_run {
            Disposition::Untouched
        } else {
            match self.config.reject_action {
                RejectAction::Delete => {
                    std::fs::remove_file(input_path).map_err(io_err)?;
                    Disposition::Deleted
                }
                RejectAction::Move => {
                    let rejected_dir = self.config.rejected_dir.as_deref().ok_or_else(|| {
                        io_err(std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            "no rejected directory configured",
                        ))
                    })?;
                    Disposition::Moved(move_into(input_path, rejected_dir).map_err(io_err)?)
                }
                RejectAction::Keep => Disposition::Kept,
            }
        };

        if !self.config.json_progress {
            warn_println(&format!("{}: rejected, {}", filename_of(input_path), reason));
        }

        Ok(ImageOutcome::Rejected {
            input_path: input_path.to_path_buf(),
            reason,
            disposition,
        })
    }
}

/// Atomically claim a file in `dir` named `<stem><suffix>.<extension>`,
/// falling back to `<stem>_1<suffix>`, `<stem>_2<suffix>`, ... when taken.
///
/// The returned path exists as an empty file owned by the caller, so
/// concurrent workers can never be handed the same name.
fn reserve_unique_path(dir: &Path, stem: &str, suffix: &str, extension: &str) -> std::io::Result<PathBuf> {
    let file_name = |counter: usize| {
        let base = if counter == 0 {
            format!("{}{}", stem, suffix)
        } else {
            format!("{}_{}{}", stem, counter, suffix)
        };
        if extension.is_empty() {
            base
        } else {
            format!("{}.{}", base, extension)
        }
    };

    let mut counter = 0;
    loop {
        let candidate = dir.join(file_name(counter));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => counter += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Move `path` into `dir`, picking a free name if the file name is taken
fn move_into(path: &Path, dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    if path.file_name().is_none() {
        return Err(std::io::Error::new(ErrorKind::InvalidInput, "path has no file name"));
    }
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let destination = reserve_unique_path(dir, stem_of(path), "", extension)?;

    // Replaces the placeholder we own
    if std::fs::rename(path, &destination).is_err() {
        // rename fails across filesystems
        let copied = std::fs::copy(path, &destination).and_then(|_| std::fs::remove_file(path));
        if let Err(e) = copied {
            if path.exists() {
                let _ = std::fs::remove_file(&destination);
            }
            return Err(e);
        }
    }

    Ok(destination)
}

/// Write `<stem>_debug.jpg` into `debug_dir` without clobbering another
/// image's overlay of the same stem
fn write_debug_overlay(overlay: &RgbImage, debug_dir: &Path, input_path: &Path) -> std::result::Result<PathBuf, ProcessingError> {
    let io_err = |source| ProcessingError::Io {
        path: debug_dir.to_path_buf(),
        source,
    };
    let debug_path = reserve_unique_path(debug_dir, stem_of(input_path), "_debug", "jpg").map_err(io_err)?;

    if let Err(e) = resize::save_image(overlay, &debug_path, DEBUG_JPEG_QUALITY) {
        let _ = std::fs::remove_file(&debug_path);
        return Err(e);
    }
    Ok(debug_path)
}

fn emit_json_result(result: &ImageResult) {
    match result {
        Ok(ImageOutcome::Cropped {
            input_path,
            region,
            written,
            processing_time,
            ..
        }) => JsonMessage::file_completed(input_path, region, *written, processing_time.as_millis() as u64),
        Ok(ImageOutcome::Rejected {
            input_path, reason, ..
        }) => JsonMessage::file_rejected(input_path, reason.to_string()),
        Err(failure) => JsonMessage::file_failed(&failure.input_path, failure.error.to_string()),
    }
}

fn filename_of(path: &Path) -> &str {
    path.file_name().and_then(|f| f.to_str()).unwrap_or("unknown")
}

fn stem_of(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("image")
}
