use anyhow::{anyhow, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use crate::cli::{Args, DetectorKind, RejectAction};

/// Largest output side accepted on the command line
pub const MAX_OUTPUT_SIDE: u32 = 8192;
pub const MAX_JOBS: usize = 64;

/// Create a styled progress bar
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg} ({eta})",
    )
    .map(|s| s.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Validate command line arguments
pub fn validate_inputs(args: &Args) -> Result<()> {
    if args.input_paths.is_empty() {
        return Err(anyhow!("No input paths given (use -i/--input or the config file)"));
    }

    // Validate input paths (directories or files)
    for input_path in &args.input_paths {
        if !input_path.exists() {
            return Err(anyhow!("Input path does not exist: {}", input_path.display()));
        }
        if !input_path.is_dir() && !input_path.is_file() {
            return Err(anyhow!(
                "Input path is neither a file nor a directory: {}",
                input_path.display()
            ));
        }
    }

    if args.parse_extensions().is_empty() {
        return Err(anyhow!("No valid extensions specified"));
    }

    if args.size == 0 || args.size > MAX_OUTPUT_SIDE {
        return Err(anyhow!(
            "Output size must be between 1 and {} pixels, got: {}",
            MAX_OUTPUT_SIDE,
            args.size
        ));
    }

    if args.min_side() == 0 {
        return Err(anyhow!("Minimum side must be greater than 0"));
    }

    if !args.padding.is_finite() || args.padding <= 0.0 {
        return Err(anyhow!("Padding factor must be a positive number, got: {}", args.padding));
    }

    if !(0.0..=1.0).contains(&args.confidence) {
        return Err(anyhow!("Confidence must be between 0.0 and 1.0, got: {}", args.confidence));
    }

    if args.jobs > MAX_JOBS {
        return Err(anyhow!("Job count too high (max {}), got: {}", MAX_JOBS, args.jobs));
    }

    if !(1..=100).contains(&args.jpeg_quality) {
        return Err(anyhow!("JPEG quality must be between 1 and 100, got: {}", args.jpeg_quality));
    }

    if args.rejected == RejectAction::Move && args.rejected_dir.is_none() {
        return Err(anyhow!("--rejected move requires --rejected-dir <DIR>"));
    }

    match args.detector {
        DetectorKind::Script => match &args.detector_script {
            None => return Err(anyhow!("--detector script requires --detector-script <FILE>")),
            Some(script) if !script.is_file() => {
                return Err(anyhow!("Detector script not found: {}", script.display()));
            }
            Some(_) => {}
        },
        DetectorKind::Onnx => {
            if !cfg!(feature = "ai") {
                return Err(anyhow!(
                    "ONNX detection is not available. \
                     Rebuild with --features ai to enable native YOLO detection"
                ));
            }
            match &args.model {
                None => return Err(anyhow!("--detector onnx requires --model <FILE>")),
                Some(model) if !model.is_file() => {
                    return Err(anyhow!("ONNX model not found: {}", model.display()));
                }
                Some(_) => {}
            }
        }
    }

    Ok(())
}

/// Get file extension in lowercase
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a file has one of the specified extensions
pub fn has_valid_extension(path: &Path, extensions: &[String]) -> bool {
    if let Some(ext) = get_file_extension(path) {
        extensions.contains(&ext)
    } else {
        false
    }
}

/// Print verbose information if verbose mode is enabled
pub fn verbose_println(verbose: bool, message: &str) {
    if verbose {
        println!("{} {}", style("[VERBOSE]").dim(), message);
    }
}

/// Print warning message
pub fn warn_println(message: &str) {
    println!("{} {}", style("[WARNING]").yellow().bold(), message);
}

/// Print error message
pub fn error_println(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn valid_args(dir: &Path) -> Args {
        let script = dir.join("detect.py");
        std::fs::write(&script, "print('{}')").unwrap();
        Args {
            input_paths: vec![dir.to_path_buf()],
            detector_script: Some(script),
            ..Default::default()
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(1)), "1.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    }

    #[test]
    fn test_has_valid_extension() {
        let extensions = vec!["jpg".to_string(), "jpeg".to_string()];
        assert!(has_valid_extension(Path::new("a/b/IMG_1.JPG"), &extensions));
        assert!(has_valid_extension(Path::new("photo.jpeg"), &extensions));
        assert!(!has_valid_extension(Path::new("photo.png"), &extensions));
        assert!(!has_valid_extension(Path::new("README"), &extensions));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_inputs(&valid_args(dir.path())).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let base = valid_args(dir.path());

        let cases = vec![
            Args { input_paths: vec![], ..valid_args(dir.path()) },
            Args { input_paths: vec![PathBuf::from("/nonexistent/photos")], ..valid_args(dir.path()) },
            Args { extensions_str: " , ".to_string(), ..valid_args(dir.path()) },
            Args { size: 0, ..valid_args(dir.path()) },
            Args { size: MAX_OUTPUT_SIDE + 1, ..valid_args(dir.path()) },
            Args { min_side: Some(0), ..valid_args(dir.path()) },
            Args { padding: 0.0, ..valid_args(dir.path()) },
            Args { padding: f64::NAN, ..valid_args(dir.path()) },
            Args { confidence: 1.5, ..valid_args(dir.path()) },
            Args { jobs: MAX_JOBS + 1, ..valid_args(dir.path()) },
            Args { jpeg_quality: 0, ..valid_args(dir.path()) },
            Args { jpeg_quality: 101, ..valid_args(dir.path()) },
            Args { rejected: RejectAction::Move, ..valid_args(dir.path()) },
            Args { detector_script: None, ..valid_args(dir.path()) },
            Args { detector_script: Some(dir.path().join("missing.py")), ..valid_args(dir.path()) },
            Args { detector: DetectorKind::Onnx, model: None, ..valid_args(dir.path()) },
        ];

        for (i, args) in cases.iter().enumerate() {
            assert!(validate_inputs(args).is_err(), "case {} should be rejected", i);
        }

        let moved = Args {
            rejected: RejectAction::Move,
            rejected_dir: Some(dir.path().join("rejected")),
            ..base
        };
        assert!(validate_inputs(&moved).is_ok());
    }
}
