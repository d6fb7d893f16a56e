use anyhow::{Context, Result};
use clap::parser::ValueSource;
use clap::{CommandFactory, FromArgMatches};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Instant;

use subject_cropper::cli::{Args, DetectorKind};
use subject_cropper::image_processing::batch::{BatchReport, ImageResult};
use subject_cropper::image_processing::crop_report::CropReport;
use subject_cropper::image_processing::{create_detector, ProcessingConfig, ProcessingEngine};
use subject_cropper::json_output::JsonMessage;
use subject_cropper::utils::{
    create_progress_bar, error_println, format_duration, validate_inputs, verbose_println,
};

fn main() -> Result<()> {
    let start_time = Instant::now();

    let matches = Args::command().get_matches();
    let mut args = Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    args.load_and_merge_config(|id| matches.value_source(id) == Some(ValueSource::CommandLine))?;

    let json_mode = args.json_progress;

    if !json_mode {
        println!("{}", style("Subject Cropper").bold().blue());
        println!("{}", style("Square training crops centered on the main subject").dim());
        println!();
    }

    validate_inputs(&args)?;

    let config = ProcessingConfig::from_args(&args);

    if config.verbose {
        print_configuration(&args, &config);
    }

    if let (Some(debug_dir), false) = (&config.debug_dir, config.dry_run) {
        std::fs::create_dir_all(debug_dir)
            .with_context(|| format!("Failed to create debug directory {}", debug_dir.display()))?;
    }

    let detector = create_detector(&args)?;
    verbose_println(config.verbose, &format!("Detector ready: {}", detector.name()));

    let parallel_jobs = config.parallel_jobs;
    let dry_run_mode = config.dry_run;
    let engine = ProcessingEngine::new(config, detector)?;

    // Initialize multi-progress system; hidden in JSON mode
    let multi_progress = if json_mode {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };

    let discovery_pb = multi_progress.add(ProgressBar::new(args.input_paths.len() as u64));
    discovery_pb.set_style(
        ProgressStyle::with_template("{bar:20.green/blue} {pos:>2}/{len:2} {msg}")?.progress_chars("██▌ "),
    );
    discovery_pb.set_message("Scanning directories...");

    let image_files = engine.discover_images(&args.input_paths)?;
    discovery_pb.finish_with_message(format!("✓ Found {} images", image_files.len()));

    if image_files.is_empty() {
        if json_mode {
            JsonMessage::summary(&BatchReport::default()).emit();
        } else {
            println!("{}", style("No images found with specified extensions").red());
        }
        return Ok(());
    }

    if json_mode {
        JsonMessage::progress(0, image_files.len(), format!("Found {} images", image_files.len()));
    }

    let main_progress = multi_progress.add(create_progress_bar(image_files.len() as u64));
    main_progress.set_message("Processing images");

    // One stage bar per worker
    let thread_count = parallel_jobs.min(image_files.len());
    let mut thread_progress_bars = Vec::new();

    for i in 0..thread_count {
        let thread_pb = multi_progress.add(ProgressBar::new(100));
        thread_pb.set_style(
            ProgressStyle::with_template(&format!("Job {:02}: [{{bar:15.blue/cyan}}] {{msg}}", i + 1))?
                .progress_chars("██▌ "),
        );
        thread_pb.set_message("Waiting...");
        thread_progress_bars.push(thread_pb);
    }

    let completion_pb = multi_progress.add(ProgressBar::new(100));
    completion_pb.set_style(
        ProgressStyle::with_template("{bar:30.cyan/blue} {percent:>3}% {msg}")?.progress_chars("██▌ "),
    );
    completion_pb.set_message("Preparing to process...");

    let batch_start = Instant::now();
    let results = engine.process_batch_with_progress(
        &image_files,
        &main_progress,
        &thread_progress_bars,
        &completion_pb,
    );

    main_progress.finish_with_message("✓ Processing complete!");
    completion_pb.finish_with_message("✓ All tasks completed");
    for (i, pb) in thread_progress_bars.iter().enumerate() {
        pb.finish_with_message(format!("✓ Job {} finished", i + 1));
    }

    let report = BatchReport::from_results(&results, batch_start.elapsed());

    if json_mode {
        JsonMessage::summary(&report).emit();
        return Ok(());
    }

    println!();
    print_summary(&report, dry_run_mode);
    print_failures(&results);

    if args.report {
        CropReport::from_results(&results).print();
    }

    println!("{}", style("Performance:").bold().blue());
    println!("  Total time: {}", style(format_duration(start_time.elapsed())).bold());
    println!(
        "  Average time per image: {}",
        style(format_duration(report.average_duration())).dim()
    );

    if dry_run_mode {
        println!();
        println!("{}", style("💡 Dry Run Mode:").bold().yellow());
        println!("  • No files were written, deleted or moved");
        println!("  • Remove --dry-run to apply the crops");
    }

    Ok(())
}

fn print_configuration(args: &Args, config: &ProcessingConfig) {
    println!("{}", style("Configuration:").bold());
    println!("  Output size: {0}x{0}", config.crop.output_side);
    println!("  Minimum side: {}", config.crop.min_side);
    println!("  Padding factor: {}", config.crop.padding_factor);
    println!("  Parallel jobs: {}", config.parallel_jobs);
    println!("  Extensions: {:?}", config.extensions);
    println!("  Rejected images: {:?}", config.reject_action);
    if let Some(dir) = &config.rejected_dir {
        println!("    Rejected directory: {}", dir.display());
    }
    match args.detector {
        DetectorKind::Script => {
            if let Some(script) = &args.detector_script {
                println!("  Detector: {} {}", args.interpreter, script.display());
            }
        }
        DetectorKind::Onnx => {
            if let Some(model) = &args.model {
                println!("  Detector: ONNX model {}", model.display());
            }
        }
    }
    println!("  Subject class: {} (confidence >= {})", args.class_id, args.confidence);
    println!("  JPEG quality: {}", config.jpeg_quality);
    if let Some(dir) = &config.debug_dir {
        println!("  Debug overlays: {}", dir.display());
    }
    if config.dry_run {
        println!("  Dry run mode: enabled (simulation only - no files will be changed)");
    }
    println!();
}

fn print_summary(report: &BatchReport, dry_run_mode: bool) {
    let header = if dry_run_mode {
        style("Dry Run Results Summary:").bold().cyan()
    } else {
        style("Results Summary:").bold().green()
    };
    println!("{}", header);

    let cropped_label = if dry_run_mode { "Would be cropped" } else { "Cropped" };
    println!("  {}: {}", cropped_label, style(report.cropped).bold().green());

    if report.rejected() > 0 {
        println!(
            "  Rejected: {} ({} too small, {} without subject)",
            style(report.rejected()).bold().yellow(),
            report.rejected_too_small,
            report.rejected_no_subject
        );
        if report.deleted > 0 {
            println!("    Deleted: {}", report.deleted);
        }
        if report.moved > 0 {
            println!("    Moved: {}", report.moved);
        }
        if report.kept > 0 {
            println!("    Kept: {}", report.kept);
        }
    }
    if report.geometry_defects > 0 {
        println!("  Geometry defects (skipped): {}", style(report.geometry_defects).bold().red());
    }
    if report.failed > 0 {
        println!("  Failed: {}", style(report.failed).bold().red());
    }
    println!();
}

fn print_failures(results: &[ImageResult]) {
    let failures: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    if failures.is_empty() {
        return;
    }

    println!("{}", style("Errors encountered:").bold().red());
    for failure in &failures {
        let filename = failure
            .input_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("unknown");
        error_println(&format!("{} - {}", style(filename).bold(), failure.error));
    }
    println!();
    println!(
        "{}",
        style(format!("⚠ {} images could not be processed", failures.len()))
            .bold()
            .yellow()
    );
    println!("  Check the files and try again with --verbose for more details");
    println!();
}
