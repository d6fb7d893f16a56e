use crate::cli::{Args, DetectorKind, RejectAction};
use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Saved preset: a name plus the processing options
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub name: Option<String>,
    pub last_modified: Option<String>,
    pub config: CropConfigJson,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CropConfigJson {
    pub input_paths: Option<Vec<String>>,
    pub size: Option<u32>,
    pub min_side: Option<u32>,
    pub padding: Option<f64>,
    pub extensions: Option<String>,
    pub rejected: Option<String>,
    pub rejected_dir: Option<String>,
    pub detector: Option<String>,
    pub detector_script: Option<String>,
    pub interpreter: Option<String>,
    pub class_id: Option<u32>,
    pub model: Option<String>,
    pub confidence: Option<f32>,
    pub jobs: Option<usize>,
    pub jpeg_quality: Option<u8>,
    pub debug_dir: Option<String>,
    pub report: Option<bool>,
    pub dry_run: Option<bool>,
    pub verbose: Option<bool>,
}

impl Args {
    /// Load configuration from a JSON file and merge with command-line arguments.
    ///
    /// `from_cli` reports whether an argument id was given explicitly on the
    /// command line; those values are never overwritten by the file.
    pub fn load_and_merge_config(&mut self, from_cli: impl Fn(&str) -> bool) -> Result<()> {
        if let Some(config_path) = self.config_file.clone() {
            let config = read_config_file(&config_path)?;
            self.merge_from_config(config.config, from_cli)?;
        }
        Ok(())
    }

    fn merge_from_config(&mut self, config: CropConfigJson, from_cli: impl Fn(&str) -> bool) -> Result<()> {
        // Only apply a file value when the flag was not given on the CLI
        macro_rules! merge {
            ($id:literal, $field:expr, $value:expr) => {
                if !from_cli($id) {
                    if let Some(value) = $value {
                        $field = value;
                    }
                }
            };
        }

        merge!(
            "input_paths",
            self.input_paths,
            config.input_paths.map(|paths| paths.into_iter().map(PathBuf::from).collect())
        );
        merge!("size", self.size, config.size);
        merge!("min_side", self.min_side, config.min_side.map(Some));
        merge!("padding", self.padding, config.padding);
        merge!("extensions_str", self.extensions_str, config.extensions);
        merge!(
            "rejected",
            self.rejected,
            config.rejected.as_deref().map(parse_value::<RejectAction>).transpose()?
        );
        merge!("rejected_dir", self.rejected_dir, config.rejected_dir.map(|p| Some(PathBuf::from(p))));
        merge!(
            "detector",
            self.detector,
            config.detector.as_deref().map(parse_value::<DetectorKind>).transpose()?
        );
        merge!(
            "detector_script",
            self.detector_script,
            config.detector_script.map(|p| Some(PathBuf::from(p)))
        );
        merge!("interpreter", self.interpreter, config.interpreter);
        merge!("class_id", self.class_id, config.class_id);
        merge!("model", self.model, config.model.map(|p| Some(PathBuf::from(p))));
        merge!("confidence", self.confidence, config.confidence);
        merge!("jobs", self.jobs, config.jobs);
        merge!("jpeg_quality", self.jpeg_quality, config.jpeg_quality);
        merge!("debug_dir", self.debug_dir, config.debug_dir.map(|p| Some(PathBuf::from(p))));
        merge!("report", self.report, config.report);
        merge!("dry_run", self.dry_run, config.dry_run);
        merge!("verbose", self.verbose, config.verbose);

        Ok(())
    }
}

pub fn read_config_file(config_path: &Path) -> Result<ConfigFile> {
    let contents = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

    serde_json::from_str(&contents).with_context(|| format!("Failed to parse config file: {:?}", config_path))
}

fn parse_value<T: ValueEnum>(value: &str) -> Result<T> {
    T::from_str(value, true).map_err(|e| anyhow!("Invalid config value '{}': {}", value, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_config_fills_unset_values() {
        let file = write_config(
            r#"{
                "name": "portraits",
                "config": {
                    "inputPaths": ["/data/a", "/data/b"],
                    "size": 512,
                    "padding": 1.4,
                    "rejected": "move",
                    "rejectedDir": "/data/rejected",
                    "detector": "onnx",
                    "model": "/models/yolo.onnx",
                    "classId": 16,
                    "jpegQuality": 90,
                    "dryRun": true
                }
            }"#,
        );

        let mut args = Args {
            config_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        args.load_and_merge_config(|_| false).unwrap();

        assert_eq!(args.input_paths, vec![PathBuf::from("/data/a"), PathBuf::from("/data/b")]);
        assert_eq!(args.size, 512);
        assert_eq!(args.min_side(), 512);
        assert_eq!(args.padding, 1.4);
        assert_eq!(args.rejected, RejectAction::Move);
        assert_eq!(args.rejected_dir, Some(PathBuf::from("/data/rejected")));
        assert_eq!(args.detector, DetectorKind::Onnx);
        assert_eq!(args.model, Some(PathBuf::from("/models/yolo.onnx")));
        assert_eq!(args.class_id, 16);
        assert_eq!(args.jpeg_quality, 90);
        assert!(args.dry_run);
        // untouched
        assert_eq!(args.interpreter, "python3");
        assert_eq!(args.confidence, 0.25);
    }

    #[test]
    fn test_command_line_takes_precedence() {
        let file = write_config(r#"{"config": {"size": 512, "rejected": "keep", "jobs": 8}}"#);

        let mut args = Args {
            size: 768,
            rejected: RejectAction::Delete,
            config_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        args.load_and_merge_config(|id| id == "size" || id == "rejected").unwrap();

        assert_eq!(args.size, 768);
        assert_eq!(args.rejected, RejectAction::Delete);
        assert_eq!(args.jobs, 8);
    }

    #[test]
    fn test_invalid_enum_value_is_an_error() {
        let file = write_config(r#"{"config": {"rejected": "shred"}}"#);
        let mut args = Args {
            config_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(args.load_and_merge_config(|_| false).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut args = Args {
            config_file: Some(PathBuf::from("/nonexistent/config.json")),
            ..Default::default()
        };
        assert!(args.load_and_merge_config(|_| false).is_err());
    }

    #[test]
    fn test_no_config_file_is_noop() {
        let mut args = Args::default();
        args.load_and_merge_config(|_| false).unwrap();
        assert_eq!(args.size, 1024);
    }
}
