use anyhow::{Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::geometry::{BoundingBox, DetectionSet};

/// COCO class id of "person"
pub const PERSON_CLASS_ID: u32 = 0;

/// Source of subject bounding boxes for an image.
///
/// Implementations only report boxes of their configured target class, in
/// source-image pixel coordinates.
pub trait SubjectDetector: Send + Sync {
    fn detect(&self, img: &RgbImage) -> Result<DetectionSet>;

    /// Short human-readable name used in logs
    fn name(&self) -> &str;
}

// JSON contract of an external detector script
mod script_protocol {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct Detection {
        #[serde(rename = "box")]
        pub bounding_box: [f64; 4],
        #[serde(default)]
        pub confidence: f32,
        #[serde(default)]
        pub class_id: Option<u32>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ScriptOutput {
        #[serde(default)]
        pub detections: Vec<Detection>,
        #[serde(default)]
        pub error: Option<String>,
    }
}

/// Parse the JSON printed by a detector script into a detection set.
///
/// Detections tagged with a different class are ignored; untagged ones are
/// assumed to be of the requested class.
pub fn parse_script_output(stdout: &str, class_id: u32) -> Result<DetectionSet> {
    let output: script_protocol::ScriptOutput = serde_json::from_str(stdout.trim())
        .with_context(|| format!("Failed to parse detector JSON output: {}", stdout.trim()))?;

    if let Some(error) = output.error {
        return Err(anyhow::anyhow!("Detector reported an error: {}", error));
    }

    Ok(output
        .detections
        .iter()
        .filter(|d| d.class_id.map_or(true, |id| id == class_id))
        .filter_map(|d| {
            let [x1, y1, x2, y2] = d.bounding_box;
            BoundingBox::new(x1, y1, x2, y2)
        })
        .collect())
}

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Detector backed by an external script (e.g. an ultralytics YOLO wrapper).
///
/// The script is invoked as
/// `<interpreter> <script> --image <file> --class <id> --confidence <c> --output-format json`
/// and must print a JSON object `{"detections": [{"box": [x1, y1, x2, y2], ...}], "error": null}`.
pub struct ScriptDetector {
    interpreter: String,
    script_path: PathBuf,
    class_id: u32,
    confidence_threshold: f32,
}

impl ScriptDetector {
    pub fn new(
        interpreter: &str,
        script_path: &Path,
        class_id: u32,
        confidence_threshold: f32,
    ) -> Result<Self> {
        if !script_path.exists() {
            return Err(anyhow::anyhow!(
                "Detector script not found: {}",
                script_path.display()
            ));
        }

        Ok(Self {
            interpreter: interpreter.to_string(),
            script_path: script_path.to_path_buf(),
            class_id,
            confidence_threshold,
        })
    }

    /// Save image to a uniquely named temporary file for the script
    fn save_temp_image(&self, img: &RgbImage) -> Result<PathBuf> {
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = std::env::temp_dir().join(format!(
            "subject_cropper_{}_{}.jpg",
            std::process::id(),
            counter
        ));

        img.save(&temp_path)
            .with_context(|| format!("Failed to write temporary image {}", temp_path.display()))?;

        Ok(temp_path)
    }

    fn run_script(&self, image_path: &Path) -> Result<DetectionSet> {
        let output = Command::new(&self.interpreter)
            .arg(&self.script_path)
            .arg("--image")
            .arg(image_path)
            .arg("--class")
            .arg(self.class_id.to_string())
            .arg("--confidence")
            .arg(self.confidence_threshold.to_string())
            .arg("--output-format")
            .arg("json")
            .output()
            .with_context(|| {
                format!(
                    "Failed to execute {} {}",
                    self.interpreter,
                    self.script_path.display()
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "Detector script exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        parse_script_output(&String::from_utf8_lossy(&output.stdout), self.class_id)
    }
}

impl SubjectDetector for ScriptDetector {
    fn detect(&self, img: &RgbImage) -> Result<DetectionSet> {
        let temp_path = self.save_temp_image(img)?;
        let result = self.run_script(&temp_path);
        let _ = std::fs::remove_file(&temp_path);
        result
    }

    fn name(&self) -> &str {
        "script"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script_output() {
        let json = r#"{
            "detections": [
                {"box": [800.0, 400.0, 1200.0, 900.0], "confidence": 0.91, "class_id": 0},
                {"box": [10, 10, 50, 50], "confidence": 0.55, "class_id": 2},
                {"box": [5, 5, 40, 90]}
            ],
            "error": null
        }"#;

        let set = parse_script_output(json, PERSON_CLASS_ID).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.as_slice()[0], BoundingBox::new(800.0, 400.0, 1200.0, 900.0).unwrap());
        assert_eq!(set.as_slice()[1].area(), 35.0 * 85.0);
    }

    #[test]
    fn test_parse_script_output_drops_invalid_boxes() {
        let json = r#"{"detections": [{"box": [50, 50, 10, 90]}]}"#;
        assert!(parse_script_output(json, 0).unwrap().is_empty());
    }

    #[test]
    fn test_parse_script_output_empty() {
        assert!(parse_script_output(r#"{"detections": []}"#, 0).unwrap().is_empty());
        assert!(parse_script_output("{}", 0).unwrap().is_empty());
    }

    #[test]
    fn test_parse_script_output_errors() {
        assert!(parse_script_output(r#"{"error": "model not found"}"#, 0).is_err());
        assert!(parse_script_output("not json", 0).is_err());
    }

    #[test]
    fn test_script_detector_requires_existing_script() {
        let result = ScriptDetector::new("python3", Path::new("/nonexistent/detect.py"), 0, 0.25);
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_script_detector_runs_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("detect.sh");
        std::fs::write(
            &script,
            "echo '{\"detections\": [{\"box\": [1, 2, 30, 40], \"class_id\": 0}]}'\n",
        )
        .unwrap();

        let detector = ScriptDetector::new("sh", &script, 0, 0.25).unwrap();
        let img = RgbImage::new(32, 48);
        let set = detector.detect(&img).unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0], BoundingBox::new(1.0, 2.0, 30.0, 40.0).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_script_detector_failure_status() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.sh");
        std::fs::write(&script, "echo boom >&2\nexit 3\n").unwrap();

        let detector = ScriptDetector::new("sh", &script, 0, 0.25).unwrap();
        let err = detector.detect(&RgbImage::new(8, 8)).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
