//! Native YOLO detection through ONNX Runtime.
//!
//! Expects a YOLOv8/YOLO11 style export with a single `images` input of shape
//! `[1, 3, 640, 640]` and an `output0` tensor of shape `[1, 4 + classes, anchors]`.

use anyhow::{Context, Result};
use image::RgbImage;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Mutex;

use super::geometry::{BoundingBox, DetectionSet};
use super::subject_detection::SubjectDetector;

const INPUT_SIZE: u32 = 640;
const IOU_THRESHOLD: f32 = 0.45;

/// Raw detection in model input space (center format)
#[derive(Debug, Clone)]
struct Detection {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    confidence: f32,
    class_id: usize,
}

pub struct OnnxDetector {
    session: Mutex<Session>,
    class_id: usize,
    confidence_threshold: f32,
}

impl OnnxDetector {
    pub fn new(model_path: &Path, class_id: u32, confidence_threshold: f32) -> Result<Self> {
        let _ = ort::init();

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load ONNX model {}", model_path.display()))?;

        Ok(Self {
            session: Mutex::new(session),
            class_id: class_id as usize,
            confidence_threshold,
        })
    }
}

impl SubjectDetector for OnnxDetector {
    fn detect(&self, img: &RgbImage) -> Result<DetectionSet> {
        let resized = image::imageops::resize(
            img,
            INPUT_SIZE,
            INPUT_SIZE,
            image::imageops::FilterType::CatmullRom,
        );

        let input_shape = vec![1usize, 3, INPUT_SIZE as usize, INPUT_SIZE as usize];
        let input_value = Value::from_array((input_shape, prepare_tensor(&resized)))?;

        let detections = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow::anyhow!("ONNX session lock poisoned"))?;
            let outputs = session.run(ort::inputs!["images" => input_value])?;

            let (output_shape, output_data) = outputs["output0"].try_extract_tensor::<f32>()?;
            let shape: Vec<usize> = output_shape.iter().map(|&x| x as usize).collect();

            process_yolo_output(output_data, &shape, self.confidence_threshold, IOU_THRESHOLD)?
        };

        let (width, height) = img.dimensions();
        Ok(to_detection_set(
            &detections,
            self.class_id,
            width as f32 / INPUT_SIZE as f32,
            height as f32 / INPUT_SIZE as f32,
            width as f32,
            height as f32,
        ))
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

/// Scale target-class detections back to source pixels and clip to the image
fn to_detection_set(
    detections: &[Detection],
    class_id: usize,
    scale_x: f32,
    scale_y: f32,
    width: f32,
    height: f32,
) -> DetectionSet {
    detections
        .iter()
        .filter(|d| d.class_id == class_id)
        .filter_map(|d| {
            let x1 = ((d.x - d.width / 2.0) * scale_x).clamp(0.0, width);
            let y1 = ((d.y - d.height / 2.0) * scale_y).clamp(0.0, height);
            let x2 = ((d.x + d.width / 2.0) * scale_x).clamp(0.0, width);
            let y2 = ((d.y + d.height / 2.0) * scale_y).clamp(0.0, height);
            BoundingBox::new(x1 as f64, y1 as f64, x2 as f64, y2 as f64)
        })
        .collect()
}

/// NCHW float tensor normalized to 0..1
fn prepare_tensor(img: &RgbImage) -> Vec<f32> {
    let (width, height) = img.dimensions();
    let mut tensor_data = Vec::with_capacity(3 * (width * height) as usize);

    for c in 0..3 {
        for y in 0..height {
            for x in 0..width {
                tensor_data.push(img.get_pixel(x, y)[c] as f32 / 255.0);
            }
        }
    }

    tensor_data
}

/// Decode a `[1, 4 + classes, anchors]` YOLO output and run NMS
fn process_yolo_output(
    output_data: &[f32],
    shape: &[usize],
    confidence_threshold: f32,
    iou_threshold: f32,
) -> Result<Vec<Detection>> {
    let [batch_size, features, predictions] = shape else {
        return Err(anyhow::anyhow!("Unexpected YOLO output rank: {:?}", shape));
    };
    let (batch_size, features, predictions) = (*batch_size, *features, *predictions);

    if batch_size != 1 || features <= 4 || output_data.len() < features * predictions {
        return Err(anyhow::anyhow!("Unexpected YOLO output shape: {:?}", shape));
    }

    let mut detections = Vec::new();

    for i in 0..predictions {
        // Transposed access: feature j of prediction i
        let value = |j: usize| output_data[j * predictions + i];

        let best_class = (4..features)
            .map(|j| (j - 4, value(j)))
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        if let Some((class_id, confidence)) = best_class {
            if confidence > confidence_threshold {
                detections.push(Detection {
                    x: value(0),
                    y: value(1),
                    width: value(2),
                    height: value(3),
                    confidence,
                    class_id,
                });
            }
        }
    }

    Ok(non_maximum_suppression(detections, iou_threshold))
}

/// Per-class non-maximum suppression, highest confidence first
fn non_maximum_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));

    let mut keep: Vec<Detection> = Vec::new();

    for det in detections {
        let suppressed = keep
            .iter()
            .any(|kept| kept.class_id == det.class_id && calculate_iou(kept, &det) >= iou_threshold);
        if !suppressed {
            keep.push(det);
        }
    }

    keep
}

/// Intersection over union of two center-format boxes
fn calculate_iou(box1: &Detection, box2: &Detection) -> f32 {
    let box1_x1 = box1.x - box1.width / 2.0;
    let box1_y1 = box1.y - box1.height / 2.0;
    let box1_x2 = box1.x + box1.width / 2.0;
    let box1_y2 = box1.y + box1.height / 2.0;

    let box2_x1 = box2.x - box2.width / 2.0;
    let box2_y1 = box2.y - box2.height / 2.0;
    let box2_x2 = box2.x + box2.width / 2.0;
    let box2_y2 = box2.y + box2.height / 2.0;

    let inter_x1 = box1_x1.max(box2_x1);
    let inter_y1 = box1_y1.max(box2_y1);
    let inter_x2 = box1_x2.min(box2_x2);
    let inter_y2 = box1_y2.min(box2_y2);

    if inter_x2 <= inter_x1 || inter_y2 <= inter_y1 {
        return 0.0;
    }

    let inter_area = (inter_x2 - inter_x1) * (inter_y2 - inter_y1);
    let union_area = box1.width * box1.height + box2.width * box2.height - inter_area;

    if union_area <= 0.0 {
        0.0
    } else {
        inter_area / union_area
    }
}
