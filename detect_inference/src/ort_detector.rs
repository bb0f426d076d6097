use crate::{
    config::ModelSettings,
    detector::{DetectError, Detector, RawDetection},
};
use image::{imageops::FilterType, GenericImageView};
use ndarray::{s, Array, Axis, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::Mutex;

const INPUT_SIZE: u32 = 640;
const IOU_THRESHOLD: f32 = 0.7;

fn intersection(box1: &RawDetection, box2: &RawDetection) -> f32 {
    (box1.x2.min(box2.x2) - box1.x1.max(box2.x1)) * (box1.y2.min(box2.y2) - box1.y1.max(box2.y1))
}

fn union(box1: &RawDetection, box2: &RawDetection) -> f32 {
    ((box1.x2 - box1.x1) * (box1.y2 - box1.y1)) + ((box2.x2 - box2.x1) * (box2.y2 - box2.y1))
        - intersection(box1, box2)
}

fn decode_to_tensor(image_data: &[u8]) -> Result<(Array<f32, Ix4>, u32, u32), DetectError> {
    let image_reader = image::ImageReader::new(std::io::Cursor::new(image_data))
        .with_guessed_format()
        .map_err(|e| DetectError::Decode(e.to_string()))?;

    let original_img = image_reader
        .decode()
        .map_err(|e| DetectError::Decode(e.to_string()))?;

    let (img_width, img_height) = original_img.dimensions();
    let size = INPUT_SIZE as usize;
    let img = original_img.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    let mut input = Array::zeros((1, 3, size, size));
    for pixel in img.pixels() {
        let x = pixel.0 as _;
        let y = pixel.1 as _;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    Ok((input, img_width, img_height))
}

/// YOLO-family ONNX detector. Decoding, resizing, score filtering and box
/// suppression are all part of the opaque model contract; callers get the
/// final detection list in the order the suppression emits it.
pub struct OrtDetector {
    session: Mutex<Session>,
    min_probability: f32,
}

impl OrtDetector {
    pub fn new(model_config: &ModelSettings) -> Result<Self, Box<dyn std::error::Error>> {
        ort::init().commit()?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_config.get_model_path())?;

        tracing::info!("Loaded ONNX model from {:?}", model_config.get_model_path());

        Ok(Self {
            session: Mutex::new(session),
            min_probability: model_config.min_probability,
        })
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<ndarray::ArrayD<f32>, DetectError> {
        let mut session = self
            .session
            .lock()
            .map_err(|e| DetectError::Inference(format!("session mutex poisoned: {}", e)))?;

        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)
            .map_err(|e| DetectError::Inference(format!("failed to build tensor: {}", e)))?;

        let input_tensor = ort::inputs![tensor_ref];

        let outputs = session
            .run(input_tensor)
            .map_err(|e| DetectError::Inference(e.to_string()))?;

        let (shape, data) = outputs["output0"]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::Inference(format!("failed to extract tensor: {}", e)))?;

        let ix = shape.to_ixdyn();
        let array = ndarray::ArrayD::from_shape_vec(ix, data.to_vec())
            .map_err(|e| DetectError::Inference(format!("invalid tensor shape: {}", e)))?;

        Ok(array)
    }
}

impl Detector for OrtDetector {
    fn detect(&self, image: &[u8]) -> Result<Vec<RawDetection>, DetectError> {
        let (input, img_width, img_height) = decode_to_tensor(image)?;
        let outputs = self.run_inference(&input)?;

        let mut boxes = Vec::new();
        // Model output is (1, 4 + classes, candidates); transpose so each row
        // is one candidate box.
        let transposed = outputs.t();
        let output = transposed.slice(s![.., .., 0]);

        for row in output.axis_iter(Axis(0)) {
            let row: Vec<_> = row.iter().copied().collect();
            let Some((class_id, prob)) = row
                .iter()
                .skip(4)
                .enumerate()
                .map(|(index, value)| (index, *value))
                .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
            else {
                continue;
            };

            if prob < self.min_probability {
                continue;
            }

            let scale = INPUT_SIZE as f32;
            let xc = row[0] / scale * (img_width as f32);
            let yc = row[1] / scale * (img_height as f32);
            let w = row[2] / scale * (img_width as f32);
            let h = row[3] / scale * (img_height as f32);

            boxes.push(RawDetection {
                class_id,
                confidence: prob,
                x1: xc - w / 2.,
                y1: yc - h / 2.,
                x2: xc + w / 2.,
                y2: yc + h / 2.,
            });
        }

        boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));
        let mut result = Vec::new();

        while !boxes.is_empty() {
            result.push(boxes[0]);
            boxes = boxes
                .iter()
                .filter(|box1| intersection(&boxes[0], box1) / union(&boxes[0], box1) < IOU_THRESHOLD)
                .cloned()
                .collect();
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    #[test]
    fn test_decode_to_tensor() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 80, Rgb([255, 0, 0]));
        let mut image_data: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut image_data);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();

        let (input, img_width, img_height) = decode_to_tensor(&image_data).unwrap();

        assert_eq!(input.shape(), &[1, 3, 640, 640]);
        assert_eq!(img_width, 100);
        assert_eq!(img_height, 80);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode_to_tensor(&[0u8; 100]);
        assert!(matches!(result, Err(DetectError::Decode(_))));
    }

    #[test]
    fn test_overlapping_boxes_are_suppressed() {
        let a = RawDetection {
            class_id: 0,
            confidence: 0.9,
            x1: 0.,
            y1: 0.,
            x2: 100.,
            y2: 100.,
        };
        let b = RawDetection {
            class_id: 0,
            confidence: 0.8,
            x1: 5.,
            y1: 5.,
            x2: 105.,
            y2: 105.,
        };

        let iou = intersection(&a, &b) / union(&a, &b);
        assert!(iou > IOU_THRESHOLD);
    }
}
