use crate::cli::Resolution;
use detect_api::Detection;
use opencv::{
    core::{Mat, Point, Rect, Scalar, Size, Vector},
    imgcodecs, imgproc,
};
use thiserror::Error;

const JPEG_QUALITY: i32 = 80;

// Tableau-derived BGR palette, extended to 20 entries.
const BBOX_PALETTE: [(f64, f64, f64); 20] = [
    (164., 120., 87.),
    (68., 148., 228.),
    (93., 97., 209.),
    (178., 182., 133.),
    (88., 159., 106.),
    (96., 202., 231.),
    (159., 124., 168.),
    (169., 162., 241.),
    (98., 118., 150.),
    (172., 176., 184.),
    (255., 0., 0.),
    (0., 255., 0.),
    (0., 0., 255.),
    (255., 255., 0.),
    (0., 255., 255.),
    (255., 0., 255.),
    (192., 192., 192.),
    (128., 128., 128.),
    (128., 0., 0.),
    (128., 128., 0.),
];

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("failed to encode frame: {0}")]
    EncodeFrameFailed(opencv::Error),
    #[error("OpenCV error: {0}")]
    OpenCvError(opencv::Error),
}

impl From<opencv::Error> for OverlayError {
    fn from(err: opencv::Error) -> Self {
        OverlayError::OpenCvError(err)
    }
}

fn fnv1a(name: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in name.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Deterministic class color: FNV-1a over the name, reduced onto the fixed
/// palette. The same class name maps to the same color on every run.
pub fn class_color(class_name: &str) -> Scalar {
    let (b, g, r) = BBOX_PALETTE[(fnv1a(class_name) % BBOX_PALETTE.len() as u64) as usize];
    Scalar::new(b, g, r, 0.0)
}

/// Draws every detection above `thresh` onto `frame`: a colored box plus a
/// `name: NN%` label on a filled background. Returns how many were drawn.
pub fn draw_detections(
    frame: &mut Mat,
    detections: &[Detection],
    thresh: f32,
) -> Result<usize, OverlayError> {
    let mut drawn = 0;

    for detection in detections {
        if detection.confidence <= thresh {
            continue;
        }

        let color = class_color(&detection.class_name);

        imgproc::rectangle(
            frame,
            Rect::new(
                detection.xmin,
                detection.ymin,
                detection.xmax - detection.xmin,
                detection.ymax - detection.ymin,
            ),
            color,
            2,
            imgproc::LINE_8,
            0,
        )?;

        let label = format!(
            "{}: {}%",
            detection.class_name,
            (detection.confidence * 100.0) as i32
        );
        let mut base_line = 0;
        let label_size = imgproc::get_text_size(
            &label,
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.5,
            1,
            &mut base_line,
        )?;
        // Keep the label inside the frame when the box touches the top edge.
        let label_ymin = detection.ymin.max(label_size.height + 10);

        imgproc::rectangle(
            frame,
            Rect::new(
                detection.xmin,
                label_ymin - label_size.height - 10,
                label_size.width,
                label_size.height + base_line,
            ),
            color,
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;
        imgproc::put_text(
            frame,
            &label,
            Point::new(detection.xmin, label_ymin - 7),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.5,
            Scalar::new(0., 0., 0., 0.),
            1,
            imgproc::LINE_AA,
            false,
        )?;

        drawn += 1;
    }

    Ok(drawn)
}

/// FPS (streams only) and object count in the top-left corner.
pub fn annotate_stats(
    frame: &mut Mat,
    avg_fps: Option<f64>,
    object_count: usize,
) -> Result<(), OverlayError> {
    let color = Scalar::new(0., 255., 255., 0.);

    if let Some(fps) = avg_fps {
        imgproc::put_text(
            frame,
            &format!("FPS: {:.2}", fps),
            Point::new(10, 20),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.7,
            color,
            2,
            imgproc::LINE_AA,
            false,
        )?;
    }

    imgproc::put_text(
        frame,
        &format!("Objects: {}", object_count),
        Point::new(10, 40),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.7,
        color,
        2,
        imgproc::LINE_AA,
        false,
    )?;

    Ok(())
}

pub fn encode_jpeg(frame: &Mat) -> Result<Vec<u8>, OverlayError> {
    let mut buf = Vector::<u8>::new();
    let params = Vector::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, JPEG_QUALITY]);
    imgcodecs::imencode(".jpg", frame, &mut buf, &params)
        .map_err(OverlayError::EncodeFrameFailed)?;
    Ok(buf.into())
}

pub fn resize_to(frame: &Mat, resolution: Resolution) -> Result<Mat, OverlayError> {
    let mut resized = Mat::default();
    imgproc::resize(
        frame,
        &mut resized,
        Size::new(resolution.width, resolution.height),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;
    Ok(resized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_is_the_reference_function() {
        // Published FNV-1a test vectors.
        assert_eq!(fnv1a(""), 0xcbf29ce484222325);
        assert_eq!(fnv1a("a"), 0xaf63dc4c8601ec8c);
        assert_eq!(fnv1a("foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn class_color_is_stable_and_in_palette() {
        let first = class_color("helmet");
        let second = class_color("helmet");
        assert_eq!(first, second);

        for name in ["helmet", "vest", "boots", "person"] {
            let color = class_color(name);
            assert!(BBOX_PALETTE
                .iter()
                .any(|(b, g, r)| color == Scalar::new(*b, *g, *r, 0.0)));
        }
    }

    #[test]
    fn only_detections_above_threshold_are_drawn() {
        let mut frame =
            Mat::new_rows_cols_with_default(480, 640, opencv::core::CV_8UC3, Scalar::all(0.))
                .unwrap();
        let detections = vec![
            Detection {
                xmin: 10,
                ymin: 10,
                xmax: 100,
                ymax: 100,
                class_name: "helmet".into(),
                confidence: 0.9,
            },
            Detection {
                xmin: 200,
                ymin: 200,
                xmax: 300,
                ymax: 300,
                class_name: "vest".into(),
                confidence: 0.3,
            },
        ];

        let drawn = draw_detections(&mut frame, &detections, 0.5).unwrap();
        assert_eq!(drawn, 1);
    }

    #[test]
    fn encode_jpeg_produces_a_jpeg_header() {
        let frame =
            Mat::new_rows_cols_with_default(32, 32, opencv::core::CV_8UC3, Scalar::all(128.))
                .unwrap();

        let bytes = encode_jpeg(&frame).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
