use crate::{detector::DetectError, labels::class_name, server::AppState};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::{prelude::BASE64_STANDARD, Engine};
use detect_api::{Detection, ErrorResponse, PredictRequest, PredictResponse};
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("request body must be JSON with an `image` field: {0}")]
    MalformedBody(String),
    #[error("`image` is not valid base64: {0}")]
    InvalidBase64(String),
    #[error("failed to decode image: {0}")]
    UndecodableImage(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

impl PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::MalformedBody(_)
            | PredictError::InvalidBase64(_)
            | PredictError::UndecodableImage(_) => StatusCode::BAD_REQUEST,
            PredictError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DetectError> for PredictError {
    fn from(err: DetectError) -> Self {
        match err {
            DetectError::Decode(msg) => PredictError::UndecodableImage(msg),
            DetectError::Inference(msg) => PredictError::Inference(msg),
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

// The body is parsed by hand instead of through the `Json` extractor: every
// malformed request must map to 400, and the extractor's rejections split
// across 415/422.
#[instrument(skip(state, body))]
pub async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictResponse>, PredictError> {
    let request: PredictRequest =
        serde_json::from_slice(&body).map_err(|e| PredictError::MalformedBody(e.to_string()))?;

    let image = BASE64_STANDARD
        .decode(request.image.as_bytes())
        .map_err(|e| PredictError::InvalidBase64(e.to_string()))?;

    let inference_start = Instant::now();
    let detections = state.detector.detect(&image)?;
    tracing::info!(
        latency_ms = inference_start.elapsed().as_millis() as u64,
        detections = detections.len(),
        "inference complete"
    );

    let predictions = detections
        .into_iter()
        .map(|raw| Detection {
            xmin: raw.x1 as i32,
            ymin: raw.y1 as i32,
            xmax: raw.x2 as i32,
            ymax: raw.y2 as i32,
            class_name: class_name(&state.labels, raw.class_id),
            confidence: raw.confidence,
        })
        .collect();

    Ok(Json(PredictResponse { predictions }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{Detector, RawDetection};
    use std::sync::Arc;

    struct MockDetector {
        detections: Vec<RawDetection>,
    }

    impl Detector for MockDetector {
        fn detect(&self, _image: &[u8]) -> Result<Vec<RawDetection>, DetectError> {
            Ok(self.detections.clone())
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn detect(&self, _image: &[u8]) -> Result<Vec<RawDetection>, DetectError> {
            Err(DetectError::Decode("not a bitmap".into()))
        }
    }

    fn state_with(detector: impl Detector) -> AppState {
        AppState {
            detector: Arc::new(detector),
            labels: Arc::new(vec!["helmet".to_string(), "vest".to_string()]),
        }
    }

    fn valid_body() -> Bytes {
        let request = PredictRequest {
            image: BASE64_STANDARD.encode(b"jpeg bytes"),
        };
        Bytes::from(serde_json::to_vec(&request).unwrap())
    }

    #[tokio::test]
    async fn predict_maps_labels_and_preserves_order() {
        let detections = vec![
            RawDetection {
                class_id: 1,
                confidence: 0.95,
                x1: 10.4,
                y1: 20.9,
                x2: 100.2,
                y2: 150.7,
            },
            RawDetection {
                class_id: 7,
                confidence: 0.88,
                x1: 200.0,
                y1: 50.0,
                x2: 300.0,
                y2: 200.0,
            },
        ];
        let state = state_with(MockDetector { detections });

        let Json(response) = predict(State(state), valid_body()).await.unwrap();

        assert_eq!(response.predictions.len(), 2);
        assert_eq!(response.predictions[0].class_name, "vest");
        assert_eq!(response.predictions[0].xmin, 10);
        assert_eq!(response.predictions[0].ymax, 150);
        assert_eq!(response.predictions[1].class_name, "unknown class 7");
        for detection in &response.predictions {
            assert!(detection.xmin <= detection.xmax);
            assert!(detection.ymin <= detection.ymax);
            assert!((0.0..=1.0).contains(&detection.confidence));
        }
    }

    #[tokio::test]
    async fn non_json_body_is_a_client_error() {
        let state = state_with(MockDetector { detections: vec![] });

        let err = predict(State(state), Bytes::from_static(b"not json"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_image_key_is_a_client_error() {
        let state = state_with(MockDetector { detections: vec![] });

        let err = predict(State(state), Bytes::from_static(b"{\"frame\": \"abc\"}"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_base64_is_never_a_server_error() {
        let state = state_with(MockDetector { detections: vec![] });
        let body = Bytes::from_static(b"{\"image\": \"@@not-base64@@\"}");

        let err = predict(State(state), body).await.unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn undecodable_image_is_a_client_error() {
        let state = state_with(FailingDetector);

        let err = predict(State(state), valid_body()).await.unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
