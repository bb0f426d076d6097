//! Wire types shared by the inference service and the capture client.
//!
//! The JSON field names are the protocol; both sides derive their
//! (de)serialization from the structs below.

use serde::{Deserialize, Serialize};

/// One detected object instance in source-image pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
    pub class_name: String,
    pub confidence: f32,
}

/// Request body for `POST /predict`: a base64-encoded JPEG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub image: String,
}

/// Successful `/predict` response, detections in model output order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<Detection>,
}

/// Error body used for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
