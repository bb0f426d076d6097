use base64::{prelude::BASE64_STANDARD, Engine};
use detect_api::{Detection, ErrorResponse, PredictRequest, PredictResponse};
use reqwest::blocking::Client;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("request to inference service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("inference service returned {status}: {message}")]
    Status { status: u16, message: String },
}

/// Blocking client for the `/predict` endpoint. One request per frame, one
/// fixed timeout, no retries.
pub struct RemoteDetector {
    client: Client,
    url: String,
}

impl RemoteDetector {
    pub fn new(url: &str) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn detect(&self, jpeg: &[u8]) -> Result<Vec<Detection>, RemoteError> {
        let request = PredictRequest {
            image: BASE64_STANDARD.encode(jpeg),
        };

        let response = self.client.post(&self.url).json(&request).send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .map(|body| body.error)
                .unwrap_or_else(|_| "unreadable error body".to_string());
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: PredictResponse = response.json()?;
        Ok(body.predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_server_is_a_transport_error() {
        // Port 9 (discard) is reserved and nothing should be listening.
        let detector = RemoteDetector::new("http://127.0.0.1:9/predict").unwrap();

        let result = detector.detect(b"jpeg bytes");
        assert!(matches!(result, Err(RemoteError::Transport(_))));
    }
}
