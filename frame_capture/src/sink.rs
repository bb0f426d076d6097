use crate::cli::Resolution;
use opencv::{
    core::{Mat, Size},
    prelude::*,
    videoio,
};
use thiserror::Error;

pub const RECORD_FILENAME: &str = "demo1.avi";
const RECORD_FPS: f64 = 30.0;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("failed to open video writer for '{0}'")]
    OpenFailed(String),
    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Appends one annotated frame per loop iteration to `demo1.avi`.
pub struct Recorder {
    writer: videoio::VideoWriter,
}

impl Recorder {
    pub fn create(resolution: Resolution) -> Result<Self, RecorderError> {
        let fourcc = videoio::VideoWriter::fourcc('M', 'J', 'P', 'G')?;
        let writer = videoio::VideoWriter::new(
            RECORD_FILENAME,
            fourcc,
            RECORD_FPS,
            Size::new(resolution.width, resolution.height),
            true,
        )?;

        if !writer.is_opened()? {
            return Err(RecorderError::OpenFailed(RECORD_FILENAME.to_string()));
        }

        tracing::info!("Recording to {}", RECORD_FILENAME);
        Ok(Self { writer })
    }

    pub fn write(&mut self, frame: &Mat) -> Result<(), RecorderError> {
        self.writer.write(frame)?;
        Ok(())
    }

    pub fn release(&mut self) -> Result<(), RecorderError> {
        self.writer.release()?;
        Ok(())
    }
}
