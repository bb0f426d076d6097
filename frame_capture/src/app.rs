use crate::{
    cli::Args,
    fps::FrameRateBuffer,
    overlay,
    remote::RemoteDetector,
    sink::Recorder,
    source::{FrameGrabber, Source},
};
use anyhow::Context;
use opencv::{core::Vector, highgui, imgcodecs};
use std::time::Instant;

const WINDOW_NAME: &str = "Detection results";
const SNAPSHOT_FILENAME: &str = "capture.png";
const STREAM_KEY_POLL_MS: i32 = 5;

#[derive(Debug, PartialEq, Eq)]
enum KeyCommand {
    Quit,
    Pause,
    Snapshot,
    None,
}

impl From<i32> for KeyCommand {
    fn from(key: i32) -> Self {
        match u8::try_from(key).ok().map(|k| k.to_ascii_lowercase()) {
            Some(b'q') => KeyCommand::Quit,
            Some(b's') => KeyCommand::Pause,
            Some(b'p') => KeyCommand::Snapshot,
            _ => KeyCommand::None,
        }
    }
}

/// Resolves the source, opens every handle, runs the capture/render loop,
/// and releases the handles on every exit path.
pub fn run(args: Args) -> anyhow::Result<()> {
    let source = Source::resolve(&args.source)?;
    tracing::info!("Resolved source: {:?}", source);

    if args.record && source.is_still() {
        anyhow::bail!("recording requires a video, camera, or RTSP source");
    }

    let detector = RemoteDetector::new(&args.server_url)?;
    let mut grabber = source
        .open(args.resolution)
        .context("failed to open frame source")?;
    let mut recorder = if args.record {
        // clap guarantees --record comes with --resolution.
        let resolution = args
            .resolution
            .context("--record requires --resolution")?;
        Some(Recorder::create(resolution)?)
    } else {
        None
    };

    let mut fps_buffer = FrameRateBuffer::new();
    let outcome = run_loop(
        &args,
        &source,
        &mut grabber,
        &detector,
        recorder.as_mut(),
        &mut fps_buffer,
    );

    grabber.release()?;
    if let Some(recorder) = recorder.as_mut() {
        recorder.release()?;
    }
    highgui::destroy_all_windows()?;
    tracing::info!("Average pipeline FPS: {:.2}", fps_buffer.average());

    outcome
}

fn run_loop(
    args: &Args,
    source: &Source,
    grabber: &mut FrameGrabber,
    detector: &RemoteDetector,
    mut recorder: Option<&mut Recorder>,
    fps_buffer: &mut FrameRateBuffer,
) -> anyhow::Result<()> {
    loop {
        let iteration_start = Instant::now();

        let Some(frame) = grabber.next_frame()? else {
            tracing::info!("Source exhausted or stream ended, stopping");
            return Ok(());
        };

        let jpeg = overlay::encode_jpeg(&frame)?;
        let detections = match detector.detect(&jpeg) {
            Ok(detections) => detections,
            Err(e) => {
                // A failed request degrades to an empty frame, never a crash.
                tracing::warn!("Inference request failed, rendering without detections: {}", e);
                Vec::new()
            }
        };

        let mut display = frame.clone();
        let object_count = overlay::draw_detections(&mut display, &detections, args.thresh)?;

        if let Some(resolution) = args.resolution {
            display = overlay::resize_to(&display, resolution)?;
        }

        let avg_fps = if source.is_still() {
            None
        } else {
            Some(fps_buffer.average())
        };
        overlay::annotate_stats(&mut display, avg_fps, object_count)?;

        highgui::imshow(WINDOW_NAME, &display)?;
        if let Some(recorder) = recorder.as_deref_mut() {
            recorder.write(&display)?;
        }

        let poll_ms = if source.is_still() { 0 } else { STREAM_KEY_POLL_MS };
        match KeyCommand::from(highgui::wait_key(poll_ms)?) {
            KeyCommand::Quit => {
                tracing::info!("Quit requested");
                return Ok(());
            }
            KeyCommand::Pause => {
                // Paused: hold until the next keypress, then resume.
                highgui::wait_key(0)?;
            }
            KeyCommand::Snapshot => {
                imgcodecs::imwrite(SNAPSHOT_FILENAME, &display, &Vector::new())?;
                tracing::info!("Saved snapshot to {}", SNAPSHOT_FILENAME);
            }
            KeyCommand::None => {}
        }

        let elapsed = iteration_start.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            fps_buffer.push(1.0 / elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_codes_map_to_commands() {
        assert_eq!(KeyCommand::from('q' as i32), KeyCommand::Quit);
        assert_eq!(KeyCommand::from('Q' as i32), KeyCommand::Quit);
        assert_eq!(KeyCommand::from('s' as i32), KeyCommand::Pause);
        assert_eq!(KeyCommand::from('p' as i32), KeyCommand::Snapshot);
        assert_eq!(KeyCommand::from('x' as i32), KeyCommand::None);
        // highgui returns -1 when the poll times out with no key.
        assert_eq!(KeyCommand::from(-1), KeyCommand::None);
    }
}
