use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "frame_capture",
    about = "Stream frames to a remote detection service and display the results"
)]
pub struct Args {
    /// Inference endpoint URL, e.g. "http://host:5001/predict"
    #[arg(long = "server_url")]
    pub server_url: String,

    /// Image file, image folder, video file, "usbN", "picameraN", or an
    /// "rtsp://" stream URL
    #[arg(long)]
    pub source: String,

    /// Minimum confidence for a detection to be drawn
    #[arg(long, default_value_t = 0.5)]
    pub thresh: f32,

    /// Display resolution as WxH, e.g. "1280x720"; defaults to the source
    /// resolution
    #[arg(long, value_parser = parse_resolution)]
    pub resolution: Option<Resolution>,

    /// Record the annotated stream to "demo1.avi"
    #[arg(long, requires = "resolution")]
    pub record: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: i32,
    pub height: i32,
}

fn parse_resolution(value: &str) -> Result<Resolution, String> {
    let (width, height) = value
        .split_once('x')
        .ok_or_else(|| format!("expected WxH (e.g. 1280x720), got '{}'", value))?;

    let width: i32 = width
        .parse()
        .map_err(|_| format!("invalid width in '{}'", value))?;
    let height: i32 = height
        .parse()
        .map_err(|_| format!("invalid height in '{}'", value))?;

    if width <= 0 || height <= 0 {
        return Err(format!("resolution must be positive, got '{}'", value));
    }

    Ok(Resolution { width, height })
}
