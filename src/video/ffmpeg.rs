//! Decoding and encoding through the external `ffmpeg`/`ffprobe` binaries.
//!
//! Frames travel over pipes as `rgb24` rawvideo, so every frame is exactly
//! `width * height * 3` bytes and no temporary files are involved.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::VideoConfig;
use crate::error::{Result, VideoError};
use crate::video::source::{FrameSink, FrameSource, VideoBackend};
use crate::video::types::{Frame, VideoMetadata, WriterParams};

/// Video backend shelling out to ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    max_forward_skip: u64,
}

impl FfmpegBackend {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg.clone(),
            ffprobe: config.ffprobe.clone(),
            max_forward_skip: config.max_forward_skip,
        }
    }

    /// Whether both binaries can be executed
    pub fn check_available(&self) -> bool {
        [&self.ffmpeg, &self.ffprobe].iter().all(|tool| {
            Command::new(tool)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false)
        })
    }

    /// Read stream properties of the first video stream
    pub fn probe(&self, path: &Path) -> Result<VideoMetadata> {
        if !path.is_file() {
            return Err(VideoError::Open {
                path: path.display().to_string(),
                reason: "file not found".to_string(),
            }.into());
        }

        let output = Command::new(&self.ffprobe)
            .args([
                "-v", "error",
                "-select_streams", "v:0",
                "-show_entries",
                "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames,duration:format=duration",
                "-of", "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| tool_error(&self.ffprobe, e))?;

        if !output.status.success() {
            return Err(VideoError::Open {
                path: path.display().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }.into());
        }

        let json = String::from_utf8_lossy(&output.stdout);
        let metadata = parse_probe(&path.display().to_string(), &json)?;

        info!("Video metadata: {}x{} @ {:.3}fps, {} frames ({:.1}s)",
              metadata.width, metadata.height, metadata.fps,
              metadata.frame_count, metadata.duration());
        Ok(metadata)
    }
}

impl VideoBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        let metadata = self.probe(path)?;
        Ok(Box::new(FfmpegSource {
            path: path.to_path_buf(),
            ffmpeg: self.ffmpeg.clone(),
            metadata,
            position: 0,
            max_forward_skip: self.max_forward_skip,
            decoder: None,
            closed: false,
        }))
    }

    fn create_writer(&self, path: &Path, params: &WriterParams) -> Result<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegSink::spawn(&self.ffmpeg, path, params)?))
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Turn ffprobe's JSON into metadata, rejecting streams with no frames
fn parse_probe(path: &str, json: &str) -> Result<VideoMetadata> {
    let open_error = |reason: &str| VideoError::Open {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let probe: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| open_error(&format!("unreadable ffprobe output: {}", e)))?;
    let stream = probe.streams.first().ok_or_else(|| open_error("no video stream"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(open_error("missing frame dimensions").into()),
    };

    let fps = stream.avg_frame_rate.as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .ok_or_else(|| open_error("unknown frame rate"))?;

    let frame_count = stream.nb_frames.as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|&n| n > 0)
        .or_else(|| {
            let duration = stream.duration.as_deref()
                .or_else(|| probe.format.as_ref().and_then(|f| f.duration.as_deref()))
                .and_then(|d| d.parse::<f64>().ok())?;
            Some((duration * fps).floor().max(0.0) as u64)
        })
        .unwrap_or(0);

    if frame_count == 0 {
        return Err(open_error("video has no frames").into());
    }

    Ok(VideoMetadata { fps, frame_count, width, height })
}

/// Parse `num/den` (or a plain number) into a positive rate
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

fn tool_error(tool: &Path, e: io::Error) -> VideoError {
    VideoError::ToolMissing {
        tool: tool.display().to_string(),
        reason: e.to_string(),
    }
}

/// Running decoder process
struct Decoder {
    child: Child,
    stdout: BufReader<ChildStdout>,
}

impl Decoder {
    fn spawn(ffmpeg: &Path, path: &Path, start_seconds: f64) -> Result<Self> {
        let mut cmd = Command::new(ffmpeg);
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"]);
        if start_seconds > 0.0 {
            cmd.arg("-ss").arg(format!("{:.6}", start_seconds));
        }
        cmd.arg("-i")
            .arg(path)
            .args(["-map", "0:v:0", "-an", "-sn", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        debug!("Starting decoder for {} at {:.3}s", path.display(), start_seconds);
        let mut child = cmd.spawn().map_err(|e| tool_error(ffmpeg, e))?;
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(VideoError::Open {
                    path: path.display().to_string(),
                    reason: "decoder stdout unavailable".to_string(),
                }.into());
            }
        };

        Ok(Self { child, stdout: BufReader::new(stdout) })
    }

    fn stop(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Seekable decoder over one file
pub struct FfmpegSource {
    path: PathBuf,
    ffmpeg: PathBuf,
    metadata: VideoMetadata,
    position: u64,
    max_forward_skip: u64,
    decoder: Option<Decoder>,
    closed: bool,
}

impl FfmpegSource {
    fn decode_into(&mut self, buffer: &mut [u8]) -> Result<bool> {
        if self.decoder.is_none() {
            let start = self.position as f64 / self.metadata.fps;
            self.decoder = Some(Decoder::spawn(&self.ffmpeg, &self.path, start)?);
        }
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(false);
        };

        match decoder.stdout.read_exact(buffer) {
            Ok(()) => {
                self.position += 1;
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(VideoError::FrameRead {
                position: self.position,
                reason: e.to_string(),
            }.into()),
        }
    }
}

impl FrameSource for FfmpegSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, frame_index: u64) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        let ahead = frame_index.checked_sub(self.position);
        match (ahead, self.decoder.is_some()) {
            (Some(0), _) => {}
            (Some(skip), true) if skip <= self.max_forward_skip => {
                let mut scratch = vec![0u8; self.metadata.frame_bytes()];
                for _ in 0..skip {
                    if !self.decode_into(&mut scratch)? {
                        break;
                    }
                }
                self.position = frame_index;
            }
            _ => {
                if let Some(decoder) = self.decoder.take() {
                    decoder.stop();
                }
                self.position = frame_index;
            }
        }
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }

        let mut buffer = vec![0u8; self.metadata.frame_bytes()];
        if !self.decode_into(&mut buffer)? {
            return Ok(None);
        }

        Frame::from_rgb_bytes(self.metadata.width, self.metadata.height, buffer)
            .map(Some)
            .ok_or_else(|| VideoError::FrameRead {
                position: self.position,
                reason: "short frame buffer".to_string(),
            }.into())
    }

    fn close(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            decoder.stop();
        }
        self.closed = true;
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Encoder fed through ffmpeg's stdin
pub struct FfmpegSink {
    path: PathBuf,
    params: WriterParams,
    child: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
}

impl FfmpegSink {
    fn spawn(ffmpeg: &Path, path: &Path, params: &WriterParams) -> Result<Self> {
        let mut cmd = Command::new(ffmpeg);
        cmd.args(encoder_args(params))
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        debug!("Starting encoder for {} ({}x{} @ {:.3}fps, {})",
               path.display(), params.width, params.height, params.fps, params.codec);
        let mut child = cmd.spawn().map_err(|e| tool_error(ffmpeg, e))?;
        let stdin = child.stdin.take().map(BufWriter::new);

        Ok(Self {
            path: path.to_path_buf(),
            params: params.clone(),
            child: Some(child),
            stdin,
        })
    }

    /// Wait for the encoder and describe how it failed
    fn collect_failure(&mut self, context: &str) -> VideoError {
        self.stdin = None;
        let stderr = self.child.take()
            .and_then(|child| child.wait_with_output().ok())
            .map(|output| String::from_utf8_lossy(&output.stderr).trim().to_string())
            .unwrap_or_default();
        VideoError::Encoding {
            reason: format!("{}: {} {}", self.path.display(), context, stderr),
        }
    }
}

fn encoder_args(params: &WriterParams) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y", "-f", "rawvideo", "-pix_fmt", "rgb24"]
        .iter()
        .map(|arg| arg.to_string())
        .collect();
    args.extend([
        "-s".to_string(), format!("{}x{}", params.width, params.height),
        "-r".to_string(), format!("{}", params.fps),
        "-i".to_string(), "-".to_string(),
        "-an".to_string(),
        "-c:v".to_string(), params.codec.clone(),
        "-pix_fmt".to_string(), "yuv420p".to_string(),
    ]);
    args
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != (self.params.width, self.params.height) {
            return Err(VideoError::DimensionMismatch {
                expected: (self.params.width, self.params.height),
                actual: frame.dimensions(),
            }.into());
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(VideoError::Encoding {
                reason: format!("{}: writer already finished", self.path.display()),
            }.into());
        };

        if let Err(e) = stdin.write_all(frame.as_bytes()) {
            return Err(self.collect_failure(&e.to_string()).into());
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.flush() {
                return Err(self.collect_failure(&e.to_string()).into());
            }
        }

        let Some(child) = self.child.take() else {
            return Ok(());
        };

        let output = child.wait_with_output().map_err(|e| VideoError::Encoding {
            reason: format!("{}: {}", self.path.display(), e),
        })?;

        if !output.status.success() {
            return Err(VideoError::Encoding {
                reason: format!("{}: ffmpeg exited with {}: {}",
                                self.path.display(), output.status,
                                String::from_utf8_lossy(&output.stderr).trim()),
            }.into());
        }
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            warn!("Encoder for {} dropped before finish, killing it", self.path.display());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
