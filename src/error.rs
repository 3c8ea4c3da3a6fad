use thiserror::Error;

/// Main error type for the activity-clipper library
#[derive(Error, Debug)]
pub enum ClipperError {
    #[error("Video error: {0}")]
    Video(#[from] VideoError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Video decode/encode errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Failed to open video {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Failed to read frame {position}: {reason}")]
    FrameRead { position: u64, reason: String },

    #[error("Frame dimensions {actual:?} do not match {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Video encoding failed: {reason}")]
    Encoding { reason: String },

    #[error("Could not run {tool}: {reason}")]
    ToolMissing { tool: String, reason: String },
}

/// Sampling and segmentation errors
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid sampling parameters: {details}")]
    InvalidParameters { details: String },

    #[error("Segment {start}..={end} is out of range for {len} samples")]
    SegmentOutOfRange { start: usize, end: usize, len: usize },
}

/// Clip and plot output errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("Invalid clip range: {start:.3}s-{end:.3}s")]
    InvalidRange { start: f64, end: f64 },

    #[error("Cannot derive a clip name from {path}")]
    InvalidSourceName { path: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using ClipperError
pub type Result<T> = std::result::Result<T, ClipperError>;

impl ClipperError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Whether this error came from a video that could not be opened at all
    pub fn is_open_failure(&self) -> bool {
        matches!(self, Self::Video(VideoError::Open { .. }))
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Video(VideoError::Open { path, reason }) => {
                format!("Could not open video '{}' ({}). Please check the file exists and is a supported format.", path, reason)
            }
            Self::Video(VideoError::ToolMissing { tool, .. }) => {
                format!("'{}' was not found. Please install FFmpeg or set video.{} in the configuration.", tool, tool)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_failure_detection() {
        let err: ClipperError = VideoError::Open {
            path: "missing.mp4".to_string(),
            reason: "no such file".to_string(),
        }
        .into();
        assert!(err.is_open_failure());
        assert!(err.user_message().contains("missing.mp4"));

        let err: ClipperError = VideoError::FrameRead {
            position: 10,
            reason: "broken pipe".to_string(),
        }
        .into();
        assert!(!err.is_open_failure());
    }

    #[test]
    fn test_tool_missing_message_names_config_key() {
        let err: ClipperError = VideoError::ToolMissing {
            tool: "ffprobe".to_string(),
            reason: "not found".to_string(),
        }
        .into();
        assert!(err.user_message().contains("video.ffprobe"));
    }
}
