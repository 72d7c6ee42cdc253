use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RasterError>;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("invalid page spec {spec:?}: bad token {token:?}")]
    InvalidPageSpec { spec: String, token: String },

    #[error("invalid size {label:?} (expected `original`, W, Wx, xH, WxH or P%)")]
    InvalidSize { label: String },

    #[error("invalid image format {format:?}")]
    InvalidFormat { format: String },

    #[error("size {label:?} requested more than once")]
    DuplicateSize { label: String },

    #[error("rolling downsample needs descending sizes, but {next:?} is larger than {previous:?}")]
    RollingOrder { previous: String, next: String },

    #[error("previous size {size:?} is incomplete; missing {missing:?}")]
    IncompleteRollingSource { size: String, missing: Vec<PathBuf> },

    #[error("extraction failed: {command}\n{output}")]
    ExtractionFailed { command: String, output: String },

    #[error("timed out after {timeout:?}: {command}\n{output}")]
    Timeout {
        command: String,
        timeout: Duration,
        output: String,
    },

    #[error("could not determine page count of {}: {output}", .document.display())]
    PageCount { document: PathBuf, output: String },

    #[error("spawning {command}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl RasterError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RasterError::Timeout { .. })
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RasterError::Io {
            context: context.into(),
            source,
        }
    }
}
