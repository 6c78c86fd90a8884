use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::packager::ToolStatus;

pub type Result<T, E = IconError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum IconError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("image error on {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{tool} failed ({status})")]
    ToolFailed { tool: String, status: ToolStatus },

    #[error("could not launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid size list: {0}")]
    InvalidSizes(String),

    #[error("embedded placeholder image is corrupt: {0}")]
    Placeholder(#[from] base64::DecodeError),

    #[error("failed to encode icns bundle {}: {source}", path.display())]
    Icns {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl IconError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IconError::Io { path: path.into(), source }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        IconError::Image { path: path.into(), source }
    }
}
