//! Error types returned by the write pipeline.
use std::io;
use std::path::PathBuf;

use crate::write::Stage;

/// Everything that can stop an image from reaching a device.
///
/// Validation variants (`Missing*`, `Invalid*`) are produced before any I/O
/// is attempted. The remaining variants carry the underlying cause unchanged.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// A required argument to a pipeline function was empty.
    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),

    /// A pipeline function argument has the wrong shape.
    #[error("Invalid parameter: {name}: {value} is {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    /// A required field of a [`crate::WriteRequest`] was empty.
    #[error("Missing option: {0}")]
    MissingOption(&'static str),

    /// A field of a [`crate::WriteRequest`] has the wrong shape.
    #[error("Invalid option: {name}: {value} is {reason}")]
    InvalidOption {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    /// The source image does not exist.
    #[error("File not found: {}.", .0.display())]
    NotFound(PathBuf),

    /// The source image cannot be written (it is empty).
    #[error("Invalid file size: {}. The file is 0 bytes.", .0.display())]
    InvalidInput(PathBuf),

    /// The device could not be confirmed as unmounted.
    #[error(transparent)]
    Mount(#[from] MountError),

    /// An I/O failure while sizing or copying the image.
    #[error("{stage} failed: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: io::Error,
    },
}

impl WriteError {
    pub(crate) fn io(stage: Stage, source: io::Error) -> Self {
        Self::Io { stage, source }
    }
}

/// Failures of the unmount coordinator.
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    /// The mount status of the device could not be determined.
    #[error("Could not query mount status of {}: {source}", .device.display())]
    Query {
        device: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The unmount command could not be run or reported failure.
    #[error("Could not unmount {}: {source}", .device.display())]
    Unmount {
        device: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The unmount command ran but printed diagnostics.
    #[error("{diagnostics}")]
    Diagnostics { device: PathBuf, diagnostics: String },
}
