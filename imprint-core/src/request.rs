//! The description of a single write operation.
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::WriteError;
use crate::mount::UnmountPolicy;
use crate::progress::{DEFAULT_INTERVAL, ProgressState};

/// Callback that receives progress snapshots while an image is copied.
pub type OnProgress = Box<dyn FnMut(&ProgressState) + Send>;

/// Everything needed to write one image to one device.
///
/// ```
/// use imprint_core::{UnmountPolicy, WriteRequest};
///
/// let request = WriteRequest::new("/dev/sdb", "raspios.img")
///     .unmount_policy(UnmountPolicy::Unconditional)
///     .on_progress(|state| println!("{state}"));
/// assert!(request.validate().is_ok());
/// ```
pub struct WriteRequest {
    pub(crate) device: PathBuf,
    pub(crate) image: PathBuf,
    pub(crate) progress: Option<OnProgress>,
    pub(crate) unmount_policy: UnmountPolicy,
    pub(crate) progress_interval: Duration,
}

impl WriteRequest {
    pub fn new(device: impl Into<PathBuf>, image: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            image: image.into(),
            progress: None,
            unmount_policy: UnmountPolicy::default(),
            progress_interval: DEFAULT_INTERVAL,
        }
    }

    /// Subscribes `callback` to progress snapshots.
    pub fn on_progress(mut self, callback: impl FnMut(&ProgressState) + Send + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn unmount_policy(mut self, policy: UnmountPolicy) -> Self {
        self.unmount_policy = policy;
        self
    }

    /// Sets how often progress is sampled. Defaults to 500 ms.
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    pub fn image(&self) -> &Path {
        &self.image
    }

    /// Checks the shape of the request without touching the filesystem.
    pub fn validate(&self) -> Result<(), WriteError> {
        check_path("device", &self.device)?;
        check_path("image", &self.image)?;

        if self.image == self.device {
            return Err(WriteError::InvalidOption {
                name: "image",
                value: self.image.display().to_string(),
                reason: "the same path as the device",
            });
        }

        if self.progress_interval.is_zero() {
            return Err(WriteError::InvalidOption {
                name: "progress_interval",
                value: format!("{:?}", self.progress_interval),
                reason: "not a positive duration",
            });
        }

        Ok(())
    }
}

impl fmt::Debug for WriteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteRequest")
            .field("device", &self.device)
            .field("image", &self.image)
            .field("progress", &self.progress.is_some())
            .field("unmount_policy", &self.unmount_policy)
            .field("progress_interval", &self.progress_interval)
            .finish()
    }
}

fn check_path(name: &'static str, path: &Path) -> Result<(), WriteError> {
    if path.as_os_str().is_empty() {
        return Err(WriteError::MissingOption(name));
    }
    if path.as_os_str().as_encoded_bytes().contains(&0) {
        return Err(WriteError::InvalidOption {
            name,
            value: path.display().to_string(),
            reason: "not a valid path (contains a NUL byte)",
        });
    }
    Ok(())
}
