//! Contains the logic for writing an image file to a device.
//!
//! Writing is a strictly ordered pipeline. Each stage must succeed before the
//! next one starts:
//! 1.  Validate the [`WriteRequest`].
//! 2.  Make sure the device is unmounted ([`crate::mount::ensure_unmounted`]).
//! 3.  Open the image and size it, refusing empty images.
//! 4.  Stream the image through a [`ProgressTracker`] into the device sink.
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::WriteError;
use crate::mount::{MountControl, ensure_unmounted};
use crate::platform::SystemMount;
use crate::progress::{ProgressReader, ProgressState, ProgressTracker};
use crate::request::WriteRequest;
use crate::sink::{DeviceSink, RawDevice};

/// The pipeline stage an operation was in, attached to I/O errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Unmounting,
    Sizing,
    Copying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Validating => "validating request",
            Stage::Unmounting => "unmounting device",
            Stage::Sizing => "sizing image",
            Stage::Copying => "copying image",
        })
    }
}

/// Writes `image` onto `device`, reporting progress every `interval`.
///
/// The device must not be mounted; [`Writer::write`] takes care of that. On
/// success exactly `size` bytes of the image have landed at offset 0 of the
/// device and `on_progress`, if given, has seen a final snapshot with
/// `transferred == total`.
///
/// # Errors
///
/// - [`WriteError::NotFound`] if the image does not exist.
/// - [`WriteError::InvalidInput`] if the image is empty. Nothing is written.
/// - [`WriteError::Io`] for any failure while opening, reading or writing.
pub fn write_with_progress<S: DeviceSink>(
    sink: &S,
    image: &Path,
    device: &Path,
    interval: Duration,
    on_progress: Option<&mut dyn FnMut(&ProgressState)>,
) -> Result<(), WriteError> {
    if image.as_os_str().is_empty() {
        return Err(WriteError::MissingParameter("file"));
    }
    if device.as_os_str().is_empty() {
        return Err(WriteError::MissingParameter("destination"));
    }

    debug!(stage = %Stage::Sizing, image = %image.display());
    let (image_file, size) = open_image(image)?;
    if size == 0 {
        return Err(WriteError::InvalidInput(image.to_path_buf()));
    }

    let mut tracker = ProgressTracker::new(size, interval)?;
    if let Some(on_progress) = on_progress {
        tracker.subscribe(on_progress);
    }

    debug!(stage = %Stage::Copying, size, device = %device.display());
    // Bytes appended to the image after it was sized are not copied.
    let mut reader = ProgressReader::new(image_file.take(size), &mut tracker);
    let written = sink
        .write_stream(device, &mut reader)
        .map_err(|e| WriteError::io(Stage::Copying, e))?;

    if written != size {
        return Err(WriteError::io(
            Stage::Copying,
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("image ended after {written} of {size} bytes"),
            ),
        ));
    }

    tracker.finish();
    Ok(())
}

/// Opens the image once and sizes it from the open handle, so the bytes
/// streamed later come from the same file that was measured.
fn open_image(image: &Path) -> Result<(File, u64), WriteError> {
    let file = File::open(image).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => WriteError::NotFound(image.to_path_buf()),
        _ => WriteError::io(Stage::Sizing, e),
    })?;
    let size = file
        .metadata()
        .map_err(|e| WriteError::io(Stage::Sizing, e))?
        .len();
    Ok((file, size))
}

/// Runs write requests against a pair of collaborators: something that can
/// unmount devices and something that can write to them.
#[derive(Debug, Default)]
pub struct Writer<M, S> {
    mount: M,
    sink: S,
}

impl Writer<SystemMount, RawDevice> {
    /// A writer backed by the host's mount table and raw device nodes.
    pub fn system() -> Self {
        Self::new(SystemMount, RawDevice)
    }
}

impl<M: MountControl, S: DeviceSink> Writer<M, S> {
    pub fn new(mount: M, sink: S) -> Self {
        Self { mount, sink }
    }

    /// Validates `request`, unmounts its device and copies its image over.
    ///
    /// Validation happens before any I/O, and the copy never starts unless
    /// the device was confirmed unmounted.
    pub fn write(&self, request: WriteRequest) -> Result<(), WriteError> {
        debug!(stage = %Stage::Validating, ?request);
        request.validate()?;
        self.execute(request)
    }

    fn execute(&self, mut request: WriteRequest) -> Result<(), WriteError> {
        info!(
            image = %request.image.display(),
            device = %request.device.display(),
            "writing image"
        );

        debug!(stage = %Stage::Unmounting, policy = ?request.unmount_policy);
        ensure_unmounted(&self.mount, &request.device, request.unmount_policy)?;

        let mut progress = request.progress.take();
        let result = write_with_progress(
            &self.sink,
            &request.image,
            &request.device,
            request.progress_interval,
            progress
                .as_deref_mut()
                .map(|f| f as &mut dyn FnMut(&ProgressState)),
        );

        match &result {
            Ok(()) => info!(device = %request.device.display(), "write complete"),
            Err(e) => warn!(device = %request.device.display(), error = %e, "write failed"),
        }
        result
    }
}

impl<M, S> Writer<M, S>
where
    M: MountControl + Send + 'static,
    S: DeviceSink + Send + 'static,
{
    /// Runs the request on a background thread.
    ///
    /// Validation errors are returned immediately and `on_done` is not called.
    /// Otherwise `on_done` receives the outcome exactly once when the write
    /// finishes.
    pub fn spawn<F>(self, request: WriteRequest, on_done: F) -> Result<JoinHandle<()>, WriteError>
    where
        F: FnOnce(Result<(), WriteError>) + Send + 'static,
    {
        request.validate()?;
        Ok(thread::spawn(move || on_done(self.execute(request))))
    }
}

/// Writes an image to a device using the system collaborators.
///
/// This is the main entry point for the writing process; see
/// [`Writer::write`] for the sequencing guarantees.
pub fn run(request: WriteRequest) -> Result<(), WriteError> {
    Writer::system().write(request)
}

/// Like [`run`], but copies on a background thread and reports the outcome
/// through `on_done`.
pub fn spawn<F>(request: WriteRequest, on_done: F) -> Result<JoinHandle<()>, WriteError>
where
    F: FnOnce(Result<(), WriteError>) + Send + 'static,
{
    Writer::system().spawn(request, on_done)
}
