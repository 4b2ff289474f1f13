//! The core, UI-agnostic library for the `imprint` image writer.
//!
//! `imprint-core` writes a disk image onto a raw block device. Before a single
//! byte is copied it makes sure the device is not mounted, and while copying it
//! reports progress through a caller-supplied callback.
//!
//! The library is structured into several key modules:
//! - [`mount`]: The unmount coordinator and the [`MountControl`] trait.
//! - [`platform`]: [`SystemMount`], the host implementation of [`MountControl`].
//! - [`progress`]: Time-sampled [`ProgressState`] snapshots over a byte stream.
//! - [`sink`]: The [`DeviceSink`] trait and the [`RawDevice`] writer.
//! - [`mod@write`]: The pipeline tying the pieces together.
//!
//! The primary entry point is [`write::run`], which validates a
//! [`WriteRequest`], unmounts the device and streams the image onto it. The
//! outcome is a single `Result`; [`write::spawn`] delivers the same outcome to a
//! completion callback from a background thread.
//!
//! ## Example: Writing an Image with Progress Reporting
//!
//! ```rust,no_run
//! use imprint_core::{write, WriteRequest};
//!
//! fn main() -> Result<(), imprint_core::WriteError> {
//!     let request = WriteRequest::new("/dev/sdb", "path/to/image.img")
//!         .on_progress(|state| {
//!             println!("{:.1}% ({} bytes)", state.percentage, state.transferred);
//!         });
//!
//!     write::run(request)?;
//!     println!("Write complete!");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod mount;
mod os_options;
pub mod platform;
pub mod progress;
pub mod request;
pub mod sink;
pub mod write;

pub use error::{MountError, WriteError};
pub use mount::{MountControl, UnmountOutput, UnmountPolicy, ensure_unmounted};
pub use platform::SystemMount;
pub use progress::{ProgressState, ProgressTracker};
pub use request::WriteRequest;
pub use sink::{DeviceSink, RawDevice};
pub use write::{Stage, Writer};
