//! Makes sure a device is not mounted before anything is written to it.
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::MountError;

/// What an unmount command left behind on its diagnostic stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnmountOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Access to the host's mount table and unmount command.
///
/// [`crate::platform::SystemMount`] is the real implementation; tests swap in
/// doubles to observe which calls the coordinator makes.
pub trait MountControl {
    /// Reports whether the device or any of its partitions is mounted.
    /// Fails if the device path cannot be reached.
    fn is_mounted(&self, device: &Path) -> io::Result<bool>;

    /// Unmounts the device and everything on it.
    ///
    /// A returned `Ok` only means the command ran; its `stderr` still has to
    /// be empty for the unmount to count as successful.
    fn unmount(&self, device: &Path) -> io::Result<UnmountOutput>;
}

impl<M: MountControl + ?Sized> MountControl for &M {
    fn is_mounted(&self, device: &Path) -> io::Result<bool> {
        (**self).is_mounted(device)
    }

    fn unmount(&self, device: &Path) -> io::Result<UnmountOutput> {
        (**self).unmount(device)
    }
}

/// How the coordinator decides whether to unmount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnmountPolicy {
    /// Query the mount status and only unmount a mounted device.
    #[default]
    CheckThenAct,
    /// Always run the unmount command.
    Unconditional,
}

/// Leaves `device` unmounted or explains why it could not.
///
/// Any text on the unmount command's stderr is a failure, even when the
/// command itself exited cleanly.
pub fn ensure_unmounted(
    control: &impl MountControl,
    device: &Path,
    policy: UnmountPolicy,
) -> Result<(), MountError> {
    if policy == UnmountPolicy::CheckThenAct {
        let mounted = control.is_mounted(device).map_err(|source| MountError::Query {
            device: device.to_path_buf(),
            source,
        })?;

        if !mounted {
            debug!(device = %device.display(), "device is not mounted");
            return Ok(());
        }
    }

    info!(device = %device.display(), ?policy, "unmounting device");
    let output = control.unmount(device).map_err(|source| MountError::Unmount {
        device: device.to_path_buf(),
        source,
    })?;

    if !output.stderr.is_empty() {
        warn!(
            device = %device.display(),
            stderr = %output.stderr.trim_end(),
            "unmount reported diagnostics"
        );
        return Err(MountError::Diagnostics {
            device: device.to_path_buf(),
            diagnostics: output.stderr,
        });
    }

    Ok(())
}
