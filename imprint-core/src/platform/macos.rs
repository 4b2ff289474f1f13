use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use super::{SystemMount, is_device_or_partition};
use crate::mount::{MountControl, UnmountOutput};

/// Device nodes named in the output of `mount`, one per mounted filesystem.
///
/// Lines look like `/dev/disk4s1 on /Volumes/boot (msdos, local, nodev)`.
fn mounted_nodes(mount_output: &str) -> impl Iterator<Item = &Path> {
    mount_output
        .lines()
        .filter_map(|line| line.split_once(" on "))
        .map(|(node, _)| Path::new(node))
}

impl MountControl for SystemMount {
    fn is_mounted(&self, device: &Path) -> io::Result<bool> {
        let device = fs::canonicalize(device)?;
        let out = Command::new("mount").output()?;
        if !out.status.success() {
            return Err(io::Error::other(format!("mount exited with {}", out.status)));
        }

        let table = String::from_utf8_lossy(&out.stdout);
        let mounted = mounted_nodes(&table).any(|node| is_device_or_partition(&device, node));
        Ok(mounted)
    }

    /// Runs `diskutil unmountDisk force`, which unmounts every volume on the disk.
    fn unmount(&self, device: &Path) -> io::Result<UnmountOutput> {
        debug!(device = %device.display(), "running diskutil unmountDisk");
        let out = Command::new("diskutil")
            .args(["unmountDisk", "force"])
            .arg(device)
            .output()?;

        if !out.status.success() && out.stderr.is_empty() {
            return Err(io::Error::other(format!(
                "diskutil unmountDisk exited with {}",
                out.status
            )));
        }

        Ok(UnmountOutput {
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }
}
