use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::{SystemMount, is_device_or_partition};
use crate::mount::{MountControl, UnmountOutput};

const MOUNT_TABLE: &str = "/proc/self/mounts";

/// One line of the kernel mount table.
#[derive(Debug, PartialEq, Eq)]
struct MountEntry {
    source: PathBuf,
    mount_point: PathBuf,
    fs_type: String,
}

/// Undoes the octal escapes (`\040` for a space, `\011` for a tab, ...) the
/// kernel applies to whitespace and backslashes in mount table fields.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits.iter().fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Parses `/proc/self/mounts`. Every mounted filesystem is kept, whatever its
/// type, so nothing on the target device can be missed.
fn parse_mount_table(table: &str) -> Vec<MountEntry> {
    table
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let source = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            Some(MountEntry {
                source: PathBuf::from(unescape(source)),
                mount_point: PathBuf::from(unescape(mount_point)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Finds every place the device or one of its partitions is mounted.
///
/// The device path is canonicalized first so that symlinks such as
/// `/dev/disk/by-id/...` resolve to the node the mount table records. This is
/// also where an unreachable device path turns into an error. Mount sources
/// that are themselves symlinks (`/dev/disk/by-uuid/...`) are resolved too.
///
/// Mount points are returned deepest first, the order they must be unmounted in.
fn mount_points(device: &Path) -> io::Result<Vec<PathBuf>> {
    let device = fs::canonicalize(device)?;
    let table = fs::read_to_string(MOUNT_TABLE)?;
    Ok(mount_points_in(&device, parse_mount_table(&table)))
}

fn mount_points_in(device: &Path, entries: Vec<MountEntry>) -> Vec<PathBuf> {
    let mut points: Vec<PathBuf> = entries
        .into_iter()
        .filter(|entry| {
            let source = fs::canonicalize(&entry.source).unwrap_or_else(|_| entry.source.clone());
            is_device_or_partition(device, &source)
        })
        .map(|entry| {
            debug!(
                mount_point = %entry.mount_point.display(),
                fs_type = %entry.fs_type,
                "device is mounted"
            );
            entry.mount_point
        })
        .collect();

    points.sort_by_key(|mp| std::cmp::Reverse(mp.components().count()));
    points
}

impl MountControl for SystemMount {
    fn is_mounted(&self, device: &Path) -> io::Result<bool> {
        Ok(!mount_points(device)?.is_empty())
    }

    /// Runs `umount` on each mount point of the device, stopping at the first
    /// one that writes to stderr.
    fn unmount(&self, device: &Path) -> io::Result<UnmountOutput> {
        let mut output = UnmountOutput::default();

        for mount_point in mount_points(device)? {
            debug!(mount_point = %mount_point.display(), "running umount");
            let out = Command::new("umount").arg(&mount_point).output()?;

            output.stdout.push_str(&String::from_utf8_lossy(&out.stdout));
            output.stderr.push_str(&String::from_utf8_lossy(&out.stderr));

            if !out.stderr.is_empty() {
                break;
            }
            if !out.status.success() {
                return Err(io::Error::other(format!(
                    "umount {} exited with {}",
                    mount_point.display(),
                    out.status
                )));
            }
        }

        Ok(output)
    }
}
