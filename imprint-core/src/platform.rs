//! Provides platform-specific functionality.
//!
//! This module contains [`SystemMount`], the [`crate::mount::MountControl`]
//! implementation backed by the host's mount table and unmount tooling.
//!
//! It uses conditional compilation (`#[cfg]`) to pick the implementation for
//! the target OS. Each submodule implements the trait for the same struct, so
//! the rest of the library never names a platform.
use std::path::Path;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod unsupported;

/// Mount status and unmounting for the current operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemMount;

/// Whether `candidate` is `device` itself or one of its partitions.
///
/// A device whose name ends in a letter takes a bare partition number
/// (`/dev/sdb1`). A name ending in a digit needs a separator before the number,
/// `p` on Linux (`/dev/mmcblk0p1`, `/dev/nvme0n1p2`) or `s` on macOS
/// (`/dev/disk4s1`), so `/dev/loop1` never matches `/dev/loop10`.
#[cfg_attr(not(any(target_os = "linux", target_os = "macos")), allow(dead_code))]
pub(crate) fn is_device_or_partition(device: &Path, candidate: &Path) -> bool {
    let (Some(device), Some(candidate)) = (device.to_str(), candidate.to_str()) else {
        return false;
    };
    let Some(suffix) = candidate.strip_prefix(device) else {
        return false;
    };
    if suffix.is_empty() {
        return true;
    }

    let number = if device.ends_with(|c: char| c.is_ascii_digit()) {
        match suffix.strip_prefix(['p', 's']) {
            Some(number) => number,
            None => return false,
        }
    } else {
        suffix
    };
    !number.is_empty() && number.chars().all(|c| c.is_ascii_digit())
}
