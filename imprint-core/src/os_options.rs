use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Opens an existing device (or file standing in for one) for raw writing.
///
/// The target is neither created nor truncated, so bytes past the end of the
/// image keep their previous contents. On Unix `O_SYNC` makes each write
/// reach the device before it returns.
pub(crate) fn open_device_for_write(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true);
    #[cfg(unix)]
    options.custom_flags(libc::O_SYNC);
    options.open(path)
}
