use std::io;
use std::path::Path;

use super::SystemMount;
use crate::mount::{MountControl, UnmountOutput};

fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "mount management is not implemented for this platform",
    )
}

impl MountControl for SystemMount {
    fn is_mounted(&self, _device: &Path) -> io::Result<bool> {
        Err(unsupported())
    }

    fn unmount(&self, _device: &Path) -> io::Result<UnmountOutput> {
        Err(unsupported())
    }
}
