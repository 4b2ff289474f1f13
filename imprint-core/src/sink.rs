//! The raw byte sink that lands an image on a device.
use std::io::{self, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::os_options::open_device_for_write;

// Use a 1 MiB buffer for I/O operations.
const BUFFER_SIZE: usize = 1024 * 1024;

/// Somewhere a byte stream can be written to, addressed by path.
pub trait DeviceSink {
    /// Drains `source` into `device` starting at offset 0 and returns the
    /// number of bytes written.
    fn write_stream(&self, device: &Path, source: &mut dyn Read) -> io::Result<u64>;
}

impl<S: DeviceSink + ?Sized> DeviceSink for &S {
    fn write_stream(&self, device: &Path, source: &mut dyn Read) -> io::Result<u64> {
        (**self).write_stream(device, source)
    }
}

/// Writes straight to the device node with synchronous I/O.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawDevice;

impl DeviceSink for RawDevice {
    fn write_stream(&self, device: &Path, source: &mut dyn Read) -> io::Result<u64> {
        let mut device_file = open_device_for_write(device)?;
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = match source.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            device_file.write_all(&buffer[..n])?;
            written += n as u64;
        }

        device_file.flush()?;
        device_file.sync_all()?;
        debug!(device = %device.display(), written, "device sink drained");
        Ok(written)
    }
}
