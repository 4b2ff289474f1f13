// Shared test doubles for the write pipeline
use imprint_core::{DeviceSink, MountControl, ProgressState, UnmountOutput};
use std::io::{self, Read};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Something a collaborator was asked to do, in the order it happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Query,
    Unmount,
    Sink,
}

pub type Log = Arc<Mutex<Vec<Event>>>;

/// A mount table with a fixed answer and a fixed unmount diagnostic.
#[derive(Clone)]
pub struct FakeMount {
    pub log: Log,
    pub mounted: bool,
    pub stderr: String,
    pub query_error: Option<io::ErrorKind>,
}

impl FakeMount {
    pub fn new(log: &Log, mounted: bool, stderr: &str) -> Self {
        Self {
            log: log.clone(),
            mounted,
            stderr: stderr.to_string(),
            query_error: None,
        }
    }
}

impl MountControl for FakeMount {
    fn is_mounted(&self, _device: &Path) -> io::Result<bool> {
        self.log.lock().unwrap().push(Event::Query);
        match self.query_error {
            Some(kind) => Err(io::Error::new(kind, "device unreachable")),
            None => Ok(self.mounted),
        }
    }

    fn unmount(&self, _device: &Path) -> io::Result<UnmountOutput> {
        self.log.lock().unwrap().push(Event::Unmount);
        Ok(UnmountOutput {
            stdout: String::new(),
            stderr: self.stderr.clone(),
        })
    }
}

/// A device that keeps everything written to it in memory.
#[derive(Clone)]
pub struct MemoryDevice {
    pub log: Log,
    pub received: Arc<Mutex<Vec<u8>>>,
}

impl MemoryDevice {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            received: Arc::default(),
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.received.lock().unwrap().clone()
    }
}

impl DeviceSink for MemoryDevice {
    fn write_stream(&self, _device: &Path, source: &mut dyn Read) -> io::Result<u64> {
        self.log.lock().unwrap().push(Event::Sink);
        let mut buf = Vec::new();
        let n = io::copy(source, &mut buf)?;
        self.received.lock().unwrap().extend_from_slice(&buf);
        Ok(n)
    }
}

pub fn events(log: &Log) -> Vec<Event> {
    log.lock().unwrap().clone()
}

/// Collects every snapshot handed to a progress callback.
pub fn progress_recorder() -> (
    Arc<Mutex<Vec<ProgressState>>>,
    impl FnMut(&ProgressState) + Send + 'static,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |state: &ProgressState| {
        sink.lock().unwrap().push(state.clone())
    })
}

/// Generate deterministic test data of a given size
pub fn create_test_data(size: usize) -> Vec<u8> {
    let pattern = b"IMGDATA!";
    (0..size).map(|i| pattern[i % pattern.len()]).collect()
}
