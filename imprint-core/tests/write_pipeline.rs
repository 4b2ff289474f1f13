// Integration tests for the unmount -> size -> copy pipeline

mod common;

use common::{Event, FakeMount, Log, MemoryDevice, create_test_data, events, progress_recorder};
use imprint_core::{MountError, RawDevice, UnmountPolicy, WriteError, WriteRequest, Writer};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use tempfile::TempDir;

const DEVICE: &str = "/dev/x";

/// Writes `size` bytes of test data to `img.bin` in a fresh temp dir.
fn image_of(size: usize) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("img.bin");
    fs::write(&image, create_test_data(size)).unwrap();
    (dir, image)
}

fn fake_writer(
    log: &Log,
    mounted: bool,
    stderr: &str,
) -> (Writer<FakeMount, MemoryDevice>, MemoryDevice) {
    let device = MemoryDevice::new(log);
    (Writer::new(FakeMount::new(log, mounted, stderr), device.clone()), device)
}

#[test]
fn unmounted_device_receives_image_with_progress() {
    let (_dir, image) = image_of(1024);
    let log = Log::default();
    let (writer, device) = fake_writer(&log, false, "");
    let (seen, on_progress) = progress_recorder();

    writer
        .write(WriteRequest::new(DEVICE, &image).on_progress(on_progress))
        .unwrap();

    assert_eq!(events(&log), vec![Event::Query, Event::Sink]);
    assert_eq!(device.bytes(), create_test_data(1024));

    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    let last = seen.last().unwrap();
    assert_eq!(last.transferred, 1024);
    assert_eq!(last.total, 1024);
    assert_eq!(last.remaining, 0);
}

#[test]
fn mounted_device_is_unmounted_before_copy() {
    let (_dir, image) = image_of(1024);
    let log = Log::default();
    let (writer, device) = fake_writer(&log, true, "");

    writer.write(WriteRequest::new(DEVICE, &image)).unwrap();

    assert_eq!(events(&log), vec![Event::Query, Event::Unmount, Event::Sink]);
    assert_eq!(device.bytes().len(), 1024);
}

#[test]
fn unmount_diagnostics_abort_before_copy() {
    let (_dir, image) = image_of(1024);
    let log = Log::default();
    let (writer, device) = fake_writer(&log, true, "umount: /media/sd: target is busy.");

    let err = writer.write(WriteRequest::new(DEVICE, &image)).unwrap_err();

    match &err {
        WriteError::Mount(MountError::Diagnostics { diagnostics, .. }) => {
            assert_eq!(diagnostics, "umount: /media/sd: target is busy.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.to_string(), "umount: /media/sd: target is busy.");
    assert_eq!(events(&log), vec![Event::Query, Event::Unmount]);
    assert!(device.bytes().is_empty());
}

#[test]
fn unconditional_policy_always_unmounts() {
    let (_dir, image) = image_of(16);
    let log = Log::default();
    let (writer, _device) = fake_writer(&log, false, "");

    writer
        .write(WriteRequest::new(DEVICE, &image).unmount_policy(UnmountPolicy::Unconditional))
        .unwrap();

    assert_eq!(events(&log), vec![Event::Unmount, Event::Sink]);
}

#[test]
fn mount_query_failure_stops_the_write() {
    let (_dir, image) = image_of(16);
    let log = Log::default();
    let device = MemoryDevice::new(&log);
    let mut mount = FakeMount::new(&log, false, "");
    mount.query_error = Some(io::ErrorKind::NotFound);

    let err = Writer::new(mount, device.clone())
        .write(WriteRequest::new(DEVICE, &image))
        .unwrap_err();

    assert!(matches!(err, WriteError::Mount(MountError::Query { .. })));
    assert_eq!(events(&log), vec![Event::Query]);
}

#[test]
fn invalid_requests_fail_before_any_io() {
    let (_dir, image) = image_of(16);
    let cases = [
        (WriteRequest::new("", &image), "device"),
        (WriteRequest::new(DEVICE, ""), "image"),
        (WriteRequest::new(DEVICE, DEVICE), "image"),
        (
            WriteRequest::new(DEVICE, &image).progress_interval(Duration::ZERO),
            "progress_interval",
        ),
    ];

    for (request, field) in cases {
        let log = Log::default();
        let (writer, _device) = fake_writer(&log, true, "");
        let err = writer.write(request).unwrap_err();

        let name = match err {
            WriteError::MissingOption(name) | WriteError::InvalidOption { name, .. } => name,
            other => panic!("unexpected error: {other:?}"),
        };
        assert_eq!(name, field);
        assert!(events(&log).is_empty(), "collaborators touched for {field}");
    }
}

#[test]
fn empty_image_is_rejected() {
    let (_dir, image) = image_of(0);
    let log = Log::default();
    let (writer, device) = fake_writer(&log, false, "");

    let err = writer.write(WriteRequest::new(DEVICE, &image)).unwrap_err();

    assert!(matches!(err, WriteError::InvalidInput(ref p) if *p == image));
    assert!(!events(&log).contains(&Event::Sink));
    assert!(device.bytes().is_empty());
}

#[test]
fn missing_image_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("missing.img");
    let log = Log::default();
    let (writer, _device) = fake_writer(&log, false, "");

    let err = writer.write(WriteRequest::new(DEVICE, &image)).unwrap_err();

    assert!(matches!(err, WriteError::NotFound(ref p) if *p == image));
    assert!(!events(&log).contains(&Event::Sink));
}

#[test]
fn progress_is_monotonic_and_ends_at_total() {
    let size = 3 * 1024 * 1024 + 5;
    let (_dir, image) = image_of(size);
    let log = Log::default();
    let (writer, device) = fake_writer(&log, false, "");
    let (seen, on_progress) = progress_recorder();

    writer
        .write(
            WriteRequest::new(DEVICE, &image)
                .progress_interval(Duration::from_nanos(1))
                .on_progress(on_progress),
        )
        .unwrap();

    assert_eq!(device.bytes().len(), size);

    let seen = seen.lock().unwrap();
    assert!(seen.len() > 1);
    assert!(seen.windows(2).all(|w| w[0].transferred <= w[1].transferred));
    assert!(seen.iter().all(|s| s.total == size as u64));
    assert_eq!(seen.last().unwrap().transferred, size as u64);
    assert!((seen.last().unwrap().percentage - 100.0).abs() < f64::EPSILON);
}

#[test]
fn raw_device_is_overwritten_from_offset_zero() {
    let (dir, image) = image_of(1000);
    let disk = dir.path().join("disk");
    fs::write(&disk, vec![0xFFu8; 4096]).unwrap();
    let log = Log::default();

    Writer::new(FakeMount::new(&log, false, ""), RawDevice)
        .write(WriteRequest::new(&disk, &image))
        .unwrap();

    let contents = fs::read(&disk).unwrap();
    assert_eq!(contents.len(), 4096);
    assert_eq!(&contents[..1000], &create_test_data(1000)[..]);
    assert!(contents[1000..].iter().all(|b| *b == 0xFF));
}

#[test]
fn spawn_reports_outcome_exactly_once() {
    let (_dir, image) = image_of(1024);
    let log = Log::default();
    let (writer, device) = fake_writer(&log, true, "");
    let (tx, rx) = mpsc::channel();

    let handle = writer
        .spawn(WriteRequest::new(DEVICE, &image), move |outcome| {
            tx.send(outcome.is_ok()).unwrap();
        })
        .unwrap();
    handle.join().unwrap();

    assert!(rx.recv().unwrap());
    assert!(rx.try_recv().is_err());
    assert_eq!(device.bytes().len(), 1024);
}

#[test]
fn spawn_returns_validation_errors_synchronously() {
    let log = Log::default();
    let (writer, _device) = fake_writer(&log, false, "");
    let (tx, rx) = mpsc::channel::<bool>();

    let err = writer
        .spawn(WriteRequest::new(DEVICE, ""), move |outcome| {
            tx.send(outcome.is_ok()).unwrap();
        })
        .unwrap_err();

    assert!(matches!(err, WriteError::MissingOption("image")));
    assert!(rx.recv().is_err());
    assert!(events(&log).is_empty());
}
