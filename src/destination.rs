//! # Destination
//!
//! Per-sink state: buffered writer, lock file, rotation counters, batch
//! writer, enabled flag. A size-triggered rotation path that also drives the
//! retention scan and the background compression queue, with a batch-writer
//! integration sitting in front of the actual file write.

use crate::batch::{BatchPolicy, BatchState};
use crate::compression::{CompressionJob, CompressionKind, CompressionPool};
use crate::error::{EngineError, ErrorSource};
use crate::format::Formatter;
use crate::metrics::Metrics;
use crate::rotation::{self, RotationPolicy};
use crate::sink::Sink;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// §7 lock-acquisition retry policy: 3 attempts, base 10ms, doubling.
const LOCK_RETRY_ATTEMPTS: u32 = 3;
const LOCK_RETRY_BASE: Duration = Duration::from_millis(10);

type ErrorHandler = Arc<dyn Fn(EngineError) + Send + Sync>;

/// Zero-byte sibling of the active file, advisory-held for the duration of
/// each write burst.
///
/// Without a `fs2`/`fd-lock`-style crate in the dependency stack,
/// cross-process mutual exclusion is not actually enforced by this file; it
/// exists as the documented on-disk artifact, while in-process exclusion is
/// provided by the [`Destination`]'s own mutex. Recorded as an accepted
/// simplification.
#[allow(dead_code)]
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Retries lock-file creation up to [`LOCK_RETRY_ATTEMPTS`] times with an
    /// exponentially doubling backoff starting at [`LOCK_RETRY_BASE`], per the
    /// recovery policy for lock-acquisition failures. Only the last attempt's
    /// error is reported.
    fn touch_with_retry(base: &Path) -> Result<Self, EngineError> {
        let path = PathBuf::from(format!("{}.lock", base.display()));
        let mut delay = LOCK_RETRY_BASE;
        let mut last_err = None;
        for attempt in 0..LOCK_RETRY_ATTEMPTS {
            match OpenOptions::new().create(true).write(true).open(&path) {
                Ok(_) => return Ok(LockFile { path }),
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 < LOCK_RETRY_ATTEMPTS {
                        std::thread::sleep(delay);
                        delay *= 2;
                    }
                }
            }
        }
        Err(EngineError::lock_failed(
            base.display().to_string(),
            last_err.expect("loop runs at least once"),
        ))
    }
}

/// The open file, buffered writer, and rotation bookkeeping for a
/// file-backed destination.
pub struct FileBackend {
    base_path: PathBuf,
    writer: BufWriter<File>,
    current_size: u64,
    _lock: LockFile,
    rotation_last_ms: AtomicU64,
    rotation_sequence: AtomicU64,
}

impl FileBackend {
    pub fn open(base_path: &Path) -> Result<Self, EngineError> {
        let open_io = || -> io::Result<(File, u64)> {
            if let Some(parent) = base_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(base_path)?;
            let current_size = file.metadata()?.len();
            Ok((file, current_size))
        };
        let (file, current_size) = open_io().map_err(EngineError::invalid_config)?;
        let lock = LockFile::touch_with_retry(base_path)?;
        Ok(FileBackend {
            base_path: base_path.to_path_buf(),
            writer: BufWriter::new(file),
            current_size,
            _lock: lock,
            rotation_last_ms: AtomicU64::new(0),
            rotation_sequence: AtomicU64::new(0),
        })
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.current_size += bytes.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Performs one rotation: flush, close, rename
    /// to a collision-free suffix, reopen at `base_path`. Returns the
    /// rotated sibling's path.
    fn rotate(&mut self) -> io::Result<PathBuf> {
        self.flush()?;
        let suffix = rotation::rotation_suffix(&self.rotation_last_ms, &self.rotation_sequence);
        let rotated = rotation::rotated_path(&self.base_path, &suffix);
        fs::rename(&self.base_path, &rotated)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.base_path)?;
        self.writer = BufWriter::new(file);
        self.current_size = 0;
        Ok(rotated)
    }
}

enum Backend {
    File(FileBackend),
    Custom(Box<dyn Sink>),
}

struct DestinationInner {
    backend: Backend,
    batch: BatchState,
}

/// One registered sink plus every policy governing how records reach it.
pub struct Destination {
    pub index: usize,
    pub name: String,
    pub enabled: AtomicBool,
    pub formatter: Arc<dyn Formatter>,
    pub rotation_policy: RotationPolicy,
    pub batch_policy: BatchPolicy,
    pub compression: Option<CompressionKind>,
    inner: Mutex<DestinationInner>,
}

impl Destination {
    pub fn new_file(
        index: usize,
        name: impl Into<String>,
        path: &Path,
        formatter: Arc<dyn Formatter>,
        rotation_policy: RotationPolicy,
        batch_policy: BatchPolicy,
        compression: Option<CompressionKind>,
    ) -> Result<Self, EngineError> {
        let backend = FileBackend::open(path)?;
        Ok(Destination {
            index,
            name: name.into(),
            enabled: AtomicBool::new(true),
            formatter,
            rotation_policy,
            batch_policy,
            compression,
            inner: Mutex::new(DestinationInner {
                backend: Backend::File(backend),
                batch: BatchState::new(),
            }),
        })
    }

    pub fn new_custom(
        index: usize,
        name: impl Into<String>,
        sink: Box<dyn Sink>,
        formatter: Arc<dyn Formatter>,
        batch_policy: BatchPolicy,
    ) -> Self {
        Destination {
            index,
            name: name.into(),
            enabled: AtomicBool::new(true),
            formatter,
            rotation_policy: RotationPolicy::default(),
            batch_policy,
            compression: None,
            inner: Mutex::new(DestinationInner {
                backend: Backend::Custom(sink),
                batch: BatchState::new(),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// The active file path, for destinations backed by a file. `None` for
    /// custom sinks, which have no age-cleanup concept here.
    pub fn file_base_path(&self) -> Option<PathBuf> {
        match &self.inner.lock().backend {
            Backend::File(backend) => Some(backend.base_path.clone()),
            Backend::Custom(_) => None,
        }
    }

    /// Writes one formatted record to this destination, handling rotation
    /// and batching. Never returns an error to the caller; failures go to
    /// `metrics` and `on_error` instead.
    pub fn write_record(
        &self,
        bytes: &[u8],
        metrics: &Metrics,
        compression_pool: &CompressionPool,
        on_error: &ErrorHandler,
    ) {
        let mut inner = self.inner.lock();
        if self.batch_policy.enabled {
            inner.batch.append(bytes);
            if inner.batch.threshold_crossed(&self.batch_policy) {
                self.emit_batch(&mut inner, metrics, compression_pool, on_error);
            }
            return;
        }
        self.emit_direct(&mut inner, bytes, metrics, compression_pool, on_error);
    }

    /// Called by the shared timer service when this destination's flush
    /// interval elapses.
    pub fn flush_on_timer(
        &self,
        metrics: &Metrics,
        compression_pool: &CompressionPool,
        on_error: &ErrorHandler,
    ) {
        if !self.batch_policy.enabled {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.batch.interval_elapsed(&self.batch_policy) {
            self.emit_batch(&mut inner, metrics, compression_pool, on_error);
        }
    }

    fn emit_batch(
        &self,
        inner: &mut DestinationInner,
        metrics: &Metrics,
        compression_pool: &CompressionPool,
        on_error: &ErrorHandler,
    ) {
        if let Some(bytes) = inner.batch.take() {
            self.emit_direct(inner, &bytes, metrics, compression_pool, on_error);
        }
    }

    fn emit_direct(
        &self,
        inner: &mut DestinationInner,
        bytes: &[u8],
        metrics: &Metrics,
        compression_pool: &CompressionPool,
        on_error: &ErrorHandler,
    ) {
        match &mut inner.backend {
            Backend::File(backend) => {
                if let Some(max_bytes) = self.rotation_policy.max_bytes {
                    if backend.current_size + bytes.len() as u64 > max_bytes {
                        self.rotate_file(backend, metrics, compression_pool, on_error);
                    }
                }
                if let Err(e) = backend.write_bytes(bytes) {
                    metrics.record_error(&self.name, ErrorSource::Write);
                    on_error(EngineError::write_failed(self.name.clone(), e));
                    return;
                }
                if let Err(e) = backend.flush() {
                    metrics.record_error(&self.name, ErrorSource::Flush);
                    on_error(EngineError::flush_failed(self.name.clone(), e));
                    return;
                }
                metrics.record_write(&self.name, bytes.len() as u64);
            }
            Backend::Custom(sink) => {
                if let Err(e) = sink.write(bytes) {
                    metrics.record_error(&self.name, ErrorSource::Write);
                    on_error(EngineError::write_failed(self.name.clone(), e));
                    return;
                }
                if let Err(e) = sink.flush() {
                    metrics.record_error(&self.name, ErrorSource::Flush);
                    on_error(EngineError::flush_failed(self.name.clone(), e));
                    return;
                }
                metrics.record_write(&self.name, bytes.len() as u64);
            }
        }
    }

    /// Performs a size-triggered rotation, then retention and
    /// compression-candidate enqueueing. Rotation
    /// failure does not abort the write: an inline marker is appended and
    /// the write continues on the still-active (unrotated) file.
    fn rotate_file(
        &self,
        backend: &mut FileBackend,
        metrics: &Metrics,
        compression_pool: &CompressionPool,
        on_error: &ErrorHandler,
    ) {
        match backend.rotate() {
            Ok(rotated) => {
                metrics.record_rotation(&self.name);
                self.enforce_retention_and_compression(&backend.base_path, &rotated, compression_pool, metrics, on_error);
            }
            Err(e) => {
                metrics.record_error(&self.name, ErrorSource::Rotate);
                on_error(EngineError::rotate_failed(self.name.clone(), e));
                let _ = backend.write_bytes(b"[rotation-failed]\n");
            }
        }
    }

    fn enforce_retention_and_compression(
        &self,
        base_path: &Path,
        _just_rotated: &Path,
        compression_pool: &CompressionPool,
        metrics: &Metrics,
        on_error: &ErrorHandler,
    ) {
        if let Err(e) = rotation::enforce_retention(base_path, self.rotation_policy.max_files) {
            on_error(EngineError::rotate_failed(self.name.clone(), e));
        }
        if self.rotation_policy.compress_min_age == 0 {
            return;
        }
        let Some(kind) = self.compression else {
            return;
        };
        match rotation::compression_candidates(base_path, self.rotation_policy.compress_min_age) {
            Ok(candidates) => {
                for path in candidates {
                    let job = CompressionJob {
                        path,
                        destination: self.name.clone(),
                        kind,
                    };
                    if !compression_pool.enqueue(job) {
                        metrics.record_error(&self.name, ErrorSource::Compress);
                    }
                }
            }
            Err(e) => on_error(EngineError::compress_failed(self.name.clone(), e)),
        }
    }

    /// Flushes and closes this destination's sink:
    /// batch writer, then buffered writer, then the file/socket handle.
    pub fn close(&self, metrics: &Metrics, compression_pool: &CompressionPool, on_error: &ErrorHandler) {
        let mut inner = self.inner.lock();
        self.emit_batch(&mut inner, metrics, compression_pool, on_error);
        match &mut inner.backend {
            Backend::File(backend) => {
                let _ = backend.flush();
            }
            Backend::Custom(sink) => {
                let _ = sink.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::TextFormatter;
    use tempfile::tempdir;

    fn handler() -> ErrorHandler {
        Arc::new(|_| {})
    }

    #[test]
    fn writes_plain_bytes_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.log");
        let metrics = Metrics::new(1);
        metrics.register_destination("a");
        let compression_pool = CompressionPool::new(1, Arc::new(Metrics::new(1)), Arc::new(|_| {}));
        let destination = Destination::new_file(
            0,
            "a",
            &path,
            Arc::new(TextFormatter::new()),
            RotationPolicy::default(),
            BatchPolicy::default(),
            None,
        )
        .unwrap();
        destination.write_record(b"hello\n", &metrics, &compression_pool, &handler());
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "hello\n");
    }

    #[test]
    fn rotates_when_size_threshold_crossed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.log");
        let metrics = Metrics::new(1);
        metrics.register_destination("a");
        let compression_pool = CompressionPool::new(1, Arc::new(Metrics::new(1)), Arc::new(|_| {}));
        let mut rotation_policy = RotationPolicy::default();
        rotation_policy.max_bytes = Some(10);
        rotation_policy.max_files = 5;
        let destination = Destination::new_file(
            0,
            "a",
            &path,
            Arc::new(TextFormatter::new()),
            rotation_policy,
            BatchPolicy::default(),
            None,
        )
        .unwrap();
        for _ in 0..5 {
            destination.write_record(b"0123456789", &metrics, &compression_pool, &handler());
        }
        let siblings = rotation::list_siblings(&path).unwrap();
        assert!(!siblings.is_empty());
    }

    #[test]
    fn batches_until_threshold() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.log");
        let metrics = Metrics::new(1);
        metrics.register_destination("a");
        let compression_pool = CompressionPool::new(1, Arc::new(Metrics::new(1)), Arc::new(|_| {}));
        let batch_policy = BatchPolicy {
            enabled: true,
            max_bytes: 5,
            max_count: 1000,
            flush_interval: std::time::Duration::from_secs(60),
        };
        let destination = Destination::new_file(
            0,
            "a",
            &path,
            Arc::new(TextFormatter::new()),
            RotationPolicy::default(),
            batch_policy,
            None,
        )
        .unwrap();
        destination.write_record(b"ab", &metrics, &compression_pool, &handler());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        destination.write_record(b"cdefg", &metrics, &compression_pool, &handler());
        assert_eq!(fs::read_to_string(&path).unwrap(), "abcdefg");
    }
}
