//! # Compression Workers
//!
//! Background pool that gzips (or zstd-compresses) rotated sibling files,
//! in a worker-pool-over-a-bounded-channel shape generalized from a single
//! async writer thread to a configurable pool.

use crate::error::{EngineError, ErrorSource};
use crate::metrics::Metrics;
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    Gzip,
    Zstd,
}

pub struct CompressionJob {
    pub path: PathBuf,
    pub destination: String,
    pub kind: CompressionKind,
}

type ErrorHandler = Arc<dyn Fn(EngineError) + Send + Sync>;

pub struct CompressionPool {
    tx: Mutex<Option<Sender<CompressionJob>>>,
    pending: Arc<AtomicI64>,
}

impl CompressionPool {
    pub fn new(workers: usize, metrics: Arc<Metrics>, on_error: ErrorHandler) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = bounded::<CompressionJob>(4096);
        let pending = Arc::new(AtomicI64::new(0));

        for _ in 0..workers {
            let rx = rx.clone();
            let metrics = Arc::clone(&metrics);
            let on_error = Arc::clone(&on_error);
            let pending = Arc::clone(&pending);
            thread::spawn(move || {
                while let Ok(job) = rx.recv() {
                    let result = compress_file(&job.path, job.kind);
                    match result {
                        Ok(()) => metrics.record_compression(&job.destination),
                        Err(e) => {
                            metrics.record_error(&job.destination, ErrorSource::Compress);
                            on_error(
                                EngineError::compress_failed(job.destination.clone(), e)
                                    .with_source(ErrorSource::Compress),
                            );
                        }
                    }
                    pending.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }

        CompressionPool {
            tx: Mutex::new(Some(tx)),
            pending,
        }
    }

    /// Enqueues a file for background compression. Returns `false` (and
    /// leaves the file untouched, to be retried on the next rotation scan)
    /// if the queue is full or the pool has already been shut down.
    pub fn enqueue(&self, job: CompressionJob) -> bool {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return false;
        };
        self.pending.fetch_add(1, Ordering::SeqCst);
        if tx.try_send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Closes the input channel and waits, bounded by `deadline`, for
    /// outstanding jobs to finish. Returns `false` if
    /// the deadline elapsed with work still outstanding.
    pub fn shutdown(&self, deadline: Duration) -> bool {
        self.tx.lock().take();
        let start = Instant::now();
        while self.pending.load(Ordering::SeqCst) > 0 {
            if start.elapsed() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }
}

/// Opens `path`, streams it through a gzip or zstd encoder into
/// `<path>.gz`/`<path>.zst`, then atomically removes the source. On any
/// failure the partial compressed file is deleted and the
/// source is preserved.
fn compress_file(path: &PathBuf, kind: CompressionKind) -> io::Result<()> {
    let extension = match kind {
        CompressionKind::Gzip => "gz",
        CompressionKind::Zstd => "zst",
    };
    let dest_path = PathBuf::from(format!("{}.{extension}", path.display()));

    let result = (|| -> io::Result<()> {
        let source = File::open(path)?;
        let mut reader = BufReader::new(source);
        let dest_file = File::create(&dest_path)?;
        match kind {
            CompressionKind::Gzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(BufWriter::new(dest_file), flate2::Compression::default());
                io::copy(&mut reader, &mut encoder)?;
                encoder.finish()?;
            }
            CompressionKind::Zstd => {
                let mut encoder = zstd::stream::Encoder::new(BufWriter::new(dest_file), 0)?;
                io::copy(&mut reader, &mut encoder)?;
                encoder.finish()?;
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            fs::remove_file(path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&dest_path);
            Err(e)
        }
    }
}
