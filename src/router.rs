//! # Record Router / Worker
//!
//! Exactly one consumer thread per engine, draining the ingest channel and
//! dispatching to every enabled destination: read-locks the destination
//! list and fans out each record to all of them.

use crate::compression::CompressionPool;
use crate::destination::Destination;
use crate::error::EngineError;
use crate::metrics::Metrics;
use crate::pool::BufferPool;
use crate::record::Record;
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type ErrorHandler = Arc<dyn Fn(EngineError) + Send + Sync>;

pub struct Router {
    done: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Router {
    pub fn start(
        rx: Receiver<Record>,
        destinations: Arc<RwLock<Vec<Arc<Destination>>>>,
        metrics: Arc<Metrics>,
        compression_pool: Arc<CompressionPool>,
        on_error: ErrorHandler,
    ) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let done_clone = Arc::clone(&done);
        let handle = thread::spawn(move || {
            // One formatting scratch buffer, recycled through the buffer
            // pool across records and destinations rather than allocated
            // fresh per `format()` call.
            let pool = BufferPool::new();
            while let Ok(record) = rx.recv() {
                let mut buf = pool.acquire(128);
                for destination in destinations.read().iter() {
                    if !destination.is_enabled() {
                        continue;
                    }
                    destination.formatter.format_into(&record, &mut buf);
                    destination.write_record(&buf, &metrics, &compression_pool, &on_error);
                }
                pool.release(buf);
            }
            done_clone.store(true, Ordering::SeqCst);
        });
        Router {
            done,
            handle: Some(handle),
        }
    }

    /// Waits for the router to finish draining, bounded by `deadline`
    ///. Returns `false` if the deadline elapsed first
    /// — the router thread is left running and will finish on its own.
    pub fn wait_drained(&mut self, deadline: Duration) -> bool {
        let start = Instant::now();
        while !self.done.load(Ordering::SeqCst) {
            if start.elapsed() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        true
    }
}
