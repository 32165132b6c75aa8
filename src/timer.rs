//! # Timer Service
//!
//! Single shared background thread driving every destination's flush timer
//! plus the age-based cleanup ticker, rather than one OS timer per
//! destination, to keep overhead flat at thousands of destinations. A
//! plain polling loop at a fixed tick, which is adequate at the destination
//! counts this core targets and avoids pulling in a dedicated timer-wheel
//! crate.

use crate::compression::CompressionPool;
use crate::destination::Destination;
use crate::error::EngineError;
use crate::metrics::Metrics;
use crate::rotation;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(50);

type ErrorHandler = Arc<dyn Fn(EngineError) + Send + Sync>;

pub struct TimerService {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TimerService {
    pub fn start(
        destinations: Arc<RwLock<Vec<Arc<Destination>>>>,
        metrics: Arc<Metrics>,
        compression_pool: Arc<CompressionPool>,
        on_error: ErrorHandler,
        cleanup_interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            let mut last_cleanup = Instant::now();
            while !stop_clone.load(Ordering::Relaxed) {
                thread::sleep(TICK);
                for destination in destinations.read().iter() {
                    destination.flush_on_timer(&metrics, &compression_pool, &on_error);
                }
                if last_cleanup.elapsed() >= cleanup_interval {
                    last_cleanup = Instant::now();
                    run_cleanup(&destinations, &on_error);
                }
            }
        });
        TimerService {
            stop,
            handle: Some(handle),
        }
    }

    /// Stops the background thread. Idempotent: safe to call from
    /// `shutdown` and again from `close_all`.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_cleanup(destinations: &RwLock<Vec<Arc<Destination>>>, on_error: &ErrorHandler) {
    for destination in destinations.read().iter() {
        let Some(max_age) = destination.rotation_policy.max_age else {
            continue;
        };
        let Some(base_path) = destination.file_base_path() else {
            continue;
        };
        if let Err(e) = rotation::enforce_age(&base_path, max_age) {
            on_error(EngineError::rotate_failed(destination.name.clone(), e));
        }
    }
}
