//! # Lifecycle Controller
//!
//! `Engine` ties every other module into one data flow:
//! producer → sampler → bounded ingest channel → router → per-destination
//! write pipeline. `EngineBuilder`/`DestinationBuilder` are the
//! configuration surface: a fluent builder returning `Result`.
//! `shutdown`/`close_all` implement the `running → draining → closed`
//! protocol, joining the router thread, the timer thread, and every
//! compression worker in turn.

use crate::batch::BatchPolicy;
use crate::compression::{CompressionJob, CompressionKind, CompressionPool};
use crate::error::{EngineError, ErrorKind, Severity};
use crate::error_handler::{self, ErrorHandler};
use crate::format::{Formatter, JsonFormatter, TextFormatter};
use crate::levels::Level;
use crate::metrics::{DropCause, Metrics, MetricsSnapshot};
use crate::record::{Location, Record};
use crate::rotation::RotationPolicy;
use crate::router::Router;
use crate::sampler::{Sampler, SamplerConfig};
use crate::sink::Sink;
use crate::timer::TimerService;
use crate::validation;
use crate::value::Fields;
use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How a full ingest channel is handled by a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueuePolicy {
    Block,
    DropNew,
    DropOldest,
}

impl Default for EnqueuePolicy {
    fn default() -> Self {
        EnqueuePolicy::Block
    }
}

/// A caller-supplied cancellation flag consulted by
/// [`Engine::log_with_context`].
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

const RUNNING: u8 = 0;
const DRAINING: u8 = 1;
const CLOSED: u8 = 2;

enum BackendSpec {
    File(PathBuf),
    Sink(Box<dyn Sink>),
}

/// One destination's full configuration, accumulated by a
/// [`DestinationBuilder`] and realized into a real [`crate::destination::Destination`]
/// at [`EngineBuilder::build`]/[`Engine::add_destination`] time.
pub struct DestinationBuilder {
    name: String,
    backend: BackendSpec,
    formatter: Arc<dyn Formatter>,
    rotation_policy: RotationPolicy,
    batch_policy: BatchPolicy,
    compression: Option<CompressionKind>,
}

impl DestinationBuilder {
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        DestinationBuilder {
            name: name.into(),
            backend: BackendSpec::File(path.into()),
            formatter: Arc::new(TextFormatter::new()),
            rotation_policy: RotationPolicy::default(),
            batch_policy: BatchPolicy::default(),
            compression: None,
        }
    }

    pub fn sink(name: impl Into<String>, sink: Box<dyn Sink>) -> Self {
        DestinationBuilder {
            name: name.into(),
            backend: BackendSpec::Sink(sink),
            formatter: Arc::new(TextFormatter::new()),
            rotation_policy: RotationPolicy::default(),
            batch_policy: BatchPolicy::default(),
            compression: None,
        }
    }

    pub fn formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn json(self) -> Self {
        self.formatter(Arc::new(JsonFormatter::new()))
    }

    pub fn max_size(mut self, bytes: u64) -> Self {
        self.rotation_policy.max_bytes = Some(bytes);
        self
    }

    pub fn max_files(mut self, n: usize) -> Self {
        self.rotation_policy.max_files = n;
        self
    }

    pub fn max_age(mut self, age: Duration) -> Self {
        self.rotation_policy.max_age = Some(age);
        self
    }

    pub fn compression(mut self, kind: CompressionKind, compress_min_age: usize) -> Self {
        self.compression = Some(kind);
        self.rotation_policy.compress_min_age = compress_min_age;
        self
    }

    pub fn batch_enabled(mut self, enabled: bool) -> Self {
        self.batch_policy.enabled = enabled;
        self
    }

    pub fn batch_max_bytes(mut self, n: usize) -> Self {
        self.batch_policy.max_bytes = n;
        self
    }

    pub fn batch_max_count(mut self, n: usize) -> Self {
        self.batch_policy.max_count = n;
        self
    }

    /// Sets the batch writer's flush interval: the single authoritative
    /// per-destination timer. An older "outer `flush_interval`" control some
    /// callers may expect is a deprecated alias that folds into this same
    /// field (see [`DestinationBuilder::legacy_flush_interval`]).
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.batch_policy.flush_interval = interval;
        self
    }

    /// Deprecated alias for [`DestinationBuilder::flush_interval`], kept
    /// only so configuration surfaces migrating off the outer/batch split
    /// have a one-line fix.
    #[deprecated(note = "use DestinationBuilder::flush_interval; the two controls are unified")]
    pub fn legacy_flush_interval(self, interval: Duration) -> Self {
        self.flush_interval(interval)
    }

    fn validate(&self) -> Result<(), EngineError> {
        validation::validate_retention(
            self.rotation_policy.max_files,
            self.rotation_policy.compress_min_age,
        )
    }
}

/// Fluent configuration surface for [`Engine`]: a single builder that
/// returns `Result` from each registration/build step.
pub struct EngineBuilder {
    min_level: Level,
    channel_size: usize,
    enqueue_policy: EnqueuePolicy,
    compress_workers: usize,
    cleanup_interval: Duration,
    on_error: Option<ErrorHandler>,
    sampler_config: SamplerConfig,
    include_trace: bool,
    destinations: Vec<DestinationBuilder>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        EngineBuilder {
            min_level: Level::Trace,
            channel_size: 1000,
            enqueue_policy: EnqueuePolicy::Block,
            compress_workers: 1,
            cleanup_interval: Duration::from_secs(60),
            on_error: None,
            sampler_config: SamplerConfig::default(),
            include_trace: false,
            destinations: Vec::new(),
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self.sampler_config.min_level = level;
        self
    }

    pub fn channel_size(mut self, size: usize) -> Self {
        self.channel_size = size.max(1);
        self
    }

    pub fn enqueue_policy(mut self, policy: EnqueuePolicy) -> Self {
        self.enqueue_policy = policy;
        self
    }

    pub fn compress_workers(mut self, n: usize) -> Self {
        self.compress_workers = n.max(1);
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn on_error(mut self, handler: ErrorHandler) -> Self {
        self.on_error = Some(handler);
        self
    }

    pub fn sampling(mut self, config: SamplerConfig) -> Self {
        self.sampler_config = config;
        self
    }

    pub fn include_trace(mut self, include: bool) -> Self {
        self.include_trace = include;
        self
    }

    pub fn add_destination(mut self, destination: DestinationBuilder) -> Self {
        self.destinations.push(destination);
        self
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        for destination in &self.destinations {
            destination.validate()?;
        }

        let initial_handler = self.on_error.unwrap_or_else(error_handler::stderr_handler);
        // Swappable at runtime via `Engine::set_error_handler`, stored
        // behind an atomic pointer. `on_error` below is a small stable
        // dispatcher that forwards through the swap, so the
        // router/timer/compression pool
        // only ever need to hold one `Arc<dyn Fn>` for their whole lifetime.
        let error_swap: Arc<ArcSwap<dyn Fn(EngineError) + Send + Sync>> =
            Arc::new(ArcSwap::new(initial_handler));
        let swap_for_dispatch = Arc::clone(&error_swap);
        let on_error: ErrorHandler = Arc::new(move |err: EngineError| {
            let handler = swap_for_dispatch.load();
            handler(err);
        });

        let metrics = Arc::new(Metrics::new(self.destinations.len()));
        let compression_pool = Arc::new(CompressionPool::new(
            self.compress_workers,
            Arc::clone(&metrics),
            Arc::clone(&on_error),
        ));

        let mut built = Vec::with_capacity(self.destinations.len());
        for (index, spec) in self.destinations.into_iter().enumerate() {
            metrics.register_destination(&spec.name);
            let destination = match spec.backend {
                BackendSpec::File(path) => crate::destination::Destination::new_file(
                    index,
                    spec.name.clone(),
                    &path,
                    spec.formatter,
                    spec.rotation_policy,
                    spec.batch_policy,
                    spec.compression,
                )
                .map_err(|e| e.with_destination(spec.name.clone()))?,
                BackendSpec::Sink(sink) => crate::destination::Destination::new_custom(
                    index,
                    spec.name.clone(),
                    sink,
                    spec.formatter,
                    spec.batch_policy,
                ),
            };
            built.push(Arc::new(destination));
        }

        let destinations = Arc::new(RwLock::new(built));
        let sampler = Arc::new(Sampler::new(self.sampler_config));
        let (tx, rx) = bounded::<Record>(self.channel_size);
        let rx_for_policy = rx.clone();

        let router = Router::start(
            rx,
            Arc::clone(&destinations),
            Arc::clone(&metrics),
            Arc::clone(&compression_pool),
            Arc::clone(&on_error),
        );
        let timer = TimerService::start(
            Arc::clone(&destinations),
            Arc::clone(&metrics),
            Arc::clone(&compression_pool),
            Arc::clone(&on_error),
            self.cleanup_interval,
        );

        Ok(Engine {
            destinations,
            tx: Mutex::new(Some(tx)),
            rx_for_policy,
            metrics,
            sampler,
            compression_pool,
            router: Mutex::new(Some(router)),
            timer: Mutex::new(Some(timer)),
            state: AtomicU8::new(RUNNING),
            enqueue_policy: self.enqueue_policy,
            on_error,
            error_swap,
            include_trace: self.include_trace,
        })
    }
}

/// The engine: owns the ingest channel, the router thread, the timer
/// service, the compression pool, and every registered destination,
/// their sinks, and their lock files exclusively.
pub struct Engine {
    destinations: Arc<RwLock<Vec<Arc<crate::destination::Destination>>>>,
    tx: Mutex<Option<Sender<Record>>>,
    rx_for_policy: Receiver<Record>,
    metrics: Arc<Metrics>,
    sampler: Arc<Sampler>,
    compression_pool: Arc<CompressionPool>,
    router: Mutex<Option<Router>>,
    timer: Mutex<Option<TimerService>>,
    state: AtomicU8,
    enqueue_policy: EnqueuePolicy,
    on_error: ErrorHandler,
    error_swap: Arc<ArcSwap<dyn Fn(EngineError) + Send + Sync>>,
    include_trace: bool,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Fire-and-forget producer entry point. Never returns
    /// an error; dropped records are only visible via `metrics()`.
    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>) {
        self.log_structured(level, message, Fields::new());
    }

    #[track_caller]
    pub fn log_structured(&self, level: Level, message: impl Into<String>, fields: Fields) {
        let caller = std::panic::Location::caller();
        let _ = self.admit_and_enqueue(level, message.into(), fields, caller, None);
    }

    /// Context-aware variant: fails fast with a `cancelled` error if
    /// `token` fires before the record is accepted, and with a `closed`
    /// error once the engine has begun draining.
    #[track_caller]
    pub fn log_with_context(
        &self,
        level: Level,
        message: impl Into<String>,
        fields: Fields,
        token: &CancellationToken,
    ) -> Result<(), EngineError> {
        if token.is_cancelled() {
            return Err(EngineError::cancelled());
        }
        let caller = std::panic::Location::caller();
        self.admit_and_enqueue(level, message.into(), fields, caller, Some(token))
    }

    fn admit_and_enqueue(
        &self,
        level: Level,
        message: String,
        fields: Fields,
        caller: &'static std::panic::Location<'static>,
        token: Option<&CancellationToken>,
    ) -> Result<(), EngineError> {
        if self.state.load(Ordering::Acquire) != RUNNING {
            return Err(EngineError::closed());
        }
        if !self.sampler.admit(level, &message, &fields, &self.metrics) {
            return Ok(());
        }
        self.metrics.record_ingest(level);

        let mut record = Record::with_fields(level, message, fields);
        if self.include_trace || level >= Level::Error {
            record.location = Some(Location {
                file: caller.file(),
                line: caller.line(),
            });
            if self.include_trace {
                record.stack_trace = Some(std::backtrace::Backtrace::force_capture().to_string());
            }
        }

        if let Some(token) = token {
            if token.is_cancelled() {
                return Err(EngineError::cancelled());
            }
        }

        self.enqueue(record)
    }

    fn enqueue(&self, record: Record) -> Result<(), EngineError> {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            self.metrics.record_drop(DropCause::ChannelFull);
            return Err(EngineError::closed());
        };
        match self.enqueue_policy {
            EnqueuePolicy::Block => {
                if tx.send(record).is_err() {
                    self.metrics.record_drop(DropCause::ChannelFull);
                }
            }
            EnqueuePolicy::DropNew => {
                if tx.try_send(record).is_err() {
                    self.metrics.record_drop(DropCause::ChannelFull);
                }
            }
            EnqueuePolicy::DropOldest => match tx.try_send(record) {
                Ok(()) => {}
                Err(TrySendError::Full(record)) => {
                    // The popped oldest record was already admitted and is
                    // now discarded to make room; count it the same as any
                    // other channel-full loss.
                    if self.rx_for_policy.try_recv().is_ok() {
                        self.metrics.record_drop(DropCause::ChannelFull);
                    }
                    if tx.try_send(record).is_err() {
                        self.metrics.record_drop(DropCause::ChannelFull);
                    }
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.metrics.record_drop(DropCause::ChannelFull);
                }
            },
        }
        Ok(())
    }

    /// Live ingest-channel utilization, `len(chan)/cap(chan)`.
    pub fn channel_utilization(&self) -> f64 {
        let guard = self.tx.lock();
        match guard.as_ref() {
            Some(tx) => {
                let capacity = tx.capacity().unwrap_or(1).max(1);
                tx.len() as f64 / capacity as f64
            }
            None => 0.0,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Swaps the error handler at runtime, stored behind an atomic pointer.
    /// Takes effect for the next error the router, timer, or
    /// compression pool delivers; in-flight deliveries still see the old
    /// handler.
    pub fn set_error_handler(&self, handler: ErrorHandler) {
        self.error_swap.store(handler);
    }

    /// Enables or disables a registered destination by its stable index.
    pub fn set_destination_enabled(&self, index: usize, enabled: bool) -> Result<(), EngineError> {
        let destinations = self.destinations.read();
        let destination = destinations
            .get(index)
            .ok_or_else(|| EngineError::new(ErrorKind::InvalidIndex, Severity::Medium))?;
        destination.set_enabled(enabled);
        Ok(())
    }

    /// Searches one destination's active file plus its rotation set.
    pub fn search_destination(
        &self,
        index: usize,
        pattern: &str,
        options: &crate::search::SearchOptions,
    ) -> Result<Vec<crate::search::SearchResult>, EngineError> {
        let destinations = self.destinations.read();
        let destination = destinations
            .get(index)
            .ok_or_else(|| EngineError::new(ErrorKind::InvalidIndex, Severity::Medium))?;
        let base_path = destination
            .file_base_path()
            .ok_or_else(|| EngineError::invalid_config("destination is not file-backed"))?;
        crate::search::search_destination(&base_path, pattern, options)
            .map_err(|e| EngineError::invalid_config(e))
    }

    /// Manually enqueues a file for compression, bypassing the rotation
    /// trigger (used by callers that rotate externally).
    pub fn compress_path(&self, destination_name: impl Into<String>, path: PathBuf, kind: CompressionKind) -> bool {
        self.compression_pool.enqueue(CompressionJob {
            path,
            destination: destination_name.into(),
            kind,
        })
    }

    /// Graceful shutdown: drains the ingest channel, stops
    /// timers, waits for outstanding compression, then flushes and closes
    /// every destination. Idempotent — a second call returns immediately.
    pub fn shutdown(&self, deadline: Duration) -> Result<(), EngineError> {
        let start = Instant::now();
        match self
            .state
            .compare_exchange(RUNNING, DRAINING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(CLOSED) => return Ok(()),
            Err(_) => {
                // Another thread is already draining; wait for it to finish.
                while self.state.load(Ordering::Acquire) != CLOSED {
                    if start.elapsed() >= deadline {
                        return Err(EngineError::shutdown_timeout());
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                return Ok(());
            }
        }

        // Step 2: close the ingest channel so the router drains to completion.
        self.tx.lock().take();

        // Step 3: wait for the router to finish draining, bounded.
        let remaining = deadline.saturating_sub(start.elapsed());
        let drained = match self.router.lock().as_mut() {
            Some(router) => router.wait_drained(remaining),
            None => true,
        };

        // Step 4: stop flush timers and the cleanup ticker.
        self.timer.lock().take();

        // Step 5: close compression input and wait for outstanding jobs.
        let remaining = deadline.saturating_sub(start.elapsed());
        let compression_done = self.compression_pool.shutdown(remaining);

        // Step 6: flush and close every destination's batch writer, buffered
        // writer, and file/socket handle.
        for destination in self.destinations.read().iter() {
            destination.close(&self.metrics, &self.compression_pool, &self.on_error);
        }

        self.state.store(CLOSED, Ordering::Release);

        if !drained || !compression_done {
            return Err(EngineError::shutdown_timeout());
        }
        Ok(())
    }

    /// Forceful close: skips the drain wait and closes
    /// everything immediately. Records still in the channel are abandoned.
    pub fn close_all(&self) {
        self.state.store(CLOSED, Ordering::Release);
        self.tx.lock().take();
        self.router.lock().take();
        self.timer.lock().take();
        self.compression_pool.shutdown(Duration::from_millis(0));
        for destination in self.destinations.read().iter() {
            destination.close(&self.metrics, &self.compression_pool, &self.on_error);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.state.load(Ordering::Acquire) != CLOSED {
            self.close_all();
        }
    }
}
