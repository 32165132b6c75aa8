//! # logforge
//!
//! A high-throughput, multi-destination structured logging engine.
//!
//! The engine accepts formatted or structured records from many concurrent
//! producers, routes each one to every enabled destination, and manages the
//! lifecycle of each destination's on-disk artifacts: active file, rotated
//! siblings, compressed archives, and age-based cleanup — while keeping
//! producer-side latency low.
//!
//! ## Architecture
//!
//! - `pool`: size-tiered reusable buffers for formatting.
//! - `format`: the abstract `Formatter` contract plus `TextFormatter`/`JsonFormatter`.
//! - `sampler`: per-level rates, pattern rules, adaptive rate control, and
//!   user predicates that admit or drop a record before enqueue.
//! - `destination`: per-sink state — buffered writer, lock file, rotation
//!   counters, batch writer, enabled flag.
//! - `rotation` / `compression`: size/age-triggered rotation, bounded
//!   retention, and background gzip/zstd workers.
//! - `batch`: per-destination aggregation of small writes into bounded
//!   flushes.
//! - `router`: the single consumer thread draining the ingest channel.
//! - `timer`: the shared background thread driving flush timers and the
//!   cleanup ticker.
//! - `engine`: `Engine`/`EngineBuilder`, the lifecycle controller tying the
//!   above into the `running → draining → closed` protocol.
//! - `metrics`: atomic counters and a read-only snapshot API.
//! - `error` / `error_handler`: typed errors and the predefined handlers
//!   (stderr, silent, channel-forwarding, fanout, severity-threshold).
//! - `search`: ad-hoc pattern search over a destination's historical files.
//!
//! Out of scope (external collaborators, named only where they touch the
//! core): the fluent configuration *loader*, CLI tooling, the formatter
//! *registry*, non-file backends beyond the abstract [`sink::Sink`]
//! contract, plugin discovery, and context-propagation helpers beyond
//! [`value::Fields`].

pub mod batch;
pub mod colorization;
pub mod compression;
pub mod destination;
pub mod engine;
pub mod error;
pub mod error_handler;
pub mod format;
pub mod levels;
pub mod metrics;
pub mod pool;
pub mod record;
pub mod rotation;
mod router;
pub mod sampler;
pub mod search;
pub mod sink;
mod timer;
pub mod validation;
pub mod value;

pub use engine::{CancellationToken, DestinationBuilder, Engine, EngineBuilder, EnqueuePolicy};
pub use error::{EngineError, ErrorKind, ErrorSource, Result, Severity};
pub use levels::{Level, LevelFormat};
pub use metrics::{DropCause, MetricsSnapshot};
pub use record::{Location, Record};
pub use value::{Fields, Value};
