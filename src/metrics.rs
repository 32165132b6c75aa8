//! # Metrics
//!
//! Atomic counters updated on the hot path plus a read-snapshot API, using
//! plain atomics with `Ordering::Relaxed` for counters that are advisory
//! rather than safety-critical, extended with a `parking_lot::RwLock`-guarded
//! `AHashMap` for the open-ended per-destination and per-pattern-rule keys.

use crate::levels::Level;
use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Why a candidate record never reached a destination's write pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropCause {
    ChannelFull,
    Filter,
    Sampler,
}

/// Per-destination atomic counters, kept in a fixed-size slot assigned at
/// registration time.
#[derive(Default)]
pub struct DestinationCounters {
    pub bytes_written: AtomicU64,
    pub writes: AtomicU64,
    pub rotations: AtomicU64,
    pub compressions: AtomicU64,
    pub errors: AtomicU64,
}

impl DestinationCounters {
    fn snapshot(&self, name: String) -> DestinationSnapshot {
        DestinationSnapshot {
            name,
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            compressions: self.compressions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.bytes_written.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.rotations.store(0, Ordering::Relaxed);
        self.compressions.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }
}

/// Plain-data read-only view of one destination's counters, returned from a
/// [`Metrics`] snapshot. Never mutated by the reader.
#[derive(Debug, Clone)]
pub struct DestinationSnapshot {
    pub name: String,
    pub bytes_written: u64,
    pub writes: u64,
    pub rotations: u64,
    pub compressions: u64,
    pub errors: u64,
}

/// Plain-data snapshot of the engine's whole metrics surface.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_messages: u64,
    pub messages_by_level: [u64; 6],
    pub dropped_channel_full: u64,
    pub dropped_filter: u64,
    pub dropped_sampler: u64,
    pub sampler_total: u64,
    pub sampler_sampled: u64,
    pub errors_by_source: [u64; 5],
    pub destinations: Vec<DestinationSnapshot>,
    pub pattern_matches: Vec<(String, u64)>,
}

/// Atomic counters updated on the hot path, read via [`Metrics::snapshot`].
pub struct Metrics {
    total_messages: AtomicU64,
    messages_by_level: [AtomicU64; 6],
    dropped_channel_full: AtomicU64,
    dropped_filter: AtomicU64,
    dropped_sampler: AtomicU64,
    pub(crate) sampler_total: AtomicU64,
    pub(crate) sampler_sampled: AtomicU64,
    errors_by_source: [AtomicU64; 5],
    destinations: RwLock<AHashMap<String, DestinationCounters>>,
    pattern_matches: RwLock<AHashMap<String, AtomicU64>>,
}

impl Metrics {
    /// `destination_hint` pre-sizes the destination map; it is not a hard
    /// limit, destinations may still be registered later.
    pub fn new(destination_hint: usize) -> Self {
        Metrics {
            total_messages: AtomicU64::new(0),
            messages_by_level: Default::default(),
            dropped_channel_full: AtomicU64::new(0),
            dropped_filter: AtomicU64::new(0),
            dropped_sampler: AtomicU64::new(0),
            sampler_total: AtomicU64::new(0),
            sampler_sampled: AtomicU64::new(0),
            errors_by_source: Default::default(),
            destinations: RwLock::new(AHashMap::with_capacity(destination_hint)),
            pattern_matches: RwLock::new(AHashMap::new()),
        }
    }

    pub fn register_destination(&self, name: &str) {
        self.destinations
            .write()
            .entry(name.to_string())
            .or_default();
    }

    pub fn record_ingest(&self, level: Level) {
        self.total_messages.fetch_add(1, Ordering::Relaxed);
        self.messages_by_level[level.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self, cause: DropCause) {
        match cause {
            DropCause::ChannelFull => self.dropped_channel_full.fetch_add(1, Ordering::Relaxed),
            DropCause::Filter => self.dropped_filter.fetch_add(1, Ordering::Relaxed),
            DropCause::Sampler => self.dropped_sampler.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Level gate, user predicate, and pattern-rule rejects: the §4.2
    /// "filter" stages, as opposed to the rate-based sampler strategies.
    pub(crate) fn record_filter_drop(&self, _level: Level) {
        self.record_drop(DropCause::Filter);
    }

    pub(crate) fn record_sampler_drop(&self, _level: Level) {
        self.record_drop(DropCause::Sampler);
    }

    pub(crate) fn record_pattern_match(&self, name: &str) {
        let matches = self.pattern_matches.read();
        if let Some(counter) = matches.get(name) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        drop(matches);
        self.pattern_matches
            .write()
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self, destination: &str, bytes: u64) {
        let guard = self.destinations.read();
        if let Some(counters) = guard.get(destination) {
            counters.writes.fetch_add(1, Ordering::Relaxed);
            counters.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        }
    }

    pub fn record_rotation(&self, destination: &str) {
        if let Some(counters) = self.destinations.read().get(destination) {
            counters.rotations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_compression(&self, destination: &str) {
        if let Some(counters) = self.destinations.read().get(destination) {
            counters.compressions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_error(&self, destination: &str, source: crate::error::ErrorSource) {
        self.errors_by_source[source.index()].fetch_add(1, Ordering::Relaxed);
        if let Some(counters) = self.destinations.read().get(destination) {
            counters.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut messages_by_level = [0u64; 6];
        for (i, counter) in self.messages_by_level.iter().enumerate() {
            messages_by_level[i] = counter.load(Ordering::Relaxed);
        }
        let mut errors_by_source = [0u64; 5];
        for (i, counter) in self.errors_by_source.iter().enumerate() {
            errors_by_source[i] = counter.load(Ordering::Relaxed);
        }
        let destinations = self
            .destinations
            .read()
            .iter()
            .map(|(name, counters)| counters.snapshot(name.clone()))
            .collect();
        let pattern_matches = self
            .pattern_matches
            .read()
            .iter()
            .map(|(name, counter)| (name.clone(), counter.load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            total_messages: self.total_messages.load(Ordering::Relaxed),
            messages_by_level,
            dropped_channel_full: self.dropped_channel_full.load(Ordering::Relaxed),
            dropped_filter: self.dropped_filter.load(Ordering::Relaxed),
            dropped_sampler: self.dropped_sampler.load(Ordering::Relaxed),
            sampler_total: self.sampler_total.load(Ordering::Relaxed),
            sampler_sampled: self.sampler_sampled.load(Ordering::Relaxed),
            errors_by_source,
            destinations,
            pattern_matches,
        }
    }

    /// Zeros every counter. Safe concurrently with updates: each field is
    /// reset with an independent store, so a reader mid-snapshot may observe
    /// a transient mix of pre- and post-reset values, never invalid memory.
    pub fn reset(&self) {
        self.total_messages.store(0, Ordering::Relaxed);
        for counter in &self.messages_by_level {
            counter.store(0, Ordering::Relaxed);
        }
        self.dropped_channel_full.store(0, Ordering::Relaxed);
        self.dropped_filter.store(0, Ordering::Relaxed);
        self.dropped_sampler.store(0, Ordering::Relaxed);
        self.sampler_total.store(0, Ordering::Relaxed);
        self.sampler_sampled.store(0, Ordering::Relaxed);
        for counter in &self.errors_by_source {
            counter.store(0, Ordering::Relaxed);
        }
        for counters in self.destinations.read().values() {
            counters.reset();
        }
        for counter in self.pattern_matches.read().values() {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_ingest_and_level_breakdown() {
        let metrics = Metrics::new(1);
        metrics.record_ingest(Level::Info);
        metrics.record_ingest(Level::Error);
        let snap = metrics.snapshot();
        assert_eq!(snap.total_messages, 2);
        assert_eq!(snap.messages_by_level[Level::Info.index()], 1);
        assert_eq!(snap.messages_by_level[Level::Error.index()], 1);
    }

    #[test]
    fn per_destination_counters_are_isolated() {
        let metrics = Metrics::new(2);
        metrics.register_destination("a");
        metrics.register_destination("b");
        metrics.record_write("a", 100);
        metrics.record_write("a", 50);
        metrics.record_write("b", 10);
        let snap = metrics.snapshot();
        let a = snap.destinations.iter().find(|d| d.name == "a").unwrap();
        let b = snap.destinations.iter().find(|d| d.name == "b").unwrap();
        assert_eq!(a.writes, 2);
        assert_eq!(a.bytes_written, 150);
        assert_eq!(b.writes, 1);
        assert_eq!(b.bytes_written, 10);
    }

    #[test]
    fn reset_zeros_all_counters() {
        let metrics = Metrics::new(1);
        metrics.register_destination("a");
        metrics.record_ingest(Level::Warn);
        metrics.record_write("a", 10);
        metrics.record_drop(DropCause::Filter);
        metrics.reset();
        let snap = metrics.snapshot();
        assert_eq!(snap.total_messages, 0);
        assert_eq!(snap.dropped_filter, 0);
        assert_eq!(snap.destinations[0].writes, 0);
    }
}
