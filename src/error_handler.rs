//! # Predefined Error Handlers
//!
//! Router-side errors never propagate to producers; they are
//! delivered to a single configured handler function. This module ships
//! write-to-stderr, silent, channel-forwarding, multi-fanout, and
//! severity-threshold-wrapper handlers, each a plain function object behind
//! a swappable `Arc<dyn Fn(EngineError)>`.

use crate::error::{EngineError, Severity};
use crossbeam_channel::Sender;
use once_cell::sync::OnceCell;
use std::sync::Arc;

pub type ErrorHandler = Arc<dyn Fn(EngineError) + Send + Sync>;

static DIAGNOSTICS_INIT: OnceCell<()> = OnceCell::new();

/// Installs a process-wide `tracing_subscriber` for the engine's own
/// operational diagnostics. Idempotent — safe to call once per default handler construction
/// even across multiple [`crate::engine::Engine`] instances in one
/// process. Never touches the record hot path: only this handler's own
/// reporting goes through `tracing`.
fn ensure_diagnostics_subscriber() {
    DIAGNOSTICS_INIT.get_or_init(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .finish();
        // Another process-wide subscriber may already be installed by the
        // embedding application; that's not this handler's concern.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Reports each error via `tracing::error!`. The default handler.
pub fn stderr_handler() -> ErrorHandler {
    ensure_diagnostics_subscriber();
    Arc::new(|err: EngineError| {
        tracing::error!(kind = ?err.kind, destination = ?err.destination, "{err}");
    })
}

/// Discards every error. Useful for tests and for callers that only care
/// about the error counters in [`crate::metrics::Metrics`].
pub fn silent_handler() -> ErrorHandler {
    Arc::new(|_: EngineError| {})
}

/// Forwards each error onto a bounded channel, dropping on full rather than
/// blocking the router, with a fallback handler for the drop case.
pub fn channel_handler(tx: Sender<EngineError>, fallback: ErrorHandler) -> ErrorHandler {
    Arc::new(move |err: EngineError| {
        if tx.try_send(err.clone()).is_err() {
            fallback(err);
        }
    })
}

/// Runs every handler in `handlers` for each error.
pub fn fanout_handler(handlers: Vec<ErrorHandler>) -> ErrorHandler {
    Arc::new(move |err: EngineError| {
        for handler in &handlers {
            handler(err.clone());
        }
    })
}

/// Wraps `inner`, only invoking it for errors at or above `threshold`.
pub fn severity_threshold_handler(threshold: Severity, inner: ErrorHandler) -> ErrorHandler {
    Arc::new(move |err: EngineError| {
        if err.severity >= threshold {
            inner(err);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_error(severity: Severity) -> EngineError {
        EngineError::new(ErrorKind::WriteFailed, severity)
    }

    #[test]
    fn fanout_invokes_every_handler() {
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&count_a);
        let b = Arc::clone(&count_b);
        let handler = fanout_handler(vec![
            Arc::new(move |_| {
                a.fetch_add(1, Ordering::SeqCst);
            }),
            Arc::new(move |_| {
                b.fetch_add(1, Ordering::SeqCst);
            }),
        ]);
        handler(sample_error(Severity::Low));
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn severity_threshold_filters_low_severity() {
        let count = Arc::new(AtomicUsize::new(0));
        let inner_count = Arc::clone(&count);
        let handler = severity_threshold_handler(
            Severity::High,
            Arc::new(move |_| {
                inner_count.fetch_add(1, Ordering::SeqCst);
            }),
        );
        handler(sample_error(Severity::Low));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        handler(sample_error(Severity::Critical));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn channel_handler_falls_back_when_full() {
        let (tx, rx) = crossbeam_channel::bounded::<EngineError>(1);
        let fallback_count = Arc::new(AtomicUsize::new(0));
        let fc = Arc::clone(&fallback_count);
        let handler = channel_handler(
            tx,
            Arc::new(move |_| {
                fc.fetch_add(1, Ordering::SeqCst);
            }),
        );
        handler(sample_error(Severity::Low));
        handler(sample_error(Severity::Low));
        assert_eq!(rx.len(), 1);
        assert_eq!(fallback_count.load(Ordering::SeqCst), 1);
    }
}
