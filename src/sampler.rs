//! # Sampler / Filter Stack
//!
//! Admit/drop decision layer evaluated once per candidate record before
//! enqueue, using `ahash` for the `consistent(p)` hash and `regex` for
//! pattern rules.

use crate::levels::Level;
use crate::metrics::Metrics;
use crate::value::Fields;
use ahash::AHasher;
use regex::Regex;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A single pattern rule evaluated in descending priority order.
pub struct PatternRule {
    pub name: String,
    pub pattern: Regex,
    pub priority: i32,
    pub rate: f64,
    /// If true, a match decides admission outright; otherwise the match is
    /// only recorded for metrics and evaluation continues.
    pub is_override: bool,
    /// Match against stringified field values as well as the message.
    pub match_fields: bool,
}

/// Configuration for the adaptive sampler.
#[derive(Debug, Clone)]
pub struct AdaptiveConfig {
    pub min_rate: f64,
    pub max_rate: f64,
    pub target_per_sec: f64,
    pub window: Duration,
    pub adjustment: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        AdaptiveConfig {
            min_rate: 0.01,
            max_rate: 1.0,
            target_per_sec: 100.0,
            window: Duration::from_secs(10),
            adjustment: 0.1,
        }
    }
}

struct AdaptiveState {
    config: AdaptiveConfig,
    current_rate: f64,
    window_start: Instant,
    window_count: u64,
}

impl AdaptiveState {
    fn new(config: AdaptiveConfig) -> Self {
        let current_rate = config.max_rate;
        AdaptiveState {
            config,
            current_rate,
            window_start: Instant::now(),
            window_count: 0,
        }
    }

    /// Records one candidate and returns the current admit probability,
    /// rolling the window and adjusting the rate when it elapses.
    fn draw_rate(&mut self) -> f64 {
        self.window_count += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= self.config.window {
            let observed = self.window_count as f64 / elapsed.as_secs_f64().max(1e-9);
            if observed > self.config.target_per_sec {
                let room = self.current_rate - self.config.min_rate;
                self.current_rate -= self.config.adjustment.min(room.max(0.0));
            } else if observed < 0.8 * self.config.target_per_sec {
                let room = self.config.max_rate - self.current_rate;
                self.current_rate += self.config.adjustment.min(room.max(0.0));
            }
            self.window_start = Instant::now();
            self.window_count = 0;
        }
        self.current_rate
    }
}

/// Token bucket used by `rate_limited(r)`.
struct TokenBucket {
    rate_per_sec: f64,
    burst: f64,
    tokens: Mutex<(f64, Instant)>,
}

impl TokenBucket {
    fn new(rate_per_sec: f64) -> Self {
        TokenBucket {
            rate_per_sec,
            burst: rate_per_sec.max(1.0),
            tokens: Mutex::new((rate_per_sec.max(1.0), Instant::now())),
        }
    }

    fn try_take(&self) -> bool {
        let mut guard = self.tokens.lock();
        let (tokens, last) = &mut *guard;
        let now = Instant::now();
        let elapsed = now.duration_since(*last).as_secs_f64();
        *tokens = (*tokens + elapsed * self.rate_per_sec).min(self.burst);
        *last = now;
        if *tokens >= 1.0 {
            *tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Rolling-window burst sampler.
struct BurstState {
    max_per_window: u64,
    window: Duration,
    window_start: Mutex<(Instant, u64)>,
}

impl BurstState {
    fn new(max_per_window: u64) -> Self {
        BurstState {
            max_per_window,
            window: Duration::from_secs(1),
            window_start: Mutex::new((Instant::now(), 0)),
        }
    }

    fn admit(&self) -> bool {
        let mut guard = self.window_start.lock();
        let (start, count) = &mut *guard;
        if start.elapsed() >= self.window {
            *start = Instant::now();
            *count = 0;
        }
        *count += 1;
        if *count <= self.max_per_window {
            true
        } else {
            // Beyond the cap, sample aggressively down to a floor of 1-in-10.
            *count % 10 == 0
        }
    }
}

/// The global admit/drop rule applied after level gate, predicates, pattern
/// rules, and per-level rate.
pub enum Strategy {
    None,
    Random(f64),
    Consistent(f64),
    Interval(u64),
    Adaptive(AdaptiveConfig),
    RateLimited(f64),
    Burst(u64),
}

type Predicate = Box<dyn Fn(Level, &str, &Fields) -> bool + Send + Sync>;

/// Per-instance sampler state.
pub struct Sampler {
    min_level: Level,
    predicates: Vec<Predicate>,
    pattern_rules: Vec<PatternRule>,
    level_rates: [Option<f64>; 6],
    strategy_kind: StrategyKind,
    interval_counter: AtomicU64,
    adaptive: Option<Mutex<AdaptiveState>>,
    adaptive_exempt: HashSet<Level>,
    rate_limiter: Option<TokenBucket>,
    burst: Option<BurstState>,
    random_rate: f64,
    consistent_rate: f64,
}

enum StrategyKind {
    None,
    Random,
    Consistent,
    Interval(u64),
    Adaptive,
    RateLimited,
    Burst,
}

/// Builder-style configuration consumed by [`Sampler::new`].
pub struct SamplerConfig {
    pub min_level: Level,
    pub predicates: Vec<Predicate>,
    pub pattern_rules: Vec<PatternRule>,
    pub level_rates: Vec<(Level, f64)>,
    pub strategy: Strategy,
    pub adaptive_exempt: Vec<Level>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            min_level: Level::Trace,
            predicates: Vec::new(),
            pattern_rules: Vec::new(),
            level_rates: Vec::new(),
            strategy: Strategy::None,
            adaptive_exempt: vec![Level::Warn, Level::Error, Level::Fatal],
        }
    }
}

impl Sampler {
    pub fn new(mut config: SamplerConfig) -> Self {
        config
            .pattern_rules
            .sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut level_rates = [None; 6];
        for (level, rate) in &config.level_rates {
            level_rates[level.index()] = Some(*rate);
        }

        let (strategy_kind, random_rate, consistent_rate, adaptive, rate_limiter, burst) =
            match config.strategy {
                Strategy::None => (StrategyKind::None, 0.0, 0.0, None, None, None),
                Strategy::Random(p) => (StrategyKind::Random, p, 0.0, None, None, None),
                Strategy::Consistent(p) => (StrategyKind::Consistent, 0.0, p, None, None, None),
                Strategy::Interval(n) => (StrategyKind::Interval(n.max(1)), 0.0, 0.0, None, None, None),
                Strategy::Adaptive(cfg) => (
                    StrategyKind::Adaptive,
                    0.0,
                    0.0,
                    Some(Mutex::new(AdaptiveState::new(cfg))),
                    None,
                    None,
                ),
                Strategy::RateLimited(r) => (
                    StrategyKind::RateLimited,
                    0.0,
                    0.0,
                    None,
                    Some(TokenBucket::new(r)),
                    None,
                ),
                Strategy::Burst(max) => (
                    StrategyKind::Burst,
                    0.0,
                    0.0,
                    None,
                    None,
                    Some(BurstState::new(max)),
                ),
            };

        Sampler {
            min_level: config.min_level,
            predicates: config.predicates,
            pattern_rules: config.pattern_rules,
            level_rates,
            strategy_kind,
            interval_counter: AtomicU64::new(0),
            adaptive,
            adaptive_exempt: config.adaptive_exempt.into_iter().collect(),
            rate_limiter,
            burst,
            random_rate,
            consistent_rate,
        }
    }

    /// Evaluates the full stack for one candidate record, level gate first,
    /// then rules, then the rate strategy, short-circuiting on reject.
    pub fn admit(&self, level: Level, message: &str, fields: &Fields, metrics: &Metrics) -> bool {
        metrics.sampler_total.fetch_add(1, Ordering::Relaxed);

        // 1. Level gate
        if level < self.min_level {
            metrics.record_filter_drop(level);
            return false;
        }

        // 2. User filter predicates (all must admit)
        for predicate in &self.predicates {
            if !predicate(level, message, fields) {
                metrics.record_filter_drop(level);
                return false;
            }
        }

        // 3. Pattern rules, descending priority, first match short-circuits
        for rule in &self.pattern_rules {
            let matched = rule.pattern.is_match(message)
                || (rule.match_fields
                    && fields
                        .iter()
                        .any(|(_, v)| rule.pattern.is_match(&v.to_string())));
            if matched {
                metrics.record_pattern_match(&rule.name);
                if rule.is_override {
                    let admitted = draw() < rule.rate;
                    if !admitted {
                        metrics.record_filter_drop(level);
                    } else {
                        metrics.sampler_sampled.fetch_add(1, Ordering::Relaxed);
                    }
                    return admitted;
                }
                break;
            }
        }

        // 4. Per-level rate
        if let Some(rate) = self.level_rates[level.index()] {
            if draw() >= rate {
                metrics.record_sampler_drop(level);
                return false;
            }
        }

        // 5. Global strategy
        let admitted = if self.adaptive.is_some() && self.adaptive_exempt.contains(&level) {
            true
        } else {
            match &self.strategy_kind {
                StrategyKind::None => true,
                StrategyKind::Random => draw() < self.random_rate,
                StrategyKind::Consistent => {
                    let h = consistent_hash(level, message, fields);
                    (h % 1000) as f64 / 1000.0 < self.consistent_rate
                }
                StrategyKind::Interval(n) => {
                    let count = self.interval_counter.fetch_add(1, Ordering::Relaxed) + 1;
                    count % n == 0
                }
                StrategyKind::Adaptive => {
                    let rate = self.adaptive.as_ref().unwrap().lock().draw_rate();
                    draw() < rate
                }
                StrategyKind::RateLimited => self.rate_limiter.as_ref().unwrap().try_take(),
                StrategyKind::Burst => self.burst.as_ref().unwrap().admit(),
            }
        };

        if admitted {
            metrics.sampler_sampled.fetch_add(1, Ordering::Relaxed);
        } else {
            metrics.record_sampler_drop(level);
        }
        admitted
    }
}

fn draw() -> f64 {
    rand::random::<f64>()
}

/// Non-cryptographic 32-bit-range hash over `(level, message, sorted
/// fields)`, stable across runs for identical input — the basis for the
/// `consistent(p)` strategy's deterministic admit/drop decision.
fn consistent_hash(level: Level, message: &str, fields: &Fields) -> u64 {
    let mut hasher = AHasher::default();
    level.hash(&mut hasher);
    message.hash(&mut hasher);
    for (k, v) in fields.sorted() {
        k.hash(&mut hasher);
        v.to_string().hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;

    #[test]
    fn level_gate_rejects_below_minimum() {
        let sampler = Sampler::new(SamplerConfig {
            min_level: Level::Warn,
            ..Default::default()
        });
        let metrics = Metrics::new(10);
        assert!(!sampler.admit(Level::Info, "x", &Fields::new(), &metrics));
        assert!(sampler.admit(Level::Error, "x", &Fields::new(), &metrics));
    }

    #[test]
    fn level_gate_and_predicate_rejects_count_as_filter_not_sampler() {
        let metrics = Metrics::new(10);

        let level_gate = Sampler::new(SamplerConfig {
            min_level: Level::Warn,
            ..Default::default()
        });
        assert!(!level_gate.admit(Level::Info, "x", &Fields::new(), &metrics));

        let predicate_rejects = Sampler::new(SamplerConfig {
            predicates: vec![Box::new(|_, msg: &str, _| msg != "noisy")],
            ..Default::default()
        });
        assert!(!predicate_rejects.admit(Level::Info, "noisy", &Fields::new(), &metrics));

        let snap = metrics.snapshot();
        assert_eq!(snap.dropped_filter, 2);
        assert_eq!(snap.dropped_sampler, 0);
    }

    #[test]
    fn global_strategy_rejects_count_as_sampler_not_filter() {
        let sampler = Sampler::new(SamplerConfig {
            strategy: Strategy::Random(0.0),
            ..Default::default()
        });
        let metrics = Metrics::new(10);
        assert!(!sampler.admit(Level::Info, "x", &Fields::new(), &metrics));
        let snap = metrics.snapshot();
        assert_eq!(snap.dropped_sampler, 1);
        assert_eq!(snap.dropped_filter, 0);
    }

    #[test]
    fn consistent_sampling_is_deterministic() {
        let sampler = Sampler::new(SamplerConfig {
            strategy: Strategy::Consistent(0.5),
            ..Default::default()
        });
        let metrics = Metrics::new(10);
        let mut fields = Fields::new();
        fields.insert("user_id", 42);
        let first = sampler.admit(Level::Info, "hello", &fields, &metrics);
        for _ in 0..100 {
            assert_eq!(
                sampler.admit(Level::Info, "hello", &fields, &metrics),
                first
            );
        }
    }

    #[test]
    fn interval_admits_every_nth() {
        let sampler = Sampler::new(SamplerConfig {
            strategy: Strategy::Interval(3),
            ..Default::default()
        });
        let metrics = Metrics::new(10);
        let decisions: Vec<bool> = (0..6)
            .map(|_| sampler.admit(Level::Info, "x", &Fields::new(), &metrics))
            .collect();
        assert_eq!(decisions, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn override_pattern_rule_short_circuits() {
        let sampler = Sampler::new(SamplerConfig {
            pattern_rules: vec![PatternRule {
                name: "noisy".into(),
                pattern: Regex::new("heartbeat").unwrap(),
                priority: 10,
                rate: 0.0,
                is_override: true,
                match_fields: false,
            }],
            ..Default::default()
        });
        let metrics = Metrics::new(10);
        assert!(!sampler.admit(Level::Info, "heartbeat ping", &Fields::new(), &metrics));
        assert!(sampler.admit(Level::Info, "other", &Fields::new(), &metrics));
        assert_eq!(metrics.snapshot().dropped_filter, 1);
        assert_eq!(metrics.snapshot().dropped_sampler, 0);
    }

    #[test]
    fn adaptive_exempts_configured_levels() {
        let sampler = Sampler::new(SamplerConfig {
            strategy: Strategy::Adaptive(AdaptiveConfig {
                min_rate: 0.0,
                max_rate: 0.0,
                ..Default::default()
            }),
            ..Default::default()
        });
        let metrics = Metrics::new(10);
        // max_rate 0.0 means random draws virtually never admit, but WARN/ERROR are exempt.
        assert!(sampler.admit(Level::Error, "x", &Fields::new(), &metrics));
    }
}
