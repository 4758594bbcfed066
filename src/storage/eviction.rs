//! Eviction Policy
//!
//! A backstop against running out of off-heap memory. After every mutating
//! command the engine asks the [`Evictor`] whether usage crossed 90% of the
//! configured maximum; if so, a batch of victims is freed in one pass.
//!
//! ## volatile-random
//!
//! The only policy implemented. Shards are scanned one at a time, starting
//! from a rotating cursor, and scalar entries are picked until the estimate
//! of what would remain drops under the threshold. Keys with a TTL are
//! picked first; keys without one are only considered if the volatile keys
//! were not enough. Picking more victims than strictly necessary is fine.
//!
//! Victims are deleted under their shard's lock, and only if the entry still
//! carries the stamp seen during the scan. A key that was deleted or
//! overwritten in the meantime is skipped.

use crate::storage::engine::StorageEngine;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Fraction of `max_off_heap_size` at which eviction starts.
pub const EVICTION_THRESHOLD: f64 = 0.9;

/// Which entries may be evicted, and how they are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Never evict
    #[default]
    NoEviction,
    /// Random keys, preferring keys with a TTL
    VolatileRandom,
    /// Keys with the nearest deadline (not implemented)
    VolatileTtl,
    /// Least recently used keys with a TTL (not implemented)
    VolatileLru,
    /// Least frequently used keys with a TTL (not implemented)
    VolatileLfu,
    /// Random keys (not implemented)
    AllKeysRandom,
    /// Least recently used keys (not implemented)
    AllKeysLru,
    /// Least frequently used keys (not implemented)
    AllKeysLfu,
}

impl EvictionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::NoEviction => "noeviction",
            EvictionPolicy::VolatileRandom => "volatile-random",
            EvictionPolicy::VolatileTtl => "volatile-ttl",
            EvictionPolicy::VolatileLru => "volatile-lru",
            EvictionPolicy::VolatileLfu => "volatile-lfu",
            EvictionPolicy::AllKeysRandom => "allkeys-random",
            EvictionPolicy::AllKeysLru => "allkeys-lru",
            EvictionPolicy::AllKeysLfu => "allkeys-lfu",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "noeviction" => EvictionPolicy::NoEviction,
            "volatile-random" => EvictionPolicy::VolatileRandom,
            "volatile-ttl" => EvictionPolicy::VolatileTtl,
            "volatile-lru" => EvictionPolicy::VolatileLru,
            "volatile-lfu" => EvictionPolicy::VolatileLfu,
            "allkeys-random" => EvictionPolicy::AllKeysRandom,
            "allkeys-lru" => EvictionPolicy::AllKeysLru,
            "allkeys-lfu" => EvictionPolicy::AllKeysLfu,
            other => return Err(format!("unknown eviction policy '{}'", other)),
        })
    }
}

/// Eviction settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvictionConfig {
    pub policy: EvictionPolicy,
    /// Off-heap budget in bytes; 0 disables eviction
    pub max_off_heap_size: usize,
}

/// An entry picked during the scan phase.
#[derive(Debug)]
struct Victim {
    shard: usize,
    key: Bytes,
    stamp: u64,
}

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Keys actually deleted
    pub evicted: usize,
    /// Off-heap bytes released
    pub freed: usize,
}

/// Runs the configured eviction policy against an engine.
#[derive(Debug)]
pub struct Evictor {
    config: EvictionConfig,
    /// Shard the next scan starts from
    cursor: AtomicUsize,
    /// Set once an unimplemented policy has been reported
    warned: AtomicBool,
}

impl Evictor {
    pub fn new(config: EvictionConfig) -> Self {
        Self {
            config,
            cursor: AtomicUsize::new(0),
            warned: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EvictionConfig {
        &self.config
    }

    /// Usage level at which eviction starts.
    pub fn threshold(&self) -> usize {
        (self.config.max_off_heap_size as f64 * EVICTION_THRESHOLD) as usize
    }

    /// Evicts entries if off-heap usage is over the threshold.
    pub fn maybe_evict(&self, engine: &StorageEngine) -> EvictionReport {
        match self.config.policy {
            EvictionPolicy::NoEviction => EvictionReport::default(),
            EvictionPolicy::VolatileRandom => self.volatile_random(engine),
            policy => {
                if !self.warned.swap(true, Ordering::Relaxed) {
                    warn!(policy = %policy, "Eviction policy not implemented, nothing will be evicted");
                }
                EvictionReport::default()
            }
        }
    }

    fn volatile_random(&self, engine: &StorageEngine) -> EvictionReport {
        if self.config.max_off_heap_size == 0 {
            return EvictionReport::default();
        }

        let threshold = self.threshold();
        let used = engine.off_heap_used();
        if used < threshold {
            return EvictionReport::default();
        }

        let shards = engine.shard_count();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % shards;
        let mut remaining = used;
        let mut victims = Vec::new();

        // keys with a TTL first, then everything else
        for volatile in [true, false] {
            for i in 0..shards {
                if remaining < threshold {
                    break;
                }
                let shard = (start + i) % shards;
                engine.scan_shard(shard, |key, value, has_ttl| {
                    let size = value.off_heap_size();
                    if remaining < threshold || has_ttl != volatile || size == 0 {
                        return;
                    }
                    victims.push(Victim {
                        shard,
                        key: key.clone(),
                        stamp: value.stamp,
                    });
                    remaining = remaining.saturating_sub(size);
                });
            }
        }

        let mut report = EvictionReport::default();
        for victim in victims {
            if let Some(freed) = engine.evict_entry(victim.shard, &victim.key, victim.stamp) {
                debug!(key = %String::from_utf8_lossy(&victim.key), freed, "Key evicted");
                report.evicted += 1;
                report.freed += freed;
            }
        }

        info!(
            policy = %self.config.policy,
            evicted = report.evicted,
            freed = report.freed,
            used = engine.off_heap_used(),
            threshold,
            "Eviction pass finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::engine::EngineConfig;

    fn engine_with(policy: EvictionPolicy, max: usize) -> StorageEngine {
        StorageEngine::with_config(EngineConfig {
            shards: 8,
            eviction: EvictionConfig {
                policy,
                max_off_heap_size: max,
            },
        })
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "volatile-random".parse::<EvictionPolicy>(),
            Ok(EvictionPolicy::VolatileRandom)
        );
        assert_eq!(
            "NOEVICTION".parse::<EvictionPolicy>(),
            Ok(EvictionPolicy::NoEviction)
        );
        assert!("lru".parse::<EvictionPolicy>().is_err());
        assert_eq!(EvictionPolicy::AllKeysLfu.to_string(), "allkeys-lfu");
    }

    #[test]
    fn test_no_eviction_under_threshold() {
        // 10 values of 1 + 10 bytes each = 110 bytes, threshold = 900
        let engine = engine_with(EvictionPolicy::VolatileRandom, 1000);
        for i in 0..10 {
            engine.set(format!("key{}", i).into(), b"abcdefghij");
        }
        assert_eq!(engine.off_heap_used(), 110);
        assert_eq!(engine.len(), 10);
        assert_eq!(engine.stats().evicted, 0);
    }

    #[test]
    fn test_eviction_brings_usage_under_threshold() {
        let max = 1000;
        let engine = engine_with(EvictionPolicy::VolatileRandom, max);
        let threshold = (max as f64 * EVICTION_THRESHOLD) as usize;

        // every value takes 1 + 49 = 50 bytes
        let value = [b'v'; 49];
        for i in 0..40 {
            engine.set(format!("key{}", i).into(), &value);
            assert!(engine.off_heap_used() < threshold);
        }

        assert!(engine.stats().evicted > 0);
        assert!(engine.len() < 40);
    }

    #[test]
    fn test_volatile_keys_go_first() {
        let engine = engine_with(EvictionPolicy::NoEviction, 0);
        let evictor = Evictor::new(EvictionConfig {
            policy: EvictionPolicy::VolatileRandom,
            max_off_heap_size: 1000,
        });

        let value = [b'v'; 99];
        for i in 0..8 {
            engine.set(format!("persistent{}", i).into(), &value);
        }
        for i in 0..2 {
            let key = format!("volatile{}", i);
            engine.set(key.clone().into(), &value);
            engine.expire(key.as_bytes(), 60_000).unwrap();
        }
        assert_eq!(engine.off_heap_used(), 1000);

        // removing both volatile keys (200 bytes) is enough to get under 900
        let report = evictor.maybe_evict(&engine);
        assert_eq!(report.evicted, 2);
        assert_eq!(report.freed, 200);
        assert!(!engine.exists(b"volatile0"));
        assert!(!engine.exists(b"volatile1"));
        assert_eq!(engine.len(), 8);
    }

    #[test]
    fn test_falls_back_to_persistent_keys() {
        let engine = engine_with(EvictionPolicy::NoEviction, 0);
        let evictor = Evictor::new(EvictionConfig {
            policy: EvictionPolicy::VolatileRandom,
            max_off_heap_size: 1000,
        });

        let value = [b'v'; 99];
        for i in 0..10 {
            engine.set(format!("persistent{}", i).into(), &value);
        }

        let report = evictor.maybe_evict(&engine);
        assert!(report.evicted >= 2);
        assert!(engine.off_heap_used() < evictor.threshold());
    }

    #[test]
    fn test_repeated_invocations_make_progress() {
        let engine = engine_with(EvictionPolicy::NoEviction, 0);
        let evictor = Evictor::new(EvictionConfig {
            policy: EvictionPolicy::VolatileRandom,
            max_off_heap_size: 100,
        });

        for i in 0..50 {
            engine.set(format!("key{}", i).into(), b"abcdefghij");
        }

        evictor.maybe_evict(&engine);
        assert!(engine.off_heap_used() < evictor.threshold());

        // already under threshold: nothing more to do
        let report = evictor.maybe_evict(&engine);
        assert_eq!(report, EvictionReport::default());
    }

    #[test]
    fn test_collections_are_not_victims() {
        let engine = engine_with(EvictionPolicy::NoEviction, 0);
        let evictor = Evictor::new(EvictionConfig {
            policy: EvictionPolicy::VolatileRandom,
            max_off_heap_size: 10,
        });

        engine.push("list".into(), b"a").unwrap();
        engine.sadd("set".into(), 1).unwrap();
        engine.set("big".into(), b"abcdefghij");

        let report = evictor.maybe_evict(&engine);
        assert_eq!(report.evicted, 1);
        assert!(engine.exists(b"list"));
        assert!(engine.exists(b"set"));
    }

    #[test]
    fn test_unimplemented_policies_never_evict() {
        let engine = engine_with(EvictionPolicy::AllKeysLru, 10);
        for i in 0..10 {
            engine.set(format!("key{}", i).into(), b"abcdefghij");
        }
        assert_eq!(engine.len(), 10);
        assert_eq!(engine.stats().evicted, 0);
    }
}
