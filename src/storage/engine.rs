//! Sharded Key Space with Expiry and Eviction
//!
//! This module implements the core storage engine for EmberKV.
//! It maps keys to [`Value`]s across independently locked shards, resolves
//! TTLs lazily on access, and triggers eviction after every write.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, keys are spread over `N`
//!    shards by an FNV-1a hash. Each shard has its own `Mutex`.
//! 2. **Off-Heap Scalars**: Strings and integers live in regions mapped from
//!    the OS; the maps only hold handles to them.
//! 3. **Lazy Expiry**: Every access checks the key's deadline first and
//!    purges it if it has passed. The sweeper catches the rest.
//! 4. **Stamps**: Every stored value carries a generation number so that
//!    background passes can tell whether the entry they scanned is still the
//!    one in the map.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐            │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │            │
//! │  │ Mutex   │ │ Mutex   │ │ Mutex   │ │ Mutex   │            │
//! │  │ values  │ │ values  │ │ values  │ │ values  │            │
//! │  │ expires │ │ expires │ │ expires │ │ expires │            │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘            │
//! │                     │ regions                               │
//! │                     ▼                                       │
//! │               ┌───────────┐                                 │
//! │               │ Allocator │  (off-heap usage counter)       │
//! │               └───────────┘                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation holds its shard's lock for its whole duration, including
//! lazy expiry and any region it maps or unmaps. Nothing ever holds two
//! shard locks at once.

use crate::storage::alloc::{Allocator, Region};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::eviction::{EvictionConfig, Evictor};
use crate::storage::expiry::ExpiryConfig;
use crate::storage::intset::IntSet;
use crate::storage::quicklist::QuickList;
use crate::storage::scalar;
use crate::storage::value::{Object, Snapshot, Value};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

/// Default number of shards.
/// More shards = less lock contention, but more memory overhead.
pub const DEFAULT_SHARDS: usize = 64;

/// Engine settings.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Number of shards (at least 1)
    pub shards: usize,
    /// Eviction policy and off-heap budget
    pub eviction: EvictionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shards: DEFAULT_SHARDS,
            eviction: EvictionConfig::default(),
        }
    }
}

/// The maps guarded by one shard lock.
#[derive(Debug, Default)]
struct ShardData {
    /// Key to stored value
    values: HashMap<Bytes, Value>,
    /// Key to deadline in unix milliseconds; absent means no TTL
    expires: HashMap<Bytes, u64>,
}

impl ShardData {
    /// Purges `key` if its deadline has passed.
    ///
    /// Returns `true` if the key was expired and removed.
    fn purge_if_expired(&mut self, key: &[u8], now: u64) -> bool {
        match self.expires.get(key) {
            Some(&deadline) if now >= deadline => {
                self.expires.remove(key);
                self.values.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Removes a key and its TTL, returning the value (and its region) to drop.
    fn remove(&mut self, key: &[u8]) -> Option<Value> {
        self.expires.remove(key);
        self.values.remove(key)
    }
}

/// A single shard containing a portion of the key space.
#[derive(Debug, Default)]
struct Shard {
    data: Mutex<ShardData>,
}

impl Shard {
    /// Locks the shard.
    ///
    /// A panic while the lock was held cannot leave the maps half-updated,
    /// so a poisoned lock is simply taken over.
    #[inline]
    fn lock(&self) -> MutexGuard<'_, ShardData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The main storage engine for EmberKV.
///
/// This struct is designed to be wrapped in an `Arc` and shared across
/// all client handler tasks. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use emberkv::storage::{Snapshot, StorageEngine};
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
///
/// engine.set(Bytes::from("counter"), b"41");
/// assert_eq!(engine.incr(b"counter", 1), Ok(42));
///
/// engine.set(Bytes::from("name"), b"Ariz");
/// assert_eq!(engine.get(b"name"), Ok(Snapshot::Text(Bytes::from("Ariz"))));
/// ```
pub struct StorageEngine {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard>,

    /// Source of every scalar region
    allocator: Arc<Allocator>,

    /// Eviction policy run after writes
    evictor: Evictor,

    /// Next value stamp
    next_stamp: AtomicU64,

    /// Shard the next expiry sweep pass starts from
    sweep_cursor: AtomicUsize,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: total DEL operations
    del_count: AtomicU64,

    /// Statistics: number of expired keys purged (lazily or by the sweeper)
    expired_count: AtomicU64,

    /// Statistics: number of keys evicted
    evicted_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("off_heap_used", &self.allocator.used())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a new storage engine with default settings.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates a storage engine from explicit settings.
    pub fn with_config(config: EngineConfig) -> Self {
        let shards = (0..config.shards.max(1)).map(|_| Shard::default()).collect();

        Self {
            shards,
            allocator: Arc::new(Allocator::new()),
            evictor: Evictor::new(config.eviction),
            next_stamp: AtomicU64::new(1),
            sweep_cursor: AtomicUsize::new(0),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
            evicted_count: AtomicU64::new(0),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        (fnv1a(key) % self.shards.len() as u64) as usize
    }

    /// Gets the shard for a given key.
    #[inline]
    fn get_shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    #[inline]
    fn stamp(&self) -> u64 {
        self.next_stamp.fetch_add(1, Ordering::Relaxed)
    }

    /// Purges `key` if expired, counting it.
    #[inline]
    fn purge_if_expired(&self, data: &mut ShardData, key: &[u8]) -> bool {
        let expired = data.purge_if_expired(key, now_millis());
        if expired {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
            trace!(key = %String::from_utf8_lossy(key), "Lazily expired key");
        }
        expired
    }

    /// Runs `f` on the live value stored at `key`, under the shard lock.
    ///
    /// Expired keys are purged first and reported as [`StorageError::NotFound`].
    /// The value's access metadata is updated before `f` runs.
    fn with_value<T>(
        &self,
        key: &[u8],
        f: impl FnOnce(&mut Value) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut data = self.get_shard(key).lock();
        if self.purge_if_expired(&mut data, key) {
            return Err(StorageError::NotFound);
        }
        let value = data.values.get_mut(key).ok_or(StorageError::NotFound)?;
        value.touch();
        f(value)
    }

    /// Runs the eviction policy after a write.
    #[inline]
    fn after_write(&self) {
        let report = self.evictor.maybe_evict(self);
        if report.evicted > 0 {
            self.evicted_count
                .fetch_add(report.evicted as u64, Ordering::Relaxed);
        }
    }

    // ========================================================================
    // SCALAR OPERATIONS
    // ========================================================================

    /// Stores `value` under `key`, replacing whatever was there.
    ///
    /// Values that parse as a base-10 `i64` are stored with the integer
    /// encoding, valid UTF-8 as text and anything else as raw bytes. Any
    /// previous TTL on the key is cleared.
    pub fn set(&self, key: Bytes, value: &[u8]) {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        let stamp = self.stamp();

        {
            let shard = self.get_shard(&key);
            let mut data = shard.lock();
            data.expires.remove(&key[..]);

            let reused = match data.values.get_mut(&key[..]) {
                Some(existing) => {
                    let fits = rewrite_in_place(existing, value);
                    if fits {
                        existing.renew(stamp);
                    }
                    fits
                }
                None => false,
            };

            if !reused {
                // the old region is unmapped before the new one is mapped
                drop(data.values.remove(&key[..]));
                let object = self.encode_scalar(value);
                data.values.insert(key, Value::new(object, stamp));
            }
        }

        self.after_write();
    }

    /// Allocates and fills a fresh scalar region for `value`.
    fn encode_scalar(&self, value: &[u8]) -> Object {
        let kind = classify(value);
        let size = match kind {
            Classified::Integer(_) => scalar::INTEGER_REGION_SIZE,
            Classified::Text | Classified::Raw => scalar::text_region_size(value.len()),
        };

        let mut region = self.allocator.allocate(size);
        let written = match kind {
            Classified::Integer(n) => scalar::set_integer(&mut region, n),
            Classified::Text => scalar::set_text(&mut region, value),
            Classified::Raw => scalar::set_raw(&mut region, value),
        };
        // regions are sized for their payload above
        debug_assert!(written.is_ok());
        Object::Scalar(region)
    }

    /// Gets the value for a key.
    ///
    /// Returns [`StorageError::NotFound`] if the key doesn't exist or has
    /// expired. This implements "lazy expiry" - expired keys are detected and
    /// removed on access.
    pub fn get(&self, key: &[u8]) -> StorageResult<Snapshot> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        self.with_value(key, |value| value.snapshot())
    }

    /// Deletes a key from the database.
    ///
    /// # Returns
    ///
    /// Returns `true` if the key was deleted, `false` if it didn't exist.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.get_shard(key).lock();
        if self.purge_if_expired(&mut data, key) {
            return false;
        }
        // dropped before `data`, so the region is unmapped under the lock
        let removed = data.remove(key);
        removed.is_some()
    }

    /// Adds `delta` to the integer stored at `key` and returns the result.
    ///
    /// Overflow wraps. Returns [`StorageError::NotFound`] for a missing key
    /// and [`StorageError::WrongType`] if the value is not an integer.
    pub fn incr(&self, key: &[u8], delta: i64) -> StorageResult<i64> {
        let result = self.with_value(key, |value| match &mut value.object {
            Object::Scalar(region) => Ok(scalar::increment(region, delta)?),
            Object::Set(_) | Object::List(_) => Err(StorageError::WrongType),
        });
        if result.is_ok() {
            self.after_write();
        }
        result
    }

    /// Checks if a key exists (and is not expired).
    pub fn exists(&self, key: &[u8]) -> bool {
        let mut data = self.get_shard(key).lock();
        !self.purge_if_expired(&mut data, key) && data.values.contains_key(key)
    }

    /// Returns the type of a key ("string", "list" or "set").
    pub fn key_type(&self, key: &[u8]) -> StorageResult<&'static str> {
        self.with_value(key, |value| Ok(value.object.type_name()))
    }

    // ========================================================================
    // EXPIRY
    // ========================================================================

    /// Sets a TTL of `ttl_ms` milliseconds on an existing key.
    ///
    /// A TTL of 0 removes any expiry instead.
    ///
    /// # Returns
    ///
    /// The resolved deadline in unix milliseconds, or `None` if the expiry
    /// was cleared.
    pub fn expire(&self, key: &[u8], ttl_ms: u64) -> StorageResult<Option<u64>> {
        if ttl_ms == 0 {
            self.clear_expiry(key)?;
            return Ok(None);
        }
        let deadline = now_millis().saturating_add(ttl_ms);
        self.set_expiry(key, deadline)?;
        Ok(Some(deadline))
    }

    /// Sets the absolute deadline (unix milliseconds) of an existing key.
    pub fn set_expiry(&self, key: &[u8], deadline: u64) -> StorageResult<()> {
        let mut data = self.get_shard(key).lock();
        if self.purge_if_expired(&mut data, key) {
            return Err(StorageError::NotFound);
        }
        let owned = match data.values.get_key_value(key) {
            Some((k, _)) => k.clone(),
            None => return Err(StorageError::NotFound),
        };
        data.expires.insert(owned, deadline);
        Ok(())
    }

    /// Removes the expiry from a key (makes it persistent).
    ///
    /// # Returns
    ///
    /// Returns `true` if the key had an expiry.
    pub fn clear_expiry(&self, key: &[u8]) -> StorageResult<bool> {
        let mut data = self.get_shard(key).lock();
        if self.purge_if_expired(&mut data, key) || !data.values.contains_key(key) {
            return Err(StorageError::NotFound);
        }
        Ok(data.expires.remove(key).is_some())
    }

    /// Gets the remaining TTL for a key in milliseconds.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ms))` if the key exists and has an expiry
    /// - `Ok(None)` if the key exists but has no expiry
    pub fn ttl(&self, key: &[u8]) -> StorageResult<Option<u64>> {
        let mut data = self.get_shard(key).lock();
        let now = now_millis();
        if data.purge_if_expired(key, now) {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
            return Err(StorageError::NotFound);
        }
        if !data.values.contains_key(key) {
            return Err(StorageError::NotFound);
        }
        Ok(data.expires.get(key).map(|&deadline| deadline - now))
    }

    // ========================================================================
    // LIST OPERATIONS
    // ========================================================================

    /// Appends `value` to the tail of the list at `key`, creating it if needed.
    ///
    /// # Returns
    /// The length of the list after the push.
    pub fn push(&self, key: Bytes, value: &[u8]) -> StorageResult<usize> {
        let len = {
            let shard = self.get_shard(&key);
            let mut data = shard.lock();
            self.purge_if_expired(&mut data, &key);

            match data.values.get_mut(&key[..]) {
                Some(existing) => match &mut existing.object {
                    Object::List(list) => {
                        let len = list.push_tail(value);
                        existing.touch();
                        len
                    }
                    Object::Scalar(_) | Object::Set(_) => return Err(StorageError::WrongType),
                },
                None => {
                    let mut list = QuickList::new();
                    let len = list.push_tail(value);
                    data.values
                        .insert(key, Value::new(Object::List(list), self.stamp()));
                    len
                }
            }
        };

        self.after_write();
        Ok(len)
    }

    /// Removes and returns the tail element of the list at `key`.
    ///
    /// # Returns
    /// The removed element, or `None` if the list is empty.
    pub fn pop(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        let popped = self.with_value(key, |value| match &mut value.object {
            Object::List(list) => Ok(list.pop_tail()),
            Object::Scalar(_) | Object::Set(_) => Err(StorageError::WrongType),
        });
        if popped.is_ok() {
            self.after_write();
        }
        popped
    }

    /// Returns the length of the list at `key`.
    pub fn list_len(&self, key: &[u8]) -> StorageResult<usize> {
        self.with_value(key, |value| match &value.object {
            Object::List(list) => Ok(list.len()),
            Object::Scalar(_) | Object::Set(_) => Err(StorageError::WrongType),
        })
    }

    // ========================================================================
    // SET OPERATIONS
    // ========================================================================

    /// Adds `member` to the integer set at `key`, creating it if needed.
    ///
    /// # Returns
    /// The size of the set after the add.
    pub fn sadd(&self, key: Bytes, member: i64) -> StorageResult<usize> {
        let len = {
            let shard = self.get_shard(&key);
            let mut data = shard.lock();
            self.purge_if_expired(&mut data, &key);

            match data.values.get_mut(&key[..]) {
                Some(existing) => match &mut existing.object {
                    Object::Set(set) => {
                        set.add(member);
                        let len = set.len();
                        existing.touch();
                        len
                    }
                    Object::Scalar(_) | Object::List(_) => return Err(StorageError::WrongType),
                },
                None => {
                    data.values.insert(
                        key,
                        Value::new(Object::Set(IntSet::new(member)), self.stamp()),
                    );
                    1
                }
            }
        };

        self.after_write();
        Ok(len)
    }

    /// Removes `member` from the integer set at `key`.
    ///
    /// # Returns
    /// The size of the set after the removal.
    pub fn srem(&self, key: &[u8], member: i64) -> StorageResult<usize> {
        let len = self.with_value(key, |value| match &mut value.object {
            Object::Set(set) => {
                set.remove(member);
                Ok(set.len())
            }
            Object::Scalar(_) | Object::List(_) => Err(StorageError::WrongType),
        })?;
        self.after_write();
        Ok(len)
    }

    /// Returns the size of the integer set at `key`.
    pub fn scard(&self, key: &[u8]) -> StorageResult<usize> {
        self.with_value(key, |value| match &value.object {
            Object::Set(set) => Ok(set.len()),
            Object::Scalar(_) | Object::List(_) => Err(StorageError::WrongType),
        })
    }

    /// Checks whether `member` belongs to the integer set at `key`.
    pub fn sismember(&self, key: &[u8], member: i64) -> StorageResult<bool> {
        self.with_value(key, |value| match &value.object {
            Object::Set(set) => Ok(set.contains(member)),
            Object::Scalar(_) | Object::List(_) => Err(StorageError::WrongType),
        })
    }

    // ========================================================================
    // BACKGROUND PASSES
    // ========================================================================

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Visits every entry of one shard under its lock.
    ///
    /// The callback receives the key, the value and whether the key has a TTL.
    pub(crate) fn scan_shard(&self, shard: usize, mut visit: impl FnMut(&Bytes, &Value, bool)) {
        let data = self.shards[shard].lock();
        for (key, value) in data.values.iter() {
            visit(key, value, data.expires.contains_key(key));
        }
    }

    /// Deletes `key` from `shard` if it still holds the value with `stamp`.
    ///
    /// # Returns
    /// The off-heap bytes released, or `None` if the entry was already gone
    /// or has been replaced since it was scanned.
    pub(crate) fn evict_entry(&self, shard: usize, key: &[u8], stamp: u64) -> Option<usize> {
        let mut data = self.shards[shard].lock();
        let current = data.values.get(key).map(|value| value.stamp);
        if current != Some(stamp) {
            return None;
        }
        let removed = data.remove(key)?;
        let size = removed.off_heap_size();
        drop(removed);
        Some(size)
    }

    /// Runs one expiry sweep: bounded passes until a pass finds fewer than
    /// `config.min_deleted` expired keys.
    ///
    /// # Returns
    /// The total number of keys removed.
    pub fn sweep_expired(&self, config: &ExpiryConfig) -> usize {
        let mut total = 0;
        for pass in 1..=config.max_passes.max(1) {
            let deleted = self.sweep_pass(config.batch_size);
            total += deleted;
            debug!(pass, deleted, "Expiry sweep pass");
            if deleted < config.min_deleted {
                break;
            }
        }
        total
    }

    /// Collects up to `batch_size` expired keys and deletes them.
    fn sweep_pass(&self, batch_size: usize) -> usize {
        let now = now_millis();
        let shards = self.shards.len();
        let start = self.sweep_cursor.fetch_add(1, Ordering::Relaxed) % shards;

        let mut batch = Vec::new();
        for i in 0..shards {
            if batch.len() >= batch_size {
                break;
            }
            let idx = (start + i) % shards;
            let want = batch_size - batch.len();
            let data = self.shards[idx].lock();
            batch.extend(
                data.expires
                    .iter()
                    .filter(|&(_, &deadline)| now >= deadline)
                    .take(want)
                    .map(|(key, _)| (idx, key.clone())),
            );
        }

        let mut deleted = 0;
        for (idx, key) in batch {
            // the key may have been deleted or given a new TTL since the scan
            let removed = {
                let mut data = self.shards[idx].lock();
                data.purge_if_expired(&key, now_millis())
            };
            if removed {
                deleted += 1;
            }
        }

        if deleted > 0 {
            self.expired_count
                .fetch_add(deleted as u64, Ordering::Relaxed);
        }
        deleted
    }

    // ========================================================================
    // INTROSPECTION
    // ========================================================================

    /// Clears all data from the database.
    pub fn flush(&self) {
        for shard in &self.shards {
            let mut data = shard.lock();
            data.expires.clear();
            data.values.clear();
        }
    }

    /// Returns the number of keys in the database, expired ones included
    /// until they are purged.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().values.len()).sum()
    }

    /// Returns true if the database is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Off-heap bytes currently held by stored values.
    pub fn off_heap_used(&self) -> usize {
        self.allocator.used()
    }

    /// The allocator backing this engine.
    pub fn allocator(&self) -> &Arc<Allocator> {
        &self.allocator
    }

    /// The configured eviction settings.
    pub fn eviction_config(&self) -> &EvictionConfig {
        self.evictor.config()
    }

    /// Returns database statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len() as u64,
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
            evicted: self.evicted_count.load(Ordering::Relaxed),
        }
    }

    /// Returns off-heap memory information.
    pub fn memory_info(&self) -> MemoryInfo {
        MemoryInfo {
            off_heap_used: self.allocator.used(),
            regions: self.allocator.regions(),
            peak_off_heap_used: self.allocator.peak(),
            max_off_heap_size: self.evictor.config().max_off_heap_size,
        }
    }
}

/// Database statistics.
#[derive(Debug, Clone, Copy)]
pub struct StorageStats {
    /// Number of keys currently stored
    pub keys: u64,
    /// Total GET operations
    pub get_ops: u64,
    /// Total SET operations
    pub set_ops: u64,
    /// Total DEL operations
    pub del_ops: u64,
    /// Total expired keys purged
    pub expired: u64,
    /// Total keys evicted
    pub evicted: u64,
}

/// Off-heap memory information.
#[derive(Debug, Clone, Copy)]
pub struct MemoryInfo {
    /// Bytes held by live regions
    pub off_heap_used: usize,
    /// Number of live regions
    pub regions: usize,
    /// High-water mark of `off_heap_used`
    pub peak_off_heap_used: usize,
    /// Configured budget, 0 if unlimited
    pub max_off_heap_size: usize,
}

/// How `set` will encode a value.
#[derive(Clone, Copy)]
enum Classified {
    Integer(i64),
    Text,
    Raw,
}

fn classify(value: &[u8]) -> Classified {
    match std::str::from_utf8(value) {
        Ok(s) => match s.parse::<i64>() {
            Ok(n) => Classified::Integer(n),
            Err(_) => Classified::Text,
        },
        Err(_) => Classified::Raw,
    }
}

/// Overwrites an existing scalar region when it has the right size.
///
/// Integers fit any region of at least 9 bytes; text and raw payloads need a
/// region of exactly `1 + len` bytes since their length is implied by it.
fn rewrite_in_place(existing: &mut Value, value: &[u8]) -> bool {
    let Object::Scalar(region) = &mut existing.object else {
        return false;
    };
    match classify(value) {
        Classified::Integer(n) => scalar::set_integer(region, n).is_ok(),
        Classified::Text => fits_exactly(region, value) && scalar::set_text(region, value).is_ok(),
        Classified::Raw => fits_exactly(region, value) && scalar::set_raw(region, value).is_ok(),
    }
}

#[inline]
fn fits_exactly(region: &Region, value: &[u8]) -> bool {
    region.capacity() == scalar::text_region_size(value.len())
}

/// 64-bit FNV-1a.
#[inline]
fn fnv1a(key: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    key.iter()
        .fold(OFFSET, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}

/// Current time in unix milliseconds.
#[inline]
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
