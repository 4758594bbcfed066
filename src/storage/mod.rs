//! Storage Engine Module
//!
//! This module provides the storage core of EmberKV: off-heap scalar
//! regions, compact collections, and a sharded key space with TTLs, eviction
//! and a background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐            │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │            │
//! │  │ Mutex   │ │ Mutex   │ │ Mutex   │ │ shards  │            │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘            │
//! │   Value = Scalar(Region) | Set(IntSet) | List(QuickList)    │
//! └─────────────────────────────────────────────────────────────┘
//!        ▲                   ▲                   │
//!        │                   │                   ▼
//!  ┌─────┴───────┐   ┌───────┴──────┐     ┌────────────┐
//!  │ExpirySweeper│   │   Evictor    │     │ Allocator  │
//!  │(Tokio task) │   │ (after write)│     │ (mmap anon)│
//!  └─────────────┘   └──────────────┘     └────────────┘
//! ```
//!
//! ## Modules
//!
//! - `alloc`: page-backed regions with usage accounting
//! - `scalar`: tagged raw, text and integer encodings over a region
//! - `intset`: width-adaptive integer sets
//! - `quicklist`: packed node lists
//! - `eviction`: memory-pressure policies
//! - `expiry`: the background sweeper
//!
//! ## Example
//!
//! ```
//! use emberkv::storage::{Snapshot, StorageEngine};
//! use bytes::Bytes;
//!
//! let engine = StorageEngine::new();
//!
//! engine.set(Bytes::from("name"), b"Ariz");
//! assert_eq!(engine.get(b"name"), Ok(Snapshot::Text(Bytes::from("Ariz"))));
//!
//! engine.push(Bytes::from("queue"), b"job-1").unwrap();
//! engine.sadd(Bytes::from("ids"), 42).unwrap();
//!
//! // expires in an hour
//! engine.expire(b"name", 3_600_000).unwrap();
//! ```

pub mod alloc;
pub mod engine;
pub mod error;
pub mod eviction;
pub mod expiry;
pub mod intset;
pub mod quicklist;
pub mod scalar;
pub mod value;

// Re-export commonly used types
pub use alloc::{AllocError, Allocator, Region};
pub use engine::{EngineConfig, MemoryInfo, StorageEngine, StorageStats, DEFAULT_SHARDS};
pub use error::{StorageError, StorageResult};
pub use eviction::{EvictionConfig, EvictionPolicy, EvictionReport, Evictor};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
pub use intset::{IntSet, IntWidth};
pub use quicklist::QuickList;
pub use value::{Object, Snapshot, Value};
