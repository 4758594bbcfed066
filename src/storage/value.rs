//! Stored values.
//!
//! A [`Value`] is what a shard maps each key to: one of the three modeled
//! domains plus the access metadata the eviction policy reads. Scalars live
//! in an off-heap [`Region`]; collections are ordinary in-process structures.

use crate::storage::alloc::Region;
use crate::storage::error::StorageResult;
use crate::storage::intset::{IntSet, IntWidth};
use crate::storage::quicklist::QuickList;
use crate::storage::scalar::{self, ScalarRef};
use bytes::Bytes;
use std::time::Instant;

/// The domain object behind a key.
#[derive(Debug)]
pub enum Object {
    /// An off-heap scalar (raw, text or integer)
    Scalar(Region),
    /// A small set of integers
    Set(IntSet),
    /// A packed list of byte strings
    List(QuickList),
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Scalar(_) => "string",
            Object::Set(_) => "set",
            Object::List(_) => "list",
        }
    }
}

/// A stored value with its access metadata.
#[derive(Debug)]
pub struct Value {
    pub object: Object,
    /// Last time a command reached this value, including ones that then
    /// failed with a type error
    pub last_access: Instant,
    /// Commands that reached this value since the last `set`, saturating
    pub access_count: u8,
    /// Process-unique generation, renewed on every overwrite
    pub stamp: u64,
}

impl Value {
    pub fn new(object: Object, stamp: u64) -> Self {
        Self {
            object,
            last_access: Instant::now(),
            access_count: 0,
            stamp,
        }
    }

    /// Records an access by a command that found the key.
    #[inline]
    pub fn touch(&mut self) {
        self.last_access = Instant::now();
        self.access_count = self.access_count.saturating_add(1);
    }

    /// Resets the metadata after the value was overwritten in place.
    pub fn renew(&mut self, stamp: u64) {
        self.last_access = Instant::now();
        self.access_count = 0;
        self.stamp = stamp;
    }

    /// Off-heap bytes owned by this value.
    #[inline]
    pub fn off_heap_size(&self) -> usize {
        match &self.object {
            Object::Scalar(region) => region.capacity(),
            Object::Set(_) | Object::List(_) => 0,
        }
    }

    /// Copies the value out so it can be used after the shard lock is gone.
    pub fn snapshot(&self) -> StorageResult<Snapshot> {
        Ok(match &self.object {
            Object::Scalar(region) => match scalar::decode(region)? {
                ScalarRef::Raw(bytes) => Snapshot::Raw(Bytes::copy_from_slice(bytes)),
                ScalarRef::Text(bytes) => Snapshot::Text(Bytes::copy_from_slice(bytes)),
                ScalarRef::Integer(n) => Snapshot::Integer(n),
            },
            Object::Set(set) => Snapshot::Set {
                width: set.width(),
                members: set.to_vec(),
            },
            Object::List(list) => Snapshot::List(list.get_all()),
        })
    }
}

/// An owned copy of a value, tagged with its encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Raw(Bytes),
    Text(Bytes),
    Integer(i64),
    List(Vec<Bytes>),
    Set { width: IntWidth, members: Vec<i64> },
}

impl Snapshot {
    /// Name of the encoding, as reported to clients.
    pub fn encoding(&self) -> &'static str {
        match self {
            Snapshot::Raw(_) => "raw",
            Snapshot::Text(_) => "text",
            Snapshot::Integer(_) => "integer",
            Snapshot::List(_) => "quicklist",
            Snapshot::Set { .. } => "intset",
        }
    }
}
