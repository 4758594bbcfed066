//! Compact List Collection
//!
//! A list is a doubly linked chain of nodes. Each node packs up to
//! [`LIST_NODE_MAX_ENTRIES`] byte strings into a single buffer, every
//! element occupying one fixed-size slot (the node's *stride*):
//!
//! ```text
//!           stride            stride            stride
//!   ┌───────────────────┬───────────────────┬───────────────────┐
//!   │ uvarint len │ data│ uvarint len │ data│       (free)      │
//!   └───────────────────┴───────────────────┴───────────────────┘
//! ```
//!
//! When an element's frame does not fit the current stride, every frame in
//! the node is re-packed at the wider stride. Like intset width migration,
//! this is rare once a node has seen its largest element.
//!
//! Elements are pushed to and popped from the tail only.

use bytes::Bytes;
use std::collections::LinkedList;

/// Maximum number of elements held by one node.
pub const LIST_NODE_MAX_ENTRIES: usize = 5;

/// A single densely packed node.
#[derive(Debug, Default)]
struct ZipNode {
    /// `stride * LIST_NODE_MAX_ENTRIES` bytes once the first element lands
    buf: Vec<u8>,
    /// Bytes reserved per element frame
    stride: usize,
    /// Number of frames in use
    count: usize,
}

impl ZipNode {
    #[inline]
    fn is_full(&self) -> bool {
        self.count >= LIST_NODE_MAX_ENTRIES
    }

    fn push_tail(&mut self, value: &[u8]) {
        debug_assert!(!self.is_full(), "push into a full node");

        let frame_len = uvarint_len(value.len() as u64) + value.len();
        if frame_len > self.stride {
            self.restride(frame_len);
        }

        let offset = self.count * self.stride;
        let slot = &mut self.buf[offset..offset + self.stride];
        let n = put_uvarint(slot, value.len() as u64);
        slot[n..n + value.len()].copy_from_slice(value);
        self.count += 1;
    }

    /// Re-packs every frame into slots of `stride` bytes.
    fn restride(&mut self, stride: usize) {
        let mut buf = vec![0u8; stride * LIST_NODE_MAX_ENTRIES];
        for i in 0..self.count {
            let old = &self.buf[i * self.stride..(i + 1) * self.stride];
            buf[i * stride..i * stride + self.stride].copy_from_slice(old);
        }
        self.buf = buf;
        self.stride = stride;
    }

    fn pop_tail(&mut self) -> Option<Bytes> {
        if self.count == 0 {
            return None;
        }
        let value = Bytes::copy_from_slice(self.entry(self.count - 1));
        self.count -= 1;

        let offset = self.count * self.stride;
        self.buf[offset..offset + self.stride].fill(0);
        Some(value)
    }

    /// Payload of the `idx`-th frame.
    fn entry(&self, idx: usize) -> &[u8] {
        let slot = &self.buf[idx * self.stride..(idx + 1) * self.stride];
        let (len, n) = get_uvarint(slot);
        &slot[n..n + len as usize]
    }

    fn entries(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.count).map(move |i| self.entry(i))
    }
}

/// An ordered sequence of byte strings stored in packed nodes.
#[derive(Debug, Default)]
pub struct QuickList {
    nodes: LinkedList<ZipNode>,
    /// Total elements across all nodes
    count: usize,
}

impl QuickList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` at the tail and returns the new length.
    pub fn push_tail(&mut self, value: &[u8]) -> usize {
        match self.nodes.back_mut() {
            Some(tail) if !tail.is_full() => tail.push_tail(value),
            _ => {
                let mut node = ZipNode::default();
                node.push_tail(value);
                self.nodes.push_back(node);
            }
        }
        self.count += 1;
        self.count
    }

    /// Removes and returns the last element, or `None` if the list is empty.
    pub fn pop_tail(&mut self) -> Option<Bytes> {
        let tail = self.nodes.back_mut()?;
        let value = tail.pop_tail()?;
        if tail.count == 0 {
            self.nodes.pop_back();
        }
        self.count -= 1;
        Some(value)
    }

    /// Iterates every element from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.nodes.iter().flat_map(|node| node.entries())
    }

    /// Copies every element out, from head to tail.
    pub fn get_all(&self) -> Vec<Bytes> {
        let mut values = Vec::with_capacity(self.count);
        values.extend(self.iter().map(Bytes::copy_from_slice));
        values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of nodes in the chain.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Encoded size of `value` as an unsigned LEB128 varint.
#[inline]
fn uvarint_len(mut value: u64) -> usize {
    let mut n = 1;
    while value >= 0x80 {
        value >>= 7;
        n += 1;
    }
    n
}

/// Writes `value` as an unsigned varint at the start of `buf`.
fn put_uvarint(buf: &mut [u8], mut value: u64) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

/// Reads an unsigned varint from the start of `buf`.
///
/// Returns the value and the number of bytes consumed.
fn get_uvarint(buf: &[u8]) -> (u64, usize) {
    let mut value = 0u64;
    let mut shift = 0;
    for (i, &byte) in buf.iter().enumerate() {
        value |= u64::from(byte & 0x7f) << shift;
        if byte < 0x80 {
            return (value, i + 1);
        }
        shift += 7;
    }
    (value, buf.len())
}
