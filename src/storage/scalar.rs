//! Scalar Encoding Layer
//!
//! Interprets an off-heap [`Region`] as a self-describing scalar.
//!
//! ## Layout
//!
//! ```text
//! ┌─────┬──────────────────────────────────────┐
//! │ tag │ payload                              │
//! │ 1 B │ capacity - 1 bytes                   │
//! └─────┴──────────────────────────────────────┘
//!
//! tag 0 (raw)     payload = user bytes
//! tag 1 (text)    payload = user bytes
//! tag 2 (integer) payload = 8-byte little-endian two's complement
//! ```
//!
//! There is no length field: the payload of a raw or text scalar spans the
//! rest of the region, so those regions are sized exactly `1 + len`.

use crate::storage::alloc::Region;
use std::fmt;
use thiserror::Error;

/// Size of the encoding tag.
pub const TAG_LEN: usize = 1;

/// Size of a region holding an integer scalar.
pub const INTEGER_REGION_SIZE: usize = TAG_LEN + std::mem::size_of::<i64>();

/// How a scalar region's payload is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Encoding {
    Raw = 0,
    Text = 1,
    Integer = 2,
}

impl Encoding {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Encoding::Raw),
            1 => Some(Encoding::Text),
            2 => Some(Encoding::Integer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Raw => "raw",
            Encoding::Text => "text",
            Encoding::Integer => "integer",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised when a region is accessed with the wrong expectations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScalarError {
    #[error("region of {capacity} bytes cannot hold {needed} bytes")]
    CapacityTooSmall { needed: usize, capacity: usize },

    #[error("expected {expected} encoding, found {found}")]
    WrongEncoding {
        expected: &'static str,
        found: Encoding,
    },

    #[error("unknown encoding tag {0:#04x}")]
    UnknownTag(u8),
}

/// A borrowed, decoded view of a scalar region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarRef<'a> {
    Raw(&'a [u8]),
    Text(&'a [u8]),
    Integer(i64),
}

/// Region size needed to store `len` bytes of raw or text payload.
#[inline]
pub fn text_region_size(len: usize) -> usize {
    TAG_LEN + len
}

/// Reads the encoding tag of a region.
pub fn encoding(region: &Region) -> Result<Encoding, ScalarError> {
    let tag = region.as_slice()[0];
    Encoding::from_tag(tag).ok_or(ScalarError::UnknownTag(tag))
}

/// Writes `value` as a text scalar.
pub fn set_text(region: &mut Region, value: &[u8]) -> Result<(), ScalarError> {
    write_bytes(region, Encoding::Text, value)
}

/// Writes `value` as a raw (binary) scalar.
pub fn set_raw(region: &mut Region, value: &[u8]) -> Result<(), ScalarError> {
    write_bytes(region, Encoding::Raw, value)
}

fn write_bytes(region: &mut Region, encoding: Encoding, value: &[u8]) -> Result<(), ScalarError> {
    check_capacity(region, text_region_size(value.len()))?;

    let buf = region.as_mut_slice();
    buf[0] = encoding as u8;
    buf[TAG_LEN..TAG_LEN + value.len()].copy_from_slice(value);
    Ok(())
}

/// Writes `value` as an integer scalar.
pub fn set_integer(region: &mut Region, value: i64) -> Result<(), ScalarError> {
    check_capacity(region, INTEGER_REGION_SIZE)?;

    let buf = region.as_mut_slice();
    buf[0] = Encoding::Integer as u8;
    buf[TAG_LEN..INTEGER_REGION_SIZE].copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Returns the payload of a raw or text scalar.
pub fn get_text(region: &Region) -> Result<&[u8], ScalarError> {
    match encoding(region)? {
        Encoding::Raw | Encoding::Text => Ok(&region.as_slice()[TAG_LEN..]),
        found @ Encoding::Integer => Err(ScalarError::WrongEncoding {
            expected: "text",
            found,
        }),
    }
}

/// Returns the value of an integer scalar.
pub fn get_integer(region: &Region) -> Result<i64, ScalarError> {
    expect_integer(region)?;
    Ok(read_i64(region.as_slice()))
}

/// Adds `delta` to an integer scalar in place and returns the new value.
///
/// Overflow wraps.
pub fn increment(region: &mut Region, delta: i64) -> Result<i64, ScalarError> {
    expect_integer(region)?;

    let buf = region.as_mut_slice();
    let value = read_i64(buf).wrapping_add(delta);
    buf[TAG_LEN..INTEGER_REGION_SIZE].copy_from_slice(&value.to_le_bytes());
    Ok(value)
}

/// Decodes a region into a typed view.
pub fn decode(region: &Region) -> Result<ScalarRef<'_>, ScalarError> {
    let payload = &region.as_slice()[TAG_LEN..];
    Ok(match encoding(region)? {
        Encoding::Raw => ScalarRef::Raw(payload),
        Encoding::Text => ScalarRef::Text(payload),
        Encoding::Integer => ScalarRef::Integer(read_i64(region.as_slice())),
    })
}

fn expect_integer(region: &Region) -> Result<(), ScalarError> {
    match encoding(region)? {
        Encoding::Integer => Ok(()),
        found @ (Encoding::Raw | Encoding::Text) => Err(ScalarError::WrongEncoding {
            expected: "integer",
            found,
        }),
    }
}

#[inline]
fn check_capacity(region: &Region, needed: usize) -> Result<(), ScalarError> {
    let capacity = region.capacity();
    if capacity < needed {
        return Err(ScalarError::CapacityTooSmall { needed, capacity });
    }
    Ok(())
}

#[inline]
fn read_i64(buf: &[u8]) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[TAG_LEN..INTEGER_REGION_SIZE]);
    i64::from_le_bytes(raw)
}
