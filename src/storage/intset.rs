//! Integer-Set Collection
//!
//! A small set of integers stored at the narrowest element width that can
//! hold every member: 16, 32 or 64 bits.
//!
//! Members keep insertion order until a removal, which swaps the last member
//! into the hole. Adding a member that needs a wider encoding migrates every
//! existing member to the new width first. The width never shrinks.

use std::fmt;

/// Element width of an [`IntSet`], ordered from narrowest to widest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntWidth {
    W16,
    W32,
    W64,
}

impl IntWidth {
    /// The narrowest width that can represent `value`.
    pub fn of(value: i64) -> Self {
        if i16::try_from(value).is_ok() {
            IntWidth::W16
        } else if i32::try_from(value).is_ok() {
            IntWidth::W32
        } else {
            IntWidth::W64
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }
}

impl fmt::Display for IntWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "int{}", self.bits())
    }
}

/// A deduplicated array of integers at one fixed width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntSet {
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
}

impl IntSet {
    /// Creates a set holding only `value`, at the narrowest width that fits.
    pub fn new(value: i64) -> Self {
        // Each cast is lossless: `IntWidth::of` picked a width that fits.
        match IntWidth::of(value) {
            IntWidth::W16 => IntSet::Int16(vec![value as i16]),
            IntWidth::W32 => IntSet::Int32(vec![value as i32]),
            IntWidth::W64 => IntSet::Int64(vec![value]),
        }
    }

    /// Current element width.
    pub fn width(&self) -> IntWidth {
        match self {
            IntSet::Int16(_) => IntWidth::W16,
            IntSet::Int32(_) => IntWidth::W32,
            IntSet::Int64(_) => IntWidth::W64,
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        match self {
            IntSet::Int16(v) => v.len(),
            IntSet::Int32(v) => v.len(),
            IntSet::Int64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds `value` to the set.
    ///
    /// Returns `true` if the value was inserted, `false` if it was already
    /// a member.
    pub fn add(&mut self, value: i64) -> bool {
        let needed = IntWidth::of(value);
        if needed > self.width() {
            // A value that needs a wider encoding cannot already be present.
            self.upgrade(needed, value);
            return true;
        }

        if self.contains(value) {
            return false;
        }

        // `needed <= width`, so the narrowing casts below are lossless.
        match self {
            IntSet::Int16(v) => v.push(value as i16),
            IntSet::Int32(v) => v.push(value as i32),
            IntSet::Int64(v) => v.push(value),
        }
        true
    }

    /// Migrates every member to `width` and appends `value`.
    fn upgrade(&mut self, width: IntWidth, value: i64) {
        let len = self.len();
        *self = match width {
            IntWidth::W16 => unreachable!("no set is narrower than 16 bits"),
            IntWidth::W32 => {
                let mut widened = Vec::with_capacity(len + 1);
                widened.extend(self.iter().map(|m| m as i32));
                widened.push(value as i32);
                IntSet::Int32(widened)
            }
            IntWidth::W64 => {
                let mut widened = Vec::with_capacity(len + 1);
                widened.extend(self.iter());
                widened.push(value);
                IntSet::Int64(widened)
            }
        };
    }

    /// Removes `value` from the set.
    ///
    /// The last member takes the removed member's place, so insertion order
    /// is not preserved. Returns `true` if the value was present.
    pub fn remove(&mut self, value: i64) -> bool {
        if IntWidth::of(value) > self.width() {
            return false;
        }
        match self {
            IntSet::Int16(v) => swap_remove_value(v, value),
            IntSet::Int32(v) => swap_remove_value(v, value),
            IntSet::Int64(v) => swap_remove_value(v, value),
        }
    }

    /// Returns `true` if `value` is a member.
    pub fn contains(&self, value: i64) -> bool {
        if IntWidth::of(value) > self.width() {
            return false;
        }
        match self {
            IntSet::Int16(v) => v.iter().any(|&m| i64::from(m) == value),
            IntSet::Int32(v) => v.iter().any(|&m| i64::from(m) == value),
            IntSet::Int64(v) => v.contains(&value),
        }
    }

    /// Iterates members widened to `i64`, in storage order.
    pub fn iter(&self) -> Iter<'_> {
        Iter { set: self, pos: 0 }
    }

    /// Copies the members out, in storage order.
    pub fn to_vec(&self) -> Vec<i64> {
        self.iter().collect()
    }
}

/// Iterator over the members of an [`IntSet`].
pub struct Iter<'a> {
    set: &'a IntSet,
    pos: usize,
}

impl Iterator for Iter<'_> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let member = match self.set {
            IntSet::Int16(v) => v.get(self.pos).map(|&m| i64::from(m)),
            IntSet::Int32(v) => v.get(self.pos).map(|&m| i64::from(m)),
            IntSet::Int64(v) => v.get(self.pos).copied(),
        }?;
        self.pos += 1;
        Some(member)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.set.len() - self.pos;
        (remaining, Some(remaining))
    }
}

fn swap_remove_value<T>(members: &mut Vec<T>, value: i64) -> bool
where
    T: Copy + Into<i64>,
{
    match members.iter().position(|&m| m.into() == value) {
        Some(idx) => {
            members.swap_remove(idx);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_width_of() {
        assert_eq!(IntWidth::of(0), IntWidth::W16);
        assert_eq!(IntWidth::of(i16::MAX as i64), IntWidth::W16);
        assert_eq!(IntWidth::of(i16::MIN as i64), IntWidth::W16);
        assert_eq!(IntWidth::of(i16::MAX as i64 + 1), IntWidth::W32);
        assert_eq!(IntWidth::of(i32::MIN as i64), IntWidth::W32);
        assert_eq!(IntWidth::of(i32::MAX as i64 + 1), IntWidth::W64);
        assert_eq!(IntWidth::of(i64::MIN), IntWidth::W64);
    }

    #[test]
    fn test_add_dedup_and_remove() {
        let mut set = IntSet::new(1);
        assert!(set.add(2));
        assert!(set.add(3));
        assert_eq!(set.len(), 3);

        assert!(!set.add(2));
        assert_eq!(set.len(), 3);

        assert!(set.remove(2));
        assert_eq!(set.len(), 2);
        assert_eq!(set.width(), IntWidth::W16);

        assert!(set.add((1 << 16) + 1));
        assert_eq!(set.len(), 3);
        assert_eq!(set.width(), IntWidth::W32);
    }

    #[test]
    fn test_mixed_widths() {
        let mut set = IntSet::new(1);
        set.add(2);
        set.add(70000);
        assert_eq!(set.len(), 3);
        assert_eq!(set.width(), IntWidth::W32);

        set.add(2);
        assert_eq!(set.len(), 3);
        assert_eq!(set.to_vec(), vec![1, 2, 70000]);
    }

    #[test]
    fn test_narrow_values_never_migrate() {
        let mut set = IntSet::new(100_000);
        assert_eq!(set.width(), IntWidth::W32);
        set.add(5);
        set.add(-5);
        assert_eq!(set.width(), IntWidth::W32);
        assert!(set.contains(-5));
    }

    #[test]
    fn test_width_never_narrows() {
        let mut set = IntSet::new(1);
        set.add(2);
        set.add(i64::MAX);
        assert_eq!(set.width(), IntWidth::W64);

        assert!(set.remove(i64::MAX));
        assert_eq!(set.width(), IntWidth::W64);
        assert_eq!(set.len(), 2);

        assert!(set.remove(1));
        assert!(set.remove(2));
        assert!(set.is_empty());
        assert_eq!(set.width(), IntWidth::W64);
    }

    #[test]
    fn test_contains_rejects_wider_values() {
        let set = IntSet::new(7);
        assert!(set.contains(7));
        assert!(!set.contains(8));
        assert!(!set.contains(1 << 40));
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut set = IntSet::new(7);
        assert!(!set.remove(8));
        assert!(!set.remove(1 << 40));
        assert_eq!(set.to_vec(), vec![7]);
    }

    #[test]
    fn test_remove_swaps_last_into_hole() {
        let mut set = IntSet::new(10);
        set.add(20);
        set.add(30);
        set.add(40);
        set.remove(20);
        assert_eq!(set.to_vec(), vec![10, 40, 30]);
    }

    #[test]
    fn test_matches_reference_set() {
        let ops: Vec<(bool, i64)> = vec![
            (true, 1),
            (true, -1),
            (true, 300),
            (true, 1),
            (true, 40_000),
            (false, -1),
            (true, -3_000_000_000),
            (false, 300),
            (true, 300),
            (false, 12345),
            (true, i64::MIN),
            (true, 40_000),
            (false, 1),
            (true, 0),
        ];

        let mut set = IntSet::new(0);
        let mut reference = BTreeSet::from([0i64]);
        for (add, value) in ops {
            if add {
                assert_eq!(set.add(value), reference.insert(value));
            } else {
                assert_eq!(set.remove(value), reference.remove(&value));
            }
            assert_eq!(set.len(), reference.len());
            for v in &reference {
                assert!(set.contains(*v));
            }
        }

        let actual: BTreeSet<i64> = set.iter().collect();
        assert_eq!(actual, reference);
        assert_eq!(set.width(), IntWidth::W64);
    }
}
