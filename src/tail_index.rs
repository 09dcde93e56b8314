//! Per-bucket tail bytes that link collision chains without pointers.
//!
//! Each bucket carries one [`Tail`]. A bucket is either empty, the last entry
//! of its chain (`Solo`), or links to the next entry of its chain through a
//! probe offset. The next bucket is recomputed from the current index, the
//! offset and the table mask, so chains cost one byte per bucket.

use core::fmt;

/// Smallest offset a link may record. `0` and `1` encode `Empty` and `Solo`.
pub const FIRST_PROBE_OFFSET: u8 = 2;

/// Largest offset a link may record.
pub const MAX_PROBE_OFFSET: u8 = 15;

/// Longest chain, in hops from the head, a table tolerates before growing.
pub const MAX_CHAIN_HOPS: usize = 15;

/// Distance from a bucket to the bucket its `offset` points at.
///
/// Offsets map to triangular numbers (`2 -> 1`, `3 -> 3`, `4 -> 6`, ...), so
/// successive candidates spread out instead of clustering. Triangular numbers
/// cover every residue of a power of two, which keeps small tables from
/// revisiting the same few buckets.
#[inline(always)]
pub const fn probe_distance(offset: u8) -> usize {
    let step = offset as usize - 1;
    step * (step + 1) / 2
}

/// Bucket reached from `index` through `offset` in a table with `mask`.
#[inline(always)]
pub const fn probe(index: usize, offset: u8, mask: usize) -> usize {
    index.wrapping_add(probe_distance(offset)) & mask
}

/// Packed tail byte of a single bucket.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct Tail(u8);

impl Tail {
    pub(crate) const EMPTY: Tail = Tail(0);
    pub(crate) const SOLO: Tail = Tail(1);

    #[inline(always)]
    pub(crate) fn link(offset: u8) -> Tail {
        debug_assert!((FIRST_PROBE_OFFSET..=MAX_PROBE_OFFSET).contains(&offset));
        Tail(offset)
    }

    #[inline(always)]
    pub(crate) fn is_empty(self) -> bool {
        self == Tail::EMPTY
    }

    /// Offset to the next entry of the chain, if any.
    #[inline(always)]
    pub(crate) fn next_offset(self) -> Option<u8> {
        if self.0 >= FIRST_PROBE_OFFSET {
            Some(self.0)
        } else {
            None
        }
    }

    pub(crate) fn state(self) -> TailState {
        match self.0 {
            0 => TailState::Empty,
            1 => TailState::Solo,
            offset => TailState::Offset(offset),
        }
    }
}

impl fmt::Debug for Tail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.state(), f)
    }
}

/// Public view of a bucket's tail byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    /// The bucket holds no entry.
    Empty,
    /// The bucket holds the last entry of its chain.
    Solo,
    /// The bucket holds an entry whose chain continues at the given offset.
    Offset(u8),
}

impl fmt::Display for TailState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TailState::Empty => f.write_str("empty"),
            TailState::Solo => f.write_str("solo"),
            TailState::Offset(offset) => write!(f, "+{offset:02}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::collections::BTreeSet;

    use super::*;

    #[test]
    fn distances_are_triangular() {
        assert_eq!(probe_distance(2), 1);
        assert_eq!(probe_distance(3), 3);
        assert_eq!(probe_distance(4), 6);
        assert_eq!(probe_distance(15), 105);
    }

    #[test]
    fn probe_wraps_around_mask() {
        assert_eq!(probe(6, 3, 7), 1);
        assert_eq!(probe(0, 2, 3), 1);
        assert_eq!(probe(3, 15, 3), (3 + 105) & 3);
    }

    #[test]
    fn offsets_reach_every_other_bucket_of_small_tables() {
        for capacity in [4usize, 8] {
            let mask = capacity - 1;
            let reached: BTreeSet<usize> = (FIRST_PROBE_OFFSET..=MAX_PROBE_OFFSET)
                .map(|offset| probe(0, offset, mask))
                .collect();
            for bucket in 1..capacity {
                assert!(reached.contains(&bucket), "capacity {capacity}: {bucket} unreachable");
            }
        }
    }

    #[test]
    fn tail_states_round_trip() {
        assert_eq!(Tail::EMPTY.state(), TailState::Empty);
        assert_eq!(Tail::SOLO.state(), TailState::Solo);
        assert_eq!(Tail::link(9).state(), TailState::Offset(9));
        assert!(Tail::EMPTY.is_empty());
        assert_eq!(Tail::SOLO.next_offset(), None);
        assert_eq!(Tail::EMPTY.next_offset(), None);
        assert_eq!(Tail::link(4).next_offset(), Some(4));
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(alloc::format!("{}", TailState::Offset(7)), "+07");
        assert_eq!(alloc::format!("{}", TailState::Solo), "solo");
    }
}
