//! Fibonacci hashing of `i32` keys onto a power-of-two bucket array.

/// `2^32 / φ`, rounded to the nearest odd integer.
pub const FIBONACCI_MULTIPLIER: u32 = 0x9E37_79B9;

/// Smallest bucket count a table will allocate.
pub const MIN_CAPACITY: usize = 4;

/// Largest bucket count a table will allocate. The hash is 32 bits wide, so
/// anything above this would leave buckets unreachable.
pub const MAX_CAPACITY: usize = 1 << 31;

/// Maps `key` to a bucket for a table whose capacity is `2^(32 - shift)`.
///
/// Multiplying by [`FIBONACCI_MULTIPLIER`] and keeping the top bits spreads
/// sequential and strided keys evenly across the array.
///
/// # Examples
///
/// ```rust
/// use fish_table::hashing::bucket_index;
/// use fish_table::hashing::shift_for;
///
/// let shift = shift_for(16);
/// assert!(bucket_index(12345, shift) < 16);
/// assert_eq!(bucket_index(12345, shift), bucket_index(12345, shift));
/// ```
#[inline(always)]
pub const fn bucket_index(key: i32, shift: u32) -> usize {
    ((key as u32).wrapping_mul(FIBONACCI_MULTIPLIER) >> shift) as usize
}

/// Right shift that turns a 32-bit product into an index below `capacity`.
///
/// `capacity` must be a power of two between [`MIN_CAPACITY`] and
/// [`MAX_CAPACITY`].
#[inline(always)]
pub const fn shift_for(capacity: usize) -> u32 {
    debug_assert!(capacity.is_power_of_two());
    32 - capacity.trailing_zeros()
}

/// Rounds a requested bucket count up to a valid capacity.
///
/// # Panics
///
/// Panics with "capacity overflow" if the request exceeds [`MAX_CAPACITY`].
pub fn capacity_for(minimum: usize) -> usize {
    let capacity = minimum.max(MIN_CAPACITY).next_power_of_two();
    assert!(capacity <= MAX_CAPACITY, "capacity overflow");
    capacity
}

/// Number of entries a table of `capacity` buckets may hold before growing.
#[inline]
pub fn load_limit(capacity: usize, max_load_factor: f32) -> usize {
    (capacity as f64 * f64::from(max_load_factor)) as usize
}

/// Smallest valid capacity, no smaller than `floor`, whose load limit admits
/// `entries`.
pub fn capacity_for_entries(floor: usize, entries: usize, max_load_factor: f32) -> usize {
    let mut capacity = capacity_for(floor);
    while load_limit(capacity, max_load_factor) < entries {
        capacity = capacity
            .checked_mul(2)
            .filter(|&c| c <= MAX_CAPACITY)
            .expect("capacity overflow");
    }
    capacity
}

/// Smallest capacity above `capacity` at which at most `limit` of `members`
/// share a home bucket with `key`.
///
/// Home buckets nest: keys apart at one capacity stay apart at every larger
/// one, so widening the hash a bit at a time finds the answer.
///
/// # Panics
///
/// Panics with "capacity overflow" if no capacity up to [`MAX_CAPACITY`]
/// separates them.
pub fn capacity_separating(capacity: usize, key: i32, members: &[i32], limit: usize) -> usize {
    let mut capacity = capacity;
    loop {
        capacity = capacity
            .checked_mul(2)
            .filter(|&c| c <= MAX_CAPACITY)
            .expect("capacity overflow");
        let shift = shift_for(capacity);
        let home = bucket_index(key, shift);
        let sharing = members
            .iter()
            .filter(|&&member| bucket_index(member, shift) == home)
            .count();
        if sharing <= limit {
            return capacity;
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        assert_eq!(capacity_for(0), 4);
        assert_eq!(capacity_for(3), 4);
        assert_eq!(capacity_for(5), 8);
        assert_eq!(capacity_for(64), 64);
        assert_eq!(capacity_for(65), 128);
    }

    #[test]
    #[should_panic(expected = "capacity overflow")]
    fn capacity_above_hash_width_panics() {
        capacity_for(MAX_CAPACITY + 1);
    }

    #[test]
    fn shift_matches_capacity() {
        assert_eq!(shift_for(4), 30);
        assert_eq!(shift_for(256), 24);
        assert_eq!(shift_for(MAX_CAPACITY), 1);
    }

    #[test]
    fn indexes_stay_in_range() {
        for capacity in [4usize, 8, 64, 1024] {
            let shift = shift_for(capacity);
            for key in [i32::MIN, -1, 0, 1, 7, 1_000_003, i32::MAX] {
                assert!(bucket_index(key, shift) < capacity);
            }
        }
    }

    #[test]
    fn sequential_keys_spread() {
        let capacity = 64;
        let shift = shift_for(capacity);
        let mut hits = vec![0usize; capacity];
        for key in 0..32 {
            hits[bucket_index(key, shift)] += 1;
        }
        // 32 sequential keys over 64 buckets: golden-ratio spacing keeps
        // every bucket at one key at most.
        assert!(hits.iter().all(|&h| h <= 1), "{hits:?}");
    }

    #[test]
    fn entries_drive_capacity() {
        assert_eq!(capacity_for_entries(4, 0, 0.5), 4);
        assert_eq!(capacity_for_entries(4, 2, 0.5), 4);
        assert_eq!(capacity_for_entries(4, 3, 0.5), 8);
        assert_eq!(capacity_for_entries(4, 100, 0.5), 256);
        assert_eq!(capacity_for_entries(4, 100, 1.0), 128);
        assert_eq!(capacity_for_entries(512, 1, 0.5), 512);
    }

    /// Keys whose Fibonacci products are `j << bits` for `j` in `0..count`.
    fn keys_with_products(count: u32, bits: u32) -> Vec<i32> {
        const INVERSE: u32 = 0x144C_BC89;
        assert_eq!(FIBONACCI_MULTIPLIER.wrapping_mul(INVERSE), 1);
        (0..count)
            .map(|j| (j << bits).wrapping_mul(INVERSE) as i32)
            .collect()
    }

    #[test]
    fn separating_capacity_skips_useless_doublings() {
        let keys = keys_with_products(17, 20);
        // All 17 keys share bucket 0 up to 128 buckets; at 256 the last one
        // moves to bucket 1.
        assert_eq!(capacity_separating(4, keys[0], &keys[1..], 15), 256);
        assert_eq!(capacity_separating(4, keys[16], &keys[..16], 15), 256);
        assert_eq!(capacity_separating(4, keys[0], &keys[1..], 16), 8);
        assert_eq!(capacity_separating(256, keys[0], &keys[1..], 15), 512);
    }
}
