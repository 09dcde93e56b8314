use core::fmt::Debug;

use crate::cursor::AsTailTable;
use crate::cursor::Cursor;
use crate::diagnostic::Diagnostic;
use crate::error::TableError;
use crate::tail_table;
use crate::tail_table::InsertBehavior;
use crate::tail_table::Insertion;
use crate::tail_table::TailTable;

/// A set of `i32` backed by a [`TailTable`].
///
/// Keys are hashed with Fibonacci hashing, so sequential and strided keys
/// spread well without a hasher.
///
/// # Stored sentinel
///
/// [`contains`](Self::contains) answers `true` for
/// [`DEFAULT_EMPTY_KEY`](crate::DEFAULT_EMPTY_KEY) whenever that key's home
/// bucket is vacant, even if it was never inserted. Use
/// [`contains_stored`](Self::contains_stored) for the strict answer. The
/// sentinel can be inserted and removed like any other key.
///
/// ```rust
/// use fish_table::DEFAULT_EMPTY_KEY;
/// use fish_table::IntKeyedSet;
///
/// let mut set = IntKeyedSet::new();
/// assert!(set.contains(DEFAULT_EMPTY_KEY));
/// assert!(!set.contains_stored(DEFAULT_EMPTY_KEY));
///
/// set.insert(DEFAULT_EMPTY_KEY);
/// assert!(set.contains_stored(DEFAULT_EMPTY_KEY));
/// assert_eq!(set.len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct IntKeyedSet {
    table: TailTable<()>,
}

impl PartialEq for IntKeyedSet {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|key| other.contains_stored(key))
    }
}

impl Eq for IntKeyedSet {}

impl Debug for IntKeyedSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl AsTailTable for IntKeyedSet {
    type Value = ();

    fn as_tail_table(&self) -> &TailTable<()> {
        &self.table
    }
}

impl IntKeyedSet {
    /// Creates an empty set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fish_table::IntKeyedSet;
    ///
    /// let set = IntKeyedSet::new();
    /// assert!(set.is_empty());
    /// assert_eq!(set.capacity(), 4);
    /// ```
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty set with at least `capacity` buckets.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: TailTable::with_capacity(capacity),
        }
    }

    /// The underlying table, for diagnostics.
    pub fn as_table(&self) -> &TailTable<()> {
        &self.table
    }

    /// Returns the number of keys in the set.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set holds no keys.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of buckets.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Structural modification counter.
    pub fn version(&self) -> u64 {
        self.table.version()
    }

    /// See [`TailTable::max_load_factor`].
    pub fn max_load_factor(&self) -> f32 {
        self.table.max_load_factor()
    }

    /// See [`TailTable::set_max_load_factor`].
    pub fn set_max_load_factor(&mut self, value: f32) -> Result<(), TableError> {
        self.table.set_max_load_factor(value)
    }

    /// Adds `key`. Returns `true` if it was not present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fish_table::IntKeyedSet;
    ///
    /// let mut set = IntKeyedSet::new();
    /// assert!(set.insert(2));
    /// assert!(!set.insert(2));
    /// assert_eq!(set.len(), 1);
    /// ```
    pub fn insert(&mut self, key: i32) -> bool {
        matches!(
            self.table.insert(key, (), InsertBehavior::KeepExisting),
            Ok(Insertion::Added)
        )
    }

    /// Adds `key`, failing if it is already present.
    ///
    /// # Errors
    ///
    /// [`TableError::DuplicateKey`] if `key` is already in the set.
    pub fn add(&mut self, key: i32) -> Result<(), TableError> {
        self.table
            .insert(key, (), InsertBehavior::Reject)
            .map(|_| ())
    }

    /// Flips membership of `key`. Returns `true` if the key is now present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fish_table::IntKeyedSet;
    ///
    /// let mut set = IntKeyedSet::new();
    /// assert!(set.toggle(9));
    /// assert!(!set.toggle(9));
    /// assert!(set.is_empty());
    /// ```
    pub fn toggle(&mut self, key: i32) -> bool {
        if self.table.remove(key).is_some() {
            false
        } else {
            self.table.insert_absent(key, ());
            true
        }
    }

    /// Makes membership of `key` equal to `present`. Returns `true` if the
    /// set changed.
    pub fn set_present(&mut self, key: i32, present: bool) -> bool {
        if present {
            self.insert(key)
        } else {
            self.remove(key)
        }
    }

    /// Removes `key`. Returns `true` if it was present.
    pub fn remove(&mut self, key: i32) -> bool {
        self.table.remove(key).is_some()
    }

    /// Returns `true` if `key` is in the set, or if `key` is the empty
    /// sentinel and its home bucket is vacant.
    pub fn contains(&self, key: i32) -> bool {
        if key == self.table.empty_key() && self.table.is_home_vacant(key) {
            return true;
        }
        self.table.contains_key(key)
    }

    /// Returns `true` only if `key` was inserted and not removed.
    pub fn contains_stored(&self, key: i32) -> bool {
        self.table.contains_key(key)
    }

    /// Keeps only the keys for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(i32) -> bool) {
        self.table.retain(|key, _| f(key));
    }

    /// Returns `true` if every key of `self` is stored in `other`.
    pub fn is_subset(&self, other: &IntKeyedSet) -> bool {
        self.len() <= other.len() && self.iter().all(|key| other.contains_stored(key))
    }

    /// Returns `true` if `self` and `other` share no stored key.
    pub fn is_disjoint(&self, other: &IntKeyedSet) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().all(|key| !large.contains_stored(key))
    }

    /// Removes every key, firing the removal hook for each.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// See [`TailTable::ensure_capacity`].
    pub fn ensure_capacity(&mut self, minimum: usize) -> usize {
        self.table.ensure_capacity(minimum)
    }

    /// Reserves room for at least `additional` more keys.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Shrinks the bucket array to fit the current keys.
    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit();
    }

    /// Installs a hook run once per key added.
    pub fn on_entry_added(&mut self, mut hook: impl FnMut(i32) + 'static) {
        self.table.on_entry_added(move |key, _| hook(key));
    }

    /// Installs a hook run once per key removed.
    pub fn on_entry_removed(&mut self, mut hook: impl FnMut(i32) + 'static) {
        self.table.on_entry_removed(move |key, _| hook(key));
    }

    /// See [`TailTable::on_diagnostic`].
    pub fn on_diagnostic(&mut self, hook: impl FnMut(&Diagnostic) + 'static) {
        self.table.on_diagnostic(hook);
    }

    /// Removes every installed hook.
    pub fn clear_hooks(&mut self) {
        self.table.clear_hooks();
    }

    /// Returns a version-checked [`Cursor`] positioned before the first key.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self)
    }

    /// Returns an iterator over the keys in bucket order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Removes every key and yields them in bucket order.
    pub fn drain(&mut self) -> Drain {
        Drain {
            inner: self.table.drain(),
        }
    }
}

/// Keys of an [`IntKeyedSet`] in bucket order.
pub struct Iter<'a> {
    inner: tail_table::Iter<'a, ()>,
}

impl Iterator for Iter<'_> {
    type Item = i32;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}

/// Keys removed by [`IntKeyedSet::drain`].
pub struct Drain {
    inner: tail_table::Drain<()>,
}

impl Iterator for Drain {
    type Item = i32;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Drain {}

/// A consuming iterator over the keys of an [`IntKeyedSet`].
pub struct IntoIter {
    inner: tail_table::IntoIter<()>,
}

impl Iterator for IntoIter {
    type Item = i32;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for IntoIter {}

impl IntoIterator for IntKeyedSet {
    type IntoIter = IntoIter;
    type Item = i32;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

impl<'a> IntoIterator for &'a IntKeyedSet {
    type IntoIter = Iter<'a>;
    type Item = i32;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<i32> for IntKeyedSet {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        let mut set = IntKeyedSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<i32> for IntKeyedSet {
    fn extend<I: IntoIterator<Item = i32>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve(lower);
        for key in iter {
            self.insert(key);
        }
    }
}

impl<'a> Extend<&'a i32> for IntKeyedSet {
    fn extend<I: IntoIterator<Item = &'a i32>>(&mut self, iter: I) {
        self.extend(iter.into_iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::Cell;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::tail_table::DEFAULT_EMPTY_KEY;

    #[test]
    fn insert_and_contains() {
        let mut set = IntKeyedSet::new();
        assert!(set.insert(1));
        assert!(set.insert(-1));
        assert!(!set.insert(1));
        assert!(set.contains(1));
        assert!(set.contains(-1));
        assert!(!set.contains(2));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn add_rejects_duplicates() {
        let mut set = IntKeyedSet::new();
        set.add(5).unwrap();
        assert_eq!(set.add(5), Err(TableError::DuplicateKey { key: 5 }));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn sentinel_quirk() {
        let mut set = IntKeyedSet::new();
        assert!(set.contains(DEFAULT_EMPTY_KEY));
        assert!(!set.contains_stored(DEFAULT_EMPTY_KEY));
        assert!(!set.remove(DEFAULT_EMPTY_KEY));

        assert!(set.insert(DEFAULT_EMPTY_KEY));
        assert!(set.contains(DEFAULT_EMPTY_KEY));
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().collect::<Vec<_>>(), [DEFAULT_EMPTY_KEY]);

        assert!(set.remove(DEFAULT_EMPTY_KEY));
        assert!(set.is_empty());
        assert!(set.contains(DEFAULT_EMPTY_KEY));
    }

    #[test]
    fn toggle_and_set_present() {
        let mut set = IntKeyedSet::new();
        assert!(set.toggle(3));
        assert!(set.contains(3));
        assert!(!set.toggle(3));
        assert!(!set.contains(3));

        assert!(set.set_present(8, true));
        assert!(!set.set_present(8, true));
        assert!(set.set_present(8, false));
        assert!(!set.set_present(8, false));
        assert!(set.is_empty());
    }

    #[test]
    fn set_operations() {
        let small: IntKeyedSet = [1, 2, 3].into_iter().collect();
        let large: IntKeyedSet = (0..10).collect();
        let other: IntKeyedSet = [20, 30].into_iter().collect();

        assert!(small.is_subset(&large));
        assert!(!large.is_subset(&small));
        assert!(small.is_disjoint(&other));
        assert!(other.is_disjoint(&small));
        assert!(!small.is_disjoint(&large));
        assert!(IntKeyedSet::new().is_subset(&small));
    }

    #[test]
    fn equality_ignores_layout() {
        let a: IntKeyedSet = (0..50).collect();
        let mut b = IntKeyedSet::with_capacity(1024);
        b.extend((0..50).rev());
        assert_eq!(a, b);
        b.remove(10);
        assert_ne!(a, b);
    }

    #[test]
    fn retain_and_drain() {
        let mut set: IntKeyedSet = (0..100).collect();
        set.retain(|key| key % 2 == 0);
        assert_eq!(set.len(), 50);
        assert!(set.contains(42));
        assert!(!set.contains(43));

        let mut drained: Vec<i32> = set.drain().collect();
        drained.sort_unstable();
        assert_eq!(drained, (0..100).step_by(2).collect::<Vec<_>>());
        assert!(set.is_empty());
    }

    #[test]
    fn hooks_count_net_changes() {
        let added = Rc::new(Cell::new(0));
        let removed = Rc::new(Cell::new(0));
        let mut set = IntKeyedSet::new();
        {
            let added = Rc::clone(&added);
            set.on_entry_added(move |_| added.set(added.get() + 1));
            let removed = Rc::clone(&removed);
            set.on_entry_removed(move |_| removed.set(removed.get() + 1));
        }

        for key in 0..300 {
            set.insert(key % 150);
        }
        assert_eq!(added.get(), 150);
        set.toggle(0);
        set.toggle(0);
        assert_eq!(added.get(), 151);
        assert_eq!(removed.get(), 1);

        set.clear();
        assert_eq!(removed.get(), 151);

        set.clear_hooks();
        set.insert(1);
        assert_eq!(added.get(), 151);
    }

    #[test]
    fn clone_drops_hooks() {
        let added = Rc::new(Cell::new(0));
        let mut set = IntKeyedSet::new();
        let counter = Rc::clone(&added);
        set.on_entry_added(move |_| counter.set(counter.get() + 1));
        set.insert(1);

        let mut copy = set.clone();
        copy.insert(2);
        assert_eq!(added.get(), 1);
        assert!(copy.contains(1));
    }

    #[test]
    fn cursor_over_set() {
        let mut set: IntKeyedSet = [7, 11].into_iter().collect();
        let mut cursor = set.cursor();
        assert!(cursor.move_next(&set).unwrap());
        set.remove(7);
        assert!(matches!(
            cursor.move_next(&set),
            Err(TableError::InvalidatedEnumeration { .. })
        ));
    }

    #[test]
    fn random_membership() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut set = IntKeyedSet::new();
        let mut model = alloc::collections::BTreeSet::new();
        for _ in 0..10_000 {
            let key = rng.random_range(-2_000..2_000);
            if rng.random_bool(0.5) {
                assert_eq!(set.insert(key), model.insert(key));
            } else {
                assert_eq!(set.remove(key), model.remove(&key));
            }
        }
        assert_eq!(set.len(), model.len());
        assert!(model.iter().all(|&key| set.contains_stored(key)));
        set.as_table().validate().unwrap();
    }

    #[test]
    fn debug_lists_keys() {
        let set: IntKeyedSet = [4].into_iter().collect();
        assert_eq!(alloc::format!("{set:?}"), "{4}");
    }
}
