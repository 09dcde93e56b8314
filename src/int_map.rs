use alloc::rc::Rc;
use core::fmt::Debug;
use core::ops::Index;

use crate::cursor::AsTailTable;
use crate::cursor::Cursor;
use crate::diagnostic::Diagnostic;
use crate::error::TableError;
use crate::tail_table;
use crate::tail_table::DEFAULT_EMPTY_KEY;
use crate::tail_table::InsertBehavior;
use crate::tail_table::Insertion;
use crate::tail_table::TailTable;

type ValueFactory<V> = Rc<dyn Fn(i32) -> V>;

/// A map from `i32` keys to `V` backed by a [`TailTable`].
///
/// Besides the usual map operations it can lazily materialize values through
/// a value factory (see [`get_or_add`](Self::get_or_add)), and its empty
/// sentinel key is configurable. Any key, the sentinel included, can be
/// stored.
///
/// # Examples
///
/// ```rust
/// use fish_table::IntKeyedMap;
///
/// let mut map = IntKeyedMap::with_value_factory(|key| key * 10);
/// assert_eq!(*map.get_or_add(4), 40);
/// map.insert(5, 1);
/// assert_eq!(map[5], 1);
/// assert_eq!(map.len(), 2);
/// ```
pub struct IntKeyedMap<V> {
    table: TailTable<V>,
    factory: Option<ValueFactory<V>>,
}

impl<V> Clone for IntKeyedMap<V>
where
    V: Clone,
{
    /// Clones the entries and shares the value factory. Hooks are not
    /// cloned.
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            factory: self.factory.clone(),
        }
    }
}

impl<V> Default for IntKeyedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Debug for IntKeyedMap<V>
where
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.iter() {
            map.entry(&k, v);
        }
        map.finish()
    }
}

impl<V> PartialEq for IntKeyedMap<V>
where
    V: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter()
            .all(|(key, value)| other.get(key).is_some_and(|v| *value == *v))
    }
}

impl<V> Eq for IntKeyedMap<V> where V: Eq {}

impl<V> AsTailTable for IntKeyedMap<V> {
    type Value = V;

    fn as_tail_table(&self) -> &TailTable<V> {
        &self.table
    }
}

impl<V> Index<i32> for IntKeyedMap<V> {
    type Output = V;

    /// # Panics
    ///
    /// Panics if `key` is not present.
    fn index(&self, key: i32) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("key {key} not found"),
        }
    }
}

impl<V> IntKeyedMap<V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty map with at least `capacity` buckets.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fish_table::IntKeyedMap;
    ///
    /// let map: IntKeyedMap<String> = IntKeyedMap::with_capacity(100);
    /// assert!(map.capacity() >= 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_empty_key(capacity, DEFAULT_EMPTY_KEY)
    }

    /// Creates an empty map whose vacant buckets hold `empty_key`.
    pub fn with_empty_key(empty_key: i32) -> Self {
        Self::with_capacity_and_empty_key(0, empty_key)
    }

    /// Creates an empty map with at least `capacity` buckets whose vacant
    /// buckets hold `empty_key`.
    pub fn with_capacity_and_empty_key(capacity: usize, empty_key: i32) -> Self {
        Self {
            table: TailTable::with_capacity_and_empty_key(capacity, empty_key),
            factory: None,
        }
    }

    /// Creates an empty map that builds missing values with `factory`.
    pub fn with_value_factory(factory: impl Fn(i32) -> V + 'static) -> Self {
        let mut map = Self::new();
        map.set_value_factory(factory);
        map
    }

    /// Sets the factory used by [`get_or_add`](Self::get_or_add) and
    /// [`ensure_initialized`](Self::ensure_initialized).
    pub fn set_value_factory(&mut self, factory: impl Fn(i32) -> V + 'static) {
        self.factory = Some(Rc::new(factory));
    }

    /// The underlying table, for diagnostics.
    pub fn as_table(&self) -> &TailTable<V> {
        &self.table
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map holds no entries.
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

    /// Key written into vacant buckets.
    pub fn empty_key(&self) -> i32 {
        self.table.empty_key()
    }

    /// See [`TailTable::max_load_factor`].
    pub fn max_load_factor(&self) -> f32 {
        self.table.max_load_factor()
    }

    /// See [`TailTable::set_max_load_factor`].
    pub fn set_max_load_factor(&mut self, value: f32) -> Result<(), TableError> {
        self.table.set_max_load_factor(value)
    }

    /// Inserts `value` under `key`, returning the value it replaced.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fish_table::IntKeyedMap;
    ///
    /// let mut map = IntKeyedMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map[37], "b");
    /// ```
    pub fn insert(&mut self, key: i32, value: V) -> Option<V> {
        match self.table.insert(key, value, InsertBehavior::Overwrite) {
            Ok(Insertion::Replaced(old)) => Some(old),
            _ => None,
        }
    }

    /// Inserts `value` under `key`, failing if the key is present.
    ///
    /// # Errors
    ///
    /// [`TableError::DuplicateKey`] if `key` is already in the map.
    pub fn add(&mut self, key: i32, value: V) -> Result<(), TableError> {
        self.table
            .insert(key, value, InsertBehavior::Reject)
            .map(|_| ())
    }

    /// Inserts `value` under `key` unless the key is present. Returns `true`
    /// if the value was stored.
    pub fn try_add(&mut self, key: i32, value: V) -> bool {
        matches!(
            self.table.insert(key, value, InsertBehavior::KeepExisting),
            Ok(Insertion::Added)
        )
    }

    /// Inserts with an explicit duplicate policy. See [`TailTable::insert`].
    pub fn insert_with(
        &mut self,
        key: i32,
        value: V,
        behavior: InsertBehavior,
    ) -> Result<Insertion<V>, TableError> {
        self.table.insert(key, value, behavior)
    }

    /// Returns a reference to the value under `key`.
    pub fn get(&self, key: i32) -> Option<&V> {
        self.table.get(key)
    }

    /// Returns a mutable reference to the value under `key`.
    pub fn get_mut(&mut self, key: i32) -> Option<&mut V> {
        self.table.get_mut(key)
    }

    /// Returns a copy of the value under `key`.
    pub fn try_get_value(&self, key: i32) -> Option<V>
    where
        V: Clone,
    {
        self.table.get(key).cloned()
    }

    /// Returns `true` if `key` is stored.
    pub fn contains_key(&self, key: i32) -> bool {
        self.table.contains_key(key)
    }

    fn factory_value(&self, key: i32) -> Option<V> {
        self.factory.as_ref().map(|factory| factory(key))
    }

    /// Returns the value under `key`, first storing one built by the value
    /// factory, or `V::default()` without a factory, if the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fish_table::IntKeyedMap;
    ///
    /// let mut counts: IntKeyedMap<u32> = IntKeyedMap::new();
    /// for key in [3, 1, 3, 3] {
    ///     *counts.get_or_add(key) += 1;
    /// }
    /// assert_eq!(counts[3], 3);
    /// assert_eq!(counts[1], 1);
    /// ```
    pub fn get_or_add(&mut self, key: i32) -> &mut V
    where
        V: Default,
    {
        let index = match self.table.find_index(key) {
            Some(index) => index,
            None => {
                let value = self.factory_value(key).unwrap_or_default();
                self.table.insert_absent(key, value)
            }
        };
        self.table.value_at_mut(index)
    }

    /// Like [`get_or_add`](Self::get_or_add), but only builds values with the
    /// value factory, so `V` need not implement `Default`.
    ///
    /// # Errors
    ///
    /// [`TableError::MissingValueFactory`] if `key` is absent and no factory
    /// is set. The map is left unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fish_table::IntKeyedMap;
    ///
    /// struct Slot(i32);
    ///
    /// let mut slots = IntKeyedMap::with_value_factory(Slot);
    /// assert_eq!(slots.try_get_or_add(4)?.0, 4);
    /// # Ok::<(), fish_table::TableError>(())
    /// ```
    pub fn try_get_or_add(&mut self, key: i32) -> Result<&mut V, TableError> {
        let index = match self.table.find_index(key) {
            Some(index) => index,
            None => {
                let value = self
                    .factory_value(key)
                    .ok_or(TableError::MissingValueFactory { key })?;
                self.table.insert_absent(key, value)
            }
        };
        Ok(self.table.value_at_mut(index))
    }

    /// Returns the value under `key`, first storing `f(key)` if the key is
    /// absent.
    pub fn get_or_insert_with(&mut self, key: i32, f: impl FnOnce(i32) -> V) -> &mut V {
        let index = match self.table.find_index(key) {
            Some(index) => index,
            None => self.table.insert_absent(key, f(key)),
        };
        self.table.value_at_mut(index)
    }

    /// Makes sure `key` has a value, building one like
    /// [`get_or_add`](Self::get_or_add). Returns `true` if a value was built.
    pub fn ensure_initialized(&mut self, key: i32) -> bool
    where
        V: Default,
    {
        if self.table.contains_key(key) {
            return false;
        }
        let value = self.factory_value(key).unwrap_or_default();
        self.table.insert_absent(key, value);
        true
    }

    /// Makes sure `key` has a value, building one like
    /// [`try_get_or_add`](Self::try_get_or_add). Returns `true` if a value was
    /// built.
    ///
    /// # Errors
    ///
    /// [`TableError::MissingValueFactory`] if `key` is absent and no factory
    /// is set.
    pub fn try_ensure_initialized(&mut self, key: i32) -> Result<bool, TableError> {
        if self.table.contains_key(key) {
            return Ok(false);
        }
        let value = self
            .factory_value(key)
            .ok_or(TableError::MissingValueFactory { key })?;
        self.table.insert_absent(key, value);
        Ok(true)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: i32) -> Option<V> {
        self.table.remove(key)
    }

    /// Removes `key`, returning the stored key and value.
    pub fn remove_entry(&mut self, key: i32) -> Option<(i32, V)> {
        self.table.remove_entry(key)
    }

    /// Removes `key` only if its value equals `expected`. Returns `true` if
    /// the entry was removed.
    pub fn remove_if(&mut self, key: i32, expected: &V) -> bool
    where
        V: PartialEq,
    {
        self.table.remove_if(key, |value| value == expected).is_some()
    }

    /// Keeps only the entries for which `f` returns `true`.
    pub fn retain(&mut self, f: impl FnMut(i32, &mut V) -> bool) {
        self.table.retain(f);
    }

    /// Removes every entry, firing the removal hook for each.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// See [`TailTable::ensure_capacity`].
    pub fn ensure_capacity(&mut self, minimum: usize) -> usize {
        self.table.ensure_capacity(minimum)
    }

    /// Reserves room for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Shrinks the bucket array to fit the current entries.
    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit();
    }

    /// See [`TailTable::on_entry_added`].
    pub fn on_entry_added(&mut self, hook: impl FnMut(i32, &V) + 'static) {
        self.table.on_entry_added(hook);
    }

    /// See [`TailTable::on_entry_removed`].
    pub fn on_entry_removed(&mut self, hook: impl FnMut(i32, &V) + 'static) {
        self.table.on_entry_removed(hook);
    }

    /// See [`TailTable::on_diagnostic`].
    pub fn on_diagnostic(&mut self, hook: impl FnMut(&Diagnostic) + 'static) {
        self.table.on_diagnostic(hook);
    }

    /// Removes every installed hook.
    pub fn clear_hooks(&mut self) {
        self.table.clear_hooks();
    }

    /// Returns a version-checked [`Cursor`] positioned before the first entry.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self)
    }

    /// Returns an iterator over `(key, &value)` in bucket order.
    pub fn iter(&self) -> tail_table::Iter<'_, V> {
        self.table.iter()
    }

    /// Returns an iterator over `(key, &mut value)` in bucket order.
    pub fn iter_mut(&mut self) -> tail_table::IterMut<'_, V> {
        self.table.iter_mut()
    }

    /// Returns an iterator over the keys in bucket order.
    pub fn keys(&self) -> Keys<'_, V> {
        Keys {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the values in bucket order.
    pub fn values(&self) -> Values<'_, V> {
        Values {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over mutable values in bucket order.
    pub fn values_mut(&mut self) -> ValuesMut<'_, V> {
        ValuesMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Removes every entry and yields them in bucket order.
    pub fn drain(&mut self) -> tail_table::Drain<V> {
        self.table.drain()
    }
}

/// Keys of an [`IntKeyedMap`] in bucket order.
pub struct Keys<'a, V> {
    inner: tail_table::Iter<'a, V>,
}

impl<V> Iterator for Keys<'_, V> {
    type Item = i32;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> ExactSizeIterator for Keys<'_, V> {}

/// Values of an [`IntKeyedMap`] in bucket order.
pub struct Values<'a, V> {
    inner: tail_table::Iter<'a, V>,
}

impl<'a, V> Iterator for Values<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> ExactSizeIterator for Values<'_, V> {}

/// Mutable values of an [`IntKeyedMap`] in bucket order.
pub struct ValuesMut<'a, V> {
    inner: tail_table::IterMut<'a, V>,
}

impl<'a, V> Iterator for ValuesMut<'a, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> ExactSizeIterator for ValuesMut<'_, V> {}

impl<V> IntoIterator for IntKeyedMap<V> {
    type IntoIter = tail_table::IntoIter<V>;
    type Item = (i32, V);

    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}

impl<'a, V> IntoIterator for &'a IntKeyedMap<V> {
    type IntoIter = tail_table::Iter<'a, V>;
    type Item = (i32, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, V> IntoIterator for &'a mut IntKeyedMap<V> {
    type IntoIter = tail_table::IterMut<'a, V>;
    type Item = (i32, &'a mut V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<V> FromIterator<(i32, V)> for IntKeyedMap<V> {
    fn from_iter<I: IntoIterator<Item = (i32, V)>>(iter: I) -> Self {
        let mut map = IntKeyedMap::new();
        map.extend(iter);
        map
    }
}

impl<V> Extend<(i32, V)> for IntKeyedMap<V> {
    fn extend<I: IntoIterator<Item = (i32, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve(lower);
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}
