//! The raw tail-chained table shared by [`IntKeyedSet`] and [`IntKeyedMap`].
//!
//! Keys hash to a home bucket with Fibonacci hashing. A key's home bucket
//! always holds the head of that home's chain; further entries with the same
//! home are linked from it through per-bucket tail offsets. An entry that sits
//! outside its home (a displaced entry) is evicted when a key that is at home
//! in its bucket arrives, and relocated to the end of its own chain.
//!
//! [`IntKeyedSet`]: crate::IntKeyedSet
//! [`IntKeyedMap`]: crate::IntKeyedMap

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::fmt::Write;
use core::mem;

use crate::diagnostic;
use crate::diagnostic::Diagnostic;
use crate::error::TableError;
use crate::hashing;
use crate::tail_index;
use crate::tail_index::FIRST_PROBE_OFFSET;
use crate::tail_index::MAX_CHAIN_HOPS;
use crate::tail_index::MAX_PROBE_OFFSET;
use crate::tail_index::Tail;
use crate::tail_index::TailState;

/// Key stored in empty buckets unless another one is configured.
pub const DEFAULT_EMPTY_KEY: i32 = 0x7F7F_7F7F;

/// Fraction of buckets that may be occupied before the table grows.
pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 0.5;

type EntryHook<V> = Box<dyn FnMut(i32, &V)>;
type DiagnosticHook = Box<dyn FnMut(&Diagnostic)>;

struct Hooks<V> {
    entry_added: Option<EntryHook<V>>,
    entry_removed: Option<EntryHook<V>>,
    diagnostic: Option<DiagnosticHook>,
}

impl<V> Default for Hooks<V> {
    fn default() -> Self {
        Self {
            entry_added: None,
            entry_removed: None,
            diagnostic: None,
        }
    }
}

/// What [`TailTable::insert`] does when the key is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertBehavior {
    /// Leave the stored value alone and hand the new one back.
    #[default]
    KeepExisting,
    /// Replace the stored value and hand the old one back.
    Overwrite,
    /// Fail with [`TableError::DuplicateKey`].
    Reject,
}

/// Outcome of a successful [`TailTable::insert`].
#[derive(Debug, PartialEq, Eq)]
pub enum Insertion<V> {
    /// The key was new and is now stored.
    Added,
    /// The key was present; the offered value was not stored.
    Kept(V),
    /// The key was present; this is the value that was replaced.
    Replaced(V),
}

struct Stalled<V> {
    key: i32,
    value: V,
    cause: Diagnostic,
    /// Bucket count to grow to before retrying.
    capacity: usize,
}

/// Debug statistics for table analysis.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of entries currently in the table
    pub populated: usize,
    /// Number of buckets
    pub capacity: usize,
    /// Entries allowed before the next resize
    pub load_limit: usize,
    /// populated / capacity
    pub load_factor: f64,
    /// Configured maximum load factor
    pub max_load_factor: f32,
    /// Number of chains (entries at home)
    pub chains: usize,
    /// Entries stored outside their home bucket
    pub displaced: usize,
    /// Entries in the longest chain
    pub longest_chain: usize,
    /// Structural modification counter
    pub version: u64,
    /// Bytes held by the bucket arrays
    pub total_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        std::println!("=== Tail Table Debug Statistics ===");
        std::println!(
            "Population: {}/{} buckets ({:.2}% load, limit {} at {:.2})",
            self.populated,
            self.capacity,
            self.load_factor * 100.0,
            self.load_limit,
            self.max_load_factor
        );
        std::println!(
            "Chains: {} heads, {} displaced entries, longest chain {}",
            self.chains, self.displaced, self.longest_chain
        );
        std::println!("Version: {}", self.version);
        std::println!("Total Allocated: {} bytes", self.total_bytes);
    }
}

/// An open-addressing table from `i32` keys to values of type `V`.
///
/// This is the engine behind [`IntKeyedSet`](crate::IntKeyedSet) and
/// [`IntKeyedMap`](crate::IntKeyedMap). It is usable on its own when the
/// insertion policy should be chosen per call.
///
/// ## Layout
///
/// Three parallel arrays of `capacity()` buckets: keys, values and one tail
/// byte per bucket. The tail byte alone decides whether a bucket is occupied,
/// so the empty key (see [`DEFAULT_EMPTY_KEY`]) can itself be stored.
///
/// ## Example
///
/// ```rust
/// use fish_table::tail_table::InsertBehavior;
/// use fish_table::tail_table::Insertion;
/// use fish_table::TailTable;
///
/// let mut table = TailTable::with_capacity(16);
/// assert_eq!(
///     table.insert(7, "seven", InsertBehavior::KeepExisting),
///     Ok(Insertion::Added)
/// );
/// assert_eq!(
///     table.insert(7, "SEVEN", InsertBehavior::Overwrite),
///     Ok(Insertion::Replaced("seven"))
/// );
/// assert!(table.insert(7, "again", InsertBehavior::Reject).is_err());
/// assert_eq!(table.get(7), Some(&"SEVEN"));
/// ```
pub struct TailTable<V> {
    keys: Box<[i32]>,
    values: Box<[Option<V>]>,
    tails: Box<[Tail]>,

    len: usize,
    load_limit: usize,
    shift: u32,
    mask: usize,

    max_load_factor: f32,
    empty_key: i32,
    version: u64,

    hooks: Hooks<V>,
}

fn empty_values<V>(capacity: usize) -> Box<[Option<V>]> {
    (0..capacity).map(|_| None).collect()
}

impl<V> Debug for TailTable<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            return f
                .debug_struct("TailTable")
                .field("buckets", &"empty")
                .field("len", &self.len)
                .field("capacity", &self.capacity())
                .field("version", &self.version)
                .finish();
        }

        f.debug_struct("TailTable")
            .field(
                "buckets",
                &self
                    .tails
                    .chunks(16)
                    .zip(self.keys.chunks(16))
                    .map(|(tails, keys)| {
                        let mut items = Vec::new();
                        for (tail, key) in tails.iter().zip(keys) {
                            if tail.is_empty() {
                                items.push(String::from("....."));
                            } else {
                                items.push(format!("{key}{}", tail.state()));
                            }
                        }
                        items.join(", ")
                    })
                    .collect::<Vec<_>>(),
            )
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("version", &self.version)
            .finish()
    }
}

impl<V> Clone for TailTable<V>
where
    V: Clone,
{
    /// Clones the stored entries. Hooks are not cloned.
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            values: self.values.clone(),
            tails: self.tails.clone(),
            len: self.len,
            load_limit: self.load_limit,
            shift: self.shift,
            mask: self.mask,
            max_load_factor: self.max_load_factor,
            empty_key: self.empty_key,
            version: self.version,
            hooks: Hooks::default(),
        }
    }
}

impl<V> Default for TailTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TailTable<V> {
    /// Creates an empty table with the minimum capacity of four buckets.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty table with at least `capacity` buckets.
    ///
    /// The bucket count is rounded up to a power of two, and is never below
    /// four. With the default load factor half of the buckets can be filled
    /// before the table grows.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fish_table::TailTable;
    ///
    /// let table: TailTable<u8> = TailTable::with_capacity(100);
    /// assert_eq!(table.capacity(), 128);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_empty_key(capacity, DEFAULT_EMPTY_KEY)
    }

    /// Creates an empty table that fills vacant key slots with `empty_key`.
    pub fn with_capacity_and_empty_key(capacity: usize, empty_key: i32) -> Self {
        let capacity = hashing::capacity_for(capacity);
        Self {
            keys: vec![empty_key; capacity].into_boxed_slice(),
            values: empty_values(capacity),
            tails: vec![Tail::EMPTY; capacity].into_boxed_slice(),
            len: 0,
            load_limit: hashing::load_limit(capacity, DEFAULT_MAX_LOAD_FACTOR),
            shift: hashing::shift_for(capacity),
            mask: capacity - 1,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            empty_key,
            version: 0,
            hooks: Hooks::default(),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets. Always a power of two, at least four.
    pub fn capacity(&self) -> usize {
        self.keys.len()
    }

    /// Counter bumped by every structural change: insertion of a new key,
    /// removal, clear and resize. Overwriting a value does not bump it.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Key written into vacant buckets.
    pub fn empty_key(&self) -> i32 {
        self.empty_key
    }

    /// Fraction of buckets that may be filled before the table grows.
    pub fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    /// Changes the max load factor, growing the table right away if the
    /// current population no longer fits.
    ///
    /// # Errors
    ///
    /// [`TableError::InvalidLoadFactor`] unless `0 < value <= 1`.
    pub fn set_max_load_factor(&mut self, value: f32) -> Result<(), TableError> {
        if !(value > 0.0 && value <= 1.0) {
            return Err(TableError::InvalidLoadFactor { value });
        }

        self.max_load_factor = value;
        self.load_limit = hashing::load_limit(self.capacity(), value);
        if self.len > self.load_limit {
            let capacity = hashing::capacity_for_entries(self.capacity(), self.len, value);
            self.resize(capacity);
        }
        Ok(())
    }

    /// Installs a hook run after every insertion of a new key.
    ///
    /// Relocations performed while resolving collisions or resizing do not
    /// trigger it.
    pub fn on_entry_added(&mut self, hook: impl FnMut(i32, &V) + 'static) {
        self.hooks.entry_added = Some(Box::new(hook));
    }

    /// Installs a hook run after every removal, including each entry removed
    /// by [`clear`](Self::clear) and [`drain`](Self::drain).
    pub fn on_entry_removed(&mut self, hook: impl FnMut(i32, &V) + 'static) {
        self.hooks.entry_removed = Some(Box::new(hook));
    }

    /// Installs a hook that receives collision diagnostics instead of the
    /// default sink.
    pub fn on_diagnostic(&mut self, hook: impl FnMut(&Diagnostic) + 'static) {
        self.hooks.diagnostic = Some(Box::new(hook));
    }

    /// Removes every installed hook.
    pub fn clear_hooks(&mut self) {
        self.hooks = Hooks::default();
    }

    #[inline(always)]
    fn home_index(&self, key: i32) -> usize {
        hashing::bucket_index(key, self.shift)
    }

    #[inline(always)]
    fn probe(&self, index: usize, offset: u8) -> usize {
        tail_index::probe(index, offset, self.mask)
    }

    /// Bucket holding `key`, if stored.
    pub(crate) fn find_index(&self, key: i32) -> Option<usize> {
        let home = self.home_index(key);
        if self.tails[home].is_empty() {
            return None;
        }
        if self.keys[home] == key {
            return Some(home);
        }
        if self.home_index(self.keys[home]) != home {
            return None;
        }

        let mut index = home;
        for _ in 0..MAX_CHAIN_HOPS {
            let offset = self.tails[index].next_offset()?;
            index = self.probe(index, offset);
            if self.tails[index].is_empty() {
                self.corrupted(format!(
                    "chain at bucket {home} links to empty bucket {index}"
                ));
            }
            if self.keys[index] == key {
                return Some(index);
            }
        }

        if self.tails[index].next_offset().is_some() {
            self.corrupted(format!(
                "chain at bucket {home} exceeds {MAX_CHAIN_HOPS} hops"
            ));
        }
        None
    }

    /// Returns `true` if the home bucket of `key` holds no entry.
    pub(crate) fn is_home_vacant(&self, key: i32) -> bool {
        self.tails[self.home_index(key)].is_empty()
    }

    pub(crate) fn next_occupied(&self, start: usize) -> Option<usize> {
        (start..self.capacity()).find(|&index| !self.tails[index].is_empty())
    }

    pub(crate) fn key_at(&self, index: usize) -> i32 {
        self.keys[index]
    }

    pub(crate) fn value_at(&self, index: usize) -> &V {
        self.values[index]
            .as_ref()
            .unwrap_or_else(|| self.corrupted(format!("bucket {index} holds no value")))
    }

    pub(crate) fn value_at_mut(&mut self, index: usize) -> &mut V {
        match self.values[index] {
            Some(ref mut value) => value,
            None => self.corrupted(format!("bucket {index} holds no value")),
        }
    }

    /// Returns `true` if `key` is stored.
    pub fn contains_key(&self, key: i32) -> bool {
        self.find_index(key).is_some()
    }

    /// Returns a reference to the value stored under `key`.
    pub fn get(&self, key: i32) -> Option<&V> {
        self.find_index(key).map(|index| self.value_at(index))
    }

    /// Returns a mutable reference into the live bucket array.
    ///
    /// The reference cannot outlive the next mutation of the table.
    pub fn get_mut(&mut self, key: i32) -> Option<&mut V> {
        let index = self.find_index(key)?;
        Some(self.value_at_mut(index))
    }

    /// Inserts `value` under `key`, resolving an existing entry according to
    /// `behavior`.
    ///
    /// # Errors
    ///
    /// [`TableError::DuplicateKey`] if the key is present and `behavior` is
    /// [`InsertBehavior::Reject`]. The offered value is dropped.
    pub fn insert(
        &mut self,
        key: i32,
        value: V,
        behavior: InsertBehavior,
    ) -> Result<Insertion<V>, TableError> {
        if let Some(index) = self.find_index(key) {
            return match behavior {
                InsertBehavior::KeepExisting => Ok(Insertion::Kept(value)),
                InsertBehavior::Overwrite => Ok(Insertion::Replaced(mem::replace(
                    self.value_at_mut(index),
                    value,
                ))),
                InsertBehavior::Reject => Err(TableError::DuplicateKey { key }),
            };
        }

        self.insert_absent(key, value);
        Ok(Insertion::Added)
    }

    /// Stores a key known to be absent and returns its bucket.
    pub(crate) fn insert_absent(&mut self, key: i32, value: V) -> usize {
        debug_assert!(self.find_index(key).is_none());
        if self.len >= self.load_limit {
            let capacity =
                hashing::capacity_for_entries(self.capacity(), self.len + 1, self.max_load_factor);
            self.resize(capacity);
        }

        let Some(index) = self.settle(VecDeque::from([(key, value)]), Some(key)) else {
            self.corrupted(format!("key {key} was never placed"));
        };
        self.version += 1;
        debug_assert_eq!(self.find_index(key), Some(index));
        if let Some(hook) = self.hooks.entry_added.as_mut() {
            hook(key, self.values[index].as_ref().expect("occupied bucket holds a value"));
        }
        index
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: i32) -> Option<V> {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes `key`, returning the stored key and value.
    pub fn remove_entry(&mut self, key: i32) -> Option<(i32, V)> {
        let index = self.find_index(key)?;
        Some(self.remove_at(index))
    }

    /// Removes `key` only if `predicate` accepts its current value.
    pub fn remove_if(&mut self, key: i32, predicate: impl FnOnce(&V) -> bool) -> Option<V> {
        let index = self.find_index(key)?;
        if !predicate(self.value_at(index)) {
            return None;
        }
        Some(self.remove_at(index).1)
    }

    pub(crate) fn remove_at(&mut self, index: usize) -> (i32, V) {
        if let Some(parent) = self.parent_of(index) {
            self.tails[parent] = Tail::SOLO;
        }

        let tail = self.tails[index];
        let (key, value) = self.vacate(index);
        if let Some(offset) = tail.next_offset() {
            // Everything chained after the removed entry is relinked from
            // scratch; the first one lands in the home bucket if the head was
            // removed.
            let mut pending = VecDeque::new();
            self.drain_chain(self.probe(index, offset), &mut pending);
            self.settle(pending, None);
        }
        self.version += 1;

        if let Some(hook) = self.hooks.entry_removed.as_mut() {
            hook(key, &value);
        }
        (key, value)
    }

    /// Keeps only the entries for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(i32, &mut V) -> bool) {
        let doomed: Vec<i32> = self
            .iter_mut()
            .filter_map(|(key, value)| (!f(key, value)).then_some(key))
            .collect();
        for key in doomed {
            self.remove(key);
        }
    }

    /// Removes all entries, keeping the current capacity.
    pub fn clear(&mut self) {
        let removed = self.take_all();
        if let Some(hook) = self.hooks.entry_removed.as_mut() {
            for (key, value) in &removed {
                hook(*key, value);
            }
        }
    }

    /// Removes all entries and yields them in bucket order.
    pub fn drain(&mut self) -> Drain<V> {
        let removed = self.take_all();
        if let Some(hook) = self.hooks.entry_removed.as_mut() {
            for (key, value) in &removed {
                hook(*key, value);
            }
        }
        Drain {
            inner: removed.into_iter(),
        }
    }

    fn take_all(&mut self) -> Vec<(i32, V)> {
        let mut removed = Vec::with_capacity(self.len);
        for index in 0..self.capacity() {
            if !self.tails[index].is_empty() {
                removed.push(self.vacate(index));
            }
        }
        debug_assert_eq!(self.len, 0);
        self.version += 1;
        removed
    }

    /// Grows the table so that `minimum` entries fit without another resize,
    /// and returns the resulting bucket count.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fish_table::TailTable;
    ///
    /// let mut table: TailTable<()> = TailTable::new();
    /// assert_eq!(table.ensure_capacity(100), 256);
    /// ```
    pub fn ensure_capacity(&mut self, minimum: usize) -> usize {
        if minimum > self.load_limit {
            let capacity =
                hashing::capacity_for_entries(self.capacity(), minimum, self.max_load_factor);
            self.resize(capacity);
        }
        self.capacity()
    }

    /// Reserves room for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        self.ensure_capacity(self.len.saturating_add(additional));
    }

    /// Shrinks the bucket array to the smallest size that holds the current
    /// entries under the max load factor.
    pub fn shrink_to_fit(&mut self) {
        let capacity =
            hashing::capacity_for_entries(hashing::MIN_CAPACITY, self.len, self.max_load_factor);
        if capacity < self.capacity() {
            self.resize(capacity);
        }
    }

    fn occupy(&mut self, index: usize, key: i32, value: V, tail: Tail) {
        debug_assert!(self.tails[index].is_empty());
        self.keys[index] = key;
        self.values[index] = Some(value);
        self.tails[index] = tail;
        self.len += 1;
    }

    fn vacate(&mut self, index: usize) -> (i32, V) {
        let key = mem::replace(&mut self.keys[index], self.empty_key);
        let value = self.values[index]
            .take()
            .expect("occupied bucket holds a value");
        self.tails[index] = Tail::EMPTY;
        self.len -= 1;
        (key, value)
    }

    /// Bucket whose tail links to `index`, or `None` if `index` holds the
    /// head of its chain.
    fn parent_of(&self, index: usize) -> Option<usize> {
        let home = self.home_index(self.keys[index]);
        if home == index {
            return None;
        }

        let mut current = home;
        for _ in 0..MAX_CHAIN_HOPS {
            let Some(offset) = self.tails[current].next_offset() else {
                break;
            };
            let next = self.probe(current, offset);
            if next == index {
                return Some(current);
            }
            current = next;
        }

        self.corrupted(format!(
            "bucket {index} (key {}) is not linked from its home bucket {home}",
            self.keys[index]
        ))
    }

    /// Vacates `start` and every bucket chained after it, queueing the
    /// entries.
    fn drain_chain(&mut self, start: usize, pending: &mut VecDeque<(i32, V)>) {
        let mut index = start;
        for _ in 0..=MAX_CHAIN_HOPS {
            let tail = self.tails[index];
            if tail.is_empty() {
                self.corrupted(format!("chain through bucket {start} reaches empty bucket {index}"));
            }
            pending.push_back(self.vacate(index));
            match tail.next_offset() {
                Some(offset) => index = self.probe(index, offset),
                None => return,
            }
        }

        self.corrupted(format!(
            "chain through bucket {start} exceeds {MAX_CHAIN_HOPS} hops"
        ))
    }

    /// Unlinks `start` from its parent and queues it with its successors.
    fn detach_from(&mut self, start: usize, pending: &mut VecDeque<(i32, V)>) {
        if let Some(parent) = self.parent_of(start) {
            self.tails[parent] = Tail::SOLO;
        }
        self.drain_chain(start, pending);
    }

    /// Returns `true` if the entry at `target` should give up its bucket to an
    /// entry of the chain at `home` linking in with `offset`.
    ///
    /// Chain heads and entries of the same chain never yield. A displaced
    /// entry yields when its own link offset is larger than `offset`.
    fn yields_to(&self, target: usize, home: usize, offset: u8) -> bool {
        let occupant_home = self.home_index(self.keys[target]);
        if occupant_home == target || occupant_home == home {
            return false;
        }
        let Some(parent) = self.parent_of(target) else {
            return false;
        };
        self.tails[parent]
            .next_offset()
            .is_some_and(|recorded| recorded > offset)
    }

    /// Places one entry whose key is known to be absent.
    ///
    /// Entries evicted on the way are pushed onto `pending`. Returns the bucket
    /// used, or the entry back if the table has to grow before it can be
    /// placed.
    fn place(
        &mut self,
        key: i32,
        value: V,
        pending: &mut VecDeque<(i32, V)>,
    ) -> Result<usize, Stalled<V>> {
        let home = self.home_index(key);
        if self.tails[home].is_empty() {
            self.occupy(home, key, value, Tail::SOLO);
            return Ok(home);
        }

        if self.home_index(self.keys[home]) != home {
            self.detach_from(home, pending);
            self.occupy(home, key, value, Tail::SOLO);
            return Ok(home);
        }

        let mut last = home;
        let mut hops = 0;
        while let Some(offset) = self.tails[last].next_offset() {
            last = self.probe(last, offset);
            hops += 1;
            if hops > MAX_CHAIN_HOPS {
                self.corrupted(format!(
                    "chain at bucket {home} exceeds {MAX_CHAIN_HOPS} hops"
                ));
            }
        }

        if hops >= MAX_CHAIN_HOPS {
            let members: Vec<i32> = self
                .chain_from(home)
                .into_iter()
                .map(|index| self.keys[index])
                .collect();
            return Err(Stalled {
                key,
                value,
                cause: Diagnostic::ChainOverflow {
                    key,
                    home,
                    hops,
                    capacity: self.capacity(),
                },
                capacity: hashing::capacity_separating(
                    self.capacity(),
                    key,
                    &members,
                    MAX_CHAIN_HOPS,
                ),
            });
        }

        for offset in FIRST_PROBE_OFFSET..=MAX_PROBE_OFFSET {
            let target = self.probe(last, offset);
            if self.tails[target].is_empty() {
                self.tails[last] = Tail::link(offset);
                self.occupy(target, key, value, Tail::SOLO);
                return Ok(target);
            }
        }

        for offset in FIRST_PROBE_OFFSET..=MAX_PROBE_OFFSET {
            let target = self.probe(last, offset);
            if self.yields_to(target, home, offset) {
                self.detach_from(target, pending);
                self.tails[last] = Tail::link(offset);
                self.occupy(target, key, value, Tail::SOLO);
                return Ok(target);
            }
        }

        Err(Stalled {
            key,
            value,
            cause: Diagnostic::ProbeExhausted {
                key,
                home,
                capacity: self.capacity(),
            },
            capacity: self.doubled_capacity(),
        })
    }

    /// Places every queued entry, growing the table whenever a placement
    /// stalls or relocations stop converging.
    ///
    /// Returns the final bucket of `tracked`, if it was among the entries.
    fn settle(&mut self, mut pending: VecDeque<(i32, V)>, tracked: Option<i32>) -> Option<usize> {
        let mut placed = None;
        let mut budget = pending.len() + self.capacity();
        while let Some((key, value)) = pending.pop_front() {
            if budget == 0 {
                pending.push_front((key, value));
                self.report(Diagnostic::RelocationLimit {
                    queued: pending.len(),
                    capacity: self.capacity(),
                });
                self.grow(self.doubled_capacity(), &mut pending);
                budget = pending.len() + self.capacity();
                continue;
            }
            budget -= 1;

            match self.place(key, value, &mut pending) {
                Ok(index) => {
                    if tracked == Some(key) {
                        placed = Some(index);
                    }
                }
                Err(stalled) => {
                    self.report(stalled.cause);
                    pending.push_front((stalled.key, stalled.value));
                    self.grow(stalled.capacity, &mut pending);
                    budget = pending.len() + self.capacity();
                }
            }
        }
        placed
    }

    fn doubled_capacity(&self) -> usize {
        self.capacity()
            .checked_mul(2)
            .filter(|&capacity| capacity <= hashing::MAX_CAPACITY)
            .expect("capacity overflow")
    }

    fn grow(&mut self, capacity: usize, pending: &mut VecDeque<(i32, V)>) {
        let mut entries = self.reallocate(capacity);
        entries.append(pending);
        *pending = entries;
    }

    fn resize(&mut self, capacity: usize) {
        let entries = self.reallocate(capacity);
        self.settle(entries, None);
    }

    /// Swaps in empty arrays of `capacity` buckets and returns the live
    /// entries of the old ones in bucket order.
    fn reallocate(&mut self, capacity: usize) -> VecDeque<(i32, V)> {
        let keys = mem::replace(
            &mut self.keys,
            vec![self.empty_key; capacity].into_boxed_slice(),
        );
        let values = mem::replace(&mut self.values, empty_values(capacity));
        let tails = mem::replace(
            &mut self.tails,
            vec![Tail::EMPTY; capacity].into_boxed_slice(),
        );

        self.shift = hashing::shift_for(capacity);
        self.mask = capacity - 1;
        self.load_limit = hashing::load_limit(capacity, self.max_load_factor);
        self.len = 0;
        self.version += 1;

        let mut entries = VecDeque::with_capacity(keys.len());
        for ((key, value), tail) in keys.iter().zip(values.into_vec()).zip(tails.iter()) {
            if tail.is_empty() {
                continue;
            }
            entries.push_back((*key, value.expect("occupied bucket holds a value")));
        }
        entries
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        if let Some(hook) = self.hooks.diagnostic.as_mut() {
            hook(&diagnostic);
            return;
        }
        diagnostic::default_sink(&diagnostic, || self.dump());
    }

    #[cold]
    #[inline(never)]
    fn corrupted(&self, message: String) -> ! {
        panic!(
            "{}",
            TableError::Corrupted {
                message,
                dump: self.dump(),
            }
        )
    }

    /// Returns an iterator over `(key, &value)` in bucket order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            table: self,
            bucket_index: 0,
            remaining: self.len,
        }
    }

    /// Returns an iterator over `(key, &mut value)` in bucket order.
    pub fn iter_mut(&mut self) -> IterMut<'_, V> {
        IterMut {
            inner: self.keys.iter().zip(self.values.iter_mut()),
            remaining: self.len,
        }
    }

    /// Tail state of bucket `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity()`.
    pub fn tail_state(&self, index: usize) -> TailState {
        self.tails[index].state()
    }

    /// Number of entries stored outside their home bucket.
    pub fn collision_count(&self) -> usize {
        (0..self.capacity())
            .filter(|&index| {
                !self.tails[index].is_empty() && self.home_index(self.keys[index]) != index
            })
            .count()
    }

    /// Bucket indices of the chain rooted at the home bucket of `key`, head
    /// first. Empty if no stored key has that home.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fish_table::IntKeyedSet;
    ///
    /// let mut set = IntKeyedSet::new();
    /// set.insert(3);
    /// let chain = set.as_table().chain(3);
    /// assert_eq!(chain.len(), 1);
    /// assert!(set.as_table().chain(4).len() <= 1);
    /// ```
    pub fn chain(&self, key: i32) -> Vec<usize> {
        self.chain_from(self.home_index(key))
    }

    fn chain_from(&self, home: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        if self.tails[home].is_empty() || self.home_index(self.keys[home]) != home {
            return chain;
        }

        let mut index = home;
        chain.push(index);
        while let Some(offset) = self.tails[index].next_offset() {
            if chain.len() > MAX_CHAIN_HOPS {
                break;
            }
            index = self.probe(index, offset);
            chain.push(index);
        }
        chain
    }

    /// Entries in the longest chain, `0` for an empty table.
    pub fn longest_chain(&self) -> usize {
        (0..self.capacity())
            .map(|home| self.chain_from(home).len())
            .max()
            .unwrap_or(0)
    }

    /// Renders every bucket, one per line, for diagnostics.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "TailTable: {} entries, {} buckets, version {}, empty key {:#x}",
            self.len,
            self.capacity(),
            self.version,
            self.empty_key
        );
        for (index, (key, tail)) in self.keys.iter().zip(self.tails.iter()).enumerate() {
            if tail.is_empty() {
                let _ = writeln!(out, "{index:>6} | empty");
                continue;
            }
            let home = self.home_index(*key);
            let marker = if home == index { "head" } else { "tail" };
            let _ = writeln!(
                out,
                "{index:>6} | {:>5} | key {key:>11} | home {home:>6} | {marker}",
                tail.state()
            );
        }
        out
    }

    /// Checks every structural invariant of the table.
    ///
    /// # Errors
    ///
    /// [`TableError::Corrupted`] describing the first violation found.
    pub fn validate(&self) -> Result<(), TableError> {
        let fail = |message: String| {
            Err(TableError::Corrupted {
                message,
                dump: self.dump(),
            })
        };

        let capacity = self.capacity();
        if !capacity.is_power_of_two() || capacity < hashing::MIN_CAPACITY {
            return fail(format!("capacity {capacity} is not a power of two >= 4"));
        }
        if self.values.len() != capacity || self.tails.len() != capacity {
            return fail(String::from("bucket arrays differ in length"));
        }
        if self.mask != capacity - 1 || self.shift != hashing::shift_for(capacity) {
            return fail(String::from("mask or shift does not match capacity"));
        }

        let mut occupied = 0;
        for index in 0..capacity {
            let empty = self.tails[index].is_empty();
            if empty == self.values[index].is_some() {
                return fail(format!("bucket {index} value presence disagrees with its tail"));
            }
            if empty && self.keys[index] != self.empty_key {
                return fail(format!("empty bucket {index} does not hold the empty key"));
            }
            if !empty {
                occupied += 1;
            }
        }
        if occupied != self.len {
            return fail(format!("{occupied} occupied buckets but len is {}", self.len));
        }
        if self.len > self.load_limit {
            return fail(format!(
                "{} entries exceed the load limit {}",
                self.len, self.load_limit
            ));
        }

        let mut reached = vec![false; capacity];
        for home in 0..capacity {
            if self.tails[home].is_empty() || self.home_index(self.keys[home]) != home {
                continue;
            }

            let mut index = home;
            let mut hops = 0;
            loop {
                if reached[index] {
                    return fail(format!("bucket {index} is reached twice"));
                }
                reached[index] = true;

                let Some(offset) = self.tails[index].next_offset() else {
                    break;
                };
                hops += 1;
                if hops > MAX_CHAIN_HOPS {
                    return fail(format!("chain at bucket {home} exceeds {MAX_CHAIN_HOPS} hops"));
                }
                index = self.probe(index, offset);
                if self.tails[index].is_empty() {
                    return fail(format!("chain at bucket {home} links to empty bucket {index}"));
                }
                if self.home_index(self.keys[index]) != home {
                    return fail(format!(
                        "bucket {index} holds key {} of another chain but is linked from {home}",
                        self.keys[index]
                    ));
                }
            }
        }

        for index in 0..capacity {
            if !self.tails[index].is_empty() && !reached[index] {
                return fail(format!(
                    "bucket {index} (key {}) is not reachable from its home bucket",
                    self.keys[index]
                ));
            }
        }

        Ok(())
    }

    /// Number of chains by hop count: entry `n` counts chains with `n` hops.
    #[cfg(any(test, feature = "stats"))]
    pub fn chain_histogram(&self) -> Vec<usize> {
        let mut hist = vec![0usize; MAX_CHAIN_HOPS + 1];
        for home in 0..self.capacity() {
            let chain = self.chain_from(home);
            if !chain.is_empty() {
                hist[chain.len() - 1] += 1;
            }
        }
        hist
    }

    /// Returns detailed utilization statistics for debugging.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        let capacity = self.capacity();
        let displaced = self.collision_count();
        DebugStats {
            populated: self.len,
            capacity,
            load_limit: self.load_limit,
            load_factor: self.len as f64 / capacity as f64,
            max_load_factor: self.max_load_factor,
            chains: self.len - displaced,
            displaced,
            longest_chain: self.longest_chain(),
            version: self.version,
            total_bytes: capacity
                * (mem::size_of::<i32>() + mem::size_of::<Option<V>>() + mem::size_of::<Tail>()),
        }
    }

    /// Pretty-prints the chain histogram horizontally using stdout.
    #[cfg(all(any(test, feature = "stats"), feature = "std"))]
    pub fn print_chain_histogram(&self) {
        let hist = self.chain_histogram();
        let max = *hist.iter().max().unwrap_or(&0);
        if max == 0 {
            std::println!("chain histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        std::println!("chain histogram ({} entries):", self.len);

        let make_bar = |count: usize| -> String {
            if count == 0 {
                return String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let mut bar = "█".repeat(units / 8);
            let ch = match units % 8 {
                0 => None,
                1 => Some('▏'),
                2 => Some('▎'),
                3 => Some('▍'),
                4 => Some('▌'),
                5 => Some('▋'),
                6 => Some('▊'),
                _ => Some('▉'),
            };
            bar.extend(ch);
            bar
        };

        for (hops, &count) in hist.iter().enumerate() {
            std::println!("{hops:>2} | {} ({count})", make_bar(count));
        }
    }
}

/// An iterator over the entries of a [`TailTable`] in bucket order.
pub struct Iter<'a, V> {
    table: &'a TailTable<V>,
    bucket_index: usize,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (i32, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.table.next_occupied(self.bucket_index)?;
        self.bucket_index = index + 1;
        self.remaining -= 1;
        Some((self.table.keys[index], self.table.value_at(index)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

/// A mutable iterator over the entries of a [`TailTable`] in bucket order.
pub struct IterMut<'a, V> {
    inner: core::iter::Zip<core::slice::Iter<'a, i32>, core::slice::IterMut<'a, Option<V>>>,
    remaining: usize,
}

impl<'a, V> Iterator for IterMut<'a, V> {
    type Item = (i32, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        for (key, value) in self.inner.by_ref() {
            if let Some(value) = value.as_mut() {
                self.remaining -= 1;
                return Some((*key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for IterMut<'_, V> {}

/// Entries removed by [`TailTable::drain`], in bucket order.
pub struct Drain<V> {
    inner: alloc::vec::IntoIter<(i32, V)>,
}

impl<V> Iterator for Drain<V> {
    type Item = (i32, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> ExactSizeIterator for Drain<V> {}

/// A consuming iterator over the entries of a [`TailTable`].
pub struct IntoIter<V> {
    inner: alloc::vec::IntoIter<(i32, V)>,
}

impl<V> Iterator for IntoIter<V> {
    type Item = (i32, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> ExactSizeIterator for IntoIter<V> {}

impl<V> IntoIterator for TailTable<V> {
    type IntoIter = IntoIter<V>;
    type Item = (i32, V);

    /// Consumes the table. Removal hooks do not run.
    fn into_iter(mut self) -> Self::IntoIter {
        IntoIter {
            inner: self.take_all().into_iter(),
        }
    }
}

impl<'a, V> IntoIterator for &'a TailTable<V> {
    type IntoIter = Iter<'a, V>;
    type Item = (i32, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
