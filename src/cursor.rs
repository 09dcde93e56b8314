//! Version-checked enumeration.
//!
//! Rust iterators borrow the table, so they cannot observe a modification.
//! A [`Cursor`] holds no borrow: it remembers a bucket position and the
//! table's version, and every step checks that version against the table it
//! is handed. Any structural change in between fails the step with
//! [`TableError::InvalidatedEnumeration`].

use crate::error::TableError;
use crate::tail_table::TailTable;

/// Anything backed by a [`TailTable`] that a [`Cursor`] can walk.
pub trait AsTailTable {
    /// Value type of the underlying table.
    type Value;

    /// The underlying table.
    fn as_tail_table(&self) -> &TailTable<Self::Value>;
}

impl<V> AsTailTable for TailTable<V> {
    type Value = V;

    fn as_tail_table(&self) -> &TailTable<V> {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    NotStarted,
    At(usize),
    Exhausted,
}

/// A detached position within a table's bucket order.
///
/// # Examples
///
/// ```rust
/// use fish_table::IntKeyedSet;
///
/// let mut set: IntKeyedSet = [1, 2, 3].into_iter().collect();
/// let mut cursor = set.cursor();
///
/// let mut seen = Vec::new();
/// while cursor.move_next(&set).unwrap() {
///     seen.push(cursor.current_key(&set).unwrap());
/// }
/// seen.sort();
/// assert_eq!(seen, [1, 2, 3]);
///
/// cursor.reset(&set).unwrap();
/// set.insert(4);
/// assert!(cursor.move_next(&set).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Cursor {
    version: u64,
    position: Position,
}

impl Cursor {
    /// Creates a cursor positioned before the first entry of `table`.
    pub fn new<T: AsTailTable + ?Sized>(table: &T) -> Self {
        Self {
            version: table.as_tail_table().version(),
            position: Position::NotStarted,
        }
    }

    fn check<V>(&self, table: &TailTable<V>) -> Result<(), TableError> {
        if table.version() != self.version {
            return Err(TableError::InvalidatedEnumeration {
                captured: self.version,
                current: table.version(),
            });
        }
        Ok(())
    }

    /// Advances to the next entry. Returns `Ok(false)` once every entry has
    /// been visited.
    ///
    /// # Errors
    ///
    /// [`TableError::InvalidatedEnumeration`] if the table changed since the
    /// cursor was created or last reset.
    pub fn move_next<T: AsTailTable + ?Sized>(&mut self, table: &T) -> Result<bool, TableError> {
        let table = table.as_tail_table();
        self.check(table)?;

        let start = match self.position {
            Position::NotStarted => 0,
            Position::At(index) => index + 1,
            Position::Exhausted => return Ok(false),
        };
        match table.next_occupied(start) {
            Some(index) => {
                self.position = Position::At(index);
                Ok(true)
            }
            None => {
                self.position = Position::Exhausted;
                Ok(false)
            }
        }
    }

    /// Entry under the cursor.
    ///
    /// # Errors
    ///
    /// [`TableError::InvalidatedEnumeration`] if the table changed, and
    /// [`TableError::CursorNotPositioned`] before the first `move_next` or
    /// after the last one returned `false`.
    pub fn current<'a, T: AsTailTable + ?Sized>(
        &self,
        table: &'a T,
    ) -> Result<(i32, &'a T::Value), TableError> {
        let table = table.as_tail_table();
        self.check(table)?;
        match self.position {
            Position::At(index) => Ok((table.key_at(index), table.value_at(index))),
            Position::NotStarted | Position::Exhausted => Err(TableError::CursorNotPositioned),
        }
    }

    /// Key under the cursor. See [`current`](Self::current).
    pub fn current_key<T: AsTailTable + ?Sized>(&self, table: &T) -> Result<i32, TableError> {
        self.current(table).map(|(key, _)| key)
    }

    /// Moves the cursor back before the first entry.
    ///
    /// # Errors
    ///
    /// [`TableError::InvalidatedEnumeration`] if the table changed. The
    /// cursor stays invalid; create a new one to enumerate again.
    pub fn reset<T: AsTailTable + ?Sized>(&mut self, table: &T) -> Result<(), TableError> {
        self.check(table.as_tail_table())?;
        self.position = Position::NotStarted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::tail_table::InsertBehavior;

    fn table_with(keys: &[i32]) -> TailTable<i32> {
        let mut table = TailTable::new();
        for &key in keys {
            table.insert(key, key * 10, InsertBehavior::Reject).unwrap();
        }
        table
    }

    #[test]
    fn visits_every_entry_once() {
        let table = table_with(&[4, 8, 15, 16, 23, 42]);
        let mut cursor = Cursor::new(&table);
        let mut seen = Vec::new();
        while cursor.move_next(&table).unwrap() {
            let (key, value) = cursor.current(&table).unwrap();
            assert_eq!(*value, key * 10);
            seen.push(key);
        }
        seen.sort_unstable();
        assert_eq!(seen, [4, 8, 15, 16, 23, 42]);

        assert!(!cursor.move_next(&table).unwrap());
        assert_eq!(
            cursor.current(&table).unwrap_err(),
            TableError::CursorNotPositioned
        );
    }

    #[test]
    fn matches_iterator_order() {
        let table = table_with(&[100, -7, 3, 9_999]);
        let mut cursor = Cursor::new(&table);
        let mut seen = Vec::new();
        while cursor.move_next(&table).unwrap() {
            seen.push(cursor.current_key(&table).unwrap());
        }
        let iterated: Vec<i32> = table.iter().map(|(key, _)| key).collect();
        assert_eq!(seen, iterated);
    }

    #[test]
    fn current_before_move_next_fails() {
        let table = table_with(&[1]);
        let cursor = Cursor::new(&table);
        assert_eq!(
            cursor.current_key(&table),
            Err(TableError::CursorNotPositioned)
        );
    }

    #[test]
    fn empty_table_is_exhausted_immediately() {
        let table: TailTable<i32> = TailTable::new();
        let mut cursor = Cursor::new(&table);
        assert_eq!(cursor.move_next(&table), Ok(false));
    }

    #[test]
    fn modification_invalidates() {
        let mut table = table_with(&[1, 2, 3]);
        let mut cursor = Cursor::new(&table);
        assert!(cursor.move_next(&table).unwrap());

        table.insert(4, 40, InsertBehavior::Reject).unwrap();
        let err = cursor.move_next(&table).unwrap_err();
        assert!(matches!(
            err,
            TableError::InvalidatedEnumeration { captured, current } if current == captured + 1
        ));
        assert!(cursor.current(&table).is_err());
        assert!(cursor.reset(&table).is_err());
    }

    #[test]
    fn overwrite_does_not_invalidate() {
        let mut table = table_with(&[1, 2, 3]);
        let mut cursor = Cursor::new(&table);
        assert!(cursor.move_next(&table).unwrap());
        table.insert(2, 0, InsertBehavior::Overwrite).unwrap();
        assert!(cursor.move_next(&table).is_ok());
    }

    #[test]
    fn reset_restarts_enumeration() {
        let table = table_with(&[5, 6]);
        let mut cursor = Cursor::new(&table);
        while cursor.move_next(&table).unwrap() {}
        cursor.reset(&table).unwrap();
        let mut count = 0;
        while cursor.move_next(&table).unwrap() {
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
