use alloc::string::String;

use thiserror::Error;

/// Errors reported by the table family.
///
/// Lookups and removals of absent keys are not errors; they return `None` or
/// `false`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    /// An insertion with [`InsertBehavior::Reject`] found the key already
    /// present.
    ///
    /// [`InsertBehavior::Reject`]: crate::tail_table::InsertBehavior::Reject
    #[error("an entry with key {key} is already present")]
    DuplicateKey {
        /// The offending key.
        key: i32,
    },

    /// A [`Cursor`](crate::cursor::Cursor) was used after the table it
    /// enumerates was structurally modified.
    #[error(
        "table was modified during enumeration (cursor captured version {captured}, table is at {current})"
    )]
    InvalidatedEnumeration {
        /// Version captured when the cursor was created.
        captured: u64,
        /// Version of the table at the time of the failing call.
        current: u64,
    },

    /// `current` was called before `move_next` or after enumeration ended.
    #[error("cursor is not positioned on an entry")]
    CursorNotPositioned,

    /// The requested max load factor is outside `(0, 1]`.
    #[error("max load factor must be in (0, 1], got {value}")]
    InvalidLoadFactor {
        /// The rejected value.
        value: f32,
    },

    /// A map had to build a value for an absent key but has no value
    /// factory.
    #[error("no value factory is set to build a value for key {key}")]
    MissingValueFactory {
        /// The absent key.
        key: i32,
    },

    /// An internal invariant does not hold. This is never expected; the dump
    /// holds the full bucket array for debugging.
    #[error("table invariant violated: {message}\n{dump}")]
    Corrupted {
        /// What was found to be inconsistent.
        message: String,
        /// Output of `TailTable::dump` at the time of detection.
        dump: String,
    },
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn duplicate_key_message_names_key() {
        let err = TableError::DuplicateKey { key: -17 };
        assert_eq!(err.to_string(), "an entry with key -17 is already present");
    }

    #[test]
    fn missing_factory_message_names_key() {
        let err = TableError::MissingValueFactory { key: 8 };
        assert_eq!(err.to_string(), "no value factory is set to build a value for key 8");
    }

    #[test]
    fn corrupted_message_includes_dump() {
        let err = TableError::Corrupted {
            message: "bucket 3 is linked but empty".to_string(),
            dump: "000 | empty".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("bucket 3 is linked but empty"));
        assert!(text.ends_with("000 | empty"));
    }
}
