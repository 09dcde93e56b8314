#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Version-checked cursors that detect modification during enumeration.
pub mod cursor;

pub mod diagnostic;

/// Error type shared by every table in the crate.
pub mod error;

pub mod hashing;

/// An `i32`-keyed map built on the tail-chained table.
///
/// This module provides [`IntKeyedMap`], which adds overwrite-by-default
/// insertion, a value factory for lazy initialization and map views on top of
/// the raw [`TailTable`].
pub mod int_map;

/// An `i32` set built on the tail-chained table.
///
/// This module provides [`IntKeyedSet`], a thin wrapper over a
/// `TailTable<()>` with set operations and membership toggling.
pub mod int_set;

pub mod tail_index;

pub mod tail_table;

pub use cursor::Cursor;
pub use diagnostic::Diagnostic;
pub use error::TableError;
pub use int_map::IntKeyedMap;
pub use int_set::IntKeyedSet;
pub use tail_table::DEFAULT_EMPTY_KEY;
pub use tail_table::InsertBehavior;
pub use tail_table::TailTable;
