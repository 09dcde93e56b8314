//! Property-based tests comparing the tables against `std::collections`.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use fish_table::DEFAULT_EMPTY_KEY;
use fish_table::IntKeyedMap;
use fish_table::IntKeyedSet;
use fish_table::TableError;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum MapOp {
    Insert(i32, u16),
    Remove(i32),
    Get(i32),
    Clear,
}

/// Mostly small keys so operations hit existing entries, plus some
/// arbitrary ones and the empty sentinel.
fn key_strategy() -> impl Strategy<Value = i32> {
    prop_oneof![
        6 => -64i32..64,
        2 => any::<i32>(),
        1 => Just(DEFAULT_EMPTY_KEY),
    ]
}

/// Keys that crowd a few home buckets at every capacity.
fn clustered_key_strategy() -> impl Strategy<Value = i32> {
    (0i32..48).prop_map(|n| n << 24)
}

fn map_ops_strategy() -> impl Strategy<Value = Vec<MapOp>> {
    prop::collection::vec(
        prop_oneof![
            6 => (key_strategy(), any::<u16>()).prop_map(|(k, v)| MapOp::Insert(k, v)),
            3 => key_strategy().prop_map(MapOp::Remove),
            2 => key_strategy().prop_map(MapOp::Get),
            1 => Just(MapOp::Clear),
        ],
        0..400,
    )
}

proptest! {
    #[test]
    fn prop_map_matches_model(ops in map_ops_strategy()) {
        let mut map = IntKeyedMap::new();
        let mut model = BTreeMap::new();

        for op in ops {
            match op {
                MapOp::Insert(k, v) => prop_assert_eq!(map.insert(k, v), model.insert(k, v)),
                MapOp::Remove(k) => prop_assert_eq!(map.remove(k), model.remove(&k)),
                MapOp::Get(k) => prop_assert_eq!(map.get(k), model.get(&k)),
                MapOp::Clear => {
                    map.clear();
                    model.clear();
                }
            }
            prop_assert_eq!(map.len(), model.len());
        }

        prop_assert!(map.as_table().validate().is_ok(), "{}", map.as_table().dump());
        for (k, v) in &model {
            prop_assert_eq!(map.get(*k), Some(v));
        }
    }

    #[test]
    fn prop_round_trip(keys in prop::collection::vec(any::<i32>(), 0..500)) {
        let set: IntKeyedSet = keys.iter().copied().collect();
        let distinct: BTreeSet<i32> = keys.iter().copied().collect();

        prop_assert_eq!(set.len(), distinct.len());
        for key in &keys {
            prop_assert!(set.contains_stored(*key));
        }
    }

    #[test]
    fn prop_remove_then_reinsert_is_idempotent(
        keys in prop::collection::btree_set(key_strategy(), 1..200),
        extra in key_strategy(),
    ) {
        let mut set: IntKeyedSet = keys.iter().copied().collect();
        let absent = !keys.contains(&extra);

        let len = set.len();
        let version = set.version();
        if absent {
            prop_assert!(!set.remove(extra));
            prop_assert_eq!(set.len(), len);
            prop_assert_eq!(set.version(), version);

            prop_assert!(set.insert(extra));
            prop_assert!(set.remove(extra));
            prop_assert_eq!(set.len(), len);
        }
        for key in &keys {
            prop_assert!(set.contains_stored(*key));
        }
        prop_assert_eq!(set.contains_stored(extra), !absent);
    }

    #[test]
    fn prop_duplicates_do_not_grow(key in any::<i32>(), repeats in 1usize..20) {
        let mut set = IntKeyedSet::new();
        for _ in 0..repeats {
            set.insert(key);
        }
        prop_assert_eq!(set.len(), 1);
        prop_assert_eq!(set.add(key), Err(TableError::DuplicateKey { key }));
    }

    #[test]
    fn prop_resize_preserves_contents(
        keys in prop::collection::btree_set(any::<i32>(), 0..300),
        minimum in 0usize..5_000,
    ) {
        let mut set: IntKeyedSet = keys.iter().copied().collect();
        set.ensure_capacity(minimum);
        prop_assert!(set.capacity() as f64 * 0.5 >= minimum as f64);
        for key in &keys {
            prop_assert!(set.contains_stored(*key));
        }
        set.shrink_to_fit();
        for key in &keys {
            prop_assert!(set.contains_stored(*key));
        }
        prop_assert!(set.as_table().validate().is_ok());
    }

    #[test]
    fn prop_enumeration_is_complete(
        inserted in prop::collection::vec(key_strategy(), 0..300),
        removed in prop::collection::vec(key_strategy(), 0..100),
    ) {
        let mut set: IntKeyedSet = inserted.iter().copied().collect();
        let mut model: BTreeSet<i32> = inserted.iter().copied().collect();
        for key in &removed {
            prop_assert_eq!(set.remove(*key), model.remove(key));
        }

        let listed: Vec<i32> = set.iter().collect();
        prop_assert_eq!(listed.len(), set.len());
        let unique: BTreeSet<i32> = listed.iter().copied().collect();
        prop_assert_eq!(unique, model.clone());

        let mut cursor = set.cursor();
        let mut walked = Vec::new();
        while cursor.move_next(&set).unwrap() {
            walked.push(cursor.current_key(&set).unwrap());
        }
        prop_assert_eq!(walked, listed);
    }

    #[test]
    fn prop_mutation_invalidates_cursor(
        keys in prop::collection::btree_set(-100i32..100, 1..50),
        key in -200i32..200,
        remove in any::<bool>(),
    ) {
        let mut set: IntKeyedSet = keys.iter().copied().collect();
        let mut cursor = set.cursor();
        prop_assert!(cursor.move_next(&set).unwrap());

        let changed = if remove { set.remove(key) } else { set.insert(key) };
        let step = cursor.move_next(&set);
        if changed {
            let invalidated = matches!(step, Err(TableError::InvalidatedEnumeration { .. }));
            prop_assert!(invalidated);
        } else {
            prop_assert!(step.is_ok());
        }
    }

    #[test]
    fn prop_clustered_keys_stay_consistent(
        ops in prop::collection::vec((clustered_key_strategy(), any::<bool>()), 0..300),
    ) {
        let mut set = IntKeyedSet::with_capacity(64);
        set.on_diagnostic(|_| {});
        let mut model = BTreeSet::new();
        for (key, insert) in ops {
            if insert {
                prop_assert_eq!(set.insert(key), model.insert(key));
            } else {
                prop_assert_eq!(set.remove(key), model.remove(&key));
            }
        }
        prop_assert!(set.as_table().validate().is_ok(), "{}", set.as_table().dump());
        prop_assert_eq!(set.iter().collect::<BTreeSet<_>>(), model);
    }

    #[test]
    fn prop_load_factor_respected(
        keys in prop::collection::vec(any::<i32>(), 0..400),
        factor in 0.1f32..=1.0,
    ) {
        let mut map = IntKeyedMap::new();
        map.set_max_load_factor(factor).unwrap();
        for key in keys {
            map.insert(key, ());
            let limit = (map.capacity() as f64 * f64::from(factor)) as usize;
            prop_assert!(map.len() <= limit);
        }
    }
}
