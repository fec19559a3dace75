#![cfg(test)]

// Property tests for HashTable kept inside the crate so they can call the
// structural self-check.

use crate::error::Error;
use crate::hash::hash_bytes;
use crate::hash_table::{HashTable, Insert, ResizeMode, TableConfig};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeSet, HashMap};

// Stored record: keyed by `key`, carrying a mutable payload.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Rec {
    key: String,
    val: i32,
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Remove(usize),
    Find(usize),
    Mutate(usize, i32),
    Iterate,
    Drain,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            4 => idx.clone().prop_map(OpI::Remove),
            2 => idx.clone().prop_map(OpI::Find),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::Drain),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn new_table(resize: ResizeMode) -> HashTable<Rec> {
    HashTable::with_config(
        TableConfig {
            resize,
            ..TableConfig::default()
        },
        |a: &Rec, b: &Rec, _| a.key == b.key,
    )
    .expect("table allocation")
}

// State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Duplicate keys report `Exists` with the stored record and hand the probe back.
// - `find`/`remove` agree with the model; removing an absent key is `NotFound`.
// - `iter` yields each live record exactly once; `drain` empties both.
// - After every op the chains, the free list and `used` are consistent
//   and `size` stays a power of two at or above the floor.
fn run_scenario(
    pool: &[String],
    ops: Vec<OpI>,
    resize: ResizeMode,
    hash_of: fn(&str) -> u32,
) -> Result<(), TestCaseError> {
    let mut sut = new_table(resize);
    let mut model: HashMap<String, i32> = HashMap::new();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let key = pool[i].clone();
                let probe = Rec { key: key.clone(), val: v };
                match sut.insert(probe, hash_of(&key)) {
                    Ok(Insert::Inserted(stored)) => {
                        prop_assert_eq!(&stored.key, &key);
                        prop_assert!(model.insert(key, v).is_none(), "insert must report duplicate");
                    }
                    Ok(Insert::Exists { existing, rejected }) => {
                        prop_assert_eq!(Some(&existing.val), model.get(&key));
                        prop_assert_eq!(rejected.val, v);
                    }
                    Err(e) => {
                        prop_assert_eq!(resize, ResizeMode::Disabled);
                        prop_assert!(matches!(e, Error::Full { .. }), "unexpected error {:?}", e);
                        prop_assert!(!model.contains_key(&key));
                    }
                }
            }
            OpI::Remove(i) => {
                let key = &pool[i];
                let res = sut.remove_with(hash_of(key), |r| &r.key == key);
                match model.remove(key) {
                    Some(mv) => prop_assert_eq!(res.map(|r| r.val), Ok(mv)),
                    None => prop_assert_eq!(res, Err(Error::NotFound)),
                }
            }
            OpI::Find(i) => {
                let key = &pool[i];
                let probe = Rec { key: key.clone(), val: 0 };
                let found = sut.find(&probe, hash_of(key)).map(|r| r.val);
                prop_assert_eq!(found, model.get(key).copied());
            }
            OpI::Mutate(i, d) => {
                let key = &pool[i];
                if let Some(r) = sut.find_with_mut(hash_of(key), |r| &r.key == key) {
                    r.val = r.val.wrapping_add(d);
                    let mv = model.get_mut(key).expect("present in model");
                    *mv = mv.wrapping_add(d);
                } else {
                    prop_assert!(!model.contains_key(key));
                }
            }
            OpI::Iterate => {
                let s_keys: BTreeSet<_> = sut.iter().map(|r| r.key.clone()).collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(sut.iter().count(), model.len());
                prop_assert_eq!(s_keys, m_keys);
            }
            OpI::Drain => {
                let drained: HashMap<String, i32> =
                    sut.drain().map(|r| (r.key, r.val)).collect();
                prop_assert_eq!(&drained, &model);
                model.clear();
            }
        }

        sut.check_invariants();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

fn content_hash(key: &str) -> u32 {
    hash_bytes(key.as_bytes())
}

// Every key in one chain: stresses equality resolution and mid-chain unlinking.
fn const_hash(_key: &str) -> u32 {
    0
}

// Two stored hashes per bucket: exercises the stored-hash reject before equality.
fn two_hashes(key: &str) -> u32 {
    (key.len() as u32 % 2) << 3
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(&pool, ops, ResizeMode::GrowAndShrink, content_hash)?;
    }

    #[test]
    fn prop_state_machine_grow_only((pool, ops) in arb_scenario()) {
        run_scenario(&pool, ops, ResizeMode::Grow, content_hash)?;
    }

    #[test]
    fn prop_state_machine_fixed_size((pool, ops) in arb_scenario()) {
        run_scenario(&pool, ops, ResizeMode::Disabled, content_hash)?;
    }

    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(&pool, ops, ResizeMode::GrowAndShrink, const_hash)?;
    }

    #[test]
    fn prop_state_machine_shared_buckets((pool, ops) in arb_scenario()) {
        run_scenario(&pool, ops, ResizeMode::GrowAndShrink, two_hashes)?;
    }
}
