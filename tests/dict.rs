// Dict integration test suite.
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Dedup: equal strings share one canonical pointer and one record.
// - Balance: N inserts followed by N removes leave no record behind.
// - Resize: the table grows under load and shrinks back to its floor.
// - Errors: removing an absent string is NotFound and changes nothing.
use rc_dict::{hash_bytes, Dict, Error, ResizeMode, TableConfig, DICT_INITIAL_SIZE, MIN_SIZE};
use std::collections::BTreeSet;
use std::ffi::CString;
use std::sync::Arc;

fn name(i: usize) -> String {
    format!("module-{:05}", i)
}

// Test: the literal insert / zero-copy / remove walk-through.
// Assumes: zero-copy duplicates are dropped by the dictionary.
// Verifies: same pointer, counts 1 -> 2 -> 1 -> gone, then NotFound.
#[test]
fn literal_scenario() {
    let d = Dict::new().unwrap();
    let p1 = d.insert(Some(b"abc"), 3).unwrap().unwrap();
    assert_eq!(d.refcount(b"abc"), Some(1));

    let dup = CString::new("abc").unwrap();
    let p2 = d.insert_zc(Some(dup)).unwrap().unwrap();
    assert!(Arc::ptr_eq(&p1, &p2));
    assert_eq!(d.refcount(b"abc"), Some(2));
    drop(p2);

    d.remove(b"abc").unwrap();
    assert_eq!(d.refcount(b"abc"), Some(1));
    assert_eq!(p1.to_bytes(), b"abc");

    let used = d.len();
    d.remove(b"abc").unwrap();
    assert_eq!(d.len(), used - 1);
    assert_eq!(d.remove(b"abc"), Err(Error::NotFound));
}

// Test: dedup across both insert paths.
// Verifies: one record with count 2 and identical pointers.
#[test]
fn dedup_copy_and_zero_copy() {
    let d = Dict::new().unwrap();
    let a = d.insert_str("urn:ietf:params:xml:ns:yang:ietf-yang-types").unwrap();
    let b = d
        .insert(Some(b"urn:ietf:params:xml:ns:yang:ietf-yang-types"), 0)
        .unwrap()
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(d.len(), 1);
    assert_eq!(d.refcount(a.as_bytes()), Some(2));

    let c = d.insert_zc(Some(CString::new("x").unwrap())).unwrap().unwrap();
    let e = d.insert_zc(Some(CString::new("x").unwrap())).unwrap().unwrap();
    assert!(Arc::ptr_eq(&c, &e));
    assert_eq!(d.refcount(b"x"), Some(2));
}

// Test: balanced insert/remove sequences.
// Assumes: the test's own Arc clones are the only other holders.
// Verifies: no record remains and the buffer is held only by the test.
#[test]
fn balance_frees_exactly_once() {
    let d = Dict::new().unwrap();
    let n: u32 = 17;
    let held: Vec<_> = (0..n).map(|_| d.insert_str("leaf").unwrap()).collect();
    assert_eq!(d.refcount(b"leaf"), Some(n));
    for _ in 0..n {
        d.remove(b"leaf").unwrap();
    }
    assert!(!d.contains(b"leaf"));
    assert!(d.is_empty());
    assert_eq!(Arc::strong_count(&held[0]), held.len());
    assert!(d.clean().is_empty());
}

// Test: resize round-trip.
// Assumes: the dictionary starts at DICT_INITIAL_SIZE with floor MIN_SIZE.
// Verifies: at least two grow events, then back to MIN_SIZE with len 0.
#[test]
fn resize_round_trip() {
    let d = Dict::new().unwrap();
    assert_eq!(d.capacity(), DICT_INITIAL_SIZE);
    let mut sizes = BTreeSet::new();
    for i in 0..2000 {
        d.insert_str(&name(i)).unwrap();
        sizes.insert(d.capacity());
    }
    assert!(sizes.len() >= 3, "expected two grow events, saw {:?}", sizes);
    assert_eq!(d.capacity(), 4 * DICT_INITIAL_SIZE);

    for i in 0..2000 {
        d.remove(name(i).as_bytes()).unwrap();
    }
    assert_eq!(d.len(), 0);
    assert_eq!(d.capacity(), MIN_SIZE);
}

// Test: hash consistency across resizes.
// Verifies: strings inserted before several grows are still found and
// deduplicated afterwards; the hash of the same bytes never changes.
#[test]
fn lookups_survive_resizes() {
    let d = Dict::new().unwrap();
    let first = d.insert_str("early").unwrap();
    let h = hash_bytes(b"early");
    for i in 0..3000 {
        d.insert_str(&name(i)).unwrap();
    }
    assert_eq!(hash_bytes(b"early"), h);
    let again = d.insert_str("early").unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(d.refcount(b"early"), Some(2));
}

// Test: remove of an unknown string.
// Verifies: NotFound and unchanged len, also after full release.
#[test]
fn remove_not_found_leaves_len() {
    let d = Dict::new().unwrap();
    d.insert_str("present").unwrap();
    assert_eq!(d.remove(b"absent"), Err(Error::NotFound));
    assert_eq!(d.len(), 1);

    d.remove(b"present").unwrap();
    assert_eq!(d.remove(b"present"), Err(Error::NotFound));
    assert_eq!(d.len(), 0);
}

// Test: a dictionary with resizing disabled.
// Verifies: inserting past capacity is Full and distinct from NotFound.
#[test]
fn fixed_size_dict_reports_full() {
    let d = Dict::with_config(TableConfig {
        initial_size: 8,
        min_size: 8,
        resize: ResizeMode::Disabled,
    })
    .unwrap();
    for i in 0..8 {
        d.insert_str(&name(i)).unwrap();
    }
    assert_eq!(d.insert_str("one-too-many"), Err(Error::Full { size: 8 }));
    // Duplicates still succeed: they need no new slot.
    d.insert_str(&name(0)).unwrap();
    assert_eq!(d.refcount(name(0).as_bytes()), Some(2));
    assert_eq!(d.len(), 8);
}

// Test: cleanup with outstanding references.
// Verifies: one Leak per distinct string, carrying its count.
#[test]
fn clean_reports_each_leak() {
    let d = Dict::new().unwrap();
    d.insert_str("a").unwrap();
    d.insert_str("b").unwrap();
    d.insert_str("b").unwrap();
    let mut leaks: Vec<(Vec<u8>, u32)> = d
        .clean()
        .into_iter()
        .map(|l| (l.value.as_bytes().to_vec(), l.refcount))
        .collect();
    leaks.sort();
    assert_eq!(leaks, vec![(b"a".to_vec(), 1), (b"b".to_vec(), 2)]);
}
