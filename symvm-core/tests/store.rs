//! Triple-store and blob-store behaviour
//!
//! Covers the universal invariants: link idempotence, unlink visibility,
//! query count/collect agreement, blob comparison as a total order,
//! interning idempotence, existence accounting, and storage save/reload.

use std::cmp::Ordering;
use symvm_core::vocab::sym;
use symvm_core::{QueryMask, QueryMode, Store, Triple};

fn fresh_symbols(store: &mut Store, n: usize) -> Vec<u64> {
    (0..n).map(|_| store.create_symbol()).collect()
}

#[test]
fn link_is_idempotent() {
    let mut store = Store::in_memory();
    let s = fresh_symbols(&mut store, 3);
    let t = Triple::new(s[0], s[1], s[2]);
    assert!(store.link(t));
    let triples_before = store.triple_count();
    assert!(!store.link(t));
    assert_eq!(store.triple_count(), triples_before);
}

#[test]
fn unlink_removes_visibility() {
    let mut store = Store::in_memory();
    let s = fresh_symbols(&mut store, 3);
    let t = Triple::new(s[0], s[1], s[2]);
    store.link(t);
    assert!(store.unlink(t));
    assert_eq!(store.query_count(QueryMask::MMM, t), 0);
    assert!(!store.unlink(t));
}

#[test]
fn two_bound_query_yields_ascending_values() {
    // link (e,a,c1), (e,a,c2), (e,b,c3); MMV on (e,a) gives {c1,c2} sorted
    let mut store = Store::in_memory();
    let s = fresh_symbols(&mut store, 6);
    let (e, a, b) = (s[0], s[1], s[2]);
    store.link(Triple::new(e, a, s[4]));
    store.link(Triple::new(e, a, s[3]));
    store.link(Triple::new(e, b, s[5]));
    let hits = store.query_collect(QueryMask::MMV, Triple::new(e, a, sym::VOID));
    let values: Vec<u64> = hits.iter().map(|t| t.value).collect();
    assert_eq!(values, vec![s[3], s[4]]);
    assert_eq!(store.query_count(QueryMask::MMV, Triple::new(e, a, sym::VOID)), 2);
}

#[test]
fn counts_agree_with_collected_sizes_for_all_masks() {
    let mut store = Store::in_memory();
    let s = fresh_symbols(&mut store, 5);
    store.link(Triple::new(s[0], s[1], s[2]));
    store.link(Triple::new(s[0], s[1], s[3]));
    store.link(Triple::new(s[0], s[4], s[2]));
    store.link(Triple::new(s[3], s[1], s[2]));
    let probe = Triple::new(s[0], s[1], s[2]);
    for code in 0..27 {
        let mask = QueryMask::from_code(code).unwrap();
        let count = store.query_count(mask, probe);
        let mut collected = 0u64;
        store.query(mask, probe, |result| {
            for (i, mode) in mask.0.iter().enumerate() {
                match mode {
                    QueryMode::Varying => {
                        assert_ne!(result.pos(i), sym::VOID);
                        collected += 1;
                    }
                    QueryMode::Ignore => assert_eq!(result.pos(i), sym::VOID),
                    QueryMode::Match => assert_eq!(result.pos(i), probe.pos(i)),
                }
            }
        });
        assert_eq!(collected, count * mask.varying_count() as u64, "mask {code}");
    }
}

#[test]
fn ignore_collapses_to_distinct() {
    let mut store = Store::in_memory();
    let s = fresh_symbols(&mut store, 4);
    let (e, a1, a2, v) = (s[0], s[1], s[2], s[3]);
    store.link(Triple::new(e, a1, v));
    store.link(Triple::new(e, a2, v));
    // distinct values of e across all attributes: one hit
    assert_eq!(
        store.query_count(QueryMask::MIV, Triple::new(e, sym::VOID, sym::VOID)),
        1
    );
    // distinct attributes: two hits
    assert_eq!(
        store.query_count(QueryMask::MVI, Triple::new(e, sym::VOID, sym::VOID)),
        2
    );
}

#[test]
fn set_solitary_replaces_and_scrutinises() {
    let mut store = Store::in_memory();
    let s = fresh_symbols(&mut store, 5);
    let (e, a, x, y, z) = (s[0], s[1], s[2], s[3], s[4]);
    store.link(Triple::new(e, a, y));
    store.link(Triple::new(e, a, z));
    // z is also kept alive elsewhere, y is not
    let anchor = store.create_symbol();
    store.link(Triple::new(anchor, sym::HOLDS, z));
    store.set_solitary(Triple::new(e, a, x));
    let hits = store.query_collect(QueryMask::MMV, Triple::new(e, a, sym::VOID));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].value, x);
    // y lost its last triple and was destroyed; z survives through anchor
    assert!(!store.participates(y));
    assert!(store.participates(z));
}

#[test]
fn destroy_cascades_through_holds() {
    let mut store = Store::in_memory();
    let root = store.create_symbol();
    let child = store.create_symbol();
    let grandchild = store.create_symbol();
    store.link(Triple::new(root, sym::HOLDS, child));
    store.link(Triple::new(child, sym::HOLDS, grandchild));
    store.destroy(root);
    assert!(!store.participates(root));
    assert!(!store.participates(child));
    assert!(!store.participates(grandchild));
    assert_eq!(store.triple_count(), 0);
}

#[test]
fn blob_compare_is_a_total_order() {
    let mut store = Store::in_memory();
    let a = store.create_text("abc");
    let b = store.create_text("abd");
    let c = store.create_text("ab");
    let d = store.create_natural(5);
    for (x, y) in [(a, b), (a, c), (b, c), (a, d), (c, d)] {
        let forward = store.compare_blobs(x, y);
        let backward = store.compare_blobs(y, x);
        assert_eq!(forward, backward.reverse());
    }
    // shorter blobs order first
    assert_eq!(store.compare_blobs(c, a), Ordering::Less);
    assert_eq!(store.compare_blobs(a, a), Ordering::Equal);
}

#[test]
fn interning_is_idempotent() {
    let mut store = Store::in_memory();
    let a = store.create_text("shared literal");
    let b = store.create_text("shared literal");
    assert_eq!(a, b);
    let c = store.create_text("another literal");
    assert_ne!(a, c);
    let n1 = store.create_natural(1234);
    let n2 = store.create_natural(1234);
    assert_eq!(n1, n2);
}

#[test]
fn predefined_names_resolve_to_reserved_ids() {
    let mut store = Store::in_memory();
    // the token "Holds" must intern to the reserved symbol
    let holds = store.create_text("Holds");
    assert_eq!(holds, sym::HOLDS);
    let deserialize = store.create_text("Deserialize");
    assert_eq!(deserialize, symvm_core::vocab::proc::DESERIALIZE);
}

#[test]
fn mutating_an_interned_blob_evicts_it() {
    let mut store = Store::in_memory();
    let a = store.create_text("mutable");
    store.write_blob_at::<u8>(a, 0, b'X');
    // the index forgot the stale entry; a fresh equal literal is new
    let b = store.create_text("mutable");
    assert_ne!(a, b);
}

#[test]
fn blob_resize_preserves_identity_and_triples() {
    let mut store = Store::in_memory();
    let s = store.create_symbol();
    let other = store.create_symbol();
    store.link(Triple::new(other, sym::HOLDS, s));
    store.set_blob_size(s, 128);
    store.write_blob_at::<u64>(s, 0, 77);
    store.set_blob_size(s, 0);
    store.set_blob_size(s, 256);
    assert_eq!(store.blob_size(s), 256);
    assert_eq!(store.read_blob_at::<u64>(s, 0), 0, "grown bits read zero");
    assert!(store.exists(Triple::new(other, sym::HOLDS, s)));
}

#[test]
fn blob_edits_slice_insert_erase() {
    let mut store = Store::in_memory();
    let a = store.create_symbol();
    store.set_blob_bytes(a, &[0x11, 0x22, 0x33, 0x44], 32);
    assert!(store.decrease_blob(a, 8, 16));
    assert_eq!(store.blob_size(a), 16);
    assert_eq!(store.read_blob_at::<u8>(a, 0), 0x11);
    assert_eq!(store.read_blob_at::<u8>(a, 8), 0x44);
    assert!(store.increase_blob(a, 8, 8));
    assert_eq!(store.blob_size(a), 24);
    assert_eq!(store.read_blob_at::<u8>(a, 8), 0);
    assert_eq!(store.read_blob_at::<u8>(a, 16), 0x44);
    let b = store.create_symbol();
    store.set_blob_size(b, 24);
    assert!(store.slice_blob(b, a, 0, 0, 24));
    assert_eq!(store.read_blob_at::<u8>(b, 16), 0x44);
    // out-of-bounds slices are rejected
    assert!(!store.slice_blob(b, a, 16, 0, 16));
}

#[test]
fn guaranteed_lookup_reports_missing_triples() {
    let mut store = Store::in_memory();
    let s = fresh_symbols(&mut store, 2);
    assert!(store.get_guaranteed(s[0], s[1]).is_err());
    store.link(Triple::new(s[0], s[1], sym::DONE));
    assert_eq!(store.get_guaranteed(s[0], s[1]).unwrap(), sym::DONE);
    assert!(store.value_set_count_is(s[0], s[1], 1));
    assert!(store.value_set_count_is(s[0], sym::FRAME, 0));
}

#[test]
fn save_and_reload_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let (e, a, text, raw_symbol);
    {
        let mut store = Store::in_memory();
        e = store.create_symbol();
        a = store.create_symbol();
        text = store.create_text("persisted");
        raw_symbol = store.create_raw(&[0xAB, 0xCD], 12);
        store.link(Triple::new(e, a, text));
        store.link(Triple::new(e, sym::HOLDS, raw_symbol));
        store.save(dir.path()).unwrap();
    }
    let mut store = Store::open(dir.path()).unwrap();
    assert!(store.exists(Triple::new(e, a, text)));
    assert!(store.exists(Triple::new(e, sym::HOLDS, raw_symbol)));
    assert_eq!(store.blob_size(raw_symbol), 12);
    assert_eq!(store.read_blob_at::<u8>(raw_symbol, 0), 0xAB);
    // the content index survived: the literal still interns to `text`
    assert_eq!(store.create_text("persisted"), text);
    // fresh symbols do not collide with persisted ones
    let fresh = store.create_symbol();
    assert!(fresh > raw_symbol);
}
