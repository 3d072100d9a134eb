//! B+tree structural tests
//!
//! Every mutation sequence ends with a `check_invariants` pass: half-full
//! non-root pages, one shared leaf layer, separator consistency and (for
//! ranked families) exact subtree counts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use symvm_core::{BpTree, Cursor, PageSpace, RANKED_SET, SYMBOL_MAP, SYMBOL_SET};

fn collect(tree: &BpTree, space: &PageSpace) -> Vec<(u64, u64)> {
    let mut out = Vec::new();
    tree.for_each(space, |k, v| out.push((k, v)));
    out
}

#[test]
fn shuffled_inserts_iterate_sorted() {
    let mut space = PageSpace::new();
    let mut tree = BpTree::new(&SYMBOL_MAP);
    let mut keys: Vec<u64> = (0..2000).collect();
    let mut rng = StdRng::seed_from_u64(7);
    for i in (1..keys.len()).rev() {
        keys.swap(i, rng.gen_range(0..=i));
    }
    for &k in &keys {
        assert!(tree.insert_unique(&mut space, k, k * 3));
    }
    // duplicates rejected
    assert!(!tree.insert_unique(&mut space, 500, 0));
    tree.check_invariants(&space).unwrap();
    let all = collect(&tree, &space);
    assert_eq!(all.len(), 2000);
    for (i, (k, v)) in all.iter().enumerate() {
        assert_eq!(*k, i as u64);
        assert_eq!(*v, i as u64 * 3);
    }
}

#[test]
fn erase_every_odd_key_keeps_rank_exact() {
    let mut space = PageSpace::new();
    let mut tree = BpTree::new(&RANKED_SET);
    for k in 0..10_000u64 {
        assert!(tree.insert_unique(&mut space, k, 0));
    }
    assert_eq!(tree.element_count(&space), 10_000);
    for k in (1..10_000u64).step_by(2) {
        assert!(tree.erase_key(&mut space, k));
    }
    tree.check_invariants(&space).unwrap();
    assert_eq!(tree.element_count(&space), 5_000);
    let keys: Vec<u64> = collect(&tree, &space).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys.len(), 5_000);
    for (i, k) in keys.iter().enumerate() {
        assert_eq!(*k, i as u64 * 2);
    }
}

#[test]
fn range_erase_cuts_the_middle() {
    let mut space = PageSpace::new();
    let mut tree = BpTree::new(&RANKED_SET);
    for k in 0..10_000u64 {
        tree.insert_unique(&mut space, k, 0);
    }
    let removed = tree.erase_range(&mut space, 1_000, 8_999);
    assert_eq!(removed, 8_000);
    tree.check_invariants(&space).unwrap();
    assert_eq!(tree.element_count(&space), 2_000);
    let keys: Vec<u64> = collect(&tree, &space).into_iter().map(|(k, _)| k).collect();
    assert!(keys.iter().all(|k| *k < 1_000 || *k >= 9_000));
    // erasing an empty range is a no-op
    assert_eq!(tree.erase_range(&mut space, 3_000, 4_000), 0);
    // erase everything, tree ends empty
    assert_eq!(tree.erase_range(&mut space, 0, u64::MAX), 2_000);
    assert!(tree.is_empty());
}

#[test]
fn bulk_insert_with_producer() {
    let mut space = PageSpace::new();
    let mut tree = BpTree::new(&SYMBOL_MAP);
    // fresh build through one bulk call
    let mut next = 0u64;
    let cursor = Cursor::default();
    tree.insert(&mut space, cursor, 1_000, &mut |slots, begin, end| {
        for i in begin..end {
            slots.set_key(i, next * 1_000);
            slots.set_value(i, next);
            next += 1;
        }
    });
    tree.check_invariants(&space).unwrap();
    assert_eq!(collect(&tree, &space).len(), 1_000);

    // bulk insert into the gap between 4000 and 5000
    let mut cursor = Cursor::default();
    assert!(!tree.find_key(&space, &mut cursor, 4_001));
    let mut offset = 0u64;
    tree.insert(&mut space, cursor, 600, &mut |slots, begin, end| {
        for i in begin..end {
            slots.set_key(i, 4_001 + offset);
            slots.set_value(i, 0);
            offset += 1;
        }
    });
    tree.check_invariants(&space).unwrap();
    let all = collect(&tree, &space);
    assert_eq!(all.len(), 1_600);
    let mut prev = None;
    for (k, _) in all {
        if let Some(p) = prev {
            assert!(k > p);
        }
        prev = Some(k);
    }
}

#[test]
fn find_rank_matches_ordinals() {
    let mut space = PageSpace::new();
    let mut tree = BpTree::new(&RANKED_SET);
    for k in 0..3_000u64 {
        tree.insert_unique(&mut space, k * 7, 0);
    }
    for ordinal in [0u64, 1, 499, 500, 2_047, 2_999] {
        let mut cursor = Cursor::default();
        assert!(tree.find_rank(&space, &mut cursor, ordinal));
        assert_eq!(tree.cursor_key(&space, &cursor), ordinal * 7);
    }
    let mut cursor = Cursor::default();
    assert!(!tree.find_rank(&space, &mut cursor, 3_000));
}

#[test]
fn unranked_set_membership() {
    let mut space = PageSpace::new();
    let mut tree = BpTree::new(&SYMBOL_SET);
    for k in 0..1_500u64 {
        assert!(tree.insert_unique(&mut space, k * 2, 0));
    }
    assert!(tree.contains(&space, 998));
    assert!(!tree.contains(&space, 999));
    assert!(tree.erase_key(&mut space, 998));
    assert!(!tree.contains(&space, 998));
    tree.check_invariants(&space).unwrap();
}

#[test]
fn randomized_soak_against_model() {
    let mut space = PageSpace::new();
    let mut tree = BpTree::new(&RANKED_SET);
    let mut model: BTreeMap<u64, ()> = BTreeMap::new();
    let mut rng = StdRng::seed_from_u64(2024);
    for round in 0..6_000 {
        let op = rng.gen_range(0..100);
        if op < 55 {
            let k = rng.gen_range(0..5_000u64);
            let fresh = tree.insert_unique(&mut space, k, 0);
            assert_eq!(fresh, model.insert(k, ()).is_none());
        } else if op < 90 {
            let k = rng.gen_range(0..5_000u64);
            let gone = tree.erase_key(&mut space, k);
            assert_eq!(gone, model.remove(&k).is_some());
        } else {
            let a = rng.gen_range(0..5_000u64);
            let b = (a + rng.gen_range(0..300u64)).min(4_999);
            let removed = tree.erase_range(&mut space, a, b);
            let expected: Vec<u64> = model.range(a..=b).map(|(k, _)| *k).collect();
            assert_eq!(removed, expected.len() as u64);
            for k in expected {
                model.remove(&k);
            }
        }
        if round % 500 == 0 {
            tree.check_invariants(&space).unwrap();
            assert_eq!(tree.element_count(&space), model.len() as u64);
        }
    }
    tree.check_invariants(&space).unwrap();
    let keys: Vec<u64> = collect(&tree, &space).into_iter().map(|(k, _)| k).collect();
    let expected: Vec<u64> = model.keys().copied().collect();
    assert_eq!(keys, expected);
}

#[test]
fn advance_touches_each_leaf_page_once() {
    let mut space = PageSpace::new();
    let mut tree = BpTree::new(&SYMBOL_MAP);
    for k in 0..1_000u64 {
        tree.insert_unique(&mut space, k, k);
    }
    let mut cursor = Cursor::default();
    assert!(tree.find_first(&space, &mut cursor));
    let mut touched = Vec::new();
    let mut steps = 0u64;
    loop {
        steps += 1;
        if tree.advance(&space, &mut cursor, 0, 1, 1, &mut |page| touched.push(page)) > 0 {
            break;
        }
    }
    assert_eq!(steps, 1_000);
    // every page boundary crossing touched exactly one fresh leaf
    let leaf_cap = SYMBOL_MAP.leaf_capacity() as u64;
    let min_pages = 1_000_u64.div_ceil(leaf_cap);
    assert!(touched.len() as u64 >= min_pages - 1);
    let mut dedup = touched.clone();
    dedup.dedup();
    assert_eq!(dedup, touched);
}
