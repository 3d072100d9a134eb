//! Page layout accessors
//!
//! A page starts with a 32-bit header (count, layer), followed by bit-packed
//! slot regions whose offsets derive from the `TreeConfig` widths:
//!
//! - leaf: `count` keys, then `count` values;
//! - branch: `count-1` separator keys, then `count` child refs, then
//!   `count` child ranks when the family is ranked.
//!
//! All functions here stay inside one page; cross-page slot moves are the
//! copy functions at the bottom, fed by `PageSpace::page_pair_mut`.

use super::{TreeConfig, HEADER_BITS, REF_BITS};
use crate::bits::{copy_bits, move_bits, read_bits, write_bits};
use crate::page::PageRef;

/// Number of elements (leaf) or children (branch).
pub fn count(bytes: &[u8]) -> u32 {
    read_bits(bytes, 0, 16) as u32
}

pub fn set_count(bytes: &mut [u8], count: u32) {
    debug_assert!(count < 1 << 16);
    write_bits(bytes, 0, 16, count as u64);
}

/// Layer of the page; 0 at the leaves.
pub fn layer(bytes: &[u8]) -> u32 {
    read_bits(bytes, 16, 8) as u32
}

pub fn set_layer(bytes: &mut [u8], layer: u32) {
    debug_assert!(layer < 1 << 8);
    write_bits(bytes, 16, 8, layer as u64);
}

fn key_off(cfg: &TreeConfig, i: u32) -> u64 {
    HEADER_BITS + i as u64 * cfg.key_bits as u64
}

fn value_off(cfg: &TreeConfig, i: u32) -> u64 {
    HEADER_BITS
        + cfg.leaf_capacity() as u64 * cfg.key_bits as u64
        + i as u64 * cfg.value_bits as u64
}

fn ref_off(cfg: &TreeConfig, i: u32) -> u64 {
    HEADER_BITS
        + (cfg.branch_capacity() as u64 - 1) * cfg.key_bits as u64
        + i as u64 * REF_BITS as u64
}

fn rank_off(cfg: &TreeConfig, i: u32) -> u64 {
    ref_off(cfg, cfg.branch_capacity()) + i as u64 * cfg.rank_bits as u64
}

// ---- leaf slots ----

pub fn key(bytes: &[u8], cfg: &TreeConfig, i: u32) -> u64 {
    read_bits(bytes, key_off(cfg, i), cfg.key_bits)
}

pub fn set_key(bytes: &mut [u8], cfg: &TreeConfig, i: u32, k: u64) {
    write_bits(bytes, key_off(cfg, i), cfg.key_bits, k);
}

pub fn value(bytes: &[u8], cfg: &TreeConfig, i: u32) -> u64 {
    debug_assert!(cfg.value_bits > 0);
    read_bits(bytes, value_off(cfg, i), cfg.value_bits)
}

pub fn set_value(bytes: &mut [u8], cfg: &TreeConfig, i: u32, v: u64) {
    debug_assert!(cfg.value_bits > 0);
    write_bits(bytes, value_off(cfg, i), cfg.value_bits, v);
}

/// First slot with key ≥ `target`, plus whether it is an exact match. The
/// slot index may equal `count` when every key is smaller.
pub fn leaf_search(bytes: &[u8], cfg: &TreeConfig, target: u64) -> (u32, bool) {
    let n = count(bytes);
    let (mut lo, mut hi) = (0u32, n);
    while lo < hi {
        let mid = (lo + hi) / 2;
        if key(bytes, cfg, mid) < target {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    (lo, lo < n && key(bytes, cfg, lo) == target)
}

/// Open a gap of `n` slots at `begin`; the caller fills keys and values.
pub fn leaf_insert_gap(bytes: &mut [u8], cfg: &TreeConfig, begin: u32, n: u32) {
    let old = count(bytes);
    debug_assert!(begin <= old && old + n <= cfg.leaf_capacity());
    let kb = cfg.key_bits as u64;
    move_bits(
        bytes,
        key_off(cfg, begin + n),
        key_off(cfg, begin),
        (old - begin) as u64 * kb,
    );
    if cfg.value_bits > 0 {
        let vb = cfg.value_bits as u64;
        move_bits(
            bytes,
            value_off(cfg, begin + n),
            value_off(cfg, begin),
            (old - begin) as u64 * vb,
        );
    }
    set_count(bytes, old + n);
}

/// Remove the slot range [begin, end).
pub fn leaf_remove(bytes: &mut [u8], cfg: &TreeConfig, begin: u32, end: u32) {
    let old = count(bytes);
    debug_assert!(begin <= end && end <= old);
    let kb = cfg.key_bits as u64;
    move_bits(
        bytes,
        key_off(cfg, begin),
        key_off(cfg, end),
        (old - end) as u64 * kb,
    );
    if cfg.value_bits > 0 {
        let vb = cfg.value_bits as u64;
        move_bits(
            bytes,
            value_off(cfg, begin),
            value_off(cfg, end),
            (old - end) as u64 * vb,
        );
    }
    set_count(bytes, old - (end - begin));
}

// ---- branch slots ----

pub fn child(bytes: &[u8], cfg: &TreeConfig, i: u32) -> PageRef {
    read_bits(bytes, ref_off(cfg, i), REF_BITS)
}

pub fn set_child(bytes: &mut [u8], cfg: &TreeConfig, i: u32, r: PageRef) {
    write_bits(bytes, ref_off(cfg, i), REF_BITS, r);
}

pub fn rank(bytes: &[u8], cfg: &TreeConfig, i: u32) -> u64 {
    debug_assert!(cfg.ranked());
    read_bits(bytes, rank_off(cfg, i), cfg.rank_bits)
}

pub fn set_rank(bytes: &mut [u8], cfg: &TreeConfig, i: u32, r: u64) {
    if cfg.ranked() {
        write_bits(bytes, rank_off(cfg, i), cfg.rank_bits, r);
    }
}

/// Sum of the child ranks: the page's integrated rank.
pub fn ranks_total(bytes: &[u8], cfg: &TreeConfig) -> u64 {
    (0..count(bytes)).map(|i| rank(bytes, cfg, i)).sum()
}

/// Separator i: the smallest key reachable through child i+1.
pub fn sep_key(bytes: &[u8], cfg: &TreeConfig, i: u32) -> u64 {
    read_bits(bytes, key_off(cfg, i), cfg.key_bits)
}

pub fn set_sep_key(bytes: &mut [u8], cfg: &TreeConfig, i: u32, k: u64) {
    write_bits(bytes, key_off(cfg, i), cfg.key_bits, k);
}

/// The child a key descends into: the count of separators ≤ the key.
pub fn child_for_key(bytes: &[u8], cfg: &TreeConfig, target: u64) -> u32 {
    let seps = count(bytes) - 1;
    let (mut lo, mut hi) = (0u32, seps);
    while lo < hi {
        let mid = (lo + hi) / 2;
        if sep_key(bytes, cfg, mid) <= target {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Open a gap of `n` child slots at position `at`; the caller fills refs,
/// ranks and the incoming separator keys.
pub fn branch_insert_gap(bytes: &mut [u8], cfg: &TreeConfig, at: u32, n: u32) {
    let old = count(bytes);
    debug_assert!(at <= old && old + n <= cfg.branch_capacity());
    let rb = REF_BITS as u64;
    move_bits(
        bytes,
        ref_off(cfg, at + n),
        ref_off(cfg, at),
        (old - at) as u64 * rb,
    );
    if cfg.ranked() {
        let kb = cfg.rank_bits as u64;
        move_bits(
            bytes,
            rank_off(cfg, at + n),
            rank_off(cfg, at),
            (old - at) as u64 * kb,
        );
    }
    // A child at position p >= 1 owns incoming separator p-1.
    let kat = at.max(1) - 1;
    let keys_after = old.saturating_sub(1).saturating_sub(kat);
    move_bits(
        bytes,
        key_off(cfg, kat + n),
        key_off(cfg, kat),
        keys_after as u64 * cfg.key_bits as u64,
    );
    set_count(bytes, old + n);
}

/// Remove the child slot range [begin, end) with its separators.
pub fn branch_remove(bytes: &mut [u8], cfg: &TreeConfig, begin: u32, end: u32) {
    let old = count(bytes);
    debug_assert!(begin <= end && end <= old);
    if begin == end {
        return;
    }
    let rb = REF_BITS as u64;
    move_bits(
        bytes,
        ref_off(cfg, begin),
        ref_off(cfg, end),
        (old - end) as u64 * rb,
    );
    if cfg.ranked() {
        let kb = cfg.rank_bits as u64;
        move_bits(
            bytes,
            rank_off(cfg, begin),
            rank_off(cfg, end),
            (old - end) as u64 * kb,
        );
    }
    let kb = cfg.key_bits as u64;
    if begin > 0 {
        // drop separators [begin-1, end-1)
        move_bits(
            bytes,
            key_off(cfg, begin - 1),
            key_off(cfg, end - 1),
            (old - end) as u64 * kb,
        );
    } else {
        // the new first child loses its incoming separator too
        move_bits(
            bytes,
            key_off(cfg, 0),
            key_off(cfg, end),
            old.saturating_sub(1).saturating_sub(end) as u64 * kb,
        );
    }
    set_count(bytes, old - (end - begin));
}

// ---- cross-page copies ----

/// Copy `n` leaf slots between two pages.
pub fn copy_leaf_slots(
    dst: &mut [u8],
    src: &[u8],
    cfg: &TreeConfig,
    dst_i: u32,
    src_i: u32,
    n: u32,
) {
    copy_bits(
        dst,
        src,
        key_off(cfg, dst_i),
        key_off(cfg, src_i),
        n as u64 * cfg.key_bits as u64,
    );
    if cfg.value_bits > 0 {
        copy_bits(
            dst,
            src,
            value_off(cfg, dst_i),
            value_off(cfg, src_i),
            n as u64 * cfg.value_bits as u64,
        );
    }
}

/// Copy `n` separator keys between two branch pages.
pub fn copy_branch_keys(
    dst: &mut [u8],
    src: &[u8],
    cfg: &TreeConfig,
    dst_ki: u32,
    src_ki: u32,
    n: u32,
) {
    copy_bits(
        dst,
        src,
        key_off(cfg, dst_ki),
        key_off(cfg, src_ki),
        n as u64 * cfg.key_bits as u64,
    );
}

/// Copy `n` child refs (and ranks) between two branch pages. Separator keys
/// are rebuilt by the caller from the subtrees themselves.
pub fn copy_branch_children(
    dst: &mut [u8],
    src: &[u8],
    cfg: &TreeConfig,
    dst_i: u32,
    src_i: u32,
    n: u32,
) {
    copy_bits(
        dst,
        src,
        ref_off(cfg, dst_i),
        ref_off(cfg, src_i),
        n as u64 * REF_BITS as u64,
    );
    if cfg.ranked() {
        copy_bits(
            dst,
            src,
            rank_off(cfg, dst_i),
            rank_off(cfg, src_i),
            n as u64 * cfg.rank_bits as u64,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bptree::SYMBOL_MAP;
    use crate::page::PAGE_BYTES;

    #[test]
    fn leaf_slot_layout() {
        let cfg = &SYMBOL_MAP;
        let mut page = vec![0u8; PAGE_BYTES];
        set_layer(&mut page, 0);
        set_count(&mut page, 3);
        for i in 0..3 {
            set_key(&mut page, cfg, i, 100 + i as u64);
            set_value(&mut page, cfg, i, 200 + i as u64);
        }
        leaf_insert_gap(&mut page, cfg, 1, 2);
        set_key(&mut page, cfg, 1, 50);
        set_key(&mut page, cfg, 2, 51);
        assert_eq!(count(&page), 5);
        assert_eq!(key(&page, cfg, 0), 100);
        assert_eq!(key(&page, cfg, 3), 101);
        assert_eq!(value(&page, cfg, 4), 202);
        leaf_remove(&mut page, cfg, 1, 3);
        assert_eq!(count(&page), 3);
        assert_eq!(key(&page, cfg, 1), 101);
        assert_eq!(value(&page, cfg, 1), 201);
    }

    #[test]
    fn branch_child_routing() {
        let cfg = &SYMBOL_MAP;
        let mut page = vec![0u8; PAGE_BYTES];
        set_layer(&mut page, 1);
        set_count(&mut page, 3);
        set_sep_key(&mut page, cfg, 0, 10);
        set_sep_key(&mut page, cfg, 1, 20);
        assert_eq!(child_for_key(&page, cfg, 5), 0);
        assert_eq!(child_for_key(&page, cfg, 10), 1);
        assert_eq!(child_for_key(&page, cfg, 15), 1);
        assert_eq!(child_for_key(&page, cfg, 25), 2);
    }

    #[test]
    fn branch_remove_head_drops_extra_separator() {
        let cfg = &SYMBOL_MAP;
        let mut page = vec![0u8; PAGE_BYTES];
        set_layer(&mut page, 1);
        set_count(&mut page, 4);
        for i in 0..4 {
            set_child(&mut page, cfg, i, 100 + i as u64);
        }
        for i in 0..3 {
            set_sep_key(&mut page, cfg, i, 10 * (i as u64 + 1));
        }
        branch_remove(&mut page, cfg, 0, 2);
        assert_eq!(count(&page), 2);
        assert_eq!(child(&page, cfg, 0), 102);
        assert_eq!(child(&page, cfg, 1), 103);
        assert_eq!(sep_key(&page, cfg, 0), 30);
    }
}
