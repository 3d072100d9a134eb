//! Bulk insert
//!
//! `insert` opens `n` consecutive slots at a cursor position and lets the
//! caller write keys and values in place through a producer callback, one
//! call per freshly opened leaf region in ascending order. Splits compute
//! the page count per layer up front and distribute elements evenly, so
//! every page involved ends at least half full and the root grows by as
//! many layers as the element count demands.

use super::{first_key_of_subtree, node, subtree_total, BpTree, Cursor, Frame, TreeConfig};
use crate::bits::copy_bits;
use crate::page::{PageRef, PageSpace};

/// Writable view of a leaf page's slots, handed to insert producers.
pub struct LeafSlots<'a> {
    bytes: &'a mut [u8],
    cfg: &'a TreeConfig,
}

impl LeafSlots<'_> {
    /// Write the key of slot `i`.
    pub fn set_key(&mut self, i: u32, key: u64) {
        node::set_key(self.bytes, self.cfg, i, key);
    }

    /// Write the value of slot `i`.
    pub fn set_value(&mut self, i: u32, value: u64) {
        node::set_value(self.bytes, self.cfg, i, value);
    }

    /// Read back the key of slot `i`.
    pub fn key(&self, i: u32) -> u64 {
        node::key(self.bytes, self.cfg, i)
    }
}

/// Callback filling freshly opened leaf slots `[begin, end)`. Invoked once
/// per affected leaf region, in ascending element order; the callback keeps
/// its own progress across calls.
pub type Producer<'p> = &'p mut dyn FnMut(&mut LeafSlots<'_>, u32, u32);

#[derive(Debug, Clone, Copy)]
struct ChildEntry {
    /// Smallest key reachable through the child.
    key: u64,
    page: PageRef,
    /// Subtree element count (meaningful for ranked families).
    total: u64,
}

impl BpTree {
    /// Insert `n` consecutive elements at the cursor position. The cursor
    /// comes from `find_key` (or is empty for an empty tree) and is
    /// consumed; the produced keys must sort into the position.
    pub fn insert(&mut self, space: &mut PageSpace, cursor: Cursor, n: u64, producer: Producer) {
        debug_assert!(n > 0);
        if self.root == 0 {
            self.build_fresh(space, n, producer);
            return;
        }
        let frames = cursor.frames;
        let leaf_ref = frames[0].page;
        let old_count = node::count(space.page(leaf_ref));
        let begin = frames[0].index.min(old_count);
        if old_count as u64 + n <= self.cfg.leaf_capacity() as u64 {
            let cfg = self.cfg;
            let bytes = space.page_mut(leaf_ref);
            node::leaf_insert_gap(bytes, cfg, begin, n as u32);
            producer(&mut LeafSlots { bytes, cfg }, begin, begin + n as u32);
            if begin == 0 {
                self.fix_left_separator(space, &frames);
            }
            self.bump_ranks(space, &frames, 1, n);
        } else {
            self.split_leaf_insert(space, &frames, begin, n, producer);
        }
    }

    /// Insert a single key/value pair unless the key is already present.
    pub fn insert_unique(&mut self, space: &mut PageSpace, key: u64, value: u64) -> bool {
        let mut cursor = Cursor::default();
        if self.find_key(space, &mut cursor, key) {
            return false;
        }
        let has_value = self.cfg.value_bits > 0;
        self.insert(space, cursor, 1, &mut |slots, begin, _end| {
            slots.set_key(begin, key);
            if has_value {
                slots.set_value(begin, value);
            }
        });
        true
    }

    fn build_fresh(&mut self, space: &mut PageSpace, n: u64, producer: Producer) {
        let cfg = self.cfg;
        let counts = even_split(n, cfg.leaf_capacity());
        let mut entries = Vec::with_capacity(counts.len());
        for &cnt in &counts {
            let page = space.acquire();
            let bytes = space.page_mut(page);
            node::set_layer(bytes, 0);
            node::set_count(bytes, cnt);
            producer(&mut LeafSlots { bytes, cfg }, 0, cnt);
            entries.push(ChildEntry {
                key: node::key(space.page(page), cfg, 0),
                page,
                total: cnt as u64,
            });
        }
        self.root = build_levels(space, cfg, entries, 1);
    }

    fn split_leaf_insert(
        &mut self,
        space: &mut PageSpace,
        frames: &[Frame],
        begin: u32,
        n: u64,
        producer: Producer,
    ) {
        let cfg = self.cfg;
        let leaf_ref = frames[0].page;
        let old_count = node::count(space.page(leaf_ref));
        let total = old_count as u64 + n;
        let (old_keys, old_vals) = snapshot_leaf(space, cfg, leaf_ref, old_count);

        let counts = even_split(total, cfg.leaf_capacity());
        let mut refs = vec![leaf_ref];
        for _ in 1..counts.len() {
            refs.push(space.acquire());
        }
        let mut logical = 0u64;
        for (page_index, &page) in refs.iter().enumerate() {
            let cnt = counts[page_index];
            fill_leaf_page(
                space, cfg, page, logical, cnt, begin as u64, n, &old_keys, &old_vals, producer,
            );
            logical += cnt as u64;
        }

        let mut entries = Vec::with_capacity(refs.len() - 1);
        for (page_index, &page) in refs.iter().enumerate().skip(1) {
            entries.push(ChildEntry {
                key: node::key(space.page(page), cfg, 0),
                page,
                total: counts[page_index] as u64,
            });
        }
        if begin == 0 {
            self.fix_left_separator(space, frames);
        }
        self.insert_children(space, frames, 1, entries, n);
    }

    /// Hang freshly split-off children behind position `frames[layer].index`,
    /// splitting upward as needed. `added` is the element growth the whole
    /// insert contributes to every untouched ancestor.
    fn insert_children(
        &mut self,
        space: &mut PageSpace,
        frames: &[Frame],
        layer: usize,
        entries: Vec<ChildEntry>,
        added: u64,
    ) {
        let cfg = self.cfg;
        if layer >= frames.len() {
            let old_root = self.root;
            let root_layer = node::layer(space.page(old_root));
            let mut all = Vec::with_capacity(entries.len() + 1);
            all.push(ChildEntry {
                key: first_key_of_subtree(space, cfg, old_root),
                page: old_root,
                total: if cfg.ranked() {
                    subtree_total(space, cfg, old_root)
                } else {
                    0
                },
            });
            all.extend(entries);
            self.root = build_levels(space, cfg, all, root_layer + 1);
            return;
        }
        let page_ref = frames[layer].page;
        let at = frames[layer].index;
        let count = node::count(space.page(page_ref));
        if cfg.ranked() {
            // the split child's own subtree count changed
            let child = node::child(space.page(page_ref), cfg, at);
            let child_total = subtree_total(space, cfg, child);
            node::set_rank(space.page_mut(page_ref), cfg, at, child_total);
        }
        let m = entries.len() as u32;
        if count + m <= cfg.branch_capacity() {
            let bytes = space.page_mut(page_ref);
            node::branch_insert_gap(bytes, cfg, at + 1, m);
            for (j, entry) in entries.iter().enumerate() {
                let pos = at + 1 + j as u32;
                node::set_child(bytes, cfg, pos, entry.page);
                node::set_rank(bytes, cfg, pos, entry.total);
                node::set_sep_key(bytes, cfg, pos - 1, entry.key);
            }
            self.bump_ranks(space, frames, layer + 1, added);
        } else {
            self.split_branch_insert(space, frames, layer, entries, added);
        }
    }

    fn split_branch_insert(
        &mut self,
        space: &mut PageSpace,
        frames: &[Frame],
        layer: usize,
        entries: Vec<ChildEntry>,
        added: u64,
    ) {
        let cfg = self.cfg;
        let page_ref = frames[layer].page;
        let at = frames[layer].index as usize;
        let old_count = node::count(space.page(page_ref));
        let page_layer = node::layer(space.page(page_ref));

        let mut kids = Vec::with_capacity(old_count as usize + entries.len());
        {
            let bytes = space.page(page_ref);
            for i in 0..old_count {
                kids.push(ChildEntry {
                    key: if i == 0 {
                        0 // patched below; needs a space borrow
                    } else {
                        node::sep_key(bytes, cfg, i - 1)
                    },
                    page: node::child(bytes, cfg, i),
                    total: if cfg.ranked() {
                        node::rank(bytes, cfg, i)
                    } else {
                        0
                    },
                });
            }
        }
        kids[0].key = first_key_of_subtree(space, cfg, kids[0].page);
        let mut tail = kids.split_off(at + 1);
        kids.extend(entries);
        kids.append(&mut tail);

        let counts = even_split(kids.len() as u64, cfg.branch_capacity());
        let mut refs = vec![page_ref];
        for _ in 1..counts.len() {
            refs.push(space.acquire());
        }
        let mut parent_entries = Vec::with_capacity(refs.len() - 1);
        let mut base = 0usize;
        for (page_index, &page) in refs.iter().enumerate() {
            let cnt = counts[page_index];
            let bytes = space.page_mut(page);
            node::set_layer(bytes, page_layer);
            node::set_count(bytes, cnt);
            let mut total = 0u64;
            for j in 0..cnt {
                let entry = kids[base + j as usize];
                node::set_child(bytes, cfg, j, entry.page);
                node::set_rank(bytes, cfg, j, entry.total);
                if j > 0 {
                    node::set_sep_key(bytes, cfg, j - 1, entry.key);
                }
                total += entry.total;
            }
            if page_index > 0 {
                parent_entries.push(ChildEntry {
                    key: kids[base].key,
                    page,
                    total,
                });
            }
            base += cnt as usize;
        }
        self.insert_children(space, frames, layer + 1, parent_entries, added);
    }

    fn bump_ranks(&self, space: &mut PageSpace, frames: &[Frame], from_layer: usize, delta: u64) {
        if !self.cfg.ranked() {
            return;
        }
        for frame in &frames[from_layer.min(frames.len())..] {
            let bytes = space.page_mut(frame.page);
            let rank = node::rank(bytes, self.cfg, frame.index);
            node::set_rank(bytes, self.cfg, frame.index, rank + delta);
        }
    }

    /// After writing a new smallest key into the path leaf, patch the
    /// separator that addresses it.
    fn fix_left_separator(&self, space: &mut PageSpace, frames: &[Frame]) {
        let first = node::key(space.page(frames[0].page), self.cfg, 0);
        for frame in &frames[1..] {
            if frame.index > 0 {
                node::set_sep_key(space.page_mut(frame.page), self.cfg, frame.index - 1, first);
                return;
            }
        }
    }
}

/// Distribute `total` elements over `⌈total/cap⌉` pages as evenly as
/// possible; every page ends at least half full.
fn even_split(total: u64, cap: u32) -> Vec<u32> {
    let pages = total.div_ceil(cap as u64).max(1);
    let base = total / pages;
    let extra = total % pages;
    (0..pages)
        .map(|k| (base + u64::from(k < extra)) as u32)
        .collect()
}

fn snapshot_leaf(
    space: &PageSpace,
    cfg: &TreeConfig,
    page: PageRef,
    count: u32,
) -> (Vec<u8>, Vec<u8>) {
    let bytes = space.page(page);
    let key_bits = count as u64 * cfg.key_bits as u64;
    let mut keys = vec![0u8; key_bits.div_ceil(8) as usize];
    copy_bits(&mut keys, bytes, 0, super::HEADER_BITS, key_bits);
    let mut vals = Vec::new();
    if cfg.value_bits > 0 {
        let val_bits = count as u64 * cfg.value_bits as u64;
        vals = vec![0u8; val_bits.div_ceil(8) as usize];
        let value_region =
            super::HEADER_BITS + cfg.leaf_capacity() as u64 * cfg.key_bits as u64;
        copy_bits(&mut vals, bytes, 0, value_region, val_bits);
    }
    (keys, vals)
}

#[allow(clippy::too_many_arguments)]
fn fill_leaf_page(
    space: &mut PageSpace,
    cfg: &TreeConfig,
    page: PageRef,
    lo: u64,
    cnt: u32,
    begin: u64,
    n: u64,
    old_keys: &[u8],
    old_vals: &[u8],
    producer: Producer,
) {
    let hi = lo + cnt as u64;
    let bytes = space.page_mut(page);
    node::set_layer(bytes, 0);
    node::set_count(bytes, cnt);
    // old slots in front of the gap
    let prefix_end = hi.min(begin);
    if lo < prefix_end {
        copy_snapshot_slots(bytes, cfg, old_keys, old_vals, (lo - lo) as u32, lo, prefix_end - lo);
    }
    // fresh region
    let fresh_lo = lo.max(begin);
    let fresh_hi = hi.min(begin + n);
    if fresh_lo < fresh_hi {
        producer(
            &mut LeafSlots {
                bytes: &mut *bytes,
                cfg,
            },
            (fresh_lo - lo) as u32,
            (fresh_hi - lo) as u32,
        );
    }
    // old slots behind the gap
    let suffix_lo = lo.max(begin + n);
    if suffix_lo < hi {
        copy_snapshot_slots(
            bytes,
            cfg,
            old_keys,
            old_vals,
            (suffix_lo - lo) as u32,
            suffix_lo - n,
            hi - suffix_lo,
        );
    }
}

fn copy_snapshot_slots(
    bytes: &mut [u8],
    cfg: &TreeConfig,
    old_keys: &[u8],
    old_vals: &[u8],
    dst_i: u32,
    src_i: u64,
    n: u64,
) {
    let kb = cfg.key_bits as u64;
    copy_bits(
        bytes,
        old_keys,
        super::HEADER_BITS + dst_i as u64 * kb,
        src_i * kb,
        n * kb,
    );
    if cfg.value_bits > 0 {
        let vb = cfg.value_bits as u64;
        let value_region = super::HEADER_BITS + cfg.leaf_capacity() as u64 * kb;
        copy_bits(
            bytes,
            old_vals,
            value_region + dst_i as u64 * vb,
            src_i * vb,
            n * vb,
        );
    }
}

fn build_levels(
    space: &mut PageSpace,
    cfg: &TreeConfig,
    mut level: Vec<ChildEntry>,
    mut layer: u32,
) -> PageRef {
    while level.len() > 1 {
        let counts = even_split(level.len() as u64, cfg.branch_capacity());
        let mut next = Vec::with_capacity(counts.len());
        let mut base = 0usize;
        for &cnt in &counts {
            let page = space.acquire();
            let bytes = space.page_mut(page);
            node::set_layer(bytes, layer);
            node::set_count(bytes, cnt);
            let mut total = 0u64;
            for j in 0..cnt {
                let entry = level[base + j as usize];
                node::set_child(bytes, cfg, j, entry.page);
                node::set_rank(bytes, cfg, j, entry.total);
                if j > 0 {
                    node::set_sep_key(bytes, cfg, j - 1, entry.key);
                }
                total += entry.total;
            }
            next.push(ChildEntry {
                key: level[base].key,
                page,
                total,
            });
            base += cnt as usize;
        }
        level = next;
        layer += 1;
    }
    level[0].page
}
