//! Paged B+tree
//!
//! One code body parameterised by bit widths (`TreeConfig`), covering every
//! ordered-map role in the store: symbol→value maps, plain ordered sets, and
//! rank-aggregating sets whose branch slots carry subtree element counts.
//!
//! ## Invariants
//!
//! - Every non-root page is at least half full.
//! - A branch page with N children stores N−1 separator keys; the key at
//!   slot i is the smallest key reachable through child i+1.
//! - Layers number from 0 at the leaves; all leaves share one layer.
//! - With ranks enabled, each branch slot stores its child's subtree element
//!   count; the root's integrated rank (the slot sum) is the tree size.

pub mod cursor;
pub mod erase;
pub mod insert;
pub mod node;

pub use cursor::{Cursor, Frame};
pub use insert::LeafSlots;

use crate::page::{PageRef, PageSpace, PAGE_BITS};

const HEADER_BITS: u64 = 32;
const REF_BITS: u32 = 64;

/// Bit widths of one tree family; capacities and slot offsets derive from
/// these and the page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Key width in bits.
    pub key_bits: u32,
    /// Value width in bits; 0 turns the tree into an ordered set.
    pub value_bits: u32,
    /// Rank width in bits; 0 disables subtree counting.
    pub rank_bits: u32,
}

/// Symbol → 64-bit value map (blob locations, nested tree roots).
pub static SYMBOL_MAP: TreeConfig = TreeConfig {
    key_bits: 64,
    value_bits: 64,
    rank_bits: 0,
};

/// Plain ordered symbol set.
pub static SYMBOL_SET: TreeConfig = TreeConfig {
    key_bits: 64,
    value_bits: 0,
    rank_bits: 0,
};

/// Ordered symbol set with subtree counts (value sets of the triple
/// indices, where cardinality must be readable without enumeration).
pub static RANKED_SET: TreeConfig = TreeConfig {
    key_bits: 64,
    value_bits: 0,
    rank_bits: 64,
};

impl TreeConfig {
    /// Elements per leaf page.
    pub fn leaf_capacity(&self) -> u32 {
        ((PAGE_BITS - HEADER_BITS) / (self.key_bits + self.value_bits) as u64) as u32
    }

    /// Children per branch page.
    pub fn branch_capacity(&self) -> u32 {
        ((PAGE_BITS - HEADER_BITS + self.key_bits as u64)
            / (self.key_bits + REF_BITS + self.rank_bits) as u64) as u32
    }

    /// Page capacity at a layer.
    pub fn capacity(&self, leaf: bool) -> u32 {
        if leaf {
            self.leaf_capacity()
        } else {
            self.branch_capacity()
        }
    }

    /// Minimum fill of a non-root page at a layer.
    pub fn half(&self, leaf: bool) -> u32 {
        self.capacity(leaf) / 2
    }

    /// Whether branch slots carry subtree counts.
    pub fn ranked(&self) -> bool {
        self.rank_bits > 0
    }
}

/// A tree handle: a root reference plus the family configuration. Copying
/// the handle is free; the pages live in the `PageSpace`.
#[derive(Debug, Clone, Copy)]
pub struct BpTree {
    /// Root page, 0 when the tree is empty.
    pub root: PageRef,
    /// Bit-width family.
    pub cfg: &'static TreeConfig,
}

impl BpTree {
    /// An empty tree of the given family.
    pub fn new(cfg: &'static TreeConfig) -> Self {
        BpTree { root: 0, cfg }
    }

    /// Re-attach a handle to a stored root.
    pub fn from_root(cfg: &'static TreeConfig, root: PageRef) -> Self {
        BpTree { root, cfg }
    }

    /// Whether the tree holds no elements.
    pub fn is_empty(&self) -> bool {
        self.root == 0
    }

    /// Layer count; 0 for the empty tree.
    pub fn depth(&self, space: &PageSpace) -> usize {
        if self.root == 0 {
            0
        } else {
            node::layer(space.page(self.root)) as usize + 1
        }
    }

    /// Element count in O(root) time. Exact for ranked trees and for trees
    /// that fit one leaf; walks the leaves otherwise.
    pub fn element_count(&self, space: &PageSpace) -> u64 {
        if self.root == 0 {
            return 0;
        }
        let bytes = space.page(self.root);
        if node::layer(bytes) == 0 {
            node::count(bytes) as u64
        } else if self.cfg.ranked() {
            node::ranks_total(bytes, self.cfg)
        } else {
            let mut n = 0u64;
            self.for_each(space, |_, _| n += 1);
            n
        }
    }

    /// Look up a key's value. Set trees return `Some(0)` on membership.
    pub fn get(&self, space: &PageSpace, key: u64) -> Option<u64> {
        let mut cursor = Cursor::default();
        if !self.find_key(space, &mut cursor, key) {
            return None;
        }
        Some(if self.cfg.value_bits > 0 {
            self.cursor_value(space, &cursor)
        } else {
            0
        })
    }

    /// Whether a key is present.
    pub fn contains(&self, space: &PageSpace, key: u64) -> bool {
        let mut cursor = Cursor::default();
        self.find_key(space, &mut cursor, key)
    }

    /// Overwrite the value of an existing key.
    pub fn set_value(&mut self, space: &mut PageSpace, key: u64, value: u64) -> bool {
        let mut cursor = Cursor::default();
        if !self.find_key(space, &mut cursor, key) {
            return false;
        }
        let frame = cursor.frames[0];
        node::set_value(space.page_mut(frame.page), self.cfg, frame.index, value);
        true
    }

    /// Visit every element in ascending key order.
    pub fn for_each(&self, space: &PageSpace, mut visit: impl FnMut(u64, u64)) {
        let mut cursor = Cursor::default();
        if !self.find_first(space, &mut cursor) {
            return;
        }
        loop {
            visit(
                self.cursor_key(space, &cursor),
                if self.cfg.value_bits > 0 {
                    self.cursor_value(space, &cursor)
                } else {
                    0
                },
            );
            if self.advance(space, &mut cursor, 0, 1, 1, &mut |_| {}) > 0 {
                return;
            }
        }
    }

    /// Release every page of the tree.
    pub fn clear(&mut self, space: &mut PageSpace) {
        if self.root != 0 {
            release_subtree(space, self.cfg, self.root);
            self.root = 0;
        }
    }

    /// Verify the structural invariants; test support.
    pub fn check_invariants(&self, space: &PageSpace) -> Result<(), String> {
        if self.root == 0 {
            return Ok(());
        }
        check_subtree(space, self.cfg, self.root, true)?;
        Ok(())
    }
}

/// Smallest key reachable through a subtree. Layers below the caller's
/// working layer must be final.
pub(crate) fn first_key_of_subtree(space: &PageSpace, cfg: &TreeConfig, mut page: PageRef) -> u64 {
    loop {
        let bytes = space.page(page);
        if node::layer(bytes) == 0 {
            return node::key(bytes, cfg, 0);
        }
        page = node::child(bytes, cfg, 0);
    }
}

/// Element count of a subtree, reading only its root page.
pub(crate) fn subtree_total(space: &PageSpace, cfg: &TreeConfig, page: PageRef) -> u64 {
    let bytes = space.page(page);
    if node::layer(bytes) == 0 {
        node::count(bytes) as u64
    } else {
        node::ranks_total(bytes, cfg)
    }
}

/// Release a page and everything below it; returns the element count that
/// vanished with it.
pub(crate) fn release_subtree(space: &mut PageSpace, cfg: &TreeConfig, page: PageRef) -> u64 {
    let bytes = space.page(page);
    let count = node::count(bytes);
    let mut freed = 0u64;
    if node::layer(bytes) == 0 {
        freed = count as u64;
    } else {
        let children: Vec<PageRef> = (0..count).map(|i| node::child(bytes, cfg, i)).collect();
        for child in children {
            freed += release_subtree(space, cfg, child);
        }
    }
    space.release(page);
    freed
}

struct SubtreeShape {
    first_key: u64,
    last_key: u64,
    elements: u64,
}

fn check_subtree(
    space: &PageSpace,
    cfg: &TreeConfig,
    page: PageRef,
    is_root: bool,
) -> Result<SubtreeShape, String> {
    let bytes = space.page(page);
    let count = node::count(bytes);
    let layer = node::layer(bytes);
    let leaf = layer == 0;
    if count == 0 {
        return Err(format!("page {page} is empty"));
    }
    if !is_root && count < cfg.half(leaf) {
        return Err(format!(
            "page {page} below half fill: {count} < {}",
            cfg.half(leaf)
        ));
    }
    if leaf {
        let mut prev = None;
        for i in 0..count {
            let k = node::key(bytes, cfg, i);
            if let Some(p) = prev {
                if k <= p {
                    return Err(format!("leaf {page} keys not strictly ascending at {i}"));
                }
            }
            prev = Some(k);
        }
        return Ok(SubtreeShape {
            first_key: node::key(bytes, cfg, 0),
            last_key: node::key(bytes, cfg, count - 1),
            elements: count as u64,
        });
    }
    let mut elements = 0u64;
    let mut first_key = 0u64;
    let mut last_key = 0u64;
    for i in 0..count {
        let child = node::child(bytes, cfg, i);
        let child_layer = node::layer(space.page(child));
        if child_layer + 1 != layer {
            return Err(format!("page {page} child {i} skips a layer"));
        }
        let shape = check_subtree(space, cfg, child, false)?;
        if i == 0 {
            first_key = shape.first_key;
        } else {
            let sep = node::sep_key(bytes, cfg, i - 1);
            if sep != shape.first_key {
                return Err(format!(
                    "page {page} separator {} != child {i} first key {}",
                    sep, shape.first_key
                ));
            }
            if shape.first_key <= last_key {
                return Err(format!("page {page} child {i} overlaps its left sibling"));
            }
        }
        if cfg.ranked() && node::rank(bytes, cfg, i) != shape.elements {
            return Err(format!(
                "page {page} rank {} != child {i} size {}",
                node::rank(bytes, cfg, i),
                shape.elements
            ));
        }
        elements += shape.elements;
        last_key = shape.last_key;
    }
    Ok(SubtreeShape {
        first_key,
        last_key,
        elements,
    })
}
