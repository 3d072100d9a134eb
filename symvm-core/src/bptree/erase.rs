//! Inclusive-range erase
//!
//! `erase_range` walks the from/to boundary paths layer by layer from the
//! leaves up. At each layer it removes the covered slot span (one contiguous
//! delete when both ends share a page, tail+head trims otherwise), releases
//! the pages strictly between the boundaries, merges the boundary pair when
//! it fits, and otherwise rebalances an underfull boundary page with an
//! outer sibling. Working bottom-up keeps every layer below the current one
//! final, so separator keys and subtree counts are recomputed from the
//! subtrees themselves instead of being threaded through the mutation.
//!
//! Outer siblings may live under parents that are not on the boundary
//! paths; moving elements across such a seam patches the off-path ancestor
//! ranks explicitly, up to the page where the sibling's path rejoins the
//! boundary path.

use super::{first_key_of_subtree, node, subtree_total, BpTree, Cursor, TreeConfig};
use crate::page::{PageRef, PageSpace};

impl BpTree {
    /// Remove a single key; false when it is absent.
    pub fn erase_key(&mut self, space: &mut PageSpace, key: u64) -> bool {
        self.erase_range(space, key, key) > 0
    }

    /// Remove every element with `from_key ≤ key ≤ to_key`; returns how
    /// many were removed.
    pub fn erase_range(&mut self, space: &mut PageSpace, from_key: u64, to_key: u64) -> u64 {
        if self.root == 0 || from_key > to_key {
            return 0;
        }
        let mut from = Cursor::default();
        self.find_key(space, &mut from, from_key);
        if !from.valid() && self.advance(space, &mut from, 0, 1, 1, &mut |_| {}) > 0 {
            return 0;
        }
        let mut to = Cursor::default();
        let exact = self.find_key(space, &mut to, to_key);
        if !exact && self.advance(space, &mut to, 0, -1, 1, &mut |_| {}) > 0 {
            return 0;
        }
        if from.is_after(&to) {
            return 0;
        }
        self.erase_span(space, from, to)
    }

    fn erase_span(&mut self, space: &mut PageSpace, from: Cursor, to: Cursor) -> u64 {
        let cfg = self.cfg;
        let depth = from.frames.len();
        let mut removed = 0u64;
        // Entering a layer, the flags describe what happened to the two
        // boundary children one layer below: whether the lower child
        // survives (spared) and whether the higher child's ref must go.
        let mut spare_lower = 0u32;
        let mut erase_higher = 1u32;
        for layer in 0..depth {
            let leaf = layer == 0;
            let f = from.frames[layer];
            let t = to.frames[layer];
            let lower = f.page;
            let higher = t.page;
            let child_spared = spare_lower == 1;
            let child_erased = erase_higher == 1;
            let li = f.index + spare_lower;
            let hi_end = t.index + erase_higher;
            spare_lower = 1;
            erase_higher = 0;

            let mut pair_merged = false;
            let mut merged_at = 0u32;
            if lower == higher {
                if li < hi_end {
                    if leaf {
                        removed += (hi_end - li) as u64;
                        node::leaf_remove(space.page_mut(lower), cfg, li, hi_end);
                    } else {
                        node::branch_remove(space.page_mut(lower), cfg, li, hi_end);
                    }
                }
            } else {
                let lcount = node::count(space.page(lower));
                if leaf {
                    removed += (lcount - li) as u64;
                    node::leaf_remove(space.page_mut(lower), cfg, li, lcount);
                } else {
                    node::branch_remove(space.page_mut(lower), cfg, li, lcount);
                }
                if leaf {
                    removed += hi_end as u64;
                }
                if hi_end > 0 {
                    if leaf {
                        node::leaf_remove(space.page_mut(higher), cfg, 0, hi_end);
                    } else {
                        node::branch_remove(space.page_mut(higher), cfg, 0, hi_end);
                    }
                }
                // free the pages strictly between the boundaries
                let mut walk = to.clone();
                loop {
                    let Some(prev) = self.neighbor(space, &mut walk, layer, -1) else {
                        break;
                    };
                    if prev == lower {
                        break;
                    }
                    if leaf {
                        removed += node::count(space.page(prev)) as u64;
                    }
                    space.release(prev);
                }
                let lc = node::count(space.page(lower));
                let hc = node::count(space.page(higher));
                if lc + hc <= cfg.capacity(leaf) {
                    merged_at = lc;
                    merge_into_left(space, cfg, leaf, lower, higher);
                    space.release(higher);
                    pair_merged = true;
                    erase_higher = 1;
                }
            }

            // Exact refresh of the boundary children's slots (rank and
            // incoming separator); the subtrees below are final.
            if !leaf {
                let lower_child = from.frames[layer - 1].page;
                let higher_child = to.frames[layer - 1].page;
                if child_spared {
                    self.patch_child_slot(space, lower, f.index, lower_child);
                }
                if !child_erased && higher_child != lower_child {
                    let (page, pos) = if lower == higher {
                        (lower, if li < hi_end { li } else { t.index })
                    } else if pair_merged {
                        (lower, merged_at)
                    } else {
                        (higher, 0)
                    };
                    self.patch_child_slot(space, page, pos, higher_child);
                }
            }

            // Rebalance an underfull boundary page with a sibling. When
            // both boundary pages survive, at most one can be underfull,
            // otherwise the pair merge above would have fired.
            let higher_alive = lower != higher && !pair_merged;
            let half = cfg.half(leaf);
            if layer + 1 < depth {
                if node::count(space.page(lower)) < half {
                    if self.fix_underfull(space, layer, leaf, lower, &from, &to, true, higher_alive)
                    {
                        spare_lower = 0;
                        if lower == higher {
                            // one shared boundary page: its single parent
                            // slot goes through both flags
                            erase_higher = 1;
                        }
                    }
                } else if higher_alive && node::count(space.page(higher)) < half {
                    if self.fix_underfull(space, layer, leaf, higher, &from, &to, false, true) {
                        erase_higher = 1;
                    }
                }
            }
        }
        self.collapse_root(space);
        removed
    }

    /// The page adjacent to the cursor position at `layer`, found by one
    /// step at the parent layer; the cursor keeps the sibling's ancestor
    /// path for rank patching.
    fn neighbor(
        &self,
        space: &PageSpace,
        walk: &mut Cursor,
        layer: usize,
        dir: i64,
    ) -> Option<PageRef> {
        if layer + 1 >= walk.frames.len() {
            return None;
        }
        if self.advance(space, walk, layer + 1, dir, 1, &mut |_| {}) > 0 {
            return None;
        }
        let parent = walk.frames[layer + 1];
        Some(node::child(space.page(parent.page), self.cfg, parent.index))
    }

    fn patch_child_slot(&self, space: &mut PageSpace, page: PageRef, pos: u32, child: PageRef) {
        let cfg = self.cfg;
        let count = node::count(space.page(page));
        if pos >= count {
            return;
        }
        if cfg.ranked() {
            let total = subtree_total(space, cfg, child);
            node::set_rank(space.page_mut(page), cfg, pos, total);
        }
        if pos > 0 {
            let key = first_key_of_subtree(space, cfg, child);
            node::set_sep_key(space.page_mut(page), cfg, pos - 1, key);
        }
    }

    /// Merge or redistribute `page` with an adjacent sibling. Only the
    /// boundary page itself may be released; outer siblings donate or
    /// absorb but always survive, so their parent slots need no removal.
    /// Returns whether `page` was released.
    #[allow(clippy::too_many_arguments)]
    fn fix_underfull(
        &mut self,
        space: &mut PageSpace,
        layer: usize,
        leaf: bool,
        page: PageRef,
        from: &Cursor,
        to: &Cursor,
        is_lower: bool,
        higher_alive: bool,
    ) -> bool {
        let cfg = self.cfg;
        let cap = cfg.capacity(leaf);
        let half = cfg.half(leaf);
        let pc = node::count(space.page(page));
        let path = if is_lower { from } else { to };

        // Locate the neighbours. The other boundary page needs no cursor:
        // its ancestors are refreshed layer by layer anyway.
        let mut left_outer = None;
        let mut right_outer = None;
        let mut left_path = None;
        if is_lower {
            let mut walk = from.clone();
            left_outer = self.neighbor(space, &mut walk, layer, -1).map(|p| (p, walk));
            if !higher_alive {
                let mut walk = to.clone();
                right_outer = self.neighbor(space, &mut walk, layer, 1).map(|p| (p, walk));
            }
        } else {
            left_path = Some(from.frames[layer].page);
            let mut walk = to.clone();
            right_outer = self.neighbor(space, &mut walk, layer, 1).map(|p| (p, walk));
        }
        let right_path = if is_lower && higher_alive {
            Some(to.frames[layer].page)
        } else {
            None
        };
        let left = left_path.or(left_outer.as_ref().map(|(p, _)| *p));
        let right = right_path.or(right_outer.as_ref().map(|(p, _)| *p));

        // Dump into a neighbour when the contents fit.
        if let Some(l) = left {
            if node::count(space.page(l)) + pc <= cap {
                merge_into_left(space, cfg, leaf, l, page);
                space.release(page);
                if let Some((outer, walk)) = &left_outer {
                    self.patch_outer_ranks(space, walk, path, layer, *outer);
                }
                return true;
            }
        }
        if let Some(r) = right {
            if node::count(space.page(r)) + pc <= cap {
                merge_into_right(space, cfg, leaf, page, r);
                space.release(page);
                if let Some((outer, walk)) = &right_outer {
                    self.patch_outer_sep(space, walk, layer, *outer);
                    self.patch_outer_ranks(space, walk, path, layer, *outer);
                }
                return true;
            }
        }
        // Borrow: a neighbour that cannot absorb us has surplus.
        if let Some(l) = left {
            if node::count(space.page(l)) > half {
                take_from_left(space, cfg, leaf, l, page, half - pc);
                if let Some((outer, walk)) = &left_outer {
                    self.patch_outer_ranks(space, walk, path, layer, *outer);
                }
                return false;
            }
        }
        if let Some(r) = right {
            if node::count(space.page(r)) > half {
                take_from_right(space, cfg, leaf, page, r, half - pc);
                if let Some((outer, walk)) = &right_outer {
                    self.patch_outer_sep(space, walk, layer, *outer);
                    self.patch_outer_ranks(space, walk, path, layer, *outer);
                }
                return false;
            }
        }
        // No sibling anywhere: a single-child ancestor chain; the root
        // collapse absorbs it.
        false
    }

    /// Re-point an outer sibling's ancestor ranks after elements crossed
    /// the seam: exact at the parent, by delta further up, stopping where
    /// the sibling's path rejoins the boundary path.
    fn patch_outer_ranks(
        &self,
        space: &mut PageSpace,
        outer: &Cursor,
        path: &Cursor,
        layer: usize,
        outer_page: PageRef,
    ) {
        let cfg = self.cfg;
        if !cfg.ranked() {
            return;
        }
        let parent = outer.frames[layer + 1];
        let total = subtree_total(space, cfg, outer_page);
        let old = node::rank(space.page(parent.page), cfg, parent.index);
        node::set_rank(space.page_mut(parent.page), cfg, parent.index, total);
        if parent.page == path.frames[layer + 1].page {
            return;
        }
        let delta = total as i64 - old as i64;
        for j in layer + 2..outer.frames.len() {
            let pf = outer.frames[j];
            let rank = node::rank(space.page(pf.page), cfg, pf.index) as i64;
            node::set_rank(space.page_mut(pf.page), cfg, pf.index, (rank + delta) as u64);
            if pf.page == path.frames[j].page {
                break;
            }
        }
    }

    /// Refresh the incoming separator of an outer sibling whose first key
    /// changed.
    fn patch_outer_sep(
        &self,
        space: &mut PageSpace,
        outer: &Cursor,
        layer: usize,
        outer_page: PageRef,
    ) {
        let cfg = self.cfg;
        if node::count(space.page(outer_page)) == 0 {
            return;
        }
        let key = first_key_of_subtree(space, cfg, outer_page);
        for frame in &outer.frames[layer + 1..] {
            if frame.index > 0 {
                node::set_sep_key(space.page_mut(frame.page), cfg, frame.index - 1, key);
                return;
            }
        }
    }

    fn collapse_root(&mut self, space: &mut PageSpace) {
        loop {
            if self.root == 0 {
                return;
            }
            let bytes = space.page(self.root);
            let count = node::count(bytes);
            if node::layer(bytes) == 0 {
                if count == 0 {
                    space.release(self.root);
                    self.root = 0;
                }
                return;
            }
            if count == 0 {
                space.release(self.root);
                self.root = 0;
                return;
            }
            if count == 1 {
                let child = node::child(bytes, self.cfg, 0);
                space.release(self.root);
                self.root = child;
                continue;
            }
            return;
        }
    }
}

/// Append all of `right` to `left`. The caller releases `right`.
fn merge_into_left(
    space: &mut PageSpace,
    cfg: &TreeConfig,
    leaf: bool,
    left: PageRef,
    right: PageRef,
) {
    let rc = node::count(space.page(right));
    if rc == 0 {
        return;
    }
    let lc = node::count(space.page(left));
    let seam = if leaf || lc == 0 {
        0
    } else {
        first_key_of_subtree(space, cfg, node::child(space.page(right), cfg, 0))
    };
    let (lb, rb) = space.page_pair_mut(left, right);
    if leaf {
        node::copy_leaf_slots(lb, rb, cfg, lc, 0, rc);
    } else if lc == 0 {
        node::copy_branch_children(lb, rb, cfg, 0, 0, rc);
        node::copy_branch_keys(lb, rb, cfg, 0, 0, rc - 1);
    } else {
        node::copy_branch_children(lb, rb, cfg, lc, 0, rc);
        node::set_sep_key(lb, cfg, lc - 1, seam);
        node::copy_branch_keys(lb, rb, cfg, lc, 0, rc - 1);
    }
    node::set_count(lb, lc + rc);
}

/// Prepend all of `left` to `right`. The caller releases `left`.
fn merge_into_right(
    space: &mut PageSpace,
    cfg: &TreeConfig,
    leaf: bool,
    left: PageRef,
    right: PageRef,
) {
    let lc = node::count(space.page(left));
    if lc == 0 {
        return;
    }
    let seam = if leaf {
        0
    } else {
        first_key_of_subtree(space, cfg, node::child(space.page(right), cfg, 0))
    };
    let (lb, rb) = space.page_pair_mut(left, right);
    if leaf {
        node::leaf_insert_gap(rb, cfg, 0, lc);
        node::copy_leaf_slots(rb, lb, cfg, 0, 0, lc);
    } else {
        node::branch_insert_gap(rb, cfg, 0, lc);
        node::copy_branch_children(rb, lb, cfg, 0, 0, lc);
        if lc > 1 {
            node::copy_branch_keys(rb, lb, cfg, 0, 0, lc - 1);
        }
        node::set_sep_key(rb, cfg, lc - 1, seam);
    }
}

/// Move `k` slots from `left`'s tail to `page`'s head.
fn take_from_left(
    space: &mut PageSpace,
    cfg: &TreeConfig,
    leaf: bool,
    left: PageRef,
    page: PageRef,
    k: u32,
) {
    if k == 0 {
        return;
    }
    let lc = node::count(space.page(left));
    {
        let (lb, pb) = space.page_pair_mut(left, page);
        if leaf {
            node::leaf_insert_gap(pb, cfg, 0, k);
            node::copy_leaf_slots(pb, lb, cfg, 0, lc - k, k);
            node::leaf_remove(lb, cfg, lc - k, lc);
        } else {
            node::branch_insert_gap(pb, cfg, 0, k);
            node::copy_branch_children(pb, lb, cfg, 0, lc - k, k);
            node::branch_remove(lb, cfg, lc - k, lc);
        }
    }
    if !leaf {
        rebuild_seps(space, cfg, page);
    }
}

/// Move `k` slots from `right`'s head to `page`'s tail.
fn take_from_right(
    space: &mut PageSpace,
    cfg: &TreeConfig,
    leaf: bool,
    page: PageRef,
    right: PageRef,
    k: u32,
) {
    if k == 0 {
        return;
    }
    let pc = node::count(space.page(page));
    {
        let (pb, rb) = space.page_pair_mut(page, right);
        if leaf {
            node::copy_leaf_slots(pb, rb, cfg, pc, 0, k);
            node::set_count(pb, pc + k);
            node::leaf_remove(rb, cfg, 0, k);
        } else {
            node::copy_branch_children(pb, rb, cfg, pc, 0, k);
            node::set_count(pb, pc + k);
            node::branch_remove(rb, cfg, 0, k);
        }
    }
    if !leaf {
        rebuild_seps(space, cfg, page);
    }
}

/// Recompute every separator of a branch page from its children. The
/// layers below must be final.
fn rebuild_seps(space: &mut PageSpace, cfg: &TreeConfig, page: PageRef) {
    let count = node::count(space.page(page));
    for i in 1..count {
        let child = node::child(space.page(page), cfg, i);
        let key = first_key_of_subtree(space, cfg, child);
        node::set_sep_key(space.page_mut(page), cfg, i - 1, key);
    }
}
