//! Tree cursors
//!
//! A cursor is one frame per layer, leaf first. `find_*` position it,
//! `advance` walks it sideways at a chosen layer. Frames below the layer an
//! `advance` call worked at are refreshed on the way back down, so a cursor
//! advanced at layer 0 is always fully valid.

use super::{node, BpTree};
use crate::page::{PageRef, PageSpace};

/// One layer of a cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Frame {
    /// Page at this layer.
    pub page: PageRef,
    /// Slot (leaf) or child (branch) index within the page.
    pub index: u32,
    /// Slot count of the page when it was loaded.
    pub end: u32,
}

/// Cursor over a tree; `frames[0]` is the leaf frame.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    /// Frames, leaf first.
    pub frames: Vec<Frame>,
}

impl Cursor {
    /// Whether the leaf frame points at a real slot.
    pub fn valid(&self) -> bool {
        self.frames
            .first()
            .is_some_and(|frame| frame.index < frame.end)
    }

    /// Whether `self` addresses a later leaf slot than `other`.
    pub fn is_after(&self, other: &Cursor) -> bool {
        debug_assert_eq!(self.frames.len(), other.frames.len());
        for layer in (0..self.frames.len()).rev() {
            let (a, b) = (self.frames[layer].index, other.frames[layer].index);
            if a != b {
                return a > b;
            }
        }
        false
    }
}

impl BpTree {
    /// Position at the smallest element. False on the empty tree.
    pub fn find_first(&self, space: &PageSpace, cursor: &mut Cursor) -> bool {
        self.descend(space, cursor, Extreme::First)
    }

    /// Position at the largest element. False on the empty tree.
    pub fn find_last(&self, space: &PageSpace, cursor: &mut Cursor) -> bool {
        self.descend(space, cursor, Extreme::Last)
    }

    /// Position at the first slot whose key is ≥ `key`; true iff the key is
    /// present exactly. The leaf index may sit one past the last slot when
    /// every key in the tree is smaller.
    pub fn find_key(&self, space: &PageSpace, cursor: &mut Cursor, key: u64) -> bool {
        cursor.frames.clear();
        if self.root == 0 {
            return false;
        }
        let depth = self.depth(space);
        cursor.frames.resize(depth, Frame::default());
        let mut page = self.root;
        for layer in (1..depth).rev() {
            let bytes = space.page(page);
            let index = node::child_for_key(bytes, self.cfg, key);
            cursor.frames[layer] = Frame {
                page,
                index,
                end: node::count(bytes),
            };
            page = node::child(bytes, self.cfg, index);
        }
        let bytes = space.page(page);
        let (index, exact) = node::leaf_search(bytes, self.cfg, key);
        cursor.frames[0] = Frame {
            page,
            index,
            end: node::count(bytes),
        };
        exact
    }

    /// Position at the element with the given ordinal (ranked trees only).
    pub fn find_rank(&self, space: &PageSpace, cursor: &mut Cursor, mut rank: u64) -> bool {
        debug_assert!(self.cfg.ranked());
        cursor.frames.clear();
        if self.root == 0 || rank >= self.element_count(space) {
            return false;
        }
        let depth = self.depth(space);
        cursor.frames.resize(depth, Frame::default());
        let mut page = self.root;
        for layer in (1..depth).rev() {
            let bytes = space.page(page);
            let count = node::count(bytes);
            let mut index = 0;
            while index + 1 < count {
                let size = node::rank(bytes, self.cfg, index);
                if rank < size {
                    break;
                }
                rank -= size;
                index += 1;
            }
            cursor.frames[layer] = Frame { page, index, end: count };
            page = node::child(bytes, self.cfg, index);
        }
        let bytes = space.page(page);
        cursor.frames[0] = Frame {
            page,
            index: rank as u32,
            end: node::count(bytes),
        };
        true
    }

    /// Key under the cursor.
    pub fn cursor_key(&self, space: &PageSpace, cursor: &Cursor) -> u64 {
        let frame = cursor.frames[0];
        node::key(space.page(frame.page), self.cfg, frame.index)
    }

    /// Value under the cursor.
    pub fn cursor_value(&self, space: &PageSpace, cursor: &Cursor) -> u64 {
        let frame = cursor.frames[0];
        node::value(space.page(frame.page), self.cfg, frame.index)
    }

    /// Move `steps` slots at `at_layer` in direction `dir` (±1), invoking
    /// `touch` on each newly visited page. Frames below `at_layer` are
    /// refreshed to the extreme slot of each newly entered page. Returns the
    /// steps that could not be taken before the tree ran out.
    pub fn advance(
        &self,
        space: &PageSpace,
        cursor: &mut Cursor,
        at_layer: usize,
        dir: i64,
        mut steps: u64,
        touch: &mut dyn FnMut(PageRef),
    ) -> u64 {
        debug_assert!(dir == 1 || dir == -1);
        if cursor.frames.len() <= at_layer {
            return steps;
        }
        while steps > 0 {
            if !self.step(space, cursor, at_layer, dir, touch) {
                break;
            }
            steps -= 1;
        }
        steps
    }

    fn step(
        &self,
        space: &PageSpace,
        cursor: &mut Cursor,
        at_layer: usize,
        dir: i64,
        touch: &mut dyn FnMut(PageRef),
    ) -> bool {
        let depth = cursor.frames.len();
        {
            let frame = &mut cursor.frames[at_layer];
            if dir > 0 {
                if frame.index + 1 < frame.end {
                    frame.index += 1;
                    return true;
                }
            } else if frame.index > 0 {
                frame.index -= 1;
                return true;
            }
        }
        // Climb to the first layer that can move, then descend back.
        let mut layer = at_layer + 1;
        while layer < depth {
            let frame = cursor.frames[layer];
            let movable = if dir > 0 {
                frame.index + 1 < frame.end
            } else {
                frame.index > 0
            };
            if movable {
                break;
            }
            layer += 1;
        }
        if layer >= depth {
            return false;
        }
        if dir > 0 {
            cursor.frames[layer].index += 1;
        } else {
            cursor.frames[layer].index -= 1;
        }
        while layer > at_layer {
            let parent = cursor.frames[layer];
            let child = node::child(space.page(parent.page), self.cfg, parent.index);
            touch(child);
            layer -= 1;
            let bytes = space.page(child);
            let end = node::count(bytes);
            cursor.frames[layer] = Frame {
                page: child,
                index: if dir > 0 { 0 } else { end - 1 },
                end,
            };
        }
        true
    }

    fn descend(&self, space: &PageSpace, cursor: &mut Cursor, extreme: Extreme) -> bool {
        cursor.frames.clear();
        if self.root == 0 {
            return false;
        }
        let depth = self.depth(space);
        cursor.frames.resize(depth, Frame::default());
        let mut page = self.root;
        for layer in (0..depth).rev() {
            let bytes = space.page(page);
            let end = node::count(bytes);
            let index = match extreme {
                Extreme::First => 0,
                Extreme::Last => end - 1,
            };
            cursor.frames[layer] = Frame { page, index, end };
            if layer > 0 {
                page = node::child(bytes, self.cfg, index);
            }
        }
        true
    }
}

#[derive(Clone, Copy)]
enum Extreme {
    First,
    Last,
}
