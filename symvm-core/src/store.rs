//! The store
//!
//! One `Store` owns the page space, the blob arena, the content index and
//! the six permutation indices, and is passed as a handle to everything
//! above it; there is no process-global state, and tests run any number of
//! independent stores side by side.
//!
//! Each permutation index is a B+tree of B+trees: an outer map from the
//! first coordinate to a middle map from the second coordinate to a ranked
//! set of third coordinates. All of them live in the same page space, and
//! their roots are written back through the nesting on every mutation.

use crate::blob::{BlobData, BlobPrimitive, BlobStore};
use crate::bptree::{BpTree, Cursor, RANKED_SET, SYMBOL_MAP};
use crate::error::{Error, Result};
use crate::page::{superpage, PageSpace};
use crate::triple::{Permutation, QueryMask, QueryMode, Triple};
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::path::Path;
use symvm_vocab::{is_predefined, sym, Symbol, PREDEFINED_COUNT, PREDEFINED_NAMES};
use tracing::{debug, trace};

const PAGE_FILE: &str = "pages.db";
const BLOB_FILE: &str = "blobs.db";

/// Ordered set of interned symbols, sorted by blob comparison, with a hash
/// mirror for O(1) membership tests.
#[derive(Default)]
struct InternIndex {
    items: Vec<Symbol>,
    members: FxHashSet<Symbol>,
}

/// The symbolic triple-store engine.
pub struct Store {
    space: PageSpace,
    blobs: BlobStore,
    symbol_count: Symbol,
    index: [BpTree; 6],
    intern: InternIndex,
}

impl Store {
    /// A fresh store with the predefined symbols filled in; pages live in
    /// memory until `save`.
    pub fn in_memory() -> Store {
        let space = PageSpace::new();
        let mut store = Store {
            space,
            blobs: BlobStore::new(0),
            symbol_count: PREDEFINED_COUNT,
            index: [BpTree::new(&SYMBOL_MAP); 6],
            intern: InternIndex::default(),
        };
        store.fill_predefined();
        store
    }

    /// Open a storage directory, initialising it when empty.
    pub fn open(dir: &Path) -> Result<Store> {
        let page_path = dir.join(PAGE_FILE);
        if !page_path.exists() {
            debug!(dir = %dir.display(), "initialising fresh storage");
            return Ok(Store::in_memory());
        }
        let space = PageSpace::deserialize(&std::fs::read(&page_path)?)?;
        let blob_bytes = std::fs::read(dir.join(BLOB_FILE))?;
        let (entries, interned) = decode_blob_file(&blob_bytes)?;
        let symbol_count = space.field(superpage::SYMBOL_COUNT);
        let mut index = [BpTree::new(&SYMBOL_MAP); 6];
        for (i, tree) in index.iter_mut().enumerate() {
            tree.root = space.field(superpage::INDEX_ROOTS + i as u64 * 64);
        }
        let mut blobs = BlobStore::new(space.field(superpage::BLOBS_ROOT));
        blobs.restore(entries);
        let members = interned.iter().copied().collect();
        debug!(dir = %dir.display(), symbols = symbol_count, "storage loaded");
        Ok(Store {
            space,
            blobs,
            symbol_count,
            index,
            intern: InternIndex {
                items: interned,
                members,
            },
        })
    }

    /// Persist into a storage directory.
    pub fn save(&mut self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        self.space
            .set_field(superpage::SYMBOL_COUNT, self.symbol_count);
        self.space
            .set_field(superpage::BLOBS_ROOT, self.blobs.tree.root);
        for (i, tree) in self.index.iter().enumerate() {
            self.space
                .set_field(superpage::INDEX_ROOTS + i as u64 * 64, tree.root);
        }
        let pages = self.space.serialize();
        std::fs::write(dir.join(PAGE_FILE), pages)?;
        let entries = self.blobs.entries(&self.space);
        std::fs::write(
            dir.join(BLOB_FILE),
            encode_blob_file(&entries, &self.intern.items),
        )?;
        debug!(dir = %dir.display(), symbols = self.symbol_count, "storage saved");
        Ok(())
    }

    // ---- symbols ----

    /// Allocate a fresh symbol. IDs are monotone; released IDs are not
    /// recycled, so identity is unambiguous within a store lifetime.
    pub fn create_symbol(&mut self) -> Symbol {
        let symbol = self.symbol_count;
        self.symbol_count += 1;
        trace!(symbol, "created symbol");
        symbol
    }

    /// Number of symbols ever allocated, predefined range included.
    pub fn symbol_count(&self) -> Symbol {
        self.symbol_count
    }

    /// Free a symbol's blob and forget its interning. Callers ensure the
    /// symbol no longer participates in triples.
    pub fn release_symbol(&mut self, symbol: Symbol) {
        self.evict_intern(symbol);
        self.blobs.set_size(&mut self.space, symbol, 0, 0);
        trace!(symbol, "released symbol");
    }

    // ---- blobs ----

    /// Blob length in bits.
    pub fn blob_size(&self, symbol: Symbol) -> u64 {
        self.blobs.get_size(&self.space, symbol)
    }

    /// Resize a blob; grown tail bits read as zero.
    pub fn set_blob_size(&mut self, symbol: Symbol, bits: u64) {
        self.evict_intern(symbol);
        self.blobs.set_size_preserving(&mut self.space, symbol, bits);
    }

    /// Read a primitive at a bit offset.
    pub fn read_blob_at<T: BlobPrimitive>(&self, symbol: Symbol, off: u64) -> T {
        self.blobs.read_at(&self.space, symbol, off)
    }

    /// Write a primitive at a bit offset.
    pub fn write_blob_at<T: BlobPrimitive>(&mut self, symbol: Symbol, off: u64, value: T) {
        self.evict_intern(symbol);
        self.blobs.write_at(&self.space, symbol, off, value);
    }

    /// Copy a bit range out of a blob.
    pub fn read_blob_bits(&self, symbol: Symbol, buf: &mut [u8], off: u64, len: u64) {
        self.blobs.read_bits(&self.space, symbol, buf, off, len);
    }

    /// Copy a bit range into a blob.
    pub fn write_blob_bits(&mut self, symbol: Symbol, buf: &[u8], off: u64, len: u64) {
        self.evict_intern(symbol);
        self.blobs.write_bits(&self.space, symbol, buf, off, len);
    }

    /// The whole blob as bytes.
    pub fn blob_bytes(&self, symbol: Symbol) -> Vec<u8> {
        self.blobs.read_all(&self.space, symbol)
    }

    /// Replace a blob with `len` bits of `buf`.
    pub fn set_blob_bytes(&mut self, symbol: Symbol, buf: &[u8], len: u64) {
        self.evict_intern(symbol);
        self.blobs.write_all(&mut self.space, symbol, buf, len);
    }

    /// Copy `len` bits from `src` into `dst`.
    pub fn slice_blob(
        &mut self,
        dst: Symbol,
        src: Symbol,
        dst_off: u64,
        src_off: u64,
        len: u64,
    ) -> bool {
        self.evict_intern(dst);
        self.blobs.slice(&self.space, dst, src, dst_off, src_off, len)
    }

    /// Make `dst`'s blob a copy of `src`'s.
    pub fn clone_blob(&mut self, dst: Symbol, src: Symbol) {
        self.evict_intern(dst);
        self.blobs.clone_blob(&mut self.space, dst, src);
    }

    /// Cut the bit range [begin, end) out of a blob.
    pub fn decrease_blob(&mut self, symbol: Symbol, begin: u64, end: u64) -> bool {
        self.evict_intern(symbol);
        self.blobs.erase_range(&mut self.space, symbol, begin, end)
    }

    /// Open a zeroed gap of `len` bits at `begin`.
    pub fn increase_blob(&mut self, symbol: Symbol, begin: u64, len: u64) -> bool {
        self.evict_intern(symbol);
        let zeroes = vec![0u8; len.div_ceil(8) as usize];
        self.blobs
            .insert_range(&mut self.space, symbol, &zeroes, begin, len)
    }

    /// Total order over blobs: length first, then bit-lexicographic.
    pub fn compare_blobs(&self, a: Symbol, b: Symbol) -> Ordering {
        self.blobs.compare(&self.space, a, b)
    }

    // ---- content index (blob interning) ----

    /// Intern a symbol by blob content: returns the canonical owner of the
    /// bit-string, destroying `symbol` when another owner already exists.
    pub fn intern(&mut self, symbol: Symbol) -> Symbol {
        let (at, found) = self.intern_search(symbol);
        if found {
            let canonical = self.intern.items[at];
            if canonical != symbol {
                self.destroy(symbol);
            }
            return canonical;
        }
        self.intern.items.insert(at, symbol);
        self.intern.members.insert(symbol);
        symbol
    }

    /// The canonical owner of a bit-string, if any symbol with an equal
    /// blob is interned.
    pub fn interned_lookup(&self, symbol: Symbol) -> Option<Symbol> {
        let (at, found) = self.intern_search(symbol);
        found.then(|| self.intern.items[at])
    }

    /// The interned symbol owning exactly this text, without creating one.
    pub fn interned_by_text(&self, text: &str) -> Option<Symbol> {
        let bytes = text.as_bytes();
        let bits = bytes.len() as u64 * 8;
        let (mut lo, mut hi) = (0usize, self.intern.items.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            match self
                .blobs
                .compare_bytes(&self.space, bytes, bits, self.intern.items[mid])
            {
                Ordering::Greater => lo = mid + 1,
                Ordering::Less => hi = mid,
                Ordering::Equal => return Some(self.intern.items[mid]),
            }
        }
        None
    }

    fn intern_search(&self, symbol: Symbol) -> (usize, bool) {
        let (mut lo, mut hi) = (0usize, self.intern.items.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            match self.compare_blobs(symbol, self.intern.items[mid]) {
                Ordering::Greater => lo = mid + 1,
                Ordering::Less => hi = mid,
                Ordering::Equal => return (mid, true),
            }
        }
        (lo, false)
    }

    /// Forget an interned symbol before its blob changes; mutating an
    /// indexed blob would otherwise leave a stale, unfindable entry.
    fn evict_intern(&mut self, symbol: Symbol) {
        if !self.intern.members.remove(&symbol) {
            return;
        }
        let (at, found) = self.intern_search(symbol);
        debug_assert!(found && self.intern.items[at] == symbol);
        if found {
            self.intern.items.remove(at);
        }
    }

    // ---- literal constructors ----

    /// Intern a UTF-8 text literal; equal texts share one symbol.
    pub fn create_text(&mut self, text: &str) -> Symbol {
        self.create_typed(text.as_bytes(), text.len() as u64 * 8, sym::TEXT)
    }

    /// Intern an unsigned integer literal.
    pub fn create_natural(&mut self, value: u64) -> Symbol {
        self.create_typed(&value.to_le_bytes(), 64, sym::NATURAL)
    }

    /// Intern a signed integer literal.
    pub fn create_integer(&mut self, value: i64) -> Symbol {
        self.create_typed(&value.to_le_bytes(), 64, sym::INTEGER)
    }

    /// Intern a floating-point literal.
    pub fn create_float(&mut self, value: f64) -> Symbol {
        self.create_typed(&value.to_bits().to_le_bytes(), 64, sym::FLOAT)
    }

    fn create_typed(&mut self, bytes: &[u8], bits: u64, blob_type: Symbol) -> Symbol {
        let symbol = self.create_symbol();
        self.blobs.write_all(&mut self.space, symbol, bytes, bits);
        let canonical = self.intern(symbol);
        if canonical == symbol {
            self.link(Triple::new(symbol, sym::BLOB_TYPE, blob_type));
        }
        canonical
    }

    /// A fresh symbol carrying `bits` of raw payload. Raw blobs are not
    /// interned and carry no type tag.
    pub fn create_raw(&mut self, bytes: &[u8], bits: u64) -> Symbol {
        let symbol = self.create_symbol();
        self.blobs.write_all(&mut self.space, symbol, bytes, bits);
        symbol
    }

    /// Whether `(symbol, BlobType, expected)` holds.
    pub fn blob_type_is(&self, symbol: Symbol, expected: Symbol) -> bool {
        self.exists(Triple::new(symbol, sym::BLOB_TYPE, expected))
    }

    // ---- triples ----

    /// Whether the exact triple is present.
    pub fn exists(&self, triple: Triple) -> bool {
        let Some(middle) = self.nested(Permutation::Eav as usize, triple.entity) else {
            return false;
        };
        let Some(inner) = nested_of(&self.space, &middle, triple.attribute, &RANKED_SET) else {
            return false;
        };
        inner.contains(&self.space, triple.value)
    }

    /// Insert a triple into all six indices; false when it already exists.
    pub fn link(&mut self, triple: Triple) -> bool {
        if self.exists(triple) {
            return false;
        }
        for perm in Permutation::ALL {
            let coords = perm.coords();
            self.index_insert(
                perm as usize,
                triple.pos(coords[0]),
                triple.pos(coords[1]),
                triple.pos(coords[2]),
            );
        }
        trace!(%triple, "linked");
        true
    }

    /// Remove a triple from all six indices and re-evaluate each member's
    /// existence; false when the triple was absent.
    ///
    /// A member that lost its last participation is released on the spot;
    /// severing a Holds edge additionally runs the reference-count scrutiny
    /// on the held symbol, which may cascade.
    pub fn unlink(&mut self, triple: Triple) -> bool {
        if !self.exists(triple) {
            return false;
        }
        for perm in Permutation::ALL {
            let coords = perm.coords();
            self.index_remove(
                perm as usize,
                triple.pos(coords[0]),
                triple.pos(coords[1]),
                triple.pos(coords[2]),
            );
        }
        trace!(%triple, "unlinked");
        let mut seen = [sym::VOID; 3];
        for i in 0..3 {
            let member = triple.pos(i);
            if seen[..i].contains(&member) {
                continue;
            }
            seen[i] = member;
            if !is_predefined(member) && !self.participates(member) {
                self.release_symbol(member);
            }
        }
        if triple.attribute == sym::HOLDS {
            self.scrutinize_existence(triple.value);
        }
        true
    }

    /// Unlink every value of `(entity, attribute, ·)`; false when there
    /// was none.
    pub fn unlink_all(&mut self, entity: Symbol, attribute: Symbol) -> bool {
        let hits = self.query_collect(QueryMask::MMV, Triple::new(entity, attribute, sym::VOID));
        for hit in &hits {
            self.unlink(*hit);
        }
        !hits.is_empty()
    }

    /// Replace every value of `(entity, attribute, ·)` with the given one:
    /// the primitive behind single-valued attributes.
    pub fn set_solitary(&mut self, triple: Triple) {
        let mut stale = Vec::new();
        let mut present = false;
        self.query(
            QueryMask::MMV,
            Triple::new(triple.entity, triple.attribute, sym::VOID),
            |result| {
                if result.value == triple.value {
                    present = true;
                } else {
                    stale.push(result.value);
                }
            },
        );
        for value in stale {
            self.unlink(Triple::new(triple.entity, triple.attribute, value));
        }
        if !present {
            self.link(triple);
        }
    }

    /// The unique value of `(entity, attribute)`, or `MissingTriple`.
    pub fn get_guaranteed(&self, entity: Symbol, attribute: Symbol) -> Result<Symbol> {
        self.get_uncertain(entity, attribute)
            .ok_or(Error::MissingTriple { entity, attribute })
    }

    /// The first value of `(entity, attribute)` in symbol order, if any.
    pub fn get_uncertain(&self, entity: Symbol, attribute: Symbol) -> Option<Symbol> {
        let middle = self.nested(Permutation::Eav as usize, entity)?;
        let inner = nested_of(&self.space, &middle, attribute, &RANKED_SET)?;
        let mut cursor = Cursor::default();
        inner
            .find_first(&self.space, &mut cursor)
            .then(|| inner.cursor_key(&self.space, &cursor))
    }

    /// Cardinality test on `(entity, attribute, ·)` without enumerating.
    pub fn value_set_count_is(&self, entity: Symbol, attribute: Symbol, n: u64) -> bool {
        let count = self
            .nested(Permutation::Eav as usize, entity)
            .and_then(|middle| nested_of(&self.space, &middle, attribute, &RANKED_SET))
            .map_or(0, |inner| inner.element_count(&self.space));
        count == n
    }

    /// Run a masked query; the callback sees the full triple with Varying
    /// positions filled in and Ignore positions Void. Returns the callback
    /// count.
    pub fn query(&self, mask: QueryMask, triple: Triple, mut callback: impl FnMut(Triple)) -> u64 {
        let perm = Permutation::for_mask(mask);
        let coords = perm.coords();
        let modes = [
            mask.0[coords[0]],
            mask.0[coords[1]],
            mask.0[coords[2]],
        ];
        let outer = &self.index[perm as usize];
        let mut count = 0u64;
        let mut with_level0 = |first: Symbol, middle_root: u64| {
            let middle = BpTree::from_root(&SYMBOL_MAP, middle_root);
            let mut with_level1 = |second: Symbol, inner_root: u64| {
                let inner = BpTree::from_root(&RANKED_SET, inner_root);
                let mut emit = |third: Symbol| {
                    let mut result = Triple::void();
                    if modes[0] != QueryMode::Ignore {
                        result.set_pos(coords[0], first);
                    }
                    if modes[1] != QueryMode::Ignore {
                        result.set_pos(coords[1], second);
                    }
                    if modes[2] != QueryMode::Ignore {
                        result.set_pos(coords[2], third);
                    }
                    count += 1;
                    callback(result);
                };
                match modes[2] {
                    QueryMode::Match => {
                        if inner.contains(&self.space, triple.pos(coords[2])) {
                            emit(triple.pos(coords[2]));
                        }
                    }
                    QueryMode::Varying => inner.for_each(&self.space, |third, _| emit(third)),
                    // a key is present in the middle map only while its
                    // value set is non-empty
                    QueryMode::Ignore => emit(sym::VOID),
                }
            };
            match modes[1] {
                QueryMode::Match => {
                    if let Some(root) = middle.get(&self.space, triple.pos(coords[1])) {
                        with_level1(triple.pos(coords[1]), root);
                    }
                }
                QueryMode::Varying => {
                    middle.for_each(&self.space, |second, root| with_level1(second, root))
                }
                QueryMode::Ignore => {
                    let mut cursor = Cursor::default();
                    if middle.find_first(&self.space, &mut cursor) {
                        let second = middle.cursor_key(&self.space, &cursor);
                        let root = middle.cursor_value(&self.space, &cursor);
                        with_level1(second, root);
                    }
                }
            }
        };
        match modes[0] {
            QueryMode::Match => {
                if let Some(root) = outer.get(&self.space, triple.pos(coords[0])) {
                    with_level0(triple.pos(coords[0]), root);
                }
            }
            QueryMode::Varying => outer.for_each(&self.space, |first, root| with_level0(first, root)),
            QueryMode::Ignore => {
                let mut cursor = Cursor::default();
                if outer.find_first(&self.space, &mut cursor) {
                    let first = outer.cursor_key(&self.space, &cursor);
                    let root = outer.cursor_value(&self.space, &cursor);
                    with_level0(first, root);
                }
            }
        }
        count
    }

    /// Query variant collecting the full result triples.
    pub fn query_collect(&self, mask: QueryMask, triple: Triple) -> Vec<Triple> {
        let mut results = Vec::new();
        self.query(mask, triple, |t| results.push(t));
        results
    }

    /// Query variant returning only the count.
    pub fn query_count(&self, mask: QueryMask, triple: Triple) -> u64 {
        self.query(mask, triple, |_| {})
    }

    /// A fresh symbol pre-linked with `(symbol, attribute, value)` pairs.
    pub fn create_with(&mut self, pairs: &[(Symbol, Symbol)]) -> Symbol {
        let symbol = self.create_symbol();
        for (attribute, value) in pairs {
            self.link(Triple::new(symbol, *attribute, *value));
        }
        symbol
    }

    // ---- existence accounting ----

    /// Whether the symbol occurs in any triple, in any position.
    pub fn participates(&self, symbol: Symbol) -> bool {
        self.index[Permutation::Eav as usize].contains(&self.space, symbol)
            || self.index[Permutation::Aev as usize].contains(&self.space, symbol)
            || self.index[Permutation::Vea as usize].contains(&self.space, symbol)
    }

    /// Whether any `(·, Holds, symbol)` edge keeps the symbol alive.
    pub fn is_held(&self, symbol: Symbol) -> bool {
        self.query_count(
            QueryMask::VMM,
            Triple::new(sym::VOID, sym::HOLDS, symbol),
        ) > 0
    }

    /// The manually driven reference count: runs on a symbol whose last
    /// incoming Holds edge was just removed. Without a remaining holder the
    /// symbol is destroyed outright, unlinking everything it participates
    /// in; that severs its own Holds edges, which cascades. Idempotent and
    /// safe to call on live symbols.
    pub fn scrutinize_existence(&mut self, symbol: Symbol) {
        if is_predefined(symbol) || self.is_held(symbol) {
            return;
        }
        if self.participates(symbol) {
            trace!(symbol, "destroyed by scrutiny");
            self.destroy(symbol);
        } else {
            self.release_symbol(symbol);
        }
    }

    /// Unlink every triple the symbol occurs in (cascading through Holds
    /// edges via scrutiny) and release it.
    pub fn destroy(&mut self, symbol: Symbol) {
        if is_predefined(symbol) {
            return;
        }
        let mut triples = Vec::new();
        self.query(
            QueryMask::MVV,
            Triple::new(symbol, sym::VOID, sym::VOID),
            |t| triples.push(t),
        );
        self.query(
            QueryMask::VMV,
            Triple::new(sym::VOID, symbol, sym::VOID),
            |t| triples.push(t),
        );
        self.query(
            QueryMask::VVM,
            Triple::new(sym::VOID, sym::VOID, symbol),
            |t| triples.push(t),
        );
        for triple in triples {
            // cascading scrutiny may already have taken a triple down
            self.unlink(triple);
        }
        if !self.participates(symbol) {
            self.release_symbol(symbol);
        }
    }

    /// Total number of stored triples; test support.
    pub fn triple_count(&self) -> u64 {
        self.query_count(QueryMask::VVV, Triple::void())
    }

    // ---- nested index plumbing ----

    fn nested(&self, perm: usize, first: Symbol) -> Option<BpTree> {
        nested_of(&self.space, &self.index[perm], first, &SYMBOL_MAP)
    }

    fn index_insert(&mut self, perm: usize, first: Symbol, second: Symbol, third: Symbol) {
        let mut outer = self.index[perm];
        let outer_entry = outer.get(&self.space, first);
        let mut middle = match outer_entry {
            Some(root) => BpTree::from_root(&SYMBOL_MAP, root),
            None => BpTree::new(&SYMBOL_MAP),
        };
        let middle_entry = middle.get(&self.space, second);
        let mut inner = match middle_entry {
            Some(root) => BpTree::from_root(&RANKED_SET, root),
            None => BpTree::new(&RANKED_SET),
        };
        inner.insert_unique(&mut self.space, third, 0);
        match middle_entry {
            Some(root) if root == inner.root => {}
            Some(_) => {
                middle.set_value(&mut self.space, second, inner.root);
            }
            None => {
                middle.insert_unique(&mut self.space, second, inner.root);
            }
        }
        match outer_entry {
            Some(root) if root == middle.root => {}
            Some(_) => {
                outer.set_value(&mut self.space, first, middle.root);
            }
            None => {
                outer.insert_unique(&mut self.space, first, middle.root);
            }
        }
        self.index[perm] = outer;
    }

    fn index_remove(&mut self, perm: usize, first: Symbol, second: Symbol, third: Symbol) {
        let mut outer = self.index[perm];
        let Some(middle_root) = outer.get(&self.space, first) else {
            return;
        };
        let mut middle = BpTree::from_root(&SYMBOL_MAP, middle_root);
        let Some(inner_root) = middle.get(&self.space, second) else {
            return;
        };
        let mut inner = BpTree::from_root(&RANKED_SET, inner_root);
        inner.erase_key(&mut self.space, third);
        if inner.is_empty() {
            middle.erase_key(&mut self.space, second);
        } else if inner.root != inner_root {
            middle.set_value(&mut self.space, second, inner.root);
        }
        if middle.is_empty() {
            outer.erase_key(&mut self.space, first);
        } else if middle.root != middle_root {
            outer.set_value(&mut self.space, first, middle.root);
        }
        self.index[perm] = outer;
    }

    fn fill_predefined(&mut self) {
        for (id, name) in PREDEFINED_NAMES.iter().enumerate() {
            let symbol = id as Symbol;
            self.blobs.write_all(
                &mut self.space,
                symbol,
                name.as_bytes(),
                name.len() as u64 * 8,
            );
            let (at, found) = self.intern_search(symbol);
            debug_assert!(!found);
            self.intern.items.insert(at, symbol);
            self.intern.members.insert(symbol);
        }
    }

    /// The underlying page space; test support.
    pub fn space(&self) -> &PageSpace {
        &self.space
    }
}

fn nested_of(
    space: &PageSpace,
    tree: &BpTree,
    key: Symbol,
    cfg: &'static crate::bptree::TreeConfig,
) -> Option<BpTree> {
    tree.get(space, key).map(|root| BpTree::from_root(cfg, root))
}

fn encode_blob_file(entries: &[(Symbol, u64, BlobData)], interned: &[Symbol]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(entries.len() as u64).to_le_bytes());
    for (_, handle, data) in entries {
        out.extend_from_slice(&handle.to_le_bytes());
        out.extend_from_slice(&data.bits.to_le_bytes());
        out.extend_from_slice(&data.data);
    }
    out.extend_from_slice(&(interned.len() as u64).to_le_bytes());
    for symbol in interned {
        out.extend_from_slice(&symbol.to_le_bytes());
    }
    out
}

fn decode_blob_file(bytes: &[u8]) -> Result<(Vec<(u64, BlobData)>, Vec<Symbol>)> {
    let mut at = 0usize;
    let mut word = |at: &mut usize| -> Result<u64> {
        let end = *at + 8;
        if end > bytes.len() {
            return Err(Error::BadStorage("truncated blob file".into()));
        }
        let value = u64::from_le_bytes(bytes[*at..end].try_into().unwrap());
        *at = end;
        Ok(value)
    };
    let count = word(&mut at)?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let handle = word(&mut at)?;
        let bits = word(&mut at)?;
        let len = bits.div_ceil(8) as usize;
        if at + len > bytes.len() {
            return Err(Error::BadStorage("truncated blob payload".into()));
        }
        entries.push((
            handle,
            BlobData {
                bits,
                data: bytes[at..at + len].to_vec(),
            },
        ));
        at += len;
    }
    let interned_count = word(&mut at)?;
    let mut interned = Vec::with_capacity(interned_count as usize);
    for _ in 0..interned_count {
        interned.push(word(&mut at)?);
    }
    Ok((entries, interned))
}
