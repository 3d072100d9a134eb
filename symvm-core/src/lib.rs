//! # symvm core
//!
//! The storage and relation engine of the symvm virtual machine:
//!
//! - bit-addressed page space with a super page (`page`, `bits`)
//! - the generic paged B+tree with optional subtree ranks (`bptree`)
//! - the blob store and blob interning (`blob`, part of `store`)
//! - the six-permutation triple store with existence accounting (`store`)
//!
//! Everything is reached through a [`Store`] handle; there are no process
//! globals, so tests and embedders run independent stores freely.
//!
//! ## Example
//!
//! ```
//! use symvm_core::{Store, Triple, QueryMask};
//! use symvm_core::vocab::sym;
//!
//! let mut store = Store::in_memory();
//! let e = store.create_symbol();
//! let v = store.create_natural(42);
//! store.link(Triple::new(e, sym::HOLDS, v));
//! assert_eq!(store.query_count(QueryMask::MMV, Triple::new(e, sym::HOLDS, 0)), 1);
//! ```

pub mod bits;
pub mod blob;
pub mod bptree;
pub mod error;
pub mod page;
pub mod store;
pub mod triple;

pub use blob::{BlobPrimitive, BlobStore};
pub use bptree::{BpTree, Cursor, TreeConfig, RANKED_SET, SYMBOL_MAP, SYMBOL_SET};
pub use error::{Error, Result};
pub use page::{PageRef, PageSpace, PAGE_BITS, PAGE_BYTES};
pub use store::Store;
pub use triple::{Permutation, QueryMask, QueryMode, Triple};

pub use symvm_vocab as vocab;
pub use symvm_vocab::Symbol;
