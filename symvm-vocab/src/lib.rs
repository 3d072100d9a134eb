//! Reserved Symbol IDs and Names for symvm
//!
//! This crate is the single place where the predefined symbol range is laid
//! down. Every other crate addresses these constants through here, and their
//! numeric values are part of the on-disk storage format: a store written
//! with one ordering cannot be read with another.
//!
//! # Organization
//!
//! Constants are grouped by role:
//! - `sym` - structural attributes and well-known entities (Void, Holds, ...)
//! - `blob` - blob type tags (Natural, Integer, Float, Text)
//! - `proc` - built-in procedure symbols (Deserialize, Link, Pop, ...)

/// An opaque identifier. Symbols have no intrinsic meaning; meaning arises
/// from the triples and blobs they participate in.
pub type Symbol = u64;

/// Structural attributes and well-known entities.
pub mod sym {
    use super::Symbol;

    /// The null symbol. Never carries a blob and never participates in a
    /// triple as a real member; used as the "absent" marker throughout.
    pub const VOID: Symbol = 0;

    /// Reference-counting edge: `(owner, Holds, kept)` keeps `kept` alive.
    pub const HOLDS: Symbol = 1;

    /// First triple coordinate, as an attribute (Link/Unlink parameters).
    pub const ENTITY: Symbol = 2;

    /// Second triple coordinate, as an attribute.
    pub const ATTRIBUTE: Symbol = 3;

    /// Third triple coordinate, as an attribute.
    pub const VALUE: Symbol = 4;

    /// The package a deserialized symbol belongs to.
    pub const PACKAGE: Symbol = 5;

    /// Procedure input parameter.
    pub const INPUT: Symbol = 6;

    /// Procedure output attribute.
    pub const OUTPUT: Symbol = 7;

    /// Where a procedure's results are linked.
    pub const TARGET: Symbol = 8;

    /// Attribute tagging a symbol's blob encoding.
    pub const BLOB_TYPE: Symbol = 9;

    /// Blob type: unsigned 64-bit integer.
    pub const NATURAL: Symbol = 10;

    /// Blob type: UTF-8 text.
    pub const TEXT: Symbol = 11;

    /// Call-stack frame of a task.
    pub const FRAME: Symbol = 12;

    /// A frame's data block.
    pub const BLOCK: Symbol = 13;

    /// The procedure an execute record calls.
    pub const PROCEDURE: Symbol = 14;

    /// Static parameter block of an execute record.
    pub const STATIC: Symbol = 15;

    /// Dynamic parameter block of an execute record.
    pub const DYNAMIC: Symbol = 16;

    /// Linked-list successor (execute chains, queues).
    pub const NEXT: Symbol = 17;

    /// The pending call chain of a frame.
    pub const EXECUTE: Symbol = 18;

    /// Exception handler attached to an execute record or frame.
    pub const CATCH: Symbol = 19;

    /// Parent frame in the call stack.
    pub const PARENT: Symbol = 20;

    /// Task status attribute.
    pub const STATUS: Symbol = 21;

    /// Task status: running.
    pub const RUN: Symbol = 22;

    /// Task status: completed.
    pub const DONE: Symbol = 23;

    /// Task status value and built-in handler-search procedure.
    pub const EXCEPTION: Symbol = 24;

    /// Source row of a parse exception (1-based).
    pub const ROW: Symbol = 25;

    /// Source column of a parse exception (1-based).
    pub const COLUMN: Symbol = 26;

    /// Token queue of a deserializer group.
    pub const QUEUE: Symbol = 27;

    /// Pending unnest entity of a deserializer group.
    pub const UNNEST_ENTITY: Symbol = 28;

    /// Pending unnest attribute of a deserializer group.
    pub const UNNEST_ATTRIBUTE: Symbol = 29;

    /// Exception message attribute, and the handler's hand-off attribute.
    pub const MESSAGE: Symbol = 30;

    /// Blob type: signed 64-bit integer (negative literals).
    pub const INTEGER: Symbol = 31;

    /// Blob type: IEEE-754 double.
    pub const FLOAT: Symbol = 32;

    /// Natural-valued parameter (Pop frame count).
    pub const COUNT: Symbol = 33;
}

/// Built-in procedure symbols.
pub mod proc {
    use super::Symbol;

    /// Parse the Input text blob into triples under Package.
    pub const DESERIALIZE: Symbol = 34;

    /// Render the Input symbol's triples back into text.
    pub const SERIALIZE: Symbol = 35;

    /// Walk the Catch chain for the current exception.
    pub const EXCEPTION: Symbol = super::sym::EXCEPTION;

    /// Allocate a fresh symbol.
    pub const CREATE: Symbol = 36;

    /// Destroy the Input symbol and everything it held alone.
    pub const DESTROY: Symbol = 37;

    /// Link the (Entity, Attribute, Value) parameter triple.
    pub const LINK: Symbol = 38;

    /// Unlink the (Entity, Attribute, Value) parameter triple.
    pub const UNLINK: Symbol = 39;

    /// Pop Count frames off the call stack.
    pub const POP: Symbol = 40;

    /// Conditional: a non-zero Input blob selects the Branch chain.
    pub const BRANCH: Symbol = 41;

    /// Compare the Input and Value blobs, Output is -1/0/+1.
    pub const COMPARE: Symbol = 42;

    /// Output the Input blob's length in bits as a Natural.
    pub const BLOB_LENGTH: Symbol = 43;

    /// Output a fresh symbol carrying a copy of the Input blob.
    pub const CLONE_BLOB: Symbol = 44;
}

/// Number of reserved symbol IDs. The symbol allocator of a fresh store
/// starts counting from here.
pub const PREDEFINED_COUNT: Symbol = 45;

/// Names of the predefined symbols, in ID order. Fresh stores intern these
/// as Text blobs so that source tokens resolve to the reserved IDs.
pub const PREDEFINED_NAMES: [&str; PREDEFINED_COUNT as usize] = [
    "Void",
    "Holds",
    "Entity",
    "Attribute",
    "Value",
    "Package",
    "Input",
    "Output",
    "Target",
    "BlobType",
    "Natural",
    "Text",
    "Frame",
    "Block",
    "Procedure",
    "Static",
    "Dynamic",
    "Next",
    "Execute",
    "Catch",
    "Parent",
    "Status",
    "Run",
    "Done",
    "Exception",
    "Row",
    "Column",
    "Queue",
    "UnnestEntity",
    "UnnestAttribute",
    "Message",
    "Integer",
    "Float",
    "Count",
    "Deserialize",
    "Serialize",
    "Create",
    "Destroy",
    "Link",
    "Unlink",
    "Pop",
    "Branch",
    "Compare",
    "BlobLength",
    "CloneBlob",
];

/// Whether `symbol` is inside the reserved range.
pub fn is_predefined(symbol: Symbol) -> bool {
    symbol < PREDEFINED_COUNT
}

/// The name of a predefined symbol, if `symbol` is one.
pub fn name(symbol: Symbol) -> Option<&'static str> {
    PREDEFINED_NAMES.get(symbol as usize).copied()
}

/// Resolve a predefined name back to its symbol.
pub fn by_name(name: &str) -> Option<Symbol> {
    PREDEFINED_NAMES
        .iter()
        .position(|n| *n == name)
        .map(|at| at as Symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        for (i, a) in PREDEFINED_NAMES.iter().enumerate() {
            for b in &PREDEFINED_NAMES[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn name_lookup_roundtrips() {
        for id in 0..PREDEFINED_COUNT {
            let n = name(id).unwrap();
            assert_eq!(by_name(n), Some(id));
        }
        assert_eq!(name(PREDEFINED_COUNT), None);
        assert_eq!(by_name("NotAThing"), None);
    }

    #[test]
    fn well_known_ids_are_stable() {
        // Baked into the storage format; renumbering breaks old stores.
        assert_eq!(sym::VOID, 0);
        assert_eq!(sym::HOLDS, 1);
        assert_eq!(sym::BLOB_TYPE, 9);
        assert_eq!(sym::TEXT, 11);
        assert_eq!(proc::DESERIALIZE, 34);
        assert_eq!(by_name("Deserialize"), Some(proc::DESERIALIZE));
    }
}
