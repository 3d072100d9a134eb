//! HRL serializer
//!
//! Renders an entity's triples back into the textual form the deserializer
//! reads: one group, the entity as its first clause, one clause per
//! attribute in index order. Literals render by blob type, blob-less
//! symbols get generated local names, and symbols that already carry a
//! `#`-named blob keep their name, so serializing and re-deserializing
//! reproduces the triple set up to anonymous-symbol renaming.

use symvm_core::{QueryMask, Store, Triple};
use symvm_vocab::{self as vocab, sym, Symbol};

/// Render one entity and all of its triples as a group.
pub fn serialize(store: &Store, entity: Symbol) -> String {
    let triples = store.query_collect(QueryMask::MVV, Triple::new(entity, sym::VOID, sym::VOID));
    let mut out = String::from("(");
    out.push_str(&render_symbol(store, entity));
    let mut current = None;
    for triple in &triples {
        if current != Some(triple.attribute) {
            out.push_str("; ");
            out.push_str(&render_symbol(store, triple.attribute));
            current = Some(triple.attribute);
        }
        out.push(' ');
        out.push_str(&render_symbol(store, triple.value));
    }
    out.push(')');
    out
}

/// Render several entities as consecutive top-level groups.
pub fn serialize_all(store: &Store, entities: &[Symbol]) -> String {
    entities
        .iter()
        .map(|entity| serialize(store, *entity))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_symbol(store: &Store, symbol: Symbol) -> String {
    if let Some(name) = vocab::name(symbol) {
        return name.to_string();
    }
    let bits = store.blob_size(symbol);
    if bits == 0 {
        return format!("#g{symbol}");
    }
    if store.blob_type_is(symbol, sym::TEXT) {
        let text = text_of(store, symbol, bits);
        if token_safe(&text) {
            return text;
        }
        return format!("\"{}\"", escape(&text));
    }
    if store.blob_type_is(symbol, sym::NATURAL) {
        return store.read_blob_at::<u64>(symbol, 0).to_string();
    }
    if store.blob_type_is(symbol, sym::INTEGER) {
        return store.read_blob_at::<i64>(symbol, 0).to_string();
    }
    if store.blob_type_is(symbol, sym::FLOAT) {
        // Debug formatting keeps the decimal point the parser needs
        return format!("{:?}", store.read_blob_at::<f64>(symbol, 0));
    }
    let bytes = store.blob_bytes(symbol);
    if bits % 8 == 0 && bytes.first() == Some(&b'#') && bytes.iter().all(u8::is_ascii_graphic) {
        // a file-local name, written back as-is
        return String::from_utf8_lossy(&bytes).into_owned();
    }
    let mut out = String::from("raw:");
    for i in 0..bits.div_ceil(4) {
        let byte = bytes[(i / 2) as usize];
        let nibble = if i % 2 == 0 { byte & 0xF } else { byte >> 4 };
        out.push(char::from_digit(nibble as u32, 16).expect("nibble").to_ascii_uppercase());
    }
    out
}

fn text_of(store: &Store, symbol: Symbol, bits: u64) -> String {
    let mut bytes = store.blob_bytes(symbol);
    bytes.truncate((bits / 8) as usize);
    String::from_utf8_lossy(&bytes).into_owned()
}

fn token_safe(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let first = text.as_bytes()[0];
    if first == b'#' || first == b'-' || first.is_ascii_digit() {
        return false;
    }
    if text.as_bytes().starts_with(b"raw:") {
        return false;
    }
    text.bytes()
        .all(|c| !matches!(c, b'(' | b')' | b';' | b'"' | b'\\' | b' ' | b'\t' | b'\n'))
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
