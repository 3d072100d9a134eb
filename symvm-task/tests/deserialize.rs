//! Deserializer behaviour against literal inputs

use symvm_core::vocab::sym;
use symvm_core::{QueryMask, Store, Triple};
use symvm_task::Task;

fn deserialize<'s>(store: &'s mut Store, text: &str) -> (Task<'s>, u64) {
    let mut task = Task::new(store);
    let package = task.store_mut().create_symbol();
    let input = task.create_text_blob(text);
    task.deserialization_task(input, package);
    (task, package)
}

fn parse_error(store: &mut Store, text: &str) -> (String, Option<u64>, Option<u64>) {
    let (task, _) = deserialize(store, text);
    assert!(task.uncaught_exception(), "expected a parse failure");
    let block = task.current_block();
    let store = task.store();
    let message = store
        .get_guaranteed(block, sym::MESSAGE)
        .expect("exception message");
    let text = String::from_utf8_lossy(&store.blob_bytes(message)).into_owned();
    let row = store
        .get_uncertain(block, sym::ROW)
        .map(|s| store.read_blob_at::<u64>(s, 0));
    let column = store
        .get_uncertain(block, sym::COLUMN)
        .map(|s| store.read_blob_at::<u64>(s, 0));
    (text, row, column)
}

#[test]
fn two_clauses_one_anonymous_entity() {
    let mut store = Store::in_memory();
    let (mut task, package) = deserialize(&mut store, "(a b c; d e)");
    assert!(!task.uncaught_exception());

    let (a, b, c, d, e) = {
        let store = task.store_mut();
        (
            store.create_text("a"),
            store.create_text("b"),
            store.create_text("c"),
            store.create_text("d"),
            store.create_text("e"),
        )
    };
    let store = task.store();
    assert!(store.exists(Triple::new(a, b, c)));

    // the second clause hangs off one fresh anonymous entity
    let hits = store.query_collect(QueryMask::VMM, Triple::new(sym::VOID, d, e));
    assert_eq!(hits.len(), 1);
    let anon = hits[0].entity;
    assert!(!symvm_core::vocab::is_predefined(anon));
    assert_eq!(store.blob_size(anon), 0);

    // the package holds exactly the five named tokens
    let held = store.query_collect(
        QueryMask::MMV,
        Triple::new(package, sym::HOLDS, sym::VOID),
    );
    let mut held: Vec<u64> = held.iter().map(|t| t.value).collect();
    held.sort_unstable();
    let mut expected = vec![a, b, c, d, e];
    expected.sort_unstable();
    assert_eq!(held, expected);
}

#[test]
fn pointless_semicolon_is_reported_at_row_one_column_two() {
    let mut store = Store::in_memory();
    let (message, row, column) = parse_error(&mut store, "(;)");
    assert_eq!(message, "Pointless semicolon");
    assert_eq!(row, Some(1));
    assert_eq!(column, Some(2));
}

#[test]
fn unclosed_group_is_reported() {
    let mut store = Store::in_memory();
    let (message, _, _) = parse_error(&mut store, "(");
    assert_eq!(message, "Missing closing bracket");
}

#[test]
fn more_parse_errors() {
    for (text, message) in [
        (";", "Semicolon outside of any brackets"),
        (")", "Unmatched closing bracket"),
        ("(x \"abc", "Unterminated text"),
        ("(x y raw:GG)", "Non hex characters"),
        ("(x y raw:)", "Empty raw data"),
        ("", "Empty Input"),
        ("(a)", "Nothing declared"),
        ("(#e; a (#x; b c);)", "Unnesting failed"),
        ("(a b c; a b c)", "Triple defined twice"),
    ] {
        let mut store = Store::in_memory();
        let (reported, _, _) = parse_error(&mut store, text);
        assert_eq!(reported, message, "input {text:?}");
    }
}

#[test]
fn numeric_and_raw_literals() {
    let mut store = Store::in_memory();
    let (mut task, _) = deserialize(&mut store, "(#n vals 7 -3 2.5; blob raw:0A1B)");
    assert!(!task.uncaught_exception());
    let (vals, seven, minus_three) = {
        let store = task.store_mut();
        (
            store.create_text("vals"),
            store.create_natural(7),
            store.create_integer(-3),
        )
    };
    let store = task.store();
    let entities = store.query_collect(QueryMask::VMM, Triple::new(sym::VOID, vals, seven));
    assert_eq!(entities.len(), 1);
    let n = entities[0].entity;
    assert!(store.exists(Triple::new(n, vals, minus_three)));

    // the float literal reads back exactly
    let values = store.query_collect(QueryMask::MMV, Triple::new(n, vals, sym::VOID));
    let float = values
        .iter()
        .map(|t| t.value)
        .find(|v| store.blob_type_is(*v, sym::FLOAT))
        .expect("float literal");
    assert_eq!(store.read_blob_at::<f64>(float, 0), 2.5);

    // raw nibbles land low-first: "0A1B" is bytes A0 B1
    let blob_attr = {
        let store = task.store_mut();
        store.create_text("blob")
    };
    let store = task.store();
    let raws = store.query_collect(QueryMask::MMV, Triple::new(n, blob_attr, sym::VOID));
    assert_eq!(raws.len(), 1);
    let raw = raws[0].value;
    assert_eq!(store.blob_size(raw), 16);
    assert_eq!(store.read_blob_at::<u8>(raw, 0), 0xA0);
    assert_eq!(store.read_blob_at::<u8>(raw, 8), 0xB1);
}

#[test]
fn equal_literals_share_symbols() {
    let mut store = Store::in_memory();
    let (task, _) = deserialize(&mut store, "(p q r; s q r)");
    assert!(!task.uncaught_exception());
    let store = task.store();
    let q = store.interned_by_text("q").unwrap();
    let r = store.interned_by_text("r").unwrap();
    assert_eq!(
        store.query_count(QueryMask::VMM, Triple::new(sym::VOID, q, r)),
        2
    );
}

#[test]
fn quoted_text_honours_escapes() {
    let mut store = Store::in_memory();
    let (mut task, _) = deserialize(&mut store, "(#e said \"he\\\"llo \\\\ there\";)");
    assert!(!task.uncaught_exception());
    let expected = {
        let store = task.store_mut();
        store.create_text("he\"llo \\ there")
    };
    let store = task.store();
    let said = store.interned_by_text("said").unwrap();
    let hits = store.query_collect(QueryMask::VMM, Triple::new(sym::VOID, said, expected));
    assert_eq!(hits.len(), 1);
}

#[test]
fn local_symbols_are_per_file() {
    let mut store = Store::in_memory();
    let (mut task, package) = deserialize(&mut store, "(#x a b; c #x)");
    assert!(!task.uncaught_exception());
    let (a, b, c) = {
        let store = task.store_mut();
        (
            store.create_text("a"),
            store.create_text("b"),
            store.create_text("c"),
        )
    };
    let view = task.store();
    // both clauses name the same local
    let firsts = view.query_collect(QueryMask::VMM, Triple::new(sym::VOID, a, b));
    assert_eq!(firsts.len(), 1);
    let x = firsts[0].entity;
    let seconds = view.query_collect(QueryMask::VMM, Triple::new(sym::VOID, c, x));
    assert_eq!(seconds.len(), 1);

    // a second deserialization of the same text gets a fresh local
    let mut task = Task::new(&mut store);
    let input = task.create_text_blob("(#x a b; c #x)");
    task.deserialization_task(input, package);
    assert!(!task.uncaught_exception());
    let store = task.store();
    let firsts = store.query_collect(QueryMask::VMM, Triple::new(sym::VOID, a, b));
    assert_eq!(firsts.len(), 2);
}

#[test]
fn unnest_attaches_the_following_token() {
    let mut store = Store::in_memory();
    let (mut task, _) = deserialize(&mut store, "(#e; a (#x; b c) z;)");
    assert!(!task.uncaught_exception());
    let (a, b, c, z) = {
        let store = task.store_mut();
        (
            store.create_text("a"),
            store.create_text("b"),
            store.create_text("c"),
            store.create_text("z"),
        )
    };
    let store = task.store();
    let xs = store.query_collect(QueryMask::VMM, Triple::new(sym::VOID, b, c));
    assert_eq!(xs.len(), 1);
    let x = xs[0].entity;
    // the token after the nested group attached through its clause
    assert!(store.exists(Triple::new(x, b, z)));
    let es = store.query_collect(QueryMask::VMM, Triple::new(sym::VOID, a, x));
    assert_eq!(es.len(), 1);
}

#[test]
fn top_level_queue_becomes_output_links() {
    let mut store = Store::in_memory();
    let (task, _) = deserialize(&mut store, "(#x; a b;)\n(#y; a b;)");
    assert!(!task.uncaught_exception());
    let store = task.store();
    let outputs = store.query_collect(
        QueryMask::MMV,
        Triple::new(task.current_block(), sym::OUTPUT, sym::VOID),
    );
    assert_eq!(outputs.len(), 2);
}

#[test]
fn serialize_then_deserialize_reproduces_the_graph() {
    let mut store = Store::in_memory();
    let text = "(#e; attr \"hello world\" 42; other #e2;)\n(#e2; attr 7;)";
    let (task, package) = deserialize(&mut store, text);
    assert!(!task.uncaught_exception());
    let outputs: Vec<u64> = task
        .store()
        .query_collect(
            QueryMask::MMV,
            Triple::new(task.current_block(), sym::OUTPUT, sym::VOID),
        )
        .iter()
        .map(|t| t.value)
        .collect();
    assert_eq!(outputs.len(), 2);
    drop(task);
    let rendered = symvm_task::serialize::serialize_all(&store, &outputs);

    // feeding the rendering back in reproduces the same clause structure
    let mut task = Task::new(&mut store);
    let input = task.create_text_blob(&rendered);
    task.deserialization_task(input, package);
    assert!(!task.uncaught_exception());
    let second: Vec<u64> = task
        .store()
        .query_collect(
            QueryMask::MMV,
            Triple::new(task.current_block(), sym::OUTPUT, sym::VOID),
        )
        .iter()
        .map(|t| t.value)
        .collect();
    let store = task.store();
    assert_eq!(
        symvm_task::serialize::serialize_all(store, &second),
        rendered
    );
}
