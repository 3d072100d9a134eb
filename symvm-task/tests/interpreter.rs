//! Interpreter flows: procedure graphs, built-ins, exceptions, teardown

use symvm_core::vocab::{proc, sym};
use symvm_core::{QueryMask, Store, Triple};
use symvm_task::Task;

fn load(task: &mut Task<'_>, package: u64, text: &str) {
    let input = task.create_text_blob(text);
    task.deserialization_task(input, package);
    assert!(!task.uncaught_exception(), "deserialize failed");
}

/// The procedures the last deserialization collected as Output clauses.
fn deserialized_outputs(task: &Task<'_>) -> Vec<u64> {
    task.store()
        .query_collect(
            QueryMask::MMV,
            Triple::new(task.current_block(), sym::OUTPUT, sym::VOID),
        )
        .iter()
        .map(|t| t.value)
        .collect()
}

/// Follow `procedure — Execute → record — Static → block — Target → t`.
fn static_target(task: &Task<'_>, procedure: u64) -> u64 {
    let store = task.store();
    let record = store.get_guaranteed(procedure, sym::EXECUTE).unwrap();
    let params = store.get_guaranteed(record, sym::STATIC).unwrap();
    store.get_guaranteed(params, sym::TARGET).unwrap()
}

#[test]
fn create_procedure_links_its_output() {
    let mut store = Store::in_memory();
    let mut task = Task::new(&mut store);
    let package = task.store_mut().create_symbol();
    load(
        &mut task,
        package,
        "(#proc; Execute (#e1; Procedure Create; Static (#s1; Target #t;););)",
    );
    let outputs = deserialized_outputs(&task);
    assert_eq!(outputs.len(), 1);
    let target = static_target(&task, outputs[0]);

    assert!(task.execute_deserialized());
    assert!(!task.uncaught_exception());

    let store = task.store();
    let created = store.query_collect(
        QueryMask::MMV,
        Triple::new(target, sym::OUTPUT, sym::VOID),
    );
    assert_eq!(created.len(), 1);
    assert!(!symvm_core::vocab::is_predefined(created[0].value));
}

#[test]
fn blob_length_reads_its_input() {
    let mut store = Store::in_memory();
    let mut task = Task::new(&mut store);
    let package = task.store_mut().create_symbol();
    load(
        &mut task,
        package,
        "(#proc; Execute (#e1; Procedure BlobLength; Static (#s1; Input 42; Target #t;););)",
    );
    let outputs = deserialized_outputs(&task);
    let target = static_target(&task, outputs[0]);

    assert!(task.execute_deserialized());
    assert!(!task.uncaught_exception());

    let store = task.store();
    let output = store.get_guaranteed(target, sym::OUTPUT).unwrap();
    assert!(store.blob_type_is(output, sym::NATURAL));
    assert_eq!(store.read_blob_at::<u64>(output, 0), 64);
}

#[test]
fn missing_procedure_body_is_an_uncaught_exception() {
    let mut store = Store::in_memory();
    let mut task = Task::new(&mut store);
    let package = task.store_mut().create_symbol();
    load(
        &mut task,
        package,
        "(#proc; Execute (#e1; Procedure #nosuch;);)",
    );
    assert!(task.execute_deserialized());
    assert!(task.uncaught_exception());
    assert!(!task.running());
    // the exception block names the failure
    let store = task.store();
    let message = store
        .get_guaranteed(task.current_block(), sym::MESSAGE)
        .unwrap();
    let text = String::from_utf8_lossy(&store.blob_bytes(message)).into_owned();
    assert!(text.contains("missing triple"), "{text}");
}

#[test]
fn catch_chain_recovers_and_continues() {
    let mut store = Store::in_memory();
    let mut task = Task::new(&mut store);
    let package = task.store_mut().create_symbol();
    load(
        &mut task,
        package,
        "(#proc; Execute (#e1; Procedure #nosuch; \
         Catch (#h; Procedure Create; Static (#hs; Target #ht;);););)",
    );
    let outputs = deserialized_outputs(&task);
    let (handler_target,) = {
        let store = task.store();
        let record = store.get_guaranteed(outputs[0], sym::EXECUTE).unwrap();
        let handler = store.get_guaranteed(record, sym::CATCH).unwrap();
        let params = store.get_guaranteed(handler, sym::STATIC).unwrap();
        (store.get_guaranteed(params, sym::TARGET).unwrap(),)
    };

    assert!(task.execute_deserialized());
    assert!(!task.uncaught_exception(), "handler should have caught");
    let store = task.store();
    assert_eq!(
        store.query_count(
            QueryMask::MMV,
            Triple::new(handler_target, sym::OUTPUT, sym::VOID)
        ),
        1
    );
    assert!(store.exists(Triple::new(task.task_symbol(), sym::STATUS, sym::DONE)));
}

#[test]
fn chained_procedures_run_in_order() {
    let mut store = Store::in_memory();
    let mut task = Task::new(&mut store);
    let package = task.store_mut().create_symbol();
    // two outputs: both procedures run, each linking its own target
    load(
        &mut task,
        package,
        "(#p1; Execute (#e1; Procedure Create; Static (#s1; Target #t1;););)\n\
         (#p2; Execute (#e2; Procedure Create; Static (#s2; Target #t2;););)",
    );
    let outputs = deserialized_outputs(&task);
    assert_eq!(outputs.len(), 2);
    let targets: Vec<u64> = outputs.iter().map(|p| static_target(&task, *p)).collect();

    assert!(task.execute_deserialized());
    assert!(!task.uncaught_exception());
    let store = task.store();
    for target in targets {
        assert!(store.get_uncertain(target, sym::OUTPUT).is_some());
    }
}

#[test]
fn execute_finite_bounds_the_step_count() {
    let mut store = Store::in_memory();
    let mut task = Task::new(&mut store);
    let package = task.store_mut().create_symbol();
    load(
        &mut task,
        package,
        "(#proc; Execute (#e1; Procedure Create; Static (#s1; Target #t;););)",
    );
    assert_eq!(deserialized_outputs(&task).len(), 1);
    task.execute_finite(0);
    assert!(task.running());
    task.execute_infinite();
    assert!(!task.running());
}

#[test]
fn clear_tears_down_any_state() {
    let mut store = Store::in_memory();
    let symbols_before;
    {
        let mut task = Task::new(&mut store);
        let package = task.store_mut().create_symbol();
        symbols_before = package;
        load(&mut task, package, "(#x; a b;)");
        task.clear();
        assert_eq!(task.current_frame(), sym::VOID);
        // a cleared task can host a fresh deserialization
        load(&mut task, package, "(#y; a c;)");
        task.clear();
    }
    // the package-held data survives task teardown
    let a = store.interned_by_text("a").unwrap();
    let b = store.interned_by_text("b").unwrap();
    assert_eq!(
        store.query_count(QueryMask::VMM, Triple::new(sym::VOID, a, b)),
        1
    );
    assert!(symbols_before < store.symbol_count());
}

#[test]
fn builtin_table_covers_the_reserved_procedures() {
    use symvm_task::procedures::builtin_of;
    for procedure in [
        proc::DESERIALIZE,
        proc::SERIALIZE,
        proc::EXCEPTION,
        proc::CREATE,
        proc::DESTROY,
        proc::LINK,
        proc::UNLINK,
        proc::POP,
        proc::BRANCH,
        proc::COMPARE,
        proc::BLOB_LENGTH,
        proc::CLONE_BLOB,
    ] {
        assert!(builtin_of(procedure).is_some());
    }
    assert!(builtin_of(sym::HOLDS).is_none());
    assert!(builtin_of(12345).is_none());
}
