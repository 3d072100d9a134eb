//! Directory walking and package linking

use std::fs;
use symvm_cli::{load_from_path, CliError};
use symvm_core::vocab::sym;
use symvm_core::{QueryMask, Store, Triple};
use symvm_task::Task;

#[test]
fn directories_become_held_packages() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("pkg");
    let sub = root.join("sub");
    fs::create_dir_all(&sub).unwrap();
    fs::write(root.join("top.sym"), "(#a; kind widget;)").unwrap();
    fs::write(sub.join("inner.sym"), "(#b; kind gadget;)").unwrap();
    fs::write(sub.join("ignored.txt"), "not a sym file").unwrap();

    let mut store = Store::in_memory();
    {
        let mut task = Task::new(&mut store);
        load_from_path(&mut task, sym::VOID, false, &root).unwrap();
        task.clear();
    }

    let pkg = store.interned_by_text("pkg").expect("package symbol");
    let sub_pkg = store.interned_by_text("sub").expect("subpackage symbol");
    // root package holds itself, subpackage holds its parent
    assert!(store.exists(Triple::new(pkg, sym::HOLDS, pkg)));
    assert!(store.exists(Triple::new(sub_pkg, sym::HOLDS, pkg)));

    // both files landed in their packages
    let kind = store.interned_by_text("kind").unwrap();
    let widget = store.interned_by_text("widget").unwrap();
    let gadget = store.interned_by_text("gadget").unwrap();
    assert_eq!(
        store.query_count(QueryMask::VMM, Triple::new(sym::VOID, kind, widget)),
        1
    );
    assert_eq!(
        store.query_count(QueryMask::VMM, Triple::new(sym::VOID, kind, gadget)),
        1
    );
    assert!(store.exists(Triple::new(pkg, sym::HOLDS, kind)));
    assert!(store.exists(Triple::new(sub_pkg, sym::HOLDS, kind)));
}

#[test]
fn deserialize_failures_carry_exit_code_two() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("broken.sym");
    fs::write(&file, "(").unwrap();

    let mut store = Store::in_memory();
    let mut task = Task::new(&mut store);
    let error = load_from_path(&mut task, sym::VOID, false, &file).unwrap_err();
    assert!(matches!(error, CliError::Deserialize(_)));
    assert_eq!(error.exit_code(), 2);
}

#[test]
fn plain_data_loads_without_execution() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("data.sym");
    fs::write(&file, "(a b c)").unwrap();

    let mut store = Store::in_memory();
    let mut task = Task::new(&mut store);
    load_from_path(&mut task, sym::VOID, false, &file).unwrap();
    // the empty-queue outcome still maps to its reserved exit code
    assert_eq!(CliError::NothingToExecute(file).exit_code(), 3);
}

#[test]
fn execution_failures_carry_exit_code_four() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("prog.sym");
    fs::write(&file, "(#p; Execute (#e; Procedure #nosuch;);)").unwrap();

    let mut store = Store::in_memory();
    let mut task = Task::new(&mut store);
    let package = task.store_mut().create_symbol();
    let error = load_from_path(&mut task, package, true, &file).unwrap_err();
    assert!(matches!(error, CliError::Execution(_)));
    assert_eq!(error.exit_code(), 4);
}
