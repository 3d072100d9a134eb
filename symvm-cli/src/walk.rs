//! Path walker
//!
//! Directories become package symbols (interned from their basename, so
//! the same directory name resolves to the same package across runs) with
//! a `(childPackage, Holds, parentPackage)` edge; `.sym` files deserialize
//! into the innermost package. Entries are visited in name order and
//! dotfiles are skipped.

use crate::error::CliError;
use std::path::Path;
use symvm_core::Triple;
use symvm_task::Task;
use symvm_vocab::sym;
use tracing::info;

/// Load a file or directory tree, optionally executing Output clauses.
pub fn load_from_path(
    task: &mut Task<'_>,
    parent_package: u64,
    execute: bool,
    path: &Path,
) -> Result<(), CliError> {
    let meta = std::fs::metadata(path).map_err(|e| CliError::Input(path.to_path_buf(), e))?;
    if meta.is_dir() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let package = task.store_mut().create_text(&name);
        let parent_package = if parent_package == sym::VOID {
            package
        } else {
            parent_package
        };
        task.store_mut()
            .link(Triple::new(package, sym::HOLDS, parent_package));
        let mut entries: Vec<_> = std::fs::read_dir(path)
            .map_err(|e| CliError::Input(path.to_path_buf(), e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| !n.to_string_lossy().starts_with('.'))
            })
            .collect();
        entries.sort();
        for entry in entries {
            load_from_path(task, package, execute, &entry)?;
        }
        return Ok(());
    }
    if !meta.is_file() || path.extension().map_or(true, |ext| ext != "sym") {
        return Ok(());
    }

    info!(path = %path.display(), "loading");
    let text =
        std::fs::read_to_string(path).map_err(|e| CliError::Input(path.to_path_buf(), e))?;
    let input = task.create_text_blob(&text);
    task.deserialization_task(input, parent_package);
    if task.uncaught_exception() {
        return Err(CliError::Deserialize(path.to_path_buf()));
    }
    if !execute {
        return Ok(());
    }
    if !task.execute_deserialized() {
        return Err(CliError::NothingToExecute(path.to_path_buf()));
    }
    if task.uncaught_exception() {
        return Err(CliError::Execution(path.to_path_buf()));
    }
    Ok(())
}
