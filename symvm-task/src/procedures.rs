//! Predefined procedures
//!
//! Dispatch is a closed enumeration keyed by the reserved procedure
//! symbols; user procedures are triple graphs entered by re-binding the
//! frame's Execute chain in `Task::step`.
//!
//! Built-ins read their parameters from the current block and link their
//! results onto the block's Target (or the block itself), so calls compose
//! with Static/Dynamic parameter passing exactly like user procedures.

use crate::serialize;
use crate::task::Task;
use symvm_core::{Error, Result, Triple};
use symvm_vocab::{proc, sym, Symbol};
use tracing::trace;

/// The built-in procedure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltIn {
    Deserialize,
    Serialize,
    Exception,
    Create,
    Destroy,
    Link,
    Unlink,
    Pop,
    Branch,
    Compare,
    BlobLength,
    CloneBlob,
}

/// Map a predefined symbol to its built-in, if it names one.
pub fn builtin_of(procedure: Symbol) -> Option<BuiltIn> {
    Some(match procedure {
        proc::DESERIALIZE => BuiltIn::Deserialize,
        proc::SERIALIZE => BuiltIn::Serialize,
        proc::EXCEPTION => BuiltIn::Exception,
        proc::CREATE => BuiltIn::Create,
        proc::DESTROY => BuiltIn::Destroy,
        proc::LINK => BuiltIn::Link,
        proc::UNLINK => BuiltIn::Unlink,
        proc::POP => BuiltIn::Pop,
        proc::BRANCH => BuiltIn::Branch,
        proc::COMPARE => BuiltIn::Compare,
        proc::BLOB_LENGTH => BuiltIn::BlobLength,
        proc::CLONE_BLOB => BuiltIn::CloneBlob,
        _ => return None,
    })
}

/// Run `procedure` if it is a built-in; false hands control back to the
/// step loop to enter a user procedure's Execute chain.
pub(crate) fn execute_predefined(task: &mut Task, procedure: Symbol) -> Result<bool> {
    let Some(builtin) = builtin_of(procedure) else {
        return Ok(false);
    };
    trace!(?builtin, "predefined procedure");
    match builtin {
        BuiltIn::Deserialize => task.run_deserializer()?,
        BuiltIn::Exception => run_exception(task),
        BuiltIn::Serialize => {
            let input = guaranteed(task, sym::INPUT)?;
            let text = serialize::serialize(task.store(), input);
            let output = task.store_mut().create_text(&text);
            finish(task, &[(sym::OUTPUT, output)]);
        }
        BuiltIn::Create => {
            let output = task.store_mut().create_symbol();
            finish(task, &[(sym::OUTPUT, output)]);
        }
        BuiltIn::Destroy => {
            let input = guaranteed(task, sym::INPUT)?;
            task.store_mut().destroy(input);
            task.pop_call_stack();
        }
        BuiltIn::Link => {
            let triple = triple_params(task)?;
            task.store_mut().link(triple);
            task.pop_call_stack();
        }
        BuiltIn::Unlink => {
            let triple = triple_params(task)?;
            task.store_mut().unlink(triple);
            task.pop_call_stack();
        }
        BuiltIn::Pop => {
            let count = natural(task, sym::COUNT)?;
            task.pop_call_stack();
            for _ in 0..count {
                if !task.pop_call_stack() {
                    break;
                }
            }
        }
        BuiltIn::Branch => {
            let chain = guaranteed(task, proc::BRANCH)?;
            let condition = natural(task, sym::INPUT)?;
            task.pop_call_stack();
            if condition != 0 {
                let frame = task.current_frame();
                task.store_mut()
                    .set_solitary(Triple::new(frame, sym::EXECUTE, chain));
            }
        }
        BuiltIn::Compare => {
            let a = guaranteed(task, sym::INPUT)?;
            let b = guaranteed(task, sym::VALUE)?;
            let verdict = task.store().compare_blobs(a, b) as i64;
            let output = task.store_mut().create_integer(verdict);
            finish(task, &[(sym::OUTPUT, output)]);
        }
        BuiltIn::BlobLength => {
            let input = guaranteed(task, sym::INPUT)?;
            let bits = task.store().blob_size(input);
            let output = task.store_mut().create_natural(bits);
            finish(task, &[(sym::OUTPUT, output)]);
        }
        BuiltIn::CloneBlob => {
            let input = guaranteed(task, sym::INPUT)?;
            let output = task.store_mut().create_symbol();
            task.store_mut().clone_blob(output, input);
            if let Some(blob_type) = task.store().get_uncertain(input, sym::BLOB_TYPE) {
                task.store_mut()
                    .link(Triple::new(output, sym::BLOB_TYPE, blob_type));
            }
            finish(task, &[(sym::OUTPUT, output)]);
        }
    }
    Ok(true)
}

/// Walk the Catch chain for the exception block in the current frame,
/// unwinding to the nearest handler and re-binding its Execute; without a
/// handler the task halts with status Exception.
pub(crate) fn run_exception(task: &mut Task) {
    let exception_block = task.current_block();
    let store = task.store();
    let mut walker = task.current_frame();
    let mut handler = None;
    while let Some(parent) = store.get_uncertain(walker, sym::PARENT) {
        if let Some(catcher) = store.get_uncertain(parent, sym::CATCH) {
            let handler_block = store.get_uncertain(parent, sym::BLOCK).unwrap_or(sym::VOID);
            handler = Some((parent, catcher, handler_block));
            break;
        }
        walker = parent;
    }
    match handler {
        Some((frame, catcher, handler_block)) => {
            trace!(frame, "exception caught");
            // hand the exception block over before unwinding destroys it;
            // the Holds edge is what keeps it alive through the pops
            if handler_block != sym::VOID {
                task.store_mut()
                    .link(Triple::new(handler_block, sym::HOLDS, exception_block));
                task.store_mut()
                    .link(Triple::new(handler_block, sym::MESSAGE, exception_block));
            }
            while task.current_frame() != frame {
                if !task.pop_call_stack() {
                    break;
                }
            }
            task.store_mut()
                .unlink_all(frame, sym::CATCH);
            task.store_mut()
                .set_solitary(Triple::new(frame, sym::EXECUTE, catcher));
        }
        None => {
            trace!("uncaught exception");
            task.set_status(sym::EXCEPTION);
        }
    }
}

fn guaranteed(task: &Task, attribute: Symbol) -> Result<Symbol> {
    task.store().get_guaranteed(task.current_block(), attribute)
}

fn natural(task: &Task, attribute: Symbol) -> Result<u64> {
    let symbol = guaranteed(task, attribute)?;
    if !task.store().blob_type_is(symbol, sym::NATURAL) {
        return Err(Error::TypeMismatch {
            symbol,
            expected: sym::NATURAL,
        });
    }
    Ok(task.store().read_blob_at::<u64>(symbol, 0))
}

fn triple_params(task: &Task) -> Result<Triple> {
    Ok(Triple::new(
        guaranteed(task, sym::ENTITY)?,
        guaranteed(task, sym::ATTRIBUTE)?,
        guaranteed(task, sym::VALUE)?,
    ))
}

/// Pop back to the caller and link the outputs onto the target symbol,
/// replacing any previous values of the same attributes.
fn finish(task: &mut Task, outputs: &[(Symbol, Symbol)]) {
    let target = task.target_symbol();
    task.pop_call_stack();
    for (attribute, value) in outputs {
        task.store_mut().unlink_all(target, *attribute);
        task.store_mut()
            .link(Triple::new(target, *attribute, *value));
    }
}
