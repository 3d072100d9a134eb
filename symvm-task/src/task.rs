//! Task and frame interpreter
//!
//! Runtime state lives in the store itself:
//!
//! - `(task, Status, Run | Done | Exception)`
//! - `(task, Frame, topFrame)`, `(frame, Parent, parentFrame)`
//! - `(frame, Block, block)`, `(frame, Execute, execute chain)`
//! - `(execute, Procedure | Static | Dynamic | Next | Catch, ...)`
//!
//! Holds edges from the task and from each frame keep the referenced
//! symbols alive; popping a frame is one unlink plus scrutiny. There is no
//! native call stack, so recursion depth is bounded only by symbols.

use crate::{deserialize, procedures};
use symvm_core::{Error, QueryMask, Result, Store, Triple};
use symvm_vocab::{proc, sym, Symbol};
use tracing::trace;

/// A task driving the step loop over a borrowed store.
pub struct Task<'s> {
    store: &'s mut Store,
    task: Symbol,
    frame: Symbol,
    block: Symbol,
}

impl<'s> Task<'s> {
    /// A task handle without a live task symbol; `deserialization_task`
    /// starts one.
    pub fn new(store: &'s mut Store) -> Self {
        Task {
            store,
            task: sym::VOID,
            frame: sym::VOID,
            block: sym::VOID,
        }
    }

    /// Shared access to the underlying store.
    pub fn store(&self) -> &Store {
        self.store
    }

    /// Mutable access to the underlying store.
    pub fn store_mut(&mut self) -> &mut Store {
        self.store
    }

    /// The current frame's data block (after a failure, the exception
    /// block).
    pub fn current_block(&self) -> Symbol {
        self.block
    }

    /// The current frame symbol.
    pub fn current_frame(&self) -> Symbol {
        self.frame
    }

    /// The task symbol itself; Void before the first `deserialization_task`.
    pub fn task_symbol(&self) -> Symbol {
        self.task
    }

    /// A fresh Text blob holding `text`, typed but not interned; the usual
    /// way to feed source into `deserialization_task`.
    pub fn create_text_blob(&mut self, text: &str) -> Symbol {
        let symbol = self
            .store
            .create_raw(text.as_bytes(), text.len() as u64 * 8);
        self.store
            .link(Triple::new(symbol, sym::BLOB_TYPE, sym::TEXT));
        symbol
    }

    pub(crate) fn set_status(&mut self, status: Symbol) {
        self.store
            .set_solitary(Triple::new(self.task, sym::STATUS, status));
    }

    pub(crate) fn set_frame(&mut self, unlink_holds: bool, set_block: bool, new_frame: Symbol) {
        debug_assert_ne!(self.frame, new_frame);
        if new_frame == sym::VOID {
            self.block = sym::VOID;
        } else {
            self.store
                .link(Triple::new(self.task, sym::HOLDS, new_frame));
            self.store
                .set_solitary(Triple::new(self.task, sym::FRAME, new_frame));
            if set_block {
                self.block = self
                    .store
                    .get_uncertain(new_frame, sym::BLOCK)
                    .unwrap_or(sym::VOID);
            }
        }
        let old_frame = self.frame;
        if unlink_holds {
            self.store
                .unlink(Triple::new(self.task, sym::HOLDS, old_frame));
        }
        if old_frame != sym::VOID {
            self.store.scrutinize_existence(old_frame);
        }
        self.frame = new_frame;
    }

    /// Drop the current frame and resume its parent; false once the stack
    /// is empty (status becomes Done).
    pub fn pop_call_stack(&mut self) -> bool {
        debug_assert_ne!(self.task, sym::VOID);
        if self.frame == sym::VOID {
            return false;
        }
        let parent = self.store.get_uncertain(self.frame, sym::PARENT);
        if parent.is_none() {
            self.set_status(sym::DONE);
        }
        let parent = parent.unwrap_or(sym::VOID);
        self.set_frame(true, true, parent);
        parent != sym::VOID
    }

    /// Where the current procedure's results belong: the block's Target
    /// when present, the block itself otherwise.
    pub(crate) fn target_symbol(&self) -> Symbol {
        self.store
            .get_uncertain(self.block, sym::TARGET)
            .unwrap_or(self.block)
    }

    /// Tear the task down from any state.
    pub fn clear(&mut self) {
        if self.task == sym::VOID {
            return;
        }
        while self.pop_call_stack() {}
        self.store.destroy(self.task);
        self.task = sym::VOID;
        self.frame = sym::VOID;
        self.block = sym::VOID;
    }

    /// One interpreter step; false when the task is not running.
    pub fn step(&mut self) -> bool {
        if !self.running() {
            return false;
        }
        let parent_block = self.block;
        let parent_frame = self.frame;
        let Some(execute) = self.store.get_uncertain(parent_frame, sym::EXECUTE) else {
            self.pop_call_stack();
            return true;
        };
        if let Err(error) = self.step_inner(parent_block, parent_frame, execute) {
            self.raise(&error);
        }
        true
    }

    fn step_inner(
        &mut self,
        parent_block: Symbol,
        parent_frame: Symbol,
        execute: Symbol,
    ) -> Result<()> {
        let procedure = self.store.get_guaranteed(execute, sym::PROCEDURE)?;
        trace!(procedure, "step");
        self.block = self.store.create_symbol();
        let block = self.block;
        let frame = self.store.create_with(&[
            (sym::HOLDS, parent_frame),
            (sym::PARENT, parent_frame),
            (sym::HOLDS, block),
            (sym::BLOCK, block),
            (sym::PROCEDURE, procedure),
        ]);
        self.set_frame(true, false, frame);

        if let Some(static_params) = self.store.get_uncertain(execute, sym::STATIC) {
            let params = self
                .store
                .query_collect(QueryMask::MVV, Triple::new(static_params, 0, 0));
            for param in params {
                self.store
                    .link(Triple::new(block, param.attribute, param.value));
            }
        }
        if let Some(dynamic_params) = self.store.get_uncertain(execute, sym::DYNAMIC) {
            let params = self
                .store
                .query_collect(QueryMask::MVV, Triple::new(dynamic_params, 0, 0));
            for param in params {
                let (attr_src, attr_dst) = (param.attribute, param.value);
                let bound = self
                    .store
                    .query_collect(QueryMask::MMV, Triple::new(parent_block, attr_src, 0));
                for hit in bound {
                    self.store.link(Triple::new(block, attr_dst, hit.value));
                }
            }
        }

        if let Some(next) = self.store.get_uncertain(execute, sym::NEXT) {
            self.store
                .set_solitary(Triple::new(parent_frame, sym::EXECUTE, next));
        } else {
            self.store.unlink_all(parent_frame, sym::EXECUTE);
        }
        if let Some(catcher) = self.store.get_uncertain(execute, sym::CATCH) {
            self.store
                .link(Triple::new(self.frame, sym::CATCH, catcher));
        }

        if !procedures::execute_predefined(self, procedure)? {
            let body = self.store.get_guaranteed(procedure, sym::EXECUTE)?;
            self.store
                .link(Triple::new(self.frame, sym::EXECUTE, body));
        }
        Ok(())
    }

    /// Turn a failure into an exception frame and hand it to the Exception
    /// procedure.
    pub(crate) fn raise(&mut self, error: &Error) {
        debug_assert!(self.task != sym::VOID && self.frame != sym::VOID);
        trace!(%error, "raising exception");
        let parent_frame = self.frame;
        let mut pairs = Vec::new();
        if let Error::Parse {
            message,
            row,
            column,
        } = error
        {
            let message = self.store.create_text(message);
            let row = self.store.create_natural(*row);
            let column = self.store.create_natural(*column);
            pairs.push((sym::MESSAGE, message));
            pairs.push((sym::ROW, row));
            pairs.push((sym::COLUMN, column));
        } else {
            let message = self.store.create_text(&error.to_string());
            pairs.push((sym::MESSAGE, message));
        }
        let block = self.store.create_with(&pairs);
        self.block = block;
        let frame = self.store.create_with(&[
            (sym::HOLDS, parent_frame),
            (sym::PARENT, parent_frame),
            (sym::HOLDS, block),
            (sym::BLOCK, block),
            (sym::PROCEDURE, sym::EXCEPTION),
        ]);
        self.set_frame(true, false, frame);
        procedures::run_exception(self);
    }

    /// Whether the task halted with an unhandled exception.
    pub fn uncaught_exception(&self) -> bool {
        debug_assert_ne!(self.task, sym::VOID);
        self.store
            .exists(Triple::new(self.task, sym::STATUS, sym::EXCEPTION))
    }

    /// Whether the task will make progress on the next step.
    pub fn running(&self) -> bool {
        debug_assert_ne!(self.task, sym::VOID);
        self.store
            .exists(Triple::new(self.task, sym::STATUS, sym::RUN))
    }

    /// Run at most `n` steps.
    pub fn execute_finite(&mut self, n: u64) {
        if self.task == sym::VOID {
            return;
        }
        self.set_status(sym::RUN);
        for _ in 0..n {
            if !self.step() {
                break;
            }
        }
    }

    /// Run until the task blocks, finishes or fails.
    pub fn execute_infinite(&mut self) {
        if self.task == sym::VOID {
            return;
        }
        self.set_status(sym::RUN);
        while self.step() {}
    }

    /// Start a fresh task that deserializes `input` (a Text blob) into
    /// `package`; a Void package makes the task block its own package.
    pub fn deserialization_task(&mut self, input: Symbol, package: Symbol) {
        self.clear();
        self.block = self.store.create_with(&[(sym::HOLDS, input)]);
        let package = if package == sym::VOID {
            self.block
        } else {
            package
        };
        let static_params = self.store.create_with(&[
            (sym::PACKAGE, package),
            (sym::INPUT, input),
            (sym::TARGET, self.block),
            (sym::OUTPUT, sym::OUTPUT),
        ]);
        let execute = self.store.create_with(&[
            (sym::PROCEDURE, proc::DESERIALIZE),
            (sym::STATIC, static_params),
        ]);
        self.task = self.store.create_symbol();
        let frame = self.store.create_with(&[
            (sym::HOLDS, static_params),
            (sym::HOLDS, execute),
            (sym::HOLDS, self.block),
            (sym::BLOCK, self.block),
            (sym::EXECUTE, execute),
        ]);
        self.set_frame(false, false, frame);
        self.execute_finite(1);
    }

    /// Chain every top-level Output clause of the last deserialization into
    /// the execute list and run it; false when there is nothing to run.
    pub fn execute_deserialized(&mut self) -> bool {
        let outputs = self
            .store
            .query_collect(QueryMask::MMV, Triple::new(self.block, sym::OUTPUT, 0));
        if outputs.is_empty() {
            return false;
        }
        let mut prev = sym::VOID;
        for output in outputs {
            let next = self.store.create_with(&[(sym::PROCEDURE, output.value)]);
            self.store
                .link(Triple::new(self.task, sym::HOLDS, next));
            if prev == sym::VOID {
                self.store
                    .set_solitary(Triple::new(self.frame, sym::EXECUTE, next));
            } else {
                self.store.link(Triple::new(prev, sym::NEXT, next));
            }
            prev = next;
        }
        self.execute_infinite();
        true
    }

    pub(crate) fn run_deserializer(&mut self) -> Result<()> {
        deserialize::run(self)
    }
}
