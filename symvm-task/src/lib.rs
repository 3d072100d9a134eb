//! # symvm task layer
//!
//! The interpreter over the triple store: task and frame state encoded as
//! triples, the predefined procedure set, and the HRL text format.
//!
//! A [`Task`] borrows a [`symvm_core::Store`] for its lifetime and drives
//! the step loop. Program state is itself a sub-triple-graph (Status,
//! Frame, Parent, Block, Execute, Catch), with Holds edges keeping the live
//! parts of it from being scrutinised away.
//!
//! ## Example
//!
//! ```
//! use symvm_core::Store;
//! use symvm_task::Task;
//!
//! let mut store = Store::in_memory();
//! let mut task = Task::new(&mut store);
//! let input = task.create_text_blob("(answer holds 42)");
//! task.deserialization_task(input, symvm_vocab::sym::VOID);
//! assert!(!task.uncaught_exception());
//! ```

pub mod deserialize;
pub mod procedures;
pub mod serialize;
pub mod task;

pub use serialize::serialize;
pub use task::Task;
