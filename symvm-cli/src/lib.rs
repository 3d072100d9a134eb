//! # symvm CLI
//!
//! `symvm [-e] [-h] path...` loads `.sym` files into the store. Directory
//! traversal treats each directory name as a package symbol and links
//! `(childPackage, Holds, parentPackage)`; `-e` additionally executes the
//! top-level Output clauses of every loaded file.
//!
//! Exit codes: 0 ok, 2 deserialize error, 3 nothing to execute under `-e`,
//! 4 execution exception (or `-h`).

pub mod error;
pub mod walk;

pub use error::CliError;
pub use walk::load_from_path;
