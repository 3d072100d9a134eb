use colored::Colorize;
use std::fmt;
use std::path::PathBuf;

/// Exit codes for the CLI.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_DESERIALIZE: i32 = 2;
pub const EXIT_NOTHING_TO_EXECUTE: i32 = 3;
pub const EXIT_EXECUTION: i32 = 4;

/// Unified error type for CLI operations.
pub enum CliError {
    /// Storage directory could not be opened or saved.
    Storage(symvm_core::Error),
    /// A path argument could not be read.
    Input(PathBuf, std::io::Error),
    /// A `.sym` file failed to deserialize.
    Deserialize(PathBuf),
    /// `-e` was given but a file declared no Output clauses.
    NothingToExecute(PathBuf),
    /// Executing a file raised an uncaught exception.
    Execution(PathBuf),
}

impl CliError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Storage(_) | CliError::Input(..) => EXIT_ERROR,
            CliError::Deserialize(_) => EXIT_DESERIALIZE,
            CliError::NothingToExecute(_) => EXIT_NOTHING_TO_EXECUTE,
            CliError::Execution(_) => EXIT_EXECUTION,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = "error:".red().bold();
        match self {
            CliError::Storage(e) => write!(f, "{tag} storage: {e}"),
            CliError::Input(path, e) => write!(f, "{tag} cannot read {}: {e}", path.display()),
            CliError::Deserialize(path) => write!(
                f,
                "{tag} exception occurred while deserializing file {}",
                path.display()
            ),
            CliError::NothingToExecute(path) => {
                write!(f, "{tag} nothing to execute in file {}", path.display())
            }
            CliError::Execution(path) => write!(
                f,
                "{tag} exception occurred while executing file {}",
                path.display()
            ),
        }
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<symvm_core::Error> for CliError {
    fn from(e: symvm_core::Error) -> Self {
        CliError::Storage(e)
    }
}
