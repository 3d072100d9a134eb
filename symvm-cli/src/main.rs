use clap::Parser;
use std::path::PathBuf;
use symvm_cli::error::{EXIT_EXECUTION, EXIT_SUCCESS};
use symvm_cli::load_from_path;
use symvm_core::Store;
use symvm_task::Task;
use symvm_vocab::sym;

/// Load `.sym` files and directory trees into a symvm store.
#[derive(Parser)]
#[command(name = "symvm", version, disable_help_flag = true)]
struct Cli {
    /// Execute the top-level Output clauses of every loaded file
    #[arg(short = 'e')]
    execute: bool,

    /// Print usage and exit
    #[arg(short = 'h', long = "help")]
    help: bool,

    /// Storage directory
    #[arg(long, default_value = "./data")]
    data: PathBuf,

    /// Files and directories to load
    paths: Vec<PathBuf>,
}

fn init_tracing() {
    // Without an installed subscriber, `RUST_LOG=...` has no effect.
    // Default to "off" so output only changes when the user opts in.
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "off".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if cli.help {
        use clap::CommandFactory;
        let _ = Cli::command().print_help();
        std::process::exit(EXIT_EXECUTION);
    }

    let mut store = match Store::open(&cli.data) {
        Ok(store) => store,
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    };

    {
        let mut task = Task::new(&mut store);
        for path in &cli.paths {
            if let Err(error) = load_from_path(&mut task, sym::VOID, cli.execute, path) {
                eprintln!("{error}");
                std::process::exit(error.exit_code());
            }
        }
        task.clear();
    }

    if let Err(error) = store.save(&cli.data) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
    std::process::exit(EXIT_SUCCESS);
}
