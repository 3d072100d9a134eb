use clap::Parser;
use std::path::PathBuf;
use symvm_server::{Server, ServerConfig};

/// MessagePack-over-TCP front end for the symvm engine.
#[derive(Parser)]
#[command(name = "symvm-server", version)]
struct Cli {
    /// Listen address
    #[arg(long)]
    listen: Option<std::net::SocketAddr>,

    /// Storage directory
    #[arg(long)]
    data: Option<PathBuf>,

    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match ServerConfig::load(path) {
            Ok(config) => config,
            Err(error) => {
                eprintln!("error: {error}");
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(data) = cli.data {
        config.storage = data;
    }

    let server = match Server::new(config) {
        Ok(server) => server,
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    };
    if let Err(error) = server.run().await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
