//! Server configuration

use crate::error::{Result, ServerError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Configuration for the RPC server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the TCP listener binds.
    pub listen: SocketAddr,
    /// Storage directory for the page and blob files.
    pub storage: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen: "[::]:1337".parse().expect("static address"),
            storage: PathBuf::from("./data"),
        }
    }
}

impl ServerConfig {
    /// Load a JSON config file.
    pub fn load(path: &Path) -> Result<ServerConfig> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| ServerError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_the_wire_port() {
        let config = ServerConfig::default();
        assert_eq!(config.listen.port(), 1337);
    }

    #[test]
    fn partial_config_files_fill_in_defaults() {
        let parsed: ServerConfig = serde_json::from_str(r#"{"storage": "/tmp/s"}"#).unwrap();
        assert_eq!(parsed.listen.port(), 1337);
        assert_eq!(parsed.storage, PathBuf::from("/tmp/s"));
    }
}
