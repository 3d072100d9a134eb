//! # symvm RPC server
//!
//! MessagePack framing over a single TCP connection. Each request is an
//! array whose first element is the command name and remainder are
//! positional arguments; each response is exactly one MessagePack value,
//! with the zero-length array as the empty response.
//!
//! The engine is single-threaded and cooperative: connections are served
//! one at a time and every request runs to completion against the one
//! store before the next is read, so the wire surface serialises all
//! callers onto the single logical task.
//!
//! ## Example
//!
//! ```ignore
//! use symvm_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new(ServerConfig::default()).unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod wire;

pub use config::ServerConfig;
pub use error::{Result, ServerError};

use symvm_core::{QueryMask, QueryMode, Store, Triple};
use symvm_task::Task;
use symvm_vocab::sym;
use tokio::io::{BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use wire::{encode_array_header, encode_bin, encode_empty, encode_natural, Reader, Writer};

/// The RPC server owning the store.
pub struct Server {
    config: ServerConfig,
    store: Store,
}

impl Server {
    /// Open (or initialise) the storage directory and build a server.
    pub fn new(config: ServerConfig) -> Result<Server> {
        let store = Store::open(&config.storage)?;
        Ok(Server { config, store })
    }

    /// Accept loop: one connection at a time, storage persisted after each.
    pub async fn run(mut self) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen).await?;
        info!(addr = %self.config.listen, storage = %self.config.storage.display(), "symvm server listening");
        loop {
            let (stream, peer) = listener.accept().await?;
            info!(%peer, "connected");
            match self.serve(stream).await {
                Ok(()) => debug!(%peer, "disconnected"),
                Err(error) => warn!(%peer, %error, "connection ended"),
            }
            self.store.save(&self.config.storage)?;
        }
    }

    async fn serve(&mut self, stream: TcpStream) -> Result<()> {
        let (read_half, write_half) = stream.into_split();
        let mut reader = Reader::new(BufReader::new(read_half));
        let mut writer = Writer::new(BufWriter::new(write_half));
        loop {
            let Some(elements) = reader.read_array_header().await? else {
                return Ok(());
            };
            if elements == 0 {
                return Err(ServerError::Protocol("empty request array".into()));
            }
            let command = reader.read_str().await?;
            let arity = elements - 1;
            debug!(%command, arity, "request");
            self.dispatch(&command, arity, &mut reader, &mut writer)
                .await?;
        }
    }

    async fn dispatch<R, W>(
        &mut self,
        command: &str,
        arity: u64,
        reader: &mut Reader<R>,
        writer: &mut Writer<W>,
    ) -> Result<()>
    where
        R: tokio::io::AsyncRead + Unpin,
        W: tokio::io::AsyncWrite + Unpin,
    {
        let expect = |want: u64| {
            if arity == want {
                Ok(())
            } else {
                Err(ServerError::Protocol(format!(
                    "{command} takes {want} arguments, got {arity}"
                )))
            }
        };
        match command {
            "createSymbol" => {
                expect(0)?;
                let symbol = self.store.create_symbol();
                writer.send(|out| encode_natural(out, symbol)).await
            }
            "releaseSymbol" => {
                expect(1)?;
                let symbol = reader.read_natural().await?;
                self.store.destroy(symbol);
                writer.send(encode_empty).await
            }
            "getBlobSize" => {
                expect(1)?;
                let symbol = reader.read_natural().await?;
                let bits = self.store.blob_size(symbol);
                writer.send(|out| encode_natural(out, bits)).await
            }
            "setBlobSize" => {
                expect(2)?;
                let symbol = reader.read_natural().await?;
                let bits = reader.read_natural().await?;
                self.store.set_blob_size(symbol, bits);
                writer.send(encode_empty).await
            }
            "decreaseBlobSize" => {
                expect(3)?;
                let symbol = reader.read_natural().await?;
                let at = reader.read_natural().await?;
                let len = reader.read_natural().await?;
                self.store.decrease_blob(symbol, at, at + len);
                writer.send(encode_empty).await
            }
            "increaseBlobSize" => {
                expect(3)?;
                let symbol = reader.read_natural().await?;
                let at = reader.read_natural().await?;
                let len = reader.read_natural().await?;
                self.store.increase_blob(symbol, at, len);
                writer.send(encode_empty).await
            }
            "readBlob" => {
                expect(3)?;
                let symbol = reader.read_natural().await?;
                let offset = reader.read_natural().await?;
                let len = reader.read_natural().await?;
                let available = self.store.blob_size(symbol);
                if offset.checked_add(len).map_or(true, |end| end > available) {
                    return Err(ServerError::Protocol(format!(
                        "readBlob past the end: {offset}+{len} > {available}"
                    )));
                }
                let mut buf = vec![0u8; len.div_ceil(8) as usize];
                self.store.read_blob_bits(symbol, &mut buf, offset, len);
                writer.send(|out| encode_bin(out, &buf)).await
            }
            "writeBlob" => {
                expect(4)?;
                let symbol = reader.read_natural().await?;
                let offset = reader.read_natural().await?;
                let len = reader.read_natural().await?;
                let payload = reader.read_bin().await?;
                if payload.len() as u64 != len.div_ceil(8) {
                    return Err(ServerError::Protocol(format!(
                        "writeBlob payload is {} bytes, length says {}",
                        payload.len(),
                        len.div_ceil(8)
                    )));
                }
                let available = self.store.blob_size(symbol);
                if offset.checked_add(len).map_or(true, |end| end > available) {
                    return Err(ServerError::Protocol(format!(
                        "writeBlob past the end: {offset}+{len} > {available}"
                    )));
                }
                self.store.write_blob_bits(symbol, &payload, offset, len);
                writer.send(encode_empty).await
            }
            "deserializeBlob" => {
                expect(2)?;
                let input = reader.read_natural().await?;
                let package = reader.read_natural().await?;
                let outputs = self.deserialize_blob(input, package);
                match outputs.as_deref() {
                    None => writer.send(|out| encode_natural(out, sym::VOID)).await,
                    Some([single]) => {
                        let single = *single;
                        writer.send(|out| encode_natural(out, single)).await
                    }
                    Some(many) => {
                        writer
                            .send(|out| {
                                encode_array_header(out, many.len() as u64);
                                for symbol in many {
                                    encode_natural(out, *symbol);
                                }
                            })
                            .await
                    }
                }
            }
            "query" => {
                expect(5)?;
                let count_only = reader.read_bool().await?;
                let code = reader.read_natural().await?;
                let triple = Triple::new(
                    reader.read_natural().await?,
                    reader.read_natural().await?,
                    reader.read_natural().await?,
                );
                let mask = QueryMask::from_code(code)
                    .ok_or_else(|| ServerError::Protocol(format!("bad query mask {code}")))?;
                let mut results = Vec::new();
                let count = self.store.query(mask, triple, |hit| {
                    if !count_only {
                        for (i, mode) in mask.0.iter().enumerate() {
                            if *mode == QueryMode::Varying {
                                results.push(hit.pos(i));
                            }
                        }
                    }
                });
                if count_only {
                    writer.send(|out| encode_natural(out, count)).await
                } else {
                    writer
                        .send(|out| {
                            encode_array_header(out, results.len() as u64);
                            for symbol in &results {
                                encode_natural(out, *symbol);
                            }
                        })
                        .await
                }
            }
            "link" => {
                expect(3)?;
                let triple = Triple::new(
                    reader.read_natural().await?,
                    reader.read_natural().await?,
                    reader.read_natural().await?,
                );
                self.store.link(triple);
                writer.send(encode_empty).await
            }
            "unlink" => {
                expect(3)?;
                let triple = Triple::new(
                    reader.read_natural().await?,
                    reader.read_natural().await?,
                    reader.read_natural().await?,
                );
                self.store.unlink(triple);
                writer.send(encode_empty).await
            }
            other => Err(ServerError::Protocol(format!("unknown command {other}"))),
        }
    }

    /// Run a deserialization task; None on an uncaught exception, the
    /// collected top-level symbols otherwise.
    fn deserialize_blob(&mut self, input: u64, package: u64) -> Option<Vec<u64>> {
        let mut task = Task::new(&mut self.store);
        task.deserialization_task(input, package);
        if task.uncaught_exception() {
            task.clear();
            return None;
        }
        let outputs: Vec<u64> = task
            .store()
            .query_collect(
                QueryMask::MMV,
                Triple::new(task.current_block(), sym::OUTPUT, sym::VOID),
            )
            .iter()
            .map(|t| t.value)
            .collect();
        task.clear();
        Some(outputs)
    }
}
