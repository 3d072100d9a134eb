//! MessagePack wire subset
//!
//! The protocol needs exactly these shapes: arrays for request framing and
//! multi-valued responses, fixstr command names, positive integers, the
//! two boolean bytes, and bin payloads for blob contents. The empty
//! response is the zero-length array `0x90`. Encoding helpers are pure so
//! they unit-test without sockets; the async reader drives them over a
//! buffered stream.

use crate::error::{Result, ServerError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Append a positive integer in its shortest encoding.
pub fn encode_natural(out: &mut Vec<u8>, value: u64) {
    if value < 0x80 {
        out.push(value as u8);
    } else if value <= 0xFF {
        out.push(0xCC);
        out.push(value as u8);
    } else if value <= 0xFFFF {
        out.push(0xCD);
        out.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value <= 0xFFFF_FFFF {
        out.push(0xCE);
        out.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        out.push(0xCF);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

/// Append an array header.
pub fn encode_array_header(out: &mut Vec<u8>, len: u64) {
    if len <= 0xF {
        out.push(0x90 | len as u8);
    } else if len <= 0xFFFF {
        out.push(0xDC);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(0xDD);
        out.extend_from_slice(&(len as u32).to_be_bytes());
    }
}

/// Append a bin value.
pub fn encode_bin(out: &mut Vec<u8>, bytes: &[u8]) {
    if bytes.len() <= 0xFF {
        out.push(0xC4);
        out.push(bytes.len() as u8);
    } else if bytes.len() <= 0xFFFF {
        out.push(0xC5);
        out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    } else {
        out.push(0xC6);
        out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    }
    out.extend_from_slice(bytes);
}

/// The empty response: a zero-length array.
pub fn encode_empty(out: &mut Vec<u8>) {
    out.push(0x90);
}

/// Buffered MessagePack reader over a socket half.
pub struct Reader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> Reader<R> {
    pub fn new(inner: R) -> Self {
        Reader { inner }
    }

    async fn byte(&mut self) -> Result<u8> {
        Ok(self.inner.read_u8().await?)
    }

    /// Array header; None on a clean end of stream.
    pub async fn read_array_header(&mut self) -> Result<Option<u64>> {
        let mut first = [0u8; 1];
        match self.inner.read(&mut first).await? {
            0 => return Ok(None),
            _ => {}
        }
        let len = match first[0] {
            tag if tag & 0xF0 == 0x90 => (tag & 0x0F) as u64,
            0xDC => self.inner.read_u16().await? as u64,
            0xDD => self.inner.read_u32().await? as u64,
            tag => {
                return Err(ServerError::Protocol(format!(
                    "expected array, got tag 0x{tag:02X}"
                )))
            }
        };
        Ok(Some(len))
    }

    /// A string (fixstr or str8): the command name.
    pub async fn read_str(&mut self) -> Result<String> {
        let tag = self.byte().await?;
        let len = match tag {
            tag if tag & 0xE0 == 0xA0 => (tag & 0x1F) as usize,
            0xD9 => self.byte().await? as usize,
            tag => {
                return Err(ServerError::Protocol(format!(
                    "expected string, got tag 0x{tag:02X}"
                )))
            }
        };
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf).await?;
        String::from_utf8(buf)
            .map_err(|_| ServerError::Protocol("command is not UTF-8".into()))
    }

    /// A positive integer.
    pub async fn read_natural(&mut self) -> Result<u64> {
        let tag = self.byte().await?;
        Ok(match tag {
            tag if tag & 0x80 == 0 => tag as u64,
            0xCC => self.byte().await? as u64,
            0xCD => self.inner.read_u16().await? as u64,
            0xCE => self.inner.read_u32().await? as u64,
            0xCF => self.inner.read_u64().await?,
            tag => {
                return Err(ServerError::Protocol(format!(
                    "expected natural, got tag 0x{tag:02X}"
                )))
            }
        })
    }

    /// A boolean (0xC2/0xC3).
    pub async fn read_bool(&mut self) -> Result<bool> {
        match self.byte().await? {
            0xC2 => Ok(false),
            0xC3 => Ok(true),
            tag => Err(ServerError::Protocol(format!(
                "expected bool, got tag 0x{tag:02X}"
            ))),
        }
    }

    /// A bin payload.
    pub async fn read_bin(&mut self) -> Result<Vec<u8>> {
        let tag = self.byte().await?;
        let len = match tag {
            0xC4 => self.byte().await? as usize,
            0xC5 => self.inner.read_u16().await? as usize,
            0xC6 => self.inner.read_u32().await? as usize,
            tag => {
                return Err(ServerError::Protocol(format!(
                    "expected bin, got tag 0x{tag:02X}"
                )))
            }
        };
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf).await?;
        Ok(buf)
    }
}

/// Writer flushing one encoded response at a time.
pub struct Writer<W> {
    inner: W,
    scratch: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> Writer<W> {
    pub fn new(inner: W) -> Self {
        Writer {
            inner,
            scratch: Vec::new(),
        }
    }

    pub async fn send(&mut self, encode: impl FnOnce(&mut Vec<u8>)) -> Result<()> {
        self.scratch.clear();
        encode(&mut self.scratch);
        self.inner.write_all(&self.scratch).await?;
        self.inner.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_encodings_use_the_shortest_form() {
        let mut out = Vec::new();
        encode_natural(&mut out, 5);
        assert_eq!(out, [0x05]);
        out.clear();
        encode_natural(&mut out, 0xAB);
        assert_eq!(out, [0xCC, 0xAB]);
        out.clear();
        encode_natural(&mut out, 0x1234);
        assert_eq!(out, [0xCD, 0x12, 0x34]);
        out.clear();
        encode_natural(&mut out, 0x1_0000_0000);
        assert_eq!(out, [0xCF, 0, 0, 0, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn array_and_bin_headers() {
        let mut out = Vec::new();
        encode_array_header(&mut out, 3);
        assert_eq!(out, [0x93]);
        out.clear();
        encode_array_header(&mut out, 300);
        assert_eq!(out, [0xDC, 0x01, 0x2C]);
        out.clear();
        encode_bin(&mut out, &[1, 2, 3]);
        assert_eq!(out, [0xC4, 3, 1, 2, 3]);
        out.clear();
        encode_empty(&mut out);
        assert_eq!(out, [0x90]);
    }

    #[tokio::test]
    async fn reader_roundtrips_a_request() {
        let mut bytes = Vec::new();
        bytes.push(0x94); // [cmd, 7, true, bin]
        bytes.push(0xA4);
        bytes.extend_from_slice(b"link");
        encode_natural(&mut bytes, 7);
        bytes.push(0xC3);
        encode_bin(&mut bytes, &[0xAA]);

        let mut reader = Reader::new(&bytes[..]);
        assert_eq!(reader.read_array_header().await.unwrap(), Some(4));
        assert_eq!(reader.read_str().await.unwrap(), "link");
        assert_eq!(reader.read_natural().await.unwrap(), 7);
        assert!(reader.read_bool().await.unwrap());
        assert_eq!(reader.read_bin().await.unwrap(), vec![0xAA]);
        assert_eq!(reader.read_array_header().await.unwrap(), None);
    }
}
