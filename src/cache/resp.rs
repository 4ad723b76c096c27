//! Minimal client-side codec for the cache's RESP text protocol.
//!
//! Commands are encoded as arrays of bulk strings; replies are parsed into
//! [`RespValue`]. Only the reply shapes the cache commands can produce are
//! supported.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use super::store::CacheError;

/// A single parsed protocol reply.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// `+OK\r\n` style simple string.
    Simple(String),
    /// `-ERR ...\r\n` error line.
    Error(String),
    /// `:42\r\n` integer.
    Integer(i64),
    /// `$n\r\n...\r\n` bulk string; `None` for the null bulk (`$-1`).
    Bulk(Option<String>),
    /// `*n\r\n...` array of replies.
    Array(Vec<RespValue>),
}

/// Encode a command as a RESP array of bulk strings.
pub fn encode_command(parts: &[&str]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", parts.len()).into_bytes();
    for part in parts {
        out.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
        out.extend_from_slice(part.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Read one reply from the stream.
///
/// Generic over the reader so the parser is testable against byte buffers.
pub async fn read_value<R>(reader: &mut R) -> Result<RespValue, CacheError>
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(CacheError::Protocol("connection closed mid-reply".into()));
    }
    let line = line
        .strip_suffix("\r\n")
        .or_else(|| line.strip_suffix('\n'))
        .unwrap_or(&line);
    if line.is_empty() {
        return Err(CacheError::Protocol("empty reply line".into()));
    }

    let (marker, rest) = line.split_at(1);
    match marker {
        "+" => Ok(RespValue::Simple(rest.to_string())),
        "-" => Ok(RespValue::Error(rest.to_string())),
        ":" => rest
            .parse::<i64>()
            .map(RespValue::Integer)
            .map_err(|_| CacheError::Protocol(format!("bad integer reply: {rest}"))),
        "$" => {
            let len = rest
                .parse::<i64>()
                .map_err(|_| CacheError::Protocol(format!("bad bulk length: {rest}")))?;
            if len < 0 {
                return Ok(RespValue::Bulk(None));
            }
            let mut buf = vec![0u8; len as usize + 2];
            reader.read_exact(&mut buf).await?;
            buf.truncate(len as usize);
            let value = String::from_utf8(buf)
                .map_err(|_| CacheError::Protocol("bulk string is not utf-8".into()))?;
            Ok(RespValue::Bulk(Some(value)))
        }
        "*" => {
            let count = rest
                .parse::<i64>()
                .map_err(|_| CacheError::Protocol(format!("bad array length: {rest}")))?;
            if count < 0 {
                return Ok(RespValue::Array(Vec::new()));
            }
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(Box::pin(read_value(reader)).await?);
            }
            Ok(RespValue::Array(items))
        }
        _ => Err(CacheError::Protocol(format!("unknown reply marker: {line}"))),
    }
}

/// One TCP connection speaking the protocol.
pub struct RespConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl RespConnection {
    /// Connect to `addr` (`host:port`).
    pub async fn connect(addr: &str) -> Result<Self, CacheError> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    /// Send a command and read its single reply.
    pub async fn command(&mut self, parts: &[&str]) -> Result<RespValue, CacheError> {
        self.writer.write_all(&encode_command(parts)).await?;
        self.writer.flush().await?;
        match read_value(&mut self.reader).await? {
            RespValue::Error(message) => Err(CacheError::Server(message)),
            value => Ok(value),
        }
    }
}
