//! Per-client connection handling.
//!
//! Each accepted socket gets its own task running a read → parse →
//! execute → respond loop. TCP is a byte stream, so incoming data is
//! accumulated in a `BytesMut` buffer and drained one complete RESP value
//! at a time; a single read may carry half a command or a whole pipeline
//! of them.
//!
//! Commands are strictly serialized per connection: the next value is not
//! parsed until the previous response has been written and flushed.
//!
//! ## Error policy
//!
//! Malformed RESP and malformed command frames are recoverable: the client
//! gets a protocol error line, buffered bytes are dropped to resynchronize,
//! and the loop keeps reading. I/O errors and mid-value EOF terminate the
//! connection. A clean EOF between values is a normal disconnect.

use crate::commands::{Command, CommandHandler};
use crate::protocol::{RespParser, RespValue};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Hard cap on buffered request bytes per connection (64 KB)
const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Initial request buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Error line sent to a client that speaks broken RESP
const PROTOCOL_ERROR_REPLY: &str = "ERR Protocol error: invalid syntax";

/// Server-wide connection counters, shared across handler tasks.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently open connections
    pub active_connections: AtomicU64,
    /// Total commands executed
    pub commands_processed: AtomicU64,
    /// Total bytes read from clients
    pub bytes_read: AtomicU64,
    /// Total bytes written to clients
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn add_bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Clean disconnect between values
    #[error("client disconnected")]
    ClientDisconnected,

    /// The stream closed mid-value
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// The client buffered more than the allowed maximum
    #[error("request buffer limit exceeded")]
    BufferFull,
}

/// State for one client connection.
pub struct ConnectionHandler {
    stream: BufWriter<TcpStream>,
    addr: SocketAddr,
    buffer: BytesMut,
    handler: CommandHandler,
    parser: RespParser,
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();
        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            handler,
            parser: RespParser::new(),
            stats,
        }
    }

    /// Runs the connection to completion.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) | Err(ConnectionError::ClientDisconnected) => {
                debug!(client = %self.addr, "client disconnected")
            }
            Err(ConnectionError::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                debug!(client = %self.addr, "connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "connection error"),
        }

        self.stats.connection_closed();
        result
    }

    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            self.drain_buffer().await?;
            self.read_more().await?;
        }
    }

    /// Executes every complete value currently buffered.
    async fn drain_buffer(&mut self) -> Result<(), ConnectionError> {
        loop {
            match self.parser.parse(&self.buffer) {
                Ok(Some((value, consumed))) => {
                    let _ = self.buffer.split_to(consumed);
                    let response = match Command::from_resp(value) {
                        Ok(command) => {
                            trace!(client = %self.addr, command = %command.name, "executing");
                            self.stats.command_processed();
                            self.handler.execute(command)
                        }
                        Err(_) => RespValue::error(PROTOCOL_ERROR_REPLY),
                    };
                    self.send_response(&response).await?;
                }
                Ok(None) => return Ok(()),
                Err(e) => {
                    // recoverable: report, drop buffered bytes to resync,
                    // keep the connection open
                    warn!(client = %self.addr, error = %e, "protocol error");
                    self.buffer.clear();
                    self.send_response(&RespValue::error(PROTOCOL_ERROR_REPLY))
                        .await?;
                    return Ok(());
                }
            }
        }
    }

    async fn read_more(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            warn!(client = %self.addr, size = self.buffer.len(), "request buffer limit exceeded");
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            return if self.buffer.is_empty() {
                Err(ConnectionError::ClientDisconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        self.stats.add_bytes_read(n);
        Ok(())
    }

    async fn send_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.add_bytes_written(bytes.len());
        Ok(())
    }
}

/// Accepts ownership of one client socket and serves it until disconnect.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let connection = ConnectionHandler::new(stream, addr, handler, stats);
    if let Err(e) = connection.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => debug!(client = %addr, error = %e, "connection ended with error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageEngine;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn spawn_test_server() -> (SocketAddr, Arc<StorageEngine>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let storage = Arc::new(StorageEngine::new());
        let stats = Arc::new(ConnectionStats::new());

        let storage_clone = Arc::clone(&storage);
        let stats_clone = Arc::clone(&stats);
        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler = CommandHandler::new(Arc::clone(&storage_clone));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, handler, stats));
            }
        });

        (addr, storage, stats)
    }

    async fn read_reply(client: &mut TcpStream) -> Vec<u8> {
        let mut buf = [0u8; 512];
        let n = client.read(&mut buf).await.unwrap();
        buf[..n].to_vec()
    }

    #[tokio::test]
    async fn ping_pong() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        assert_eq!(read_reply(&mut client).await, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn set_then_get() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n")
            .await
            .unwrap();
        assert_eq!(read_reply(&mut client).await, b"+OK\r\n");

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n")
            .await
            .unwrap();
        assert_eq!(read_reply(&mut client).await, b"$3\r\nbar\r\n");
    }

    #[tokio::test]
    async fn get_missing_key_is_null_bulk() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$4\r\nnope\r\n")
            .await
            .unwrap();
        assert_eq!(read_reply(&mut client).await, b"$-1\r\n");
    }

    #[tokio::test]
    async fn pipelined_commands_are_answered_in_order() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(
                b"*3\r\n$3\r\nSET\r\n$2\r\nk1\r\n$2\r\nv1\r\n\
                  *3\r\n$3\r\nSET\r\n$2\r\nk2\r\n$2\r\nv2\r\n\
                  *2\r\n$3\r\nGET\r\n$2\r\nk1\r\n",
            )
            .await
            .unwrap();

        // 3 replies: +OK, +OK, $2 v1 — 18 bytes total
        let mut collected = Vec::new();
        while collected.len() < 18 {
            let chunk = read_reply(&mut client).await;
            assert!(!chunk.is_empty(), "server closed early");
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, b"+OK\r\n+OK\r\n$2\r\nv1\r\n");
    }

    #[tokio::test]
    async fn protocol_error_keeps_connection_open() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        // '@' is not a RESP type prefix
        client.write_all(b"@garbage\r\n").await.unwrap();
        let reply = read_reply(&mut client).await;
        assert_eq!(reply, b"-ERR Protocol error: invalid syntax\r\n");

        // the same connection still serves valid commands
        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        assert_eq!(read_reply(&mut client).await, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn non_array_command_frame_is_a_protocol_error() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"+PING\r\n").await.unwrap();
        let reply = read_reply(&mut client).await;
        assert_eq!(reply, b"-ERR Protocol error: invalid syntax\r\n");

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        assert_eq!(read_reply(&mut client).await, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn split_command_across_reads() {
        let (addr, _, _) = spawn_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*2\r\n$3\r\nGET\r\n$3\r").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client.write_all(b"\nfoo\r\n").await.unwrap();

        assert_eq!(read_reply(&mut client).await, b"$-1\r\n");
    }

    #[tokio::test]
    async fn wrongtype_error_reaches_the_wire() {
        let (addr, storage, _) = spawn_test_server().await;
        storage.hset("h", "f", "v").unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nh\r\n")
            .await
            .unwrap();
        let reply = read_reply(&mut client).await;
        assert!(reply.starts_with(b"-WRONGTYPE"));
    }

    #[tokio::test]
    async fn stats_track_connection_lifecycle() {
        let (addr, _, stats) = spawn_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        let _ = read_reply(&mut client).await;
        assert!(stats.commands_processed.load(Ordering::Relaxed) >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        drop(client);
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
