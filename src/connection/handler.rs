//! Per-Client Sessions
//!
//! Every accepted socket is served by one [`Connection`] running in its own
//! Tokio task. The task owns both halves of the socket and two buffers:
//!
//! ```text
//!   socket ──read──> inbound ──LineParser──> CommandHandler
//!                                                  │
//!   socket <─write── outbound <──Reply::serialize──┘
//! ```
//!
//! A single read can carry part of a line or many pipelined lines. All
//! complete lines in `inbound` are executed in order, their replies collected
//! in `outbound`, and the whole batch is written and flushed once.
//!
//! The session ends when the client closes its side, sends `quit`, or sends a
//! line longer than [`MAX_LINE_LENGTH`].

use crate::commands::{is_quit, CommandHandler};
use crate::protocol::{LineParser, ParseError, MAX_LINE_LENGTH};
use bytes::{Buf, BytesMut};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

const READ_CHUNK: usize = 4096;

/// Server-wide connection counters, shared by every session.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    accepted: AtomicU64,
    active: AtomicU64,
    commands: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
}

/// A point-in-time copy of [`ConnectionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub accepted: u64,
    pub active: u64,
    pub commands: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session. The returned guard marks it closed on drop.
    fn open(self: &Arc<Self>) -> ActiveGuard {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
        ActiveGuard(Arc::clone(self))
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
        }
    }
}

/// Keeps a session counted as active for as long as it lives.
#[derive(Debug)]
struct ActiveGuard(Arc<ConnectionStats>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Errors that end a session early.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Socket failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The client sent a line over the length limit
    #[error("framing error: {0}")]
    Framing(#[from] ParseError),

    /// The client closed the socket in the middle of a line
    #[error("connection closed with {0} bytes of an unterminated line")]
    TruncatedLine(usize),
}

impl ConnectionError {
    /// Whether the error is just the peer going away.
    fn is_disconnect(&self) -> bool {
        matches!(
            self,
            ConnectionError::Io(e) if matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe
            )
        )
    }
}

/// How a batch of commands left the session.
enum Flow {
    Continue,
    Quit,
}

/// One client session.
pub struct Connection {
    peer: SocketAddr,
    reader: OwnedReadHalf,
    writer: BufWriter<OwnedWriteHalf>,
    inbound: BytesMut,
    outbound: BytesMut,
    parser: LineParser,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
    _active: ActiveGuard,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        commands: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        let (reader, writer) = stream.into_split();
        let active = stats.open();

        Self {
            peer,
            reader,
            writer: BufWriter::new(writer),
            inbound: BytesMut::with_capacity(READ_CHUNK),
            outbound: BytesMut::with_capacity(READ_CHUNK),
            parser: LineParser::new(),
            commands,
            stats,
            _active: active,
        }
    }

    /// Serves the client until it disconnects, quits, or misbehaves.
    pub async fn serve(mut self) -> Result<(), ConnectionError> {
        loop {
            if !self.fill().await? {
                return Ok(());
            }

            let flow = self.execute_pending()?;
            self.write_outbound().await?;

            if let Flow::Quit = flow {
                debug!(client = %self.peer, "Client sent quit");
                return Ok(());
            }
        }
    }

    /// Reads more bytes into `inbound`.
    ///
    /// Returns `false` on a clean close (nothing but whitespace pending).
    async fn fill(&mut self) -> Result<bool, ConnectionError> {
        self.inbound.reserve(READ_CHUNK);
        let n = self.reader.read_buf(&mut self.inbound).await?;

        if n == 0 {
            if self.inbound.iter().all(u8::is_ascii_whitespace) {
                return Ok(false);
            }
            return Err(ConnectionError::TruncatedLine(self.inbound.len()));
        }

        self.stats.bytes_in.fetch_add(n as u64, Ordering::Relaxed);
        trace!(client = %self.peer, bytes = n, buffered = self.inbound.len(), "Read data");
        Ok(true)
    }

    /// Runs every complete line in `inbound`, queueing the replies.
    fn execute_pending(&mut self) -> Result<Flow, ConnectionError> {
        while let Some((tokens, consumed)) = self.parser.parse(&self.inbound)? {
            self.inbound.advance(consumed);
            if tokens.is_empty() {
                continue;
            }

            let reply = self.commands.execute(&tokens);
            reply.serialize_into(&mut self.outbound);
            self.stats.commands.fetch_add(1, Ordering::Relaxed);

            if is_quit(&tokens) {
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    async fn write_outbound(&mut self) -> Result<(), ConnectionError> {
        if self.outbound.is_empty() {
            return Ok(());
        }

        let out = self.outbound.split();
        self.stats
            .bytes_out
            .fetch_add(out.len() as u64, Ordering::Relaxed);

        self.writer.write_all(&out).await?;
        self.writer.flush().await?;
        trace!(client = %self.peer, bytes = out.len(), "Sent replies");
        Ok(())
    }
}

/// Serves one accepted client to completion and logs how it ended.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    info!(client = %peer, "Client connected");

    match Connection::new(stream, peer, commands, stats).serve().await {
        Ok(()) => info!(client = %peer, "Client disconnected"),
        Err(e) if e.is_disconnect() => debug!(client = %peer, error = %e, "Client went away"),
        Err(e @ ConnectionError::Framing(_)) => {
            warn!(client = %peer, error = %e, max = MAX_LINE_LENGTH, "Closing connection")
        }
        Err(e) => warn!(client = %peer, error = %e, "Connection error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageEngine;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::time::{sleep, timeout, Duration};

    struct TestServer {
        addr: SocketAddr,
        storage: Arc<StorageEngine>,
        stats: Arc<ConnectionStats>,
    }

    impl TestServer {
        async fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let storage = Arc::new(StorageEngine::new());
            let stats = Arc::new(ConnectionStats::new());

            let (engine, counters) = (Arc::clone(&storage), Arc::clone(&stats));
            tokio::spawn(async move {
                while let Ok((stream, peer)) = listener.accept().await {
                    let commands = CommandHandler::new(Arc::clone(&engine));
                    tokio::spawn(handle_connection(stream, peer, commands, Arc::clone(&counters)));
                }
            });

            Self {
                addr,
                storage,
                stats,
            }
        }

        async fn client(&self) -> Client {
            Client(BufReader::new(TcpStream::connect(self.addr).await.unwrap()))
        }
    }

    struct Client(BufReader<TcpStream>);

    impl Client {
        async fn send(&mut self, data: &[u8]) {
            self.0.get_mut().write_all(data).await.unwrap();
        }

        async fn line(&mut self) -> String {
            let mut line = String::new();
            timeout(Duration::from_secs(2), self.0.read_line(&mut line))
                .await
                .unwrap()
                .unwrap();
            line
        }

        /// Waits for the server to close; true if nothing more was sent.
        async fn closed_silently(&mut self) -> bool {
            let mut rest = Vec::new();
            match timeout(Duration::from_secs(2), self.0.read_to_end(&mut rest))
                .await
                .unwrap()
            {
                Ok(_) => rest.is_empty(),
                Err(_) => true,
            }
        }
    }

    #[tokio::test]
    async fn test_ping() {
        let server = TestServer::start().await;
        let mut client = server.client().await;

        client.send(b"ping\n").await;
        assert_eq!(client.line().await, "PONG\n");
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let server = TestServer::start().await;
        let mut client = server.client().await;

        client.send(b"set name Ariz\r\n").await;
        assert_eq!(client.line().await, "OK\n");

        client.send(b"get name\n").await;
        assert_eq!(client.line().await, "Ariz\n");

        client.send(b"incr counter\n").await;
        assert_eq!(client.line().await, "ERR no such key\n");

        assert!(server.storage.exists(b"name"));
    }

    #[tokio::test]
    async fn test_pipelined_and_split_lines() {
        let server = TestServer::start().await;
        let mut client = server.client().await;

        client
            .send(b"set k1 1\npush l a\npush l b\nget l\nincr k")
            .await;
        client.send(b"1 5\nsadd s 3\nget s\n").await;

        for expected in ["OK\n", "(1)\n", "(2)\n", "[a, b]\n", "6 (integer)\n", "(1)\n", "[3]\n", "(1)\n"] {
            assert_eq!(client.line().await, expected);
        }
    }

    #[tokio::test]
    async fn test_blank_lines_do_not_accumulate() {
        let server = TestServer::start().await;
        let mut client = server.client().await;

        let blanks = b"\r\n".repeat(MAX_LINE_LENGTH);
        for chunk in blanks.chunks(8192) {
            client.send(chunk).await;
        }
        client.send(b"ping\n").await;

        assert_eq!(client.line().await, "PONG\n");
        let totals = server.stats.snapshot();
        assert_eq!(totals.commands, 1);
        assert_eq!(totals.active, 1);
    }

    #[tokio::test]
    async fn test_quit_stops_processing() {
        let server = TestServer::start().await;
        let mut client = server.client().await;

        client.send(b"quit\nset late 1\n").await;
        assert_eq!(client.line().await, "OK\n");
        assert!(client.closed_silently().await);
        assert!(!server.storage.exists(b"late"));
    }

    #[tokio::test]
    async fn test_overlong_line_closes_connection() {
        let server = TestServer::start().await;
        let mut client = server.client().await;

        let mut line = b"set key ".to_vec();
        line.resize(MAX_LINE_LENGTH + 16, b'x');
        // the server may reset the socket before the write completes
        let _ = client.0.get_mut().write_all(&line).await;

        assert!(client.closed_silently().await);
        assert!(!server.storage.exists(b"key"));
    }

    #[tokio::test]
    async fn test_stats_track_sessions() {
        let server = TestServer::start().await;
        assert_eq!(server.stats.snapshot(), ConnectionSnapshot::default());

        let mut client = server.client().await;
        client.send(b"ping\nping\n").await;
        client.line().await;
        client.line().await;

        let during = server.stats.snapshot();
        assert_eq!(during.accepted, 1);
        assert_eq!(during.active, 1);
        assert_eq!(during.commands, 2);
        assert_eq!(during.bytes_in, 10);
        assert_eq!(during.bytes_out, 10);

        drop(client);
        sleep(Duration::from_millis(100)).await;

        let after = server.stats.snapshot();
        assert_eq!(after.active, 0);
        assert_eq!(after.accepted, 1);
    }
}
