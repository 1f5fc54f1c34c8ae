use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use totem_server::ServerConfig;

/// A running Totem server bound to an ephemeral `127.0.0.1` port, mirroring
/// the shape of a `TestServer` harness: spin up a real listener, drive it
/// over real sockets, tear it down by dropping the handle.
pub struct TestServer {
    pub addr: SocketAddr,
    cancel: CancellationToken,
    _task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_config(ServerConfig::default()).await
    }

    pub async fn with_config(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(totem_server::serve(listener, Arc::new(config), task_cancel));

        // Give the accept loop a moment to start selecting on the listener.
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self { addr, cancel, _task: task }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A line-oriented test client over a raw `TcpStream`.
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self { reader: BufReader::new(read_half), writer }
    }

    pub async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    /// Reads one `\n`-terminated line, with the terminator stripped.
    pub async fn recv_line(&mut self) -> String {
        self.recv_line_timeout(Duration::from_secs(2)).await.expect("expected a line before timeout")
    }

    pub async fn recv_line_timeout(&mut self, timeout: Duration) -> Option<String> {
        let mut buf = String::new();
        match tokio::time::timeout(timeout, self.reader.read_line(&mut buf)).await {
            Ok(Ok(0)) => None,
            Ok(Ok(_)) => Some(buf.trim_end_matches(['\n', '\r']).to_string()),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Reads lines until a blank line. Every multi-line reply the server
    /// sends (room listings, room descriptions, state snapshots) is built as
    /// one string already ending in `\n`; the writer task appends one more
    /// `\n` on top, so the wire always shows a trailing blank line marking
    /// the end of such a block. Returns the joined non-blank lines.
    pub async fn recv_block(&mut self) -> String {
        let mut lines = Vec::new();
        loop {
            let line = self.recv_line().await;
            if line.is_empty() {
                break;
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    /// Alias for `recv_block`, used where the block happens to be a game
    /// state snapshot (`Turn N` / `Current player: ...` / per-seat lines).
    pub async fn recv_snapshot(&mut self) -> String {
        self.recv_block().await
    }

    /// Convenience helper: drains the greeting and sets a nickname.
    pub async fn join_as(addr: SocketAddr, nick: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.recv_line().await; // "Welcome to Totem."
        client.recv_line().await; // nickname prompt
        client.send(nick).await;
        let reply = client.recv_line().await;
        assert!(reply.starts_with("Welcome,"), "unexpected nickname reply: {reply}");
        client
    }
}
