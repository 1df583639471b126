//! Bidirectional byte relay for tunneled connections.
//!
//! # Responsibilities
//! - Copy raw bytes client → backend and backend → client concurrently
//! - Return as soon as the first direction terminates
//! - Release both connections once the session returns
//!
//! # Design Decisions
//! - Fixed 32 KiB buffer per direction, frames are never parsed
//! - The second direction is not awaited: it observes the release signal,
//!   shuts down its writer and drops its halves on its own task
//! - Halves are owned by the copy tasks, so "closing" a connection means
//!   both tasks having dropped their half

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

/// Buffer size for each relay direction (32 KiB).
pub const RELAY_BUFFER_SIZE: usize = 32 * 1024;

/// Direction of a relay loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToBackend,
    BackendToClient,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::ClientToBackend => write!(f, "client->backend"),
            Direction::BackendToClient => write!(f, "backend->client"),
        }
    }
}

/// Per-tunnel relay state: the taken-over client stream and the backend stream.
pub struct TunnelSession<C, B> {
    client: C,
    backend: B,
}

impl<C, B> TunnelSession<C, B>
where
    C: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    B: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(client: C, backend: B) -> Self {
        Self { client, backend }
    }

    /// Relay until either direction ends, returning the one that ended first.
    pub async fn run(self) -> Direction {
        let (client_read, client_write) = tokio::io::split(self.client);
        let (backend_read, backend_write) = tokio::io::split(self.backend);

        // Dropping `release` signals both loops; it lives until this fn returns.
        let (release, released) = watch::channel(());
        let (finished_tx, mut finished_rx) = mpsc::channel(2);

        tokio::spawn(copy_loop(
            client_read,
            backend_write,
            Direction::ClientToBackend,
            released.clone(),
            finished_tx.clone(),
        ));
        tokio::spawn(copy_loop(
            backend_read,
            client_write,
            Direction::BackendToClient,
            released,
            finished_tx,
        ));

        let first = finished_rx
            .recv()
            .await
            .unwrap_or(Direction::ClientToBackend);
        drop(release);
        first
    }
}

async fn copy_loop<R, W>(
    mut reader: R,
    mut writer: W,
    direction: Direction,
    mut released: watch::Receiver<()>,
    finished: mpsc::Sender<Direction>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; RELAY_BUFFER_SIZE];
    let mut copied: u64 = 0;

    loop {
        let read = tokio::select! {
            read = reader.read(&mut buffer) => read,
            _ = released.changed() => break,
        };
        let n = match read {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let written = tokio::select! {
            written = writer.write_all(&buffer[..n]) => written,
            _ = released.changed() => break,
        };
        if written.is_err() {
            break;
        }
        copied += n as u64;
    }

    let _ = writer.shutdown().await;
    tracing::debug!(direction = %direction, bytes = copied, "Relay direction finished");
    let _ = finished.try_send(direction);
}
