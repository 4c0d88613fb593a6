//! Framed packet transport over a Unix-domain stream socket
//!
//! A transport owns one connection to the daemon and exchanges whole
//! packets. On the wire every packet is framed as
//!
//! ```text
//! +----------------+------+------+
//! | Length (u32 BE)| Type | Body |
//! +----------------+------+------+
//! ```
//!
//! where the length covers the type byte plus body. The transport performs
//! no locking of its own; callers serialize access as needed.
//!
//! Closing is signalled through a session-wide broadcast channel: `send`
//! and `recv` race the shutdown signal, so a close wakes any blocked
//! operation with [`TransportError::Closed`]. Close is idempotent, and a
//! closed transport fails every further operation.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::broadcast;
use tracing::trace;

use crate::packet::{Packet, PacketError};

/// Length of the frame length prefix
const LENGTH_PREFIX_SIZE: usize = 4;

/// Transport-level errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport was closed, locally or by the peer
    #[error("transport is closed")]
    Closed,

    /// The connection ended in the middle of a frame
    #[error("short read: connection closed with {expected} frame bytes outstanding")]
    ShortRead {
        /// Bytes of the frame that never arrived
        expected: usize,
    },

    /// The connection could not take the whole frame
    #[error("short write: frame of {expected} bytes not fully written")]
    ShortWrite {
        /// Total size of the frame being written
        expected: usize,
    },

    /// An inbound frame declared a length over the configured maximum
    #[error("inbound packet of {got} bytes exceeds the maximum of {max}")]
    PacketTooLarge {
        /// Declared frame length
        got: usize,
        /// Configured maximum frame length
        max: usize,
    },

    /// The frame contents could not be encoded or decoded
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    /// I/O error on the socket
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Check whether this error means the session is gone
    ///
    /// Fatal errors leave the connection unusable; packet-level errors are
    /// still fatal to the session per the propagation policy, but callers
    /// may want to distinguish them for diagnostics.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Opens streams to the daemon's VICI endpoint
///
/// A session calls [`connect`](Connect::connect) once per channel, so the
/// concrete endpoint is a deployment concern rather than a protocol one.
#[async_trait]
pub trait Connect: Send + Sync {
    /// Open one stream to the daemon
    ///
    /// # Errors
    ///
    /// Returns the underlying socket error when the endpoint cannot be
    /// reached.
    async fn connect(&self) -> io::Result<UnixStream>;
}

/// Connects to a VICI endpoint at a filesystem path
#[derive(Debug, Clone)]
pub struct UnixConnector {
    path: PathBuf,
}

impl UnixConnector {
    /// Create a connector for the socket at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The endpoint path this connector dials
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Connect for UnixConnector {
    async fn connect(&self) -> io::Result<UnixStream> {
        UnixStream::connect(&self.path).await
    }
}

/// One framed connection to the daemon
#[derive(Debug)]
pub(crate) struct Transport {
    stream: UnixStream,
    shutdown: broadcast::Receiver<()>,
    closed: bool,
    max_packet_size: usize,
}

impl Transport {
    pub(crate) fn new(
        stream: UnixStream,
        shutdown: broadcast::Receiver<()>,
        max_packet_size: usize,
    ) -> Self {
        Self {
            stream,
            shutdown,
            closed: false,
            max_packet_size,
        }
    }

    /// Serialize and write one packet as a single frame
    pub(crate) async fn send(&mut self, packet: &Packet) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let body = packet.encode()?;
        let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + body.len());
        #[allow(clippy::cast_possible_truncation)]
        frame.put_u32(body.len() as u32);
        frame.put_slice(&body);

        tokio::select! {
            result = self.stream.write_all(&frame) => {
                result.map_err(|e| map_write_error(&e, frame.len()).unwrap_or(TransportError::Io(e)))?;
                trace!(packet_type = %packet.packet_type(), len = body.len(), "sent packet");
                Ok(())
            }
            _ = self.shutdown.recv() => {
                self.closed = true;
                Err(TransportError::Closed)
            }
        }
    }

    /// Read one frame and decode it into a packet
    pub(crate) async fn recv(&mut self) -> Result<Packet, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let result = tokio::select! {
            result = read_packet(&mut self.stream, self.max_packet_size) => result,
            _ = self.shutdown.recv() => {
                self.closed = true;
                Err(TransportError::Closed)
            }
        };

        if let Err(TransportError::Closed) = &result {
            self.closed = true;
        }
        result
    }
}

async fn read_packet(
    stream: &mut UnixStream,
    max_packet_size: usize,
) -> Result<Packet, TransportError> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    stream.read_exact(&mut prefix).await.map_err(|e| {
        // a clean EOF between frames means the peer closed the connection
        if e.kind() == io::ErrorKind::UnexpectedEof {
            TransportError::Closed
        } else {
            TransportError::Io(e)
        }
    })?;

    let len = u32::from_be_bytes(prefix) as usize;
    if len == 0 {
        return Err(TransportError::Packet(PacketError::Empty));
    }
    if len > max_packet_size {
        return Err(TransportError::PacketTooLarge {
            got: len,
            max: max_packet_size,
        });
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            TransportError::ShortRead { expected: len }
        } else {
            TransportError::Io(e)
        }
    })?;

    let packet = Packet::decode(&body)?;
    trace!(packet_type = %packet.packet_type(), len, "received packet");
    Ok(packet)
}

fn map_write_error(error: &io::Error, frame_len: usize) -> Option<TransportError> {
    (error.kind() == io::ErrorKind::WriteZero).then_some(TransportError::ShortWrite {
        expected: frame_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    const MAX: usize = 512 * 1024;

    fn pair() -> (Transport, Transport, broadcast::Sender<()>) {
        let (tx, _) = broadcast::channel(1);
        let (a, b) = UnixStream::pair().expect("socketpair");
        (
            Transport::new(a, tx.subscribe(), MAX),
            Transport::new(b, tx.subscribe(), MAX),
            tx,
        )
    }

    #[tokio::test]
    async fn test_send_and_recv_packet() {
        let (mut client, mut server, _tx) = pair();

        let mut msg = Message::new();
        msg.set("key", "value");
        let packet = Packet::cmd_request("version", msg);

        client.send(&packet).await.unwrap();
        let received = server.recv().await.unwrap();
        assert_eq!(received, packet);
    }

    #[tokio::test]
    async fn test_frames_carry_length_prefix() {
        let (tx, _) = broadcast::channel(1);
        let (mut raw, peer) = UnixStream::pair().unwrap();
        let mut sender = Transport::new(peer, tx.subscribe(), MAX);

        let packet = Packet::event_register("ike-updown");
        sender.send(&packet).await.unwrap();

        let mut prefix = [0u8; 4];
        raw.read_exact(&mut prefix).await.unwrap();
        let body_len = u32::from_be_bytes(prefix) as usize;
        let mut body = vec![0u8; body_len];
        raw.read_exact(&mut body).await.unwrap();
        assert_eq!(body, packet.encode().unwrap());
    }

    #[tokio::test]
    async fn test_recv_fails_closed_on_peer_disconnect() {
        let (client, mut server, _tx) = pair();
        drop(client);

        let err = server.recv().await.unwrap_err();
        assert!(err.is_closed());

        // the transport stays closed afterwards
        let err = server.recv().await.unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn test_recv_unblocked_by_shutdown_signal() {
        let (mut client, _server, tx) = pair();

        let recv = tokio::spawn(async move { client.recv().await });
        tokio::task::yield_now().await;
        tx.send(()).unwrap();

        let err = recv.await.unwrap().unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn test_recv_fails_short_read_on_truncated_frame() {
        let (tx, _) = broadcast::channel(1);
        let (mut raw, peer) = UnixStream::pair().unwrap();
        let mut server = Transport::new(peer, tx.subscribe(), MAX);

        // declare 10 body bytes but deliver only 3, then close
        raw.write_all(&[0, 0, 0, 10, 1, 2, 3]).await.unwrap();
        drop(raw);

        let err = server.recv().await.unwrap_err();
        assert!(matches!(err, TransportError::ShortRead { expected: 10 }));
    }

    #[tokio::test]
    async fn test_recv_rejects_oversized_frame() {
        let (tx, _) = broadcast::channel(1);
        let (mut raw, peer) = UnixStream::pair().unwrap();
        let mut server = Transport::new(peer, tx.subscribe(), 16);

        raw.write_all(&[0xFF, 0xFF, 0xFF, 0xFF]).await.unwrap();

        let err = server.recv().await.unwrap_err();
        assert!(matches!(err, TransportError::PacketTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_recv_rejects_zero_length_frame() {
        let (tx, _) = broadcast::channel(1);
        let (mut raw, peer) = UnixStream::pair().unwrap();
        let mut server = Transport::new(peer, tx.subscribe(), MAX);

        raw.write_all(&[0, 0, 0, 0]).await.unwrap();

        let err = server.recv().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Packet(PacketError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_send_fails_closed_after_shutdown() {
        let (mut client, _server, tx) = pair();
        tx.send(()).unwrap();

        // recv consumes the signal and marks the transport closed
        let err = client.recv().await.unwrap_err();
        assert!(err.is_closed());

        let err = client.send(&Packet::event_confirm()).await.unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn test_unix_connector_dials_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vici.sock");
        let listener = tokio::net::UnixListener::bind(&path).unwrap();

        let connector = UnixConnector::new(&path);
        assert_eq!(connector.path(), path.as_path());

        let (connected, accepted) = tokio::join!(connector.connect(), listener.accept());
        connected.unwrap();
        accepted.unwrap();
    }
}
