//! In-process mock daemon
//!
//! Binds a real Unix socket and hands out the daemon's side of a session's
//! two channels so tests can script exact packet exchanges.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing_subscriber::EnvFilter;
use vici::Packet;

/// Install a test subscriber once so failing tests carry the client's
/// trace output; `RUST_LOG` filters it
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A scripted stand-in for the IKE daemon's VICI endpoint
pub struct MockDaemon {
    listener: UnixListener,
    path: PathBuf,
}

impl MockDaemon {
    /// Bind the daemon socket inside `dir`
    pub fn bind(dir: &Path) -> Self {
        init_tracing();
        let path = dir.join("charon.vici");
        let listener = UnixListener::bind(&path).expect("bind mock daemon socket");
        Self { listener, path }
    }

    /// Socket path for the client to connect to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept one session: the command channel connects first, then the
    /// event channel
    pub async fn accept_session(&self) -> (Channel, Channel) {
        let (command, _) = self.listener.accept().await.expect("accept command channel");
        let (event, _) = self.listener.accept().await.expect("accept event channel");
        (Channel::new(command), Channel::new(event))
    }
}

/// The daemon's end of one framed channel
pub struct Channel {
    stream: UnixStream,
}

impl Channel {
    fn new(stream: UnixStream) -> Self {
        Self { stream }
    }

    /// Frame and send one packet
    pub async fn send(&mut self, packet: &Packet) {
        let body = packet.encode().expect("encode packet");
        #[allow(clippy::cast_possible_truncation)]
        let prefix = (body.len() as u32).to_be_bytes();
        let mut frame = Vec::with_capacity(4 + body.len());
        frame.extend_from_slice(&prefix);
        frame.extend_from_slice(&body);
        self.stream.write_all(&frame).await.expect("write frame");
    }

    /// Read and decode one packet
    pub async fn recv(&mut self) -> Packet {
        let mut prefix = [0u8; 4];
        self.stream.read_exact(&mut prefix).await.expect("read length prefix");
        let len = u32::from_be_bytes(prefix) as usize;
        let mut body = vec![0u8; len];
        self.stream.read_exact(&mut body).await.expect("read frame body");
        Packet::decode(&body).expect("decode packet")
    }
}
