//! Client session: two transports, one daemon
//!
//! A [`Session`] holds two connections to the daemon. Only one command can
//! be active on a connection at a time, but registered events may be
//! raised at any moment, even while a command request is in flight. The
//! command transport is therefore guarded by a mutex and used strictly
//! request/response (plus the in-flight events of a streamed request),
//! while the second transport is owned by the event listener and read
//! continuously.
//!
//! ```text
//!           +----------------------- Session ------------------------+
//!           |                                                        |
//! caller -->| command_request ---> Mutex<Transport> ---+             |
//!           | streamed_command_request                 |             |
//!           |                                          v             |
//!           | listen/next_event --> EventListener --> UnixStream x2 -+--> charon
//!           +--------------------------------------------------------+
//! ```
//!
//! Closing the session broadcasts a shutdown signal that wakes every
//! pending operation on either transport with `Closed`.

use std::path::{Path, PathBuf};

use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::error::{Result, ViciError};
use crate::event::{Event, EventListener};
use crate::message::Message;
use crate::packet::{Packet, PacketType};
use crate::transport::{Connect, Transport, TransportError, UnixConnector};

/// Default socket path of the daemon's VICI endpoint
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/charon.vici";

/// Default capacity of the event queue
const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 64;

/// Default maximum length of an inbound packet
///
/// Matches the segment limit the daemon itself applies to VICI messages.
const DEFAULT_MAX_PACKET_SIZE: usize = 512 * 1024;

/// Configuration for establishing a session
///
/// # Example
///
/// ```
/// use vici::SessionConfig;
///
/// let config = SessionConfig::new()
///     .with_socket_path("/run/custom/charon.vici")
///     .with_event_queue_capacity(128);
/// assert_eq!(config.event_queue_capacity, 128);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Filesystem path of the daemon's VICI socket
    pub socket_path: PathBuf,

    /// Capacity of the bounded event queue feeding [`Session::next_event`]
    pub event_queue_capacity: usize,

    /// Maximum accepted length of an inbound packet
    pub max_packet_size: usize,
}

impl SessionConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the daemon socket path
    #[must_use]
    pub fn with_socket_path(mut self, path: impl AsRef<Path>) -> Self {
        self.socket_path = path.as_ref().to_path_buf();
        self
    }

    /// Set the event queue capacity
    #[must_use]
    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    /// Set the maximum accepted inbound packet length
    #[must_use]
    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

/// The ordered result of a streamed command request
///
/// Holds every stream event raised for the request in wire order, with the
/// final response as the last message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageStream {
    messages: Vec<Message>,
}

impl MessageStream {
    pub(crate) fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// The received messages, final response last
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Consume the stream into its messages
    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Number of received messages, final response included
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the stream holds no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl IntoIterator for MessageStream {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

/// A vici client session
///
/// # Example
///
/// ```no_run
/// use vici::{Message, Session};
///
/// # async fn example() -> vici::Result<()> {
/// let session = Session::connect("/var/run/charon.vici").await?;
///
/// let reply = session.command_request("version", Message::new()).await?;
/// println!("daemon: {:?}", reply.value_str("daemon"));
///
/// let sas = session
///     .streamed_command_request("list-sas", "list-sa", Message::new())
///     .await?;
/// for sa in sas.messages() {
///     println!("{sa:?}");
/// }
///
/// session.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Session {
    /// Command transport; the lock linearizes command requests
    ctr: Mutex<Transport>,

    /// Owns the event transport and queue
    listener: EventListener,

    /// Shutdown signal for both transports
    shutdown_tx: broadcast::Sender<()>,
}

impl Session {
    /// Connect to the daemon's VICI socket at `path`
    ///
    /// # Errors
    ///
    /// Returns a transport error when either connection cannot be
    /// established.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_connector(&UnixConnector::new(path), SessionConfig::default()).await
    }

    /// Connect using the socket path and limits in `config`
    ///
    /// # Errors
    ///
    /// Returns a transport error when either connection cannot be
    /// established.
    pub async fn with_config(config: SessionConfig) -> Result<Self> {
        let connector = UnixConnector::new(&config.socket_path);
        Self::with_connector(&connector, config).await
    }

    /// Connect through a caller-supplied [`Connect`] implementation
    ///
    /// The connector is called twice, once per channel, so deployments
    /// control how the daemon endpoint is reached.
    ///
    /// # Errors
    ///
    /// Returns a transport error when either connection cannot be
    /// established.
    pub async fn with_connector<C>(connector: &C, config: SessionConfig) -> Result<Self>
    where
        C: Connect + ?Sized,
    {
        let (shutdown_tx, _) = broadcast::channel(1);

        let command = connector.connect().await.map_err(TransportError::Io)?;
        let event = connector.connect().await.map_err(TransportError::Io)?;
        debug!("vici session connected");

        let ctr = Transport::new(command, shutdown_tx.subscribe(), config.max_packet_size);
        let elt = Transport::new(event, shutdown_tx.subscribe(), config.max_packet_size);

        Ok(Self {
            ctr: Mutex::new(ctr),
            listener: EventListener::new(elt, config.event_queue_capacity),
            shutdown_tx,
        })
    }

    /// Send a command request and return the daemon's reply
    ///
    /// Whether the command itself succeeded is reported inside the reply;
    /// use [`Message::check_success`] to turn a failed reply into an
    /// error.
    ///
    /// # Errors
    ///
    /// Fails with [`ViciError::UnknownCommand`] when the daemon does not
    /// know `cmd` (the session remains usable), and with a transport error
    /// when the session is closed or the connection is lost.
    pub async fn command_request(&self, cmd: &str, msg: Message) -> Result<Message> {
        let mut transport = self.ctr.lock().await;
        transport.send(&Packet::cmd_request(cmd, msg)).await?;

        let reply = transport.recv().await?;
        match reply.packet_type() {
            PacketType::CmdResponse => Ok(reply.into_message().unwrap_or_default()),
            PacketType::CmdUnknown => Err(ViciError::UnknownCommand(cmd.to_string())),
            other => Err(ViciError::Unexpected(other)),
        }
    }

    /// Send a streamed command request and collect its event stream
    ///
    /// Registers `event` on the command channel for the duration of the
    /// request; the daemon raises zero or more events of that type before
    /// the final response. The returned stream holds the events in wire
    /// order with the response appended last.
    ///
    /// Events of general subscriptions keep flowing to
    /// [`next_event`](Self::next_event) on the event channel throughout.
    ///
    /// # Errors
    ///
    /// Fails with [`ViciError::UnknownEvent`] when the daemon does not
    /// support `event`, [`ViciError::UnknownCommand`] when it does not know
    /// `cmd`, and with a transport error when the connection is lost.
    pub async fn streamed_command_request(
        &self,
        cmd: &str,
        event: &str,
        msg: Message,
    ) -> Result<MessageStream> {
        let mut transport = self.ctr.lock().await;

        transport.send(&Packet::event_register(event)).await?;
        let confirm = transport.recv().await?;
        match confirm.packet_type() {
            PacketType::EventConfirm => {}
            PacketType::EventUnknown => return Err(ViciError::UnknownEvent(event.to_string())),
            other => return Err(ViciError::Unexpected(other)),
        }

        let streamed = run_streamed(&mut transport, cmd, event, msg).await;
        // leave the command channel subscription-free even when the
        // request itself failed
        let unregistered = unregister_stream(&mut transport, event).await;

        let messages = streamed?;
        unregistered?;
        Ok(MessageStream::new(messages))
    }

    /// Register the session to listen for all `names` and run the event
    /// read loop
    ///
    /// Does not return until the session is closed or the event transport
    /// fails; events are consumed through [`next_event`](Self::next_event).
    /// Must not be called again before a previous call has returned.
    ///
    /// # Errors
    ///
    /// Fails with [`ViciError::UnknownEvent`] when the daemon rejects one
    /// of the names (previously registered names are rolled back), and
    /// with a transport error when the loop ends.
    pub async fn listen(&self, names: &[&str]) -> Result<()> {
        self.listener.listen(names).await
    }

    /// Return the next event received by the event listener
    ///
    /// Blocks until an event is available. Once the listener has
    /// terminated and the queue is drained, fails with `Closed`.
    ///
    /// # Errors
    ///
    /// Fails with a `Closed` transport error when the event queue has been
    /// closed and drained.
    pub async fn next_event(&self) -> Result<Event> {
        self.listener.next_event().await
    }

    /// Close the session
    ///
    /// Both transports are closed; pending and subsequent operations
    /// observe `Closed`. Closing is idempotent, and dropping the session
    /// closes it as well.
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(());
        self.listener.shutdown().await;
        debug!("vici session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Issue the command and accumulate its stream off the command transport
async fn run_streamed(
    transport: &mut Transport,
    cmd: &str,
    event: &str,
    msg: Message,
) -> Result<Vec<Message>> {
    transport.send(&Packet::cmd_request(cmd, msg)).await?;

    let mut messages = Vec::new();
    loop {
        let packet = transport.recv().await?;
        let (ptype, name, payload) = packet.into_parts();
        match ptype {
            PacketType::Event if name.as_deref() == Some(event) => {
                messages.push(payload.unwrap_or_default());
            }
            PacketType::CmdResponse => {
                messages.push(payload.unwrap_or_default());
                return Ok(messages);
            }
            PacketType::CmdUnknown => return Err(ViciError::UnknownCommand(cmd.to_string())),
            other => return Err(ViciError::Unexpected(other)),
        }
    }
}

/// Drop the stream subscription once the request has completed
async fn unregister_stream(transport: &mut Transport, event: &str) -> Result<()> {
    transport.send(&Packet::event_unregister(event)).await?;
    loop {
        let packet = transport.recv().await?;
        match packet.packet_type() {
            PacketType::EventConfirm => return Ok(()),
            // stragglers raised before the unregistration took effect
            PacketType::Event => {}
            PacketType::EventUnknown => return Err(ViciError::UnknownEvent(event.to_string())),
            other => return Err(ViciError::Unexpected(other)),
        }
    }
}
