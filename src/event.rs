//! Event listener for daemon-raised events
//!
//! The listener owns the session's event-channel transport. [`listen`]
//! registers a set of event names with the daemon and then reads the
//! transport continuously, queueing every received event; [`next_event`]
//! pops them in wire order.
//!
//! Registration is transactional: if any name is rejected by the daemon,
//! every name registered before it is unregistered again before the error
//! is returned, so no partial subscription state remains.
//!
//! The queue is bounded. When consumers fall behind, the read loop waits
//! for queue capacity instead of buffering without limit, which pushes
//! backpressure onto the socket.
//!
//! [`listen`]: EventListener::listen
//! [`next_event`]: EventListener::next_event

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::error::{Result, ViciError};
use crate::message::Message;
use crate::packet::{Packet, PacketType};
use crate::transport::{Transport, TransportError};

/// An asynchronous event delivered by the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Name the event was raised under
    pub name: String,
    /// Event payload
    pub message: Message,
}

/// Long-lived reader of the event transport
#[derive(Debug)]
pub(crate) struct EventListener {
    transport: Mutex<Transport>,
    queue_tx: Mutex<Option<mpsc::Sender<Event>>>,
    queue_rx: Mutex<mpsc::Receiver<Event>>,
}

impl EventListener {
    pub(crate) fn new(transport: Transport, queue_capacity: usize) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(queue_capacity);
        Self {
            transport: Mutex::new(transport),
            queue_tx: Mutex::new(Some(queue_tx)),
            queue_rx: Mutex::new(queue_rx),
        }
    }

    /// Register `names` and read events until the session is closed or the
    /// transport fails
    ///
    /// Returns only on failure or close; the returned error tells which.
    /// Overlapping calls are serialized on the event transport, but callers
    /// are expected not to overlap them.
    pub(crate) async fn listen(&self, names: &[&str]) -> Result<()> {
        let mut transport = self.transport.lock().await;
        let Some(queue_tx) = self.queue_tx.lock().await.clone() else {
            return Err(TransportError::Closed.into());
        };

        register(&mut transport, names, &queue_tx).await?;
        debug!(?names, "listening for events");

        let result = read_loop(&mut transport, &queue_tx).await;

        // terminal state: close the queue so consumers drain what is
        // buffered and then observe Closed
        self.queue_tx.lock().await.take();
        result
    }

    /// Remove and return the oldest queued event
    ///
    /// Blocks until an event is available. Once the listener has terminated
    /// and the queue is drained, fails with `Closed`.
    pub(crate) async fn next_event(&self) -> Result<Event> {
        let mut queue_rx = self.queue_rx.lock().await;
        queue_rx
            .recv()
            .await
            .ok_or_else(|| TransportError::Closed.into())
    }

    /// Close the queue without waiting for the read loop
    pub(crate) async fn shutdown(&self) {
        self.queue_tx.lock().await.take();
    }
}

/// Register each name in turn, rolling back on the first failure
async fn register(
    transport: &mut Transport,
    names: &[&str],
    queue_tx: &mpsc::Sender<Event>,
) -> Result<()> {
    let mut registered: Vec<&str> = Vec::with_capacity(names.len());
    for &name in names {
        let outcome = async {
            transport.send(&Packet::event_register(name)).await?;
            await_confirm(transport, name, queue_tx).await
        }
        .await;

        match outcome {
            Ok(()) => registered.push(name),
            Err(err) => {
                rollback(transport, &registered, queue_tx).await;
                return Err(err);
            }
        }
    }
    Ok(())
}

async fn rollback(transport: &mut Transport, registered: &[&str], queue_tx: &mpsc::Sender<Event>) {
    for &name in registered.iter().rev() {
        let outcome = async {
            transport.send(&Packet::event_unregister(name)).await?;
            await_confirm(transport, name, queue_tx).await
        }
        .await;

        if let Err(err) = outcome {
            warn!(name, error = %err, "failed to roll back event registration");
            return;
        }
    }
}

/// Wait for the daemon's answer to an (un-)registration request
///
/// Events already subscribed may be raised at any moment, including while
/// a registration is in flight; they are forwarded to the queue rather
/// than dropped.
async fn await_confirm(
    transport: &mut Transport,
    name: &str,
    queue_tx: &mpsc::Sender<Event>,
) -> Result<()> {
    loop {
        let packet = transport.recv().await?;
        match packet.packet_type() {
            PacketType::EventConfirm => return Ok(()),
            PacketType::EventUnknown => return Err(ViciError::UnknownEvent(name.to_string())),
            PacketType::Event => forward(packet, queue_tx).await?,
            other => return Err(ViciError::Unexpected(other)),
        }
    }
}

async fn read_loop(transport: &mut Transport, queue_tx: &mpsc::Sender<Event>) -> Result<()> {
    loop {
        let packet = transport.recv().await?;
        match packet.packet_type() {
            PacketType::Event => forward(packet, queue_tx).await?,
            other => return Err(ViciError::Unexpected(other)),
        }
    }
}

async fn forward(packet: Packet, queue_tx: &mpsc::Sender<Event>) -> Result<()> {
    let (_, name, message) = packet.into_parts();
    let event = Event {
        name: name.unwrap_or_default(),
        message: message.unwrap_or_default(),
    };
    // a send failure means the receiver is gone with the session
    queue_tx
        .send(event)
        .await
        .map_err(|_| TransportError::Closed.into())
}
