//! Event listening scenarios against the mock daemon

use std::sync::Arc;

use vici::{Message, Packet, PacketType, Session, ViciError};

use super::daemon::MockDaemon;

fn log_entry(seq: usize) -> Message {
    let mut msg = Message::new();
    msg.set("group", "IKE");
    msg.set("msg", format!("entry {seq}"));
    msg
}

#[tokio::test]
async fn test_events_are_delivered_in_wire_order() {
    const EVENTS: usize = 32;

    let dir = tempfile::tempdir().unwrap();
    let daemon = MockDaemon::bind(dir.path());
    let path = daemon.path().to_path_buf();

    let script = tokio::spawn(async move {
        let (cmd, mut evt) = daemon.accept_session().await;

        let register = evt.recv().await;
        assert_eq!(register.packet_type(), PacketType::EventRegister);
        assert_eq!(register.name(), Some("log"));
        evt.send(&Packet::event_confirm()).await;

        for seq in 0..EVENTS {
            evt.send(&Packet::event("log", log_entry(seq))).await;
        }
        (cmd, evt)
    });

    let session = Arc::new(Session::connect(&path).await.unwrap());

    let reader = Arc::clone(&session);
    let listen = tokio::spawn(async move { reader.listen(&["log"]).await });

    for seq in 0..EVENTS {
        let event = session.next_event().await.unwrap();
        assert_eq!(event.name, "log");
        assert_eq!(
            event.message.value_str("msg"),
            Some(format!("entry {seq}").as_str())
        );
    }

    session.close().await;
    let _ = listen.await.unwrap();
    drop(script.await.unwrap());
}

#[tokio::test]
async fn test_rejected_registration_rolls_back_and_allows_retry() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = MockDaemon::bind(dir.path());
    let path = daemon.path().to_path_buf();

    let script = tokio::spawn(async move {
        let (cmd, mut evt) = daemon.accept_session().await;

        // first attempt: confirm "ike-updown", reject "bogus"
        let register = evt.recv().await;
        assert_eq!(register.name(), Some("ike-updown"));
        evt.send(&Packet::event_confirm()).await;

        let register = evt.recv().await;
        assert_eq!(register.name(), Some("bogus"));
        evt.send(&Packet::event_unknown()).await;

        // the rejected attempt must leave no subscription behind
        let unregister = evt.recv().await;
        assert_eq!(unregister.packet_type(), PacketType::EventUnregister);
        assert_eq!(unregister.name(), Some("ike-updown"));
        evt.send(&Packet::event_confirm()).await;

        // second attempt with a supported set succeeds
        let register = evt.recv().await;
        assert_eq!(register.packet_type(), PacketType::EventRegister);
        assert_eq!(register.name(), Some("ike-updown"));
        evt.send(&Packet::event_confirm()).await;

        evt.send(&Packet::event("ike-updown", log_entry(0))).await;
        (cmd, evt)
    });

    let session = Arc::new(Session::connect(&path).await.unwrap());

    let err = session
        .listen(&["ike-updown", "bogus"])
        .await
        .unwrap_err();
    assert!(matches!(err, ViciError::UnknownEvent(name) if name == "bogus"));

    let reader = Arc::clone(&session);
    let listen = tokio::spawn(async move { reader.listen(&["ike-updown"]).await });

    let event = session.next_event().await.unwrap();
    assert_eq!(event.name, "ike-updown");

    session.close().await;
    let _ = listen.await.unwrap();
    drop(script.await.unwrap());
}

#[tokio::test]
async fn test_daemon_disconnect_closes_event_queue_after_drain() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = MockDaemon::bind(dir.path());
    let path = daemon.path().to_path_buf();

    let script = tokio::spawn(async move {
        let (cmd, mut evt) = daemon.accept_session().await;

        let _ = evt.recv().await;
        evt.send(&Packet::event_confirm()).await;

        evt.send(&Packet::event("log", log_entry(0))).await;
        evt.send(&Packet::event("log", log_entry(1))).await;
        // dropping the channels tears the connection down
        drop(evt);
        cmd
    });

    let session = Arc::new(Session::connect(&path).await.unwrap());

    let reader = Arc::clone(&session);
    let listen = tokio::spawn(async move { reader.listen(&["log"]).await });

    // buffered events drain before the closed queue is observable
    assert_eq!(
        session.next_event().await.unwrap().message.value_str("msg"),
        Some("entry 0")
    );
    assert_eq!(
        session.next_event().await.unwrap().message.value_str("msg"),
        Some("entry 1")
    );

    let err = session.next_event().await.unwrap_err();
    assert!(err.is_closed());

    let err = listen.await.unwrap().unwrap_err();
    assert!(err.is_closed());
    drop(script.await.unwrap());
}
