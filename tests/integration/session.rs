//! Session scenarios against the mock daemon

use std::sync::Arc;

use vici::{from_message, Message, Packet, PacketType, Session, SessionConfig, ViciError};

use super::daemon::MockDaemon;

fn reply(fields: &[(&str, &str)]) -> Message {
    let mut msg = Message::new();
    for (k, v) in fields {
        msg.set(*k, *v);
    }
    msg
}

#[tokio::test]
async fn test_connect_and_version_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = MockDaemon::bind(dir.path());
    let path = daemon.path().to_path_buf();

    let script = tokio::spawn(async move {
        let (mut cmd, evt) = daemon.accept_session().await;

        let request = cmd.recv().await;
        assert_eq!(request.packet_type(), PacketType::CmdRequest);
        assert_eq!(request.name(), Some("version"));
        assert_eq!(request.message(), Some(&Message::new()));

        cmd.send(&Packet::cmd_response(reply(&[
            ("daemon", "charon"),
            ("version", "6.0.2"),
        ])))
        .await;
        (cmd, evt)
    });

    let session = Session::connect(&path).await.unwrap();
    let response = session
        .command_request("version", Message::new())
        .await
        .unwrap();
    assert_eq!(response.value_str("daemon"), Some("charon"));
    assert_eq!(response.value_str("version"), Some("6.0.2"));

    session.close().await;
    drop(script.await.unwrap());
}

#[tokio::test]
async fn test_reply_unmarshals_into_record() {
    #[derive(serde::Deserialize, Default, Debug, PartialEq, Eq)]
    #[serde(default)]
    struct Version {
        daemon: String,
        version: String,
        machine: String,
    }

    let dir = tempfile::tempdir().unwrap();
    let daemon = MockDaemon::bind(dir.path());

    let config = SessionConfig::new().with_socket_path(daemon.path());
    let script = tokio::spawn(async move {
        let (mut cmd, evt) = daemon.accept_session().await;
        let _ = cmd.recv().await;
        cmd.send(&Packet::cmd_response(reply(&[
            ("daemon", "charon"),
            ("version", "6.0.2"),
        ])))
        .await;
        (cmd, evt)
    });

    let session = Session::with_config(config).await.unwrap();
    let response = session
        .command_request("version", Message::new())
        .await
        .unwrap();

    let version: Version = from_message(&response).unwrap();
    assert_eq!(version.daemon, "charon");
    assert_eq!(version.version, "6.0.2");
    // absent on the wire, left at its default
    assert_eq!(version.machine, "");

    session.close().await;
    drop(script.await.unwrap());
}

#[tokio::test]
async fn test_failed_command_reply_keeps_session_usable() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = MockDaemon::bind(dir.path());
    let path = daemon.path().to_path_buf();

    let script = tokio::spawn(async move {
        let (mut cmd, evt) = daemon.accept_session().await;

        let _ = cmd.recv().await;
        cmd.send(&Packet::cmd_response(reply(&[
            ("success", "no"),
            ("errmsg", "no such conn"),
        ])))
        .await;

        let _ = cmd.recv().await;
        cmd.send(&Packet::cmd_response(reply(&[("success", "yes")])))
            .await;
        (cmd, evt)
    });

    let session = Session::connect(&path).await.unwrap();

    let response = session
        .command_request("initiate", reply(&[("child", "missing")]))
        .await
        .unwrap();
    let err = response.check_success().unwrap_err();
    assert!(err.to_string().contains("no such conn"));

    let response = session
        .command_request("initiate", reply(&[("child", "present")]))
        .await
        .unwrap();
    assert!(response.check_success().is_ok());

    session.close().await;
    drop(script.await.unwrap());
}

#[tokio::test]
async fn test_unknown_command_then_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = MockDaemon::bind(dir.path());
    let path = daemon.path().to_path_buf();

    let script = tokio::spawn(async move {
        let (mut cmd, evt) = daemon.accept_session().await;

        let request = cmd.recv().await;
        assert_eq!(request.name(), Some("frobnicate"));
        cmd.send(&Packet::cmd_unknown()).await;

        let request = cmd.recv().await;
        assert_eq!(request.name(), Some("version"));
        cmd.send(&Packet::cmd_response(reply(&[("daemon", "charon")])))
            .await;
        (cmd, evt)
    });

    let session = Session::connect(&path).await.unwrap();

    let err = session
        .command_request("frobnicate", Message::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ViciError::UnknownCommand(cmd) if cmd == "frobnicate"));

    // the same session still works after the rejection
    let response = session
        .command_request("version", Message::new())
        .await
        .unwrap();
    assert_eq!(response.value_str("daemon"), Some("charon"));

    session.close().await;
    drop(script.await.unwrap());
}

#[tokio::test]
async fn test_streamed_command_with_concurrent_general_event() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = MockDaemon::bind(dir.path());
    let path = daemon.path().to_path_buf();

    let script = tokio::spawn(async move {
        let (mut cmd, mut evt) = daemon.accept_session().await;

        // general subscription on the event channel
        let register = evt.recv().await;
        assert_eq!(register.packet_type(), PacketType::EventRegister);
        assert_eq!(register.name(), Some("ike-updown"));
        evt.send(&Packet::event_confirm()).await;

        // streamed request on the command channel
        let register = cmd.recv().await;
        assert_eq!(register.packet_type(), PacketType::EventRegister);
        assert_eq!(register.name(), Some("list-sa"));
        cmd.send(&Packet::event_confirm()).await;

        let request = cmd.recv().await;
        assert_eq!(request.name(), Some("list-sas"));
        cmd.send(&Packet::event("list-sa", reply(&[("sa", "gw-gw")])))
            .await;
        // a general event lands on the event channel mid-stream
        evt.send(&Packet::event("ike-updown", reply(&[("up", "yes")])))
            .await;
        cmd.send(&Packet::event("list-sa", reply(&[("sa", "road-warrior")])))
            .await;
        cmd.send(&Packet::cmd_response(Message::new())).await;

        let unregister = cmd.recv().await;
        assert_eq!(unregister.packet_type(), PacketType::EventUnregister);
        assert_eq!(unregister.name(), Some("list-sa"));
        cmd.send(&Packet::event_confirm()).await;
        (cmd, evt)
    });

    let session = Arc::new(Session::connect(&path).await.unwrap());

    let reader = Arc::clone(&session);
    let listen = tokio::spawn(async move { reader.listen(&["ike-updown"]).await });

    let stream = session
        .streamed_command_request("list-sas", "list-sa", Message::new())
        .await
        .unwrap();

    assert_eq!(stream.len(), 3);
    assert_eq!(stream.messages()[0].value_str("sa"), Some("gw-gw"));
    assert_eq!(stream.messages()[1].value_str("sa"), Some("road-warrior"));
    assert_eq!(stream.messages()[2], Message::new());

    // the general event is still reachable on the event channel
    let event = session.next_event().await.unwrap();
    assert_eq!(event.name, "ike-updown");
    assert_eq!(event.message.value_str("up"), Some("yes"));

    session.close().await;
    let _ = listen.await.unwrap();
    drop(script.await.unwrap());
}

#[tokio::test]
async fn test_close_fails_pending_and_subsequent_operations() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = MockDaemon::bind(dir.path());
    let path = daemon.path().to_path_buf();

    let script = tokio::spawn(async move {
        let channels = daemon.accept_session().await;
        // never answer anything
        channels
    });

    let session = Arc::new(Session::connect(&path).await.unwrap());

    let pending = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.command_request("version", Message::new()).await })
    };
    tokio::task::yield_now().await;

    session.close().await;

    let err = pending.await.unwrap().unwrap_err();
    assert!(err.is_closed());

    let err = session
        .command_request("version", Message::new())
        .await
        .unwrap_err();
    assert!(err.is_closed());

    let err = session.next_event().await.unwrap_err();
    assert!(err.is_closed());

    drop(script.await.unwrap());
}

#[tokio::test]
async fn test_connect_fails_without_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.vici");

    let err = Session::connect(&path).await.unwrap_err();
    assert!(matches!(err, ViciError::Transport(_)));
}
