use super::*;
use crate::event_bus::{EventBus, EventStatus, Topic};
use crate::model::{Host, HostAuth};
use crate::session::SessionManager;
use crate::testing::{FakeConnector, PtyOp};
use fleetops_ssh::{PtyProcess, TerminalSize};
use futures::channel::mpsc;
use futures::{stream, StreamExt};
use std::sync::Arc;

fn resize_frame(cols: u32, rows: u32) -> Vec<u8> {
    let mut frame = vec![CONTROL_TAG];
    frame.extend_from_slice(
        format!(r#"{{"type":"resize","cols":{},"rows":{}}}"#, cols, rows).as_bytes(),
    );
    frame
}

fn input_frame(data: &[u8]) -> Vec<u8> {
    ClientFrame::Input(data.to_vec()).encode()
}

#[test]
fn test_decode_input() {
    let frame = ClientFrame::decode(&[INPUT_TAG, b'l', b's', b'\n']).unwrap();
    assert_eq!(frame, ClientFrame::Input(b"ls\n".to_vec()));

    // input that happens to look like JSON is still input
    let frame = ClientFrame::decode(&input_frame(br#"{"type":"resize","cols":1,"rows":1}"#)).unwrap();
    assert!(matches!(frame, ClientFrame::Input(_)));

    assert_eq!(
        ClientFrame::decode(&[INPUT_TAG]).unwrap(),
        ClientFrame::Input(Vec::new())
    );
}

#[test]
fn test_decode_resize() {
    let frame = ClientFrame::decode(&resize_frame(100, 40)).unwrap();
    assert_eq!(frame, ClientFrame::Resize(TerminalSize::new(100, 40)));
}

#[test]
fn test_decode_rejects_bad_frames() {
    assert!(matches!(ClientFrame::decode(&[]), Err(FrameError::Empty)));
    assert!(matches!(
        ClientFrame::decode(b"ls\n"),
        Err(FrameError::UnknownTag(b'l'))
    ));
    assert!(matches!(
        ClientFrame::decode(&[CONTROL_TAG, b'{']),
        Err(FrameError::Malformed(_))
    ));
    assert!(matches!(
        ClientFrame::decode(&[CONTROL_TAG, b'{', b'}']),
        Err(FrameError::Malformed(_))
    ));
    assert!(matches!(
        ClientFrame::decode(&resize_frame(0, 40)),
        Err(FrameError::InvalidSize { cols: 0, rows: 40 })
    ));
}

#[test]
fn test_encode_resize_decodes_back() {
    let frame = ClientFrame::Resize(TerminalSize::new(132, 50));
    assert_eq!(ClientFrame::decode(&frame.encode()).unwrap(), frame);
}

struct Rig {
    connector: Arc<FakeConnector>,
    sessions: SessionManager,
    bus: EventBus,
    host: Host,
}

fn rig() -> Rig {
    let connector = Arc::new(FakeConnector::new());
    Rig {
        sessions: SessionManager::new(connector.clone(), "xterm"),
        connector,
        bus: EventBus::new(16),
        host: Host::new("web", "10.0.0.1", "ops", HostAuth::password("pw")),
    }
}

#[tokio::test]
async fn test_resize_applied_before_input_and_never_leaks() {
    let rig = rig();
    let process = rig
        .sessions
        .create_session("s1", &rig.host, TerminalSize::default())
        .await
        .unwrap();
    let incoming = stream::iter(vec![resize_frame(100, 40), input_frame(b"ls\n")]);
    let (out_tx, _out_rx) = mpsc::unbounded::<Vec<u8>>();

    let end = run_bridge(&rig.sessions, &rig.bus, "s1", process, incoming, out_tx).await;

    assert_eq!(end, BridgeEnd::ClientClosed);
    let pty = &rig.connector.ptys()[0];
    assert_eq!(
        pty.ops(),
        vec![
            PtyOp::Resize(TerminalSize::new(100, 40)),
            PtyOp::Write(b"ls\n".to_vec()),
            PtyOp::Terminate,
        ]
    );
    assert_eq!(pty.written(), b"ls\n".to_vec());
    assert_eq!(pty.size(), TerminalSize::new(100, 40));
    assert!(!rig.sessions.is_active("s1").await);
}

#[tokio::test]
async fn test_bad_frames_are_dropped() {
    let rig = rig();
    let process = rig
        .sessions
        .create_session("s1", &rig.host, TerminalSize::default())
        .await
        .unwrap();
    let incoming = stream::iter(vec![
        Vec::new(),
        b"raw without tag".to_vec(),
        vec![CONTROL_TAG, b'x'],
        input_frame(b"pwd\n"),
    ]);
    let (out_tx, _out_rx) = mpsc::unbounded::<Vec<u8>>();

    run_bridge(&rig.sessions, &rig.bus, "s1", process, incoming, out_tx).await;

    assert_eq!(rig.connector.ptys()[0].written(), b"pwd\n".to_vec());
}

#[tokio::test]
async fn test_shell_output_is_forwarded_until_exit() {
    let rig = rig();
    let process = rig
        .sessions
        .create_session("s1", &rig.host, TerminalSize::default())
        .await
        .unwrap();
    let pty = rig.connector.ptys()[0].clone();
    pty.emit(b"hello\r\n");
    pty.emit(b"$ ");
    pty.finish();

    // client never sends anything and never hangs up
    let (_in_tx, in_rx) = mpsc::unbounded::<Vec<u8>>();
    let (out_tx, out_rx) = mpsc::unbounded::<Vec<u8>>();
    let mut sub = rig.bus.subscribe(Some(Topic::Session("s1".into())));

    let end = run_bridge(&rig.sessions, &rig.bus, "s1", process, in_rx, out_tx).await;

    assert_eq!(end, BridgeEnd::ProcessExited);
    let received: Vec<Vec<u8>> = out_rx.collect().await;
    assert_eq!(received, vec![b"hello\r\n".to_vec(), b"$ ".to_vec()]);
    assert!(!rig.sessions.is_active("s1").await);

    assert_eq!(sub.recv().await.unwrap().status, EventStatus::Connected);
    assert_eq!(sub.recv().await.unwrap().status, EventStatus::Closed);
}

#[tokio::test]
async fn test_client_hangup_on_output_closes_session() {
    let rig = rig();
    let process = rig
        .sessions
        .create_session("s1", &rig.host, TerminalSize::default())
        .await
        .unwrap();
    rig.connector.ptys()[0].emit(b"output nobody reads");

    let (_in_tx, in_rx) = mpsc::unbounded::<Vec<u8>>();
    let (out_tx, out_rx) = mpsc::unbounded::<Vec<u8>>();
    drop(out_rx);

    let end = run_bridge(&rig.sessions, &rig.bus, "s1", process, in_rx, out_tx).await;

    assert_eq!(end, BridgeEnd::ClientClosed);
    assert_eq!(rig.connector.ptys()[0].terminations(), 1);
}
