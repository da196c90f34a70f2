// Integration tests for the connection lifecycle against a local fake controller
// Run with: cargo test --test connection_test

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gnc_link::command::{Command, ProgramCommand};
use gnc_link::connection::wait_for_handle;
use gnc_link::schema::{Position, ProgramCancelled, ProgramStarted};
use gnc_link::{bind, Config, Connection, ConnectionState, Pipe};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// One accepted client connection, seen from the controller side.
struct Peer {
    ws: WebSocketStream<TcpStream>,
}

impl Peer {
    async fn send(&mut self, frame: Value) {
        self.ws
            .send(Message::Text(frame.to_string()))
            .await
            .expect("peer send");
    }

    async fn recv_json(&mut self) -> Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(2), self.ws.next())
                .await
                .expect("peer recv timed out")
                .expect("peer stream ended")
                .expect("peer recv error");
            if let Message::Text(text) = msg {
                return serde_json::from_str(&text).expect("client sent JSON");
            }
        }
    }

    async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Fake controller: accepts WebSocket clients and hands them to the test.
struct FakeController {
    url: String,
    peers: mpsc::UnboundedReceiver<Peer>,
}

impl FakeController {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (tx, peers) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                    if tx.send(Peer { ws }).is_err() {
                        break;
                    }
                }
            }
        });
        Self {
            url: format!("ws://{addr}/ws"),
            peers,
        }
    }

    async fn next_peer(&mut self) -> Peer {
        tokio::time::timeout(Duration::from_secs(2), self.peers.recv())
            .await
            .expect("no client connected")
            .expect("listener stopped")
    }

    fn config(&self) -> Config {
        Config {
            url: Some(self.url.clone()),
            reconnect_delay_ms: 50,
            ..Config::default()
        }
    }
}

/// Poll `check` until it holds or two seconds pass.
async fn eventually(what: &str, check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn test_frames_reach_typed_streams() {
    let mut controller = FakeController::start().await;
    let connection = Connection::spawn(&controller.config());
    let mut peer = controller.next_peer().await;
    let handle = wait_for_handle(&connection.active()).await.unwrap();
    assert!(!handle.is_mock());

    peer.send(json!({ "type": "connected", "id": "client-7" })).await;
    peer.send(json!({ "type": "position", "x": 1, "y": 2, "z": 3 })).await;
    peer.send(json!({ "type": "position", "x": 4, "y": 5, "z": 6 })).await;
    peer.send(json!({ "type": "bogus" })).await;

    let position = handle.telemetry.position.clone();
    eventually("second position", || {
        position.latest()
            == Some(Position {
                x: 4.0,
                y: 5.0,
                z: 6.0,
            })
    })
    .await;
    assert_eq!(
        handle.telemetry.session.latest().map(|c| c.id),
        Some("client-7".to_string())
    );
    assert_eq!(connection.state().latest(), Some(ConnectionState::Connected));

    connection.shutdown().await;
}

#[tokio::test]
async fn test_start_program_round_trip() {
    let mut controller = FakeController::start().await;
    let connection = Connection::spawn(&controller.config());
    let mut peer = controller.next_peer().await;
    let handle = wait_for_handle(&connection.active()).await.unwrap();

    let started = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&started);
    let _sub = handle
        .program
        .started
        .subscribe(move |s: &ProgramStarted| sink.lock().unwrap().push(s.clone()));
    let cancelled = Arc::new(Mutex::new(0));
    let cancel_sink = Arc::clone(&cancelled);
    let _cancel_sub = handle
        .program
        .cancelled
        .subscribe(move |_: &ProgramCancelled| *cancel_sink.lock().unwrap() += 1);

    handle.send(&Command::Program(ProgramCommand::Start {
        program_name: "demo.ngc".to_string(),
        invert_z: true,
        scale: 2.0,
    }));
    assert_eq!(
        peer.recv_json().await,
        json!({
            "cmd": "program",
            "action": "start",
            "programName": "demo.ngc",
            "invertZ": true,
            "scale": 2.0
        })
    );

    peer.send(json!({
        "type": "reply",
        "to": "client-7",
        "msg": { "type": "startProgram", "programName": "demo.ngc" }
    }))
    .await;

    let seen = Arc::clone(&started);
    eventually("started reply", || !seen.lock().unwrap().is_empty()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        *started.lock().unwrap(),
        vec![ProgramStarted {
            program_name: "demo.ngc".to_string()
        }]
    );
    assert_eq!(*cancelled.lock().unwrap(), 0);

    connection.shutdown().await;
}

#[tokio::test]
async fn test_reconnect_swaps_handles() {
    let mut controller = FakeController::start().await;
    let connection = Connection::spawn(&controller.config());
    let active = connection.active();

    let xs = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&xs);
    let _binding = bind(
        &active,
        |h| &h.telemetry.position,
        Pipe::identity().map(|p: Position| p.x),
        move |x| sink.lock().unwrap().push(x),
    );

    let mut first = controller.next_peer().await;
    let old_handle = wait_for_handle(&active).await.unwrap();
    first.send(json!({ "type": "position", "x": 1, "y": 0, "z": 0 })).await;
    let seen = Arc::clone(&xs);
    eventually("first position", || seen.lock().unwrap().len() == 1).await;

    let states = Arc::new(Mutex::new(Vec::new()));
    let state_sink = Arc::clone(&states);
    let _state_sub = connection
        .state()
        .subscribe(move |s: &ConnectionState| state_sink.lock().unwrap().push(*s));

    first.close().await;
    let mut second = controller.next_peer().await;

    // The handle is published before Connected, so Connected after a
    // Reconnecting means the new handle is active.
    let seen_states = Arc::clone(&states);
    eventually("reconnected", || {
        let states = seen_states.lock().unwrap();
        let reconnected = states
            .iter()
            .position(|s| matches!(s, ConnectionState::Reconnecting { .. }));
        matches!(reconnected, Some(i) if states[i..].contains(&ConnectionState::Connected))
    })
    .await;
    let new_handle = wait_for_handle(&active).await.unwrap();
    assert!(new_handle.telemetry.position.latest().is_none());

    // The stale handle's sender is dead: only the new handle's command arrives.
    old_handle.send(&Command::Program(ProgramCommand::Cancel));
    new_handle.send(&Command::Program(ProgramCommand::Get));
    assert_eq!(second.recv_json().await, json!({ "cmd": "program", "action": "get" }));

    second.send(json!({ "type": "position", "x": 2, "y": 0, "z": 0 })).await;
    let seen = Arc::clone(&xs);
    eventually("second position", || seen.lock().unwrap().len() == 2).await;

    assert_eq!(*xs.lock().unwrap(), vec![1.0, 2.0]);
    assert_eq!(old_handle.telemetry.position.latest().map(|p| p.x), Some(1.0));

    connection.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_clears_handle() {
    let mut controller = FakeController::start().await;
    let connection = Connection::spawn(&controller.config());
    let _peer = controller.next_peer().await;
    let active = connection.active();
    let state = connection.state();
    wait_for_handle(&active).await.unwrap();

    connection.shutdown().await;

    assert_eq!(state.latest(), Some(ConnectionState::Disconnected));
    assert!(matches!(active.latest(), Some(None)));
}

#[tokio::test]
async fn test_command_not_starved_by_inbound_flood() {
    let mut controller = FakeController::start().await;
    let connection = Connection::spawn(&controller.config());
    let peer = controller.next_peer().await;
    let handle = wait_for_handle(&connection.active()).await.unwrap();

    let (mut outgoing, mut incoming) = peer.ws.split();
    let flood = tokio::spawn(async move {
        let mut x = 0_u64;
        loop {
            x += 1;
            let frame = json!({ "type": "position", "x": x, "y": 0, "z": 0 }).to_string();
            if outgoing.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let position = handle.telemetry.position.clone();
    eventually("flood under way", || {
        position.latest().is_some_and(|p| p.x > 1000.0)
    })
    .await;

    let sent_at = std::time::Instant::now();
    handle.send(&Command::Program(ProgramCommand::Get));
    let frame = loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), incoming.next())
            .await
            .expect("command never arrived")
            .expect("peer stream ended")
            .expect("peer recv error");
        if let Message::Text(text) = msg {
            break serde_json::from_str::<Value>(&text).unwrap();
        }
    };
    let elapsed = sent_at.elapsed();

    assert_eq!(frame, json!({ "cmd": "program", "action": "get" }));
    assert!(elapsed < Duration::from_millis(100), "command took {elapsed:?}");

    flood.abort();
    connection.shutdown().await;
}
