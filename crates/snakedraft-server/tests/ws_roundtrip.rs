// End-to-end tests: real WebSocket clients against the server and app loop.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use snakedraft_core::{DraftEngine, League, PickPolicy, Player, Position};
use snakedraft_server::app::{self, AppState, PersistJob};
use snakedraft_server::ws_server;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn league() -> League {
    let mut league = League::with_admins(["admin".to_string()]);
    for id in ["d1", "d2", "f1", "f2", "f3"] {
        league.register_player(Player::new(id, id.to_uppercase(), Position::Goalkeeper, None));
    }
    league
}

/// Start listener + app loop on a free port. Returns the address and the
/// persistence queue.
async fn start_server() -> (String, mpsc::Receiver<PersistJob>) {
    let listener = ws_server::bind(0).await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (ws_tx, ws_rx) = mpsc::channel(64);
    let (persist_tx, persist_rx) = mpsc::channel(64);
    let state = AppState::new(
        DraftEngine::new(league(), PickPolicy::default()),
        4,
        persist_tx,
    );
    tokio::spawn(ws_server::run(listener, ws_tx));
    tokio::spawn(app::run(ws_rx, state));
    (addr, persist_rx)
}

async fn connect(addr: &str) -> Client {
    let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .unwrap();
    let greeting = recv(&mut client).await;
    assert_eq!(greeting["type"], "STATE");
    client
}

async fn send(client: &mut Client, msg: Value) {
    client
        .send(Message::Text(msg.to_string().into()))
        .await
        .unwrap();
}

async fn recv(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for server")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Receive until a message of `kind` arrives.
async fn recv_type(client: &mut Client, kind: &str) -> Value {
    loop {
        let v = recv(client).await;
        if v["type"] == kind {
            return v;
        }
    }
}

#[tokio::test]
async fn two_clients_draft_over_websocket() {
    let (addr, mut persist_rx) = start_server().await;
    let mut admin = connect(&addr).await;
    let mut watcher = connect(&addr).await;

    let add_a = json!({"type": "ADD_TEAM", "actor": "admin", "name": "A", "delegate": "d1"});
    send(&mut admin, add_a).await;
    let added = recv_type(&mut watcher, "TEAM_ADDED").await;
    let team_a = added["team"]["id"].as_str().unwrap().to_string();

    let add_b = json!({"type": "ADD_TEAM", "actor": "admin", "name": "B", "delegate": "d2"});
    send(&mut admin, add_b).await;
    let added = recv_type(&mut watcher, "TEAM_ADDED").await;
    let team_b = added["team"]["id"].as_str().unwrap().to_string();

    let start = json!({"type": "START_DRAFT", "actor": "admin", "order": [team_b, team_a]});
    send(&mut admin, start).await;
    let state = recv_type(&mut watcher, "STATE").await;
    assert_eq!(state["state"]["isStarted"], true);
    assert_eq!(state["upcoming"], json!([team_b, team_a, team_a, team_b]));

    // Wrong delegate: only the sender hears about it.
    send(&mut watcher, json!({"type": "SUBMIT_PICK", "actor": "d1", "player_id": "f1"})).await;
    let err = recv_type(&mut watcher, "ERROR").await;
    assert_eq!(err["code"], "OUT_OF_TURN");

    let pick = json!({"type": "SUBMIT_PICK", "actor": "d2", "player_id": "f1", "expected_pick": 1});
    send(&mut watcher, pick).await;
    let committed = recv_type(&mut admin, "PICK_COMMITTED").await;
    assert_eq!(committed["pick_number"], 1);
    assert_eq!(committed["team_id"], json!(team_b));
    assert_eq!(committed["state"]["history"], json!(["f1"]));

    send(&mut admin, json!({"type": "AVAILABLE_PLAYERS", "search": "f"})).await;
    let players = recv_type(&mut admin, "PLAYERS").await;
    let ids: Vec<&str> = players["players"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["f2", "f3"]);

    // Two team snapshots, start, pick.
    let mut jobs = Vec::new();
    for _ in 0..4 {
        jobs.push(persist_rx.recv().await.unwrap());
    }
    assert!(matches!(jobs[3], PersistJob::Pick { pick_number: 1, .. }));
}

#[tokio::test]
async fn non_admin_cannot_reset() {
    let (addr, _persist_rx) = start_server().await;
    let mut client = connect(&addr).await;

    send(&mut client, json!({"type": "RESET_DRAFT", "actor": "d1", "confirm": true})).await;
    let err = recv_type(&mut client, "ERROR").await;
    assert_eq!(err["code"], "FORBIDDEN");

    send(&mut client, json!({"type": "RESET_DRAFT", "actor": "admin"})).await;
    let err = recv_type(&mut client, "ERROR").await;
    assert_eq!(err["code"], "CONFIRMATION_REQUIRED");
}

#[tokio::test]
async fn malformed_json_gets_bad_request() {
    let (addr, _persist_rx) = start_server().await;
    let mut client = connect(&addr).await;
    client
        .send(Message::Text("{\"type\":".into()))
        .await
        .unwrap();
    let err = recv_type(&mut client, "ERROR").await;
    assert_eq!(err["code"], "BAD_REQUEST");
}
