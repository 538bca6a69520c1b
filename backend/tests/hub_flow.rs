//! Hub-level integration tests: envelope demultiplexing, session binding,
//! and directory cleanup, driven through `handle_message` with in-process
//! connections.

use axum::extract::ws::Message;
use serde_json::{json, Value};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use uuid::Uuid;

use backend::ws::{handle_message, GameServer, Session};

struct TestClient {
    session: Session,
    rx: UnboundedReceiver<Message>,
}

impl TestClient {
    fn new(client_id: &str) -> TestClient {
        let (tx, rx) = unbounded_channel();
        TestClient {
            session: Session::new(client_id.to_owned(), tx),
            rx,
        }
    }

    fn send(&mut self, server: &GameServer, msg_type: &str, payload: Value) -> String {
        let request_id = Uuid::new_v4().to_string();
        let envelope = json!({
            "type": msg_type,
            "payload": payload,
            "request_id": request_id,
        });
        handle_message(server, &mut self.session, &envelope.to_string());
        request_id
    }

    fn send_raw(&mut self, server: &GameServer, text: &str) {
        handle_message(server, &mut self.session, text);
    }

    fn try_next(&mut self) -> Option<Value> {
        match self.rx.try_recv() {
            Ok(Message::Text(text)) => {
                Some(serde_json::from_str(&text).expect("frame should be JSON"))
            }
            _ => None,
        }
    }

    fn drain(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Some(frame) = self.try_next() {
            frames.push(frame);
        }
        frames
    }

    fn next(&mut self) -> Value {
        self.try_next().expect("expected a queued frame")
    }
}

fn create_payload() -> Value {
    json!({
        "game_type": "flipflop3x3",
        "game_mode": "multiplayer",
        "username": "Alice",
    })
}

/// Create a room for the client and return its id.
fn create_room(server: &GameServer, client: &mut TestClient) -> String {
    client.send(server, "create", create_payload());
    let created = client.next();
    assert_eq!(created["type"], "created");
    created["payload"]["room_id"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn create_mints_a_room_and_binds_the_session() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");

    let request_id = p1.send(&server, "create", create_payload());
    let created = p1.next();

    assert_eq!(created["type"], "created");
    assert_eq!(created["request_id"], request_id.as_str());
    assert_eq!(created["payload"]["is_spectator"], false);

    let room_id = created["payload"]["room_id"].as_str().unwrap();
    assert_eq!(room_id.len(), 4);
    assert!(room_id.chars().all(|c| c.is_ascii_alphanumeric()));
    assert!(server.room(room_id).is_some());
    assert_eq!(server.room_count(), 1);
}

#[tokio::test]
async fn a_bound_session_cannot_create_again() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");
    create_room(&server, &mut p1);

    p1.send(&server, "create", create_payload());
    let err = p1.next();
    assert_eq!(err["type"], "error");
    assert_eq!(err["payload"]["code"], "already_in_game");
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");

    p1.send_raw(&server, "{not json");
    let err = p1.next();
    assert_eq!(err["type"], "error");
    assert_eq!(err["payload"]["code"], "invalid_message_format");
    assert!(err.get("request_id").is_none());
}

#[tokio::test]
async fn unknown_message_types_are_rejected() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");

    let envelope = json!({
        "type": "teleport",
        "request_id": Uuid::new_v4().to_string(),
    });
    p1.send_raw(&server, &envelope.to_string());
    let err = p1.next();
    assert_eq!(err["payload"]["code"], "invalid_message_format");
}

#[tokio::test]
async fn server_to_client_types_are_not_accepted() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");

    p1.send(&server, "ack", Value::Null);
    let err = p1.next();
    assert_eq!(err["payload"]["code"], "invalid_msg_type");
}

#[tokio::test]
async fn the_request_id_must_be_a_uuid() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");

    let envelope = json!({ "type": "create", "payload": create_payload() });
    p1.send_raw(&server, &envelope.to_string());
    let err = p1.next();
    assert_eq!(err["payload"]["code"], "validation_failed");
    assert_eq!(err["payload"]["details"][0]["field"], "request_id");

    let envelope = json!({
        "type": "create",
        "payload": create_payload(),
        "request_id": "not-a-uuid",
    });
    p1.send_raw(&server, &envelope.to_string());
    let err = p1.next();
    assert_eq!(err["payload"]["code"], "validation_failed");
}

#[tokio::test]
async fn payload_validation_failures_carry_details() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");

    p1.send(
        &server,
        "create",
        json!({
            "game_type": "flipflop3x3",
            "game_mode": "multiplayer",
            "username": "A",
        }),
    );
    let err = p1.next();
    assert_eq!(err["payload"]["code"], "validation_failed");
    assert_eq!(err["payload"]["details"][0]["field"], "username");
}

#[tokio::test]
async fn unsupported_ai_difficulty_is_rejected() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");

    p1.send(
        &server,
        "create",
        json!({
            "game_type": "flipflop3x3",
            "game_mode": "singleplayer",
            "username": "Alice",
            "ai_difficulty": "impossible",
        }),
    );
    let err = p1.next();
    assert_eq!(err["payload"]["code"], "invalid_ai_difficulty");
    assert_eq!(server.room_count(), 0);
}

#[tokio::test]
async fn joining_an_unknown_room_fails() {
    let server = GameServer::new();
    let mut p2 = TestClient::new("p2");

    p2.send(&server, "join", json!({ "room_id": "zzzz", "username": "Bob" }));
    let err = p2.next();
    assert_eq!(err["payload"]["code"], "room_not_found");
}

#[tokio::test]
async fn join_validates_the_room_id_shape() {
    let server = GameServer::new();
    let mut p2 = TestClient::new("p2");

    p2.send(&server, "join", json!({ "room_id": "toolong", "username": "Bob" }));
    let err = p2.next();
    assert_eq!(err["payload"]["code"], "validation_failed");
    assert_eq!(err["payload"]["details"][0]["field"], "room_id");
}

#[tokio::test]
async fn join_replies_with_state_and_starts_the_game() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");
    let room_id = create_room(&server, &mut p1);

    let mut p2 = TestClient::new("p2");
    let request_id = p2.send(
        &server,
        "join",
        json!({ "room_id": room_id, "username": "Bob" }),
    );

    let joined = p2.next();
    assert_eq!(joined["type"], "joined");
    assert_eq!(joined["request_id"], request_id.as_str());
    assert_eq!(joined["payload"]["is_spectator"], false);
    assert_eq!(joined["payload"]["game_state"]["board"], "aaa/ooo/xxx1");
    assert_eq!(joined["payload"]["messages"], json!([]));

    // A player joining triggers the start broadcast for everyone.
    let start = p2.next();
    assert_eq!(start["type"], "start");
    assert!(p1.drain().iter().any(|f| f["type"] == "start"));
}

#[tokio::test]
async fn a_third_client_joins_as_spectator() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");
    let room_id = create_room(&server, &mut p1);

    let mut p2 = TestClient::new("p2");
    p2.send(
        &server,
        "join",
        json!({ "room_id": room_id, "username": "Bob" }),
    );

    let mut p3 = TestClient::new("p3");
    p3.send(
        &server,
        "join",
        json!({ "room_id": room_id, "username": "Carol" }),
    );
    let joined = p3.next();
    assert_eq!(joined["type"], "joined");
    assert_eq!(joined["payload"]["is_spectator"], true);

    // No second start broadcast for a spectator join.
    assert!(!p3.drain().iter().any(|f| f["type"] == "start"));
}

#[tokio::test]
async fn moves_flow_through_the_hub() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");
    let room_id = create_room(&server, &mut p1);
    let mut p2 = TestClient::new("p2");
    p2.send(
        &server,
        "join",
        json!({ "room_id": room_id, "username": "Bob" }),
    );
    p1.drain();
    p2.drain();

    let request_id = p1.send(&server, "move", json!({ "from": "A1", "to": "A2" }));

    let ack = p1.next();
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["request_id"], request_id.as_str());
    assert!(p1.try_next().is_none());

    let mv = p2.next();
    assert_eq!(mv["type"], "move");
    assert_eq!(mv["payload"]["board"], "aaa/yoo/oxx2");

    // Errors echo the request id too.
    let request_id = p1.send(&server, "move", json!({ "from": "A1", "to": "A2" }));
    let err = p1.next();
    assert_eq!(err["type"], "error");
    assert_eq!(err["payload"]["code"], "not_your_turn");
    assert_eq!(err["request_id"], request_id.as_str());
}

#[tokio::test]
async fn room_actions_require_a_bound_room() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");

    for msg_type in ["move", "forfeit", "leave", "game_state", "rematch", "cancel_rematch"] {
        p1.send(&server, msg_type, json!({ "from": "A1", "to": "A2" }));
        let err = p1.next();
        assert_eq!(
            err["payload"]["code"], "must_join_game_first",
            "{msg_type} should require a room"
        );
    }
}

#[tokio::test]
async fn chat_payloads_are_validated_by_the_hub() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");
    create_room(&server, &mut p1);

    p1.send(&server, "message", json!({ "content": "" }));
    let err = p1.next();
    assert_eq!(err["payload"]["code"], "validation_failed");
    assert_eq!(err["payload"]["details"][0]["field"], "content");
}

#[tokio::test]
async fn game_state_requests_are_answered_directly() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");
    create_room(&server, &mut p1);

    let request_id = p1.send(&server, "game_state", Value::Null);
    let state = p1.next();
    assert_eq!(state["type"], "game_state");
    assert_eq!(state["request_id"], request_id.as_str());
    assert_eq!(state["payload"]["game_state"]["board"], "aaa/ooo/xxx1");
    assert_eq!(state["payload"]["game_state"]["status"], "waiting_for_players");
}

#[tokio::test]
async fn leave_unbinds_the_session() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");
    create_room(&server, &mut p1);

    let request_id = p1.send(&server, "leave", Value::Null);
    let frames = p1.drain();
    let left = frames
        .iter()
        .find(|f| f["type"] == "left")
        .expect("left reply");
    assert_eq!(left["request_id"], request_id.as_str());

    // The sole player left, so the room closed and was dropped.
    assert_eq!(server.room_count(), 0);

    // And the session is free to create a new room.
    create_room(&server, &mut p1);
    assert_eq!(server.room_count(), 1);
}

#[tokio::test]
async fn closed_rooms_are_dropped_from_the_directory() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");
    let room_id = create_room(&server, &mut p1);
    let mut p2 = TestClient::new("p2");
    p2.send(
        &server,
        "join",
        json!({ "room_id": room_id.clone(), "username": "Bob" }),
    );

    p1.send(&server, "leave", Value::Null);
    assert!(server.room(&room_id).is_some(), "one player remains");

    p2.send(&server, "leave", Value::Null);
    assert!(server.room(&room_id).is_none(), "room should be dropped");

    // A stale binding would block p2 here if cleanup had not happened.
    p2.drain();
    p2.send(&server, "create", create_payload());
    let created = p2.next();
    assert_eq!(created["type"], "created");
}

#[tokio::test]
async fn a_player_can_rejoin_through_the_hub_without_a_username() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");
    let room_id = create_room(&server, &mut p1);
    let mut p2 = TestClient::new("p2");
    p2.send(
        &server,
        "join",
        json!({ "room_id": room_id.clone(), "username": "Bob" }),
    );
    p2.send(&server, "leave", Value::Null);
    p1.drain();
    p2.drain();

    // Reconnecting players are recognized by id; no username needed.
    p2.send(&server, "join", json!({ "room_id": room_id }));
    let joined = p2.next();
    assert_eq!(joined["type"], "joined");
    assert_eq!(joined["payload"]["is_spectator"], false);
    assert_eq!(
        joined["payload"]["game_state"]["players"][1]["username"],
        "Bob"
    );

    let frames = p1.drain();
    assert!(frames.iter().any(|f| f["type"] == "player_rejoined"));
}

#[tokio::test]
async fn rematch_messages_dispatch_to_the_room() {
    let server = GameServer::new();
    let mut p1 = TestClient::new("p1");
    let room_id = create_room(&server, &mut p1);
    let mut p2 = TestClient::new("p2");
    p2.send(
        &server,
        "join",
        json!({ "room_id": room_id, "username": "Bob" }),
    );
    p1.send(&server, "forfeit", Value::Null);
    p1.drain();
    p2.drain();

    p1.send(&server, "rematch", Value::Null);
    let frames = p2.drain();
    assert!(frames.iter().any(|f| f["type"] == "rematch_requested"));

    p1.send(&server, "cancel_rematch", Value::Null);
    let frames = p2.drain();
    assert!(frames.iter().any(|f| f["type"] == "rematch_cancelled"));
}
