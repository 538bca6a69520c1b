//! The websocket hub: connection lifecycle and message demultiplexing.
//!
//! Each socket runs two tasks: a writer draining an unbounded channel into
//! the sink, and a read loop that owns the session state (client id, bound
//! room, spectator flag) and dispatches envelopes. Rooms hold clones of the
//! writer channel, which is how broadcasts reach a connection without its
//! read loop being involved.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::timeout;
use uuid::Uuid;

use flipflop_engine::AiDifficulty;
use shared::protocol::{
    ChatPayload, CreateRoomPayload, GameMode, IncomingMessage, JoinRoomPayload, MsgType,
    OutgoingMessage,
};
use shared::AppError;

use crate::config;
use crate::room::{GameRoom, InitialPlayer, RoomConfig};

/// The room directory plus the process start time for the health probe.
pub struct GameServer {
    rooms: DashMap<String, Arc<GameRoom>>,
    started_at: Instant,
}

impl GameServer {
    pub fn new() -> GameServer {
        GameServer {
            rooms: DashMap::new(),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn room(&self, room_id: &str) -> Option<Arc<GameRoom>> {
        self.rooms.get(room_id).map(|entry| Arc::clone(&entry))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Drop a room from the directory. Connection tasks drop their own
    /// references when they observe the closed status.
    pub fn remove_room(&self, room: &GameRoom) {
        self.rooms.remove(&room.id);
    }

    /// Mint an unused 4-character alphanumeric room id.
    fn generate_room_id(&self) -> Result<String, AppError> {
        let mut rng = rand::thread_rng();
        for _ in 0..config::ROOM_ID_MAX_ATTEMPTS {
            let id: String = (0..config::ROOM_ID_LENGTH)
                .map(|_| config::ROOM_ID_CHARSET[rng.gen_range(0..config::ROOM_ID_CHARSET.len())] as char)
                .collect();
            if !self.rooms.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(AppError::IdGenerationFailed)
    }
}

impl Default for GameServer {
    fn default() -> Self {
        GameServer::new()
    }
}

/// Per-connection state, owned by the read loop.
pub struct Session {
    pub client_id: String,
    pub room: Option<Arc<GameRoom>>,
    pub is_spectator: bool,
    pub sender: UnboundedSender<Message>,
}

impl Session {
    pub fn new(client_id: String, sender: UnboundedSender<Message>) -> Session {
        Session {
            client_id,
            room: None,
            is_spectator: false,
            sender,
        }
    }

    fn send(&self, msg: &OutgoingMessage) {
        match msg.to_text() {
            Ok(text) => {
                if self.sender.send(Message::Text(text)).is_err() {
                    tracing::error!(client_id = %self.client_id, "failed to send message");
                }
            }
            Err(err) => tracing::error!(error = %err, "failed to encode message"),
        }
    }

    fn send_error(&self, err: AppError, request_id: Option<String>) {
        self.send(&OutgoingMessage::error(err, request_id));
    }
}

/// `GET /ws`: upgrade and hand the socket to the session loop.
pub async fn ws_handler(
    State(server): State<Arc<GameServer>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(server, socket))
}

async fn handle_socket(server: Arc<GameServer>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Writer task: the only place the sink is touched.
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let client_id = Uuid::new_v4().to_string();
    let mut session = Session::new(client_id.clone(), tx);
    tracing::info!(client_id = %client_id, "client connected");

    session.send(&OutgoingMessage::new(
        MsgType::Connected,
        json!({ "client_id": client_id }),
        None,
    ));

    // The read deadline re-arms on every frame; "ping" keepalives are
    // enough to hold an otherwise idle connection open.
    let deadline = config::PING_INTERVAL + config::PING_WAIT;
    loop {
        let frame = match timeout(deadline, stream.next()).await {
            Err(_) => {
                tracing::info!(client_id = %client_id, "read deadline expired");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(_))) => break,
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => {
                if text == "ping" {
                    let _ = session.sender.send(Message::Text("pong".to_owned()));
                    continue;
                }
                handle_message(&server, &mut session, &text);
            }
            Message::Close(_) => break,
            // Protocol-level ping/pong and binary frames are ignored.
            _ => {}
        }
    }

    // Disconnect: leave the bound room, if any, and drop it from the
    // directory once closed.
    if let Some(room) = session.room.take() {
        room.leave_room(&client_id);
        if room.is_closed() {
            server.remove_room(&room);
        }
    }

    tracing::info!(client_id = %client_id, "client disconnected");
    writer.abort();
}

/// Demultiplex one JSON envelope. Public so integration tests can drive
/// sessions without a real socket.
pub fn handle_message(server: &GameServer, session: &mut Session, text: &str) {
    let msg: IncomingMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(_) => {
            session.send_error(AppError::InvalidMessageFormat, None);
            return;
        }
    };

    if let Err(errors) = msg.validate() {
        let details = serde_json::to_value(errors).unwrap_or(Value::Null);
        session.send(&OutgoingMessage::error_with_details(
            AppError::ValidationFailed,
            details,
            msg.request_id.clone(),
        ));
        return;
    }

    let request_id = msg.request_id.clone().unwrap_or_default();
    let payload = msg.payload.unwrap_or(Value::Null);

    // A room that closed behind our back no longer binds this session.
    if session.room.as_ref().is_some_and(|room| room.is_closed()) {
        if let Some(room) = session.room.take() {
            server.remove_room(&room);
        }
    }

    match msg.msg_type {
        MsgType::CreateRoom => handle_create(server, session, payload, request_id),
        MsgType::JoinRoom => handle_join(server, session, payload, request_id),
        MsgType::LeaveRoom => handle_leave(server, session, request_id),
        MsgType::Move => {
            let Some(room) = require_room(session, &request_id) else {
                return;
            };
            if let Err(err) = room.handle_move(&session.client_id, &request_id, payload) {
                session.send_error(err, Some(request_id));
            }
            cleanup_if_closed(server, session);
        }
        MsgType::Forfeit => {
            let Some(room) = require_room(session, &request_id) else {
                return;
            };
            if let Err(err) = room.handle_forfeit(&session.client_id) {
                session.send_error(err, Some(request_id));
            }
            cleanup_if_closed(server, session);
        }
        MsgType::GameState => {
            let Some(room) = require_room(session, &request_id) else {
                return;
            };
            session.send(&OutgoingMessage::new(
                MsgType::GameState,
                json!({ "game_state": room.game_state() }),
                Some(request_id),
            ));
        }
        MsgType::SendMessage => {
            let chat: ChatPayload = match serde_json::from_value(payload) {
                Ok(chat) => chat,
                Err(_) => {
                    session.send_error(AppError::InvalidMessageFormat, Some(request_id));
                    return;
                }
            };
            if let Err(details) = chat.validate() {
                session.send(&OutgoingMessage::error_with_details(
                    AppError::ValidationFailed,
                    details,
                    Some(request_id),
                ));
                return;
            }

            let Some(room) = require_room(session, &request_id) else {
                return;
            };
            if let Err(err) = room.handle_chat(&session.client_id, &request_id, &chat.content) {
                session.send_error(err, Some(request_id));
            }
        }
        MsgType::Rematch => {
            let Some(room) = require_room(session, &request_id) else {
                return;
            };
            if let Err(err) = room.request_rematch(&session.client_id) {
                session.send_error(err, Some(request_id));
            }
        }
        MsgType::CancelRematch => {
            let Some(room) = require_room(session, &request_id) else {
                return;
            };
            if let Err(err) = room.cancel_rematch(&session.client_id) {
                session.send_error(err, Some(request_id));
            }
        }
        // Server-to-client types are not accepted from clients.
        _ => session.send_error(AppError::InvalidMsgType, Some(request_id)),
    }
}

fn handle_create(server: &GameServer, session: &mut Session, payload: Value, request_id: String) {
    if session.room.is_some() {
        session.send_error(AppError::AlreadyInGame, Some(request_id));
        return;
    }

    let create: CreateRoomPayload = match serde_json::from_value(payload) {
        Ok(create) => create,
        Err(_) => {
            session.send_error(AppError::InvalidMessageFormat, Some(request_id));
            return;
        }
    };
    if let Err(details) = create.validate() {
        session.send(&OutgoingMessage::error_with_details(
            AppError::ValidationFailed,
            details,
            Some(request_id),
        ));
        return;
    }

    let ai_difficulty = if create.game_mode == GameMode::Singleplayer {
        match create
            .ai_difficulty
            .as_deref()
            .unwrap_or("medium")
            .parse::<AiDifficulty>()
        {
            Ok(difficulty) => difficulty,
            Err(_) => {
                session.send_error(AppError::InvalidAiDifficulty, Some(request_id));
                return;
            }
        }
    } else {
        AiDifficulty::default()
    };

    let room_id = match server.generate_room_id() {
        Ok(room_id) => room_id,
        Err(err) => {
            session.send_error(err, Some(request_id));
            return;
        }
    };

    let room = GameRoom::new(
        RoomConfig {
            id: room_id.clone(),
            game_mode: create.game_mode,
            game_type: create.game_type,
            ai_difficulty,
        },
        InitialPlayer {
            client_id: session.client_id.clone(),
            username: create.username,
            sender: session.sender.clone(),
        },
    );

    server.rooms.insert(room_id.clone(), Arc::clone(&room));
    session.room = Some(Arc::clone(&room));
    session.is_spectator = false;

    tracing::info!(room_id = %room_id, client_id = %session.client_id, "room created");

    session.send(&OutgoingMessage::new(
        MsgType::RoomCreated,
        json!({ "room_id": room_id, "is_spectator": false }),
        Some(request_id),
    ));

    // Single-player rooms have both seats filled already; start at once.
    if create.game_mode == GameMode::Singleplayer {
        room.start_game();
    }
}

fn handle_join(server: &GameServer, session: &mut Session, payload: Value, request_id: String) {
    if session.room.is_some() {
        session.send_error(AppError::AlreadyInGame, Some(request_id));
        return;
    }

    let join: JoinRoomPayload = match serde_json::from_value(payload) {
        Ok(join) => join,
        Err(_) => {
            session.send_error(AppError::InvalidMessageFormat, Some(request_id));
            return;
        }
    };
    if let Err(details) = join.validate() {
        session.send(&OutgoingMessage::error_with_details(
            AppError::ValidationFailed,
            details,
            Some(request_id),
        ));
        return;
    }

    let Some(room) = server.room(&join.room_id) else {
        session.send_error(AppError::RoomNotFound, Some(request_id));
        return;
    };

    let is_spectator =
        match room.enter_room(&session.client_id, &join.username, session.sender.clone()) {
            Ok(is_spectator) => is_spectator,
            Err(err) => {
                session.send_error(err, Some(request_id));
                return;
            }
        };

    session.room = Some(Arc::clone(&room));
    session.is_spectator = is_spectator;

    tracing::info!(
        room_id = %room.id,
        client_id = %session.client_id,
        is_spectator,
        "client joined room"
    );

    session.send(&OutgoingMessage::new(
        MsgType::JoinedRoom,
        json!({
            "is_spectator": is_spectator,
            "game_state": room.game_state(),
            "messages": room.get_messages(is_spectator),
        }),
        Some(request_id),
    ));

    if !is_spectator {
        room.start_game();
    }
}

fn handle_leave(server: &GameServer, session: &mut Session, request_id: String) {
    let Some(room) = session.room.take() else {
        session.send_error(AppError::NotInGame, Some(request_id));
        return;
    };

    room.leave_room(&session.client_id);
    if room.is_closed() {
        server.remove_room(&room);
    }

    session.send(&OutgoingMessage::new(
        MsgType::LeftRoom,
        Value::Null,
        Some(request_id),
    ));
}

fn require_room(session: &Session, request_id: &str) -> Option<Arc<GameRoom>> {
    match session.room.as_ref() {
        Some(room) => Some(Arc::clone(room)),
        None => {
            session.send_error(AppError::NotInGame, Some(request_id.to_owned()));
            None
        }
    }
}

fn cleanup_if_closed(server: &GameServer, session: &mut Session) {
    if session.room.as_ref().is_some_and(|room| room.is_closed()) {
        if let Some(room) = session.room.take() {
            server.remove_room(&room);
        }
    }
}
