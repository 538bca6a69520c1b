//! Game rooms: the unit of concurrent coordination.
//!
//! A room owns exactly one engine, at most two player slots, and the set of
//! connections observing the game. All mutation happens under the room's
//! write lock; broadcasts are serialized once and fanned out to unbounded
//! per-connection channels, so no await point sits inside a critical
//! section. The AI searches a clone of the engine off-lock and its move is
//! re-validated against the room status before it is applied.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use axum::extract::ws::Message;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use flipflop_engine::{
    ai_display_name, AiDifficulty, BaseMove, CancelToken, FlipFlop, FlipFlopAi, MoveHistoryEntry,
    PlayerSide,
};
use shared::protocol::{GameMode, GameType, MsgType, OutgoingMessage};
use shared::AppError;

use crate::config;

/// Room lifecycle. `Closed` is terminal: nothing transitions out of it and
/// the hub drops closed rooms from its directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoomStatus {
    #[serde(rename = "waiting_for_players")]
    WaitingForPlayers,
    #[serde(rename = "ongoing")]
    Ongoing,
    #[serde(rename = "ended")]
    Ended,
    #[serde(rename = "closed")]
    Closed,
}

/// A player seat. Slots persist for the lifetime of the room; disconnection
/// only flips `is_active` so the player can reclaim the seat by id.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSlot {
    pub id: String,
    pub username: String,
    pub color: PlayerSide,
    pub is_ai: bool,
    pub is_active: bool,
    #[serde(skip)]
    pub wants_rematch: bool,
}

/// A registered connection and the channel feeding its writer task.
#[derive(Debug, Clone)]
pub struct ClientConn {
    pub id: String,
    pub username: String,
    pub is_spectator: bool,
    sender: UnboundedSender<Message>,
}

/// Snapshot of the game sent in `start`, `joined` and `game_state` payloads.
#[derive(Debug, Clone, Serialize)]
pub struct GameState {
    pub board: String,
    pub current_turn: PlayerSide,
    pub status: RoomStatus,
    #[serde(with = "flipflop_engine::types::winner_repr")]
    pub winner: Option<PlayerSide>,
    pub players: Vec<PlayerSlot>,
    pub move_history: Vec<MoveHistoryEntry>,
}

/// A stored chat message.
#[derive(Debug, Clone, Serialize)]
pub struct SavedMessage {
    pub client_id: String,
    pub username: String,
    pub message: String,
}

pub struct RoomConfig {
    pub id: String,
    pub game_mode: GameMode,
    pub game_type: GameType,
    pub ai_difficulty: AiDifficulty,
}

pub struct InitialPlayer {
    pub client_id: String,
    pub username: String,
    pub sender: UnboundedSender<Message>,
}

struct RoomInner {
    game: FlipFlop,
    player1: Option<PlayerSlot>,
    player2: Option<PlayerSlot>,
    conns: HashMap<String, ClientConn>,
    status: RoomStatus,
    ai_thinking: bool,
    ai_cancel: Option<CancelToken>,
    player_messages: Vec<SavedMessage>,
    spectator_messages: Vec<SavedMessage>,
}

pub struct GameRoom {
    pub id: String,
    pub game_mode: GameMode,
    pub game_type: GameType,
    ai: Option<FlipFlopAi>,
    // Handle to the owning Arc, for the background tasks the room spawns
    // (AI turns, the AI's delayed rematch vote).
    weak_self: Weak<GameRoom>,
    inner: RwLock<RoomInner>,
}

impl GameRoom {
    /// Build a room with the first player seated as White. Single-player
    /// rooms also seat the AI as Black, active from the start.
    pub fn new(config: RoomConfig, player: InitialPlayer) -> Arc<GameRoom> {
        let game = FlipFlop::new(config.game_type.kind());

        let player1 = PlayerSlot {
            id: player.client_id.clone(),
            username: player.username.clone(),
            color: PlayerSide::White,
            is_ai: false,
            is_active: true,
            wants_rematch: false,
        };

        let mut conns = HashMap::new();
        conns.insert(
            player.client_id.clone(),
            ClientConn {
                id: player.client_id,
                username: player.username,
                is_spectator: false,
                sender: player.sender,
            },
        );

        let (ai, player2) = if config.game_mode == GameMode::Singleplayer {
            let slot = PlayerSlot {
                id: Uuid::new_v4().to_string(),
                username: ai_display_name(),
                color: PlayerSide::Black,
                is_ai: true,
                is_active: true,
                wants_rematch: false,
            };
            (Some(FlipFlopAi::new(config.ai_difficulty)), Some(slot))
        } else {
            (None, None)
        };

        Arc::new_cyclic(|weak_self| GameRoom {
            id: config.id,
            game_mode: config.game_mode,
            game_type: config.game_type,
            ai,
            weak_self: weak_self.clone(),
            inner: RwLock::new(RoomInner {
                game,
                player1: Some(player1),
                player2,
                conns,
                status: RoomStatus::WaitingForPlayers,
                ai_thinking: false,
                ai_cancel: None,
                player_messages: Vec::new(),
                spectator_messages: Vec::new(),
            }),
        })
    }

    /// Register a client. Returns whether they joined as a spectator.
    ///
    /// An id matching an inactive slot reclaims it and the rejoin is
    /// announced with the current state; new players take the first free
    /// slot (White, then Black) and anyone else spectates.
    pub fn enter_room(
        &self,
        client_id: &str,
        username: &str,
        sender: UnboundedSender<Message>,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.write();

        if inner.status == RoomStatus::Closed {
            return Err(AppError::RoomClosed);
        }

        if let Some(slot) = get_player_mut(&mut inner, client_id) {
            if slot.is_active {
                return Err(AppError::AlreadyInGame);
            }

            slot.is_active = true;
            let slot_username = slot.username.clone();
            inner.conns.insert(
                client_id.to_owned(),
                ClientConn {
                    id: client_id.to_owned(),
                    username: slot_username,
                    is_spectator: false,
                    sender,
                },
            );

            let state = game_state(&inner);
            broadcast(
                &inner,
                MsgType::PlayerRejoined,
                json!({
                    "player_id": client_id,
                    "game_state": state,
                }),
                Some(client_id),
            );
            return Ok(false);
        }

        // Single-player rooms have both seats taken at creation.
        if self.game_mode == GameMode::Singleplayer {
            return Err(AppError::RoomFull);
        }

        if username.is_empty() {
            return Err(AppError::UsernameRequired);
        }

        let mut conn = ClientConn {
            id: client_id.to_owned(),
            username: username.to_owned(),
            is_spectator: false,
            sender,
        };

        let free_slot = if inner.player1.is_none() {
            Some((PlayerSide::White, true))
        } else if inner.player2.is_none() {
            Some((PlayerSide::Black, false))
        } else {
            None
        };

        match free_slot {
            Some((color, is_first)) => {
                let slot = PlayerSlot {
                    id: client_id.to_owned(),
                    username: username.to_owned(),
                    color,
                    is_ai: false,
                    is_active: true,
                    wants_rematch: false,
                };
                if is_first {
                    inner.player1 = Some(slot);
                } else {
                    inner.player2 = Some(slot);
                }
                inner.conns.insert(client_id.to_owned(), conn);
                Ok(false)
            }
            None => {
                conn.is_spectator = true;
                inner.conns.insert(client_id.to_owned(), conn);
                Ok(true)
            }
        }
    }

    /// Drop a connection. A departing player deactivates their slot and
    /// withdraws any rematch vote; a single-player room closes outright,
    /// a multiplayer room closes once both slots are inactive.
    pub fn leave_room(&self, client_id: &str) {
        let mut inner = self.inner.write();

        inner.conns.remove(client_id);

        let Some(slot) = get_player_mut(&mut inner, client_id) else {
            return;
        };
        slot.is_active = false;
        slot.wants_rematch = false;

        broadcast(
            &inner,
            MsgType::RematchCancelled,
            json!({ "player_id": client_id }),
            Some(client_id),
        );
        broadcast(
            &inner,
            MsgType::PlayerLeft,
            json!({ "player_id": client_id }),
            None,
        );

        if self.game_mode == GameMode::Singleplayer {
            inner.status = RoomStatus::Closed;
            cancel_ai_computation(&mut inner);
            return;
        }

        if players_inactive(&inner) {
            inner.status = RoomStatus::Closed;

            if !inner.conns.is_empty() {
                broadcast(
                    &inner,
                    MsgType::GameEnd,
                    json!({ "reason": "players_left" }),
                    None,
                );
            }
        }
    }

    /// Move from `WaitingForPlayers` to `Ongoing` once both slots are
    /// active, announcing the initial state. A no-op in any other situation.
    pub fn start_game(&self) -> bool {
        let mut inner = self.inner.write();

        if inner.status != RoomStatus::WaitingForPlayers {
            return false;
        }

        let both_active = inner.player1.as_ref().is_some_and(|p| p.is_active)
            && inner.player2.as_ref().is_some_and(|p| p.is_active);
        if !both_active {
            return false;
        }

        inner.status = RoomStatus::Ongoing;
        let state = game_state(&inner);
        broadcast(&inner, MsgType::GameStart, state, None);
        true
    }

    /// Validate and apply a player's move, ack the mover, broadcast the
    /// move to everyone else, and handle the follow-up: terminal
    /// transition, or scheduling the AI's reply in single-player rooms.
    pub fn handle_move(
        &self,
        client_id: &str,
        request_id: &str,
        payload: Value,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write();

        validate_action_status(&inner)?;

        let Some(slot) = get_player(&inner, client_id).cloned() else {
            return Err(AppError::ClientNotFound);
        };

        if slot.color != inner.game.current_turn() {
            return Err(AppError::NotYourTurn);
        }

        let mv: BaseMove =
            serde_json::from_value(payload.clone()).map_err(|_| AppError::InvalidMessageFormat)?;
        inner.game.apply_move(&mv)?;

        tracing::debug!(room_id = %self.id, "\n{}", inner.game.render_board());

        if let Some(conn) = inner.conns.get(client_id) {
            send_to(conn, &OutgoingMessage::new(MsgType::Ack, Value::Null, Some(request_id.to_owned())));
        }

        broadcast(
            &inner,
            MsgType::Move,
            json!({
                "player_id": client_id,
                "color": slot.color,
                "move": payload,
                "board": inner.game.board_string(),
            }),
            Some(client_id),
        );

        if inner.game.is_game_ended() {
            match inner.game.winner() {
                Some(winner) => self.end_game(&mut inner, "normal", Some(winner)),
                None => self.end_game(&mut inner, "draw", None),
            }
            return Ok(());
        }

        if self.game_mode == GameMode::Singleplayer {
            self.schedule_ai_turn();
        }

        Ok(())
    }

    /// Concede the game; the opponent wins.
    pub fn handle_forfeit(&self, client_id: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write();

        validate_action_status(&inner)?;

        let Some(slot) = get_player(&inner, client_id) else {
            return Err(AppError::ClientNotFound);
        };

        let winner = slot.color.opponent();
        self.end_game(&mut inner, "forfeit", Some(winner));
        Ok(())
    }

    /// Relay a chat message to the sender's channel (players talk to
    /// players, spectators to spectators) and record it in that channel's
    /// history.
    pub fn handle_chat(
        &self,
        client_id: &str,
        request_id: &str,
        message: &str,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write();

        if inner.status == RoomStatus::Closed {
            return Err(AppError::RoomClosed);
        }

        let Some(sender) = inner.conns.get(client_id).cloned() else {
            return Err(AppError::ClientNotFound);
        };

        if message.is_empty() {
            return Ok(());
        }

        send_to(
            &sender,
            &OutgoingMessage::new(MsgType::Ack, Value::Null, Some(request_id.to_owned())),
        );

        let chat = OutgoingMessage::new(
            MsgType::Chat,
            json!({
                "client_id": client_id,
                "username": sender.username,
                "message": message,
            }),
            None,
        );
        match chat.to_text() {
            Ok(text) => {
                for conn in inner.conns.values() {
                    if conn.id == client_id || conn.is_spectator != sender.is_spectator {
                        continue;
                    }
                    if conn.sender.send(Message::Text(text.clone())).is_err() {
                        tracing::error!(client_id = %conn.id, "failed to send chat message");
                    }
                }
            }
            Err(err) => tracing::error!(error = %err, "failed to encode chat message"),
        }

        let saved = SavedMessage {
            client_id: client_id.to_owned(),
            username: sender.username.clone(),
            message: message.to_owned(),
        };
        if sender.is_spectator {
            inner.spectator_messages.push(saved);
        } else {
            inner.player_messages.push(saved);
        }

        Ok(())
    }

    /// Vote for a rematch. When both seats agree the engine is rebuilt and
    /// the room goes straight back to `Ongoing`.
    pub fn request_rematch(&self, client_id: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write();

        if inner.status != RoomStatus::Ended {
            return Err(AppError::GameNotEnded);
        }

        let Some(slot) = get_player_mut(&mut inner, client_id) else {
            return Err(AppError::UnauthorizedAction);
        };
        slot.wants_rematch = true;

        let both_agree = inner.player1.as_ref().is_some_and(|p| p.wants_rematch)
            && inner.player2.as_ref().is_some_and(|p| p.wants_rematch);

        if both_agree {
            inner.game = FlipFlop::new(self.game_type.kind());
            inner.status = RoomStatus::Ongoing;
            if let Some(p) = inner.player1.as_mut() {
                p.wants_rematch = false;
            }
            if let Some(p) = inner.player2.as_mut() {
                p.wants_rematch = false;
            }

            let state = game_state(&inner);
            broadcast(&inner, MsgType::GameStart, state, None);
        } else {
            broadcast(
                &inner,
                MsgType::RematchRequested,
                json!({ "player_id": client_id }),
                Some(client_id),
            );
        }

        Ok(())
    }

    /// Withdraw a rematch vote.
    pub fn cancel_rematch(&self, client_id: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write();

        let Some(slot) = get_player_mut(&mut inner, client_id) else {
            return Err(AppError::UnauthorizedAction);
        };
        slot.wants_rematch = false;

        broadcast(
            &inner,
            MsgType::RematchCancelled,
            json!({ "player_id": client_id }),
            Some(client_id),
        );
        Ok(())
    }

    pub fn game_state(&self) -> GameState {
        game_state(&self.inner.read())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.read().status == RoomStatus::Closed
    }

    pub fn status(&self) -> RoomStatus {
        self.inner.read().status
    }

    /// The trailing chat history of one channel.
    pub fn get_messages(&self, spectator: bool) -> Vec<SavedMessage> {
        let inner = self.inner.read();
        let messages = if spectator {
            &inner.spectator_messages
        } else {
            &inner.player_messages
        };

        let skip = messages.len().saturating_sub(config::CHAT_HISTORY_LIMIT);
        messages[skip..].to_vec()
    }

    /// End the current game and notify the room. Requires the write lock.
    fn end_game(&self, inner: &mut RoomInner, reason: &str, winner: Option<PlayerSide>) {
        inner.status = RoomStatus::Ended;

        let mut payload = json!({ "reason": reason });
        if let Some(winner) = winner {
            payload["winner"] = json!(winner);
        }
        broadcast(inner, MsgType::GameEnd, payload, None);

        if self.game_mode == GameMode::Singleplayer {
            if inner.ai_thinking {
                cancel_ai_computation(inner);
            }

            // The AI is always up for another round.
            if let (Some(room), Some(ai_id)) = (
                self.weak_self.upgrade(),
                inner.player2.as_ref().map(|p| p.id.clone()),
            ) {
                tokio::spawn(async move {
                    tokio::time::sleep(config::AI_REMATCH_DELAY).await;
                    if let Err(err) = room.request_rematch(&ai_id) {
                        tracing::debug!(error = %err, "AI rematch request not accepted");
                    }
                });
            }
        }
    }

    fn schedule_ai_turn(&self) {
        let Some(room) = self.weak_self.upgrade() else {
            return;
        };
        tokio::spawn(async move { room.run_ai_turn().await });
    }

    /// One AI turn: think delay, validation, off-lock search on an engine
    /// clone bounded by a cancel token, then re-validation and apply.
    async fn run_ai_turn(&self) {
        tokio::time::sleep(config::AI_MOVE_DELAY).await;

        let Some(ai) = self.ai.clone() else {
            tracing::error!(room_id = %self.id, "AI not initialized for this room");
            return;
        };

        let (mut game, token, ai_slot) = {
            let mut inner = self.inner.write();

            if validate_action_status(&inner).is_err() {
                return;
            }

            let Some(slot) = inner.player2.clone() else {
                return;
            };
            if slot.color != inner.game.current_turn() {
                return;
            }

            let token = CancelToken::new();
            inner.ai_thinking = true;
            inner.ai_cancel = Some(token.clone());
            (inner.game.clone(), token, slot)
        };

        // Bound the search; the token also gets cancelled by game end or
        // the human leaving.
        let watchdog = tokio::spawn({
            let token = token.clone();
            async move {
                tokio::time::sleep(config::AI_THINK_TIMEOUT).await;
                token.cancel();
            }
        });

        let search_token = token.clone();
        let ai_color = ai_slot.color;
        let result =
            tokio::task::spawn_blocking(move || ai.find_best_move(&mut game, ai_color, &search_token))
                .await;
        watchdog.abort();

        let mut inner = self.inner.write();
        inner.ai_thinking = false;
        inner.ai_cancel = None;

        // The game may have ended or the room closed while we were
        // searching; the result is discarded in that case.
        if inner.status != RoomStatus::Ongoing {
            return;
        }

        let best = match result {
            Ok(Ok(best)) => best,
            Ok(Err(err)) => {
                tracing::error!(error = %err, "AI failed to find a move");
                return;
            }
            Err(err) => {
                tracing::error!(error = %err, "AI search task failed");
                return;
            }
        };

        let Some(mv) = best else {
            // No legal reply: the AI forfeits and the human wins.
            self.end_game(&mut inner, "forfeit", Some(ai_color.opponent()));
            return;
        };

        if let Err(err) = inner.game.apply_move(&mv) {
            tracing::error!(error = %err, "AI move application failed");
            return;
        }

        tracing::debug!(room_id = %self.id, "\n{}", inner.game.render_board());

        broadcast(
            &inner,
            MsgType::Move,
            json!({
                "player_id": ai_slot.id,
                "color": ai_slot.color,
                "move": mv,
                "board": inner.game.board_string(),
            }),
            None,
        );

        if inner.game.is_game_ended() {
            match inner.game.winner() {
                Some(winner) => self.end_game(&mut inner, "normal", Some(winner)),
                None => self.end_game(&mut inner, "draw", None),
            }
        }
    }
}

/// Reject actions the room status does not allow.
fn validate_action_status(inner: &RoomInner) -> Result<(), AppError> {
    if inner.game.is_game_ended() || inner.status == RoomStatus::Ended {
        return Err(AppError::GameEnded);
    }
    if inner.status == RoomStatus::Closed {
        return Err(AppError::RoomClosed);
    }
    if inner.status != RoomStatus::Ongoing {
        return Err(AppError::GameNotStarted);
    }
    Ok(())
}

fn get_player<'a>(inner: &'a RoomInner, id: &str) -> Option<&'a PlayerSlot> {
    inner
        .player1
        .as_ref()
        .filter(|p| p.id == id)
        .or_else(|| inner.player2.as_ref().filter(|p| p.id == id))
}

fn get_player_mut<'a>(inner: &'a mut RoomInner, id: &str) -> Option<&'a mut PlayerSlot> {
    if inner.player1.as_ref().is_some_and(|p| p.id == id) {
        return inner.player1.as_mut();
    }
    if inner.player2.as_ref().is_some_and(|p| p.id == id) {
        return inner.player2.as_mut();
    }
    None
}

fn players_inactive(inner: &RoomInner) -> bool {
    !inner.player1.as_ref().is_some_and(|p| p.is_active)
        && !inner.player2.as_ref().is_some_and(|p| p.is_active)
}

fn cancel_ai_computation(inner: &mut RoomInner) {
    if let Some(token) = inner.ai_cancel.as_ref() {
        token.cancel();
    }
}

fn game_state(inner: &RoomInner) -> GameState {
    let players = [&inner.player1, &inner.player2]
        .into_iter()
        .filter_map(|slot| slot.clone())
        .collect();

    GameState {
        board: inner.game.board_string().to_owned(),
        current_turn: inner.game.current_turn(),
        status: inner.status,
        winner: inner.game.winner(),
        players,
        move_history: inner.game.move_history(),
    }
}

/// Serialize once, send to every connection except `skip_id`. Send failures
/// are logged and do not stop the fan-out.
fn broadcast(inner: &RoomInner, msg_type: MsgType, payload: impl Serialize, skip_id: Option<&str>) {
    let msg = OutgoingMessage::new(msg_type, payload, None);
    let text = match msg.to_text() {
        Ok(text) => text,
        Err(err) => {
            tracing::error!(error = %err, "failed to encode broadcast");
            return;
        }
    };

    for (id, conn) in inner.conns.iter() {
        if skip_id.is_some_and(|skip| skip == id.as_str()) {
            continue;
        }
        if conn.sender.send(Message::Text(text.clone())).is_err() {
            tracing::error!(client_id = %id, "failed to broadcast message");
        }
    }
}

fn send_to(conn: &ClientConn, msg: &OutgoingMessage) {
    match msg.to_text() {
        Ok(text) => {
            if conn.sender.send(Message::Text(text)).is_err() {
                tracing::error!(client_id = %conn.id, "failed to send message");
            }
        }
        Err(err) => tracing::error!(error = %err, "failed to encode message"),
    }
}
