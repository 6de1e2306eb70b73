//! The chat hub.
//!
//! `Hub` owns the session registry, room directory, rate limiter, history
//! and router, and turns inbound client events into deliveries. Each method
//! handles one event as an independent unit of work.

use crate::error::HubError;
use crate::history::{HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
use crate::liveness::{LivenessMonitor, DEFAULT_HEARTBEAT_INTERVAL};
use crate::message::{self, now_millis};
use crate::presence::{room_notice, PresenceNotifier};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::room::{RoomDirectory, RoomStats, DEFAULT_ROOM};
use crate::router::BroadcastRouter;
use crate::session::{Outbox, Session, SessionRegistry, DEFAULT_NAME_PREFIX};
use crate::validate::{
    validate_room_name, validate_with_limit, MAX_MESSAGE_CHARS, MAX_ROOM_NAME_CHARS,
};
use chathub_protocol::{ChatMessage, ClientEvent, DirectPayload, ServerEvent};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Room every session starts in.
    pub default_room: String,
    /// Prefix of generated display names.
    pub name_prefix: String,
    /// Messages kept per room.
    pub history_capacity: usize,
    /// Maximum message length in characters.
    pub max_message_chars: usize,
    /// Maximum room name length in characters.
    pub max_room_name_chars: usize,
    /// Per-session admission limits.
    pub rate_limit: RateLimitConfig,
    /// Probe interval. Zero disables probing.
    pub heartbeat_interval: Duration,
    /// Close sessions silent for longer than this.
    pub heartbeat_timeout: Option<Duration>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            default_room: DEFAULT_ROOM.to_string(),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_message_chars: MAX_MESSAGE_CHARS,
            max_room_name_chars: MAX_ROOM_NAME_CHARS,
            rate_limit: RateLimitConfig::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_timeout: None,
        }
    }
}

/// Snapshot of hub state.
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    /// Connected sessions.
    pub sessions: usize,
    /// Display names, in connection order.
    pub online: Vec<String>,
    /// Member counts per room.
    pub rooms: Vec<RoomStats>,
}

/// The session/room/message broker.
pub struct Hub {
    config: HubConfig,
    sessions: Arc<SessionRegistry>,
    rooms: Arc<RoomDirectory>,
    router: Arc<BroadcastRouter>,
    presence: PresenceNotifier,
    limiter: RateLimiter,
    history: HistoryBuffer,
    liveness: LivenessMonitor,
}

impl Hub {
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        info!("Creating hub with config: {:?}", config);
        let sessions = Arc::new(SessionRegistry::new(config.name_prefix.clone()));
        let rooms = Arc::new(RoomDirectory::new(config.default_room.clone()));
        let router = Arc::new(BroadcastRouter::new(
            Arc::clone(&sessions),
            Arc::clone(&rooms),
        ));
        let presence = PresenceNotifier::new(Arc::clone(&sessions), Arc::clone(&router));

        Self {
            limiter: RateLimiter::new(config.rate_limit),
            history: HistoryBuffer::new(config.history_capacity),
            liveness: LivenessMonitor::new(config.heartbeat_interval, config.heartbeat_timeout),
            sessions,
            rooms,
            router,
            presence,
            config,
        }
    }

    /// Register a new connection.
    ///
    /// The session joins the default room, receives that room's history,
    /// and everyone else hears about it. Starts the session's heartbeat, so
    /// this must run inside a Tokio runtime when probing is enabled.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateSession` if the connection id is already registered.
    pub fn connect(&self, connection_id: &str, outbox: Outbox) -> Result<Session, HubError> {
        let session = self
            .sessions
            .register(connection_id, &self.config.default_room, outbox.clone())?;
        self.rooms.join(&session.id, &session.room);

        if let Some(state) = self.sessions.liveness(&session.id) {
            if let Some(handle) = self.liveness.start(session.id.clone(), outbox, state) {
                self.sessions.attach_heartbeat(&session.id, handle);
            }
        }

        self.router.send_to(
            &session.id,
            ServerEvent::History(self.history.snapshot(&session.room)),
        );
        self.presence.announce_joined(&session);

        info!(
            session = %session.id,
            name = %session.name,
            room = %session.room,
            "Session connected"
        );
        Ok(session)
    }

    /// Tear down a connection. Unknown ids are a no-op.
    pub fn disconnect(&self, connection_id: &str) -> Option<Session> {
        self.rooms.remove_session(connection_id);
        // A send racing the disconnect may have admitted after lookup.
        self.limiter.forget(connection_id);
        let session = self.sessions.unregister(connection_id)?;
        self.presence.announce_left(&session);

        info!(session = %session.id, name = %session.name, "Session disconnected");
        Some(session)
    }

    /// Dispatch a client event.
    ///
    /// User-visible failures are reported to the session as `loi` before
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying operation.
    pub fn handle(&self, session_id: &str, event: ClientEvent) -> Result<(), HubError> {
        let name = event.name();
        let result = match event {
            ClientEvent::SendMessage(payload) => {
                self.send_message(session_id, payload.as_ref()).map(drop)
            }
            ClientEvent::SendDirect(DirectPayload { to, body }) => {
                self.send_direct(session_id, &to, body.as_ref()).map(drop)
            }
            ClientEvent::JoinRoom(room) => self.join_room(session_id, &room).map(drop),
            ClientEvent::Typing => self.typing(session_id),
            ClientEvent::PongCheck(echoed) => self.pong(session_id, echoed).map(drop),
        };

        if let Err(err) = &result {
            if err.is_user_visible() {
                self.router
                    .send_to(session_id, ServerEvent::Error(err.to_string()));
            }
            debug!(session = %session_id, event = name, error = %err, "Event rejected");
        }
        result
    }

    /// Broadcast a message to the sender's room.
    ///
    /// # Errors
    ///
    /// See [`Hub::send_message_at`].
    pub fn send_message(
        &self,
        session_id: &str,
        payload: Option<&Value>,
    ) -> Result<ChatMessage, HubError> {
        self.send_message_at(session_id, payload, now_millis())
    }

    /// Broadcast a message to the sender's room at time `now` (ms).
    ///
    /// Validates, then admits, then records the message in the room's
    /// history and delivers it to every member including the sender.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMessage`, `RateLimited` or `UnknownSession`; nothing
    /// is stored or delivered in those cases.
    pub fn send_message_at(
        &self,
        session_id: &str,
        payload: Option<&Value>,
        now: u64,
    ) -> Result<ChatMessage, HubError> {
        let session = self.session(session_id)?;
        let text = validate_with_limit(payload, self.config.max_message_chars)?;
        if !self.limiter.admit(session_id, now).is_allowed() {
            return Err(HubError::RateLimited);
        }

        let message = message::broadcast(&session.name, text, &session.room);
        self.history.append(&session.room, message.clone());
        let recipients = self
            .router
            .broadcast_to_room(&session.room, ServerEvent::Message(message.clone()));

        debug!(
            session = %session_id,
            room = %session.room,
            recipients,
            "Message broadcast"
        );
        Ok(message)
    }

    /// Send a direct message by display name.
    ///
    /// # Errors
    ///
    /// See [`Hub::send_direct_at`].
    pub fn send_direct(
        &self,
        session_id: &str,
        recipient: &str,
        payload: Option<&Value>,
    ) -> Result<ChatMessage, HubError> {
        self.send_direct_at(session_id, recipient, payload, now_millis())
    }

    /// Send a direct message by display name at time `now` (ms).
    ///
    /// The recipient gets the message and the sender gets an echo. Direct
    /// messages share the sender's rate-limit budget and are not kept in
    /// history.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMessage`, `RateLimited`, `RecipientNotFound` or
    /// `UnknownSession`; nothing is delivered in those cases.
    pub fn send_direct_at(
        &self,
        session_id: &str,
        recipient: &str,
        payload: Option<&Value>,
        now: u64,
    ) -> Result<ChatMessage, HubError> {
        let session = self.session(session_id)?;
        let text = validate_with_limit(payload, self.config.max_message_chars)?;
        if !self.limiter.admit(session_id, now).is_allowed() {
            return Err(HubError::RateLimited);
        }

        let message = message::direct(&session.name, text);
        self.router
            .send_direct(session_id, recipient, ServerEvent::Message(message.clone()))?;

        debug!(
            session = %session_id,
            from = %session.name,
            recipient = %recipient,
            "Direct message"
        );
        Ok(message)
    }

    /// Move a session to another room.
    ///
    /// The session gets a confirmation notice and the new room's history.
    /// Returns the room name as stored (trimmed).
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoom` or `UnknownSession`.
    pub fn join_room(&self, session_id: &str, room: &str) -> Result<String, HubError> {
        let room = validate_room_name(room, self.config.max_room_name_chars)
            .map_err(HubError::InvalidRoom)?;
        self.session(session_id)?;

        let previous = self.rooms.join(session_id, room);
        self.sessions.set_room(session_id, room);

        self.router
            .send_to(session_id, ServerEvent::Notice(room_notice(room)));
        self.router
            .send_to(session_id, ServerEvent::History(self.history.snapshot(room)));

        info!(session = %session_id, room = %room, previous = ?previous, "Room changed");
        Ok(room.to_string())
    }

    /// Tell the sender's room that the sender is typing.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession`.
    pub fn typing(&self, session_id: &str) -> Result<(), HubError> {
        let session = self.session(session_id)?;
        self.router.broadcast_to_room_except(
            &session.room,
            ServerEvent::Typing(session.name),
            Some(session_id),
        );
        Ok(())
    }

    /// Record a heartbeat echo and return the latency in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession`.
    pub fn pong(&self, session_id: &str, echoed: u64) -> Result<u64, HubError> {
        self.pong_at(session_id, echoed, now_millis())
    }

    /// Record a heartbeat echo received at `now` (ms).
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession`.
    pub fn pong_at(&self, session_id: &str, echoed: u64, now: u64) -> Result<u64, HubError> {
        let state = self
            .sessions
            .liveness(session_id)
            .ok_or_else(|| HubError::UnknownSession(session_id.to_string()))?;
        let latency = state.record_echo(echoed, now);
        debug!(session = %session_id, latency_ms = latency, "Heartbeat echo");
        Ok(latency)
    }

    /// Send an operator announcement to every session as `thong-bao`.
    ///
    /// The text goes through the same checks as a chat message. Returns the
    /// number of sessions reached.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMessage` if the text is blank or too long.
    pub fn announce(&self, text: &str) -> Result<usize, HubError> {
        let payload = Value::String(text.to_string());
        let text = validate_with_limit(Some(&payload), self.config.max_message_chars)?;
        let recipients = self
            .router
            .broadcast_all(ServerEvent::Notice(text.trim().to_string()));

        info!(recipients, "Announcement sent");
        Ok(recipients)
    }

    /// Queue an event for one session, e.g. a `loi` for an undecodable frame.
    pub fn send_to(&self, session_id: &str, event: ServerEvent) -> bool {
        self.router.send_to(session_id, event)
    }

    /// Look up a session.
    #[must_use]
    pub fn lookup(&self, session_id: &str) -> Option<Session> {
        self.sessions.lookup(session_id)
    }

    /// Recent messages of a room, oldest first.
    #[must_use]
    pub fn history(&self, room: &str) -> Vec<ChatMessage> {
        self.history.snapshot(room)
    }

    /// Members of a room.
    #[must_use]
    pub fn members(&self, room: &str) -> Vec<String> {
        let mut members: Vec<_> = self.rooms.members(room).into_iter().collect();
        members.sort();
        members
    }

    /// Latest heartbeat latency of a session.
    #[must_use]
    pub fn latency(&self, session_id: &str) -> Option<u64> {
        self.sessions
            .liveness(session_id)
            .and_then(|state| state.last_latency())
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.room_count()
    }

    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            sessions: self.sessions.len(),
            online: self.sessions.display_names(),
            rooms: self.rooms.stats(),
        }
    }

    fn session(&self, session_id: &str) -> Result<Session, HubError> {
        self.sessions
            .lookup(session_id)
            .ok_or_else(|| HubError::UnknownSession(session_id.to_string()))
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}
