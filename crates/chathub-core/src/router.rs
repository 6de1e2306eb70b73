//! Broadcast router.
//!
//! Resolves recipients through the room directory or the session registry
//! and queues events on their outboxes. A failed delivery to one recipient
//! is logged and skipped; it never stops delivery to the rest.

use crate::room::RoomDirectory;
use crate::session::SessionRegistry;
use chathub_protocol::ServerEvent;
use std::sync::Arc;
use thiserror::Error;
use tracing::{trace, warn};

/// Routing errors.
#[derive(Debug, Error)]
pub enum RouteError {
    /// No live session has this display name.
    #[error("recipient not found: {0}")]
    RecipientNotFound(String),
}

/// Delivers events to rooms, to every session, or to single sessions.
pub struct BroadcastRouter {
    sessions: Arc<SessionRegistry>,
    rooms: Arc<RoomDirectory>,
}

impl BroadcastRouter {
    #[must_use]
    pub fn new(sessions: Arc<SessionRegistry>, rooms: Arc<RoomDirectory>) -> Self {
        Self { sessions, rooms }
    }

    /// Deliver to every member of `room`.
    ///
    /// Returns the number of sessions the event was queued for.
    pub fn broadcast_to_room(&self, room: &str, event: ServerEvent) -> usize {
        self.broadcast_to_room_except(room, event, None)
    }

    /// Deliver to every member of `room` except `skip`.
    pub fn broadcast_to_room_except(
        &self,
        room: &str,
        event: ServerEvent,
        skip: Option<&str>,
    ) -> usize {
        let members = self.rooms.members(room);
        let event = Arc::new(event);
        let delivered = members
            .iter()
            .filter(|id| Some(id.as_str()) != skip)
            .filter(|id| self.deliver(id, &event))
            .count();
        trace!(room = %room, event = event.name(), recipients = delivered, "Broadcast to room");
        delivered
    }

    /// Deliver to every registered session.
    pub fn broadcast_all(&self, event: ServerEvent) -> usize {
        self.broadcast_all_except(event, None)
    }

    /// Deliver to every registered session except `skip`.
    pub fn broadcast_all_except(&self, event: ServerEvent, skip: Option<&str>) -> usize {
        let event = Arc::new(event);
        self.sessions
            .ids()
            .iter()
            .filter(|id| Some(id.as_str()) != skip)
            .filter(|id| self.deliver(id, &event))
            .count()
    }

    /// Deliver to the session named `recipient` and echo to `sender`.
    ///
    /// # Errors
    ///
    /// Returns an error, without delivering anything, if no live session
    /// has that display name.
    pub fn send_direct(
        &self,
        sender: &str,
        recipient: &str,
        event: ServerEvent,
    ) -> Result<usize, RouteError> {
        let recipient_id = self
            .sessions
            .find_by_name(recipient)
            .ok_or_else(|| RouteError::RecipientNotFound(recipient.to_string()))?;

        let event = Arc::new(event);
        let mut delivered = usize::from(self.deliver(&recipient_id, &event));
        if recipient_id != sender {
            delivered += usize::from(self.deliver(sender, &event));
        }
        trace!(session = %sender, recipient = %recipient, "Direct message routed");
        Ok(delivered)
    }

    /// Deliver to one session.
    pub fn send_to(&self, session_id: &str, event: ServerEvent) -> bool {
        self.deliver(session_id, &Arc::new(event))
    }

    fn deliver(&self, session_id: &str, event: &Arc<ServerEvent>) -> bool {
        match self.sessions.deliver(session_id, Arc::clone(event)) {
            Ok(()) => true,
            Err(e) => {
                warn!(session = %session_id, event = event.name(), error = %e, "Delivery skipped");
                false
            }
        }
    }
}
