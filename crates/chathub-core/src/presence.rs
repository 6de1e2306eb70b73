//! Presence notices.
//!
//! Joined/left notices go to every other session; the online list goes to
//! everyone. Both are built from the registry after the triggering mutation.

use crate::router::BroadcastRouter;
use crate::session::{Session, SessionRegistry};
use chathub_protocol::ServerEvent;
use std::sync::Arc;
use tracing::debug;

/// Emits presence events through the router.
pub struct PresenceNotifier {
    sessions: Arc<SessionRegistry>,
    router: Arc<BroadcastRouter>,
}

impl PresenceNotifier {
    #[must_use]
    pub fn new(sessions: Arc<SessionRegistry>, router: Arc<BroadcastRouter>) -> Self {
        Self { sessions, router }
    }

    /// Announce a newly registered session.
    pub fn announce_joined(&self, session: &Session) {
        self.router.broadcast_all_except(
            ServerEvent::Notice(joined_notice(&session.name)),
            Some(&session.id),
        );
        self.publish_online_list();
        debug!(session = %session.id, name = %session.name, "Presence: joined");
    }

    /// Announce a session that has been unregistered.
    pub fn announce_left(&self, session: &Session) {
        self.router
            .broadcast_all(ServerEvent::Notice(left_notice(&session.name)));
        self.publish_online_list();
        debug!(session = %session.id, name = %session.name, "Presence: left");
    }

    /// Send the current online list to every session.
    pub fn publish_online_list(&self) -> usize {
        let names = self.sessions.display_names();
        self.router.broadcast_all(ServerEvent::OnlineList(names))
    }
}

/// Notice text for a session that connected.
#[must_use]
pub fn joined_notice(name: &str) -> String {
    format!("{name} joined the chat")
}

/// Notice text for a session that disconnected.
#[must_use]
pub fn left_notice(name: &str) -> String {
    format!("{name} left the chat")
}

/// Notice text confirming a room change.
#[must_use]
pub fn room_notice(room: &str) -> String {
    format!("You joined room {room}")
}
