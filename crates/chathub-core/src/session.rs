//! Session registry.
//!
//! Maps connection identifiers to session state and owns each session's
//! outbound queue and heartbeat handle. Display names are unique among
//! registered sessions.

use crate::liveness::{HeartbeatHandle, LivenessState};
use crate::message::now_millis;
use chathub_protocol::ServerEvent;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A session identifier (the transport's connection id).
pub type SessionId = String;

/// Default display name prefix.
pub const DEFAULT_NAME_PREFIX: &str = "NguoiDung_";

/// Number of connection-id characters used in a display name.
pub const NAME_ID_CHARS: usize = 8;

/// Items queued for a session's writer.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// An event to deliver. Shared between recipients of a broadcast.
    Event(Arc<ServerEvent>),
    /// The hub wants this connection closed.
    Close,
}

/// Sending half of a session's outbound queue.
pub type Outbox = mpsc::UnboundedSender<Outbound>;

/// Create an outbound queue for a new connection.
#[must_use]
pub fn outbox() -> (Outbox, mpsc::UnboundedReceiver<Outbound>) {
    mpsc::unbounded_channel()
}

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The connection id is already registered.
    #[error("Session already registered: {0}")]
    AlreadyRegistered(SessionId),
}

/// Delivery errors for a single recipient.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// No such session.
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    /// The session's writer has gone away.
    #[error("Outbox closed for session: {0}")]
    Closed(SessionId),
}

/// Public view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Connection identifier.
    pub id: SessionId,
    /// Display name, fixed for the session's lifetime.
    pub name: String,
    /// Current room.
    pub room: String,
    /// Registration time in milliseconds since the Unix epoch.
    pub created_at: u64,
}

struct SessionEntry {
    session: Session,
    seq: u64,
    outbox: Outbox,
    liveness: Arc<LivenessState>,
    heartbeat: Option<HeartbeatHandle>,
}

/// Derive the base display name for a connection id.
#[must_use]
pub fn derive_display_name(prefix: &str, connection_id: &str) -> String {
    let slice: String = connection_id.chars().take(NAME_ID_CHARS).collect();
    format!("{prefix}{slice}")
}

/// The session registry.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionEntry>,
    /// Display name -> session id.
    names: DashMap<String, SessionId>,
    next_seq: AtomicU64,
    name_prefix: String,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            sessions: DashMap::new(),
            names: DashMap::new(),
            next_seq: AtomicU64::new(0),
            name_prefix: name_prefix.into(),
        }
    }

    /// Register a connection in `room`.
    ///
    /// The display name is derived from the connection id. If another live
    /// session already holds it, `_2`, `_3`, ... is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection id is already registered.
    pub fn register(
        &self,
        connection_id: &str,
        room: &str,
        outbox: Outbox,
    ) -> Result<Session, RegistryError> {
        let slot = match self.sessions.entry(connection_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(RegistryError::AlreadyRegistered(connection_id.to_string()))
            }
            Entry::Vacant(slot) => slot,
        };

        let name = self.claim_name(connection_id);
        let session = Session {
            id: connection_id.to_string(),
            name,
            room: room.to_string(),
            created_at: now_millis(),
        };

        slot.insert(SessionEntry {
            session: session.clone(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            outbox,
            liveness: Arc::new(LivenessState::new()),
            heartbeat: None,
        });

        debug!(session = %connection_id, name = %session.name, "Session registered");
        Ok(session)
    }

    fn claim_name(&self, connection_id: &str) -> String {
        let base = derive_display_name(&self.name_prefix, connection_id);
        let mut suffix = 1u32;
        loop {
            let candidate = if suffix == 1 {
                base.clone()
            } else {
                format!("{base}_{suffix}")
            };
            if let Entry::Vacant(slot) = self.names.entry(candidate.clone()) {
                slot.insert(connection_id.to_string());
                if suffix > 1 {
                    warn!(
                        session = %connection_id,
                        name = %candidate,
                        "Display name taken, using suffix"
                    );
                }
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Look up a session.
    #[must_use]
    pub fn lookup(&self, connection_id: &str) -> Option<Session> {
        self.sessions.get(connection_id).map(|e| e.session.clone())
    }

    /// Remove a session. Unknown ids are a no-op.
    ///
    /// Dropping the entry cancels its heartbeat.
    pub fn unregister(&self, connection_id: &str) -> Option<Session> {
        let (_, entry) = self.sessions.remove(connection_id)?;
        self.names
            .remove_if(&entry.session.name, |_, id| id == connection_id);
        debug!(session = %connection_id, name = %entry.session.name, "Session unregistered");
        Some(entry.session)
    }

    /// Record a room change.
    pub fn set_room(&self, connection_id: &str, room: &str) -> bool {
        match self.sessions.get_mut(connection_id) {
            Some(mut entry) => {
                entry.session.room = room.to_string();
                true
            }
            None => false,
        }
    }

    /// Attach a heartbeat to a session. Dropped immediately if the session is gone.
    pub fn attach_heartbeat(&self, connection_id: &str, handle: HeartbeatHandle) {
        if let Some(mut entry) = self.sessions.get_mut(connection_id) {
            entry.heartbeat = Some(handle);
        }
    }

    /// Liveness state of a session.
    #[must_use]
    pub fn liveness(&self, connection_id: &str) -> Option<Arc<LivenessState>> {
        self.sessions
            .get(connection_id)
            .map(|e| Arc::clone(&e.liveness))
    }

    /// Resolve a display name to a live session id.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<SessionId> {
        self.names.get(name).map(|id| id.clone())
    }

    /// Queue an event for one session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is unknown or its writer is gone.
    pub fn deliver(
        &self,
        connection_id: &str,
        event: Arc<ServerEvent>,
    ) -> Result<(), DeliveryError> {
        let entry = self
            .sessions
            .get(connection_id)
            .ok_or_else(|| DeliveryError::UnknownSession(connection_id.to_string()))?;
        entry
            .outbox
            .send(Outbound::Event(event))
            .map_err(|_| DeliveryError::Closed(connection_id.to_string()))
    }

    /// Ids of all registered sessions.
    #[must_use]
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Display names of all registered sessions, in registration order.
    #[must_use]
    pub fn display_names(&self) -> Vec<String> {
        let mut named: Vec<(u64, String)> = self
            .sessions
            .iter()
            .map(|e| (e.seq, e.session.name.clone()))
            .collect();
        named.sort_unstable_by_key(|(seq, _)| *seq);
        named.into_iter().map(|(_, name)| name).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_derives_name() {
        let registry = SessionRegistry::default();
        let (tx, _rx) = outbox();

        let session = registry.register("3f2a9c1e77b0", "global", tx).unwrap();
        assert_eq!(session.name, "NguoiDung_3f2a9c1e");
        assert_eq!(session.room, "global");
        assert_eq!(registry.lookup("3f2a9c1e77b0"), Some(session));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = SessionRegistry::default();
        let (tx, _rx) = outbox();

        registry.register("abc", "global", tx.clone()).unwrap();
        assert!(matches!(
            registry.register("abc", "global", tx),
            Err(RegistryError::AlreadyRegistered(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_name_collision_gets_suffix() {
        let registry = SessionRegistry::default();
        let (tx, _rx) = outbox();

        let a = registry.register("abcdefgh-1", "global", tx.clone()).unwrap();
        let b = registry.register("abcdefgh-2", "global", tx.clone()).unwrap();
        let c = registry.register("abcdefgh-3", "global", tx).unwrap();

        assert_eq!(a.name, "NguoiDung_abcdefgh");
        assert_eq!(b.name, "NguoiDung_abcdefgh_2");
        assert_eq!(c.name, "NguoiDung_abcdefgh_3");
        assert_eq!(
            registry.find_by_name("NguoiDung_abcdefgh_2").as_deref(),
            Some("abcdefgh-2")
        );
    }

    #[test]
    fn test_unregister_frees_name_and_is_idempotent() {
        let registry = SessionRegistry::default();
        let (tx, _rx) = outbox();

        let session = registry.register("abc", "global", tx).unwrap();
        assert_eq!(registry.unregister("abc"), Some(session.clone()));
        assert_eq!(registry.unregister("abc"), None);
        assert!(registry.find_by_name(&session.name).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_display_names_in_registration_order() {
        let registry = SessionRegistry::new("U_");
        let (tx, _rx) = outbox();

        for id in ["zz", "aa", "mm"] {
            registry.register(id, "global", tx.clone()).unwrap();
        }
        assert_eq!(registry.display_names(), vec!["U_zz", "U_aa", "U_mm"]);
    }

    #[test]
    fn test_deliver_reports_closed_outbox() {
        let registry = SessionRegistry::default();
        let (tx, rx) = outbox();
        registry.register("abc", "global", tx).unwrap();

        let event = Arc::new(ServerEvent::Notice("hi".to_string()));
        assert!(registry.deliver("abc", Arc::clone(&event)).is_ok());

        drop(rx);
        assert!(matches!(
            registry.deliver("abc", Arc::clone(&event)),
            Err(DeliveryError::Closed(_))
        ));
        assert!(matches!(
            registry.deliver("nobody", event),
            Err(DeliveryError::UnknownSession(_))
        ));
    }
}
