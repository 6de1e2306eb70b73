//! Room directory.
//!
//! Rooms are named groups of sessions. A session is in exactly one room at a
//! time. Membership lives behind a single lock so a room switch is observed
//! by readers either entirely before or entirely after it happens.

use crate::session::SessionId;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Name of the room every session starts in.
pub const DEFAULT_ROOM: &str = "global";

#[derive(Debug, Default)]
struct RoomTable {
    /// Room name -> members.
    rooms: HashMap<String, HashSet<SessionId>>,
    /// Session -> current room.
    placement: HashMap<SessionId, String>,
}

/// Member count of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomStats {
    pub name: String,
    pub members: usize,
}

/// The room directory.
///
/// Rooms are created on first join and never removed.
#[derive(Debug)]
pub struct RoomDirectory {
    table: RwLock<RoomTable>,
}

impl RoomDirectory {
    /// Create a directory whose default room exists up front.
    #[must_use]
    pub fn new(default_room: impl Into<String>) -> Self {
        let mut table = RoomTable::default();
        table.rooms.insert(default_room.into(), HashSet::new());
        Self {
            table: RwLock::new(table),
        }
    }

    /// Move a session into `room`, leaving its previous room.
    ///
    /// Returns the previous room, if any.
    pub fn join(&self, session_id: &str, room: &str) -> Option<String> {
        let mut table = self.table.write();

        let previous = table
            .placement
            .insert(session_id.to_string(), room.to_string());
        if let Some(prev) = &previous {
            if let Some(members) = table.rooms.get_mut(prev) {
                members.remove(session_id);
            }
        }

        let created = !table.rooms.contains_key(room);
        table
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(session_id.to_string());

        if created {
            debug!(room = %room, "Created room");
        }
        debug!(session = %session_id, room = %room, previous = ?previous, "Joined room");
        previous
    }

    /// Remove a session from `room`. No-op if it is not a member.
    pub fn leave(&self, session_id: &str, room: &str) -> bool {
        let mut table = self.table.write();
        let removed = table
            .rooms
            .get_mut(room)
            .map(|members| members.remove(session_id))
            .unwrap_or(false);
        if removed {
            table.placement.remove(session_id);
        }
        removed
    }

    /// Remove a session from whatever room it is in.
    pub fn remove_session(&self, session_id: &str) -> Option<String> {
        let mut table = self.table.write();
        let room = table.placement.remove(session_id)?;
        if let Some(members) = table.rooms.get_mut(&room) {
            members.remove(session_id);
        }
        Some(room)
    }

    /// Members of a room. Unknown rooms are empty.
    #[must_use]
    pub fn members(&self, room: &str) -> HashSet<SessionId> {
        self.table.read().rooms.get(room).cloned().unwrap_or_default()
    }

    /// The room a session is in.
    #[must_use]
    pub fn room_of(&self, session_id: &str) -> Option<String> {
        self.table.read().placement.get(session_id).cloned()
    }

    #[must_use]
    pub fn room_exists(&self, room: &str) -> bool {
        self.table.read().rooms.contains_key(room)
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.table.read().rooms.len()
    }

    /// Member counts for every room, sorted by name.
    #[must_use]
    pub fn stats(&self) -> Vec<RoomStats> {
        let table = self.table.read();
        let mut stats: Vec<RoomStats> = table
            .rooms
            .iter()
            .map(|(name, members)| RoomStats {
                name: name.clone(),
                members: members.len(),
            })
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM)
    }
}
