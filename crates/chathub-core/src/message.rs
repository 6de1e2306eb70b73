//! Chat message construction.
//!
//! Messages carry a monotonic id derived from the wall clock and a
//! human-readable send time.

use chathub_protocol::{ChatMessage, Scope};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A unique message identifier.
pub type MessageId = u64;

/// Last id handed out.
static LAST_ID: AtomicU64 = AtomicU64::new(0);

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Generate a message id.
///
/// Ids are the creation time in milliseconds, bumped past the previous id
/// when two messages share a millisecond, so they strictly increase.
#[must_use]
pub fn generate_message_id() -> MessageId {
    let now = now_millis();
    let mut prev = LAST_ID.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_ID.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

/// Local wall-clock time formatted for display.
#[must_use]
pub fn format_send_time() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Build a message broadcast to `room`.
#[must_use]
pub fn broadcast(
    sender: impl Into<String>,
    body: impl Into<String>,
    room: impl Into<String>,
) -> ChatMessage {
    ChatMessage {
        id: generate_message_id(),
        sender: sender.into(),
        body: body.into(),
        scope: Scope::Broadcast,
        room: Some(room.into()),
        sent_at: format_send_time(),
    }
}

/// Build a direct message.
#[must_use]
pub fn direct(sender: impl Into<String>, body: impl Into<String>) -> ChatMessage {
    ChatMessage {
        id: generate_message_id(),
        sender: sender.into(),
        body: body.into(),
        scope: Scope::Direct,
        room: None,
        sent_at: format_send_time(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_message() {
        let msg = broadcast("NguoiDung_1", "hello", "global");
        assert_eq!(msg.scope, Scope::Broadcast);
        assert_eq!(msg.room.as_deref(), Some("global"));
        assert_eq!(msg.sent_at.len(), 8);
    }

    #[test]
    fn test_direct_message_has_no_room() {
        let msg = direct("NguoiDung_1", "psst");
        assert_eq!(msg.scope, Scope::Direct);
        assert!(msg.room.is_none());
    }

    #[test]
    fn test_ids_strictly_increase() {
        let ids: Vec<_> = (0..1_000).map(|_| generate_message_id()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
