//! Shared fixtures for the chat hub benchmarks.

use chathub_core::{outbox, Hub, HubConfig, Outbound, RateLimitConfig};
use tokio::sync::mpsc::UnboundedReceiver;

/// A hub with heartbeats off and a rate limit no benchmark will reach.
pub fn bench_hub() -> Hub {
    Hub::new(HubConfig {
        heartbeat_interval: std::time::Duration::ZERO,
        rate_limit: RateLimitConfig {
            max_messages: usize::MAX,
            window_ms: 1,
        },
        ..HubConfig::default()
    })
}

/// Connect `count` sessions, move them into `room` and drain their setup traffic.
///
/// Returns the session ids alongside their outbound queues.
pub fn populate(
    hub: &Hub,
    count: usize,
    room: &str,
) -> Vec<(String, UnboundedReceiver<Outbound>)> {
    let mut sessions: Vec<_> = (0..count)
        .map(|i| {
            let (tx, rx) = outbox();
            let id = format!("{:08x}", i);
            hub.connect(&id, tx).expect("unique session id");
            (id, rx)
        })
        .collect();

    for (id, _) in &sessions {
        hub.join_room(id, room).expect("valid room name");
    }
    for (_, rx) in &mut sessions {
        drain(rx);
    }
    sessions
}

/// Discard everything queued for one session, returning how much there was.
pub fn drain(rx: &mut UnboundedReceiver<Outbound>) -> usize {
    let mut count = 0;
    while rx.try_recv().is_ok() {
        count += 1;
    }
    count
}
