//! # chathub-core
//!
//! Session, room and message broker for the chathub realtime chat hub.
//!
//! - **Session** - Registry of live connections and their display names
//! - **Room** - Directory of room membership
//! - **Validate** - Message and room-name rules
//! - **Rate limit** - Per-session sliding-window admission
//! - **History** - Bounded per-room message log
//! - **Router** - Room, global and direct delivery
//! - **Presence** - Joined/left notices and online lists
//! - **Liveness** - Heartbeat probes and latency samples
//! - **Hub** - Ties the above together, one method per client event
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ ClientEvent │────▶│     Hub     │────▶│  Validator  │────▶│ RateLimiter │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!              ┌─────────────┼──────────────┐
//!              ▼             ▼              ▼
//!       ┌─────────────┐ ┌─────────┐ ┌─────────────┐
//!       │   History   │ │ Router  │ │  Presence   │
//!       └─────────────┘ └─────────┘ └─────────────┘
//!                            │
//!                 ┌──────────┴──────────┐
//!                 ▼                     ▼
//!          ┌─────────────┐       ┌─────────────┐
//!          │  Sessions   │       │    Rooms    │
//!          └─────────────┘       └─────────────┘
//! ```

pub mod error;
pub mod history;
pub mod hub;
pub mod liveness;
pub mod message;
pub mod presence;
pub mod rate_limit;
pub mod room;
pub mod router;
pub mod session;
pub mod validate;

pub use error::HubError;
pub use history::HistoryBuffer;
pub use hub::{Hub, HubConfig, HubStats};
pub use liveness::{HeartbeatHandle, LivenessMonitor, LivenessState};
pub use presence::PresenceNotifier;
pub use rate_limit::{Admission, RateLimitConfig, RateLimiter};
pub use room::{RoomDirectory, RoomStats, DEFAULT_ROOM};
pub use router::{BroadcastRouter, RouteError};
pub use session::{outbox, Outbound, Outbox, Session, SessionId, SessionRegistry};
pub use validate::{validate, Rejection};
