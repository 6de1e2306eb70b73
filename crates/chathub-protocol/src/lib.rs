//! # chathub-protocol
//!
//! Wire events exchanged between chat clients and the hub.
//!
//! Every event travels as an envelope `{"event": <name>, "data": <payload>}`.
//! Event names are kept identical to the ones deployed clients already speak:
//!
//! - `gui-tin-nhan` / `gui-rieng` - Room broadcast and direct message
//! - `join-room` / `dang-nhap-tin` - Room change and typing indicator
//! - `pong-check` / `ping-check` - Liveness probe and echo
//! - `nhan-tin-nhan` / `lich-su-tin-nhan` - Delivered message and history replay
//! - `danh-sach-online` / `thong-bao` / `loi` - Presence, notices, errors
//!
//! ## Example
//!
//! ```rust
//! use chathub_protocol::{codec, ClientEvent};
//!
//! let event: ClientEvent = codec::decode_text(r#"{"event":"join-room","data":"lobby"}"#).unwrap();
//! assert_eq!(event, ClientEvent::JoinRoom("lobby".to_string()));
//! ```

pub mod codec;
pub mod events;

pub use codec::{decode, decode_text, encode, encode_text, ProtocolError};
pub use events::{ChatMessage, ClientEvent, DirectPayload, Scope, ServerEvent};
