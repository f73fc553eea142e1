//! Wire types for the chatlink messaging protocol.
//!
//! This crate contains the serde-serializable types exchanged with the
//! messaging server over JSON-RPC frames. These types represent the
//! "protocol layer" - the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * camelCase on the wire, snake_case in Rust
//! * Opaque payloads: message bodies and event data stay [`serde_json::Value`]
//!
//! Session behaviour (correlation, keepalive, reconnection) lives in `chatlink`.

pub mod frame;
pub mod messages;
pub mod types;

pub use frame::*;
pub use messages::*;
pub use types::*;

/// Method names used on the wire.
pub mod method {
	/// Authentication handshake request.
	pub const CONNECT: &str = "connect";
	/// Outbound message request.
	pub const SEND: &str = "send";
	/// Correlated keepalive probe.
	pub const PING: &str = "ping";
	/// Acknowledgment notification for a delivered `recv`.
	pub const RECVACK: &str = "recvack";
	/// Inbound message notification.
	pub const RECV: &str = "recv";
	/// Uncorrelated keepalive reply.
	pub const PONG: &str = "pong";
	/// Server-initiated session termination.
	pub const DISCONNECT: &str = "disconnect";
	/// Out-of-band server push.
	pub const EVENT: &str = "event";
}
