//! Transport contract consumed by the session.
//!
//! A transport mirrors the browser WebSocket surface: it is opened against a
//! URL, reports a [`ReadyState`], accepts text frames while open, and delivers
//! its lifecycle as an ordered event stream. Exactly one
//! [`TransportEvent::Close`] is delivered per transport, and it is always the
//! last event.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::Result;

/// WebSocket close codes used by chatlink.
pub mod close_code {
	/// Graceful closure.
	pub const NORMAL: u16 = 1000;
	/// Close frame carried no status.
	pub const NO_STATUS: u16 = 1005;
	/// Connection dropped without a close frame.
	pub const ABNORMAL: u16 = 1006;
	/// Client forced closure from a non-open state.
	pub const FORCED: u16 = 4000;
	/// Handshake rejected or timed out.
	pub const AUTH_FAILED: u16 = 4001;
	/// Keepalive probe went unanswered.
	pub const KEEPALIVE_TIMEOUT: u16 = 4002;
	/// Server asked the client to drop the session.
	pub const SERVER_DISCONNECT: u16 = 4003;
}

/// Close frame payloads are limited to 125 bytes, two of which carry the code.
pub const MAX_CLOSE_REASON_BYTES: usize = 123;

/// Truncates `reason` to [`MAX_CLOSE_REASON_BYTES`] on a character boundary.
pub fn truncate_close_reason(reason: &str) -> &str {
	if reason.len() <= MAX_CLOSE_REASON_BYTES {
		return reason;
	}
	let mut end = MAX_CLOSE_REASON_BYTES;
	while !reason.is_char_boundary(end) {
		end -= 1;
	}
	&reason[..end]
}

/// Transport lifecycle state, as exposed by `WebSocket.readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
	Connecting,
	Open,
	Closing,
	Closed,
}

impl fmt::Display for ReadyState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ReadyState::Connecting => "connecting",
			ReadyState::Open => "open",
			ReadyState::Closing => "closing",
			ReadyState::Closed => "closed",
		};
		f.write_str(name)
	}
}

/// Lifecycle and data events delivered by a transport, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	/// The transport is open and accepts frames.
	Open,
	/// A text frame arrived.
	Message(String),
	/// A non-fatal error was observed; a `Close` follows if the transport died.
	Error(String),
	/// The transport is closed. Always the final event.
	Close { code: u16, reason: String },
}

/// Write half of an open transport.
///
/// All methods are synchronous: writes are queued, never awaited, so callers
/// can use them from inside event handlers.
pub trait TransportHandle: Send + Sync {
	/// Queues a text frame. Fails when the transport is not [`ReadyState::Open`].
	fn send(&self, text: String) -> Result<()>;

	fn ready_state(&self) -> ReadyState;

	/// Requests closure. The reason is truncated to [`MAX_CLOSE_REASON_BYTES`].
	/// Calling this on a closing or closed transport does nothing.
	fn close(&self, code: u16, reason: &str);
}

/// Parts returned from [`Connector::open`].
pub struct TransportParts {
	pub handle: Arc<dyn TransportHandle>,
	pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl fmt::Debug for TransportParts {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TransportParts").field("ready_state", &self.handle.ready_state()).finish()
	}
}

/// Opens transports against a server URL.
///
/// `open` returns immediately with a transport in [`ReadyState::Connecting`];
/// the outcome of the connection attempt arrives as events.
pub trait Connector: Send + Sync {
	fn open(&self, url: &str) -> Result<TransportParts>;
}

impl<C: Connector + ?Sized> Connector for Arc<C> {
	fn open(&self, url: &str) -> Result<TransportParts> {
		(**self).open(url)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn short_reason_is_untouched() {
		assert_eq!(truncate_close_reason("bye"), "bye");
	}

	#[test]
	fn long_reason_is_cut_to_limit() {
		let reason = "x".repeat(300);
		assert_eq!(truncate_close_reason(&reason).len(), MAX_CLOSE_REASON_BYTES);
	}

	#[test]
	fn truncation_respects_char_boundaries() {
		// 'é' is two bytes, so byte 123 falls inside a character.
		let reason = format!("a{}", "é".repeat(100));
		let truncated = truncate_close_reason(&reason);
		assert!(truncated.len() <= MAX_CLOSE_REASON_BYTES);
		assert_eq!(truncated.len(), 123);
		assert!(reason.starts_with(truncated));

		let reason = "é".repeat(100);
		assert_eq!(truncate_close_reason(&reason).len(), 122);
	}

	#[test]
	fn ready_state_display() {
		assert_eq!(ReadyState::Open.to_string(), "open");
		assert_eq!(ReadyState::Closing.to_string(), "closing");
	}
}
