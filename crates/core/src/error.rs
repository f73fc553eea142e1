use std::time::Duration;

use chatlink_protocol::RpcError;
use chatlink_runtime::TransportError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by a [`Session`](crate::Session).
///
/// `Error` is `Clone` because a single failure (a closed transport, a rejected
/// handshake) settles every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum Error {
	#[error("not connected")]
	NotConnected,

	#[error("connection closed")]
	ConnectionClosed,

	#[error("request '{method}' timed out after {timeout:?}")]
	Timeout { method: String, timeout: Duration },

	#[error("server error {}: {}", .0.code, .0.message)]
	Rpc(RpcError),

	#[error("authentication failed: {0}")]
	AuthFailed(String),

	#[error("keepalive probe timed out after {0:?}")]
	KeepaliveTimeout(Duration),

	#[error("reconnection failed after {attempts} attempts")]
	ReconnectExhausted { attempts: u32 },

	#[error("malformed frame: {0}")]
	MalformedFrame(String),

	#[error("invalid event: {0}")]
	InvalidEvent(String),

	#[error("session destroyed")]
	Destroyed,

	#[error("invalid options: {0}")]
	InvalidOptions(String),

	#[error("serialization error: {0}")]
	Serialization(String),

	#[error(transparent)]
	Transport(#[from] TransportError),
}

impl Error {
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout { .. } | Error::KeepaliveTimeout(_))
	}

	/// True when the failure came from the transport going away.
	pub fn is_closed(&self) -> bool {
		matches!(self, Error::ConnectionClosed | Error::Transport(TransportError::Closed))
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::Serialization(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rpc_error_display_includes_code() {
		let err = Error::Rpc(RpcError {
			code: 401,
			message: "bad token".to_string(),
			data: None,
		});
		assert_eq!(err.to_string(), "server error 401: bad token");
	}

	#[test]
	fn classification_helpers() {
		let timeout = Error::Timeout {
			method: "ping".to_string(),
			timeout: Duration::from_secs(1),
		};
		assert!(timeout.is_timeout());
		assert!(!timeout.is_closed());
		assert!(Error::ConnectionClosed.is_closed());
		assert!(Error::from(TransportError::Closed).is_closed());
		assert!(!Error::NotConnected.is_timeout());
	}
}
