use thiserror::Error;

use crate::transport::ReadyState;

pub type Result<T> = std::result::Result<T, TransportError>;

/// Failures reported by a transport to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	#[error("transport is not open (state: {0})")]
	NotOpen(ReadyState),

	#[error("transport closed")]
	Closed,

	#[error("failed to open transport: {0}")]
	Open(String),

	#[error("transport error: {0}")]
	Failed(String),
}
