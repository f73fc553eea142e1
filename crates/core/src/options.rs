//! Session tuning knobs.
//!
//! All durations serialize as integer milliseconds so options can live in a
//! JSON config file:
//!
//! ```json
//! { "requestTimeout": 15000, "keepaliveInterval": 30000, "maxReconnectAttempts": 5 }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timeouts, keepalive cadence, and reconnection policy for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionOptions {
	/// Timeout for ordinary correlated requests such as `send`.
	/// Default: 15 seconds
	#[serde(with = "duration_ms")]
	pub request_timeout: Duration,

	/// Timeout for the `connect` handshake that gates the whole connection.
	/// Default: 5 seconds
	#[serde(with = "duration_ms")]
	pub handshake_timeout: Duration,

	/// Interval between keepalive probes while connected.
	/// Default: 30 seconds
	#[serde(with = "duration_ms")]
	pub keepalive_interval: Duration,

	/// Timeout for a single keepalive probe. Must be shorter than the interval.
	/// Default: 10 seconds
	#[serde(with = "duration_ms")]
	pub ping_timeout: Duration,

	/// Base of the exponential reconnection backoff.
	/// Default: 1 second
	#[serde(with = "duration_ms")]
	pub reconnect_base_delay: Duration,

	/// Retries scheduled after an unexpected close before giving up.
	/// Default: 5
	pub max_reconnect_attempts: u32,

	/// Register the session as the process-wide default, replacing any previous one.
	/// Default: false
	pub singleton: bool,
}

impl Default for SessionOptions {
	fn default() -> Self {
		Self {
			request_timeout: Duration::from_secs(15),
			handshake_timeout: Duration::from_secs(5),
			keepalive_interval: Duration::from_secs(30),
			ping_timeout: Duration::from_secs(10),
			reconnect_base_delay: Duration::from_secs(1),
			max_reconnect_attempts: 5,
			singleton: false,
		}
	}
}

impl SessionOptions {
	pub fn singleton(mut self, singleton: bool) -> Self {
		self.singleton = singleton;
		self
	}

	pub fn validate(&self) -> Result<()> {
		let timeouts = [
			("requestTimeout", self.request_timeout),
			("handshakeTimeout", self.handshake_timeout),
			("keepaliveInterval", self.keepalive_interval),
			("pingTimeout", self.ping_timeout),
			("reconnectBaseDelay", self.reconnect_base_delay),
		];
		if let Some((name, _)) = timeouts.iter().find(|(_, value)| value.is_zero()) {
			return Err(Error::InvalidOptions(format!("{name} must be greater than zero")));
		}
		if self.ping_timeout >= self.keepalive_interval {
			return Err(Error::InvalidOptions(format!(
				"pingTimeout ({:?}) must be shorter than keepaliveInterval ({:?})",
				self.ping_timeout, self.keepalive_interval
			)));
		}
		Ok(())
	}
}

mod duration_ms {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(value.as_millis() as u64)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn defaults_are_valid() {
		let options = SessionOptions::default();
		assert!(options.validate().is_ok());
		assert!(options.handshake_timeout < options.request_timeout);
		assert!(options.ping_timeout < options.keepalive_interval);
	}

	#[test]
	fn partial_json_keeps_defaults() {
		let options: SessionOptions = serde_json::from_value(json!({"keepaliveInterval": 20000, "singleton": true})).unwrap();
		assert_eq!(options.keepalive_interval, Duration::from_secs(20));
		assert!(options.singleton);
		assert_eq!(options.request_timeout, Duration::from_secs(15));
	}

	#[test]
	fn serializes_durations_as_millis() {
		let value = serde_json::to_value(SessionOptions::default()).unwrap();
		assert_eq!(value["handshakeTimeout"], 5000);
		assert_eq!(value["maxReconnectAttempts"], 5);
	}

	#[test]
	fn ping_timeout_must_be_shorter_than_interval() {
		let options = SessionOptions {
			ping_timeout: Duration::from_secs(30),
			..SessionOptions::default()
		};
		let err = options.validate().unwrap_err();
		assert!(err.to_string().contains("pingTimeout"));
	}

	#[test]
	fn zero_timeouts_are_rejected() {
		let options = SessionOptions {
			request_timeout: Duration::ZERO,
			..SessionOptions::default()
		};
		assert!(matches!(options.validate(), Err(Error::InvalidOptions(_))));
	}
}
