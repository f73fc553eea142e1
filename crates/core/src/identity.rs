//! Session and device identifiers.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use chatlink_protocol::DeviceFlag;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current time in millis since Unix epoch.
#[inline]
pub fn now_ms() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Fresh identifier for one session instance.
pub fn new_session_id() -> String {
	Uuid::new_v4().to_string()
}

/// Device id used when the application supplies none: the first eight
/// characters of the session id followed by a millisecond timestamp.
pub fn derive_device_id(session_id: &str, timestamp_ms: u64) -> String {
	let prefix: String = session_id.chars().take(8).collect();
	format!("{prefix}{timestamp_ms}")
}

pub(crate) fn new_request_id() -> String {
	Uuid::new_v4().to_string()
}

pub(crate) fn new_client_msg_no() -> String {
	Uuid::new_v4().simple().to_string()
}

/// Credentials presented in the `connect` handshake.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
	pub uid: String,
	pub token: String,
	#[serde(default)]
	pub device_id: Option<String>,
	#[serde(default)]
	pub device_flag: DeviceFlag,
}

impl Credentials {
	pub fn new(uid: impl Into<String>, token: impl Into<String>) -> Self {
		Self {
			uid: uid.into(),
			token: token.into(),
			device_id: None,
			device_flag: DeviceFlag::default(),
		}
	}

	pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
		self.device_id = Some(device_id.into());
		self
	}

	pub fn with_device_flag(mut self, device_flag: DeviceFlag) -> Self {
		self.device_flag = device_flag;
		self
	}

	/// Device id, empty until backfilled by the session.
	pub fn device_id(&self) -> &str {
		self.device_id.as_deref().unwrap_or_default()
	}

	/// Fills a missing or blank device id from the session id.
	pub(crate) fn backfill_device_id(mut self, session_id: &str) -> Self {
		if self.device_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
			self.device_id = Some(derive_device_id(session_id, now_ms()));
		}
		self
	}
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("uid", &self.uid)
			.field("token", &"<redacted>")
			.field("device_id", &self.device_id)
			.field("device_flag", &self.device_flag)
			.finish()
	}
}
