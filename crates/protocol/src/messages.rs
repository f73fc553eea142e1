//! Method-specific params and results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{DeviceFlag, Header, ReasonCode};

/// Params of the `connect` handshake request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
	pub uid: String,
	pub token: String,
	pub device_id: String,
	pub device_flag: DeviceFlag,
	/// Client clock in milliseconds since the Unix epoch
	pub client_timestamp: u64,
}

/// Result of a successful `connect` handshake.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResult {
	#[serde(default)]
	pub server_key: String,
	#[serde(default)]
	pub salt: String,
	/// Server clock minus client clock, in milliseconds
	#[serde(default)]
	pub time_diff: i64,
	#[serde(default)]
	pub reason_code: ReasonCode,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub server_version: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub node_id: Option<u64>,
}

/// Params of the `send` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendParams {
	pub client_msg_no: String,
	pub channel_id: String,
	pub channel_type: u8,
	pub payload: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub header: Option<Header>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub setting: Option<u8>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub topic: Option<String>,
	/// Expiry in seconds
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expire: Option<u32>,
}

/// Result of a `send` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
	pub message_id: String,
	pub message_seq: u64,
	#[serde(default)]
	pub reason_code: ReasonCode,
}

/// Params of an inbound `recv` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecvMessage {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub header: Option<Header>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub setting: Option<u8>,
	pub message_id: String,
	pub message_seq: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_msg_no: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<u64>,
	pub channel_id: String,
	pub channel_type: u8,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub from_uid: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub topic: Option<String>,
	#[serde(default)]
	pub payload: Value,
}

/// Params of the outbound `recvack` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecvAck {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub header: Option<Header>,
	pub message_id: String,
	pub message_seq: u64,
}

impl From<&RecvMessage> for RecvAck {
	fn from(message: &RecvMessage) -> Self {
		Self {
			header: message.header,
			message_id: message.message_id.clone(),
			message_seq: message.message_seq,
		}
	}
}

/// Params of a server `disconnect` notification.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectNotice {
	#[serde(default)]
	pub reason_code: ReasonCode,
	#[serde(default)]
	pub reason: String,
}

/// Params of a server `event` notification, before validation.
///
/// Every field is optional here; the session rejects events without an `id`
/// or a `type`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventNotice {
	#[serde(default)]
	pub id: Option<String>,
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
	#[serde(default)]
	pub timestamp: Option<i64>,
	#[serde(default)]
	pub data: Value,
}
