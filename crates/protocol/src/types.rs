//! Enumerations and small value types shared by several payloads.

use serde::{Deserialize, Serialize};

/// Outcome classification returned by the server for handshake and send results.
///
/// Serialized as its numeric code. Codes this crate does not know survive a
/// round trip as [`ReasonCode::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ReasonCode {
	#[default]
	Unknown,
	Success,
	AuthFail,
	SubscriberNotExist,
	InBlacklist,
	ChannelNotExist,
	UserNotOnNode,
	SenderOffline,
	MsgKeyError,
	PayloadDecodeError,
	ForwardSendPacketError,
	NotAllowSend,
	ConnectKick,
	NotInWhitelist,
	QueryTokenError,
	SystemError,
	ChannelIdError,
	NodeMatchError,
	NodeNotMatch,
	Ban,
	NotSupportHeader,
	ClientKeyIsEmpty,
	RateLimit,
	NotSupportChannelType,
	Other(u8),
}

impl ReasonCode {
	pub fn is_success(self) -> bool {
		self == ReasonCode::Success
	}
}

impl From<u8> for ReasonCode {
	fn from(code: u8) -> Self {
		match code {
			0 => ReasonCode::Unknown,
			1 => ReasonCode::Success,
			2 => ReasonCode::AuthFail,
			3 => ReasonCode::SubscriberNotExist,
			4 => ReasonCode::InBlacklist,
			5 => ReasonCode::ChannelNotExist,
			6 => ReasonCode::UserNotOnNode,
			7 => ReasonCode::SenderOffline,
			8 => ReasonCode::MsgKeyError,
			9 => ReasonCode::PayloadDecodeError,
			10 => ReasonCode::ForwardSendPacketError,
			11 => ReasonCode::NotAllowSend,
			12 => ReasonCode::ConnectKick,
			13 => ReasonCode::NotInWhitelist,
			14 => ReasonCode::QueryTokenError,
			15 => ReasonCode::SystemError,
			16 => ReasonCode::ChannelIdError,
			17 => ReasonCode::NodeMatchError,
			18 => ReasonCode::NodeNotMatch,
			19 => ReasonCode::Ban,
			20 => ReasonCode::NotSupportHeader,
			21 => ReasonCode::ClientKeyIsEmpty,
			22 => ReasonCode::RateLimit,
			23 => ReasonCode::NotSupportChannelType,
			other => ReasonCode::Other(other),
		}
	}
}

impl From<ReasonCode> for u8 {
	fn from(code: ReasonCode) -> Self {
		match code {
			ReasonCode::Unknown => 0,
			ReasonCode::Success => 1,
			ReasonCode::AuthFail => 2,
			ReasonCode::SubscriberNotExist => 3,
			ReasonCode::InBlacklist => 4,
			ReasonCode::ChannelNotExist => 5,
			ReasonCode::UserNotOnNode => 6,
			ReasonCode::SenderOffline => 7,
			ReasonCode::MsgKeyError => 8,
			ReasonCode::PayloadDecodeError => 9,
			ReasonCode::ForwardSendPacketError => 10,
			ReasonCode::NotAllowSend => 11,
			ReasonCode::ConnectKick => 12,
			ReasonCode::NotInWhitelist => 13,
			ReasonCode::QueryTokenError => 14,
			ReasonCode::SystemError => 15,
			ReasonCode::ChannelIdError => 16,
			ReasonCode::NodeMatchError => 17,
			ReasonCode::NodeNotMatch => 18,
			ReasonCode::Ban => 19,
			ReasonCode::NotSupportHeader => 20,
			ReasonCode::ClientKeyIsEmpty => 21,
			ReasonCode::RateLimit => 22,
			ReasonCode::NotSupportChannelType => 23,
			ReasonCode::Other(other) => other,
		}
	}
}

/// Kind of device a session authenticates as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DeviceFlag {
	App,
	#[default]
	Web,
	Desktop,
}

impl TryFrom<u8> for DeviceFlag {
	type Error = String;

	fn try_from(flag: u8) -> Result<Self, Self::Error> {
		match flag {
			0 => Ok(DeviceFlag::App),
			1 => Ok(DeviceFlag::Web),
			2 => Ok(DeviceFlag::Desktop),
			other => Err(format!("unknown device flag {other}")),
		}
	}
}

impl From<DeviceFlag> for u8 {
	fn from(flag: DeviceFlag) -> Self {
		match flag {
			DeviceFlag::App => 0,
			DeviceFlag::Web => 1,
			DeviceFlag::Desktop => 2,
		}
	}
}

impl std::str::FromStr for DeviceFlag {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"app" => Ok(DeviceFlag::App),
			"web" => Ok(DeviceFlag::Web),
			"desktop" => Ok(DeviceFlag::Desktop),
			other => Err(format!("unknown device flag '{other}' (expected app, web or desktop)")),
		}
	}
}

/// Per-message header flags, echoed verbatim in acknowledgments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub no_persist: bool,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub red_dot: bool,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub sync_once: bool,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub dup: bool,
}
