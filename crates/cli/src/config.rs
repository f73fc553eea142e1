//! Config file loading and flag merging.
//!
//! ```json
//! {
//!   "url": "wss://im.example.com/ws",
//!   "uid": "u1",
//!   "token": "...",
//!   "deviceFlag": 1,
//!   "options": { "requestTimeout": 10000, "maxReconnectAttempts": 8 }
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result, bail};
use chatlink::{Credentials, DeviceFlag, SessionOptions};
use serde::Deserialize;

use crate::cli::ConnectionArgs;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
	pub url: Option<String>,
	pub uid: Option<String>,
	pub token: Option<String>,
	pub device_id: Option<String>,
	pub device_flag: Option<DeviceFlag>,
	pub options: SessionOptions,
}

impl FileConfig {
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))?;
		serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
	}
}

/// Everything needed to open a session.
#[derive(Debug)]
pub struct ResolvedConfig {
	pub url: String,
	pub credentials: Credentials,
	pub options: SessionOptions,
}

/// Merges flags over the file config. Flags win.
pub fn resolve(file: FileConfig, flags: &ConnectionArgs) -> Result<ResolvedConfig> {
	let Some(url) = flags.url.clone().or(file.url) else {
		bail!("no server URL: pass --url or set \"url\" in the config file");
	};
	if !(url.starts_with("ws://") || url.starts_with("wss://")) {
		bail!("server URL must start with ws:// or wss://, got {url}");
	}
	let Some(uid) = flags.uid.clone().or(file.uid) else {
		bail!("no user id: pass --uid or set \"uid\" in the config file");
	};
	let Some(token) = flags.token.clone().or(file.token) else {
		bail!("no token: pass --token or set \"token\" in the config file");
	};

	let mut credentials = Credentials::new(uid, token).with_device_flag(flags.device_flag.or(file.device_flag).unwrap_or_default());
	if let Some(device_id) = flags.device_id.clone().or(file.device_id) {
		credentials = credentials.with_device_id(device_id);
	}

	file.options.validate().context("invalid session options")?;
	Ok(ResolvedConfig {
		url,
		credentials,
		options: file.options,
	})
}
