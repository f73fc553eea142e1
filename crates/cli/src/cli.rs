use std::path::PathBuf;

use chatlink::DeviceFlag;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "chatlink")]
#[command(about = "chatlink - talk to a messaging server from the command line")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// JSON config file with url, credentials and session options
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(flatten)]
	pub connection: ConnectionArgs,

	#[command(subcommand)]
	pub command: Commands,
}

/// Connection flags. Each one overrides the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct ConnectionArgs {
	/// Server WebSocket URL (ws:// or wss://)
	#[arg(long, global = true, env = "CHATLINK_URL")]
	pub url: Option<String>,

	/// User id
	#[arg(long, global = true, env = "CHATLINK_UID")]
	pub uid: Option<String>,

	/// Authentication token
	#[arg(long, global = true, env = "CHATLINK_TOKEN", hide_env_values = true)]
	pub token: Option<String>,

	/// Device id (derived from the session id when omitted)
	#[arg(long, global = true)]
	pub device_id: Option<String>,

	/// Device kind: app, web or desktop
	#[arg(long, global = true)]
	pub device_flag: Option<DeviceFlag>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Stay connected and print inbound messages and events as JSON lines
	Listen {
		/// Exit after this many messages
		#[arg(short = 'n', long)]
		count: Option<usize>,
	},

	/// Send one message and print the server's result
	Send {
		/// Target channel id
		channel: String,

		/// Message payload; parsed as JSON when possible, sent as a string otherwise
		payload: String,

		/// Channel type (1 = person, 2 = group)
		#[arg(short = 't', long, default_value_t = 1)]
		channel_type: u8,

		#[arg(long)]
		topic: Option<String>,

		/// Ask the server not to persist the message
		#[arg(long)]
		no_persist: bool,
	},

	/// Measure round trips with correlated ping requests
	Ping {
		#[arg(short = 'n', long, default_value_t = 3)]
		count: u32,

		/// Delay between pings in milliseconds
		#[arg(long, default_value_t = 1000)]
		interval_ms: u64,
	},
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_send_with_overrides() {
		let cli = Cli::try_parse_from([
			"chatlink",
			"-vv",
			"--url",
			"ws://localhost:5200",
			"--device-flag",
			"desktop",
			"send",
			"general",
			"{\"text\":\"hi\"}",
			"-t",
			"2",
		])
		.unwrap();

		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.connection.url.as_deref(), Some("ws://localhost:5200"));
		assert_eq!(cli.connection.device_flag, Some(DeviceFlag::Desktop));
		let Commands::Send { channel, channel_type, .. } = cli.command else {
			panic!("expected send");
		};
		assert_eq!(channel, "general");
		assert_eq!(channel_type, 2);
	}

	#[test]
	fn rejects_unknown_device_flag() {
		let result = Cli::try_parse_from(["chatlink", "--device-flag", "watch", "ping"]);
		assert!(result.is_err());
	}

	#[test]
	fn global_flags_after_subcommand() {
		let cli = Cli::try_parse_from(["chatlink", "listen", "-n", "5", "--uid", "u1"]).unwrap();
		assert_eq!(cli.connection.uid.as_deref(), Some("u1"));
		assert!(matches!(cli.command, Commands::Listen { count: Some(5) }));
	}
}
