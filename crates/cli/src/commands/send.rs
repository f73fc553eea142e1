use anyhow::Result;
use chatlink::{Header, SendOptions, Session};
use serde_json::Value;

pub struct SendArgs {
	pub channel: String,
	pub payload: String,
	pub channel_type: u8,
	pub topic: Option<String>,
	pub no_persist: bool,
}

pub async fn execute(session: &Session, args: SendArgs) -> Result<()> {
	let payload = parse_payload(args.payload);
	let options = SendOptions {
		header: args.no_persist.then(|| Header {
			no_persist: true,
			..Header::default()
		}),
		topic: args.topic,
		..SendOptions::default()
	};

	let result = session.send(args.channel, args.channel_type, payload, options).await?;
	println!("{}", serde_json::to_string_pretty(&result)?);
	Ok(())
}

/// JSON when it parses, a plain string otherwise.
fn parse_payload(raw: String) -> Value {
	serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}
