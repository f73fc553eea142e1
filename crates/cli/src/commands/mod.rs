mod listen;
mod ping;
mod send;

use anyhow::{Context, Result};
use chatlink::Session;
use tracing::info;

use crate::cli::Commands;
use crate::config::ResolvedConfig;

pub async fn dispatch(command: Commands, config: ResolvedConfig) -> Result<()> {
	let session = open_session(config).await?;

	let result = match command {
		Commands::Listen { count } => listen::execute(&session, count).await,
		Commands::Send {
			channel,
			payload,
			channel_type,
			topic,
			no_persist,
		} => {
			send::execute(
				&session,
				send::SendArgs {
					channel,
					payload,
					channel_type,
					topic,
					no_persist,
				},
			)
			.await
		}
		Commands::Ping { count, interval_ms } => ping::execute(&session, count, interval_ms).await,
	};

	session.destroy();
	result
}

/// Creates the process-wide session, binds Ctrl-C to teardown, and connects.
async fn open_session(config: ResolvedConfig) -> Result<Session> {
	let url = config.url.clone();
	let session = chatlink::init(config.url, config.credentials, config.options.singleton(true))?;
	session.bind_teardown_signal(async {
		let _ = tokio::signal::ctrl_c().await;
	});

	let handshake = session.connect().await.with_context(|| format!("failed to connect to {url}"))?;
	info!(
		target = "chatlink.cli",
		%url,
		session_id = session.session_id(),
		reason_code = ?handshake.reason_code,
		"connected"
	);
	Ok(session)
}
