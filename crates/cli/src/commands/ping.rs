use std::time::{Duration, Instant};

use anyhow::Result;
use chatlink::protocol::method;
use chatlink::{Error, Session};
use serde_json::json;
use tracing::warn;

pub async fn execute(session: &Session, count: u32, interval_ms: u64) -> Result<()> {
	let timeout = session.options().ping_timeout;
	let mut rtts = Vec::with_capacity(count as usize);

	for seq in 1..=count {
		let started = Instant::now();
		match session.request_with_timeout(method::PING, json!({}), timeout).await {
			Ok(_) => {
				let rtt = started.elapsed();
				println!("ping {seq}: {:.1} ms", rtt.as_secs_f64() * 1000.0);
				rtts.push(rtt);
			}
			Err(err @ Error::Timeout { .. }) => {
				warn!(target = "chatlink.cli", seq, error = %err, "ping lost");
				println!("ping {seq}: timeout");
			}
			Err(err) => return Err(err.into()),
		}
		if seq < count {
			tokio::time::sleep(Duration::from_millis(interval_ms)).await;
		}
	}

	println!("{}", summarize(count, &rtts));
	Ok(())
}

fn summarize(sent: u32, rtts: &[Duration]) -> String {
	let received = rtts.len();
	if received == 0 {
		return format!("{sent} sent, 0 received");
	}
	let total: Duration = rtts.iter().sum();
	let average = total / received as u32;
	format!("{sent} sent, {received} received, avg {:.1} ms", average.as_secs_f64() * 1000.0)
}
