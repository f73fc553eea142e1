//! Registry holding the default session.
//!
//! [`SessionRegistry::global`] is the process-wide instance behind
//! [`crate::init`]. Tests and embedders can create independent registries.

use std::sync::{Arc, OnceLock};

use chatlink_runtime::Connector;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::identity::Credentials;
use crate::options::SessionOptions;
use crate::session::Session;

pub(crate) type RegistrySlot = Mutex<Option<Session>>;

#[derive(Clone, Default)]
pub struct SessionRegistry {
	slot: Arc<RegistrySlot>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn global() -> &'static SessionRegistry {
		static GLOBAL: OnceLock<SessionRegistry> = OnceLock::new();
		GLOBAL.get_or_init(SessionRegistry::new)
	}

	pub fn get(&self) -> Option<Session> {
		self.slot.lock().clone()
	}

	/// Registers `session`, returning the one it replaced.
	///
	/// The replaced session is left running; [`init`](Self::init) destroys it.
	pub fn set(&self, session: Session) -> Option<Session> {
		session.attach_registry(Arc::downgrade(&self.slot));
		self.slot.lock().replace(session)
	}

	pub fn clear(&self) -> Option<Session> {
		self.slot.lock().take()
	}

	/// Creates a session.
	///
	/// With `options.singleton` set, the registered session is destroyed
	/// (closing its transport) and the new one takes its place.
	pub fn init(&self, url: impl Into<String>, credentials: Credentials, options: SessionOptions, connector: impl Connector + 'static) -> Result<Session> {
		let session = Session::new(url, credentials, options, connector)?;
		if session.options().singleton {
			if let Some(previous) = self.clear() {
				debug!(target = "chatlink.session", previous = %previous.session_id(), "replacing registered session");
				previous.destroy();
			}
			self.set(session.clone());
		}
		Ok(session)
	}
}

impl std::fmt::Debug for SessionRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionRegistry").field("session", &self.get().map(|s| s.session_id().to_string())).finish()
	}
}
