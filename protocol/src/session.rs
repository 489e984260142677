//! Session identifiers and the active-session registry (spec §4.7). Grounded
//! in the original `Session` struct and `GenerateUniqueULongKey`'s
//! collision-retry allocation.

use std::collections::HashSet;
use std::net::SocketAddrV4;
use std::path::PathBuf;
use std::sync::Mutex;

use ahash::RandomState;
use rand::Rng;

/// A server-side download in progress.
pub struct Session {
	pub id: u32,
	pub client_udp: SocketAddrV4,
	pub file_path: PathBuf,
	pub file_length: u64,
}

/// Tracks which session identifiers are currently in use, so a freshly
/// allocated one is guaranteed unique among live sessions. Access is
/// serialized by a single mutex, matching the spec's single-lock model.
pub struct Registry {
	active: Mutex<HashSet<u32, RandomState>>,
}

impl Registry {
	pub fn new() -> Self {
		Self { active: Mutex::new(HashSet::with_hasher(RandomState::new())) }
	}

	/// Picks a session id uniformly at random, retrying on collision with a
	/// currently-live session, and registers it as active.
	pub fn allocate(&self) -> u32 {
		let mut active = self.active.lock().expect("session registry mutex poisoned");

		loop {
			let id: u32 = rand::thread_rng().gen();

			if active.insert(id) {
				return id;
			}
		}
	}

	pub fn release(&self, id: u32) {
		self.active.lock().expect("session registry mutex poisoned").remove(&id);
	}

	pub fn is_active(&self, id: u32) -> bool {
		self.active.lock().expect("session registry mutex poisoned").contains(&id)
	}
}

impl Default for Registry {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn allocated_ids_are_unique_while_active() {
		let registry = Registry::new();

		let a = registry.allocate();
		let b = registry.allocate();

		assert_ne!(a, b);
		assert!(registry.is_active(a));
		assert!(registry.is_active(b));
	}

	#[test]
	fn released_id_can_be_reused() {
		let registry = Registry::new();

		let a = registry.allocate();
		registry.release(a);

		assert!(!registry.is_active(a));
	}
}
