//! A bounded task queue feeding a fixed set of worker threads, modeled on
//! the original server's `TaskQueue<SOCKET, execute, onDisconnect>{10, 20}`:
//! a fixed worker count and a bounded queue depth, where producing into a
//! full queue blocks the producer rather than growing unboundedly.

use std::sync::mpsc::{self, SendError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Canonical worker count used by the server binary.
pub const WORKERS: usize = 10;
/// Canonical bounded queue depth used by the server binary.
pub const QUEUE_DEPTH: usize = 20;

pub struct Pool<T> {
	sender: SyncSender<T>,
	workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> Pool<T> {
	/// Spawns `workers` threads, each running `handler` on items popped from
	/// a queue bounded to `queue_depth` entries.
	pub fn new<F>(workers: usize, queue_depth: usize, handler: F) -> Self
	where
		F: Fn(T) + Send + Sync + 'static,
	{
		let (sender, receiver) = mpsc::sync_channel(queue_depth);
		let receiver = Arc::new(Mutex::new(receiver));
		let handler = Arc::new(handler);

		let mut handles = Vec::with_capacity(workers);

		for id in 0..workers {
			let receiver = receiver.clone();
			let handler = handler.clone();

			handles.push(
				thread::Builder::new()
					.name(format!("worker-{id}"))
					.spawn(move || loop {
						let job = receiver.lock().expect("worker queue mutex poisoned").recv();

						match job {
							Ok(item) => handler(item),
							Err(_) => break, // queue closed, no more work will arrive
						}
					})
					.expect("failed to spawn worker thread"),
			);
		}

		Self { sender, workers: handles }
	}

	/// Enqueues an item, blocking the caller if the queue is already at
	/// `queue_depth`.
	pub fn produce(&self, item: T) -> Result<(), SendError<T>> {
		self.sender.send(item)
	}

	/// Drops the sending half (causing workers to exit once the queue
	/// drains) and waits for every worker to finish.
	pub fn shutdown(self) {
		drop(self.sender);

		for handle in self.workers {
			let _ = handle.join();
		}
	}
}
