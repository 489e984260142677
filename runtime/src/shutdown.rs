use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Installs a Ctrl+C handler that flips a shared flag instead of killing the
/// process. The accept loop polls the flag between `accept()` calls so the
/// listener and worker pool can shut down cleanly.
pub fn install() -> Arc<AtomicBool> {
	let flag = Arc::new(AtomicBool::new(false));

	let handler_flag = flag.clone();
	if let Err(e) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
		log::warn!("failed to install Ctrl+C handler: {e}");
	}

	flag
}

pub fn requested(flag: &AtomicBool) -> bool {
	flag.load(Ordering::SeqCst)
}
