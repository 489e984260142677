/// Colored, timestamped `log::Log` backend.
pub mod logger;
/// Bounded worker pool for the server's accept loop.
pub mod pool;
/// Interactive stdin prompt helpers shared by both binaries.
pub mod prompt;
/// Ctrl+C driven graceful-shutdown flag.
pub mod shutdown;
