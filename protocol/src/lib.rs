/// TCP control-protocol command codes and message (de)serialization.
pub mod control;
/// Splitting a file into data packets and reassembling one from them.
pub mod file;
/// The Packet/Segment wire model.
pub mod packet;
/// The windowed receiver (client side).
pub mod receiver;
/// File-repository listing and filename resolution.
pub mod repo;
/// Session identifiers and the active-session registry.
pub mod session;
/// The sliding-window sender (server side).
pub mod window;

/// Maximum payload bytes carried by a single DATA packet. Mirrors
/// `PACKET_SIZE` in the original C++ source.
pub const PACKET_SIZE: usize = 1000;
