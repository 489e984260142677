/// Big-endian integer wrapper types used by the wire codec.
pub mod endian;
/// Fixed-width encode/decode helpers and the internet checksum.
pub mod codec;
/// Error-handling utilities.
pub mod error;
