//! TCP control protocol (spec §4.4). A message is a single command byte
//! followed by a fixed-shape payload; there is no explicit message length,
//! so a message is read and parsed from a single underlying `read()` call's
//! worth of bytes (§6.1).

use std::net::{Ipv4Addr, SocketAddrV4};

use utils::codec::{self, DecodeError};

pub mod command {
	pub const REQ_QUIT: u8 = 0x01;
	pub const REQ_DOWNLOAD: u8 = 0x02;
	pub const RSP_DOWNLOAD: u8 = 0x03;
	pub const REQ_LISTFILES: u8 = 0x04;
	pub const RSP_LISTFILES: u8 = 0x05;
	pub const DOWNLOAD_ERROR: u8 = 0x30;
}

/// A message sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
	Quit,
	ListFiles,
	Download { client_udp: SocketAddrV4, filename: String },
}

impl ClientMessage {
	pub fn serialize(&self) -> Vec<u8> {
		match self {
			ClientMessage::Quit => vec![command::REQ_QUIT],
			ClientMessage::ListFiles => vec![command::REQ_LISTFILES],
			ClientMessage::Download { client_udp, filename } => {
				let mut buf = vec![command::REQ_DOWNLOAD];
				buf.extend_from_slice(&client_udp.ip().octets());
				codec::encode_u16_be(&mut buf, client_udp.port());
				codec::encode_u32_be(&mut buf, filename.len() as u32);
				buf.extend_from_slice(filename.as_bytes());
				buf
			}
		}
	}

	/// Parses a message from a single read's worth of bytes. Returns
	/// `Ok(None)` for an unrecognized command byte, which the server treats
	/// as "close the connection".
	pub fn parse(bytes: &[u8]) -> Result<Option<Self>, DecodeError> {
		let (code, rest) = codec::take(bytes, 1)?;

		Ok(Some(match code[0] {
			command::REQ_QUIT => ClientMessage::Quit,
			command::REQ_LISTFILES => ClientMessage::ListFiles,
			command::REQ_DOWNLOAD => {
				let (ip, rest) = codec::take(rest, 4)?;
				let ip = Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3]);
				let (port, rest) = codec::decode_u16_be(rest)?;
				let (len, rest) = codec::decode_u32_be(rest)?;
				let (name, _) = codec::take(rest, len as usize)?;
				let filename = String::from_utf8_lossy(name).into_owned();

				ClientMessage::Download { client_udp: SocketAddrV4::new(ip, port), filename }
			}
			_ => return Ok(None),
		}))
	}
}

/// A message sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
	/// `file_length` is transmitted as an ASCII decimal string occupying the
	/// rest of the message, preserving an oddity of the original protocol
	/// rather than "fixing" it to a binary integer (see DESIGN.md).
	DownloadResponse { server_udp: SocketAddrV4, session_id: u32, file_length: u64 },
	ListFilesResponse { files: Vec<String> },
	DownloadError,
}

impl ServerMessage {
	pub fn serialize(&self) -> Vec<u8> {
		match self {
			ServerMessage::DownloadResponse { server_udp, session_id, file_length } => {
				let mut buf = vec![command::RSP_DOWNLOAD];
				buf.extend_from_slice(&server_udp.ip().octets());
				codec::encode_u16_be(&mut buf, server_udp.port());
				codec::encode_u32_be(&mut buf, *session_id);
				buf.extend_from_slice(file_length.to_string().as_bytes());
				buf
			}
			ServerMessage::ListFilesResponse { files } => {
				let mut buf = vec![command::RSP_LISTFILES];
				codec::encode_u16_be(&mut buf, files.len() as u16);

				let list_len: u32 = files.iter().map(|name| 4 + name.len() as u32).sum();
				codec::encode_u32_be(&mut buf, list_len);

				for name in files {
					codec::encode_u32_be(&mut buf, name.len() as u32);
					buf.extend_from_slice(name.as_bytes());
				}

				buf
			}
			ServerMessage::DownloadError => vec![command::DOWNLOAD_ERROR],
		}
	}

	pub fn parse(bytes: &[u8]) -> Result<Option<Self>, DecodeError> {
		let (code, rest) = codec::take(bytes, 1)?;

		Ok(Some(match code[0] {
			command::DOWNLOAD_ERROR => ServerMessage::DownloadError,
			command::RSP_DOWNLOAD => {
				let (ip, rest) = codec::take(rest, 4)?;
				let ip = Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3]);
				let (port, rest) = codec::decode_u16_be(rest)?;
				let (session_id, rest) = codec::decode_u32_be(rest)?;

				let file_length = std::str::from_utf8(rest)
					.ok()
					.and_then(|s| s.parse::<u64>().ok())
					.ok_or(DecodeError)?;

				ServerMessage::DownloadResponse { server_udp: SocketAddrV4::new(ip, port), session_id, file_length }
			}
			command::RSP_LISTFILES => {
				let (count, rest) = codec::decode_u16_be(rest)?;
				let (_list_len, mut rest) = codec::decode_u32_be(rest)?;

				let mut files = Vec::with_capacity(count as usize);
				for _ in 0..count {
					let (len, r) = codec::decode_u32_be(rest)?;
					let (name, r) = codec::take(r, len as usize)?;
					files.push(String::from_utf8_lossy(name).into_owned());
					rest = r;
				}

				ServerMessage::ListFilesResponse { files }
			}
			_ => return Ok(None),
		}))
	}
}
