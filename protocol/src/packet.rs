//! The Packet and Segment wire model (spec §3, §4.2).
//!
//! A bare `Packet` is the canonical wire representation for every datagram
//! this protocol sends; `Segment` is a checksummed UDP-style wrapper around
//! one, fully implemented but not used on the default path (see DESIGN.md,
//! Open Question 1).

use utils::codec::{self, DecodeError};

use crate::PACKET_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
	Data,
	Ack,
	Start,
	Fin,
}

impl Flag {
	const DATA: u8 = 0x00;
	const ACK: u8 = 0x01;
	const START: u8 = 0x03;
	const FIN: u8 = 0x04;

	fn to_byte(self) -> u8 {
		match self {
			Flag::Data => Self::DATA,
			Flag::Ack => Self::ACK,
			Flag::Start => Self::START,
			Flag::Fin => Self::FIN,
		}
	}

	fn from_byte(b: u8) -> Result<Self, DecodeError> {
		match b {
			Self::DATA => Ok(Flag::Data),
			Self::ACK => Ok(Flag::Ack),
			Self::START => Ok(Flag::Start),
			Self::FIN => Ok(Flag::Fin),
			_ => Err(DecodeError),
		}
	}
}

/// A single UDP-layer protocol message. `session_id`/`sequence_no` are
/// unused (zeroed) on START/FIN; `file_offset`/`data` are only meaningful on
/// DATA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
	pub flag: Flag,
	pub session_id: u32,
	pub sequence_no: u32,
	pub file_offset: u32,
	pub data: Vec<u8>,
}

impl Packet {
	pub fn data(session_id: u32, sequence_no: u32, file_offset: u32, data: Vec<u8>) -> Self {
		debug_assert!(data.len() <= PACKET_SIZE);

		Self { flag: Flag::Data, session_id, sequence_no, file_offset, data }
	}

	pub fn ack(session_id: u32, sequence_no: u32) -> Self {
		Self { flag: Flag::Ack, session_id, sequence_no, file_offset: 0, data: Vec::new() }
	}

	pub fn start(session_id: u32) -> Self {
		Self { flag: Flag::Start, session_id, sequence_no: 0, file_offset: 0, data: Vec::new() }
	}

	pub fn fin(session_id: u32) -> Self {
		Self { flag: Flag::Fin, session_id, sequence_no: 0, file_offset: 0, data: Vec::new() }
	}

	pub fn is_ack(&self) -> bool {
		self.flag == Flag::Ack
	}

	pub fn is_fin(&self) -> bool {
		self.flag == Flag::Fin
	}

	pub fn is_data(&self) -> bool {
		self.flag == Flag::Data
	}

	/// Serializes to network byte order: `flag` (1) then, for everything but
	/// START/FIN, `session_id` (4) and `sequence_no` (4); DATA additionally
	/// carries `file_offset` (4), `data_length` (4), and the payload.
	pub fn serialize(&self) -> Vec<u8> {
		let mut buf = Vec::with_capacity(1 + 8 + if self.flag == Flag::Data { 8 + self.data.len() } else { 0 });

		buf.push(self.flag.to_byte());

		if matches!(self.flag, Flag::Start | Flag::Fin) {
			return buf;
		}

		codec::encode_u32_be(&mut buf, self.session_id);
		codec::encode_u32_be(&mut buf, self.sequence_no);

		if self.flag == Flag::Data {
			codec::encode_u32_be(&mut buf, self.file_offset);
			codec::encode_u32_be(&mut buf, self.data.len() as u32);
			buf.extend_from_slice(&self.data);
		}

		buf
	}

	pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
		let (flag_byte, rest) = codec::take(bytes, 1)?;
		let flag = Flag::from_byte(flag_byte[0])?;

		if matches!(flag, Flag::Start | Flag::Fin) {
			return Ok(Self { flag, session_id: 0, sequence_no: 0, file_offset: 0, data: Vec::new() });
		}

		let (session_id, rest) = codec::decode_u32_be(rest)?;
		let (sequence_no, rest) = codec::decode_u32_be(rest)?;

		if flag == Flag::Ack {
			return Ok(Self { flag, session_id, sequence_no, file_offset: 0, data: Vec::new() });
		}

		let (file_offset, rest) = codec::decode_u32_be(rest)?;
		let (data_length, rest) = codec::decode_u32_be(rest)?;
		let data_length = data_length as usize;

		let (data, _) = codec::take(rest, data_length)?;

		Ok(Self { flag, session_id, sequence_no, file_offset, data: data.to_vec() })
	}
}

/// A checksummed UDP-segment wrapper around a `Packet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
	pub source_port: u16,
	pub dest_port: u16,
	pub packet: Packet,
}

impl Segment {
	/// Writes the header with a zeroed checksum field, appends the
	/// serialized packet, then patches the checksum computed over the whole
	/// buffer into bytes 6-7. Mirrors the teacher's udp header-then-patch
	/// technique.
	pub fn serialize_network(&self) -> Vec<u8> {
		let body = self.packet.serialize();
		let mut buf = Vec::with_capacity(8 + body.len());

		codec::encode_u16_be(&mut buf, self.source_port);
		codec::encode_u16_be(&mut buf, self.dest_port);
		codec::encode_u16_be(&mut buf, (8 + body.len()) as u16);
		buf.extend_from_slice(&[0, 0]); // checksum placeholder
		buf.extend_from_slice(&body);

		let checksum = utils::codec::checksum16(&buf);
		let bytes = checksum.to_be_bytes();
		buf[6] = bytes[0];
		buf[7] = bytes[1];

		buf
	}

	/// Parses a segment and reports whether its checksum validates, by
	/// recomputing over the received bytes with the checksum field cleared.
	pub fn parse_network(bytes: &[u8]) -> Result<(Self, bool), DecodeError> {
		let (source_port, rest) = codec::decode_u16_be(bytes)?;
		let (dest_port, rest) = codec::decode_u16_be(rest)?;
		let (length, rest) = codec::decode_u16_be(rest)?;
		let (checksum_bytes, rest) = codec::take(rest, 2)?;

		let mut cleared = bytes.to_vec();
		cleared[6] = 0;
		cleared[7] = 0;
		let computed = utils::codec::checksum16(&cleared);
		let valid = computed.to_be_bytes() == [checksum_bytes[0], checksum_bytes[1]] && length as usize == bytes.len();

		let packet = Packet::parse(rest)?;

		Ok((Self { source_port, dest_port, packet }, valid))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn data_packet_round_trips() {
		let p = Packet::data(7, 3, 3000, vec![1, 2, 3, 4]);
		let bytes = p.serialize();
		let parsed = Packet::parse(&bytes).unwrap();
		assert_eq!(p, parsed);
	}

	#[test]
	fn ack_packet_round_trips() {
		let p = Packet::ack(42, 9);
		let parsed = Packet::parse(&p.serialize()).unwrap();
		assert_eq!(p, parsed);
		assert!(parsed.is_ack());
	}

	#[test]
	fn start_and_fin_ignore_session_fields() {
		let start = Packet::start(99);
		let bytes = start.serialize();
		assert_eq!(bytes, vec![0x03]);
		let parsed = Packet::parse(&bytes).unwrap();
		assert_eq!(parsed.session_id, 0);

		let fin = Packet::fin(99);
		assert_eq!(fin.serialize(), vec![0x04]);
	}

	#[test]
	fn truncated_data_packet_fails_to_parse() {
		let p = Packet::data(1, 0, 0, vec![9; 10]);
		let mut bytes = p.serialize();
		bytes.truncate(bytes.len() - 1);
		assert_eq!(Packet::parse(&bytes), Err(DecodeError));
	}

	#[test]
	fn unknown_flag_fails_to_parse() {
		assert_eq!(Packet::parse(&[0xFF]), Err(DecodeError));
	}

	#[test]
	fn segment_checksum_law() {
		let packet = Packet::data(1, 0, 0, vec![10, 20, 30]);
		let segment = Segment { source_port: 9000, dest_port: 9001, packet };

		let bytes = segment.serialize_network();
		let (parsed, valid) = Segment::parse_network(&bytes).unwrap();

		assert!(valid);
		assert_eq!(parsed.packet, segment.packet);
	}

	#[test]
	fn segment_detects_corruption() {
		let packet = Packet::data(1, 0, 0, vec![10, 20, 30]);
		let segment = Segment { source_port: 1, dest_port: 2, packet };

		let mut bytes = segment.serialize_network();
		let last = bytes.len() - 1;
		bytes[last] ^= 0xFF;

		let (_, valid) = Segment::parse_network(&bytes).unwrap();
		assert!(!valid);
	}
}
