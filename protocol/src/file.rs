//! Splitting a file into an ordered sequence of DATA packets and
//! reassembling one from such a sequence (spec §4.3). Grounded in the
//! original `PackFromFile`/`AppendPacketToFile`/`UnpackToFile`.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::packet::Packet;
use crate::PACKET_SIZE;

/// Reads `path` and builds the ordered sequence of DATA packets that make it
/// up. Returns an empty sequence (and logs the cause) if the file can't be
/// opened.
pub fn pack(session_id: u32, path: &Path) -> Vec<Packet> {
	let mut file = match File::open(path) {
		Ok(f) => f,
		Err(e) => {
			log::warn!("failed to open {} for packing: {e}", path.display());
			return Vec::new();
		}
	};

	let mut packets = Vec::new();
	let mut buf = vec![0u8; PACKET_SIZE];
	let mut sequence_no = 0u32;
	let mut offset = 0u32;

	loop {
		let filled = match fill(&mut file, &mut buf) {
			Ok(filled) => filled,
			Err(e) => {
				log::warn!("failed to read {}: {e}", path.display());
				break;
			}
		};

		if filled == 0 {
			break;
		}

		packets.push(Packet::data(session_id, sequence_no, offset, buf[..filled].to_vec()));

		offset += filled as u32;
		sequence_no += 1;
	}

	packets
}

/// Reads into `buf` until it is full or the file is exhausted, looping over
/// short reads so every non-final packet carries a full `PACKET_SIZE`
/// payload, per the wire invariant that only the last DATA packet may be
/// shorter.
fn fill(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
	let mut filled = 0;

	while filled < buf.len() {
		match file.read(&mut buf[filled..]) {
			Ok(0) => break,
			Ok(n) => filled += n,
			Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
			Err(e) => return Err(e),
		}
	}

	Ok(filled)
}

/// Creates (truncating) `path` and writes every packet's payload in
/// ascending sequence-number order. It is the caller's responsibility to
/// supply packets covering a contiguous run of sequence numbers; duplicates
/// are not guarded against here.
pub fn unpack(packets: &[Packet], path: &Path) -> io::Result<()> {
	let mut sorted: Vec<&Packet> = packets.iter().collect();
	sorted.sort_by_key(|p| p.sequence_no);

	let mut file = File::create(path)?;

	for packet in sorted {
		file.write_all(&packet.data)?;
	}

	Ok(())
}

/// Appends one packet's payload to an already-open file handle. Used by the
/// live receiver to write each in-order packet as it arrives instead of
/// buffering the whole transfer in memory.
pub fn append(file: &mut File, packet: &Packet) -> io::Result<()> {
	file.write_all(&packet.data)
}

#[cfg(test)]
mod tests {
	use std::io::Seek;

	use tempfile::NamedTempFile;

	use super::*;

	#[test]
	fn pack_splits_on_packet_size_boundaries() {
		let mut src = NamedTempFile::new().unwrap();
		let data = vec![7u8; PACKET_SIZE * 2 + 5];
		src.write_all(&data).unwrap();
		src.flush().unwrap();

		let packets = pack(1, src.path());

		assert_eq!(packets.len(), 3);
		assert_eq!(packets[0].data.len(), PACKET_SIZE);
		assert_eq!(packets[1].data.len(), PACKET_SIZE);
		assert_eq!(packets[2].data.len(), 5);
		assert_eq!(packets[2].file_offset as usize, PACKET_SIZE * 2);
	}

	#[test]
	fn unpack_reassembles_out_of_order_input() {
		let packets = vec![
			Packet::data(1, 1, 3, vec![b'b', b'c', b'd']),
			Packet::data(1, 0, 0, vec![b'a']),
		];

		let dst = NamedTempFile::new().unwrap();
		unpack(&packets, dst.path()).unwrap();

		let mut contents = Vec::new();
		let mut f = File::open(dst.path()).unwrap();
		f.rewind().unwrap();
		f.read_to_end(&mut contents).unwrap();

		assert_eq!(contents, b"abcd");
	}

	#[test]
	fn append_writes_incrementally() {
		let dst = NamedTempFile::new().unwrap();
		let mut f = File::create(dst.path()).unwrap();

		append(&mut f, &Packet::data(1, 0, 0, b"ab".to_vec())).unwrap();
		append(&mut f, &Packet::data(1, 1, 2, b"cd".to_vec())).unwrap();

		let mut contents = Vec::new();
		let mut f = File::open(dst.path()).unwrap();
		f.read_to_end(&mut contents).unwrap();
		assert_eq!(contents, b"abcd");
	}
}
