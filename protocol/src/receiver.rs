//! The windowed receiver (spec §4.6): client-side reassembly with a
//! reordering buffer keyed on sequence number, duplicate/replay ACK
//! handling, and in-order delivery. [`ReorderBuffer`] is the pure state
//! machine (no socket); [`Receiver`] drives it over a real UDP socket.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::net::{SocketAddr, UdpSocket};
use std::path::Path;

use rand::Rng;

use crate::file;
use crate::packet::Packet;
use utils::error::Ext;

/// Wraps a `Packet` so a min-heap can order purely by `sequence_no`, without
/// requiring `Packet` itself to implement `Ord`.
struct BySeq(Packet);

impl PartialEq for BySeq {
	fn eq(&self, other: &Self) -> bool {
		self.0.sequence_no == other.0.sequence_no
	}
}
impl Eq for BySeq {}
impl PartialOrd for BySeq {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
impl Ord for BySeq {
	fn cmp(&self, other: &Self) -> Ordering {
		// Reversed so BinaryHeap (a max-heap) behaves as a min-heap on
		// sequence number.
		other.0.sequence_no.cmp(&self.0.sequence_no)
	}
}

/// Outcome of delivering one incoming DATA packet to the buffer.
pub struct Delivery {
	/// Packets now ready for in-order delivery, oldest first.
	pub ready: Vec<Packet>,
	/// Sequence numbers that should be (re-)acked as a result, in order.
	pub acks: Vec<u32>,
}

/// Pure reordering/duplicate-suppression state: no socket, no file I/O.
pub struct ReorderBuffer {
	expected: u32,
	heap: BinaryHeap<BySeq>,
}

impl ReorderBuffer {
	pub fn new() -> Self {
		Self { expected: 0, heap: BinaryHeap::new() }
	}

	/// Handles one incoming DATA packet, returning the in-order run it
	/// unblocks (if any) and the ACKs that should be sent as a result.
	pub fn receive(&mut self, packet: Packet) -> Delivery {
		if packet.sequence_no < self.expected {
			// Already delivered; the peer likely missed our ACK. Re-ack
			// without touching the buffer.
			return Delivery { ready: Vec::new(), acks: vec![packet.sequence_no] };
		}

		self.heap.push(BySeq(packet));

		let mut ready = Vec::new();
		let mut acks = Vec::new();

		loop {
			match self.heap.peek() {
				Some(BySeq(p)) if p.sequence_no < self.expected => {
					self.heap.pop(); // stale duplicate, discard silently
				}
				Some(BySeq(p)) if p.sequence_no == self.expected => {
					let BySeq(p) = self.heap.pop().unwrap();
					acks.push(p.sequence_no);
					ready.push(p);
					self.expected += 1;
				}
				_ => break,
			}
		}

		Delivery { ready, acks }
	}

	pub fn expected(&self) -> u32 {
		self.expected
	}
}

impl Default for ReorderBuffer {
	fn default() -> Self {
		Self::new()
	}
}

/// Drives a `ReorderBuffer` over a real UDP socket, appending delivered
/// bytes to `output` as they become available and emitting (possibly
/// dropped) ACKs.
pub struct Receiver {
	socket: UdpSocket,
	server: SocketAddr,
	session_id: u32,
	output: File,
	loss_rate: f64,
	buffer: ReorderBuffer,
}

impl Receiver {
	pub fn new(socket: UdpSocket, server: SocketAddr, session_id: u32, output: File, loss_rate: f64) -> Self {
		Self { socket, server, session_id, output, loss_rate, buffer: ReorderBuffer::new() }
	}

	/// Runs the receive loop to completion, blocking the calling thread,
	/// until FIN arrives or a fatal I/O error occurs.
	pub fn run(mut self) {
		let mut buf = [0u8; crate::PACKET_SIZE + 64];

		loop {
			let session_id = self.session_id;
			let Some(n) = self.socket.recv(&mut buf).ok_or(|e| log::error!("session {session_id}: UDP receive failed: {e}")) else {
				return;
			};

			let packet = match Packet::parse(&buf[..n]) {
				Ok(p) => p,
				Err(_) => {
					log::warn!("session {}: discarding malformed datagram", self.session_id);
					continue;
				}
			};

			if packet.is_fin() {
				log::info!("session {}: received FIN, download complete", self.session_id);
				return;
			}

			if !packet.is_data() {
				continue;
			}

			let delivery = self.buffer.receive(packet);

			for ready in &delivery.ready {
				if let Err(e) = file::append(&mut self.output, ready) {
					log::error!("session {}: failed to write downloaded data: {e}", self.session_id);
					return;
				}
			}

			for seq in delivery.acks {
				self.send_ack(seq);
			}
		}
	}

	fn send_ack(&self, seq: u32) {
		if self.loss_rate > 0.0 && rand::thread_rng().gen_bool(self.loss_rate) {
			log::debug!("session {}: simulating loss of ack {seq}", self.session_id);
			return;
		}

		let ack = Packet::ack(self.session_id, seq).serialize();
		let session_id = self.session_id;
		self.socket.send_to(&ack, self.server).ok_or(|e| log::warn!("session {session_id}: failed to send ack {seq}: {e}"));
	}
}

/// Starts a START handshake packet on `socket`, used by the client before
/// constructing a `Receiver`.
pub fn send_start(socket: &UdpSocket, server: SocketAddr, session_id: u32) -> std::io::Result<()> {
	socket.send_to(&Packet::start(session_id).serialize(), server).map(|_| ())
}

pub fn open_output(path: &Path) -> std::io::Result<File> {
	File::create(path)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn data(seq: u32, byte: u8) -> Packet {
		Packet::data(1, seq, seq * 2, vec![byte, byte])
	}

	#[test]
	fn in_order_arrival_delivers_immediately() {
		let mut buf = ReorderBuffer::new();

		let d = buf.receive(data(0, b'a'));
		assert_eq!(d.ready.iter().map(|p| p.sequence_no).collect::<Vec<_>>(), vec![0]);
		assert_eq!(d.acks, vec![0]);
		assert_eq!(buf.expected(), 1);
	}

	#[test]
	fn out_of_order_arrival_buffers_until_gap_fills() {
		let mut buf = ReorderBuffer::new();

		let d2 = buf.receive(data(2, b'c'));
		assert!(d2.ready.is_empty());
		assert!(d2.acks.is_empty());

		let d1 = buf.receive(data(1, b'b'));
		assert!(d1.ready.is_empty());

		let d0 = buf.receive(data(0, b'a'));
		// Arrival of 0 unblocks 0,1,2 all at once, in order.
		assert_eq!(d0.ready.iter().map(|p| p.sequence_no).collect::<Vec<_>>(), vec![0, 1, 2]);
		assert_eq!(d0.acks, vec![0, 1, 2]);
		assert_eq!(buf.expected(), 3);
	}

	#[test]
	fn duplicate_below_expected_is_reacked_not_redelivered() {
		let mut buf = ReorderBuffer::new();
		buf.receive(data(0, b'a'));

		let d = buf.receive(data(0, b'a'));
		assert!(d.ready.is_empty());
		assert_eq!(d.acks, vec![0]);
	}

	#[test]
	fn duplicate_already_queued_is_discarded_silently() {
		let mut buf = ReorderBuffer::new();
		buf.receive(data(5, b'f')); // buffered, waiting on 0..4
		let d = buf.receive(data(5, b'f')); // duplicate of a buffered (not yet delivered) seq
		assert!(d.ready.is_empty());
		assert!(d.acks.is_empty());
	}
}
