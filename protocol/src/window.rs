//! The sliding-window sender (spec §4.5), grounded in the original
//! `Session::Execute()`/`ListenForAck()` (AckMask/SentMask/SentTime arrays,
//! shift-on-ack-of-slot-0 window advance). The window bookkeeping lives in
//! [`WindowState`], a pure struct with no socket or clock dependency beyond
//! an injected `Instant`, so its invariants are directly unit-testable; the
//! I/O loop lives in [`Sender`].
//!
//! Unlike the original (one thread sending, one thread listening for ACKs
//! per session), this follows the spec's simpler single-loop design: one
//! thread per session, alternating transmit and receive.

use std::collections::VecDeque;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::packet::Packet;
use utils::error::Ext;

#[derive(Debug, Clone, Copy)]
pub struct Params {
	/// Window size `W`, 1..=100.
	pub window: usize,
	/// Per-packet ACK timeout.
	pub timeout: Duration,
	/// Probability, in `[0.0, 1.0]`, that an outgoing packet is dropped
	/// before it reaches the wire.
	pub loss_rate: f64,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
	sent: bool,
	acked: bool,
	sent_time: Option<Instant>,
}

impl Slot {
	fn fresh() -> Self {
		Self { sent: false, acked: false, sent_time: None }
	}
}

/// Pure sliding-window bookkeeping: which sequence numbers are in flight,
/// which slots are due for (re)transmission, and how an ACK moves the
/// window base forward. Holds no socket.
pub struct WindowState {
	window: usize,
	timeout: Duration,
	total: usize,
	base: usize,
	slots: VecDeque<Slot>,
}

impl WindowState {
	pub fn new(window: usize, timeout: Duration, total: usize) -> Self {
		let mut state = Self { window, timeout, total, base: 0, slots: VecDeque::new() };
		state.fill();
		state
	}

	fn fill(&mut self) {
		while self.slots.len() < self.window && self.base + self.slots.len() < self.total {
			self.slots.push_back(Slot::fresh());
		}
	}

	/// Sequence numbers that should be (re)transmitted right now: either
	/// never sent, or sent and not yet acked but past their deadline.
	pub fn due(&self, now: Instant) -> Vec<usize> {
		self.slots
			.iter()
			.enumerate()
			.filter(|(_, slot)| !slot.sent || (!slot.acked && slot.sent_time.is_some_and(|t| now.duration_since(t) >= self.timeout)))
			.map(|(i, _)| self.base + i)
			.collect()
	}

	/// Records that `seq` was just transmitted (or was selected for
	/// simulated loss, which still starts its retransmission timer).
	pub fn record_sent(&mut self, seq: usize, now: Instant) {
		if let Some(slot) = self.slot_mut(seq) {
			slot.sent = true;
			slot.sent_time = Some(now);
		}
	}

	/// Records an ACK for `seq`. Out-of-window and below-base (duplicate)
	/// ACKs are ignored, per spec §4.5 step 3.
	pub fn record_ack(&mut self, seq: u32) {
		let seq = seq as usize;

		if seq < self.base {
			return;
		}

		if let Some(slot) = self.slot_mut(seq) {
			slot.acked = true;
		}
	}

	/// Advances `base` past every contiguously-acked leading slot and tops
	/// the window back up.
	pub fn advance(&mut self) {
		while self.slots.front().is_some_and(|s| s.acked) {
			self.slots.pop_front();
			self.base += 1;
		}

		self.fill();
	}

	pub fn is_complete(&self) -> bool {
		self.base == self.total
	}

	pub fn base(&self) -> usize {
		self.base
	}

	fn slot_mut(&mut self, seq: usize) -> Option<&mut Slot> {
		if seq < self.base {
			return None;
		}

		self.slots.get_mut(seq - self.base)
	}
}

/// Drives a `WindowState` over a real UDP socket: transmits due packets,
/// injects simulated loss, waits for ACKs with a receive timeout, and
/// terminates the session with FIN once every packet has been acked.
pub struct Sender {
	socket: UdpSocket,
	client: SocketAddr,
	session_id: u32,
	packets: Vec<Packet>,
	params: Params,
	state: WindowState,
}

const FIN_RETRIES: u32 = 3;

impl Sender {
	pub fn new(socket: UdpSocket, client: SocketAddr, session_id: u32, packets: Vec<Packet>, params: Params) -> Self {
		let state = WindowState::new(params.window, params.timeout, packets.len());

		Self { socket, client, session_id, packets, params, state }
	}

	/// Runs the send loop to completion, blocking the calling thread.
	pub fn run(mut self) {
		log::info!("session {} sending {} packet(s) to {}", self.session_id, self.packets.len(), self.client);

		let session_id = self.session_id;
		let result = self
			.socket
			.set_read_timeout(Some(self.params.timeout))
			.ok_or(|e| log::error!("session {session_id}: failed to set UDP read timeout: {e}"));
		if result.is_none() {
			return;
		}

		while !self.state.is_complete() {
			let now = Instant::now();

			for seq in self.state.due(now) {
				self.transmit(seq, now);
			}

			if let Some(seq) = self.receive_ack() {
				self.state.record_ack(seq);
			}

			self.state.advance();
		}

		self.send_fin();
		log::info!("session {} complete", self.session_id);
	}

	fn transmit(&mut self, seq: usize, now: Instant) {
		self.state.record_sent(seq, now);

		if self.simulated_loss() {
			log::debug!("session {}: simulating loss of packet {seq}", self.session_id);
			return;
		}

		let bytes = self.packets[seq].serialize();
		let session_id = self.session_id;
		self.socket
			.send_to(&bytes, self.client)
			.ok_or(|e| log::warn!("session {session_id}: failed to send packet {seq}: {e}"));
	}

	fn receive_ack(&mut self) -> Option<u32> {
		let mut buf = [0u8; crate::PACKET_SIZE + 64];
		let session_id = self.session_id;

		let n = self.socket.recv(&mut buf).ok_or(|e: std::io::Error| {
			if !matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) {
				log::warn!("session {session_id}: UDP receive failed: {e}");
			}
		})?;

		match Packet::parse(&buf[..n]) {
			Ok(p) if p.is_ack() && p.session_id == self.session_id => Some(p.sequence_no),
			Ok(_) => None,
			Err(_) => {
				log::warn!("session {session_id}: discarding malformed datagram");
				None
			}
		}
	}

	fn send_fin(&self) {
		let fin = Packet::fin(self.session_id).serialize();
		let session_id = self.session_id;

		for _ in 0..FIN_RETRIES {
			self.socket
				.send_to(&fin, self.client)
				.ok_or(|e| log::warn!("session {session_id}: failed to send FIN: {e}"));

			std::thread::sleep(self.params.timeout);
		}
	}

	fn simulated_loss(&self) -> bool {
		self.params.loss_rate > 0.0 && rand::thread_rng().gen_bool(self.params.loss_rate)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn window_bounds_hold_from_the_start() {
		let state = WindowState::new(4, Duration::from_millis(50), 10);
		assert_eq!(state.base(), 0);
		assert_eq!(state.due(Instant::now()).len(), 4);
	}

	#[test]
	fn ack_causality_advances_base_only_on_contiguous_prefix() {
		let mut state = WindowState::new(3, Duration::from_millis(50), 5);
		let now = Instant::now();

		for seq in state.due(now) {
			state.record_sent(seq, now);
		}

		// Ack sequence 1 before 0: base must not move yet.
		state.record_ack(1);
		state.advance();
		assert_eq!(state.base(), 0);

		// Now ack 0: base should jump straight to 2 (0 and 1 both acked).
		state.record_ack(0);
		state.advance();
		assert_eq!(state.base(), 2);
	}

	#[test]
	fn duplicate_and_out_of_range_acks_are_ignored() {
		let mut state = WindowState::new(2, Duration::from_millis(50), 5);
		let now = Instant::now();
		for seq in state.due(now) {
			state.record_sent(seq, now);
		}

		state.record_ack(0);
		state.advance();
		assert_eq!(state.base(), 1);

		// Duplicate ack for an already-passed sequence number: no effect.
		state.record_ack(0);
		state.advance();
		assert_eq!(state.base(), 1);

		// Out-of-window ack (base=1, window=2 -> valid range is [1,3)).
		state.record_ack(10);
		state.advance();
		assert_eq!(state.base(), 1);
	}

	#[test]
	fn retransmits_only_after_timeout_elapses() {
		let timeout = Duration::from_millis(20);
		let mut state = WindowState::new(2, timeout, 5);
		let t0 = Instant::now();

		for seq in state.due(t0) {
			state.record_sent(seq, t0);
		}

		// Immediately after sending, nothing is due yet.
		assert!(state.due(t0).is_empty());

		let later = t0 + Duration::from_millis(25);
		assert_eq!(state.due(later), vec![0, 1]);
	}

	#[test]
	fn completes_once_base_reaches_total() {
		let mut state = WindowState::new(2, Duration::from_millis(10), 2);
		let now = Instant::now();
		for seq in state.due(now) {
			state.record_sent(seq, now);
		}
		state.record_ack(0);
		state.record_ack(1);
		state.advance();

		assert!(state.is_complete());
	}
}
