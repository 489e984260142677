//! Integration-style tests driving the sender and receiver against each
//! other over real loopback UDP sockets (spec §8 Invariant 1 / Scenarios
//! 1 and 2/4).

use std::fs;
use std::net::UdpSocket;
use std::time::Duration;

use protocol::file;
use protocol::receiver::Receiver;
use protocol::session::Registry;
use protocol::window::{Params, Sender};

fn run_round_trip(content: &[u8], params: Params) -> Vec<u8> {
	run_round_trip_with_ack_loss(content, params, 0.0)
}

fn run_round_trip_with_ack_loss(content: &[u8], params: Params, ack_loss_rate: f64) -> Vec<u8> {
	let registry = Registry::new();
	let session_id = registry.allocate();

	let src = tempfile::NamedTempFile::new().unwrap();
	fs::write(src.path(), content).unwrap();

	let packets = file::pack(session_id, src.path());

	let server_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
	let client_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
	let client_addr = client_socket.local_addr().unwrap();
	let server_addr = server_socket.local_addr().unwrap();

	let sender = Sender::new(server_socket, client_addr, session_id, packets, params);

	let dst = tempfile::NamedTempFile::new().unwrap();
	let output = fs::File::create(dst.path()).unwrap();
	let receiver = Receiver::new(client_socket, server_addr, session_id, output, ack_loss_rate);

	let sender_handle = std::thread::spawn(move || sender.run());
	let receiver_handle = std::thread::spawn(move || receiver.run());

	sender_handle.join().unwrap();
	receiver_handle.join().unwrap();

	fs::read(dst.path()).unwrap()
}

#[test]
fn zero_loss_single_file_round_trips_byte_identical() {
	let content: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();

	let params = Params { window: 4, timeout: Duration::from_millis(50), loss_rate: 0.0 };

	assert_eq!(run_round_trip(&content, params), content);
}

#[test]
fn lossy_transfer_still_converges_to_the_original_file() {
	let content: Vec<u8> = (0..4000u32).map(|i| (i * 7 % 256) as u8).collect();

	// Both directions drop packets some of the time; retransmission and
	// re-acking must still bring the transfer to completion.
	let params = Params { window: 5, timeout: Duration::from_millis(20), loss_rate: 0.3 };

	assert_eq!(run_round_trip_with_ack_loss(&content, params, 0.2), content);
}

#[test]
fn small_file_under_one_packet_round_trips() {
	let content = b"hello, world".to_vec();

	let params = Params { window: 4, timeout: Duration::from_millis(50), loss_rate: 0.0 };

	assert_eq!(run_round_trip(&content, params), content);
}
