use std::fs;
use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream, UdpSocket};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use protocol::control::{ClientMessage, ServerMessage};
use protocol::session::{Registry, Session};
use protocol::window::{Params, Sender};
use protocol::{file, repo};
use runtime::pool::{Pool, QUEUE_DEPTH, WORKERS};

struct Config {
	advertised_ip: Ipv4Addr,
	repo_dir: PathBuf,
	params: Params,
}

fn main() {
	runtime::logger::init();

	let advertised_ip: Ipv4Addr = runtime::prompt::prompt("Server IP to advertise to clients");
	let tcp_port: u16 = runtime::prompt::prompt_range("Server TCP port", 1, 65535);
	let repo_dir = runtime::prompt::prompt_existing_path("Download repository path");
	let window: usize = runtime::prompt::prompt_range("Window size (W)", 1, 100);
	let loss_rate: f64 = runtime::prompt::prompt_range("Simulated packet loss rate", 0.0, 1.0);
	let timeout_ms: u64 = runtime::prompt::prompt_range("ACK timeout (ms)", 10, 500);

	let config = Arc::new(Config {
		advertised_ip,
		repo_dir,
		params: Params { window, timeout: Duration::from_millis(timeout_ms), loss_rate },
	});

	let listener = match TcpListener::bind(("0.0.0.0", tcp_port)) {
		Ok(l) => l,
		Err(e) => {
			log::error!("failed to bind TCP listener on port {tcp_port}: {e}");
			std::process::exit(1);
		}
	};
	if let Err(e) = listener.set_nonblocking(true) {
		log::warn!("failed to set listener non-blocking, Ctrl+C may not interrupt accept(): {e}");
	}

	let registry = Arc::new(Registry::new());
	let shutdown = runtime::shutdown::install();

	log::info!("listening on 0.0.0.0:{tcp_port}, advertising {advertised_ip} to clients");

	let pool = Pool::new(WORKERS, QUEUE_DEPTH, move |stream: TcpStream| {
		if let Err(e) = stream.set_nonblocking(false) {
			log::warn!("failed to set client stream blocking: {e}");
		}

		if let Ok(addr) = stream.peer_addr() {
			log::info!("client connected: {addr}");
		}

		handle_client(stream, &config, &registry);
	});

	while !runtime::shutdown::requested(&shutdown) {
		match listener.accept() {
			Ok((stream, _addr)) => {
				if pool.produce(stream).is_err() {
					log::error!("worker pool is gone, stopping accept loop");
					break;
				}
			}
			Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
				std::thread::sleep(Duration::from_millis(100));
			}
			Err(e) => log::warn!("accept() failed: {e}"),
		}
	}

	log::info!("shutting down");
	pool.shutdown();
}

/// Reads and dispatches control-protocol commands from one client
/// connection until it quits, disconnects, or sends something
/// unrecognized.
fn handle_client(mut stream: TcpStream, config: &Config, registry: &Registry) {
	loop {
		let mut buf = [0u8; 8192];

		let n = match stream.read(&mut buf) {
			Ok(0) => {
				log::info!("client disconnected");
				return;
			}
			Ok(n) => n,
			Err(e) => {
				log::warn!("read from client failed: {e}");
				return;
			}
		};

		let message = match ClientMessage::parse(&buf[..n]) {
			Ok(Some(m)) => m,
			Ok(None) => {
				log::warn!("unrecognized command, closing connection");
				return;
			}
			Err(_) => {
				log::warn!("malformed command, closing connection");
				return;
			}
		};

		match message {
			ClientMessage::Quit => {
				log::info!("client requested quit");
				return;
			}
			ClientMessage::ListFiles => {
				if let Err(e) = respond_list_files(&mut stream, &config.repo_dir) {
					log::warn!("failed to answer list-files request: {e}");
					return;
				}
			}
			ClientMessage::Download { client_udp, filename } => {
				if let Err(e) = handle_download(&mut stream, config, registry, client_udp, &filename) {
					log::warn!("failed to service download of {filename}: {e}");
					return;
				}
			}
		}
	}
}

fn respond_list_files(stream: &mut TcpStream, repo_dir: &PathBuf) -> std::io::Result<()> {
	let files = repo::list(repo_dir)?;
	let names = files.into_iter().map(|(name, _)| name).collect();
	let response = ServerMessage::ListFilesResponse { files: names }.serialize();
	stream.write_all(&response)
}

fn handle_download(
	stream: &mut TcpStream,
	config: &Config,
	registry: &Registry,
	client_udp: SocketAddrV4,
	filename: &str,
) -> std::io::Result<()> {
	let Some(path) = repo::resolve(&config.repo_dir, filename) else {
		log::warn!("download request for unknown file {filename}");
		return stream.write_all(&ServerMessage::DownloadError.serialize());
	};

	let file_length = fs::metadata(&path)?.len();

	let socket = UdpSocket::bind((config.advertised_ip, 0))?;
	let server_port = socket.local_addr()?.port();

	let session = Session { id: registry.allocate(), client_udp, file_path: path, file_length };

	let response = ServerMessage::DownloadResponse {
		server_udp: SocketAddrV4::new(config.advertised_ip, server_port),
		session_id: session.id,
		file_length: session.file_length,
	}
	.serialize();
	stream.write_all(&response)?;

	let packets = file::pack(session.id, &session.file_path);

	Sender::new(socket, SocketAddr::V4(session.client_udp), session.id, packets, config.params).run();

	registry.release(session.id);

	Ok(())
}
