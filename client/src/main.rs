use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream, UdpSocket};
use std::path::PathBuf;

use protocol::control::{ClientMessage, ServerMessage};
use protocol::receiver::{self, Receiver};

struct Config {
	download_dir: PathBuf,
	loss_rate: f64,
}

fn main() {
	runtime::logger::init();

	let server_ip: Ipv4Addr = runtime::prompt::prompt("Server IP");
	let server_tcp_port: u16 = runtime::prompt::prompt_range("Server TCP port", 1, 65535);
	let download_dir = runtime::prompt::prompt_existing_path("Local download directory");
	let loss_rate: f64 = runtime::prompt::prompt_range("Simulated ACK loss rate", 0.0, 1.0);

	let config = Config { download_dir, loss_rate };

	let mut stream = match TcpStream::connect((server_ip, server_tcp_port)) {
		Ok(s) => s,
		Err(e) => {
			log::error!("failed to connect to {server_ip}:{server_tcp_port}: {e}");
			std::process::exit(1);
		}
	};

	println!("connected. commands: /q (quit), /l (list files), /d <ip>:<port> <filename> (download)");

	loop {
		print!("> ");
		let _ = std::io::stdout().flush();

		let mut line = String::new();
		if std::io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
			break;
		}

		let line = line.trim();

		if line == "/q" {
			let _ = stream.write_all(&ClientMessage::Quit.serialize());
			break;
		} else if line == "/l" {
			if let Err(e) = list_files(&mut stream) {
				log::warn!("list-files request failed: {e}");
			}
		} else if let Some(rest) = line.strip_prefix("/d ") {
			match parse_download_args(rest) {
				Some((client_udp, filename)) => {
					if let Err(e) = download(&mut stream, &config, client_udp, &filename) {
						log::warn!("download of {filename} failed: {e}");
					}
				}
				None => eprintln!("usage: /d <ip>:<port> <filename>"),
			}
		} else if !line.is_empty() {
			eprintln!("unrecognized command: {line}");
		}
	}
}

fn parse_download_args(rest: &str) -> Option<(SocketAddrV4, String)> {
	let (addr, filename) = rest.split_once(' ')?;
	let client_udp: SocketAddrV4 = addr.parse().ok()?;

	if filename.is_empty() {
		return None;
	}

	Some((client_udp, filename.to_string()))
}

fn list_files(stream: &mut TcpStream) -> std::io::Result<()> {
	stream.write_all(&ClientMessage::ListFiles.serialize())?;

	let mut buf = [0u8; 8192];
	let n = stream.read(&mut buf)?;

	match ServerMessage::parse(&buf[..n]) {
		Ok(Some(ServerMessage::ListFilesResponse { files })) => {
			println!("{} file(s):", files.len());
			for name in files {
				println!("  {name}");
			}
		}
		_ => eprintln!("server sent an unexpected reply to list-files"),
	}

	Ok(())
}

fn download(stream: &mut TcpStream, config: &Config, client_udp: SocketAddrV4, filename: &str) -> std::io::Result<()> {
	stream.write_all(&ClientMessage::Download { client_udp, filename: filename.to_string() }.serialize())?;

	let mut buf = [0u8; 8192];
	let n = stream.read(&mut buf)?;

	let response = ServerMessage::parse(&buf[..n]);

	let (server_udp, session_id, file_length) = match response {
		Ok(Some(ServerMessage::DownloadResponse { server_udp, session_id, file_length })) => (server_udp, session_id, file_length),
		Ok(Some(ServerMessage::DownloadError)) => {
			println!("server reports {filename} is unavailable");
			return Ok(());
		}
		_ => {
			eprintln!("server sent an unexpected reply to download request");
			return Ok(());
		}
	};

	log::info!("session {session_id}: downloading {filename} ({file_length} bytes) from {server_udp}");

	let socket = UdpSocket::bind(("0.0.0.0", client_udp.port()))?;
	let output_path = config.download_dir.join(filename);
	let output = receiver::open_output(&output_path)?;

	receiver::send_start(&socket, SocketAddr::V4(server_udp), session_id)?;

	let receiving = Receiver::new(socket, SocketAddr::V4(server_udp), session_id, output, config.loss_rate);

	// One receive thread per client, separate from the interactive command
	// loop; the command loop waits for this download to finish before
	// prompting again.
	let handle = std::thread::spawn(move || receiving.run());
	let _ = handle.join();

	println!("file successfully reconstructed: {}", output_path.display());

	Ok(())
}
