//! Illustrative secondary-side driver: opens a serial port with `serial2`,
//! drives a [`linkframe::Engine`] off it, answers the sync handshake, and
//! echoes back any data packet it receives under a fresh packet id.
//!
//! Open a port, loop, react to what comes back; treat a read timeout as
//! "nothing yet" rather than an error.

use std::path::PathBuf;
use std::time::Duration;

use linkframe::{Engine, Operation, ReadOutcome};

fn main() {
	env_logger::init();

	let path: PathBuf = std::env::args().nth(1).unwrap_or_else(|| "/dev/ttyACM0".into()).into();
	let baud: u32 = std::env::args().nth(2).and_then(|arg| arg.parse().ok()).unwrap_or(115200);

	let port = serial2::SerialPort::open(&path, baud).unwrap_or_else(|e| panic!("failed to open serial port {}: {e}", path.display()));
	port.set_read_timeout(Duration::from_millis(50)).expect("failed to set read timeout");

	let mut engine = Engine::new_secondary();
	let mut read_buf = [0u8; 256];
	let mut payload_buf = [0u8; linkframe::MAX_PAYLOAD_SIZE];

	loop {
		let next = engine.next_operation();
		match next.operation {
			Operation::Nope => continue,
			Operation::SendSyncReply => send_sync_reply(&port, &mut engine),
			Operation::ReadHeader | Operation::ReadPayload => {
				if next.size == 0 {
					// A zero-length payload: nothing to read, just advance.
					let (outcome, _) = engine.read_bytes(&[]);
					handle_outcome(&port, &mut engine, outcome, next.id, &payload_buf[..0]);
					continue;
				}

				let want = next.size.min(read_buf.len());
				let read = match port.read(&mut read_buf[..want]) {
					Ok(n) => n,
					Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
					Err(e) => panic!("serial read failed: {e}"),
				};
				if read == 0 {
					continue;
				}

				let (outcome, consumed) = engine.read_bytes(&read_buf[..read]);
				if next.operation == Operation::ReadPayload && outcome == ReadOutcome::Ok {
					payload_buf[..consumed].copy_from_slice(&read_buf[..consumed]);
					handle_outcome(&port, &mut engine, outcome, next.id, &payload_buf[..consumed]);
				} else {
					handle_outcome(&port, &mut engine, outcome, next.id, &[]);
				}
			},
		}
	}
}

fn handle_outcome(port: &serial2::SerialPort, engine: &mut Engine, outcome: ReadOutcome, id: linkframe::PacketId, payload: &[u8]) {
	match outcome {
		ReadOutcome::Ok if !payload.is_empty() => {
			log::info!("packet {id} with {} payload bytes", payload.len());
			echo_back(port, engine, payload);
		},
		ReadOutcome::Ok | ReadOutcome::Nope | ReadOutcome::InsufficientData => {},
		ReadOutcome::UnexpectedData => log::warn!("unexpected byte, resynchronizing"),
		ReadOutcome::ChecksumMismatch => log::warn!("checksum mismatch, frame discarded"),
	}
}

fn send_sync_reply(port: &serial2::SerialPort, engine: &mut Engine) {
	let mut reply = [0u8; linkframe::SYNC_REPLY_HEADER_SIZE];
	engine.write_sync_reply_header(&mut reply).expect("buffer sized for sync reply");
	if let Err(e) = port.write_all(&reply) {
		log::warn!("failed to write sync reply: {e}");
		return;
	}
	engine.sync_reply_sent().expect("engine was in WriteSyncReply");
	log::info!("sync reply sent");
}

fn echo_back(port: &serial2::SerialPort, engine: &mut Engine, payload: &[u8]) {
	let id = engine.next_id();
	let total = linkframe::packet_size(payload.len());
	let mut frame = [0u8; linkframe::HEADER_SIZE + linkframe::MAX_PAYLOAD_SIZE];
	let (header, body) = frame[..total].split_at_mut(linkframe::HEADER_SIZE);

	if let Err(e) = engine.write_header(header, id, payload) {
		log::warn!("failed to build echo header: {e}");
		return;
	}
	body.copy_from_slice(payload);
	if let Err(e) = port.write_all(&frame[..total]) {
		log::warn!("failed to write echo packet: {e}");
	}
}
