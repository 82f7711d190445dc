use crate::crc;
use crate::error::{BufferTooSmallError, ReadOutcome, WriteHeaderError, WrongStateError};
use crate::state::{PayloadState, State};
use crate::wire::{self, NextOperation, Operation, PacketId};

/// The secondary-side protocol engine.
///
/// Owns no buffers beyond its own fixed-size fields: every read and write
/// operates on a caller-supplied slice for the duration of a single call.
/// Not `Clone`: two engines consuming the same byte stream would each only
/// see half of it, which is never useful.
#[derive(Debug)]
pub struct Engine {
	state: State,
	was_synced: bool,
	seq_id: u16,
	payload: PayloadState,
}

impl Default for Engine {
	fn default() -> Self {
		Self::new_secondary()
	}
}

impl Engine {
	/// Build a fresh secondary engine, starting in [`State::WaitingSync`].
	///
	/// A primary-side counterpart (which would initiate the sync handshake
	/// rather than answer it) is not implemented; see `DESIGN.md`.
	pub const fn new_secondary() -> Self {
		Self {
			state: State::WaitingSync,
			was_synced: false,
			seq_id: 0,
			payload: PayloadState::cleared(),
		}
	}

	/// The engine's current state, mostly useful for diagnostics and tests.
	pub fn state(&self) -> State {
		self.state
	}

	/// Whether a sync handshake has ever completed.
	pub fn was_synced(&self) -> bool {
		self.was_synced
	}

	/// What the driver should do next. Does not mutate the engine.
	pub fn next_operation(&self) -> NextOperation {
		match self.state {
			State::WaitingSync
			| State::Idle
			| State::ReadStrobe2
			| State::ReadSyncStrobe2
			| State::ReadSyncStrobe3
			| State::ReadSyncStrobe4 => NextOperation::new(Operation::ReadHeader, 1, 0),
			State::WriteSyncReply => NextOperation::new(Operation::SendSyncReply, 0, 0),
			State::ReadHeader => NextOperation::new(Operation::ReadHeader, wire::HEADER_BODY_SIZE, 0),
			State::ReadPayload => NextOperation::new(Operation::ReadPayload, self.payload.len as usize, self.payload.packet_id),
		}
	}

	/// Feed up to `data.len()` bytes to the parser. Returns the outcome and
	/// the number of leading bytes of `data` that were actually consumed;
	/// the caller is responsible for the rest.
	pub fn read_bytes(&mut self, data: &[u8]) -> (ReadOutcome, usize) {
		match self.state {
			State::WaitingSync => self.read_strobe(data, wire::SYNC_REQUEST[0], State::ReadSyncStrobe2, State::WaitingSync),
			State::Idle => self.read_strobe_or_sync(data),
			State::ReadStrobe2 => self.read_strobe(data, wire::STROBE_2, State::ReadHeader, State::Idle),
			State::ReadSyncStrobe2 => {
				let resync = self.resync_target();
				self.read_strobe(data, wire::SYNC_REQUEST[1], State::ReadSyncStrobe3, resync)
			},
			State::ReadSyncStrobe3 => {
				let resync = self.resync_target();
				self.read_strobe(data, wire::SYNC_REQUEST[2], State::ReadSyncStrobe4, resync)
			},
			State::ReadSyncStrobe4 => {
				let resync = self.resync_target();
				self.read_strobe(data, wire::SYNC_REQUEST[3], State::WriteSyncReply, resync)
			},
			State::WriteSyncReply => (ReadOutcome::Nope, 0),
			State::ReadHeader => self.read_header(data),
			State::ReadPayload => self.read_payload(data),
		}
	}

	/// Fill `out[..HEADER_SIZE]` with a data-packet header for `payload`,
	/// seeded with `id`. Does not transmit and does not mutate the engine.
	pub fn write_header(&self, out: &mut [u8], id: PacketId, payload: &[u8]) -> Result<(), WriteHeaderError> {
		if matches!(self.state, State::WaitingSync) {
			return Err(WriteHeaderError::NotSynced);
		}
		if payload.len() > wire::MAX_PAYLOAD_SIZE {
			return Err(WriteHeaderError::PayloadTooBig { len: payload.len() });
		}
		BufferTooSmallError::check(wire::HEADER_SIZE, out.len())?;

		out[0] = wire::STROBE_1;
		out[1] = wire::STROBE_2;
		out[2..4].copy_from_slice(&id.to_be_bytes());
		out[4] = payload.len() as u8;
		out[5] = crc::crc8(&out[2..5]);
		let crc16 = crc::crc16(&out[2..6]);
		let crc16 = crc::crc16_continue(crc16, payload);
		out[6..8].copy_from_slice(&crc16.to_be_bytes());
		trace!("wrote header for packet {id}, payload {} bytes", payload.len());
		Ok(())
	}

	/// Fill `out[..SYNC_REPLY_HEADER_SIZE]` with the sync reply bytes.
	/// Always succeeds given a large enough buffer; does not mutate the
	/// engine.
	pub fn write_sync_reply_header(&self, out: &mut [u8]) -> Result<(), BufferTooSmallError> {
		BufferTooSmallError::check(wire::SYNC_REPLY_HEADER_SIZE, out.len())?;
		out[..wire::SYNC_REPLY_HEADER_SIZE].copy_from_slice(&wire::SYNC_REPLY);
		Ok(())
	}

	/// Tell the engine the driver has transmitted the sync reply bytes.
	pub fn sync_reply_sent(&mut self) -> Result<(), WrongStateError> {
		match self.state {
			State::WriteSyncReply => {
				self.state = State::Idle;
				self.was_synced = true;
				self.payload.clear();
				trace!("sync reply sent, now synced");
				Ok(())
			},
			State::Idle => Ok(()),
			_ => Err(WrongStateError),
		}
	}

	/// The next packet id to use, skipping 0 on wraparound.
	pub fn next_id(&mut self) -> PacketId {
		self.seq_id = self.seq_id.wrapping_add(1);
		if self.seq_id == 0 {
			self.seq_id = self.seq_id.wrapping_add(1);
		}
		self.seq_id
	}

	fn resync_target(&self) -> State {
		if self.was_synced {
			State::Idle
		} else {
			State::WaitingSync
		}
	}

	fn read_strobe(&mut self, data: &[u8], expect: u8, next: State, resync: State) -> (ReadOutcome, usize) {
		let Some(&byte) = data.first() else {
			return (ReadOutcome::InsufficientData, 0);
		};
		if byte != expect {
			warn!("unexpected byte {byte:#04X}, expected {expect:#04X}; resyncing to {resync:?}");
			self.state = resync;
			return (ReadOutcome::UnexpectedData, 1);
		}
		self.state = next;
		(ReadOutcome::Ok, 1)
	}

	fn read_strobe_or_sync(&mut self, data: &[u8]) -> (ReadOutcome, usize) {
		let Some(&byte) = data.first() else {
			return (ReadOutcome::InsufficientData, 0);
		};
		match byte {
			wire::STROBE_1 => {
				self.state = State::ReadStrobe2;
				(ReadOutcome::Ok, 1)
			},
			b if b == wire::SYNC_REQUEST[0] => {
				self.state = State::ReadSyncStrobe2;
				(ReadOutcome::Ok, 1)
			},
			_ => {
				warn!("unexpected byte {byte:#04X} while idle");
				self.state = State::Idle;
				(ReadOutcome::UnexpectedData, 1)
			},
		}
	}

	fn read_header(&mut self, data: &[u8]) -> (ReadOutcome, usize) {
		if data.len() < wire::HEADER_BODY_SIZE {
			return (ReadOutcome::InsufficientData, 0);
		}
		let header = &data[..wire::HEADER_BODY_SIZE];
		let crc8 = crc::crc8(&header[0..3]);
		if crc8 != header[3] {
			warn!("header CRC-8 mismatch: computed {crc8:#04X}, header says {:#04X}", header[3]);
			self.state = State::Idle;
			return (ReadOutcome::ChecksumMismatch, 4);
		}

		self.payload = PayloadState {
			len: header[2],
			packet_id: u16::from_be_bytes([header[0], header[1]]),
			crc16: u16::from_be_bytes([header[4], header[5]]),
			crc16_running: crc::crc16(&header[0..4]),
		};
		self.state = State::ReadPayload;
		trace!("header ok, packet {} expects {} payload bytes", self.payload.packet_id, self.payload.len);
		(ReadOutcome::Ok, wire::HEADER_BODY_SIZE)
	}

	fn read_payload(&mut self, data: &[u8]) -> (ReadOutcome, usize) {
		let len = self.payload.len as usize;
		if data.len() < len {
			return (ReadOutcome::InsufficientData, 0);
		}

		let crc16 = crc::crc16_continue(self.payload.crc16_running, &data[..len]);
		let expected = self.payload.crc16;
		self.payload.clear();
		self.state = State::Idle;

		if crc16 != expected {
			warn!("payload CRC-16 mismatch: computed {crc16:#06X}, header says {expected:#06X}");
			return (ReadOutcome::ChecksumMismatch, len);
		}
		(ReadOutcome::Ok, len)
	}
}

#[cfg(test)]
mod test {
	use assert2::{assert, let_assert};

	use super::*;

	fn synced_engine() -> Engine {
		let mut engine = Engine::new_secondary();
		for &byte in &wire::SYNC_REQUEST {
			let (outcome, consumed) = engine.read_bytes(&[byte]);
			assert!(outcome == ReadOutcome::Ok);
			assert!(consumed == 1);
		}
		let mut reply = [0u8; wire::SYNC_REPLY_HEADER_SIZE];
		assert!(engine.write_sync_reply_header(&mut reply).is_ok());
		assert!(reply == wire::SYNC_REPLY);
		assert!(engine.sync_reply_sent().is_ok());
		engine
	}

	#[test]
	fn starts_waiting_sync() {
		let engine = Engine::new_secondary();
		assert!(engine.state() == State::WaitingSync);
		assert!(!engine.was_synced());
		assert!(engine.next_operation() == NextOperation::new(Operation::ReadHeader, 1, 0));
	}

	#[test]
	fn sync_handshake_reaches_idle() {
		let engine = synced_engine();
		assert!(engine.state() == State::Idle);
		assert!(engine.was_synced());
	}

	#[test]
	fn not_synced_guards() {
		let mut engine = Engine::new_secondary();
		let mut header = [0u8; wire::HEADER_SIZE];
		let_assert!(Err(error) = engine.write_header(&mut header, 1, &[]));
		assert!(error == WriteHeaderError::NotSynced);
		assert!(engine.sync_reply_sent() == Err(WrongStateError));
	}

	#[test]
	fn round_trip_small_payload() {
		let mut engine = synced_engine();
		let id = engine.next_id();
		assert!(id == 1);

		let payload = [0x0A, 0x2B, 0x30, 0x45];
		let mut frame = [0u8; wire::HEADER_SIZE + 4];
		assert!(engine.write_header(&mut frame[..wire::HEADER_SIZE], id, &payload).is_ok());
		frame[wire::HEADER_SIZE..].copy_from_slice(&payload);

		let (outcome, consumed) = engine.read_bytes(&frame[..2]);
		assert!(outcome == ReadOutcome::Ok && consumed == 1);
		let (outcome, consumed) = engine.read_bytes(&frame[1..2]);
		assert!(outcome == ReadOutcome::Ok && consumed == 1);

		let next = engine.next_operation();
		assert!(next == NextOperation::new(Operation::ReadHeader, wire::HEADER_BODY_SIZE, 0));
		let (outcome, consumed) = engine.read_bytes(&frame[2..wire::HEADER_SIZE]);
		assert!(outcome == ReadOutcome::Ok && consumed == wire::HEADER_BODY_SIZE);

		let next = engine.next_operation();
		assert!(next == NextOperation::new(Operation::ReadPayload, 4, id));
		let (outcome, consumed) = engine.read_bytes(&frame[wire::HEADER_SIZE..]);
		assert!(outcome == ReadOutcome::Ok && consumed == 4);
		assert!(engine.state() == State::Idle);
	}

	#[test]
	fn header_checksum_error_consumes_four_and_resyncs() {
		let mut engine = synced_engine();
		engine.read_bytes(&[wire::STROBE_1]);
		engine.read_bytes(&[wire::STROBE_2]);
		// Tampered id: 0x10 instead of 0x00.
		let frame = [0x10, 0x01, 0x04, 0x09, 0x24, 0xEA];
		let (outcome, consumed) = engine.read_bytes(&frame);
		assert!(outcome == ReadOutcome::ChecksumMismatch);
		assert!(consumed == 4);
		assert!(engine.state() == State::Idle);
	}

	#[test]
	fn payload_checksum_error_consumes_full_length_and_resyncs() {
		let mut engine = synced_engine();
		engine.read_bytes(&[wire::STROBE_1]);
		engine.read_bytes(&[wire::STROBE_2]);
		let header = [0x00, 0x01, 0x04, 0x09, 0x24, 0xEA];
		let (outcome, consumed) = engine.read_bytes(&header);
		assert!(outcome == ReadOutcome::Ok && consumed == 6);
		// Tampered payload byte: 0x3B instead of 0x2B.
		let payload = [0x0A, 0x3B, 0x30, 0x45];
		let (outcome, consumed) = engine.read_bytes(&payload);
		assert!(outcome == ReadOutcome::ChecksumMismatch);
		assert!(consumed == 4);
		assert!(engine.state() == State::Idle);
	}

	#[test]
	fn resync_after_wrong_second_strobe() {
		let mut engine = synced_engine();
		let (outcome, consumed) = engine.read_bytes(&[wire::STROBE_1]);
		assert!(outcome == ReadOutcome::Ok && consumed == 1);
		let (outcome, consumed) = engine.read_bytes(&[0x93]);
		assert!(outcome == ReadOutcome::UnexpectedData && consumed == 1);
		assert!(engine.state() == State::Idle);
		let (outcome, consumed) = engine.read_bytes(&[wire::STROBE_1]);
		assert!(outcome == ReadOutcome::Ok && consumed == 1);
	}

	#[test]
	fn oversized_payload_rejected() {
		let engine = synced_engine();
		let payload = [0u8; 256];
		let mut header = [0u8; wire::HEADER_SIZE];
		let_assert!(Err(error) = engine.write_header(&mut header, 1, &payload));
		assert!(error == WriteHeaderError::PayloadTooBig { len: 256 });
	}

	#[test]
	fn sync_reply_sent_idempotent_in_idle() {
		let mut engine = synced_engine();
		assert!(engine.sync_reply_sent().is_ok());
		assert!(engine.state() == State::Idle);
	}

	#[test]
	fn short_header_read_defers_without_state_change() {
		let mut engine = synced_engine();
		engine.read_bytes(&[wire::STROBE_1]);
		engine.read_bytes(&[wire::STROBE_2]);
		assert!(engine.state() == State::ReadHeader);
		let (outcome, consumed) = engine.read_bytes(&[0x00, 0x01, 0x04]);
		assert!(outcome == ReadOutcome::InsufficientData);
		assert!(consumed == 0);
		assert!(engine.state() == State::ReadHeader);
	}

	#[test]
	fn never_synced_resync_returns_to_waiting_sync() {
		let mut engine = Engine::new_secondary();
		engine.read_bytes(&wire::SYNC_REQUEST[..1]);
		let (outcome, _) = engine.read_bytes(&[0x00]);
		assert!(outcome == ReadOutcome::UnexpectedData);
		assert!(engine.state() == State::WaitingSync);
	}
}
