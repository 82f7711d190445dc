//! The closed set of parser states and the payload fields that are only
//! meaningful while reading one.

use crate::crc::CRC16_INIT;

/// Current position of the frame parser.
///
/// A closed enum rather than a raw tag byte: every transition is
/// exhaustively checked by the compiler, and there is no `Undefined` bit
/// pattern to guard against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
	/// No sync handshake has ever completed; waiting for the first sync
	/// strobe byte.
	WaitingSync,
	/// Synced at least once; waiting for either a data frame or a new sync
	/// handshake.
	Idle,
	/// Saw the data-frame strobe 1 (`0xA5`), waiting for strobe 2 (`0x63`).
	ReadStrobe2,
	/// Saw the sync strobe 1 (`0xD3`), waiting for strobe 2 (`0x74`).
	ReadSyncStrobe2,
	/// Saw sync strobes 1-2, waiting for strobe 3 (`0xE5`).
	ReadSyncStrobe3,
	/// Saw sync strobes 1-3, waiting for strobe 4 (`0x52`).
	ReadSyncStrobe4,
	/// Sync handshake complete; waiting for the driver to report that the
	/// sync reply has been transmitted.
	WriteSyncReply,
	/// Saw both data-frame strobes; waiting for the 6-byte header body.
	ReadHeader,
	/// Header verified; waiting for the declared payload length.
	ReadPayload,
}

/// Fields extracted from the current header, valid only in [`State::ReadPayload`].
#[derive(Debug, Clone, Copy)]
pub struct PayloadState {
	/// Declared payload length from the header (0..=255).
	pub len: u8,
	/// Packet id extracted from the header.
	pub packet_id: u16,
	/// Expected whole-packet CRC-16, as declared in the header.
	pub crc16: u16,
	/// Running CRC-16 accumulator, seeded by the header and continued over
	/// the payload as it arrives.
	pub crc16_running: u16,
}

impl PayloadState {
	/// The all-zero state with the CRC-16 accumulator at its initial value,
	/// matching the invariant that `payload.*` is meaningless outside
	/// [`State::ReadPayload`].
	pub const fn cleared() -> Self {
		Self {
			len: 0,
			packet_id: 0,
			crc16: 0,
			crc16_running: CRC16_INIT,
		}
	}

	pub fn clear(&mut self) {
		*self = Self::cleared();
	}
}

impl Default for PayloadState {
	fn default() -> Self {
		Self::cleared()
	}
}
