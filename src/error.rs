//! Error taxonomies for the engine's write-path and lifecycle operations.
//!
//! Small `Copy` structs/enums with hand written `Display` impls rather than
//! a `thiserror` derive, since this crate has no `alloc` to spend on boxed
//! dynamic errors.

use core::fmt;

/// The write buffer passed to a header-writing function was too small.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferTooSmallError {
	/// The number of bytes required.
	pub required: usize,
	/// The number of bytes actually available.
	pub actual: usize,
}

impl BufferTooSmallError {
	pub(crate) fn check(required: usize, actual: usize) -> Result<(), Self> {
		if actual >= required {
			Ok(())
		} else {
			Err(Self { required, actual })
		}
	}
}

impl fmt::Display for BufferTooSmallError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "buffer too small: need {} bytes, got {}", self.required, self.actual)
	}
}

impl core::error::Error for BufferTooSmallError {}

/// [`crate::Engine::write_header`] could not fill the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteHeaderError {
	/// The engine has never completed a sync handshake.
	NotSynced,
	/// The payload is larger than the protocol's 255-byte limit.
	PayloadTooBig {
		/// The payload length that was rejected.
		len: usize,
	},
	/// The output buffer cannot hold a full header.
	BufferTooSmall(BufferTooSmallError),
}

impl From<BufferTooSmallError> for WriteHeaderError {
	fn from(error: BufferTooSmallError) -> Self {
		Self::BufferTooSmall(error)
	}
}

impl fmt::Display for WriteHeaderError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::NotSynced => write!(f, "cannot write a data header before the first sync handshake completes"),
			Self::PayloadTooBig { len } => write!(f, "payload of {len} bytes exceeds the 255-byte limit"),
			Self::BufferTooSmall(error) => write!(f, "{error}"),
		}
	}
}

impl core::error::Error for WriteHeaderError {}

/// [`crate::Engine::sync_reply_sent`] was called outside of the states that
/// allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrongStateError;

impl fmt::Display for WrongStateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "sync_reply_sent() called outside WriteSyncReply/Idle")
	}
}

impl core::error::Error for WrongStateError {}

/// Outcome of a single [`crate::Engine::read_bytes`] call.
///
/// Not a [`Result`]: for this protocol, "not enough data yet" and "garbage
/// byte, resynchronizing" are routine, expected results of reading an
/// unreliable stream, not exceptional conditions — the driver branches on
/// all five variants the same way (inspect `consumed`, keep calling).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
	/// The call made progress and the unit of work (strobe, header, or
	/// payload) was accepted.
	Ok,
	/// No read is applicable in the current state (e.g. while waiting for
	/// the driver to send the sync reply).
	Nope,
	/// The byte did not match what was expected; the engine resynchronized.
	UnexpectedData,
	/// A CRC check failed; the frame was discarded.
	ChecksumMismatch,
	/// The caller did not supply enough bytes; state is unchanged and the
	/// caller should retry with more data.
	InsufficientData,
}

impl fmt::Display for ReadOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let text = match self {
			Self::Ok => "ok",
			Self::Nope => "no read applicable",
			Self::UnexpectedData => "unexpected data, resynchronizing",
			Self::ChecksumMismatch => "checksum mismatch, frame discarded",
			Self::InsufficientData => "insufficient data, retry with more bytes",
		};
		f.write_str(text)
	}
}
