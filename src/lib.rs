//! Driver-agnostic framing, sync, and CRC engine for a point-to-point
//! microcontroller serial protocol.
//!
//! [`Engine`] parses an unreliable byte stream into data packets and sync
//! handshakes without owning any buffers or performing any I/O itself: the
//! driver supplies byte slices from whatever transport it has (UART, USB
//! CDC, a mock in a test) and acts on the [`NextOperation`] advice the
//! engine hands back. This keeps the engine usable on `no_std` targets with
//! no allocator.
#![no_std]

#[macro_use]
mod log;

pub mod crc;
mod engine;
mod error;
mod state;
mod wire;

pub use engine::Engine;
pub use error::{BufferTooSmallError, ReadOutcome, WriteHeaderError, WrongStateError};
pub use state::State;
pub use wire::{packet_size, NextOperation, Operation, PacketId, HEADER_SIZE, MAX_PAYLOAD_SIZE, SYNC_HEADER_SIZE, SYNC_REPLY_HEADER_SIZE};
