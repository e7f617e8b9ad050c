//! Apiary Transport Layer
//!
//! Framing and encoding for the persistent transport.
//!
//! - **[`JsonCodec`]**: encode/decode envelopes to JSON bytes
//! - **[`frame`]**: length-prefixed frame I/O over any async stream
//!
//! Frames are capped at [`frame::MAX_FRAME_BYTES`] to bound allocation from
//! a misbehaving peer. The stateless HTTP transport has no framing of its
//! own and lives with the adapters that use it.

pub mod codec;
pub mod frame;

pub use codec::JsonCodec;

#[cfg(test)]
mod tests;
