// ABOUTME: Protocol module for the voxrelay wire format
// ABOUTME: Provides frame transport and handshake primitives

/// Fixed-size PCM frame transport and the name handshake
pub mod frame;

pub use frame::{read_frame, read_name, write_frame, write_name, AudioFrame};
