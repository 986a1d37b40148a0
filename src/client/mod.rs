// ABOUTME: Client module for voxrelay
// ABOUTME: Audio device wiring and the network session

/// cpal capture/playback streams bridged to frame channels
pub mod audio;
/// TCP session: handshake, uplink and downlink loops
pub mod session;

pub use audio::{open_capture_stream, open_playback_stream, AudioConfig};
pub use session::VoiceSession;
