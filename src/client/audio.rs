// ABOUTME: Audio device wiring via cpal
// ABOUTME: Capture fills a frame channel from the mic; playback drains one into the speakers

use crate::error::Error;
use crate::protocol::frame::{AudioFrame, CHANNELS, SAMPLES_PER_FRAME, SAMPLE_RATE};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use std::collections::VecDeque;
use tokio::sync::mpsc;

/// Audio device configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Samples per frame handed to / taken from the network side
    pub frame_samples: usize,
    /// Capture/playback channel depth in frames; overflow drops frames
    pub queue_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS as u16,
            frame_samples: SAMPLES_PER_FRAME,
            queue_frames: 8,
        }
    }
}

impl AudioConfig {
    fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            channels: self.channels,
            sample_rate: SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        }
    }
}

/// Open the default input device and start capturing.
///
/// The cpal callback accumulates samples into whole frames and pushes them
/// onto the returned channel. The realtime thread never blocks: when the
/// channel is full the frame is dropped.
///
/// The returned [`Stream`] must be kept alive for capture to continue.
pub fn open_capture_stream(config: &AudioConfig) -> crate::Result<(Stream, mpsc::Receiver<AudioFrame>)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Audio("no default input device".to_string()))?;

    let (tx, rx) = mpsc::channel::<AudioFrame>(config.queue_frames);
    let frame_samples = config.frame_samples;
    let mut pending: Vec<f32> = Vec::with_capacity(frame_samples * 2);

    let stream = device
        .build_input_stream(
            &config.stream_config(),
            move |data: &[f32], _| {
                pending.extend_from_slice(data);
                while pending.len() >= frame_samples {
                    let frame: AudioFrame = pending.drain(..frame_samples).collect::<Vec<_>>().into();
                    if tx.try_send(frame).is_err() {
                        log::debug!("Capture queue full, frame dropped");
                    }
                }
            },
            |err| log::error!("Capture stream error: {}", err),
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;
    log::debug!("Capture stream open: {}Hz {}ch", config.sample_rate, config.channels);
    Ok((stream, rx))
}

/// Open the default output device and start playback.
///
/// The cpal callback drains whole frames from the returned channel into
/// the device buffer, filling with silence on underrun.
///
/// The returned [`Stream`] must be kept alive for playback to continue.
pub fn open_playback_stream(config: &AudioConfig) -> crate::Result<(Stream, mpsc::Sender<AudioFrame>)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no default output device".to_string()))?;

    let (tx, mut rx) = mpsc::channel::<AudioFrame>(config.queue_frames);
    let mut pending: VecDeque<f32> = VecDeque::new();

    let stream = device
        .build_output_stream(
            &config.stream_config(),
            move |out: &mut [f32], _| {
                for slot in out.iter_mut() {
                    if pending.is_empty() {
                        match rx.try_recv() {
                            Ok(frame) => pending.extend(frame.iter()),
                            Err(_) => {
                                // Underrun: no frame ready, play silence
                                *slot = 0.0;
                                continue;
                            }
                        }
                    }
                    *slot = pending.pop_front().unwrap_or(0.0);
                }
            },
            |err| log::error!("Playback stream error: {}", err),
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;
    log::debug!("Playback stream open: {}Hz {}ch", config.sample_rate, config.channels);
    Ok((stream, tx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_config_matches_wire_format() {
        let config = AudioConfig::default();
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.frame_samples, 1024);
        assert!(config.queue_frames > 0);
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn capture_stream_opens() {
        let result = open_capture_stream(&AudioConfig::default());
        assert!(result.is_ok());
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn playback_stream_opens() {
        let result = open_playback_stream(&AudioConfig::default());
        assert!(result.is_ok());
    }
}
