//! Microphone capture with silence endpointing.
//!
//! The cpal input stream is opened once and stays open so a capture
//! session starts with no device latency. While a session is active the
//! callback buffers samples and watches RMS energy; sustained silence (or
//! the max-duration cap) flags the session for auto-stop, which the
//! service loop polls — the native analogue of a recognizer's terminal
//! result event.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{CaptureConfig, EndpointingConfig};
use crate::error::ClientError;

pub struct CaptureController {
    config: CaptureConfig,
    endpointing: EndpointingConfig,
    /// Shared state between the audio callback thread and the service loop.
    shared: Arc<SharedState>,
    /// Kept alive to maintain the always-open stream.
    _stream: Option<Stream>,
}

struct SharedState {
    inner: Mutex<CaptureInner>,
}

struct CaptureInner {
    is_listening: bool,
    buffer: Vec<f32>,
    max_samples: usize,
    silence_start: Option<Instant>,
    session_start: Option<Instant>,
    should_auto_stop: bool,
}

impl CaptureController {
    pub fn new(config: CaptureConfig, endpointing: EndpointingConfig) -> Self {
        let max_samples = (config.max_duration * config.sample_rate as f64) as usize;

        let shared = Arc::new(SharedState {
            inner: Mutex::new(CaptureInner {
                is_listening: false,
                buffer: Vec::with_capacity(max_samples),
                max_samples,
                silence_start: None,
                session_start: None,
                should_auto_stop: false,
            }),
        });

        Self {
            config,
            endpointing,
            shared,
            _stream: None,
        }
    }

    /// Open the input stream. Call once at startup; later calls are no-ops.
    pub fn open_stream(&mut self) -> Result<(), ClientError> {
        if self._stream.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(ClientError::RecognitionNoMicrophone)?;

        info!(
            "Using audio device: {}",
            device.name().unwrap_or("unknown".into())
        );

        let stream_config = StreamConfig {
            channels: self.config.channels,
            sample_rate: SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.config.chunk_size),
        };

        let shared = Arc::clone(&self.shared);
        let threshold = self.endpointing.threshold;
        let silence_duration = self.endpointing.silence_duration;
        let min_speech_duration = self.endpointing.min_speech_duration;
        let max_duration = self.config.max_duration;

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    let mut inner = shared.inner.lock().unwrap();

                    if !inner.is_listening {
                        return;
                    }

                    let remaining = inner.max_samples.saturating_sub(inner.buffer.len());
                    let to_copy = data.len().min(remaining);
                    inner.buffer.extend_from_slice(&data[..to_copy]);

                    if inner.buffer.len() >= inner.max_samples {
                        warn!("Max capture duration reached");
                        inner.should_auto_stop = true;
                        return;
                    }

                    if let Some(started) = inner.session_start {
                        let elapsed = started.elapsed().as_secs_f64();

                        if elapsed >= max_duration {
                            info!("Max capture duration reached ({max_duration}s)");
                            inner.should_auto_stop = true;
                            return;
                        }

                        // Let the speaker get going before endpointing.
                        if elapsed < min_speech_duration {
                            return;
                        }

                        let rms = rms_energy(data);
                        if rms < threshold {
                            let silence_start =
                                inner.silence_start.get_or_insert_with(Instant::now);
                            if silence_start.elapsed().as_secs_f64() >= silence_duration {
                                debug!("Silence for {silence_duration}s, ending capture");
                                inner.should_auto_stop = true;
                            }
                        } else {
                            inner.silence_start = None;
                        }
                    }
                },
                move |err| {
                    warn!("Audio stream error: {err}");
                },
                None, // timeout
            )
            .map_err(|e| {
                warn!("Cannot build input stream: {e}");
                ClientError::SpeechNotSupported
            })?;

        stream
            .play()
            .map_err(|e| ClientError::RecognitionOther(format!("failed to start stream: {e}")))?;
        info!("Audio input stream opened");

        self._stream = Some(stream);
        Ok(())
    }

    /// Begin a capture session.
    pub fn start(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.buffer.clear();
        inner.is_listening = true;
        inner.silence_start = None;
        inner.session_start = Some(Instant::now());
        inner.should_auto_stop = false;
        info!("Listening...");
    }

    /// End the session and take the captured samples. Idempotent: calling
    /// with no active session returns whatever the buffer holds (empty).
    pub fn stop(&self) -> Vec<f32> {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.is_listening = false;
        inner.should_auto_stop = false;
        let samples = std::mem::take(&mut inner.buffer);
        let duration = samples.len() as f64 / self.config.sample_rate as f64;
        info!("Capture ended: {:.1}s ({} samples)", duration, samples.len());
        samples
    }

    /// Whether silence endpointing (or the duration cap) ended the session.
    pub fn should_auto_stop(&self) -> bool {
        self.shared.inner.lock().unwrap().should_auto_stop
    }

    pub fn is_listening(&self) -> bool {
        self.shared.inner.lock().unwrap().is_listening
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Check whether captured audio is entirely below the silence floor.
    pub fn is_silent(samples: &[f32], threshold: f32) -> bool {
        let rms = rms_energy(samples);
        debug!("Audio RMS energy: {rms:.4} (threshold: {threshold})");
        rms < threshold
    }
}

/// RMS energy of audio samples.
fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}
