//! Audio playback with single-utterance policy.
//!
//! At most one synthesized utterance is audible at any time: starting a
//! new one stops and discards whatever sink is active. The output stream
//! stays open for the process lifetime; a machine with no output device
//! degrades to reported errors rather than aborting the conversation.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use tracing::{debug, warn};

use crate::error::ClientError;

pub struct PlaybackController {
    /// None when no output device could be opened.
    stream: Option<OutputStream>,
    active_sink: Arc<Mutex<Option<Sink>>>,
}

impl PlaybackController {
    pub fn new() -> Self {
        let stream = match OutputStreamBuilder::open_default_stream() {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("No audio output available ({e}), replies will not be spoken");
                None
            }
        };

        Self {
            stream,
            active_sink: Arc::new(Mutex::new(None)),
        }
    }

    /// Start playing one MP3 utterance, stopping any utterance already
    /// playing or paused. Returns as soon as playback has started.
    pub fn play_mp3(&self, bytes: Vec<u8>) -> Result<(), ClientError> {
        self.stop();

        let Some(stream) = &self.stream else {
            return Err(ClientError::SynthesisFailed(
                "no audio output device".into(),
            ));
        };

        let source = Decoder::new(Cursor::new(bytes))
            .map_err(|e| ClientError::SynthesisFailed(format!("audio decode failed: {e}")))?;

        let sink = Sink::connect_new(stream.mixer());
        sink.append(source);
        *self.active_sink.lock().unwrap() = Some(sink);
        debug!("Playback started");
        Ok(())
    }

    /// Stop and discard the active utterance, if any. Idempotent.
    pub fn stop(&self) {
        if let Some(sink) = self.active_sink.lock().unwrap().take() {
            sink.stop();
            debug!("Playback stopped");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.active_sink
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| !s.empty())
            .unwrap_or(false)
    }
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rodio::buffer::SamplesBuffer;

    // Headless environments have no output device, so these tests pin the
    // degraded-mode contract and the single-utterance policy on a detached
    // sink rather than audible behavior.

    fn headless() -> PlaybackController {
        PlaybackController {
            stream: None,
            active_sink: Arc::new(Mutex::new(None)),
        }
    }

    /// A device-free sink holding one queued (paused) utterance.
    fn seeded_sink() -> (Sink, rodio::queue::SourcesQueueOutput) {
        let (sink, queue) = Sink::new();
        sink.pause();
        sink.append(SamplesBuffer::new(1, 16000, vec![0.0f32; 160]));
        (sink, queue)
    }

    #[test]
    fn stop_without_active_sink_is_a_noop() {
        let playback = headless();
        playback.stop();
        playback.stop();
        assert!(!playback.is_playing());
    }

    #[test]
    fn play_without_device_reports_synthesis_failure() {
        let playback = headless();
        let err = playback.play_mp3(vec![0u8; 16]).unwrap_err();
        assert!(matches!(err, ClientError::SynthesisFailed(_)));
        assert!(!playback.is_playing());
    }

    #[test]
    fn stop_discards_the_active_utterance() {
        let playback = headless();
        let (sink, _queue) = seeded_sink();
        *playback.active_sink.lock().unwrap() = Some(sink);
        assert!(playback.is_playing());

        playback.stop();
        assert!(!playback.is_playing());
        assert!(playback.active_sink.lock().unwrap().is_none());
    }

    #[test]
    fn new_utterance_stops_the_previous_one_first() {
        let playback = headless();
        let (sink, _queue) = seeded_sink();
        *playback.active_sink.lock().unwrap() = Some(sink);
        assert!(playback.is_playing());

        // The active sink is taken and stopped before the new start is
        // even attempted, so a failed start still leaves silence.
        let _ = playback.play_mp3(vec![0u8; 16]);
        assert!(!playback.is_playing());
        assert!(playback.active_sink.lock().unwrap().is_none());
    }
}
