//! Production adapters for runtime collaborators

use super::SseEvent;
use crate::playback::SpeechEngine;
use tokio::sync::broadcast;

/// Speech engine that delegates synthesis to connected clients
///
/// The server has no audio device; it tells subscribers what to say and when
/// to stop, and hears back through `SpeechFinished`.
pub struct BroadcastSpeech {
    tx: broadcast::Sender<SseEvent>,
}

impl BroadcastSpeech {
    pub fn new(tx: broadcast::Sender<SseEvent>) -> Self {
        Self { tx }
    }
}

impl SpeechEngine for BroadcastSpeech {
    fn speak(&self, text: &str) {
        let _ = self.tx.send(SseEvent::Speak {
            text: text.to_string(),
        });
    }

    fn stop(&self) {
        let _ = self.tx.send(SseEvent::StopSpeaking);
    }
}
