//! Spoken playback
//!
//! A single-slot owner in front of the speech collaborator: at most one
//! playback is active at a time.

use std::sync::Arc;

/// Text-to-speech collaborator. Fire-and-forget.
pub trait SpeechEngine: Send + Sync {
    fn speak(&self, text: &str);
    fn stop(&self);
}

impl<T: SpeechEngine + ?Sized> SpeechEngine for Arc<T> {
    fn speak(&self, text: &str) {
        (**self).speak(text);
    }

    fn stop(&self) {
        (**self).stop();
    }
}

/// Outcome of a toggle request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Stopped,
    Started,
    /// Nothing to speak
    Idle,
}

/// Owner of the one playback slot
pub struct PlaybackSlot<S: SpeechEngine> {
    engine: S,
    active: bool,
}

impl<S: SpeechEngine> PlaybackSlot<S> {
    pub fn new(engine: S) -> Self {
        Self {
            engine,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Speak only if nothing is playing. Returns whether playback started.
    pub fn announce(&mut self, text: &str) -> bool {
        if self.active || text.is_empty() {
            return false;
        }
        self.engine.speak(text);
        self.active = true;
        true
    }

    /// Cancel whatever is playing and speak `text` instead
    pub fn replace(&mut self, text: &str) {
        self.stop();
        if !text.is_empty() {
            self.engine.speak(text);
            self.active = true;
        }
    }

    /// Cancel the active playback, if any
    pub fn stop(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.engine.stop();
        self.active = false;
        true
    }

    /// Stop if playing, otherwise speak `last_text`
    pub fn toggle(&mut self, last_text: Option<&str>) -> Toggle {
        if self.stop() {
            return Toggle::Stopped;
        }
        match last_text {
            Some(text) if !text.is_empty() => {
                self.replace(text);
                Toggle::Started
            }
            _ => Toggle::Idle,
        }
    }

    /// The engine finished on its own; free the slot
    pub fn finished(&mut self) {
        self.active = false;
    }
}
