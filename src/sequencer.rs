//! Response sequencer
//!
//! Reveals resolved bot replies the way a person would type them: a
//! composing pause, then the text in growing prefixes at a fixed cadence,
//! then a single `Finished` update that the owner turns into a timeline
//! append. Exactly one reveal is driven at a time; what happens to replies
//! that arrive mid-reveal is decided by [`OverlapPolicy`].
//!
//! Cancelling the sequencer stops the worker before it emits `Finished`, so
//! a torn-down conversation never sees a partial append.

use crate::state_machine::BotReply;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Delays used while revealing a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTiming {
    /// "Typing..." window before any text is shown
    pub composing: Duration,
    /// Pause between frames
    pub interval: Duration,
    /// Characters added per frame (at least 1)
    pub chunk_chars: usize,
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self {
            composing: Duration::from_millis(1000),
            interval: Duration::from_millis(25),
            chunk_chars: 1,
        }
    }
}

impl RevealTiming {
    /// No delays at all (tests, headless clients)
    #[allow(dead_code)] // Used by tests and embedders
    pub fn instant() -> Self {
        Self {
            composing: Duration::ZERO,
            interval: Duration::ZERO,
            chunk_chars: usize::MAX,
        }
    }
}

/// What to do with a reply resolved while another is still being revealed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Finish the current reveal, then reveal the newcomer (FIFO)
    #[default]
    Queue,
    /// Drop the current reveal unappended and start the newcomer
    Preempt,
}

impl FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queue" => Ok(OverlapPolicy::Queue),
            "preempt" => Ok(OverlapPolicy::Preempt),
            other => Err(format!("unknown overlap policy: {other}")),
        }
    }
}

// ============================================================================
// Frames
// ============================================================================

/// Growing prefixes of a text, from empty to complete
///
/// Finite and lazy; call [`frames`] again to restart. Frames always end on a
/// character boundary.
#[derive(Debug, Clone)]
pub struct RevealFrames<'a> {
    text: &'a str,
    cursor: usize,
    chunk_chars: usize,
    done: bool,
}

pub fn frames(text: &str, chunk_chars: usize) -> RevealFrames<'_> {
    RevealFrames {
        text,
        cursor: 0,
        chunk_chars: chunk_chars.max(1),
        done: false,
    }
}

impl<'a> Iterator for RevealFrames<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.done {
            return None;
        }
        let (frame, rest) = self.text.split_at(self.cursor);
        if rest.is_empty() {
            self.done = true;
        } else {
            self.cursor += rest
                .char_indices()
                .nth(self.chunk_chars)
                .map_or(rest.len(), |(idx, _)| idx);
        }
        Some(frame)
    }
}

// ============================================================================
// Sequencer
// ============================================================================

/// Progress reported to the owner of the sequencer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealUpdate {
    /// Composing window started for a reply
    Composing,
    /// Partial text to show in place of the composing indicator
    Frame { text: String },
    /// Reveal complete; the reply should now be appended
    Finished(BotReply),
}

/// Handle to the background reveal worker
pub struct ResponseSequencer {
    tx: mpsc::UnboundedSender<BotReply>,
    cancel: CancellationToken,
}

impl ResponseSequencer {
    /// Spawn the worker. It stops when `cancel` fires or the handle drops.
    pub fn spawn(
        timing: RevealTiming,
        policy: OverlapPolicy,
        updates: mpsc::UnboundedSender<RevealUpdate>,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = RevealWorker {
            rx,
            updates,
            timing,
            policy,
            cancel: cancel.clone(),
        };
        tokio::spawn(worker.run());
        Self { tx, cancel }
    }

    /// Hand a resolved reply to the worker. Returns false after shutdown.
    pub fn submit(&self, reply: BotReply) -> bool {
        !self.cancel.is_cancelled() && self.tx.send(reply).is_ok()
    }

    /// Abort the in-flight reveal and drop anything queued
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ResponseSequencer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum RevealOutcome {
    Done,
    Preempted(BotReply),
    Cancelled,
}

struct RevealWorker {
    rx: mpsc::UnboundedReceiver<BotReply>,
    updates: mpsc::UnboundedSender<RevealUpdate>,
    timing: RevealTiming,
    policy: OverlapPolicy,
    cancel: CancellationToken,
}

impl RevealWorker {
    async fn run(mut self) {
        let mut pending: Option<BotReply> = None;
        loop {
            let reply = match pending.take() {
                Some(reply) => reply,
                None => tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => break,
                    next = self.rx.recv() => match next {
                        Some(reply) => reply,
                        None => break,
                    },
                },
            };

            match self.reveal(&reply).await {
                RevealOutcome::Done => {
                    let _ = self.updates.send(RevealUpdate::Finished(reply));
                }
                RevealOutcome::Preempted(newer) => {
                    tracing::debug!(dropped_chars = reply.text.chars().count(), "Reveal pre-empted");
                    pending = Some(newer);
                }
                RevealOutcome::Cancelled => break,
            }
        }
        tracing::debug!("Reveal worker stopped");
    }

    async fn reveal(&mut self, reply: &BotReply) -> RevealOutcome {
        let _ = self.updates.send(RevealUpdate::Composing);
        if let Some(outcome) = self.pause(self.timing.composing).await {
            return outcome;
        }

        for frame in frames(&reply.text, self.timing.chunk_chars) {
            let _ = self.updates.send(RevealUpdate::Frame {
                text: frame.to_string(),
            });
            if let Some(outcome) = self.pause(self.timing.interval).await {
                return outcome;
            }
        }

        RevealOutcome::Done
    }

    /// Sleep, unless cancelled or (under `Preempt`) interrupted by a newer reply
    async fn pause(&mut self, delay: Duration) -> Option<RevealOutcome> {
        let preempt = self.policy == OverlapPolicy::Preempt;
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Some(RevealOutcome::Cancelled),
            Some(newer) = self.rx.recv(), if preempt => Some(RevealOutcome::Preempted(newer)),
            () = tokio::time::sleep(delay) => None,
        }
    }
}
