//! Conversation runtime executor

use super::{Command, Notification, Severity, Snapshot, SseEvent};
use crate::completion::CompletionService;
use crate::config::Config;
use crate::playback::{PlaybackSlot, SpeechEngine, Toggle};
use crate::sequencer::{OverlapPolicy, ResponseSequencer, RevealTiming, RevealUpdate};
use crate::state_machine::{transition, BotReply, DialogState, Effect, Event, TransitionError};
use crate::timeline::{MessageIds, Role, Timeline};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const GREETING: [&str; 2] = [
    "Hi, I'm Vera - your virtual assistant. How may I help you today?",
    "Simply share your desired destination, and I'll provide you with the most efficient routes, highlighting options with the lowest carbon emissions and the most affordable prices.",
];

const ERROR_TITLE: &str = "Error sending message";

/// Per-conversation settings
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub conversation_id: String,
    pub reveal: RevealTiming,
    pub overlap_policy: OverlapPolicy,
    pub error_toast: Duration,
    pub idle_timeout: Duration,
}

impl RuntimeSettings {
    pub fn from_config(conversation_id: impl Into<String>, config: &Config) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            reveal: config.reveal,
            overlap_policy: config.overlap_policy,
            error_toast: config.error_toast,
            idle_timeout: config.idle_timeout,
        }
    }
}

/// Event loop for a single conversation
///
/// Sole owner of the dialog state, the timeline and the playback slot.
pub struct ConversationRuntime<C, S>
where
    C: CompletionService + Clone + 'static,
    S: SpeechEngine,
{
    settings: RuntimeSettings,
    state: DialogState,
    timeline: Timeline,
    completion: C,
    playback: PlaybackSlot<S>,
    sequencer: ResponseSequencer,
    reveal_rx: mpsc::UnboundedReceiver<RevealUpdate>,
    command_rx: mpsc::Receiver<Command>,
    command_tx: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    shutdown: CancellationToken,
    pending_completions: usize,
}

impl<C, S> ConversationRuntime<C, S>
where
    C: CompletionService + Clone + 'static,
    S: SpeechEngine,
{
    /// Build the runtime. Must be called inside a tokio runtime: the reveal
    /// worker is spawned immediately.
    pub fn new(
        settings: RuntimeSettings,
        completion: C,
        speech: S,
        command_rx: mpsc::Receiver<Command>,
        command_tx: mpsc::Sender<Command>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        let (reveal_tx, reveal_rx) = mpsc::unbounded_channel();
        let sequencer = ResponseSequencer::spawn(
            settings.reveal,
            settings.overlap_policy,
            reveal_tx,
            shutdown.child_token(),
        );

        let mut timeline = Timeline::new(MessageIds::new());
        for text in GREETING {
            let greeting = timeline.compose(Role::Bot, text, None);
            timeline.append(greeting);
        }

        Self {
            settings,
            state: DialogState::default(),
            timeline,
            completion,
            playback: PlaybackSlot::new(speech),
            sequencer,
            reveal_rx,
            command_rx,
            command_tx,
            broadcast_tx,
            shutdown,
            pending_completions: 0,
        }
    }

    pub async fn run(mut self) {
        let conv_id = self.settings.conversation_id.clone();
        tracing::info!(conv_id = %conv_id, "Starting conversation runtime");

        let idle_timeout = self.settings.idle_timeout;
        let mut idle_deadline = Instant::now() + idle_timeout;

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                Some(update) = self.reveal_rx.recv() => self.apply_reveal(update),
                Some(command) = self.command_rx.recv() => {
                    idle_deadline = Instant::now() + idle_timeout;
                    self.handle_command(command);
                }
                () = tokio::time::sleep_until(idle_deadline) => {
                    // Someone is still watching or waiting on the remote
                    if self.broadcast_tx.receiver_count() > 0 || self.pending_completions > 0 {
                        idle_deadline = Instant::now() + idle_timeout;
                    } else {
                        tracing::info!(conv_id = %conv_id, "Evicting idle conversation");
                        break;
                    }
                }
            }
        }

        self.shutdown.cancel();
        self.sequencer.shutdown();
        self.playback.stop();
        tracing::info!(
            conv_id = %conv_id,
            messages = self.timeline.len(),
            "Conversation runtime stopped"
        );
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Dialog(event) => {
                if matches!(
                    event,
                    Event::CompletionReady { .. } | Event::CompletionFailed { .. }
                ) {
                    self.pending_completions = self.pending_completions.saturating_sub(1);
                    if self.pending_completions == 0 {
                        self.broadcast(SseEvent::CompletionPending { pending: false });
                    }
                }
                if let Err(e) = self.process_event(event) {
                    tracing::warn!(conv_id = %self.settings.conversation_id, error = %e, "Rejected event");
                    self.broadcast(SseEvent::Error {
                        message: e.to_string(),
                    });
                }
            }
            Command::ToggleSpeech => {
                let last = self.timeline.last().map(|m| m.text.as_str());
                match self.playback.toggle(last) {
                    Toggle::Started => tracing::debug!("Speech started by toggle"),
                    Toggle::Stopped => tracing::debug!("Speech stopped by toggle"),
                    Toggle::Idle => {}
                }
            }
            Command::SpeechFinished => self.playback.finished(),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = transition(&self.state, event)?;

        if result.new_state != self.state {
            tracing::info!(
                conv_id = %self.settings.conversation_id,
                from = ?self.state.phase(),
                to = ?result.new_state.phase(),
                slot_filling = result.new_state.is_slot_filling(),
                "Dialog phase changed"
            );
        }
        self.state = result.new_state;

        for effect in result.effects {
            self.execute_effect(effect);
        }
        Ok(())
    }

    /// Execute an effect
    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendUserMessage { text } => {
                let message = self.timeline.compose(Role::User, text, None);
                self.timeline.append(message.clone());
                self.broadcast(SseEvent::Message { message });
            }

            Effect::Reply(reply) => {
                if !self.sequencer.submit(reply) {
                    tracing::debug!("Reply dropped, sequencer already stopped");
                }
            }

            Effect::RequestCompletion { utterance } => {
                self.pending_completions += 1;
                self.broadcast(SseEvent::CompletionPending { pending: true });
                self.spawn_completion(utterance);
            }

            Effect::NotifyError { description } => {
                self.broadcast(SseEvent::Notification(Notification {
                    title: ERROR_TITLE.to_string(),
                    description,
                    severity: Severity::Danger,
                    duration_ms: u64::try_from(self.settings.error_toast.as_millis())
                        .unwrap_or(u64::MAX),
                }));
            }

            Effect::NotifyStateChange => {
                self.broadcast(SseEvent::StateChange { state: self.state });
            }
        }
    }

    /// Ask the completion service in the background. The result comes back
    /// as a dialog event unless the conversation is torn down first.
    fn spawn_completion(&self, utterance: String) {
        let completion = self.completion.clone();
        let command_tx = self.command_tx.clone();
        let cancel = self.shutdown.child_token();
        let conv_id = self.settings.conversation_id.clone();

        tokio::spawn(async move {
            tracing::info!(conv_id = %conv_id, "Requesting completion (background)");
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    tracing::debug!(conv_id = %conv_id, "Completion discarded after teardown");
                }

                result = completion.complete(&utterance) => {
                    let event = match result {
                        Ok(text) => Event::CompletionReady { text },
                        Err(e) => Event::CompletionFailed { message: e.to_string() },
                    };
                    let _ = command_tx.send(Command::Dialog(event)).await;
                }
            }
        });
    }

    fn apply_reveal(&mut self, update: RevealUpdate) {
        match update {
            RevealUpdate::Composing => self.broadcast(SseEvent::Composing),
            RevealUpdate::Frame { text } => self.broadcast(SseEvent::Reveal { text }),
            RevealUpdate::Finished(reply) => self.append_reply(reply),
        }
    }

    fn append_reply(&mut self, reply: BotReply) {
        let BotReply {
            text,
            call_to_action,
        } = reply;
        if let Some(cta) = &call_to_action {
            tracing::info!(
                conv_id = %self.settings.conversation_id,
                route = cta.target_route.path(),
                "Offering navigation"
            );
        }
        let message = self.timeline.compose(Role::Bot, text, call_to_action);
        self.timeline.append(message.clone());

        if self.playback.announce(&message.text) {
            tracing::debug!(message_id = message.id.get(), "Speaking reply");
        }
        self.broadcast(SseEvent::Message { message });
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            conversation_id: self.settings.conversation_id.clone(),
            state: self.state,
            messages: self.timeline.all().to_vec(),
            speaking: self.playback.is_active(),
            completion_pending: self.pending_completions > 0,
        }
    }

    fn broadcast(&self, event: SseEvent) {
        // No subscribers is fine
        let _ = self.broadcast_tx.send(event);
    }
}
