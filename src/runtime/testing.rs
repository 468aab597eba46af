//! Mock implementations for testing
//!
//! These mocks let the runtime be driven end to end without network or audio.

use super::executor::{ConversationRuntime, RuntimeSettings};
use super::{Command, Snapshot, SseEvent};
use crate::completion::{CompletionError, CompletionService};
use crate::playback::SpeechEngine;
use crate::sequencer::{OverlapPolicy, RevealTiming};
use crate::state_machine::Event;
use crate::timeline::{Message, Role};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Completion Service
// ============================================================================

/// Completion service that returns queued results
pub struct MockCompletion {
    responses: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Hold every answer back by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_response(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
    }

    pub fn queue_error(&self, error: CompletionError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Utterances sent so far, in order
    pub fn recorded_utterances(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, utterance: &str) -> Result<String, CompletionError> {
        self.requests.lock().unwrap().push(utterance.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::network("No mock response queued")))
    }

    fn endpoint(&self) -> &str {
        "mock://completion"
    }
}

// ============================================================================
// Recording Speech Engine
// ============================================================================

#[derive(Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
    stops: AtomicUsize,
}

impl RecordingSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl SpeechEngine for RecordingSpeech {
    fn speak(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

/// A running conversation wired to mocks
pub struct TestRuntime {
    pub completion: Arc<MockCompletion>,
    pub speech: Arc<RecordingSpeech>,
    pub command_tx: mpsc::Sender<Command>,
    pub broadcast_rx: broadcast::Receiver<SseEvent>,
    shutdown: CancellationToken,
    runtime_handle: tokio::task::JoinHandle<()>,
}

impl TestRuntime {
    pub fn builder() -> TestRuntimeBuilder {
        TestRuntimeBuilder::new()
    }
}

pub struct TestRuntimeBuilder {
    timing: RevealTiming,
    policy: OverlapPolicy,
    completion: Option<MockCompletion>,
}

impl TestRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            timing: RevealTiming::instant(),
            policy: OverlapPolicy::Queue,
            completion: None,
        }
    }

    pub fn timing(mut self, timing: RevealTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn policy(mut self, policy: OverlapPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn completion(mut self, completion: MockCompletion) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn build(self) -> TestRuntime {
        let completion = Arc::new(self.completion.unwrap_or_default());
        let speech = Arc::new(RecordingSpeech::default());
        let (command_tx, command_rx) = mpsc::channel(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(512);
        let shutdown = CancellationToken::new();

        let settings = RuntimeSettings {
            conversation_id: "test-conv".to_string(),
            reveal: self.timing,
            overlap_policy: self.policy,
            error_toast: Duration::from_millis(5000),
            idle_timeout: Duration::from_secs(24 * 60 * 60),
        };
        let runtime = ConversationRuntime::new(
            settings,
            completion.clone(),
            speech.clone(),
            command_rx,
            command_tx.clone(),
            broadcast_tx,
            shutdown.clone(),
        );
        let runtime_handle = tokio::spawn(runtime.run());

        TestRuntime {
            completion,
            speech,
            command_tx,
            broadcast_rx,
            shutdown,
            runtime_handle,
        }
    }
}

impl Default for TestRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

const WAIT: Duration = Duration::from_secs(30);

impl TestRuntime {
    pub async fn say(&self, text: &str) {
        self.command_tx
            .send(Command::Dialog(Event::utterance(text)))
            .await
            .expect("Failed to send utterance");
    }

    pub async fn send(&self, command: Command) {
        self.command_tx
            .send(command)
            .await
            .expect("Failed to send command");
    }

    pub async fn snapshot(&self) -> Snapshot {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx)).await;
        rx.await.expect("Runtime dropped snapshot request")
    }

    /// Next broadcast event matching `pred`, skipping the rest
    pub async fn wait_for(&mut self, pred: impl Fn(&SseEvent) -> bool) -> Option<SseEvent> {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            match tokio::time::timeout_at(deadline, self.broadcast_rx.recv()).await {
                Ok(Ok(event)) if pred(&event) => return Some(event),
                Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return None,
            }
        }
    }

    /// Next bot message appended to the timeline
    pub async fn next_bot_message(&mut self) -> Message {
        match self
            .wait_for(|e| matches!(e, SseEvent::Message { message } if message.role == Role::Bot))
            .await
        {
            Some(SseEvent::Message { message }) => message,
            other => panic!("Expected bot message, got {other:?}"),
        }
    }

    /// Fill both slots: Jakarta, then Shenzhen
    pub async fn reach_free_form(&mut self) {
        self.say("I want to go to Jakarta").await;
        self.next_bot_message().await;
        self.say("From Shenzhen").await;
        self.next_bot_message().await;
    }

    /// Cancel the runtime and wait for its loop to exit
    pub async fn close(self) -> broadcast::Receiver<SseEvent> {
        self.shutdown.cancel();
        self.runtime_handle.await.expect("Runtime panicked");
        self.broadcast_rx
    }
}

/// Everything still buffered, up to the channel closing
pub async fn drain(mut rx: broadcast::Receiver<SseEvent>) -> Vec<SseEvent> {
    let mut events = Vec::new();
    loop {
        match rx.recv().await {
            Ok(event) => events.push(event),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return events,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionErrorKind;
    use crate::resolver::LocationCode;
    use crate::runtime::Severity;
    use crate::state_machine::{DialogState, Phase};
    use crate::timeline::Route;

    const WEATHER_Q: &str = "What's the weather forecast for Shenzhen on my arrival date?";

    fn bot_texts(events: &[SseEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                SseEvent::Message { message } if message.role == Role::Bot => {
                    Some(message.text.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_mock_completion_queue() {
        let mock = MockCompletion::new();
        mock.queue_response("Hello");

        assert_eq!(mock.complete("hi").await.unwrap(), "Hello");
        // Nothing left queued
        let err = mock.complete("again").await.unwrap_err();
        assert_eq!(err.kind, CompletionErrorKind::Network);
        assert_eq!(mock.recorded_utterances(), vec!["hi", "again"]);
    }

    #[tokio::test]
    async fn test_greeting_then_slot_filling_flow() {
        let mut rt = TestRuntime::builder().build();

        let snap = rt.snapshot().await;
        assert_eq!(snap.messages.len(), 2);
        assert!(snap.messages.iter().all(|m| m.role == Role::Bot));
        assert!(snap.messages[0].text.starts_with("Hi, I'm Vera"));

        rt.say("I want to go to Jakarta").await;
        let reply = rt.next_bot_message().await;
        assert_eq!(
            reply.text,
            "Great! You're heading to CGK. Where are you departing from?"
        );
        assert!(reply.call_to_action.is_none());

        rt.say("From Shenzhen").await;
        let reply = rt.next_bot_message().await;
        assert_eq!(
            reply.text,
            "I've found the most optimal route from SZX to CGK with the least carbon emissions and the cheapest fare."
        );
        let cta = reply.call_to_action.expect("itinerary button");
        assert_eq!(cta.label, "View Suggested Journey");
        assert_eq!(cta.target_route, Route::Itinerary);
        assert_eq!(cta.params.origin, Some(LocationCode::Szx));
        assert_eq!(cta.params.destination, Some(LocationCode::Cgk));

        let snap = rt.snapshot().await;
        assert_eq!(
            snap.state,
            DialogState::FreeForm {
                destination: LocationCode::Cgk,
                origin: LocationCode::Szx,
            }
        );
        let ids: Vec<u64> = snap.messages.iter().map(|m| m.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
        let roles: Vec<Role> = snap.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::Bot, Role::Bot, Role::User, Role::Bot, Role::User, Role::Bot]
        );
    }

    #[tokio::test]
    async fn test_state_change_broadcast_on_slot_fill() {
        let mut rt = TestRuntime::builder().build();
        rt.say("shenzhen please").await;

        let event = rt
            .wait_for(|e| matches!(e, SseEvent::StateChange { .. }))
            .await;
        assert!(matches!(
            event,
            Some(SseEvent::StateChange {
                state: DialogState::AwaitingOrigin {
                    destination: LocationCode::Szx
                }
            })
        ));
    }

    #[tokio::test]
    async fn test_catalog_answer_skips_remote() {
        let mut rt = TestRuntime::builder().build();
        rt.reach_free_form().await;

        rt.say(&WEATHER_Q.to_uppercase()).await;
        let reply = rt.next_bot_message().await;
        assert!(reply.text.starts_with("Let me check the weather for your Shenzhen arrival"));
        assert!(rt.completion.recorded_utterances().is_empty());
    }

    #[tokio::test]
    async fn test_free_form_uses_completion() {
        let completion = MockCompletion::new();
        completion.queue_response("Gate B12 is a five minute walk.");
        let mut rt = TestRuntime::builder().completion(completion).build();
        rt.reach_free_form().await;

        rt.say("  Where is gate B12?  ").await;
        let pending = rt
            .wait_for(|e| matches!(e, SseEvent::CompletionPending { .. }))
            .await;
        assert!(matches!(pending, Some(SseEvent::CompletionPending { pending: true })));

        let reply = rt.next_bot_message().await;
        assert_eq!(reply.text, "Gate B12 is a five minute walk.");
        assert_eq!(rt.completion.recorded_utterances(), vec!["Where is gate B12?"]);

        let snap = rt.snapshot().await;
        assert!(!snap.completion_pending);
        assert_eq!(snap.state.phase(), Phase::FreeForm);
    }

    #[tokio::test]
    async fn test_completion_failure_notifies_and_keeps_state() {
        let completion = MockCompletion::new();
        completion.queue_error(CompletionError::status(500));
        let mut rt = TestRuntime::builder().completion(completion).build();
        rt.reach_free_form().await;
        let before = rt.snapshot().await;

        rt.say("Is the lounge open?").await;
        let event = rt
            .wait_for(|e| matches!(e, SseEvent::Notification(_)))
            .await;
        let notification = match event {
            Some(SseEvent::Notification(notification)) => notification,
            other => panic!("Expected notification, got {other:?}"),
        };
        assert_eq!(notification.title, "Error sending message");
        assert_eq!(notification.description, "HTTP error! Status: 500");
        assert_eq!(notification.severity, Severity::Danger);
        assert_eq!(notification.duration_ms, 5000);

        let after = rt.snapshot().await;
        assert_eq!(after.state, before.state);
        assert_eq!(after.messages.len(), before.messages.len() + 1);
        let last = after.messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.text, "Is the lounge open?");
        assert!(!after.completion_pending);
    }

    #[tokio::test]
    async fn test_blank_utterance_is_rejected() {
        let mut rt = TestRuntime::builder().build();
        rt.say("   ").await;

        let event = rt.wait_for(|e| matches!(e, SseEvent::Error { .. })).await;
        assert!(matches!(event, Some(SseEvent::Error { message }) if message == "Message is empty"));
        assert_eq!(rt.snapshot().await.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_sky_pier_from_any_phase() {
        let mut rt = TestRuntime::builder().build();
        rt.say("Where is the SKY PIER?").await;

        let reply = rt.next_bot_message().await;
        assert_eq!(reply.text, "Sure! I can help you navigate to the Sky Pier.");
        let cta = reply.call_to_action.unwrap();
        assert_eq!(cta.target_route, Route::Wayfinding);
        assert_eq!(cta.params.destination, None);
        assert_eq!(rt.snapshot().await.state.phase(), Phase::AwaitingDestination);
    }

    #[tokio::test]
    async fn test_reply_is_spoken_once_while_slot_busy() {
        let mut rt = TestRuntime::builder().build();

        rt.say("Jakarta").await;
        let first = rt.next_bot_message().await;
        assert_eq!(rt.speech.spoken(), vec![first.text.clone()]);
        assert!(rt.snapshot().await.speaking);

        // Slot still busy: the next reply is shown but not spoken
        rt.say("Shenzhen").await;
        rt.next_bot_message().await;
        assert_eq!(rt.speech.spoken().len(), 1);

        rt.send(Command::SpeechFinished).await;
        rt.say("sky pier").await;
        let third = rt.next_bot_message().await;
        assert_eq!(rt.speech.spoken(), vec![first.text, third.text]);
        assert_eq!(rt.speech.stop_count(), 0);
    }

    #[tokio::test]
    async fn test_toggle_speech() {
        let mut rt = TestRuntime::builder().build();

        // Nothing playing: toggle speaks the last message (a greeting)
        rt.send(Command::ToggleSpeech).await;
        let snap = rt.snapshot().await;
        assert!(snap.speaking);
        assert_eq!(rt.speech.spoken(), vec![snap.messages[1].text.clone()]);

        rt.send(Command::ToggleSpeech).await;
        assert!(!rt.snapshot().await.speaking);
        assert_eq!(rt.speech.stop_count(), 1);

        rt.say("Jakarta").await;
        rt.next_bot_message().await;
        assert_eq!(rt.speech.spoken().len(), 2);
    }

    #[tokio::test]
    async fn test_queued_replies_keep_submission_order() {
        let mut rt = TestRuntime::builder().build();
        rt.say("hello").await;
        rt.say("Fyg").await;

        let first = rt.next_bot_message().await;
        let second = rt.next_bot_message().await;
        assert_eq!(
            first.text,
            "I didn't recognize that destination. Please enter a valid location."
        );
        assert_eq!(
            second.text,
            "Great! You're heading to FYG. Where are you departing from?"
        );

        let snap = rt.snapshot().await;
        let ids: Vec<u64> = snap.messages.iter().map(|m| m.id.get()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_streams_prefixes_before_append() {
        let mut rt = TestRuntime::builder()
            .timing(RevealTiming {
                composing: Duration::from_millis(1000),
                interval: Duration::from_millis(25),
                chunk_chars: 10,
            })
            .build();
        rt.say("Jakarta").await;

        let mut frames = Vec::new();
        let mut saw_composing = false;
        loop {
            match rt.wait_for(|_| true).await {
                Some(SseEvent::Composing) => saw_composing = true,
                Some(SseEvent::Reveal { text }) => frames.push(text),
                Some(SseEvent::Message { message }) if message.role == Role::Bot => {
                    assert_eq!(frames.last(), Some(&message.text));
                    break;
                }
                Some(_) => {}
                None => panic!("Runtime stopped early"),
            }
        }
        assert!(saw_composing);
        assert_eq!(frames.first().map(String::as_str), Some(""));
        assert!(frames.windows(2).all(|w| w[1].starts_with(w[0].as_str())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_preempt_drops_superseded_reply() {
        let mut rt = TestRuntime::builder()
            .timing(RevealTiming::default())
            .policy(OverlapPolicy::Preempt)
            .build();
        rt.say("hello").await;
        rt.say("Jakarta").await;

        let reply = rt.next_bot_message().await;
        assert_eq!(
            reply.text,
            "Great! You're heading to CGK. Where are you departing from?"
        );
        let snap = rt.snapshot().await;
        // Two greetings, two user messages, one reply
        assert_eq!(snap.messages.len(), 5);
        assert_eq!(snap.state.phase(), Phase::AwaitingOrigin);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_mid_reveal_appends_nothing() {
        let mut rt = TestRuntime::builder().timing(RevealTiming::default()).build();
        rt.say("Jakarta").await;
        assert!(rt
            .wait_for(|e| matches!(e, SseEvent::Reveal { .. }))
            .await
            .is_some());

        let rx = rt.close().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        let events = drain(rx).await;
        assert!(bot_texts(&events).is_empty(), "late events: {events:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_discards_pending_completion() {
        let completion = MockCompletion::new().with_delay(Duration::from_secs(10));
        completion.queue_response("Too late");
        let mut rt = TestRuntime::builder().completion(completion).build();
        rt.reach_free_form().await;

        rt.say("Is the lounge open?").await;
        assert!(rt
            .wait_for(|e| matches!(e, SseEvent::CompletionPending { pending: true }))
            .await
            .is_some());

        let rx = rt.close().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        let events = drain(rx).await;
        assert!(!bot_texts(&events).contains(&"Too late".to_string()));
    }
}
