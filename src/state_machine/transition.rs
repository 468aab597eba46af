//! Pure state transition function

use super::{BotReply, DialogState, Effect, Event};
use crate::catalog;
use crate::resolver::{self, LocationCode};
use crate::timeline::Route;
use thiserror::Error;

/// Phrase that opens wayfinding from any phase
pub const SKY_PIER_TRIGGER: &str = "sky pier";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: DialogState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: DialogState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyUtterance,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs. The user's
/// message is always the first effect so the timeline reflects submission
/// order before any reply is resolved.
pub fn transition(state: &DialogState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        (state, Event::UserUtterance { text }) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(TransitionError::EmptyUtterance);
            }
            Ok(handle_utterance(state, text))
        }

        // Completions are only requested once both slots are filled
        (DialogState::FreeForm { .. }, Event::CompletionReady { text }) => {
            Ok(TransitionResult::new(*state).with_effect(Effect::reply(text)))
        }

        // Failure leaves state and timeline alone; the user may resend
        (state, Event::CompletionFailed { message }) => Ok(TransitionResult::new(*state)
            .with_effect(Effect::NotifyError {
                description: message,
            })),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with event {event:?}"
        ))),
    }
}

fn handle_utterance(state: &DialogState, text: &str) -> TransitionResult {
    let unchanged = TransitionResult::new(*state).with_effect(Effect::AppendUserMessage {
        text: text.to_string(),
    });

    if text.to_lowercase().contains(SKY_PIER_TRIGGER) {
        return unchanged.with_effect(Effect::Reply(sky_pier_reply(state)));
    }

    match *state {
        DialogState::AwaitingDestination => match resolver::resolve(text) {
            Some(destination) => TransitionResult::new(DialogState::AwaitingOrigin { destination })
                .with_effect(Effect::AppendUserMessage {
                    text: text.to_string(),
                })
                .with_effect(Effect::NotifyStateChange)
                .with_effect(Effect::reply(format!(
                    "Great! You're heading to {destination}. Where are you departing from?"
                ))),
            None => unchanged.with_effect(Effect::reply(
                "I didn't recognize that destination. Please enter a valid location.",
            )),
        },

        DialogState::AwaitingOrigin { destination } => match resolver::resolve(text) {
            Some(origin) => {
                let next = DialogState::FreeForm {
                    destination,
                    origin,
                };
                TransitionResult::new(next)
                    .with_effect(Effect::AppendUserMessage {
                        text: text.to_string(),
                    })
                    .with_effect(Effect::NotifyStateChange)
                    .with_effect(Effect::Reply(itinerary_reply(origin, destination, &next)))
            }
            None => unchanged.with_effect(Effect::reply(
                "I didn't recognize that origin. Please enter a valid location.",
            )),
        },

        DialogState::FreeForm { .. } => match catalog::lookup(text) {
            Some(answer) => unchanged.with_effect(Effect::reply(answer)),
            None => unchanged.with_effect(Effect::RequestCompletion {
                utterance: text.to_string(),
            }),
        },
    }
}

fn sky_pier_reply(state: &DialogState) -> BotReply {
    BotReply::with_action(
        "Sure! I can help you navigate to the Sky Pier.",
        "Navigate to Sky Pier",
        Route::Wayfinding,
        state.route_params(),
    )
}

fn itinerary_reply(origin: LocationCode, destination: LocationCode, next: &DialogState) -> BotReply {
    BotReply::with_action(
        format!(
            "I've found the most optimal route from {origin} to {destination} with the least carbon emissions and the cheapest fare."
        ),
        "View Suggested Journey",
        Route::Itinerary,
        next.route_params(),
    )
}
