//! Effects produced by state transitions

use crate::timeline::{CallToAction, Route, RouteParams};

/// A bot message resolved by the dialog but not yet on the timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReply {
    pub text: String,
    pub call_to_action: Option<CallToAction>,
}

impl BotReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            call_to_action: None,
        }
    }

    pub fn with_action(
        text: impl Into<String>,
        label: impl Into<String>,
        target_route: Route,
        params: RouteParams,
    ) -> Self {
        Self {
            text: text.into(),
            call_to_action: Some(CallToAction {
                label: label.into(),
                target_route,
                params,
            }),
        }
    }
}

/// Effects to be executed after state transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append the user's (trimmed) utterance to the timeline
    AppendUserMessage { text: String },

    /// Hand a reply to the response sequencer
    Reply(BotReply),

    /// Ask the remote completion service
    RequestCompletion { utterance: String },

    /// Show a transient error notification
    NotifyError { description: String },

    /// Tell connected clients the dialog state changed
    NotifyStateChange,
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply(BotReply::text(text))
    }
}
