//! Conversation timeline
//!
//! Append-only, ordered log of user and bot messages. Insertion order is
//! display order. Message ids come from a counter owned by the timeline, so
//! every conversation numbers its messages independently.

use crate::resolver::LocationCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Bot,
}

/// Client-side views a call-to-action can open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    /// Suggested journey / itinerary view
    #[serde(rename = "/(tabs)")]
    Itinerary,
    /// Airport wayfinding view
    #[serde(rename = "/(tabs)/navigation")]
    Wayfinding,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Itinerary => "/(tabs)",
            Route::Wayfinding => "/(tabs)/navigation",
        }
    }
}

/// Parameters passed along with a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteParams {
    pub origin: Option<LocationCode>,
    pub destination: Option<LocationCode>,
}

/// Button offered under a bot message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallToAction {
    pub label: String,
    pub target_route: Route,
    pub params: RouteParams,
}

/// Monotonic message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// A single timeline entry. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_to_action: Option<CallToAction>,
    pub created_at: DateTime<Utc>,
}

/// Source of message ids
#[derive(Debug)]
pub struct MessageIds {
    next: u64,
}

impl MessageIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    pub fn next_id(&mut self) -> MessageId {
        let id = MessageId(self.next);
        self.next += 1;
        id
    }
}

impl Default for MessageIds {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct Timeline {
    ids: MessageIds,
    messages: Vec<Message>,
}

impl Timeline {
    pub fn new(ids: MessageIds) -> Self {
        Self {
            ids,
            messages: Vec::new(),
        }
    }

    /// Build a message with a fresh id. Does not append it.
    pub fn compose(
        &mut self,
        role: Role,
        text: impl Into<String>,
        call_to_action: Option<CallToAction>,
    ) -> Message {
        Message {
            id: self.ids.next_id(),
            role,
            text: text.into(),
            call_to_action,
            created_at: Utc::now(),
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
