//! Events that drive the dialog

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Raw text submitted by the user
    UserUtterance { text: String },

    /// Remote completion produced a reply
    CompletionReady { text: String },

    /// Remote completion failed (transport, status or response shape)
    CompletionFailed { message: String },
}

impl Event {
    pub fn utterance(text: impl Into<String>) -> Self {
        Event::UserUtterance { text: text.into() }
    }
}
