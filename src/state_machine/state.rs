//! Dialog state types

use crate::resolver::LocationCode;
use crate::timeline::RouteParams;
use serde::{Deserialize, Serialize};

/// Which slot the agent is collecting, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingDestination,
    AwaitingOrigin,
    FreeForm,
}

/// Slot-filling state
///
/// Slots live inside the phase that requires them, so an origin can never be
/// set before a destination and `FreeForm` always has both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum DialogState {
    /// Conversation start: waiting for the user to name a destination
    #[default]
    AwaitingDestination,

    /// Destination known, waiting for the origin
    AwaitingOrigin { destination: LocationCode },

    /// Both slots filled. Terminal for slot filling; general questions only.
    FreeForm {
        destination: LocationCode,
        origin: LocationCode,
    },
}

impl DialogState {
    pub fn phase(&self) -> Phase {
        match self {
            DialogState::AwaitingDestination => Phase::AwaitingDestination,
            DialogState::AwaitingOrigin { .. } => Phase::AwaitingOrigin,
            DialogState::FreeForm { .. } => Phase::FreeForm,
        }
    }

    pub fn destination(&self) -> Option<LocationCode> {
        match self {
            DialogState::AwaitingDestination => None,
            DialogState::AwaitingOrigin { destination }
            | DialogState::FreeForm { destination, .. } => Some(*destination),
        }
    }

    pub fn origin(&self) -> Option<LocationCode> {
        match self {
            DialogState::FreeForm { origin, .. } => Some(*origin),
            _ => None,
        }
    }

    /// Navigation parameters for whatever slots are currently filled
    pub fn route_params(&self) -> RouteParams {
        RouteParams {
            origin: self.origin(),
            destination: self.destination(),
        }
    }

    pub fn is_slot_filling(&self) -> bool {
        !matches!(self, DialogState::FreeForm { .. })
    }
}
