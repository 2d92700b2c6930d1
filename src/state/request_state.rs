/// Request state definitions for tracking crawl progress
///
/// Every listing request moves through a small state machine:
///
/// ```text
/// Queued -> InFlight -> Completed
///                    -> Retrying -> Queued
///                    -> Abandoned
/// ```
use crate::HarvestError;
use std::fmt;

/// Represents the current state of a listing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    // ===== Active States =====
    /// Request is waiting in the queue
    Queued,

    /// Request has been dispatched to a worker
    InFlight,

    /// Last attempt failed at the fetch layer and the request will be re-queued
    Retrying,

    // ===== Terminal States =====
    /// Page was fetched and its extraction outcome handled
    Completed,

    /// Retries are exhausted, the request is dropped
    Abandoned,
}

impl RequestState {
    /// Returns true if no further processing will happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    /// Returns true if the transition `self -> next` is allowed
    pub fn can_transition_to(&self, next: RequestState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::InFlight)
                | (Self::InFlight, Self::Completed)
                | (Self::InFlight, Self::Retrying)
                | (Self::InFlight, Self::Abandoned)
                | (Self::Retrying, Self::Queued)
        )
    }

    /// Performs a checked transition
    pub fn transition(self, next: RequestState) -> Result<RequestState, HarvestError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(HarvestError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InFlight => "in_flight",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
