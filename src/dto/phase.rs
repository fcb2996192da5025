use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::{SessionPhase, SessionStatus};

/// Publicly visible session phase exposed to clients (REST/WS).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisiblePhase {
    /// Match created, waiting for the first round.
    Initialized,
    /// Answer collection in progress.
    Answering,
    /// Guess collection in progress.
    Guessing,
    /// Round scored; waiting for the next round or the finish call.
    RoundClosed,
    /// Match over.
    Finished,
}

impl From<SessionPhase> for VisiblePhase {
    fn from(value: SessionPhase) -> Self {
        match value {
            SessionPhase::Initialized => VisiblePhase::Initialized,
            SessionPhase::Answering => VisiblePhase::Answering,
            SessionPhase::Guessing => VisiblePhase::Guessing,
            SessionPhase::RoundClosed => VisiblePhase::RoundClosed,
            SessionPhase::Finished => VisiblePhase::Finished,
        }
    }
}

/// Publicly visible match status exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleStatus {
    /// Match in progress.
    Active,
    /// Match over; session retained until expiry.
    Finished,
}

impl From<SessionStatus> for VisibleStatus {
    fn from(value: SessionStatus) -> Self {
        match value {
            SessionStatus::Active => VisibleStatus::Active,
            SessionStatus::Finished => VisibleStatus::Finished,
        }
    }
}
