//! Pure phase-transition rules for a match.
//!
//! The table below is the single source of truth for which phase changes are
//! legal. It never touches storage: callers validate an event here, then ask
//! the session store to apply the transition guarded by the expected phase,
//! so concurrent requests resolve to exactly one winner at the store layer.

use thiserror::Error;

use crate::dao::models::SessionPhase;

/// Events that can be applied to a session's phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Advance into the next round's answering phase.
    StartRound,
    /// Close answer collection and open guessing.
    CloseAnswering,
    /// Close guess collection and score the round.
    CloseGuessing,
    /// End the match after its last round closed.
    FinishMatch,
}

/// Error returned when an event cannot be applied from the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{event:?} cannot be applied while in phase `{from}`")]
pub struct InvalidTransition {
    /// Phase the session was in when the event was received.
    pub from: SessionPhase,
    /// The rejected event.
    pub event: SessionEvent,
}

/// Compute the phase an event transitions into, if the transition is valid.
pub fn compute_transition(
    from: SessionPhase,
    event: SessionEvent,
) -> Result<SessionPhase, InvalidTransition> {
    let next = match (from, event) {
        (SessionPhase::Initialized | SessionPhase::RoundClosed, SessionEvent::StartRound) => {
            SessionPhase::Answering
        }
        (SessionPhase::Answering, SessionEvent::CloseAnswering) => SessionPhase::Guessing,
        (SessionPhase::Guessing, SessionEvent::CloseGuessing) => SessionPhase::RoundClosed,
        (SessionPhase::RoundClosed, SessionEvent::FinishMatch) => SessionPhase::Finished,
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_round_cycle() {
        let phase = compute_transition(SessionPhase::Initialized, SessionEvent::StartRound).unwrap();
        assert_eq!(phase, SessionPhase::Answering);
        let phase = compute_transition(phase, SessionEvent::CloseAnswering).unwrap();
        assert_eq!(phase, SessionPhase::Guessing);
        let phase = compute_transition(phase, SessionEvent::CloseGuessing).unwrap();
        assert_eq!(phase, SessionPhase::RoundClosed);
    }

    #[test]
    fn next_round_starts_from_round_closed() {
        assert_eq!(
            compute_transition(SessionPhase::RoundClosed, SessionEvent::StartRound).unwrap(),
            SessionPhase::Answering
        );
    }

    #[test]
    fn finish_requires_round_closed() {
        assert_eq!(
            compute_transition(SessionPhase::RoundClosed, SessionEvent::FinishMatch).unwrap(),
            SessionPhase::Finished
        );
        for from in [
            SessionPhase::Initialized,
            SessionPhase::Answering,
            SessionPhase::Guessing,
        ] {
            let err = compute_transition(from, SessionEvent::FinishMatch).unwrap_err();
            assert_eq!(err.from, from);
        }
    }

    #[test]
    fn phases_cannot_be_skipped() {
        assert!(compute_transition(SessionPhase::Initialized, SessionEvent::CloseAnswering).is_err());
        assert!(compute_transition(SessionPhase::Answering, SessionEvent::CloseGuessing).is_err());
        assert!(compute_transition(SessionPhase::Answering, SessionEvent::StartRound).is_err());
        assert!(compute_transition(SessionPhase::Guessing, SessionEvent::CloseAnswering).is_err());
    }

    #[test]
    fn finished_is_terminal() {
        for event in [
            SessionEvent::StartRound,
            SessionEvent::CloseAnswering,
            SessionEvent::CloseGuessing,
            SessionEvent::FinishMatch,
        ] {
            assert!(compute_transition(SessionPhase::Finished, event).is_err());
        }
    }
}
