//! Scoring engine: pure functions invoked at phase-close transitions.
//!
//! Everything here maps `(answers, guesses, scores)` to new values without
//! touching storage, so the round-close transition can write the outcome in
//! one conditional step.

use std::time::SystemTime;

use indexmap::IndexMap;
use thiserror::Error;

use crate::dao::models::{
    GuessEntity, GuessResultEntity, MatchStatsEntity, PlayerId, RankingEntryEntity,
    RoomPlayerEntity, SessionEntity,
};

/// Fallback display name when a ranked player has no seat metadata.
const UNKNOWN_PLAYER: &str = "Unknown player";

/// Error raised when the round data violates the submit-time guards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    /// A guess references a target without a recorded answer. Submit-time
    /// validation makes this unreachable; surfacing it beats silently
    /// fabricating a result.
    #[error("guess target `{target_id}` has no recorded answer")]
    MissingTargetAnswer {
        /// Target the dangling guess referenced.
        target_id: PlayerId,
    },
}

/// Result of scoring one round.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    /// Per-guess results in guess insertion order.
    pub results: Vec<GuessResultEntity>,
    /// Scores after applying this round's awards.
    pub scores: IndexMap<PlayerId, i64>,
}

/// Score a round: each guess is correct when it matches the target's actual
/// answer, and a correct guess credits `points_per_guess` to the guesser.
/// Targets earn nothing for being guessed about.
pub fn score_round(
    answers: &IndexMap<PlayerId, String>,
    guesses: &IndexMap<PlayerId, GuessEntity>,
    scores: &IndexMap<PlayerId, i64>,
    points_per_guess: i64,
) -> Result<RoundOutcome, ScoringError> {
    let mut updated = scores.clone();
    let mut results = Vec::with_capacity(guesses.len());

    for (guesser_id, guess) in guesses {
        let Some(actual) = answers.get(&guess.target) else {
            return Err(ScoringError::MissingTargetAnswer {
                target_id: guess.target.clone(),
            });
        };

        let correct = *actual == guess.guess;
        let points_awarded = if correct { points_per_guess } else { 0 };
        if correct {
            *updated.entry(guesser_id.clone()).or_insert(0) += points_awarded;
        }

        results.push(GuessResultEntity {
            guesser_id: guesser_id.clone(),
            target_id: guess.target.clone(),
            guess: guess.guess.clone(),
            actual_answer: actual.clone(),
            correct,
            points_awarded,
        });
    }

    Ok(RoundOutcome {
        results,
        scores: updated,
    })
}

/// Rebuild the ranking from a scores map, carrying display metadata from the
/// room roster. The sort is stable, so equal scores keep the map's insertion
/// order rather than being re-randomized.
pub fn rebuild_ranking(
    scores: &IndexMap<PlayerId, i64>,
    roster: &[RoomPlayerEntity],
) -> Vec<RankingEntryEntity> {
    let mut ranking: Vec<RankingEntryEntity> = scores
        .iter()
        .map(|(player_id, score)| {
            let seat = roster.iter().find(|p| &p.user_id == player_id);
            RankingEntryEntity {
                player_id: player_id.clone(),
                name: seat
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| UNKNOWN_PLAYER.to_string()),
                avatar_url: seat.and_then(|p| p.avatar_url.clone()),
                score: *score,
            }
        })
        .collect();

    ranking.sort_by(|a, b| b.score.cmp(&a.score));
    ranking
}

/// Count a player's correct and incorrect guesses across the round history.
pub fn accuracy(player_id: &str, session: &SessionEntity) -> (u32, u32) {
    let mut hits = 0;
    let mut misses = 0;
    for round in &session.round_history {
        if let Some(result) = round.results.iter().find(|r| r.guesser_id == player_id) {
            if result.correct {
                hits += 1;
            } else {
                misses += 1;
            }
        }
    }
    (hits, misses)
}

/// Compute the final match statistics from the closed session.
pub fn final_stats(session: &SessionEntity, now: SystemTime) -> MatchStatsEntity {
    let duration_ms = now
        .duration_since(session.started_at)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let players = session.scores.len();
    let max_score = session.scores.values().copied().max().unwrap_or(0);
    let min_score = session.scores.values().copied().min().unwrap_or(0);
    let total: i64 = session.scores.values().sum();
    let mean_score = if players == 0 {
        0.0
    } else {
        total as f64 / players as f64
    };

    MatchStatsEntity {
        total_rounds: session.total_rounds(),
        duration_ms,
        players,
        max_score,
        min_score,
        mean_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(user_id: &str, name: &str) -> RoomPlayerEntity {
        RoomPlayerEntity {
            user_id: user_id.into(),
            name: name.into(),
            avatar_url: None,
            connected: true,
        }
    }

    fn guess(target: &str, option: &str) -> GuessEntity {
        GuessEntity {
            target: target.into(),
            guess: option.into(),
        }
    }

    #[test]
    fn worked_scenario_scores_and_ranks_as_specified() {
        // A answers Blue, B answers Red, C answers Blue.
        let answers = IndexMap::from_iter([
            ("a".to_string(), "Blue".to_string()),
            ("b".to_string(), "Red".to_string()),
            ("c".to_string(), "Blue".to_string()),
        ]);
        // A guesses B->Red (correct), B guesses C->Blue (correct),
        // C guesses A->Red (incorrect).
        let guesses = IndexMap::from_iter([
            ("a".to_string(), guess("b", "Red")),
            ("b".to_string(), guess("c", "Blue")),
            ("c".to_string(), guess("a", "Red")),
        ]);
        let scores = IndexMap::from_iter([
            ("a".to_string(), 0),
            ("b".to_string(), 0),
            ("c".to_string(), 0),
        ]);

        let outcome = score_round(&answers, &guesses, &scores, 10).unwrap();
        assert_eq!(outcome.scores["a"], 10);
        assert_eq!(outcome.scores["b"], 10);
        assert_eq!(outcome.scores["c"], 0);

        let awarded: i64 = outcome.results.iter().map(|r| r.points_awarded).sum();
        assert_eq!(awarded, 20);
        assert_eq!(outcome.results.len(), 3);
        assert!(outcome.results[0].correct);
        assert!(outcome.results[1].correct);
        assert!(!outcome.results[2].correct);
        assert_eq!(outcome.results[2].actual_answer, "Blue");

        let roster = [seat("a", "Alice"), seat("b", "Bob"), seat("c", "Carol")];
        let ranking = rebuild_ranking(&outcome.scores, &roster);
        // A and B tie at 10; the scores-map insertion order breaks the tie.
        assert_eq!(ranking[0].player_id, "a");
        assert_eq!(ranking[1].player_id, "b");
        assert_eq!(ranking[2].player_id, "c");
        assert_eq!(ranking[0].name, "Alice");
    }

    #[test]
    fn targets_earn_nothing_for_being_guessed_about() {
        let answers = IndexMap::from_iter([
            ("a".to_string(), "Blue".to_string()),
            ("b".to_string(), "Blue".to_string()),
        ]);
        let guesses = IndexMap::from_iter([("a".to_string(), guess("b", "Blue"))]);
        let scores = IndexMap::from_iter([("a".to_string(), 0), ("b".to_string(), 0)]);

        let outcome = score_round(&answers, &guesses, &scores, 10).unwrap();
        assert_eq!(outcome.scores["a"], 10);
        assert_eq!(outcome.scores["b"], 0);
    }

    #[test]
    fn score_sum_changes_only_by_awarded_points() {
        let answers = IndexMap::from_iter([
            ("a".to_string(), "Red".to_string()),
            ("b".to_string(), "Green".to_string()),
            ("c".to_string(), "Red".to_string()),
        ]);
        let guesses = IndexMap::from_iter([
            ("a".to_string(), guess("b", "Green")),
            ("b".to_string(), guess("a", "Blue")),
            ("c".to_string(), guess("a", "Red")),
        ]);
        let scores = IndexMap::from_iter([
            ("a".to_string(), 30),
            ("b".to_string(), 10),
            ("c".to_string(), 0),
        ]);

        let outcome = score_round(&answers, &guesses, &scores, 7).unwrap();
        let before: i64 = scores.values().sum();
        let after: i64 = outcome.scores.values().sum();
        let correct = outcome.results.iter().filter(|r| r.correct).count() as i64;
        assert_eq!(after - before, correct * 7);
    }

    #[test]
    fn dangling_guess_target_is_an_error() {
        let answers = IndexMap::from_iter([("a".to_string(), "Red".to_string())]);
        let guesses = IndexMap::from_iter([("a".to_string(), guess("ghost", "Red"))]);
        let scores = IndexMap::from_iter([("a".to_string(), 0)]);

        let err = score_round(&answers, &guesses, &scores, 10).unwrap_err();
        assert_eq!(
            err,
            ScoringError::MissingTargetAnswer {
                target_id: "ghost".into()
            }
        );
    }

    #[test]
    fn ranking_keeps_insertion_order_on_ties() {
        let scores = IndexMap::from_iter([
            ("first".to_string(), 10),
            ("second".to_string(), 20),
            ("third".to_string(), 10),
            ("fourth".to_string(), 10),
        ]);
        let ranking = rebuild_ranking(&scores, &[]);
        let order: Vec<&str> = ranking.iter().map(|e| e.player_id.as_str()).collect();
        assert_eq!(order, ["second", "first", "third", "fourth"]);
        assert_eq!(ranking[0].name, UNKNOWN_PLAYER);
    }
}
