//! Time-decay point awards and the O(1) running-statistics fold.

use crate::dao::models::PlayerStatsEntity;

/// Parameters of the linear time-decay award.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringRules {
    /// Points granted for an instantaneous correct answer.
    pub max_points: f64,
    /// Points lost per elapsed second.
    pub time_decay_per_second: f64,
    /// Floor granted to any correct answer, however slow.
    pub min_points: f64,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            max_points: 100.0,
            time_decay_per_second: 2.0,
            min_points: 10.0,
        }
    }
}

impl ScoringRules {
    /// Points for one response. Wrong answers score zero regardless of speed; negative
    /// elapsed times count as instantaneous.
    pub fn award(&self, is_correct: bool, elapsed_ms: i64) -> u32 {
        if !is_correct {
            return 0;
        }
        let elapsed_seconds = clamp_elapsed(elapsed_ms) as f64 / 1000.0;
        let raw = self.max_points - elapsed_seconds * self.time_decay_per_second;
        // Rounded once, after the floor.
        raw.max(self.min_points).max(0.0).round() as u32
    }
}

/// Score plus running statistics of one participant.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerStanding {
    /// Accumulated points.
    pub score: u64,
    /// Aggregate answer statistics.
    pub stats: PlayerStatsEntity,
}

/// One judged response ready to be folded into a standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredResponse {
    /// Verdict of the answer being folded in.
    pub is_correct: bool,
    /// Points it earned.
    pub points: u32,
    /// Response time, already clamped to zero.
    pub elapsed_ms: i64,
}

/// Fold a response into the previous standing without replaying history.
pub fn fold(prev: PlayerStanding, response: ScoredResponse) -> PlayerStanding {
    let PlayerStanding { score, stats } = prev;
    let elapsed = clamp_elapsed(response.elapsed_ms) as f64;
    let points = u64::from(response.points);
    let total_answers = stats.total_answers.saturating_add(1);

    let average_response_time_ms = (stats.average_response_time_ms
        * f64::from(stats.total_answers)
        + elapsed)
        / f64::from(total_answers);

    PlayerStanding {
        score: score.saturating_add(points),
        stats: PlayerStatsEntity {
            total_points: stats.total_points.saturating_add(points),
            correct_answers: stats.correct_answers + u32::from(response.is_correct),
            total_answers,
            average_response_time_ms,
        },
    }
}

/// Elapsed times below zero are clamped, never rejected.
pub fn clamp_elapsed(elapsed_ms: i64) -> u64 {
    elapsed_ms.max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ScoringRules {
        ScoringRules::default()
    }

    #[test]
    fn wrong_answers_never_score() {
        for elapsed in [-5_000, 0, 1, 5_000, 45_000, 1_000_000] {
            assert_eq!(rules().award(false, elapsed), 0);
        }
    }

    #[test]
    fn instant_correct_answer_scores_maximum() {
        assert_eq!(rules().award(true, 0), 100);
    }

    #[test]
    fn slow_correct_answers_hit_the_floor() {
        assert_eq!(rules().award(true, 45_000), 10);
        assert_eq!(rules().award(true, 3_600_000), 10);
    }

    #[test]
    fn negative_elapsed_is_clamped_to_zero() {
        assert_eq!(rules().award(true, -250), rules().award(true, 0));
    }

    #[test]
    fn rounding_happens_after_decay() {
        // 100 - 1.25 * 2 = 97.5, rounded half away from zero.
        assert_eq!(rules().award(true, 1_250), 98);
        assert_eq!(rules().award(true, 5_000), 90);
    }

    #[test]
    fn award_is_non_increasing_in_elapsed_time() {
        let mut previous = rules().award(true, 0);
        for elapsed in (0..60_000).step_by(137) {
            let current = rules().award(true, elapsed);
            assert!(current <= previous, "{current} > {previous} at {elapsed}ms");
            previous = current;
        }
    }

    #[test]
    fn first_correct_answer_folds_into_fresh_stats() {
        let points = rules().award(true, 5_000);
        let next = fold(
            PlayerStanding::default(),
            ScoredResponse {
                is_correct: true,
                points,
                elapsed_ms: 5_000,
            },
        );

        assert_eq!(points, 90);
        assert_eq!(next.score, 90);
        assert_eq!(
            next.stats,
            PlayerStatsEntity {
                total_points: 90,
                correct_answers: 1,
                total_answers: 1,
                average_response_time_ms: 5_000.0,
            }
        );
    }

    #[test]
    fn incremental_fold_matches_batch_totals() {
        let responses = [
            (true, 1_000),
            (false, 2_500),
            (true, 12_000),
            (true, -40),
            (false, 60_000),
            (true, 7_777),
        ];

        let mut standing = PlayerStanding::default();
        for (is_correct, elapsed_ms) in responses {
            standing = fold(
                standing,
                ScoredResponse {
                    is_correct,
                    points: rules().award(is_correct, elapsed_ms),
                    elapsed_ms,
                },
            );
        }

        let expected_points: u64 = responses
            .iter()
            .map(|(correct, elapsed)| u64::from(rules().award(*correct, *elapsed)))
            .sum();
        let expected_mean = responses
            .iter()
            .map(|(_, elapsed)| clamp_elapsed(*elapsed) as f64)
            .sum::<f64>()
            / responses.len() as f64;

        assert_eq!(standing.stats.total_answers, 6);
        assert_eq!(standing.stats.correct_answers, 4);
        assert_eq!(standing.stats.total_points, expected_points);
        assert_eq!(standing.score, expected_points);
        assert!((standing.stats.average_response_time_ms - expected_mean).abs() < 1e-6);
    }
}
