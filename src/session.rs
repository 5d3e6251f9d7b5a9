use chrono::{DateTime, Local};
use serde::Serialize;

/// Points awarded for every hit before the combo bonus.
pub const HIT_POINTS: u64 = 100;
/// Bonus paid per full ten hits of the running combo.
pub const COMBO_BONUS: u64 = 50;
pub const COMBO_STEP: u32 = 10;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, strum_macros::Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    #[default]
    Idle,
    Countdown,
    Playing,
    Paused,
    Finished,
}

/// Visible countdown value. `None` on the engine means "waiting for pointer lock".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Countdown {
    Count(u8),
    Go,
}

impl std::fmt::Display for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Countdown::Count(n) => write!(f, "{}", n),
            Countdown::Go => write!(f, "GO!"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub duration_ms: u64,
    pub indefinite: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_ms: 30_000,
            indefinite: false,
        }
    }
}

/// Running tallies for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub score: u64,
    pub hits: u32,
    pub misses: u32,
    pub combo: u32,
    pub max_combo: u32,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    /// Score sampled once per elapsed second; always starts with 0.
    pub history: Vec<u64>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::fresh(Local::now())
    }
}

impl SessionStats {
    pub fn fresh(start_time: DateTime<Local>) -> Self {
        Self {
            score: 0,
            hits: 0,
            misses: 0,
            combo: 0,
            max_combo: 0,
            start_time,
            end_time: None,
            history: vec![0],
        }
    }

    /// Record a hit and return the points it was worth.
    pub fn record_hit(&mut self) -> u64 {
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        let points = HIT_POINTS + (self.combo / COMBO_STEP) as u64 * COMBO_BONUS;
        self.score += points;
        self.hits += 1;
        points
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
        self.combo = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.hits + self.misses
    }

    /// Whole-percent accuracy, 0 when nothing was attempted.
    pub fn accuracy(&self) -> u32 {
        accuracy(self.hits, self.misses)
    }
}

pub fn accuracy(hits: u32, misses: u32) -> u32 {
    let total = hits + misses;
    if total == 0 {
        0
    } else {
        ((hits as f64 / total as f64) * 100.0).round() as u32
    }
}

/// End-of-session numbers handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub score: u64,
    pub hits: u32,
    pub misses: u32,
    pub accuracy: u32,
    pub max_combo: u32,
    pub elapsed_secs: f64,
    pub history: Vec<u64>,
}

impl SessionSummary {
    pub fn new(stats: &SessionStats, elapsed_ms: u64) -> Self {
        Self {
            score: stats.score,
            hits: stats.hits,
            misses: stats.misses,
            accuracy: stats.accuracy(),
            max_combo: stats.max_combo,
            elapsed_secs: elapsed_ms as f64 / 1000.0,
            history: stats.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stats_start_at_zero() {
        let stats = SessionStats::default();
        assert_eq!(stats.score, 0);
        assert_eq!(stats.attempts(), 0);
        assert_eq!(stats.history, vec![0]);
        assert_eq!(stats.end_time, None);
        assert_eq!(stats.accuracy(), 0);
    }

    #[test]
    fn ten_hits_activate_the_combo_bonus() {
        let mut stats = SessionStats::default();
        let points: Vec<u64> = (0..10).map(|_| stats.record_hit()).collect();
        assert_eq!(&points[..9], &[100; 9]);
        assert_eq!(points[9], 150);
        assert_eq!(stats.score, 1050);
        assert_eq!(stats.combo, 10);
        assert_eq!(stats.max_combo, 10);
    }

    #[test]
    fn bonus_grows_with_every_ten() {
        let mut stats = SessionStats::default();
        for _ in 0..19 {
            stats.record_hit();
        }
        assert_eq!(stats.record_hit(), 200);
    }

    #[test]
    fn miss_resets_combo_but_keeps_max() {
        let mut stats = SessionStats::default();
        for _ in 0..4 {
            stats.record_hit();
        }
        stats.record_miss();
        assert_eq!(stats.combo, 0);
        assert_eq!(stats.max_combo, 4);
        assert_eq!(stats.score, 400);
        stats.record_hit();
        assert_eq!(stats.combo, 1);
        assert_eq!(stats.max_combo, 4);
    }

    #[test]
    fn accuracy_rounds_to_whole_percent() {
        assert_eq!(accuracy(0, 0), 0);
        assert_eq!(accuracy(2, 1), 67);
        assert_eq!(accuracy(1, 2), 33);
        assert_eq!(accuracy(1, 1), 50);
        assert_eq!(accuracy(5, 0), 100);
    }

    #[test]
    fn invariants_hold_for_a_mixed_sequence() {
        let mut stats = SessionStats::default();
        let pattern = [true, true, false, true, true, true, false, false, true];
        let mut last_score = 0;
        let mut last_max = 0;
        for (i, hit) in pattern.iter().enumerate() {
            if *hit {
                stats.record_hit();
            } else {
                stats.record_miss();
                assert_eq!(stats.combo, 0);
            }
            assert_eq!(stats.attempts() as usize, i + 1);
            assert!(stats.score >= last_score);
            assert!(stats.max_combo >= last_max);
            last_score = stats.score;
            last_max = stats.max_combo;
        }
        assert_eq!(stats.max_combo, 3);
    }

    #[test]
    fn status_and_countdown_display() {
        assert_eq!(GameStatus::Countdown.to_string(), "COUNTDOWN");
        assert_eq!(Countdown::Count(3).to_string(), "3");
        assert_eq!(Countdown::Go.to_string(), "GO!");
    }
}
