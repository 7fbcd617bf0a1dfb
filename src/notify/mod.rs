//! Trend computation and notification rendering for finished matches.

use chrono::{DateTime, Duration, Utc};

use crate::state::models::{Replay, Standing};

/// Three-way movement indicator for a rating or rank value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Flat,
    Down,
}

impl Trend {
    pub fn glyph(self) -> &'static str {
        match self {
            Trend::Up => "📈",
            Trend::Flat => "➖",
            Trend::Down => "📉",
        }
    }

    /// Rating follows ordinary numeric order: higher is better.
    pub fn of_rating(new: f64, old: f64) -> Trend {
        if new > old {
            Trend::Up
        } else if new == old {
            Trend::Flat
        } else {
            Trend::Down
        }
    }

    /// Rank is ordinal: a numerically smaller value is an improvement.
    pub fn of_rank(new: i64, old: i64) -> Trend {
        if new < old {
            Trend::Up
        } else if new == old {
            Trend::Flat
        } else {
            Trend::Down
        }
    }
}

/// Fresh standing plus its movement relative to the stored values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandingDelta {
    pub standing: Standing,
    pub rating_trend: Trend,
    pub rank_trend: Trend,
}

impl StandingDelta {
    pub fn new(fresh: Standing, stored: Standing) -> Self {
        StandingDelta {
            standing: fresh,
            rating_trend: Trend::of_rating(fresh.rating, stored.rating),
            rank_trend: Trend::of_rank(fresh.rank, stored.rank),
        }
    }
}

/// One followed participant of a finished match. `delta` is absent for
/// unranked games and when the standings fetch failed.
#[derive(Debug, Clone)]
pub struct ParticipantLine {
    pub name: String,
    pub delta: Option<StandingDelta>,
}

/// Compose the notification block for a finished match.
pub fn render_notification(replay: &Replay, participants: &[ParticipantLine]) -> String {
    let names: Vec<&str> = participants.iter().map(|p| p.name.as_str()).collect();
    let started = DateTime::<Utc>::from_timestamp_millis(replay.started_at)
        .unwrap_or(DateTime::UNIX_EPOCH);
    let ended = started + replay.duration();

    let mut message = format!("{} just finished a match\n", names.join(", "));
    message += &format!("Mode: {}\n", replay.mode.label());
    for participant in participants {
        if let Some(delta) = &participant.delta {
            message += &format!(
                "{}  ⭐ {:.1} [{}]  🏅 #{} [{}]\n",
                participant.name,
                delta.standing.rating,
                delta.rating_trend.glyph(),
                delta.standing.rank,
                delta.rank_trend.glyph(),
            );
        }
    }
    message += &format!("Started: {}\n", started.format("%Y-%m-%d %H:%M:%S"));
    message += &format!("Ended: {}\n", ended.format("%Y-%m-%d %H:%M:%S"));
    message += &format!("Duration: {}\n", format_duration(replay.duration()));
    message += &format!("Replay: {}", replay.permalink());
    message
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.num_seconds().max(0);
    let (hours, mins, secs) = (total_secs / 3600, total_secs % 3600 / 60, total_secs % 60);
    if hours > 0 {
        format!("{}h{}m{}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m{}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::models::Mode;

    fn replay(mode: Mode) -> Replay {
        Replay {
            id: "rkRY5zZ9h".into(),
            started_at: 1_677_389_229_000,
            mode,
            turns: 900,
            participants: vec!["alice".into(), "bob".into()],
        }
    }

    #[test]
    fn test_rating_trend() {
        assert_eq!(Trend::of_rating(42.0, 40.0), Trend::Up);
        assert_eq!(Trend::of_rating(40.0, 40.0), Trend::Flat);
        assert_eq!(Trend::of_rating(39.5, 40.0), Trend::Down);
    }

    #[test]
    fn test_rank_trend_smaller_is_better() {
        assert_eq!(Trend::of_rank(3, 5), Trend::Up);
        assert_eq!(Trend::of_rank(5, 5), Trend::Flat);
        assert_eq!(Trend::of_rank(9, 5), Trend::Down);
    }

    #[test]
    fn test_missing_values_compare_as_zero() {
        // A first-ever observation compares against the zero defaults.
        let delta = StandingDelta::new(
            Standing {
                rating: 12.0,
                rank: 840,
            },
            Standing::default(),
        );
        assert_eq!(delta.rating_trend, Trend::Up);
        assert_eq!(delta.rank_trend, Trend::Down);
    }

    #[test]
    fn test_render_ranked_match() {
        let delta = StandingDelta::new(
            Standing {
                rating: 42.0,
                rank: 3,
            },
            Standing {
                rating: 40.0,
                rank: 5,
            },
        );
        let lines = vec![
            ParticipantLine {
                name: "alice".into(),
                delta: Some(delta),
            },
            ParticipantLine {
                name: "bob".into(),
                delta: None,
            },
        ];
        let message = render_notification(&replay(Mode::OneVOne), &lines);
        assert!(message.starts_with("alice, bob just finished a match\n"));
        assert!(message.contains("Mode: 1v1\n"));
        assert!(message.contains("alice  ⭐ 42.0 [📈]  🏅 #3 [📈]\n"));
        assert!(message.contains("Duration: 7m30s\n"));
        assert!(message.ends_with("Replay: https://generals.io/replays/rkRY5zZ9h"));
    }

    #[test]
    fn test_render_custom_match_has_no_standings_lines() {
        let lines = vec![ParticipantLine {
            name: "alice".into(),
            delta: None,
        }];
        let message = render_notification(&replay(Mode::Custom), &lines);
        assert!(message.contains("Mode: custom\n"));
        assert!(!message.contains('⭐'));
        assert!(message.contains("Replay: https://generals.io/replays/rkRY5zZ9h"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::seconds(42)), "42s");
        assert_eq!(format_duration(Duration::seconds(450)), "7m30s");
        assert_eq!(format_duration(Duration::seconds(3700)), "1h1m40s");
    }
}
