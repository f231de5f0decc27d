//! Liveness score: a 0-100 health estimate built from how recently a
//! repository saw commits and stars and how fast it gained stars lately.

use chrono::{DateTime, Utc};
use derive_more::Constructor;

use crate::api::{HistoryResult, RepoSnapshot};

#[derive(Debug, Clone, Default, PartialEq, Constructor)]
pub struct Signals {
    pub last_commit: Option<DateTime<Utc>>,
    pub last_star: Option<DateTime<Utc>>,
    pub stars_last_30d: u64,
    pub stars_last_14d: u64,
    pub stars_last_24h: u64,
    pub commits_last_30d: Option<u64>,
    pub archived: bool,
}

impl Signals {
    pub fn from_stats(snapshot: &RepoSnapshot, stars: &HistoryResult, commits: Option<&HistoryResult>) -> Self {
        Signals {
            last_commit: commits
                .and_then(|history| history.last_event_date)
                .or(snapshot.last_commit_date),
            last_star: stars.last_event_date.or(snapshot.last_star_date),
            stars_last_30d: stars.added_last_30d,
            stars_last_14d: stars.added_last_14d,
            stars_last_24h: stars.added_last_24h,
            commits_last_30d: commits.map(|history| history.added_last_30d),
            archived: snapshot.archived,
        }
    }
}

pub fn score(now: DateTime<Utc>, signals: &Signals) -> f32 {
    let mut score = 0.0_f32;

    if let Some(days) = days_since(now, signals.last_commit) {
        score += match days {
            d if d <= 1.0 => 50.0,
            d if d <= 3.0 => 40.0,
            d if d < 7.0 => 30.0,
            d if d < 14.0 => 20.0,
            d if d < 30.0 => 10.0,
            d if d < 60.0 => 6.0,
            _ => 0.0,
        };
    }

    if let Some(days) = days_since(now, signals.last_star) {
        score += match days {
            d if d <= 1.0 => 20.0,
            d if d < 7.0 => 10.0,
            d if d < 14.0 => 5.0,
            d if d < 30.0 => 2.0,
            _ => 0.0,
        };
    }

    score += growth_points(signals.stars_last_30d);

    score += match signals.stars_last_14d {
        n if n > 50 => 30.0,
        n if n > 30 => 20.0,
        n if n > 20 => 10.0,
        n if n > 5 => 5.0,
        _ => 0.0,
    };

    score += match signals.stars_last_24h {
        n if n > 30 => 10.0,
        n if n > 20 => 5.0,
        n if n > 5 => 2.0,
        _ => 0.0,
    };

    if let Some(commits) = signals.commits_last_30d {
        score += growth_points(commits);
    }

    if signals.archived {
        score -= 30.0;
    }

    score.clamp(0.0, 100.0)
}

fn growth_points(added_last_30d: u64) -> f32 {
    match added_last_30d {
        n if n > 20 => 10.0,
        n if n > 10 => 6.0,
        n if n > 1 => 2.0,
        _ => 0.0,
    }
}

fn days_since(now: DateTime<Utc>, date: Option<DateTime<Utc>>) -> Option<f64> {
    date.map(|date| (now - date).num_seconds() as f64 / 86_400.0)
}

/// Tests

#[cfg(test)]
fn ago(now: DateTime<Utc>, hours: i64) -> Option<DateTime<Utc>> {
    Some(now - chrono::Duration::hours(hours))
}

#[test]
fn busy_repository_clamps_at_100() {
    let now = Utc::now();
    let signals = Signals::new(Some(now), Some(now), 25, 60, 35, None, false);
    assert_eq!(score(now, &signals), 100.0);
}

#[test]
fn missing_dates_contribute_nothing() {
    let now = Utc::now();
    assert_eq!(score(now, &Signals::default()), 0.0);
    let signals = Signals::new(None, None, 11, 6, 0, None, false);
    assert_eq!(score(now, &signals), 11.0);
}

#[test]
fn recency_thresholds() {
    let now = Utc::now();
    let commit_only = |hours| score(now, &Signals::new(ago(now, hours), None, 0, 0, 0, None, false));
    assert_eq!(commit_only(24), 50.0);
    assert_eq!(commit_only(48), 40.0);
    assert_eq!(commit_only(24 * 5), 30.0);
    assert_eq!(commit_only(24 * 10), 20.0);
    assert_eq!(commit_only(24 * 20), 10.0);
    assert_eq!(commit_only(24 * 45), 6.0);
    assert_eq!(commit_only(24 * 90), 0.0);

    let star_only = |hours| score(now, &Signals::new(None, ago(now, hours), 0, 0, 0, None, false));
    assert_eq!(star_only(12), 20.0);
    assert_eq!(star_only(24 * 3), 10.0);
    assert_eq!(star_only(24 * 10), 5.0);
    assert_eq!(star_only(24 * 20), 2.0);
    assert_eq!(star_only(24 * 40), 0.0);
}

#[test]
fn commit_growth_counts_when_available() {
    let now = Utc::now();
    let without = score(now, &Signals::new(None, None, 0, 0, 0, None, false));
    let with = score(now, &Signals::new(None, None, 0, 0, 0, Some(21), false));
    assert_eq!(with - without, 10.0);
}

#[test]
fn archived_penalty_never_goes_negative() {
    let now = Utc::now();
    assert_eq!(score(now, &Signals::new(None, None, 0, 0, 0, None, true)), 0.0);
    let signals = Signals::new(ago(now, 1), None, 0, 0, 0, None, true);
    assert_eq!(score(now, &signals), 20.0);
}
