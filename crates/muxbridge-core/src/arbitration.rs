//! Backend candidate scoring and unique-best selection, plus the
//! cooldown gate between detection passes.
//!
//! Detection runs when the authoritative `list` comes back empty while
//! orphaned windows imply sessions still exist somewhere. Each candidate
//! transport is probed and scored against the short names the orphans
//! want; a winner is accepted only on unambiguous evidence.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

/// Minimum spacing between detection passes.
pub const DEFAULT_DETECTION_COOLDOWN_SECS: i64 = 30;

// ─── Scoring ─────────────────────────────────────────────────────────

/// Evidence gathered by probing one backend candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateScore {
    /// Distinct returned short names that orphaned windows expect.
    pub match_count: usize,
    /// Total sessions the candidate reported.
    pub sessions_count: usize,
}

/// The set of short names implied by orphaned windows.
pub fn wanted_set<'a>(orphan_short_names: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    orphan_short_names
        .into_iter()
        .map(str::to_owned)
        .collect()
}

/// Score one candidate's `list` result against the wanted set.
pub fn score_candidate<'a>(
    wanted: &BTreeSet<String>,
    returned_short_names: impl IntoIterator<Item = &'a str>,
) -> CandidateScore {
    let mut sessions_count = 0;
    let mut matched: BTreeSet<&str> = BTreeSet::new();
    for name in returned_short_names {
        sessions_count += 1;
        if wanted.contains(name) {
            matched.insert(name);
        }
    }
    CandidateScore {
        match_count: matched.len(),
        sessions_count,
    }
}

/// Index of the strict-best candidate.
///
/// Ranking key: `match_count` descending, then `sessions_count`
/// descending. Returns `None` when no candidate has positive match
/// evidence or when the best level is tied; ambiguity is never
/// auto-resolved.
pub fn select_unique_best(scores: &[CandidateScore]) -> Option<usize> {
    let mut best: Option<(CandidateScore, Vec<usize>)> = None;
    for (idx, score) in scores.iter().copied().enumerate() {
        match &mut best {
            None => best = Some((score, vec![idx])),
            Some((current, tied)) => {
                let key = (score.match_count, score.sessions_count);
                let current_key = (current.match_count, current.sessions_count);
                if key > current_key {
                    *current = score;
                    tied.clear();
                    tied.push(idx);
                } else if key == current_key {
                    tied.push(idx);
                }
            }
        }
    }

    let (score, tied) = best?;
    if score.match_count == 0 || tied.len() != 1 {
        return None;
    }
    tied.into_iter().next()
}

// ─── Cooldown ────────────────────────────────────────────────────────

/// Gate keeping detection passes at least one window apart, so an
/// empty backend doesn't trigger a full directory scan on every reload.
#[derive(Debug, Clone)]
pub struct DetectionCooldown {
    window: Duration,
    last_run: Option<DateTime<Utc>>,
}

impl DetectionCooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_run: None,
        }
    }

    /// Arm the cooldown and return `true` when a pass may run now.
    pub fn try_begin(&mut self, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_run
            && now.signed_duration_since(last) < self.window
        {
            return false;
        }
        self.last_run = Some(now);
        true
    }

    /// Forget the last run, e.g. after a configuration change.
    pub fn reset(&mut self) {
        self.last_run = None;
    }
}

impl Default for DetectionCooldown {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_DETECTION_COOLDOWN_SECS))
    }
}
