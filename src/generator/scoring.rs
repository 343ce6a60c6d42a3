use regex::Regex;
use std::sync::LazyLock;

use crate::db::models::Track;

const BASE_SCORE: f64 = 100.0;

const BPM_MAX_BONUS: f64 = 30.0;
const BPM_PENALTY_PER_BEAT: f64 = 5.0;

const KEY_EXACT: f64 = 25.0;
const KEY_RELATIVE: f64 = 20.0;
const KEY_ADJACENT: f64 = 20.0;
const KEY_TWO_STEPS: f64 = 15.0;
const KEY_OTHER: f64 = 5.0;

const ENERGY_MAX_BONUS: f64 = 20.0;
const ENERGY_PENALTY_PER_LEVEL: f64 = 3.0;

const SAME_ARTIST_PENALTY: f64 = 30.0;

static CAMELOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(\d{1,2})\s*([AB])\s*$").unwrap());

/// A key on the Camelot wheel: position 1–12, minor (A) or major (B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CamelotKey {
    pub number: u8,
    pub letter: char,
}

impl CamelotKey {
    /// Parse `"8A"`, `"12b"`, `" 3B "`. Anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = CAMELOT_RE.captures(raw)?;
        let number: u8 = caps[1].parse().ok()?;
        if !(1..=12).contains(&number) {
            return None;
        }
        let letter = caps[2].chars().next()?.to_ascii_uppercase();
        Some(Self { number, letter })
    }

    /// Steps around the 12-position wheel, taking the shorter way round.
    pub fn wheel_distance(&self, other: &CamelotKey) -> u8 {
        let diff = self.number.abs_diff(other.number);
        diff.min(12 - diff)
    }
}

/// Harmonic compatibility bonus between two key strings.
/// An unparseable key on either side still earns the "other" bonus.
pub fn key_compatibility(from: &str, to: &str) -> f64 {
    let (Some(a), Some(b)) = (CamelotKey::parse(from), CamelotKey::parse(to)) else {
        return KEY_OTHER;
    };

    if a == b {
        return KEY_EXACT;
    }
    if a.number == b.number {
        return KEY_RELATIVE;
    }
    if a.letter == b.letter {
        match a.wheel_distance(&b) {
            1 => return KEY_ADJACENT,
            2 => return KEY_TWO_STEPS,
            _ => {}
        }
    }
    KEY_OTHER
}

/// Score a candidate as the next track after `current`.
///
/// Higher is better. Missing BPM, key or energy contributes nothing for
/// that factor; an artist repeat is penalized.
pub fn score_candidate(
    current: &Track,
    candidate: &Track,
    desired_energy: f64,
    last_artist: Option<&str>,
) -> f64 {
    let mut score = BASE_SCORE;

    if let (Some(a), Some(b)) = (current.bpm, candidate.bpm) {
        score += (BPM_MAX_BONUS - (a - b).abs() * BPM_PENALTY_PER_BEAT).max(0.0);
    }

    if let (Some(a), Some(b)) = (current.key.as_deref(), candidate.key.as_deref()) {
        score += key_compatibility(a, b);
    }

    if let Some(energy) = candidate.energy {
        score +=
            (ENERGY_MAX_BONUS - (energy as f64 - desired_energy).abs() * ENERGY_PENALTY_PER_LEVEL)
                .max(0.0);
    }

    if let (Some(artist), Some(last)) = (candidate.artist.as_deref(), last_artist) {
        if artist.to_lowercase() == last.to_lowercase() {
            score -= SAME_ARTIST_PENALTY;
        }
    }

    score
}

/// Highest-scoring candidate. Ties keep the earliest candidate in slice order.
pub fn best_candidate<'a>(
    current: &Track,
    candidates: impl IntoIterator<Item = &'a Track>,
    desired_energy: f64,
    last_artist: Option<&str>,
) -> Option<(&'a Track, f64)> {
    let mut best: Option<(&'a Track, f64)> = None;
    for candidate in candidates {
        let score = score_candidate(current, candidate, desired_energy, last_artist);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((candidate, score)),
        }
    }
    best
}
