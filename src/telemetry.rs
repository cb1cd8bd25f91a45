use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::config::HealthThresholds;
use crate::types::{FailureKind, OutputEntry};

/// Three-axis heuristic summary of a worker's recent output. All axes are
/// clamped to [0.0, 1.0]; the clamp is part of the contract, since the raw
/// certainty formula can leave that range in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryVector {
    /// Fraction of goal keywords present in recent output.
    pub alignment: f32,
    /// Error markers plus repetition; high means looping or retrying.
    pub stall: f32,
    /// Confident language minus discounted uncertain language.
    pub certainty: f32,
}

impl TelemetryVector {
    pub fn zero() -> Self {
        Self {
            alignment: 0.0,
            stall: 0.0,
            certainty: 0.0,
        }
    }

    /// Pure predicate over named thresholds; no policy is hard-coded here.
    pub fn is_healthy(&self, thresholds: &HealthThresholds) -> bool {
        self.alignment > thresholds.min_alignment
            && self.stall < thresholds.max_stall
            && self.certainty > thresholds.min_certainty
    }

    /// Name the breached axis, checked in severity order.
    pub fn diagnose(&self, thresholds: &HealthThresholds) -> FailureKind {
        if self.alignment <= thresholds.min_alignment {
            FailureKind::Divergence
        } else if self.stall >= thresholds.max_stall {
            FailureKind::Stalling
        } else {
            FailureKind::LowCertainty
        }
    }
}

impl fmt::Display for TelemetryVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "align={:.2} stall={:.2} certainty={:.2}",
            self.alignment, self.stall, self.certainty
        )
    }
}

/// Marker vocabularies the analyzer scans for. Swappable so domains with
/// different failure language can retune detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lexicon {
    pub error_markers: Vec<String>,
    pub uncertain_markers: Vec<String>,
    pub confident_markers: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        let to_owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            error_markers: to_owned(&["error", "failed", "retry", "trying again", "unable"]),
            uncertain_markers: to_owned(&["maybe", "might", "uncertain", "not sure", "trying"]),
            confident_markers: to_owned(&["completed", "success", "done", "processed"]),
        }
    }
}

/// Lightweight heuristic scorer. Pure over its inputs; a sampling tick
/// recomputes the vector from scratch, nothing is accumulated.
pub struct TelemetryAnalyzer {
    lexicon: Lexicon,
    word: Regex,
}

impl TelemetryAnalyzer {
    pub fn new(lexicon: Lexicon) -> Self {
        Self {
            lexicon,
            word: Regex::new(r"[a-z0-9_']+").unwrap(),
        }
    }

    pub fn analyze(&self, outputs: &[OutputEntry], goal: &str) -> TelemetryVector {
        if outputs.is_empty() {
            return TelemetryVector::zero();
        }

        let combined = outputs
            .iter()
            .map(|entry| entry.content.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        let goal_words = self.words(&goal.to_lowercase());
        let output_words = self.words(&combined);

        // A goal with no extractable keywords scores neutral rather than
        // zero, so a malformed goal does not read as divergence.
        let alignment = if goal_words.is_empty() {
            0.5
        } else {
            let overlap = goal_words.intersection(&output_words).count();
            (overlap as f32 / goal_words.len() as f32).clamp(0.0, 1.0)
        };

        let error_count = self.count_markers(&combined, &self.lexicon.error_markers);
        let mut repetition = 0.0;
        if outputs.len() >= 3 {
            let tail: Vec<&str> = outputs[outputs.len() - 3..]
                .iter()
                .map(|entry| entry.content.as_str())
                .collect();
            let distinct: HashSet<&str> = tail.iter().copied().collect();
            if distinct.len() < tail.len() {
                repetition = 0.4;
            }
        }
        let stall = (error_count as f32 * 0.2 + repetition).clamp(0.0, 1.0);

        let uncertain = self.count_markers(&combined, &self.lexicon.uncertain_markers);
        let confident = self.count_markers(&combined, &self.lexicon.confident_markers);
        let certainty = ((confident as f32 - uncertain as f32 * 0.5) / 5.0).clamp(0.0, 1.0);

        TelemetryVector {
            alignment,
            stall,
            certainty,
        }
    }

    fn words(&self, text: &str) -> HashSet<String> {
        self.word
            .find_iter(text)
            .map(|found| found.as_str().to_string())
            .collect()
    }

    fn count_markers(&self, text: &str, markers: &[String]) -> usize {
        markers
            .iter()
            .filter(|marker| text.contains(marker.as_str()))
            .count()
    }
}

impl Default for TelemetryAnalyzer {
    fn default() -> Self {
        Self::new(Lexicon::default())
    }
}
