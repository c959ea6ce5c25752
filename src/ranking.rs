// 🏆 Suggestion Ranker - Order registry candidates for one system record
//
// finalScore = min(base + patternBonus, 1.0)
//   base         = similarity(system string, registry string)
//                  + 0.15 when suppliers agree (similarity > 0.7), clipped to 1.0
//   patternBonus = Σ over learned patterns that resemble this system record
//                  (> 0.7) and this candidate (> 0.6) of sysSim × candSim × 0.2
//
// No candidate is dropped: output length == pool length.

use crate::config::RankingConfig;
use crate::normalize::join_fields;
use crate::patterns::LearnedPattern;
use crate::records::{RegistryRecord, SystemRecord};
use crate::similarity::similarity;
use serde::Serialize;

/// Supplier value meaning "unknown" in both inventories
pub const SUPPLIER_PLACEHOLDER: &str = "-";

// ============================================================================
// MATCH CANDIDATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate<'a> {
    pub record: &'a RegistryRecord,

    /// Position of the record in the input pool
    pub pool_index: usize,

    /// Text similarity plus supplier bonus, clipped to 1.0
    pub base_score: f64,

    /// Accumulated learned-pattern boost
    pub bonus_score: f64,

    pub final_score: f64,
}

// ============================================================================
// COMPARISON STRINGS
// ============================================================================

/// description + supplier
pub fn system_string(item: &SystemRecord) -> String {
    join_fields(&[item.description.as_deref(), item.supplier.as_deref()])
}

/// description + species + supplier
pub fn registry_string(record: &RegistryRecord) -> String {
    join_fields(&[
        record.description.as_deref(),
        record.species.as_deref(),
        record.supplier.as_deref(),
    ])
}

fn pattern_system_string(pattern: &LearnedPattern) -> String {
    join_fields(&[
        pattern.system_description.as_deref(),
        pattern.system_supplier.as_deref(),
    ])
}

fn pattern_registry_string(pattern: &LearnedPattern) -> String {
    join_fields(&[
        pattern.registry_description.as_deref(),
        pattern.registry_supplier.as_deref(),
    ])
}

/// A supplier that is present, non-blank and not the placeholder
fn known_supplier(supplier: Option<&str>) -> Option<&str> {
    supplier
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != SUPPLIER_PLACEHOLDER)
}

// ============================================================================
// SUGGESTION RANKER
// ============================================================================

pub struct SuggestionRanker {
    pub config: RankingConfig,
}

impl SuggestionRanker {
    pub fn new() -> Self {
        SuggestionRanker {
            config: RankingConfig::default(),
        }
    }

    pub fn with_config(config: RankingConfig) -> Self {
        SuggestionRanker { config }
    }

    /// Rank every pool record against `item`, best first
    ///
    /// Ties keep pool order.
    pub fn rank<'a>(
        &self,
        item: &SystemRecord,
        pool: &'a [RegistryRecord],
        patterns: &[LearnedPattern],
    ) -> Vec<MatchCandidate<'a>> {
        let system = system_string(item);
        let system_supplier = known_supplier(item.supplier.as_deref());

        let registry_strings: Vec<String> = pool.iter().map(registry_string).collect();

        let mut candidates: Vec<MatchCandidate<'a>> = pool
            .iter()
            .zip(&registry_strings)
            .enumerate()
            .map(|(pool_index, (record, registry))| {
                let mut base_score = similarity(&system, registry);

                if let (Some(a), Some(b)) =
                    (system_supplier, known_supplier(record.supplier.as_deref()))
                {
                    if similarity(a, b) > self.config.supplier_threshold {
                        base_score += self.config.supplier_bonus;
                    }
                }

                MatchCandidate {
                    record,
                    pool_index,
                    base_score: base_score.min(1.0),
                    bonus_score: 0.0,
                    final_score: 0.0,
                }
            })
            .collect();

        self.apply_pattern_bonus(&system, &registry_strings, &mut candidates, patterns);

        for candidate in &mut candidates {
            candidate.final_score = (candidate.base_score + candidate.bonus_score).min(1.0);
        }

        // sort_by is stable
        candidates.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        candidates
    }

    /// Boost candidates resembling previously confirmed registry records
    ///
    /// A candidate can be boosted by several patterns at once.
    fn apply_pattern_bonus(
        &self,
        system: &str,
        registry_strings: &[String],
        candidates: &mut [MatchCandidate<'_>],
        patterns: &[LearnedPattern],
    ) {
        for pattern in patterns {
            let system_sim = similarity(system, &pattern_system_string(pattern));
            if system_sim <= self.config.pattern_system_threshold {
                continue;
            }

            let learned_registry = pattern_registry_string(pattern);
            for (candidate, registry) in candidates.iter_mut().zip(registry_strings) {
                let candidate_sim = similarity(registry, &learned_registry);
                if candidate_sim > self.config.pattern_candidate_threshold {
                    candidate.bonus_score +=
                        system_sim * candidate_sim * self.config.pattern_weight;
                }
            }
        }
    }

    /// The top candidate, when it is strong enough to flag as a best guess
    pub fn best_guess<'c, 'a>(
        &self,
        ranked: &'c [MatchCandidate<'a>],
    ) -> Option<&'c MatchCandidate<'a>> {
        ranked
            .first()
            .filter(|c| c.final_score >= self.config.best_guess_threshold)
    }
}

impl Default for SuggestionRanker {
    fn default() -> Self {
        Self::new()
    }
}

/// Final score of the best-ranked candidate
pub fn top_score(ranked: &[MatchCandidate<'_>]) -> Option<f64> {
    ranked.first().map(|c| c.final_score)
}

// ============================================================================
// TESTS
// ============================================================================
