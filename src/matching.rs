// 📋 Greedy Matcher - Assign bulk-pasted records to system records
//
// Each pasted record (input order) tries tiers in strict priority and stops
// at the first hit:
//   1. Perfect     - description + location + state equal
//   2. High        - description + location equal
//   3. Exact       - description equal
//   4. Similarity  - best fuzzy score > 0.65, clear of the runner-up by ≥ 0.10
//      Ambiguous   - top two fuzzy scores closer than 0.10 (nothing consumed)
//   5. Not found
//
// Single pass, not globally optimal: earlier pasted records win contested
// pool entries. Ambiguous cases go to a human.

use crate::config::MatchingConfig;
use crate::normalize::normalize_field;
use crate::records::{PastedRecord, SystemRecord};
use crate::similarity::similarity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Slack on the ambiguity gap so that 0.85 vs 0.75 counts as a full 0.10
const GAP_TOLERANCE: f64 = 1e-9;

// ============================================================================
// MATCH TYPE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchType {
    Perfect,
    HighDescriptionLocation,
    ExactDescription,
    BySimilarity { score: f64 },
    Ambiguous { best: f64, runner_up: f64 },
    NotFound,
}

impl MatchType {
    /// Label shown to the reviewer
    pub fn label(&self) -> String {
        match self {
            MatchType::Perfect => "Perfect".to_string(),
            MatchType::HighDescriptionLocation => "High (description+location)".to_string(),
            MatchType::ExactDescription => "Exact (description)".to_string(),
            MatchType::BySimilarity { score } => {
                format!("By similarity ({:.0}%)", score * 100.0)
            }
            MatchType::Ambiguous { .. } => "Ambiguous".to_string(),
            MatchType::NotFound => "Not found".to_string(),
        }
    }

    /// Summary bucket, ignoring scores
    pub fn kind(&self) -> &'static str {
        match self {
            MatchType::Perfect => "Perfect",
            MatchType::HighDescriptionLocation => "High",
            MatchType::ExactDescription => "Exact",
            MatchType::BySimilarity { .. } => "Similarity",
            MatchType::Ambiguous { .. } => "Ambiguous",
            MatchType::NotFound => "Not found",
        }
    }

    pub fn is_matched(&self) -> bool {
        !matches!(self, MatchType::Ambiguous { .. } | MatchType::NotFound)
    }
}

// ============================================================================
// MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Position of the pasted record in the batch
    pub pasted_index: usize,

    /// Pool record assigned to it, if any
    pub pool_index: Option<usize>,

    pub match_type: MatchType,

    /// For ambiguous results: the pool records that tied
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contenders: Vec<usize>,
}

/// Pool indices already assigned during one batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumedSet {
    indices: HashSet<usize>,
}

impl ConsumedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_consumed(&self, pool_index: usize) -> bool {
        self.indices.contains(&pool_index)
    }

    pub fn consume(&mut self, pool_index: usize) {
        self.indices.insert(pool_index);
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Results of one batch run, in pasted order, plus the consumed pool indices
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub results: Vec<MatchResult>,
    pub consumed: ConsumedSet,
}

impl BatchOutcome {
    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_results(&self.results)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub matched: usize,
    pub ambiguous: usize,
    pub not_found: usize,
    pub by_kind: BTreeMap<String, usize>,
}

impl BatchSummary {
    pub fn from_results(results: &[MatchResult]) -> Self {
        let mut by_kind = BTreeMap::new();
        for result in results {
            *by_kind.entry(result.match_type.kind().to_string()).or_insert(0) += 1;
        }

        BatchSummary {
            total: results.len(),
            matched: results.iter().filter(|r| r.match_type.is_matched()).count(),
            ambiguous: results
                .iter()
                .filter(|r| matches!(r.match_type, MatchType::Ambiguous { .. }))
                .count(),
            not_found: results
                .iter()
                .filter(|r| r.match_type == MatchType::NotFound)
                .count(),
            by_kind,
        }
    }
}

// ============================================================================
// GREEDY MATCHER
// ============================================================================

/// Normalized comparison keys of one record
struct Keys {
    description: String,
    location: String,
    state: String,
}

impl Keys {
    fn of_pasted(record: &PastedRecord) -> Self {
        Keys {
            description: normalize_field(record.description.as_deref()),
            location: normalize_field(record.location.as_deref()),
            state: normalize_field(record.state.as_deref()),
        }
    }

    fn of_system(record: &SystemRecord) -> Self {
        Keys {
            description: normalize_field(record.description.as_deref()),
            location: normalize_field(record.location.as_deref()),
            state: normalize_field(record.state.as_deref()),
        }
    }
}

pub struct GreedyMatcher {
    pub config: MatchingConfig,
}

impl GreedyMatcher {
    pub fn new() -> Self {
        GreedyMatcher {
            config: MatchingConfig::default(),
        }
    }

    pub fn with_config(config: MatchingConfig) -> Self {
        GreedyMatcher { config }
    }

    /// Match a whole batch with a fresh consumed set
    pub fn match_batch(&self, pasted: &[PastedRecord], pool: &[SystemRecord]) -> BatchOutcome {
        self.match_batch_with(pasted, pool, similarity)
    }

    /// Match a batch using a custom description scorer for the fuzzy tier
    pub fn match_batch_with<F>(
        &self,
        pasted: &[PastedRecord],
        pool: &[SystemRecord],
        score: F,
    ) -> BatchOutcome
    where
        F: Fn(&str, &str) -> f64,
    {
        let pool_keys: Vec<Keys> = pool.iter().map(Keys::of_system).collect();
        let mut consumed = ConsumedSet::new();

        let results: Vec<MatchResult> = pasted
            .iter()
            .enumerate()
            .map(|(i, record)| {
                self.match_keys(i, record, pool, &pool_keys, &mut consumed, &score)
            })
            .collect();

        let summary = BatchSummary::from_results(&results);
        debug!(
            "Batch matched {}/{} ({} ambiguous, {} not found)",
            summary.matched, summary.total, summary.ambiguous, summary.not_found
        );

        BatchOutcome { results, consumed }
    }

    /// Match a single pasted record against the unconsumed part of the pool
    ///
    /// The chosen pool index, if any, is added to `consumed`.
    pub fn match_one(
        &self,
        pasted_index: usize,
        record: &PastedRecord,
        pool: &[SystemRecord],
        consumed: &mut ConsumedSet,
    ) -> MatchResult {
        let pool_keys: Vec<Keys> = pool.iter().map(Keys::of_system).collect();
        self.match_keys(pasted_index, record, pool, &pool_keys, consumed, &similarity)
    }

    fn match_keys<F>(
        &self,
        pasted_index: usize,
        record: &PastedRecord,
        pool: &[SystemRecord],
        pool_keys: &[Keys],
        consumed: &mut ConsumedSet,
        score: &F,
    ) -> MatchResult
    where
        F: Fn(&str, &str) -> f64,
    {
        let keys = Keys::of_pasted(record);

        if keys.description.is_empty() {
            return not_found(pasted_index);
        }

        // Tiers 1-3: exact comparisons, first available pool record wins
        let exact_tiers: [(MatchType, fn(&Keys, &Keys) -> bool); 3] = [
            (MatchType::Perfect, |a: &Keys, b: &Keys| {
                a.description == b.description && a.location == b.location && a.state == b.state
            }),
            (MatchType::HighDescriptionLocation, |a: &Keys, b: &Keys| {
                a.description == b.description && a.location == b.location
            }),
            (MatchType::ExactDescription, |a: &Keys, b: &Keys| {
                a.description == b.description
            }),
        ];

        for (match_type, matches) in exact_tiers {
            let hit = pool_keys
                .iter()
                .enumerate()
                .find(|(j, pooled)| !consumed.is_consumed(*j) && matches(&keys, pooled))
                .map(|(j, _)| j);

            if let Some(j) = hit {
                consumed.consume(j);
                return MatchResult {
                    pasted_index,
                    pool_index: Some(j),
                    match_type,
                    contenders: Vec::new(),
                };
            }
        }

        // Tier 4: fuzzy on the raw descriptions
        let description = record.description.as_deref().unwrap_or_default();
        let mut scored: Vec<(usize, f64)> = pool
            .iter()
            .enumerate()
            .filter(|(j, _)| !consumed.is_consumed(*j))
            .map(|(j, pooled)| {
                let candidate = pooled.description.as_deref().unwrap_or_default();
                (j, score(description, candidate))
            })
            .filter(|(_, s)| *s > self.config.fuzzy_threshold)
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let min_gap = self.config.ambiguity_gap - GAP_TOLERANCE;

        match scored.as_slice() {
            [] => not_found(pasted_index),
            [(best_j, best), (second_j, second), ..] if best - second < min_gap => MatchResult {
                pasted_index,
                pool_index: None,
                match_type: MatchType::Ambiguous {
                    best: *best,
                    runner_up: *second,
                },
                contenders: vec![*best_j, *second_j],
            },
            [(best_j, best), ..] => {
                consumed.consume(*best_j);
                MatchResult {
                    pasted_index,
                    pool_index: Some(*best_j),
                    match_type: MatchType::BySimilarity { score: *best },
                    contenders: Vec::new(),
                }
            }
        }
    }
}

impl Default for GreedyMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(pasted_index: usize) -> MatchResult {
    MatchResult {
        pasted_index,
        pool_index: None,
        match_type: MatchType::NotFound,
        contenders: Vec::new(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
