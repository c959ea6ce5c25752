// ⚖️ Reconciler - One review session over system and registry inventories
//
// Loads pattern memory once at session start, then exposes the four
// operations the application uses:
//   similarity, rank, match_batch, record_confirmed_match

use crate::config::Config;
use crate::matching::{BatchOutcome, GreedyMatcher};
use crate::patterns::{LearnedPattern, PatternMemory, PatternStore};
use crate::ranking::{MatchCandidate, SuggestionRanker};
use crate::records::{PastedRecord, RegistryRecord, SystemRecord};
use chrono::Utc;
use tracing::info;

pub struct Reconciler<S: PatternStore> {
    store: S,
    memory: PatternMemory,
    ranker: SuggestionRanker,
    matcher: GreedyMatcher,
    user: String,
}

impl<S: PatternStore> Reconciler<S> {
    /// Start a session: load learned patterns (empty on failure)
    pub fn start(store: S, config: Config) -> Self {
        let memory = PatternMemory::load(&store, config.patterns.retention);
        info!(
            "Reconciliation session for {} with {} learned patterns",
            config.user,
            memory.len()
        );

        Reconciler {
            store,
            memory,
            ranker: SuggestionRanker::with_config(config.ranking),
            matcher: GreedyMatcher::with_config(config.matching),
            user: config.user,
        }
    }

    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        crate::similarity::similarity(a, b)
    }

    /// Registry candidates for one system record, best first, biased by
    /// learned patterns
    pub fn rank<'a>(
        &self,
        item: &SystemRecord,
        pool: &'a [RegistryRecord],
    ) -> Vec<MatchCandidate<'a>> {
        self.ranker.rank(item, pool, self.memory.patterns())
    }

    /// Top candidate when strong enough to flag as a best guess
    pub fn best_guess<'c, 'a>(
        &self,
        ranked: &'c [MatchCandidate<'a>],
    ) -> Option<&'c MatchCandidate<'a>> {
        self.ranker.best_guess(ranked)
    }

    pub fn match_batch(&self, pasted: &[PastedRecord], pool: &[SystemRecord]) -> BatchOutcome {
        self.matcher.match_batch(pasted, pool)
    }

    /// Remember a human-confirmed link
    ///
    /// Store failures are logged only: the caller's match stands, and the
    /// pattern still biases the rest of this session.
    pub fn record_confirmed_match(
        &mut self,
        system: &SystemRecord,
        registry: &RegistryRecord,
        score: f64,
    ) -> LearnedPattern {
        self.memory
            .record(&self.store, system, registry, score, &self.user, Utc::now())
    }

    pub fn memory(&self) -> &PatternMemory {
        &self.memory
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}
