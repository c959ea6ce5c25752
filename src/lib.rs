// Inventory Reconciliation - Core Library
// Exposes the matching engine for the CLI, the API server and tests

pub mod config;
pub mod engine;
pub mod error;
pub mod matching;
pub mod normalize;
pub mod patterns;
pub mod ranking;
pub mod records;
pub mod similarity;

// Re-export commonly used types
pub use config::{Config, MatchingConfig, PatternConfig, RankingConfig};
pub use engine::Reconciler;
pub use error::{ReconcileError, Result};
pub use matching::{
    BatchOutcome, BatchSummary, ConsumedSet, GreedyMatcher, MatchResult, MatchType,
};
pub use normalize::normalize;
pub use patterns::{
    LearnedPattern, MemoryPatternStore, PatternMemory, PatternStore, SqlitePatternStore,
    DEFAULT_RETENTION,
};
pub use ranking::{top_score, MatchCandidate, SuggestionRanker};
pub use records::{
    load_registry_records, load_system_records, parse_pasted, PastedRecord, RegistryRecord,
    SystemRecord,
};
pub use similarity::{distance, similarity};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
