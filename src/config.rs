//! Engine configuration
//!
//! Loaded from TOML; every key is optional and falls back to the values the
//! matching rules were tuned with. A missing file means all defaults.
//!
//! ```toml
//! user = "ana"
//!
//! [ranking]
//! supplier_bonus = 0.15
//!
//! [matching]
//! fuzzy_threshold = 0.65
//!
//! [patterns]
//! database = "reconcile.db"
//! ```

use crate::error::{ReconcileError, Result};
use crate::patterns::DEFAULT_RETENTION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Acting user recorded on learned patterns
    pub user: String,
    pub ranking: RankingConfig,
    pub matching: MatchingConfig,
    pub patterns: PatternConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            user: "system".to_string(),
            ranking: RankingConfig::default(),
            matching: MatchingConfig::default(),
            patterns: PatternConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ReconcileError::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ReconcileError::Config(format!("Read TOML failed: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Thresholds and weights must be fractions; retention must be positive
    pub fn validate(&self) -> Result<()> {
        let fractions = [
            ("ranking.supplier_threshold", self.ranking.supplier_threshold),
            ("ranking.supplier_bonus", self.ranking.supplier_bonus),
            ("ranking.pattern_system_threshold", self.ranking.pattern_system_threshold),
            ("ranking.pattern_candidate_threshold", self.ranking.pattern_candidate_threshold),
            ("ranking.pattern_weight", self.ranking.pattern_weight),
            ("ranking.best_guess_threshold", self.ranking.best_guess_threshold),
            ("matching.fuzzy_threshold", self.matching.fuzzy_threshold),
            ("matching.ambiguity_gap", self.matching.ambiguity_gap),
        ];

        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(ReconcileError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.patterns.retention == 0 {
            return Err(ReconcileError::Config(
                "patterns.retention must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Suggestion ranking knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Supplier similarity needed for the supplier bonus (strictly above)
    pub supplier_threshold: f64,
    pub supplier_bonus: f64,
    /// System-side similarity for a learned pattern to apply (strictly above)
    pub pattern_system_threshold: f64,
    /// Candidate-side similarity for a learned pattern to apply (strictly above)
    pub pattern_candidate_threshold: f64,
    pub pattern_weight: f64,
    /// Top final score at which a suggestion is flagged as a best guess
    pub best_guess_threshold: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        RankingConfig {
            supplier_threshold: 0.7,
            supplier_bonus: 0.15,
            pattern_system_threshold: 0.7,
            pattern_candidate_threshold: 0.6,
            pattern_weight: 0.2,
            best_guess_threshold: 0.85,
        }
    }
}

/// Batch matching knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Fuzzy candidates must score strictly above this
    pub fuzzy_threshold: f64,
    /// Top two fuzzy scores closer than this are ambiguous
    pub ambiguity_gap: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        MatchingConfig {
            fuzzy_threshold: 0.65,
            ambiguity_gap: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub retention: usize,
    pub database: PathBuf,
}

impl Default for PatternConfig {
    fn default() -> Self {
        PatternConfig {
            retention: DEFAULT_RETENTION,
            database: PathBuf::from("reconcile.db"),
        }
    }
}
