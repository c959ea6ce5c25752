// 🧠 Pattern Memory - Learn from human-confirmed matches
//
// Every confirmed link (system record ↔ registry record) becomes a
// LearnedPattern. The ranker uses recent patterns to boost candidates that
// look like links people accepted before.
//
// - Store is append-only ("most recent N" reads + single appends)
// - Memory keeps the 300 newest, newest first
// - Load failure = empty memory (ranking still works without patterns)
// - Record failure is logged, never undoes the caller's match

use crate::error::{ReconcileError, Result};
use crate::records::{RegistryRecord, SystemRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Number of learned patterns kept in memory
pub const DEFAULT_RETENTION: usize = 300;

// ============================================================================
// LEARNED PATTERN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub id: String,
    pub system_description: Option<String>,
    pub system_supplier: Option<String>,
    pub registry_description: Option<String>,
    pub registry_supplier: Option<String>,
    pub tag: Option<String>,
    pub unit: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    /// Ranking score the pair had when it was confirmed
    pub original_score: f64,
    pub timestamp: DateTime<Utc>,
    pub user: String,
}

impl LearnedPattern {
    /// Build a pattern from a confirmed pair
    ///
    /// Unit and type come from the system side when known, otherwise from the
    /// registry side.
    pub fn from_match(
        system: &SystemRecord,
        registry: &RegistryRecord,
        score: f64,
        user: &str,
        now: DateTime<Utc>,
    ) -> Self {
        LearnedPattern {
            id: uuid::Uuid::new_v4().to_string(),
            system_description: system.description.clone(),
            system_supplier: system.supplier.clone(),
            registry_description: registry.description.clone(),
            registry_supplier: registry.supplier.clone(),
            tag: registry.tag.clone(),
            unit: system.unit.clone().or_else(|| registry.unit.clone()),
            item_type: system.item_type.clone(),
            original_score: score.clamp(0.0, 1.0),
            timestamp: now,
            user: user.to_string(),
        }
    }
}

// ============================================================================
// PATTERN STORE
// ============================================================================

/// Persistent append-only home of learned patterns
pub trait PatternStore {
    /// Up to `limit` patterns, newest first
    fn recent(&self, limit: usize) -> Result<Vec<LearnedPattern>>;

    /// Append one pattern
    fn append(&self, pattern: &LearnedPattern) -> Result<()>;
}

/// SQLite-backed store
pub struct SqlitePatternStore {
    conn: Connection,
}

impl SqlitePatternStore {
    /// Open (or create) the database file and make sure the table exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Enable WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_schema(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    /// Wrap a connection without touching its schema
    pub fn from_connection(conn: Connection) -> Self {
        SqlitePatternStore { conn }
    }

    fn with_schema(conn: Connection) -> Result<Self> {
        setup_schema(&conn)?;
        Ok(SqlitePatternStore { conn })
    }

    /// Total patterns ever stored
    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM learned_patterns", [], |row| row.get(0))?;
        Ok(count)
    }
}

pub fn setup_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS learned_patterns (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pattern_uuid TEXT UNIQUE NOT NULL,
            system_description TEXT,
            system_supplier TEXT,
            registry_description TEXT,
            registry_supplier TEXT,
            tag TEXT,
            unit TEXT,
            item_type TEXT,
            original_score REAL NOT NULL,
            recorded_at INTEGER NOT NULL,
            user TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_patterns_recorded_at ON learned_patterns(recorded_at)",
        [],
    )?;

    Ok(())
}

impl PatternStore for SqlitePatternStore {
    fn recent(&self, limit: usize) -> Result<Vec<LearnedPattern>> {
        let mut stmt = self.conn.prepare(
            "SELECT pattern_uuid, system_description, system_supplier,
                    registry_description, registry_supplier, tag, unit, item_type,
                    original_score, recorded_at, user
             FROM learned_patterns
             ORDER BY recorded_at DESC, id DESC
             LIMIT ?1",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, f64>(8)?,
                    row.get::<_, i64>(9)?,
                    row.get::<_, String>(10)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| {
                let timestamp = DateTime::<Utc>::from_timestamp_millis(row.9).ok_or_else(|| {
                    ReconcileError::InvalidInput(format!(
                        "pattern {} has invalid timestamp {}",
                        row.0, row.9
                    ))
                })?;

                Ok(LearnedPattern {
                    id: row.0,
                    system_description: row.1,
                    system_supplier: row.2,
                    registry_description: row.3,
                    registry_supplier: row.4,
                    tag: row.5,
                    unit: row.6,
                    item_type: row.7,
                    original_score: row.8,
                    timestamp,
                    user: row.10,
                })
            })
            .collect()
    }

    fn append(&self, pattern: &LearnedPattern) -> Result<()> {
        self.conn.execute(
            "INSERT INTO learned_patterns (
                pattern_uuid, system_description, system_supplier,
                registry_description, registry_supplier, tag, unit, item_type,
                original_score, recorded_at, user
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                pattern.id,
                pattern.system_description,
                pattern.system_supplier,
                pattern.registry_description,
                pattern.registry_supplier,
                pattern.tag,
                pattern.unit,
                pattern.item_type,
                pattern.original_score,
                pattern.timestamp.timestamp_millis(),
                pattern.user,
            ],
        )?;

        Ok(())
    }
}

/// In-process store, for tests and embedding without a database
#[derive(Default)]
pub struct MemoryPatternStore {
    /// Append order (oldest first)
    patterns: RwLock<Vec<LearnedPattern>>,
}

impl MemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.patterns.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PatternStore for MemoryPatternStore {
    fn recent(&self, limit: usize) -> Result<Vec<LearnedPattern>> {
        let patterns = self
            .patterns
            .read()
            .map_err(|_| ReconcileError::InvalidInput("pattern store lock poisoned".to_string()))?;

        let mut newest: Vec<LearnedPattern> = patterns.clone();
        // Equal timestamps: later appends come first
        newest.sort_by_key(|p| p.timestamp);
        newest.reverse();
        newest.truncate(limit);
        Ok(newest)
    }

    fn append(&self, pattern: &LearnedPattern) -> Result<()> {
        let mut patterns = self
            .patterns
            .write()
            .map_err(|_| ReconcileError::InvalidInput("pattern store lock poisoned".to_string()))?;
        patterns.push(pattern.clone());
        Ok(())
    }
}

// ============================================================================
// PATTERN MEMORY
// ============================================================================

/// Bounded, newest-first cache of learned patterns
#[derive(Debug, Clone)]
pub struct PatternMemory {
    patterns: Vec<LearnedPattern>,
    retention: usize,
}

impl PatternMemory {
    pub fn new(retention: usize) -> Self {
        PatternMemory {
            patterns: Vec::new(),
            retention,
        }
    }

    /// Load the newest patterns from the store
    ///
    /// Any store error (unreachable, table not created yet) yields an empty
    /// memory. Pattern bias is an enhancement, not a precondition.
    pub fn load(store: &dyn PatternStore, retention: usize) -> Self {
        let mut memory = PatternMemory::new(retention);

        match store.recent(retention) {
            Ok(mut patterns) => {
                patterns.truncate(retention);
                info!("Loaded {} learned patterns", patterns.len());
                memory.patterns = patterns;
            }
            Err(e) => {
                warn!("Could not load learned patterns, continuing without them: {}", e);
            }
        }

        memory
    }

    /// Persist a confirmed match and add it to the cache
    ///
    /// The cache is updated even when the write fails, so the next ranking
    /// call sees the pattern right away.
    pub fn record(
        &mut self,
        store: &dyn PatternStore,
        system: &SystemRecord,
        registry: &RegistryRecord,
        score: f64,
        user: &str,
        now: DateTime<Utc>,
    ) -> LearnedPattern {
        let pattern = LearnedPattern::from_match(system, registry, score, user, now);

        match store.append(&pattern) {
            Ok(()) => debug!(
                "Recorded pattern {} (tag {:?}) by {}",
                pattern.id, pattern.tag, pattern.user
            ),
            Err(e) => error!("Failed to persist learned pattern {}: {}", pattern.id, e),
        }

        self.remember(pattern.clone());
        pattern
    }

    /// Prepend to the cache, evicting the oldest past the retention bound
    pub fn remember(&mut self, pattern: LearnedPattern) {
        self.patterns.insert(0, pattern);
        self.patterns.truncate(self.retention);
    }

    /// Patterns, newest first
    pub fn patterns(&self) -> &[LearnedPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn retention(&self) -> usize {
        self.retention
    }
}

impl Default for PatternMemory {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn system(description: &str, supplier: &str) -> SystemRecord {
        SystemRecord {
            description: Some(description.to_string()),
            supplier: Some(supplier.to_string()),
            unit: Some("UN".to_string()),
            item_type: Some("Permanente".to_string()),
            ..Default::default()
        }
    }

    fn registry(tag: &str, description: &str) -> RegistryRecord {
        RegistryRecord {
            tag: Some(tag.to_string()),
            description: Some(description.to_string()),
            supplier: Some("Acme".to_string()),
            ..Default::default()
        }
    }

    fn fill(store: &dyn PatternStore, count: usize) {
        for i in 0..count {
            let pattern = LearnedPattern::from_match(
                &system(&format!("Item {}", i), "Acme"),
                &registry(&format!("PAT-{:04}", i), &format!("Item {}", i)),
                0.8,
                "ana",
                base_time() + Duration::minutes(i as i64),
            );
            store.append(&pattern).unwrap();
        }
    }

    /// Store whose every call fails
    struct BrokenStore;

    impl PatternStore for BrokenStore {
        fn recent(&self, _limit: usize) -> Result<Vec<LearnedPattern>> {
            Err(ReconcileError::Config("store unreachable".to_string()))
        }

        fn append(&self, _pattern: &LearnedPattern) -> Result<()> {
            Err(ReconcileError::Config("store unreachable".to_string()))
        }
    }

    #[test]
    fn test_from_match_copies_provenance() {
        let pattern = LearnedPattern::from_match(
            &system("Mesa", "Acme"),
            &registry("PAT-0001", "Mesa de reunião"),
            0.92,
            "ana",
            base_time(),
        );

        assert_eq!(pattern.system_description.as_deref(), Some("Mesa"));
        assert_eq!(pattern.registry_description.as_deref(), Some("Mesa de reunião"));
        assert_eq!(pattern.tag.as_deref(), Some("PAT-0001"));
        assert_eq!(pattern.unit.as_deref(), Some("UN"));
        assert_eq!(pattern.user, "ana");
        assert_eq!(pattern.timestamp, base_time());
        assert_eq!(pattern.id.len(), 36);
    }

    #[test]
    fn test_sqlite_store_round_trip_newest_first() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        fill(&store, 3);

        let recent = store.recent(10).unwrap();

        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].tag.as_deref(), Some("PAT-0002"));
        assert_eq!(recent[2].tag.as_deref(), Some("PAT-0000"));
        assert_eq!(recent[0].timestamp, base_time() + Duration::minutes(2));
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_sqlite_store_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.db");

        {
            let store = SqlitePatternStore::open(&path).unwrap();
            fill(&store, 2);
        }

        let reopened = SqlitePatternStore::open(&path).unwrap();
        assert_eq!(reopened.recent(300).unwrap().len(), 2);
    }

    #[test]
    fn test_load_missing_table_degrades_to_empty() {
        // First-ever run: the table does not exist yet
        let store = SqlitePatternStore::from_connection(Connection::open_in_memory().unwrap());
        assert!(store.recent(10).is_err());

        let memory = PatternMemory::load(&store, DEFAULT_RETENTION);
        assert!(memory.is_empty());
    }

    #[test]
    fn test_load_unreachable_store_degrades_to_empty() {
        let memory = PatternMemory::load(&BrokenStore, DEFAULT_RETENTION);
        assert!(memory.is_empty());
    }

    #[test]
    fn test_record_at_capacity_keeps_bound_and_recency() {
        let store = SqlitePatternStore::open_in_memory().unwrap();
        fill(&store, DEFAULT_RETENTION);

        let mut memory = PatternMemory::load(&store, DEFAULT_RETENTION);
        assert_eq!(memory.len(), 300);

        let now = base_time() + Duration::days(1);
        let recorded = memory.record(
            &store,
            &system("Mesa", "Acme"),
            &registry("PAT-9999", "Mesa de reunião"),
            0.92,
            "bruno",
            now,
        );

        assert_eq!(memory.len(), 300);
        assert_eq!(memory.patterns()[0].id, recorded.id);
        // Oldest entry evicted
        assert!(memory
            .patterns()
            .iter()
            .all(|p| p.tag.as_deref() != Some("PAT-0000")));

        let reloaded = PatternMemory::load(&store, DEFAULT_RETENTION);
        assert_eq!(reloaded.len(), 300);
        assert_eq!(reloaded.patterns()[0].id, recorded.id);
        assert_eq!(reloaded.patterns()[0].user, "bruno");
    }

    #[test]
    fn test_record_failure_still_updates_cache() {
        let mut memory = PatternMemory::default();

        memory.record(
            &BrokenStore,
            &system("Mesa", "Acme"),
            &registry("PAT-0001", "Mesa"),
            1.0,
            "ana",
            base_time(),
        );

        assert_eq!(memory.len(), 1);
        assert_eq!(memory.patterns()[0].tag.as_deref(), Some("PAT-0001"));
    }

    #[test]
    fn test_memory_store_newest_first_and_limit() {
        let store = MemoryPatternStore::new();
        fill(&store, 5);

        let recent = store.recent(2).unwrap();

        assert_eq!(store.len(), 5);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].tag.as_deref(), Some("PAT-0004"));
        assert_eq!(recent[1].tag.as_deref(), Some("PAT-0003"));
    }

    #[test]
    fn test_small_retention_evicts_oldest() {
        let mut memory = PatternMemory::new(2);
        for i in 0..3 {
            memory.remember(LearnedPattern::from_match(
                &system("Mesa", "Acme"),
                &registry(&format!("PAT-{}", i), "Mesa"),
                1.0,
                "ana",
                base_time() + Duration::minutes(i),
            ));
        }

        let tags: Vec<_> = memory.patterns().iter().map(|p| p.tag.clone().unwrap()).collect();
        assert_eq!(tags, vec!["PAT-2", "PAT-1"]);
    }
}
