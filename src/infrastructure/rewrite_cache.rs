//! Rewrite Cache Module
//!
//! A rewrite depends only on the file text, the target name and the trace
//! options, so its result can be reused. Entries live in memory for the life
//! of the process and, when a directory is given, in a sled tree that
//! survives between runs.
//!
//! Persistent entries are bincode-encoded `CachedRewrite` values keyed by the
//! big-endian bytes of `CacheKey::id`; a hit must also match the stored
//! source hash, target and options.

use std::path::Path;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::api::dto::RewriteReportDto;
use crate::domain::options::TraceOptions;
use crate::error::{Error, Result};

/// What a rewrite was computed from. `id` indexes the stores; the other
/// fields are compared on every hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub id: u64,
    /// Hex SHA-256 of the input file text.
    pub source_hash: String,
    pub target: String,
    pub options: String,
}

/// One cached rewrite: the instrumented file and its report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRewrite {
    /// Version of the entry format (for future compatibility)
    pub version: u32,
    pub source_hash: String,
    pub target: String,
    pub options: String,
    pub source: String,
    pub report: RewriteReportDto,
}

impl CachedRewrite {
    pub const CURRENT_VERSION: u32 = 2;

    pub fn new(key: &CacheKey, source: String, report: RewriteReportDto) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            source_hash: key.source_hash.clone(),
            target: key.target.clone(),
            options: key.options.clone(),
            source,
            report,
        }
    }

    fn matches(&self, key: &CacheKey) -> bool {
        self.version == Self::CURRENT_VERSION
            && self.source_hash == key.source_hash
            && self.target == key.target
            && self.options == key.options
    }
}

pub struct RewriteCache {
    memory: DashMap<u64, CachedRewrite>,
    db: Option<sled::Db>,
}

impl RewriteCache {
    pub fn in_memory() -> Self {
        Self {
            memory: DashMap::new(),
            db: None,
        }
    }

    /// Open (or create) a persistent cache in `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let db = sled::open(dir).map_err(|e| Error::Cache(format!("{}: {}", dir.display(), e)))?;
        Ok(Self {
            memory: DashMap::new(),
            db: Some(db),
        })
    }

    /// Stable across processes and toolchains: the id is the first eight
    /// bytes of a SHA-256 over length-prefixed inputs.
    pub fn key(source: &str, target: &str, options: &TraceOptions) -> CacheKey {
        let source_hash = hex(&Sha256::digest(source.as_bytes()));
        let options = options.fingerprint();

        let mut hasher = Sha256::new();
        hasher.update(CachedRewrite::CURRENT_VERSION.to_be_bytes());
        for part in [source_hash.as_str(), target, options.as_str()] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        let digest = hasher.finalize();
        let mut id = [0u8; 8];
        id.copy_from_slice(&digest[..8]);

        CacheKey {
            id: u64::from_be_bytes(id),
            source_hash,
            target: target.to_string(),
            options,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedRewrite> {
        if let Some(hit) = self.memory.get(&key.id) {
            if hit.matches(key) {
                debug!(key = key.id, "rewrite cache hit (memory)");
                return Some(hit.clone());
            }
            warn!(key = key.id, "rewrite cache collision for {}", key.target);
            return None;
        }

        let db = self.db.as_ref()?;
        let bytes = match db.get(key.id.to_be_bytes()) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("rewrite cache read failed: {}", e);
                return None;
            }
        };
        match bincode::deserialize::<CachedRewrite>(&bytes) {
            Ok(entry) if entry.matches(key) => {
                debug!(key = key.id, "rewrite cache hit (disk)");
                self.memory.insert(key.id, entry.clone());
                Some(entry)
            }
            Ok(entry) => {
                debug!(key = key.id, version = entry.version, "stale or foreign rewrite cache entry");
                None
            }
            Err(e) => {
                warn!("undecodable rewrite cache entry {}: {}", key.id, e);
                None
            }
        }
    }

    pub fn put(&self, key: &CacheKey, entry: CachedRewrite) -> Result<()> {
        if let Some(db) = &self.db {
            let bytes = bincode::serialize(&entry).map_err(|e| Error::Cache(e.to_string()))?;
            db.insert(key.id.to_be_bytes(), bytes)
                .map_err(|e| Error::Cache(e.to_string()))?;
            db.flush().map_err(|e| Error::Cache(e.to_string()))?;
        }
        self.memory.insert(key.id, entry);
        Ok(())
    }

    /// Entries held in memory.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Drop every entry, on disk too.
    pub fn invalidate(&self) -> Result<()> {
        self.memory.clear();
        if let Some(db) = &self.db {
            db.clear().map_err(|e| Error::Cache(e.to_string()))?;
            db.flush().map_err(|e| Error::Cache(e.to_string()))?;
        }
        Ok(())
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
