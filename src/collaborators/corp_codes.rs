//! Corporate name/code repository
//!
//! Read-only table of `{corp_name, corp_code, stock_code}` entries loaded from
//! a JSON file on first use. `reload()` re-reads the file and swaps the whole
//! snapshot; readers holding the old `Arc` keep a consistent view.

use crate::error::OrchestrationError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpEntry {
    pub corp_name: String,
    pub corp_code: String,
    /// Blank for unlisted companies
    #[serde(default)]
    pub stock_code: Option<String>,
}

impl CorpEntry {
    pub fn is_listed(&self) -> bool {
        self.stock_code
            .as_deref()
            .map(|code| !code.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Default)]
pub struct CorpTable {
    entries: Vec<CorpEntry>,
}

impl CorpTable {
    pub fn new(entries: Vec<CorpEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact name first, then the first entry whose name contains `target`.
    pub fn find(&self, target: &str) -> Option<&CorpEntry> {
        let target = target.trim();
        if target.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|e| e.corp_name == target)
            .or_else(|| self.entries.iter().find(|e| e.corp_name.contains(target)))
    }

    /// Every entry whose name contains `target`, in table order.
    pub fn search(&self, target: &str) -> Vec<&CorpEntry> {
        let target = target.trim();
        if target.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|e| e.corp_name.contains(target))
            .collect()
    }
}

pub struct CorpCodeRepository {
    source: Option<PathBuf>,
    snapshot: RwLock<Option<Arc<CorpTable>>>,
}

impl CorpCodeRepository {
    /// Lazily loaded from `path` on first lookup.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(path.into()),
            snapshot: RwLock::new(None),
        }
    }

    /// Preloaded table with no backing file; `reload()` is an error.
    pub fn from_entries(entries: Vec<CorpEntry>) -> Self {
        Self {
            source: None,
            snapshot: RwLock::new(Some(Arc::new(CorpTable::new(entries)))),
        }
    }

    async fn load(&self) -> Result<CorpTable> {
        let path = self.source.as_ref().ok_or_else(|| {
            OrchestrationError::CorpCodeError("no corporate code file configured".to_string())
        })?;

        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            OrchestrationError::CorpCodeError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let entries: Vec<CorpEntry> = serde_json::from_str(&raw).map_err(|e| {
            OrchestrationError::CorpCodeError(format!("malformed {}: {}", path.display(), e))
        })?;

        info!(path = %path.display(), entries = entries.len(), "Corporate code table loaded");
        Ok(CorpTable::new(entries))
    }

    /// Current snapshot, loading it on first use.
    pub async fn table(&self) -> Result<Arc<CorpTable>> {
        if let Some(table) = self.snapshot.read().await.as_ref() {
            return Ok(table.clone());
        }

        let mut guard = self.snapshot.write().await;
        // Another caller may have loaded it while we waited for the write lock
        if let Some(table) = guard.as_ref() {
            return Ok(table.clone());
        }

        let table = Arc::new(self.load().await?);
        *guard = Some(table.clone());
        Ok(table)
    }

    /// Re-read the backing file and swap the snapshot. Returns the new entry count.
    pub async fn reload(&self) -> Result<usize> {
        let table = Arc::new(self.load().await?);
        let count = table.len();
        *self.snapshot.write().await = Some(table);
        Ok(count)
    }

    pub async fn resolve(&self, target: &str) -> Result<Option<CorpEntry>> {
        Ok(self.table().await?.find(target).cloned())
    }

    pub async fn search(&self, target: &str) -> Result<Vec<CorpEntry>> {
        Ok(self
            .table()
            .await?
            .search(target)
            .into_iter()
            .cloned()
            .collect())
    }
}
