//! In-memory corpus store
//!
//! Layout of a corpus directory:
//! - `categories.json`: array of `{ "id", "display_name" }`, declaration order
//! - `**/*.jsonl`: one item per line
//!
//! A reload builds a complete new snapshot and swaps it in atomically, so
//! readers never observe a half-imported corpus.

use super::{BackingStore, ItemPredicate, ScanScope};
use crate::config::MAX_CATEGORIES;
use crate::error::{CoreError, DegradedState, LoadError, LoadReport};
use parking_lot::RwLock;
use practix_types::{CategoryDef, CategoryId, Item};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

/// File declaring the category set
pub const CATEGORIES_FILE: &str = "categories.json";

/// Immutable view of the whole corpus
#[derive(Debug, Default)]
pub struct CorpusSnapshot {
    defs: Vec<CategoryDef>,
    by_category: HashMap<CategoryId, Vec<Arc<Item>>>,
    total: usize,
}

impl CorpusSnapshot {
    /// Build a snapshot from category definitions and items
    ///
    /// Items referencing an undeclared category are dropped.
    pub fn from_parts(defs: Vec<CategoryDef>, items: Vec<Item>) -> Result<Self, CoreError> {
        if defs.len() > MAX_CATEGORIES {
            return Err(CoreError::TooManyCategories {
                count: defs.len(),
                max: MAX_CATEGORIES,
            });
        }

        let mut by_category: HashMap<CategoryId, Vec<Arc<Item>>> = defs
            .iter()
            .map(|def| (def.id.clone(), Vec::new()))
            .collect();

        let mut total = 0;
        for item in items {
            if let Some(bucket) = by_category.get_mut(&item.category_id) {
                bucket.push(Arc::new(item));
                total += 1;
            }
        }

        Ok(Self {
            defs,
            by_category,
            total,
        })
    }
}

/// Backing store holding the corpus in memory, indexed by category
pub struct CorpusStore {
    snapshot: RwLock<Arc<CorpusSnapshot>>,
    degraded_state: RwLock<DegradedState>,
    root: Option<PathBuf>,
}

impl CorpusStore {
    /// Create a store from an existing snapshot (tests, benches, generators)
    pub fn from_snapshot(snapshot: CorpusSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            degraded_state: RwLock::new(DegradedState::Healthy),
            root: None,
        }
    }

    pub fn from_parts(defs: Vec<CategoryDef>, items: Vec<Item>) -> Result<Self, CoreError> {
        Ok(Self::from_snapshot(CorpusSnapshot::from_parts(defs, items)?))
    }

    /// Load a corpus directory
    ///
    /// Fatal problems (missing directory or category file) leave the store
    /// empty and read-only; everything else is reported and skipped.
    pub async fn open(root: impl Into<PathBuf>) -> (Self, LoadReport) {
        let root = root.into();
        let store = Self {
            snapshot: RwLock::new(Arc::new(CorpusSnapshot::default())),
            degraded_state: RwLock::new(DegradedState::Healthy),
            root: Some(root),
        };
        let report = store.reload().await;
        (store, report)
    }

    /// Corpus directory this store was opened from
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Re-import the corpus directory and swap the snapshot in
    ///
    /// On fatal errors the previous snapshot stays in place.
    pub async fn reload(&self) -> LoadReport {
        let mut report = LoadReport::new();
        let Some(root) = self.root.as_deref() else {
            report.add_warning("corpus", "Store was not opened from a directory");
            return report;
        };

        match CorpusLoader::new().load(root, &mut report).await {
            Ok(snapshot) => {
                let total = snapshot.total;
                *self.snapshot.write() = Arc::new(snapshot);
                info!(root = %root.display(), items = total, "Corpus loaded");
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Corpus load failed, keeping previous snapshot");
                report.add_fatal("corpus", e.to_string());
            }
        }

        *self.degraded_state.write() = DegradedState::from_report(&report);
        report
    }

    /// Get current degraded state
    pub fn degraded_state(&self) -> DegradedState {
        self.degraded_state.read().clone()
    }

    fn current(&self) -> Arc<CorpusSnapshot> {
        Arc::clone(&self.snapshot.read())
    }
}

impl BackingStore for CorpusStore {
    fn category_defs(&self) -> Vec<CategoryDef> {
        self.current().defs.clone()
    }

    fn scan(
        &self,
        scope: &ScanScope,
        predicate: &ItemPredicate,
    ) -> Result<Vec<Arc<Item>>, CoreError> {
        let snapshot = self.current();
        match scope {
            ScanScope::Category(id) => {
                let items = snapshot
                    .by_category
                    .get(id)
                    .ok_or_else(|| CoreError::category_not_found(id.as_str()))?;
                Ok(items
                    .iter()
                    .filter(|item| predicate.matches(item))
                    .cloned()
                    .collect())
            }
            ScanScope::All => Ok(snapshot
                .defs
                .iter()
                .filter_map(|def| snapshot.by_category.get(&def.id))
                .flatten()
                .filter(|item| predicate.matches(item))
                .cloned()
                .collect()),
        }
    }

    fn item_count(&self) -> usize {
        self.current().total
    }
}

/// Reads a corpus directory into a [`CorpusSnapshot`]
#[derive(Default)]
pub struct CorpusLoader;

impl CorpusLoader {
    pub fn new() -> Self {
        Self
    }

    /// Discover all item files under the corpus directory
    pub fn discover_item_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.extension().map(|e| e == "jsonl").unwrap_or(false))
            .collect();

        // Deterministic import order regardless of directory iteration order
        files.sort();
        debug!(count = files.len(), "Discovered item files");
        files
    }

    pub async fn load(&self, root: &Path, report: &mut LoadReport) -> Result<CorpusSnapshot, CoreError> {
        if !root.is_dir() {
            return Err(CoreError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        let defs = self.load_categories(&root.join(CATEGORIES_FILE)).await?;
        report.categories_loaded = defs.len();
        let known: HashSet<&CategoryId> = defs.iter().map(|d| &d.id).collect();

        let mut items = Vec::new();
        let mut seen_ids = HashSet::new();

        for path in self.discover_item_files(root) {
            report.files_scanned += 1;
            if let Err(e) = self
                .load_items(&path, &known, &mut seen_ids, &mut items, report)
                .await
            {
                report.add_error(LoadError::error("items", e.to_string()));
            }
        }

        report.items_loaded = items.len();
        CorpusSnapshot::from_parts(defs, items)
    }

    async fn load_categories(&self, path: &Path) -> Result<Vec<CategoryDef>, CoreError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::file_read(path, e))?;

        let defs: Vec<CategoryDef> =
            serde_json::from_str(&content).map_err(|e| CoreError::JsonParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if defs.len() > MAX_CATEGORIES {
            return Err(CoreError::TooManyCategories {
                count: defs.len(),
                max: MAX_CATEGORIES,
            });
        }
        Ok(defs)
    }

    async fn load_items(
        &self,
        path: &Path,
        known: &HashSet<&CategoryId>,
        seen_ids: &mut HashSet<practix_types::ItemId>,
        items: &mut Vec<Item>,
        report: &mut LoadReport,
    ) -> Result<(), CoreError> {
        let file = File::open(path)
            .await
            .map_err(|e| CoreError::file_read(path, e))?;
        let mut lines = BufReader::new(file).lines();
        let mut line_number = 0usize;

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| CoreError::file_read(path, e))?
        {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            let item: Item = match serde_json::from_str(&line) {
                Ok(item) => item,
                Err(e) => {
                    trace!(path = %path.display(), line = line_number, error = %e, "Skipping malformed item");
                    report.items_skipped += 1;
                    report.add_warning(
                        "items",
                        format!("{}:{}: {}", path.display(), line_number, e),
                    );
                    continue;
                }
            };

            if !known.contains(&item.category_id) {
                report.items_skipped += 1;
                report.add_warning(
                    "items",
                    format!(
                        "{}:{}: unknown category '{}'",
                        path.display(),
                        line_number,
                        item.category_id
                    ),
                );
                continue;
            }

            if !seen_ids.insert(item.id.clone()) {
                report.items_skipped += 1;
                report.add_warning(
                    "items",
                    format!("{}:{}: duplicate item id '{}'", path.display(), line_number, item.id),
                );
                continue;
            }

            items.push(item);
        }

        Ok(())
    }
}
