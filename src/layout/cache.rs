use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::codec::CharsetRegistry;
use crate::schema::TableDef;
use crate::types::{ColumnId, Result, RowpackError};

use super::{build_layout, RowLayout};

/// Which columns of a table a cached layout covers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LayoutScope {
    /// Every column in declaration order.
    AllColumns,
    /// The key columns of a named index, in key order.
    Index(String),
    /// An explicit column subset, in the given order.
    Projection(Vec<ColumnId>),
}

/// Cache key: table identity plus scope.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LayoutKey {
    table: String,
    scope: LayoutScope,
}

impl LayoutKey {
    /// Key for all columns of `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            scope: LayoutScope::AllColumns,
        }
    }

    /// Key for the index `index` of `table`.
    pub fn index(table: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            scope: LayoutScope::Index(index.into()),
        }
    }

    /// Key for a column subset of `table`.
    pub fn projection(table: impl Into<String>, columns: Vec<ColumnId>) -> Self {
        Self {
            table: table.into(),
            scope: LayoutScope::Projection(columns),
        }
    }

    /// Table name.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Covered columns.
    pub fn scope(&self) -> &LayoutScope {
        &self.scope
    }
}

/// Cache counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LayoutCacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that built a layout.
    pub misses: u64,
    /// Layouts built concurrently and dropped because another builder published first.
    pub discarded: u64,
    /// Layouts currently cached.
    pub entries: usize,
}

/// Build-once, publish-many cache of row layouts.
///
/// Builders run without holding any map lock. When two threads build the
/// same key, the first insert wins and the loser's layout, including its
/// pooled template row, is dropped.
pub struct LayoutCache {
    layouts: DashMap<LayoutKey, Arc<RowLayout>>,
    charsets: Arc<CharsetRegistry>,
    hits: AtomicU64,
    misses: AtomicU64,
    discarded: AtomicU64,
}

impl LayoutCache {
    /// Creates an empty cache whose layouts encode text through `charsets`.
    pub fn new(charsets: Arc<CharsetRegistry>) -> Self {
        Self {
            layouts: DashMap::new(),
            charsets,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Returns the layout for `key`, building it with `build` on a miss.
    pub fn get_or_build<F>(&self, key: LayoutKey, build: F) -> Result<Arc<RowLayout>>
    where
        F: FnOnce(&Arc<CharsetRegistry>) -> Result<RowLayout>,
    {
        if let Some(existing) = self.layouts.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(table = key.table_name(), "layout_cache.hit");
            return Ok(Arc::clone(existing.value()));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let built = Arc::new(build(&self.charsets)?);
        match self.layouts.entry(key) {
            Entry::Occupied(entry) => {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                debug!(
                    table = entry.key().table_name(),
                    buffer_size = built.buffer_size(),
                    "layout_cache.discard"
                );
                let published = Arc::clone(entry.get());
                drop(entry);
                drop(built);
                Ok(published)
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&built));
                Ok(built)
            }
        }
    }

    /// Layout of every column of `table`.
    pub fn table_layout(&self, table: &TableDef) -> Result<Arc<RowLayout>> {
        self.get_or_build(LayoutKey::table(table.name()), |charsets| {
            build_layout(table.columns(), charsets)
        })
    }

    /// Layout of the key columns of index `name`, in key order.
    pub fn index_layout(&self, table: &TableDef, name: &str) -> Result<Arc<RowLayout>> {
        let index = table.index(name).ok_or_else(|| RowpackError::UnknownIndex {
            table: table.name().to_string(),
            index: name.to_string(),
        })?;
        self.get_or_build(LayoutKey::index(table.name(), name), |charsets| {
            build_layout(&table.select(index.columns())?, charsets)
        })
    }

    /// Layout of a column subset of `table`.
    pub fn projection_layout(&self, table: &TableDef, columns: &[ColumnId]) -> Result<Arc<RowLayout>> {
        self.get_or_build(
            LayoutKey::projection(table.name(), columns.to_vec()),
            |charsets| build_layout(&table.select(columns)?, charsets),
        )
    }

    /// Drops every cached layout of `table`, returning how many were removed.
    ///
    /// Layouts still referenced elsewhere stay alive until their last user drops them.
    pub fn evict_table(&self, table: &str) -> usize {
        let before = self.layouts.len();
        self.layouts.retain(|key, _| key.table != table);
        let removed = before.saturating_sub(self.layouts.len());
        debug!(table, removed, "layout_cache.evict");
        removed
    }

    /// Number of cached layouts.
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> LayoutCacheStats {
        LayoutCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            entries: self.layouts.len(),
        }
    }
}
