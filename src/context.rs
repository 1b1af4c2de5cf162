use std::sync::Arc;

use tracing::info;

use crate::bound::IndexBoundBuilder;
use crate::codec::CharsetRegistry;
use crate::layout::{LayoutCache, RowBuffer, RowLayout};
use crate::options::RowpackOptions;
use crate::pool::TieredBufferPool;
use crate::schema::TableDef;
use crate::types::Result;

/// Shared state for encoding rows: one buffer pool, one charset registry and
/// one layout cache, all safe to use from many threads.
pub struct CodecContext {
    options: RowpackOptions,
    pool: Arc<TieredBufferPool>,
    charsets: Arc<CharsetRegistry>,
    layouts: LayoutCache,
}

impl CodecContext {
    /// Validates `options` and builds the pool, registry and cache.
    pub fn new(options: RowpackOptions) -> Result<Self> {
        options.validate()?;
        let pool = Arc::new(TieredBufferPool::new(&options.pool));
        let charsets = Arc::new(CharsetRegistry::new(
            Arc::clone(&pool),
            options.codec.default_collation_id(),
        ));
        let layouts = LayoutCache::new(Arc::clone(&charsets));
        info!(
            tiers = options.pool.tiers.len(),
            guard_len = options.pool.guard_len,
            check_guards = options.pool.check_guards,
            default_collation = options.codec.default_collation,
            "context.open"
        );
        Ok(Self {
            options,
            pool,
            charsets,
            layouts,
        })
    }

    /// Options the context was created with.
    pub fn options(&self) -> &RowpackOptions {
        &self.options
    }

    /// Buffer pool.
    pub fn pool(&self) -> &Arc<TieredBufferPool> {
        &self.pool
    }

    /// Charset registry.
    pub fn charsets(&self) -> &Arc<CharsetRegistry> {
        &self.charsets
    }

    /// Layout cache.
    pub fn layouts(&self) -> &LayoutCache {
        &self.layouts
    }

    /// Cached layout of every column of `table`.
    pub fn table_layout(&self, table: &TableDef) -> Result<Arc<RowLayout>> {
        self.layouts.table_layout(table)
    }

    /// Cached layout of the key columns of index `name`.
    pub fn index_layout(&self, table: &TableDef, name: &str) -> Result<Arc<RowLayout>> {
        self.layouts.index_layout(table, name)
    }

    /// Fresh row for `layout`, initialised from its template.
    pub fn new_row(&self, layout: &Arc<RowLayout>) -> RowBuffer {
        RowBuffer::new(Arc::clone(layout), &self.pool)
    }

    /// Bound builder over an index layout.
    pub fn bound_builder(&self, layout: &Arc<RowLayout>) -> IndexBoundBuilder {
        IndexBoundBuilder::new(Arc::clone(layout), Arc::clone(&self.pool))
    }

    /// Toggles guard verification on every pool tier.
    pub fn set_guard_checking(&self, enabled: bool) {
        self.pool.set_guard_checking(enabled);
    }
}
