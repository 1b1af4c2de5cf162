#![allow(missing_docs)]

use std::sync::{Arc, Barrier, Once};
use std::thread;

use rowpack::layout::{build_layout, LayoutKey};
use rowpack::{
    CharsetRegistry, CodecContext, CollationId, ColumnDescriptor, ColumnId, ColumnType, IndexDef,
    LayoutCache, PoolOptions, RowpackOptions, TableDef, TieredBufferPool,
};
use tracing_subscriber::EnvFilter;

const THREADS: usize = 8;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rowpack=warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn accounts() -> TableDef {
    TableDef::new(
        "accounts",
        vec![
            ColumnDescriptor::builder(0, "id", ColumnType::Bigunsigned).build().unwrap(),
            ColumnDescriptor::builder(1, "balance", ColumnType::Decimal)
                .decimal(18, 2)
                .build()
                .unwrap(),
            ColumnDescriptor::builder(2, "opened", ColumnType::Date)
                .nullable(true)
                .build()
                .unwrap(),
            ColumnDescriptor::builder(3, "owner", ColumnType::Varchar)
                .length(40)
                .build()
                .unwrap(),
        ],
    )
    .unwrap()
    .with_index(IndexDef::new("by_owner", [3u32, 0]))
    .unwrap()
}

#[test]
fn concurrent_builders_publish_exactly_one_layout() {
    init_tracing();
    let pool = Arc::new(TieredBufferPool::new(&PoolOptions::default()));
    let cache = Arc::new(LayoutCache::new(Arc::new(CharsetRegistry::new(
        Arc::clone(&pool),
        CollationId(255),
    ))));
    let table = Arc::new(accounts());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let table = Arc::clone(&table);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                cache
                    .get_or_build(LayoutKey::table("accounts"), |charsets| {
                        // Every thread has missed before anyone publishes.
                        barrier.wait();
                        build_layout(table.columns(), charsets)
                    })
                    .unwrap()
            })
        })
        .collect();
    let layouts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for layout in &layouts[1..] {
        assert!(Arc::ptr_eq(layout, &layouts[0]));
    }
    let stats = cache.stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.misses, THREADS as u64);
    assert_eq!(stats.discarded, THREADS as u64 - 1);

    // Only the published template row is still on loan.
    let pool_stats = pool.stats();
    assert_eq!(pool_stats.borrows - pool_stats.releases, 1);
}

#[test]
fn mixed_lookups_converge_on_shared_layouts() {
    init_tracing();
    let ctx = Arc::new(CodecContext::new(RowpackOptions::default()).unwrap());
    let table = Arc::new(accounts());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let ctx = Arc::clone(&ctx);
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for round in 0..200 {
                    let layout = match (t + round) % 3 {
                        0 => ctx.table_layout(&table).unwrap(),
                        1 => ctx.index_layout(&table, "by_owner").unwrap(),
                        _ => ctx
                            .layouts()
                            .projection_layout(&table, &[ColumnId(2), ColumnId(1)])
                            .unwrap(),
                    };
                    let mut row = ctx.new_row(&layout);
                    if layout.column_count() == 4 {
                        row.set_u64(ColumnId(0), round as u64).unwrap();
                        row.set_str(ColumnId(3), format!("owner-{t}")).unwrap();
                        assert_eq!(row.get_u64(ColumnId(0)).unwrap(), Some(round as u64));
                    }
                    row.release().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = ctx.layouts().stats();
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.hits + stats.misses, THREADS as u64 * 200);
    assert_eq!(stats.misses - stats.discarded, 3);
}

#[test]
fn eviction_keeps_outstanding_layouts_usable() {
    init_tracing();
    let ctx = CodecContext::new(RowpackOptions::default()).unwrap();
    let table = accounts();
    let old = ctx.table_layout(&table).unwrap();
    assert_eq!(ctx.layouts().evict_table("accounts"), 1);

    let mut row = ctx.new_row(&old);
    row.set_u64(ColumnId(0), 9).unwrap();
    assert_eq!(row.get_u64(ColumnId(0)).unwrap(), Some(9));
    row.release().unwrap();

    let fresh = ctx.table_layout(&table).unwrap();
    assert!(!Arc::ptr_eq(&old, &fresh));
    assert_eq!(old.buffer_size(), fresh.buffer_size());
}
