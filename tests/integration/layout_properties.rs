#![allow(missing_docs)]

use std::sync::{Arc, Once};

use proptest::prelude::*;
use rowpack::codec::zero_value;
use rowpack::layout::build_layout;
use rowpack::schema::Alignment;
use rowpack::{
    CharsetRegistry, CollationId, ColumnDescriptor, ColumnId, ColumnType, PoolOptions, RowBuffer,
    TieredBufferPool, Value,
};
use tracing_subscriber::EnvFilter;

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

fn charsets() -> Arc<CharsetRegistry> {
    Arc::new(CharsetRegistry::new(
        Arc::new(TieredBufferPool::new(&PoolOptions::default())),
        CollationId(255),
    ))
}

fn descriptor(id: u32, ty: ColumnType, nullable: bool, size: usize) -> ColumnDescriptor {
    let builder = ColumnDescriptor::builder(id, format!("c{id}"), ty).nullable(nullable);
    let builder = match ty {
        t if t.is_decimal() => {
            let precision = size.clamp(1, 40) as u8;
            builder.decimal(precision, (size % 7) as u8 % precision)
        }
        ColumnType::Bit => builder.length(size.clamp(1, 64)),
        t if t.is_temporal_v2() => builder.fsp((size % 7) as u8),
        _ => builder.length(size),
    };
    builder.build().expect("valid descriptor")
}

fn columns_strategy() -> impl Strategy<Value = Vec<ColumnDescriptor>> {
    prop::collection::vec((1u8..=33, any::<bool>(), 1usize..80), 0..24).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(id, (code, nullable, size))| {
                let ty = ColumnType::from_code(code, "generated").expect("known code");
                descriptor(id as u32, ty, nullable, size)
            })
            .collect()
    })
}

fn bucket_rank(ty: ColumnType) -> usize {
    use ColumnType::*;
    match ty {
        Bigint | Bigunsigned | Double | Blob | Text | Bit | Date | Datetime | Time | Timestamp
        | Time2 | Datetime2 | Timestamp2 => 0,
        Int | Unsigned | Float | Mediumint | Mediumunsigned => 1,
        Smallint | Smallunsigned | Year => 2,
        Tinyint | Tinyunsigned | Char | Binary | Varchar | Varbinary | Longvarchar
        | Longvarbinary | Decimal | Decimalunsigned | Olddecimal | Olddecimalunsigned => 3,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn columns_cover_the_row_without_overlap(columns in columns_strategy()) {
        init_tracing();
        let layout = build_layout(&columns, &charsets()).unwrap();
        let data_start = layout.null_bytes().div_ceil(8) * 8;

        let mut spans: Vec<(usize, usize)> = layout
            .slots()
            .iter()
            .map(|s| (s.offset(), s.offset() + s.footprint()))
            .collect();
        spans.sort_unstable();
        for pair in spans.windows(2) {
            prop_assert!(pair[0].1 <= pair[1].0, "overlap {:?}", pair);
        }
        if let Some(first) = spans.first() {
            prop_assert!(first.0 >= data_start);
        }
        // Columns are packed back to back, so the last one ends the row.
        let used: usize = spans.iter().map(|(s, e)| e - s).sum();
        prop_assert_eq!(layout.buffer_size(), data_start + used);
        let end = spans.iter().map(|(_, e)| *e).max().unwrap_or(data_start);
        prop_assert_eq!(end, layout.buffer_size());
    }

    #[test]
    fn null_bitmap_matches_nullable_count(columns in columns_strategy()) {
        let layout = build_layout(&columns, &charsets()).unwrap();
        let nullable = columns.iter().filter(|c| c.nullable()).count();
        prop_assert_eq!(layout.null_bytes(), nullable.div_ceil(8));

        let bits: Vec<usize> = layout
            .slots()
            .iter()
            .filter_map(|s| s.null_bit().map(|b| b.position()))
            .collect();
        prop_assert_eq!(bits, (0..nullable).collect::<Vec<_>>());
        for slot in layout.slots() {
            if let Some(bit) = slot.null_bit() {
                prop_assert_eq!(bit.byte, bit.position() / 8);
                prop_assert!(bit.byte < layout.null_bytes());
            }
        }
    }

    #[test]
    fn buckets_keep_declaration_order(columns in columns_strategy()) {
        let layout = build_layout(&columns, &charsets()).unwrap();
        for column in &columns {
            let ty = column.column_type();
            prop_assert_eq!(Alignment::ORDER[bucket_rank(ty)], ty.alignment());
        }
        let mut placed: Vec<_> = layout
            .slots()
            .iter()
            .map(|s| (s.offset(), bucket_rank(s.column().column_type()), s.ordinal()))
            .collect();
        placed.sort_unstable();
        for pair in placed.windows(2) {
            let ((_, rank_a, ord_a), (_, rank_b, ord_b)) = (pair[0], pair[1]);
            prop_assert!(rank_a < rank_b || (rank_a == rank_b && ord_a < ord_b));
        }
    }

    #[test]
    fn template_rows_are_null_or_zero(columns in columns_strategy()) {
        let charsets = charsets();
        let layout = Arc::new(build_layout(&columns, &charsets).unwrap());
        let row = RowBuffer::new(Arc::clone(&layout), charsets.pool());
        prop_assert_eq!(row.mask().len(), columns.len().div_ceil(8));
        for column in &columns {
            let id = column.id();
            if column.nullable() {
                prop_assert!(row.is_null(id).unwrap());
                continue;
            }
            let Some(zero) = zero_value(column) else { continue };
            let stored = row.get(id).unwrap();
            match (&zero, &stored) {
                (Value::Decimal(_), Value::Decimal(text)) => {
                    prop_assert!(text.trim_start_matches('-').chars().all(|c| c == '0' || c == '.'));
                }
                (Value::Bytes(_), Value::Bytes(bytes)) => prop_assert!(bytes.iter().all(|b| *b == 0)),
                _ => prop_assert_eq!(&stored, &zero),
            }
        }
        row.release().unwrap();
    }
}

#[test]
fn empty_layout_has_zero_size() {
    init_tracing();
    let layout = build_layout(&[], &charsets()).unwrap();
    assert_eq!(layout.buffer_size(), 0);
    assert_eq!(layout.null_bytes(), 0);
    assert_eq!(layout.column_count(), 0);
}

#[test]
fn nine_nullable_columns_need_two_bitmap_bytes() {
    init_tracing();
    let columns: Vec<_> = (0..9)
        .map(|id| descriptor(id, ColumnType::Tinyint, true, 1))
        .collect();
    let layout = build_layout(&columns, &charsets()).unwrap();
    assert_eq!(layout.null_bytes(), 2);
    assert_eq!(layout.slots()[0].offset(), 8);
    let last = layout.slots()[8].null_bit().unwrap();
    assert_eq!((last.byte, last.bit), (1, 0));
    assert_eq!(layout.buffer_size(), 17);
}

#[test]
fn unknown_column_id_is_fatal() {
    init_tracing();
    let layout = build_layout(&[descriptor(3, ColumnType::Int, false, 1)], &charsets()).unwrap();
    let err = layout.get(layout.template(), ColumnId(4)).unwrap_err();
    assert!(err.is_fatal());
}
