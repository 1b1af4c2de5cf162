#![allow(missing_docs)]

use std::sync::{Arc, Once};

use proptest::prelude::*;
use rowpack::codec::{integer_bounds, pack, unpack};
use rowpack::{
    CharsetRegistry, CollationId, ColumnDescriptor, ColumnType, ErrorKind, PoolOptions,
    RowpackError, TieredBufferPool, Value,
};
use time::macros::{datetime, time};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};
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

fn registry() -> CharsetRegistry {
    CharsetRegistry::new(
        Arc::new(TieredBufferPool::new(&PoolOptions::default())),
        CollationId(255),
    )
}

fn roundtrip(column: &ColumnDescriptor, value: &Value, charsets: &CharsetRegistry) -> Value {
    let mut buf = vec![0u8; column.footprint() + 3];
    pack(&mut buf, 3, column, value, charsets).unwrap();
    unpack(&buf, 3, column, charsets).unwrap()
}

fn date_strategy() -> impl Strategy<Value = Date> {
    (1000i32..=9999, 1u8..=12, 1u8..=28).prop_map(|(y, m, d)| {
        Date::from_calendar_date(y, Month::try_from(m).unwrap(), d).unwrap()
    })
}

fn time_strategy(fsp: u8) -> impl Strategy<Value = Time> {
    let step = 10u32.pow(6 - fsp as u32);
    (0u8..24, 0u8..60, 0u8..60, 0u32..1_000_000).prop_map(move |(h, m, s, us)| {
        Time::from_hms_micro(h, m, s, us - us % step).unwrap()
    })
}

const INTEGER_TYPES: [ColumnType; 10] = [
    ColumnType::Tinyint,
    ColumnType::Tinyunsigned,
    ColumnType::Smallint,
    ColumnType::Smallunsigned,
    ColumnType::Mediumint,
    ColumnType::Mediumunsigned,
    ColumnType::Int,
    ColumnType::Unsigned,
    ColumnType::Bigint,
    ColumnType::Bigunsigned,
];

fn integer_case() -> impl Strategy<Value = (ColumnType, i128)> {
    (0..INTEGER_TYPES.len()).prop_flat_map(|i| {
        let ty = INTEGER_TYPES[i];
        let (min, max) = integer_bounds(ty);
        (Just(ty), min..=max)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn integers_roundtrip_within_bounds((ty, value) in integer_case()) {
        init_tracing();
        let reg = registry();
        let col = ColumnDescriptor::builder(0, "n", ty).build().unwrap();
        let input = if value < 0 { Value::Int(value as i64) } else { Value::UInt(value as u64) };
        let back = roundtrip(&col, &input, &reg);
        let decoded = match back {
            Value::Int(v) => v as i128,
            Value::UInt(v) => v as i128,
            other => panic!("integer column decoded as {other:?}"),
        };
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn doubles_roundtrip_bit_exact(value in any::<f64>().prop_filter("nan", |v| !v.is_nan())) {
        let reg = registry();
        let col = ColumnDescriptor::builder(0, "d", ColumnType::Double).build().unwrap();
        prop_assert_eq!(roundtrip(&col, &Value::Double(value), &reg), Value::Double(value));
    }

    #[test]
    fn floats_roundtrip(value in any::<f32>().prop_filter("nan", |v| !v.is_nan())) {
        let reg = registry();
        let col = ColumnDescriptor::builder(0, "f", ColumnType::Float).build().unwrap();
        prop_assert_eq!(roundtrip(&col, &Value::Float(value), &reg), Value::Float(value));
    }

    #[test]
    fn decimals_roundtrip_exactly(negative in any::<bool>(), int in 0u64..100_000_000, frac in 0u32..10_000) {
        let reg = registry();
        let col = ColumnDescriptor::builder(0, "amt", ColumnType::Decimal)
            .decimal(12, 4)
            .build()
            .unwrap();
        let sign = if negative && (int, frac) != (0, 0) { "-" } else { "" };
        let text = format!("{sign}{int}.{frac:04}");
        prop_assert_eq!(roundtrip(&col, &Value::Decimal(text.clone()), &reg), Value::Decimal(text));
    }

    #[test]
    fn decimal_encodings_sort_like_numbers(a in -99_999_999i64..99_999_999, b in -99_999_999i64..99_999_999) {
        let col = ColumnDescriptor::builder(0, "k", ColumnType::Decimal)
            .decimal(10, 2)
            .build()
            .unwrap();
        let encode = |v: i64| {
            let mut buf = vec![0u8; col.footprint()];
            let text = format!("{}{}.{:02}", if v < 0 { "-" } else { "" }, v.abs() / 100, v.abs() % 100);
            rowpack::codec::decimal::pack(&col, &text, &mut buf).unwrap();
            buf
        };
        prop_assert_eq!(encode(a).cmp(&encode(b)), a.cmp(&b));
    }

    #[test]
    fn varchar_roundtrips_unicode(text in "[a-zA-Z0-9 äöüßéλ日本€]{0,20}") {
        let reg = registry();
        let col = ColumnDescriptor::builder(0, "s", ColumnType::Varchar)
            .length(80)
            .build()
            .unwrap();
        prop_assert_eq!(roundtrip(&col, &Value::Str(text.clone()), &reg), Value::Str(text));
    }

    #[test]
    fn latin1_char_roundtrips_without_trailing_space(text in "[a-zA-Z0-9äöüé ]{0,15}[a-z]") {
        let reg = registry();
        let col = ColumnDescriptor::builder(0, "c", ColumnType::Char)
            .length(24)
            .collation(8)
            .build()
            .unwrap();
        prop_assert_eq!(roundtrip(&col, &Value::Str(text.clone()), &reg), Value::Str(text));
    }

    #[test]
    fn varbinary_roundtrips(bytes in prop::collection::vec(any::<u8>(), 0..300)) {
        let reg = registry();
        let col = ColumnDescriptor::builder(0, "b", ColumnType::Longvarbinary)
            .length(300)
            .build()
            .unwrap();
        prop_assert_eq!(roundtrip(&col, &Value::Bytes(bytes.clone()), &reg), Value::Bytes(bytes));
    }

    #[test]
    fn v1_temporals_roundtrip(date in date_strategy(), t in time_strategy(0)) {
        let reg = registry();
        let date_col = ColumnDescriptor::builder(0, "d", ColumnType::Date).build().unwrap();
        let time_col = ColumnDescriptor::builder(1, "t", ColumnType::Time).build().unwrap();
        let dt_col = ColumnDescriptor::builder(2, "dt", ColumnType::Datetime).build().unwrap();
        prop_assert_eq!(roundtrip(&date_col, &Value::Date(date), &reg), Value::Date(date));
        prop_assert_eq!(roundtrip(&time_col, &Value::Time(t), &reg), Value::Time(t));
        let dt = PrimitiveDateTime::new(date, t);
        prop_assert_eq!(roundtrip(&dt_col, &Value::DateTime(dt), &reg), Value::DateTime(dt));
    }

    #[test]
    fn v2_temporals_roundtrip((fsp, date, t) in (0u8..=6).prop_flat_map(|fsp| (Just(fsp), date_strategy(), time_strategy(fsp)))) {
        let reg = registry();
        let dt_col = ColumnDescriptor::builder(0, "dt", ColumnType::Datetime2).fsp(fsp).build().unwrap();
        let time_col = ColumnDescriptor::builder(1, "t", ColumnType::Time2).fsp(fsp).build().unwrap();
        let ts_col = ColumnDescriptor::builder(2, "ts", ColumnType::Timestamp2).fsp(fsp).build().unwrap();
        let dt = PrimitiveDateTime::new(date, t);
        prop_assert_eq!(roundtrip(&dt_col, &Value::DateTime(dt), &reg), Value::DateTime(dt));
        prop_assert_eq!(roundtrip(&time_col, &Value::Time(t), &reg), Value::Time(t));
        let ts = dt.assume_utc();
        if (0..=u32::MAX as i64).contains(&ts.unix_timestamp()) {
            prop_assert_eq!(roundtrip(&ts_col, &Value::Timestamp(ts), &reg), Value::Timestamp(ts));
        }
    }
}

#[test]
fn decimal_reference_encoding() {
    init_tracing();
    let col = ColumnDescriptor::builder(0, "amt", ColumnType::Decimal)
        .decimal(9, 4)
        .build()
        .unwrap();
    assert_eq!(col.footprint(), 5);
    let reg = registry();
    let mut buf = [0u8; 5];
    let value = Value::Decimal("12345.6789".into());
    pack(&mut buf, 0, &col, &value, &reg).unwrap();
    assert_eq!(buf, [0x80, 0x30, 0x39, 0x1A, 0x85]);
    assert_eq!(unpack(&buf, 0, &col, &reg).unwrap(), value);
}

#[test]
fn datetime2_bytes_are_big_endian() {
    let col = ColumnDescriptor::builder(0, "dt", ColumnType::Datetime2)
        .fsp(3)
        .build()
        .unwrap();
    assert_eq!(col.footprint(), 7);
    let mut buf = [0u8; 7];
    let value = datetime!(2015-03-14 09:26:53.589);
    pack(&mut buf, 0, &col, &Value::DateTime(value), &registry()).unwrap();

    let ymd = ((2015u64 * 13 + 3) << 5) | 14;
    let int_part = ((ymd << 17) | (9 << 12) | (26 << 6) | 53) + (1u64 << 39);
    assert_eq!(&buf[..5], &int_part.to_be_bytes()[3..]);
    assert_eq!(&buf[5..], &5890u16.to_be_bytes());
}

#[test]
fn timestamp2_stores_big_endian_seconds() {
    let col = ColumnDescriptor::builder(0, "ts", ColumnType::Timestamp2)
        .build()
        .unwrap();
    let mut buf = [0u8; 4];
    let value = OffsetDateTime::from_unix_timestamp(0x0102_0304).unwrap();
    pack(&mut buf, 0, &col, &Value::Timestamp(value), &registry()).unwrap();
    assert_eq!(buf, [1, 2, 3, 4]);
}

#[test]
fn v1_date_uses_native_order() {
    let col = ColumnDescriptor::builder(0, "d", ColumnType::Date).build().unwrap();
    let mut buf = [0u8; 3];
    let date = Date::from_calendar_date(2020, Month::February, 29).unwrap();
    pack(&mut buf, 0, &col, &Value::Date(date), &registry()).unwrap();
    let raw = 2020u32 * 512 + 2 * 32 + 29;
    let ne = raw.to_ne_bytes();
    let expected = if cfg!(target_endian = "little") { &ne[..3] } else { &ne[1..] };
    assert_eq!(&buf[..], expected);
}

#[test]
fn range_and_length_failures_are_user_errors() {
    let reg = registry();
    let tiny = ColumnDescriptor::builder(0, "t", ColumnType::Tinyunsigned).build().unwrap();
    let err = pack(&mut [0u8; 1], 0, &tiny, &Value::Int(256), &reg).unwrap_err();
    match &err {
        RowpackError::ValueOutOfRange { column, value, min, max } => {
            assert_eq!((column.as_str(), value.as_str()), ("t", "256"));
            assert_eq!((min.as_str(), max.as_str()), ("0", "255"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::UserInput);

    let short = ColumnDescriptor::builder(1, "s", ColumnType::Varchar)
        .length(4)
        .build()
        .unwrap();
    let mut buf = vec![0u8; short.footprint()];
    let err = pack(&mut buf, 0, &short, &Value::from("toolong"), &reg).unwrap_err();
    assert!(matches!(err, RowpackError::ValueTooLong { length: 7, max: 4, .. }));

    let unsigned = ColumnDescriptor::builder(2, "u", ColumnType::Decimalunsigned)
        .decimal(5, 2)
        .build()
        .unwrap();
    let mut buf = vec![0u8; unsigned.footprint()];
    assert!(matches!(
        pack(&mut buf, 0, &unsigned, &Value::Decimal("-1.00".into()), &reg),
        Err(RowpackError::ValueOutOfRange { .. })
    ));
}

#[test]
fn extra_fraction_digits_are_rejected_not_rounded() {
    let reg = registry();
    let col = ColumnDescriptor::builder(0, "t", ColumnType::Time2).fsp(2).build().unwrap();
    let mut buf = vec![0u8; col.footprint()];
    let err = pack(&mut buf, 0, &col, &Value::Time(time!(10:00:00.123)), &reg).unwrap_err();
    assert!(matches!(err, RowpackError::PrecisionLoss { precision: 2, .. }));
    assert_eq!(err.kind(), ErrorKind::Truncation);

    let v1 = ColumnDescriptor::builder(1, "dt", ColumnType::Datetime).build().unwrap();
    let err = pack(
        &mut [0u8; 8],
        0,
        &v1,
        &Value::DateTime(datetime!(2001-01-01 00:00:00.5)),
        &reg,
    )
    .unwrap_err();
    assert!(matches!(err, RowpackError::PrecisionLoss { precision: 0, .. }));
}

#[test]
fn ucs2_char_pads_with_two_byte_spaces() {
    let reg = registry();
    let col = ColumnDescriptor::builder(0, "c", ColumnType::Char)
        .length(8)
        .collation(35)
        .build()
        .unwrap();
    let mut buf = [0xFFu8; 8];
    pack(&mut buf, 0, &col, &Value::from("hi"), &reg).unwrap();
    assert_eq!(buf, [0, b'h', 0, b'i', 0, b' ', 0, b' ']);
    assert_eq!(unpack(&buf, 0, &col, &reg).unwrap(), Value::from("hi"));
}

#[test]
fn binary_keeps_full_width_and_bit_spans_words() {
    let reg = registry();
    let bin = ColumnDescriptor::builder(0, "b", ColumnType::Binary).length(4).build().unwrap();
    assert_eq!(
        roundtrip(&bin, &Value::from(&[7u8, 8][..]), &reg),
        Value::Bytes(vec![7, 8, 0, 0])
    );
    let bits = ColumnDescriptor::builder(1, "bits", ColumnType::Bit).length(40).build().unwrap();
    assert_eq!(bits.footprint(), 8);
    let value = Value::UInt((1 << 39) | 5);
    assert_eq!(roundtrip(&bits, &value, &reg), value);
    let mut buf = vec![0u8; 8];
    assert!(pack(&mut buf, 0, &bits, &Value::UInt(1 << 40), &reg).is_err());
}
