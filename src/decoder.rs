//! Record Decoder
//!
//! Strictly positional decoding of one tick line. Any field that fails to
//! parse fails the whole record; there is no default substitution.

use chrono::NaiveDateTime;
use csv::StringRecord;
use thiserror::Error;

use crate::models::{
    DepthSnapshot, Market, Side, TickRecord, DEPTH_FIELDS, TICK_COLUMNS, TRADE_TIME_FORMAT,
};

/// Column names in file order, used for error reporting.
pub const COLUMN_NAMES: [&str; TICK_COLUMNS] = [
    "market", "symbol", "trade_time", "latest_price", "trade_num", "trade_amount",
    "trade_volume", "bs", "b1p", "b2p", "b3p", "b4p", "b5p", "s1p", "s2p", "s3p", "s4p", "s5p",
    "b1v", "b2v", "b3v", "b4v", "b5v", "s1v", "s2v", "s3v", "s4v", "s5v",
];

const DEPTH_START: usize = 8;

/// Why a line could not be turned into a [`TickRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("unknown market code {0:?}")]
    Market(String),

    #[error("unknown side code {0:?}")]
    Side(String),

    #[error("bad timestamp {value:?}: {reason}")]
    Timestamp { value: String, reason: String },

    #[error("column {column}: not a decimal: {value:?}")]
    Decimal { column: &'static str, value: String },

    #[error("column {column}: not an integer: {value:?}")]
    Integer { column: &'static str, value: String },

    #[error("column {column}: invalid UTF-8")]
    Encoding { column: usize },
}

/// Decode one raw comma-delimited line.
pub fn decode_line(line: &str) -> Result<TickRecord, DecodeError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let record: StringRecord = line.split(',').collect();
    decode_record(&record)
}

/// Decode a record already split into fields.
pub fn decode_record(record: &StringRecord) -> Result<TickRecord, DecodeError> {
    if record.len() != TICK_COLUMNS {
        return Err(DecodeError::ColumnCount {
            expected: TICK_COLUMNS,
            found: record.len(),
        });
    }

    let market = Market::from_code(&record[0])
        .ok_or_else(|| DecodeError::Market(record[0].to_string()))?;
    let symbol = record[1].to_string();
    let trade_time = NaiveDateTime::parse_from_str(&record[2], TRADE_TIME_FORMAT).map_err(|e| {
        DecodeError::Timestamp {
            value: record[2].to_string(),
            reason: e.to_string(),
        }
    })?;
    let latest_price = decimal(record, 3)?;
    let trade_count = integer(record, 4)?;
    let trade_amount = decimal(record, 5)?;
    let trade_volume = decimal(record, 6)?;
    let side =
        Side::from_code(&record[7]).ok_or_else(|| DecodeError::Side(record[7].to_string()))?;

    let mut depth = [0.0; DEPTH_FIELDS];
    for (offset, slot) in depth.iter_mut().enumerate() {
        *slot = decimal(record, DEPTH_START + offset)?;
    }

    Ok(TickRecord {
        market,
        symbol,
        trade_time,
        latest_price,
        trade_count,
        trade_amount,
        trade_volume,
        side,
        depth: DepthSnapshot::from_values(depth),
    })
}

#[inline]
fn decimal(record: &StringRecord, index: usize) -> Result<f64, DecodeError> {
    let raw = &record[index];
    match fast_float::parse::<f64, _>(raw) {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(DecodeError::Decimal {
            column: COLUMN_NAMES[index],
            value: raw.to_string(),
        }),
    }
}

#[inline]
fn integer(record: &StringRecord, index: usize) -> Result<i64, DecodeError> {
    let raw = &record[index];
    raw.parse::<i64>().map_err(|_| DecodeError::Integer {
        column: COLUMN_NAMES[index],
        value: raw.to_string(),
    })
}
