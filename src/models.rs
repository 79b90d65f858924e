//! Tick Data Model
//!
//! One row of the per-symbol tick CSV files, typed. Column order here is the
//! column order on disk and the bind order of the insert statement.

use chrono::NaiveDateTime;
use csv::StringRecord;
use serde::{Deserialize, Serialize};

/// Number of columns in every tick line.
pub const TICK_COLUMNS: usize = 28;

/// Levels per side of the depth snapshot.
pub const DEPTH_LEVELS: usize = 5;

/// Depth values per record (bid/ask prices and volumes).
pub const DEPTH_FIELDS: usize = DEPTH_LEVELS * 4;

/// Timestamp layout used by the tick files.
pub const TRADE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Exchange the symbol is listed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    /// Shanghai, file code `sh`.
    PrimaryExchange,
    /// Shenzhen, file code `sz`.
    SecondaryExchange,
}

impl Market {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "sh" => Some(Self::PrimaryExchange),
            "sz" => Some(Self::SecondaryExchange),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::PrimaryExchange => "sh",
            Self::SecondaryExchange => "sz",
        }
    }

    /// Small integer stored in the `market` column.
    pub fn db_code(&self) -> i64 {
        match self {
            Self::PrimaryExchange => 0,
            Self::SecondaryExchange => 1,
        }
    }
}

/// Aggressor direction of the last trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "B" => Some(Self::Buy),
            "S" => Some(Self::Sell),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Buy => "B",
            Self::Sell => "S",
        }
    }

    /// Small integer stored in the `bs` column.
    pub fn db_code(&self) -> i64 {
        match self {
            Self::Buy => 0,
            Self::Sell => 1,
        }
    }
}

/// Five-level order book snapshot attached to a tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub bid_prices: [f64; DEPTH_LEVELS],
    pub ask_prices: [f64; DEPTH_LEVELS],
    pub bid_volumes: [f64; DEPTH_LEVELS],
    pub ask_volumes: [f64; DEPTH_LEVELS],
}

impl DepthSnapshot {
    /// Build from the twenty depth columns in file order.
    pub fn from_values(values: [f64; DEPTH_FIELDS]) -> Self {
        let mut depth = Self::default();
        depth.bid_prices.copy_from_slice(&values[0..5]);
        depth.ask_prices.copy_from_slice(&values[5..10]);
        depth.bid_volumes.copy_from_slice(&values[10..15]);
        depth.ask_volumes.copy_from_slice(&values[15..20]);
        depth
    }

    /// Values in file/bind order: B1P..B5P, S1P..S5P, B1V..B5V, S1V..S5V.
    pub fn values(&self) -> impl Iterator<Item = &f64> + '_ {
        self.bid_prices
            .iter()
            .chain(self.ask_prices.iter())
            .chain(self.bid_volumes.iter())
            .chain(self.ask_volumes.iter())
    }
}

/// One parsed market observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub market: Market,
    pub symbol: String,
    pub trade_time: NaiveDateTime,
    pub latest_price: f64,
    pub trade_count: i64,
    pub trade_amount: f64,
    pub trade_volume: f64,
    pub side: Side,
    pub depth: DepthSnapshot,
}

impl TickRecord {
    /// Serialize back into the on-disk column order.
    pub fn to_record(&self) -> StringRecord {
        let mut record = StringRecord::with_capacity(256, TICK_COLUMNS);
        record.push_field(self.market.code());
        record.push_field(&self.symbol);
        record.push_field(&self.trade_time.format(TRADE_TIME_FORMAT).to_string());
        record.push_field(&self.latest_price.to_string());
        record.push_field(&self.trade_count.to_string());
        record.push_field(&self.trade_amount.to_string());
        record.push_field(&self.trade_volume.to_string());
        record.push_field(self.side.code());
        for value in self.depth.values() {
            record.push_field(&value.to_string());
        }
        record
    }

    /// Serialize as one comma-delimited line (no trailing newline).
    pub fn to_line(&self) -> String {
        self.to_record().iter().collect::<Vec<_>>().join(",")
    }
}
