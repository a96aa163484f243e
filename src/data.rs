use crate::error::{QuantBtError, Result};
use crate::model::MarketState;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

#[inline]
fn normalize_timestamp(ts: i64) -> i64 {
    let abs_ts = ts.abs();
    if abs_ts < 100_000_000_000 {
        // Seconds (< 10^11, up to year ~5138)
        ts * 1_000_000_000
    } else if abs_ts < 100_000_000_000_000 {
        // Milliseconds
        ts * 1_000_000
    } else if abs_ts < 100_000_000_000_000_000 {
        // Microseconds
        ts * 1_000
    } else {
        // Nanoseconds
        ts
    }
}

const CURRENT_BEFORE_NEXT: &str = "MarketData::current() called before the first next()";

/// 行情数据流契约.
///
/// `next()` 推进流并返回是否有新元素, false 表示正常耗尽 (不是错误);
/// `current()` 返回当前元素的引用, 在下一次 `next()` 之前有效.
/// 只进不退, 无随机访问.
///
/// 约定 (所有实现统一遵守): 第一次成功的 `next()` 之前调用
/// `current()` 属于调用方契约违规, 实现以同一条消息 panic.
/// 实现必须保证时间戳跨相邻元素非递减, 即使底层来源无序.
/// 从持久化存储读取的适配器属于外部协作方, 只需满足本契约.
pub trait MarketData {
    fn next(&mut self) -> Result<bool>;
    fn current(&self) -> &MarketState;

    /// 剩余元素数量提示 (用于进度显示)
    fn len_hint(&self) -> Option<usize> {
        None
    }
}

/// 内存行情数据 (回测用)
///
/// 构造时按时间戳稳定排序, 保证非递减不变量.
pub struct MemoryMarketData {
    states: Vec<MarketState>,
    cursor: Option<usize>,
}

impl MemoryMarketData {
    pub fn new(mut states: Vec<MarketState>) -> Self {
        states.sort_by_key(|s| s.timestamp);
        MemoryMarketData {
            states,
            cursor: None,
        }
    }
}

impl MarketData for MemoryMarketData {
    fn next(&mut self) -> Result<bool> {
        let next_idx = match self.cursor {
            None => 0,
            Some(i) => i + 1,
        };
        if next_idx < self.states.len() {
            self.cursor = Some(next_idx);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn current(&self) -> &MarketState {
        let idx = self.cursor.expect(CURRENT_BEFORE_NEXT);
        &self.states[idx]
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.states.len())
    }
}

/// CSV 行情数据 (流式)
///
/// 列: open_time (或 timestamp), open, high, low, close, volume,
/// 可选 bid/ask/mid/mark_price/index_price/funding_rate.
/// 缺失的盘口字段用收盘价合成, 资金费率字段对现货数据默认为零.
/// 时间戳自动归一化到纳秒, 乱序行报 DataError.
pub struct CsvMarketData {
    reader: csv::Reader<File>,
    headers: csv::StringRecord,
    current: Option<MarketState>,
    asset_id: i64,
    last_timestamp: Option<i64>,
}

#[derive(Deserialize)]
struct CsvRow {
    #[serde(alias = "timestamp")]
    open_time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    bid: Option<f64>,
    ask: Option<f64>,
    mid: Option<f64>,
    mark_price: Option<f64>,
    index_price: Option<f64>,
    funding_rate: Option<f64>,
}

fn dec(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

impl CsvMarketData {
    pub fn from_path<P: AsRef<Path>>(path: P, asset_id: i64) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
        let headers = reader.headers()?.clone();

        Ok(CsvMarketData {
            reader,
            headers,
            current: None,
            asset_id,
            last_timestamp: None,
        })
    }

    fn row_to_state(&self, row: CsvRow) -> MarketState {
        let close = dec(row.close);
        let bid = row.bid.map(dec).unwrap_or(close);
        let ask = row.ask.map(dec).unwrap_or(close);
        let mid = row
            .mid
            .map(dec)
            .unwrap_or((bid + ask) / Decimal::from(2));

        MarketState {
            asset_id: self.asset_id,
            timestamp: normalize_timestamp(row.open_time),
            open: dec(row.open),
            high: dec(row.high),
            low: dec(row.low),
            close,
            volume: dec(row.volume),
            bid,
            ask,
            mid,
            mark_price: row.mark_price.map(dec).unwrap_or(Decimal::ZERO),
            index_price: row.index_price.map(dec).unwrap_or(Decimal::ZERO),
            funding_rate: row.funding_rate.map(dec).unwrap_or(Decimal::ZERO),
        }
    }
}

impl MarketData for CsvMarketData {
    fn next(&mut self) -> Result<bool> {
        let mut record = csv::StringRecord::new();
        if !self.reader.read_record(&mut record)? {
            return Ok(false);
        }

        let row: CsvRow = record.deserialize(Some(&self.headers))?;
        let state = self.row_to_state(row);

        if let Some(last) = self.last_timestamp {
            if state.timestamp < last {
                return Err(QuantBtError::DataError(format!(
                    "Out-of-order timestamp {} after {}",
                    state.timestamp, last
                )));
            }
        }
        self.last_timestamp = Some(state.timestamp);
        self.current = Some(state);
        Ok(true)
    }

    fn current(&self) -> &MarketState {
        self.current.as_ref().expect(CURRENT_BEFORE_NEXT)
    }
}
