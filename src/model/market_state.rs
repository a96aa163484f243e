use crate::error::{QuantBtError, Result};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// 单根 K 线的市场快照.
///
/// 一次时间步内由数据流产生, 策略与撮合引擎只读借用.
/// 衍生品字段 (mark_price/index_price/funding_rate) 对现货数据为零.
pub struct MarketState {
    /// 标的 ID (每个可交易品种固定)
    pub asset_id: i64,
    /// Unix 时间戳 (纳秒)
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// 买一价
    pub bid: Decimal,
    /// 卖一价
    pub ask: Decimal,
    pub mid: Decimal,
    /// 标记价格 (永续合约)
    pub mark_price: Decimal,
    /// 指数价格
    pub index_price: Decimal,
    /// 资金费率
    pub funding_rate: Decimal,
}

impl MarketState {
    /// 检查快照不变量.
    ///
    /// OHLC 包络 (high >= max(open, close), min(open, close) >= low),
    /// ask >= bid >= 0, mid 落在 [bid, ask], 各字段非负.
    pub fn validate(&self) -> Result<()> {
        if self.open < Decimal::ZERO
            || self.low < Decimal::ZERO
            || self.volume < Decimal::ZERO
        {
            return Err(QuantBtError::ConfigError(format!(
                "Negative market values at ts {}",
                self.timestamp
            )));
        }
        if self.high < self.open.max(self.close) || self.open.min(self.close) < self.low {
            return Err(QuantBtError::ConfigError(format!(
                "OHLC envelope violated at ts {}: o={} h={} l={} c={}",
                self.timestamp, self.open, self.high, self.low, self.close
            )));
        }
        if self.bid < Decimal::ZERO || self.ask < self.bid {
            return Err(QuantBtError::ConfigError(format!(
                "Crossed quote at ts {}: bid={} ask={}",
                self.timestamp, self.bid, self.ask
            )));
        }
        if self.mid < self.bid || self.mid > self.ask {
            return Err(QuantBtError::ConfigError(format!(
                "Mid outside quote at ts {}: bid={} mid={} ask={}",
                self.timestamp, self.bid, self.mid, self.ask
            )));
        }
        Ok(())
    }

    /// 获取格式化的时间字符串 (UTC).
    /// 格式: YYYY-MM-DD HH:MM:SS
    pub fn timestamp_str(&self) -> String {
        let secs = self.timestamp.div_euclid(1_000_000_000);
        let nanos = self.timestamp.rem_euclid(1_000_000_000) as u32;

        if let Some(dt) = Utc.timestamp_opt(secs, nanos).single() {
            dt.format("%Y-%m-%d %H:%M:%S").to_string()
        } else {
            self.timestamp.to_string()
        }
    }
}
