use crate::error::{QuantBtError, Result};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// 权益盯市价格来源.
///
/// 一次回测内只使用一种, 不允许混用.
pub enum MarkSource {
    /// K 线收盘价
    Close,
    /// 标记价格 (衍生品数据)
    MarkPrice,
}

#[derive(Debug, Clone)]
/// 回测配置.
///
/// 所有参数在构造时显式传入, 引擎不持有任何全局可变状态,
/// 因此多个回测可各持一份配置并行运行.
pub struct BacktestConfig {
    /// 回放窗口起点 (纳秒, 含)
    pub start_ts: i64,
    /// 回放窗口终点 (纳秒, 含)
    pub end_ts: i64,
    /// 初始资金
    pub initial_cash: Decimal,
    /// 手续费率 (成交额比例, 如 0.001)
    pub fee_rate: Decimal,
    /// 单根 K 线最大成交量比例 (0 = 不限制)
    pub volume_limit_pct: Decimal,
    pub mark_source: MarkSource,
    /// 是否显示进度条
    pub show_progress: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            start_ts: i64::MIN,
            end_ts: i64::MAX,
            initial_cash: Decimal::from(100_000),
            fee_rate: Decimal::ZERO,
            volume_limit_pct: Decimal::ZERO,
            mark_source: MarkSource::Close,
            show_progress: false,
        }
    }
}

impl BacktestConfig {
    /// 创建指定回放窗口的配置, 其余字段取默认值.
    pub fn new(start_ts: i64, end_ts: i64) -> Self {
        BacktestConfig {
            start_ts,
            end_ts,
            ..Default::default()
        }
    }

    /// 设置手续费率.
    pub fn with_fee_rate(mut self, rate: f64) -> Self {
        self.fee_rate = Decimal::from_f64(rate).unwrap_or(Decimal::ZERO);
        self
    }

    /// 设置初始资金.
    pub fn with_initial_cash(mut self, cash: f64) -> Self {
        self.initial_cash = Decimal::from_f64(cash).unwrap_or(Decimal::ZERO);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_ts > self.end_ts {
            return Err(QuantBtError::ConfigError(format!(
                "start_ts {} > end_ts {}",
                self.start_ts, self.end_ts
            )));
        }
        if self.fee_rate < Decimal::ZERO {
            return Err(QuantBtError::ConfigError(format!(
                "Negative fee rate: {}",
                self.fee_rate
            )));
        }
        if self.initial_cash < Decimal::ZERO {
            return Err(QuantBtError::ConfigError(format!(
                "Negative initial cash: {}",
                self.initial_cash
            )));
        }
        if self.volume_limit_pct < Decimal::ZERO {
            return Err(QuantBtError::ConfigError(format!(
                "Negative volume limit: {}",
                self.volume_limit_pct
            )));
        }
        Ok(())
    }
}
