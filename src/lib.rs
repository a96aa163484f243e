//! 事件驱动的回测引擎.
//!
//! 按时间顺序回放历史行情, 每根 K 线调用一次策略回调,
//! 将策略的订单意图撮合成模拟成交, 并把投资组合状态累积为
//! 绩效时间序列 (权益 / 盈亏 / 回撤).
//!
//! 核心组件:
//! - [`MarketData`]: 行情数据流契约 (内存 / CSV 实现)
//! - [`Strategy`]: 策略契约 (`init` + `on_bar`)
//! - [`ExecutionContext`]: 策略面向的下单接口, 按步累积订单意图
//! - [`ExecutionEngine`]: 撮合/定价模型
//! - [`Portfolio`]: 资金与持仓记账
//! - [`Engine`]: 回放驱动器, 产出 [`BacktestResult`]
//!
//! # Example
//!
//! ```
//! use quantbt::{BacktestConfig, Engine, ExecutionContext, MarketState, MemoryMarketData, Strategy};
//! use rust_decimal::Decimal;
//!
//! struct BuyAndHold;
//!
//! impl Strategy for BuyAndHold {
//!     fn on_bar(&mut self, _market: &MarketState, ctx: &mut ExecutionContext) -> quantbt::Result<()> {
//!         if ctx.position() == Decimal::ZERO {
//!             ctx.market_buy(Decimal::ONE)?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let bar = MarketState {
//!     asset_id: 0,
//!     timestamp: 1_625_097_600_000_000_000,
//!     open: Decimal::from(100),
//!     high: Decimal::from(105),
//!     low: Decimal::from(95),
//!     close: Decimal::from(102),
//!     volume: Decimal::from(1000),
//!     bid: Decimal::from(99),
//!     ask: Decimal::from(101),
//!     mid: Decimal::from(100),
//!     mark_price: Decimal::ZERO,
//!     index_price: Decimal::ZERO,
//!     funding_rate: Decimal::ZERO,
//! };
//!
//! let config = BacktestConfig::default().with_fee_rate(0.001);
//! let mut engine = Engine::new(config).unwrap();
//! let mut feed = MemoryMarketData::new(vec![bar]);
//! let mut strategy = BuyAndHold;
//!
//! let result = engine.run(&mut feed, &mut strategy).unwrap();
//! assert_eq!(result.equity.len(), 1);
//! ```

mod analysis;
mod config;
mod context;
mod data;
mod engine;
mod error;
mod execution;
mod model;
mod order_manager;
mod portfolio;
mod strategy;

pub use analysis::{BacktestResult, PerformanceMetrics};
pub use config::{BacktestConfig, MarkSource};
pub use context::{AccountState, ExecutionContext};
pub use data::{CsvMarketData, MarketData, MemoryMarketData};
pub use engine::{Engine, RunState};
pub use error::{QuantBtError, Result};
pub use execution::{
    ExecutionEngine, FixedSlippage, PercentSlippage, SlippageModel, ZeroSlippage,
};
pub use model::{
    Fill, MarginMode, MarketState, Order, OrderSide, OrderStatus, OrderType,
};
pub use order_manager::OrderManager;
pub use portfolio::Portfolio;
pub use strategy::Strategy;
