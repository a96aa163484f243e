use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::analysis::BacktestResult;
use crate::config::{BacktestConfig, MarkSource};
use crate::context::{AccountState, ExecutionContext};
use crate::data::MarketData;
use crate::error::{QuantBtError, Result};
use crate::execution::{ExecutionEngine, SlippageModel};
use crate::model::{Fill, MarketState, Order};
use crate::order_manager::OrderManager;
use crate::portfolio::Portfolio;
use crate::strategy::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// 回测运行状态
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// 主回测引擎 (驱动器).
///
/// 状态机: Idle -> Running -> Completed | Failed.
/// 单线程同步回放: 每根 K 线依次完成策略回调、撮合、记账,
/// 步与步之间不重叠. 数据流耗尽正常结束 (Completed);
/// 策略/撮合/数据任一错误终止回放 (Failed), 不返回部分结果.
pub struct Engine {
    config: BacktestConfig,
    portfolio: Portfolio,
    execution: ExecutionEngine,
    account: AccountState,
    order_manager: OrderManager,
    equity_curve: Vec<(i64, Decimal)>,
    next_order_id: i64,
    state: RunState,
    abort: Arc<AtomicBool>,
}

impl Engine {
    /// 初始化回测引擎.
    pub fn new(config: BacktestConfig) -> Result<Self> {
        config.validate()?;

        let mut execution = ExecutionEngine::new(config.fee_rate);
        if config.volume_limit_pct > Decimal::ZERO {
            execution.set_volume_limit(config.volume_limit_pct.to_f64().unwrap_or(0.0));
        }

        Ok(Engine {
            portfolio: Portfolio::new(config.initial_cash),
            execution,
            account: AccountState::default(),
            order_manager: OrderManager::new(),
            equity_curve: Vec::new(),
            next_order_id: 1,
            state: RunState::Idle,
            abort: Arc::new(AtomicBool::new(false)),
            config,
        })
    }

    /// 设置滑点模型
    pub fn set_slippage_model(&mut self, model: Box<dyn SlippageModel>) {
        self.execution.set_slippage_model(model);
    }

    /// 协作式中止句柄. 置位后回测在下一根 K 线之前停止,
    /// 不会打断正在处理中的 K 线.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// 全部成交记录
    pub fn fills(&self) -> &[Fill] {
        &self.order_manager.fills
    }

    /// 获取订单列表 (历史 + 活跃)
    pub fn orders(&self) -> Vec<Order> {
        self.order_manager.get_all_orders()
    }

    /// 运行回测.
    ///
    /// 只能调用一次; 重复调用返回 ConfigError.
    pub fn run(
        &mut self,
        feed: &mut dyn MarketData,
        strategy: &mut dyn Strategy,
    ) -> Result<BacktestResult> {
        if self.state != RunState::Idle {
            return Err(QuantBtError::ConfigError(format!(
                "Engine already ran (state: {:?})",
                self.state
            )));
        }
        self.state = RunState::Running;
        info!(strategy = strategy.name(), "backtest started");

        if let Err(e) = strategy.init() {
            return Err(self.fail(e));
        }

        let pb = if self.config.show_progress {
            let pb = match feed.len_hint() {
                Some(total) if total > 0 => {
                    let pb = ProgressBar::new(total as u64);
                    pb.set_style(
                        ProgressStyle::default_bar()
                            .template(
                                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                            )
                            .unwrap()
                            .progress_chars("#>-"),
                    );
                    pb
                }
                _ => {
                    let pb = ProgressBar::new_spinner();
                    pb.set_style(
                        ProgressStyle::default_spinner()
                            .template("{spinner:.green} [{elapsed_precise}] {pos} bars processed")
                            .unwrap(),
                    );
                    pb
                }
            };
            Some(pb)
        } else {
            None
        };

        let mut count = 0usize;
        loop {
            // 中止检查只发生在 K 线之间
            if self.abort.load(Ordering::Relaxed) {
                return Err(self.fail(QuantBtError::Aborted));
            }

            let has_next = match feed.next() {
                Ok(b) => b,
                Err(e) => return Err(self.fail(e)),
            };
            if !has_next {
                break;
            }

            let market = feed.current();
            if market.timestamp < self.config.start_ts {
                continue;
            }
            if market.timestamp > self.config.end_ts {
                break;
            }

            if let Err(e) = self.step(market, strategy) {
                return Err(self.fail(e));
            }

            count += 1;
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }

        self.state = RunState::Completed;
        if let Some(pb) = pb {
            pb.finish_with_message("Backtest completed");
        }

        let result = BacktestResult::calculate(&self.equity_curve, self.config.initial_cash);
        info!(
            bars = count,
            fills = self.order_manager.fills.len(),
            final_equity = result.metrics.final_equity,
            "backtest completed"
        );
        Ok(result)
    }

    /// 处理一根 K 线: 策略回调 -> 撤单/下单 -> 撮合 -> 记账 -> 盯市.
    fn step(&mut self, market: &MarketState, strategy: &mut dyn Strategy) -> Result<()> {
        let mut ctx = ExecutionContext::new(
            self.next_order_id,
            market.timestamp,
            self.portfolio.position,
            self.account,
        );
        strategy.on_bar(market, &mut ctx)?;

        self.next_order_id = ctx.next_order_id();
        if ctx.account != self.account {
            debug!(
                leverage = ctx.account.leverage,
                margin_mode = ?ctx.account.margin_mode,
                "account parameters updated"
            );
            self.account = ctx.account;
        }

        // cancel_all 只作用于已有挂单; 本步在其后新下的订单保留
        if ctx.cancel_all_requested {
            self.order_manager.cancel_all();
        }
        for order in ctx.orders.drain(..) {
            self.order_manager.add_active_order(order);
        }
        for &id in &ctx.canceled_order_ids {
            if !self.order_manager.cancel_order(id) {
                warn!(order_id = id, "cancel requested for unknown or finished order");
            }
        }

        let fills = self
            .execution
            .execute(&mut self.order_manager.active_orders, market)?;
        for fill in &fills {
            self.portfolio.apply_fill(fill);
        }
        self.order_manager.record_fills(&fills);

        let mark = match self.config.mark_source {
            MarkSource::Close => market.close,
            MarkSource::MarkPrice => market.mark_price,
        };
        let equity = self.portfolio.mark_to_market(mark);
        self.equity_curve.push((market.timestamp, equity));

        self.order_manager.cleanup_finished_orders();
        Ok(())
    }

    fn fail(&mut self, err: QuantBtError) -> QuantBtError {
        self.state = RunState::Failed;
        warn!(error = %err, "backtest failed");
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryMarketData;
    use crate::model::{OrderSide, OrderStatus};

    fn create_bar(timestamp: i64, bid: i64, ask: i64) -> MarketState {
        let mid = (Decimal::from(bid) + Decimal::from(ask)) / Decimal::from(2);
        MarketState {
            asset_id: 0,
            timestamp,
            open: Decimal::from(100),
            high: Decimal::from(105),
            low: Decimal::from(95),
            close: Decimal::from(102),
            volume: Decimal::from(1000),
            bid: Decimal::from(bid),
            ask: Decimal::from(ask),
            mid,
            mark_price: Decimal::ZERO,
            index_price: Decimal::ZERO,
            funding_rate: Decimal::ZERO,
        }
    }

    struct Noop;

    impl Strategy for Noop {
        fn on_bar(&mut self, _market: &MarketState, _ctx: &mut ExecutionContext) -> Result<()> {
            Ok(())
        }
    }

    struct BuyOnFirstBar {
        done: bool,
    }

    impl Strategy for BuyOnFirstBar {
        fn on_bar(&mut self, _market: &MarketState, ctx: &mut ExecutionContext) -> Result<()> {
            if !self.done {
                ctx.market_buy(Decimal::from(10))?;
                self.done = true;
            }
            Ok(())
        }
    }

    #[test]
    fn test_empty_stream_completes() {
        let mut engine = Engine::new(BacktestConfig::default()).unwrap();
        let mut feed = MemoryMarketData::new(Vec::new());
        let mut strategy = Noop;

        let result = engine.run(&mut feed, &mut strategy).unwrap();

        assert_eq!(engine.state(), RunState::Completed);
        assert!(result.timestamps.is_empty());
        assert!(result.equity.is_empty());
        assert!(result.pnl.is_empty());
        assert!(result.drawdown.is_empty());
    }

    #[test]
    fn test_market_buy_scenario() {
        let config = BacktestConfig::default().with_fee_rate(0.001);
        let mut engine = Engine::new(config).unwrap();
        let mut feed = MemoryMarketData::new(vec![create_bar(1000, 99, 101)]);
        let mut strategy = BuyOnFirstBar { done: false };

        let result = engine.run(&mut feed, &mut strategy).unwrap();

        let fills = engine.fills();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, Decimal::from(101));
        assert_eq!(fills[0].size, Decimal::from(10));
        // fee = 10 * 101 * 0.001 = 1.01
        assert_eq!(fills[0].fee, Decimal::new(101, 2));

        // cash = 100000 - 1010 - 1.01
        assert_eq!(engine.portfolio().cash, Decimal::new(9898899, 2));
        assert_eq!(engine.portfolio().position, Decimal::from(10));
        // equity = cash + 10 * close(102)
        assert_eq!(engine.portfolio().equity, Decimal::new(10000899, 2));
        assert_eq!(result.len(), 1);
    }

    struct BuyAndSell;

    impl Strategy for BuyAndSell {
        fn on_bar(&mut self, _market: &MarketState, ctx: &mut ExecutionContext) -> Result<()> {
            ctx.market_buy(Decimal::from(10))?;
            ctx.market_sell(Decimal::from(5))?;
            Ok(())
        }
    }

    #[test]
    fn test_two_orders_one_bar() {
        let mut engine = Engine::new(BacktestConfig::default()).unwrap();
        let mut feed = MemoryMarketData::new(vec![create_bar(1000, 100, 100)]);
        let mut strategy = BuyAndSell;

        engine.run(&mut feed, &mut strategy).unwrap();

        let fills = engine.fills();
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].side, OrderSide::Buy);
        assert_eq!(fills[1].side, OrderSide::Sell);
        assert_eq!(engine.portfolio().position, Decimal::from(5));
        // 100000 - 1000 + 500
        assert_eq!(engine.portfolio().cash, Decimal::from(99_500));
    }

    #[test]
    fn test_replay_is_deterministic() {
        let bars: Vec<MarketState> = (0..50)
            .map(|i| create_bar(1000 + i * 60_000_000_000, 99, 101))
            .collect();

        let run = || {
            let config = BacktestConfig::default().with_fee_rate(0.001);
            let mut engine = Engine::new(config).unwrap();
            let mut feed = MemoryMarketData::new(bars.clone());
            let mut strategy = BuyOnFirstBar { done: false };
            engine.run(&mut feed, &mut strategy).unwrap()
        };

        let a = run();
        let b = run();

        assert_eq!(a.timestamps, b.timestamps);
        assert_eq!(a.equity, b.equity);
        assert_eq!(a.pnl, b.pnl);
        assert_eq!(a.drawdown, b.drawdown);
    }

    struct FailOnSecondBar {
        bars: usize,
    }

    impl Strategy for FailOnSecondBar {
        fn on_bar(&mut self, _market: &MarketState, _ctx: &mut ExecutionContext) -> Result<()> {
            self.bars += 1;
            if self.bars >= 2 {
                return Err(QuantBtError::StrategyError("boom".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_strategy_error_fails_run() {
        let mut engine = Engine::new(BacktestConfig::default()).unwrap();
        let mut feed = MemoryMarketData::new(vec![
            create_bar(1000, 99, 101),
            create_bar(2000, 99, 101),
        ]);
        let mut strategy = FailOnSecondBar { bars: 0 };

        let err = engine.run(&mut feed, &mut strategy).unwrap_err();

        assert!(matches!(err, QuantBtError::StrategyError(_)));
        assert_eq!(engine.state(), RunState::Failed);
    }

    #[test]
    fn test_window_bounds_inclusive() {
        let config = BacktestConfig::new(2000, 3000);
        let mut engine = Engine::new(config).unwrap();
        let mut feed = MemoryMarketData::new(vec![
            create_bar(1000, 99, 101),
            create_bar(2000, 99, 101),
            create_bar(3000, 99, 101),
            create_bar(4000, 99, 101),
        ]);
        let mut strategy = Noop;

        let result = engine.run(&mut feed, &mut strategy).unwrap();

        assert_eq!(result.timestamps, vec![2000, 3000]);
        assert_eq!(engine.state(), RunState::Completed);
    }

    #[test]
    fn test_abort_between_bars() {
        let mut engine = Engine::new(BacktestConfig::default()).unwrap();
        engine.abort_handle().store(true, Ordering::Relaxed);
        let mut feed = MemoryMarketData::new(vec![create_bar(1000, 99, 101)]);
        let mut strategy = Noop;

        let err = engine.run(&mut feed, &mut strategy).unwrap_err();

        assert!(matches!(err, QuantBtError::Aborted));
        assert_eq!(engine.state(), RunState::Failed);
    }

    #[test]
    fn test_run_twice_rejected() {
        let mut engine = Engine::new(BacktestConfig::default()).unwrap();
        let mut feed = MemoryMarketData::new(Vec::new());
        let mut strategy = Noop;
        engine.run(&mut feed, &mut strategy).unwrap();

        let err = engine.run(&mut feed, &mut strategy).unwrap_err();
        assert!(matches!(err, QuantBtError::ConfigError(_)));
    }

    struct RestingLimitBuy {
        placed: bool,
    }

    impl Strategy for RestingLimitBuy {
        fn on_bar(&mut self, _market: &MarketState, ctx: &mut ExecutionContext) -> Result<()> {
            if !self.placed {
                ctx.limit_buy(Decimal::from(10), Decimal::from(90))?;
                self.placed = true;
            }
            Ok(())
        }
    }

    #[test]
    fn test_limit_order_rests_across_bars() {
        let mut engine = Engine::new(BacktestConfig::default()).unwrap();
        // 第一根 K 线未触及限价, 第二根下探成交
        let mut bar2 = create_bar(2000, 99, 101);
        bar2.low = Decimal::from(88);
        bar2.open = Decimal::from(95);
        bar2.close = Decimal::from(96);
        bar2.high = Decimal::from(97);
        bar2.bid = Decimal::from(88);
        bar2.ask = Decimal::from(90);
        bar2.mid = Decimal::from(89);
        let mut feed = MemoryMarketData::new(vec![create_bar(1000, 99, 101), bar2]);
        let mut strategy = RestingLimitBuy { placed: false };

        engine.run(&mut feed, &mut strategy).unwrap();

        let fills = engine.fills();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].timestamp, 2000);
        // min(限价 90, open 95) = 90
        assert_eq!(fills[0].price, Decimal::from(90));
    }

    struct PlaceThenCancel {
        bars: usize,
        order_id: Option<i64>,
    }

    impl Strategy for PlaceThenCancel {
        fn on_bar(&mut self, _market: &MarketState, ctx: &mut ExecutionContext) -> Result<()> {
            self.bars += 1;
            match self.bars {
                1 => {
                    self.order_id = Some(ctx.limit_buy(Decimal::from(10), Decimal::from(50))?);
                }
                2 => {
                    ctx.cancel_order(self.order_id.unwrap());
                }
                _ => {}
            }
            Ok(())
        }
    }

    #[test]
    fn test_cancel_resting_order() {
        let mut engine = Engine::new(BacktestConfig::default()).unwrap();
        let mut feed = MemoryMarketData::new(vec![
            create_bar(1000, 99, 101),
            create_bar(2000, 99, 101),
            create_bar(3000, 99, 101),
        ]);
        let mut strategy = PlaceThenCancel {
            bars: 0,
            order_id: None,
        };

        engine.run(&mut feed, &mut strategy).unwrap();

        assert!(engine.fills().is_empty());
        let orders = engine.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Cancelled);
    }
}
