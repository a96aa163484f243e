use crate::error::{QuantBtError, Result};
use crate::model::{MarginMode, Order, OrderSide, OrderType};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// 账户风险参数.
///
/// 由策略通过上下文修改, 撮合/费用模型消费,
/// 本身不直接影响记账.
pub struct AccountState {
    pub leverage: u32,
    pub margin_mode: MarginMode,
}

impl Default for AccountState {
    fn default() -> Self {
        AccountState {
            leverage: 1,
            margin_mode: MarginMode::Cross,
        }
    }
}

/// 策略下单上下文.
///
/// 每根 K 线由驱动器新建, 策略回调返回后整体取走:
/// 下单调用只是把订单追加到本步的待撮合队列,
/// 撮合在回调返回之后统一进行, 不会立即产生成交.
///
/// :orders: 本步累积的新订单
/// :canceled_order_ids: 请求撤销的挂单 ID
/// :account: 账户风险参数 (修改后由驱动器合并)
pub struct ExecutionContext {
    pub orders: Vec<Order>,
    pub canceled_order_ids: Vec<i64>,
    pub cancel_all_requested: bool,
    pub account: AccountState,
    next_order_id: i64,
    timestamp: i64,
    /// 构造时的持仓快照, close_* 系列以此为准
    position: Decimal,
}

impl ExecutionContext {
    pub fn new(next_order_id: i64, timestamp: i64, position: Decimal, account: AccountState) -> Self {
        ExecutionContext {
            orders: Vec::new(),
            canceled_order_ids: Vec::new(),
            cancel_all_requested: false,
            account,
            next_order_id,
            timestamp,
            position,
        }
    }

    /// 当前持仓快照 (正 = 多头, 负 = 空头)
    pub fn position(&self) -> Decimal {
        self.position
    }

    /// 下一个待分配的订单 ID (驱动器回收用)
    pub fn next_order_id(&self) -> i64 {
        self.next_order_id
    }

    fn push_order(
        &mut self,
        side: OrderSide,
        order_type: OrderType,
        size: Decimal,
        price: Option<Decimal>,
        trigger_price: Option<Decimal>,
    ) -> Result<i64> {
        if size <= Decimal::ZERO {
            return Err(QuantBtError::InvalidOrder(format!(
                "Order size must be positive, got {}",
                size
            )));
        }
        if let Some(p) = price {
            if p <= Decimal::ZERO {
                return Err(QuantBtError::InvalidOrder(format!(
                    "Limit price must be positive, got {}",
                    p
                )));
            }
        }
        if let Some(t) = trigger_price {
            if t <= Decimal::ZERO {
                return Err(QuantBtError::InvalidOrder(format!(
                    "Stop price must be positive, got {}",
                    t
                )));
            }
        }

        let id = self.next_order_id;
        self.next_order_id += 1;
        self.orders.push(Order::new(
            id,
            side,
            order_type,
            size,
            price,
            trigger_price,
            self.timestamp,
        ));
        Ok(id)
    }

    // --- 市价单 ---

    pub fn market_buy(&mut self, size: Decimal) -> Result<i64> {
        self.push_order(OrderSide::Buy, OrderType::Market, size, None, None)
    }

    pub fn market_sell(&mut self, size: Decimal) -> Result<i64> {
        self.push_order(OrderSide::Sell, OrderType::Market, size, None, None)
    }

    // --- 限价单 ---

    pub fn limit_buy(&mut self, size: Decimal, price: Decimal) -> Result<i64> {
        self.push_order(OrderSide::Buy, OrderType::Limit, size, Some(price), None)
    }

    pub fn limit_sell(&mut self, size: Decimal, price: Decimal) -> Result<i64> {
        self.push_order(OrderSide::Sell, OrderType::Limit, size, Some(price), None)
    }

    // --- 止损单 ---

    pub fn stop_buy(&mut self, size: Decimal, stop_price: Decimal) -> Result<i64> {
        self.push_order(OrderSide::Buy, OrderType::Stop, size, None, Some(stop_price))
    }

    pub fn stop_sell(&mut self, size: Decimal, stop_price: Decimal) -> Result<i64> {
        self.push_order(OrderSide::Sell, OrderType::Stop, size, None, Some(stop_price))
    }

    // --- 止损限价单 ---

    pub fn stop_limit_buy(
        &mut self,
        size: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> Result<i64> {
        self.push_order(
            OrderSide::Buy,
            OrderType::StopLimit,
            size,
            Some(limit_price),
            Some(stop_price),
        )
    }

    pub fn stop_limit_sell(
        &mut self,
        size: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> Result<i64> {
        self.push_order(
            OrderSide::Sell,
            OrderType::StopLimit,
            size,
            Some(limit_price),
            Some(stop_price),
        )
    }

    // --- 持仓管理 ---

    /// 市价平掉全部持仓. 无持仓时不做任何事.
    pub fn close_position(&mut self) -> Result<()> {
        if self.position > Decimal::ZERO {
            self.market_sell(self.position)?;
        } else if self.position < Decimal::ZERO {
            self.market_buy(-self.position)?;
        }
        Ok(())
    }

    /// 市价平掉多头持仓. 持仓 <= 0 时不做任何事.
    pub fn close_long(&mut self) -> Result<()> {
        if self.position > Decimal::ZERO {
            self.market_sell(self.position)?;
        }
        Ok(())
    }

    /// 市价平掉空头持仓. 持仓 >= 0 时不做任何事.
    pub fn close_short(&mut self) -> Result<()> {
        if self.position < Decimal::ZERO {
            self.market_buy(-self.position)?;
        }
        Ok(())
    }

    /// 按给定数量向减仓方向市价平仓.
    ///
    /// 数量超过持仓绝对值时截断为持仓绝对值, 不会反向开仓;
    /// 无持仓时不做任何事.
    pub fn close_amount(&mut self, size: Decimal) -> Result<()> {
        if size <= Decimal::ZERO {
            return Err(QuantBtError::InvalidOrder(format!(
                "Close amount must be positive, got {}",
                size
            )));
        }
        if self.position > Decimal::ZERO {
            self.market_sell(size.min(self.position))?;
        } else if self.position < Decimal::ZERO {
            self.market_buy(size.min(-self.position))?;
        }
        Ok(())
    }

    // --- 订单管理 ---

    /// 撤销一笔仍在等待撮合的订单. 未知 ID 忽略.
    pub fn cancel_order(&mut self, order_id: i64) {
        self.canceled_order_ids.push(order_id);
    }

    /// 撤销全部挂单, 包括本步已累积的新订单.
    pub fn cancel_all(&mut self) {
        self.orders.clear();
        self.cancel_all_requested = true;
    }

    // --- 合约账户控制 ---

    pub fn set_leverage(&mut self, leverage: u32) -> Result<()> {
        if leverage == 0 {
            return Err(QuantBtError::ConfigError(
                "Leverage must be at least 1".to_string(),
            ));
        }
        self.account.leverage = leverage;
        Ok(())
    }

    pub fn set_cross_mode(&mut self) {
        self.account.margin_mode = MarginMode::Cross;
    }

    pub fn set_isolated_mode(&mut self) {
        self.account.margin_mode = MarginMode::Isolated;
    }
}
