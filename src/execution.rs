use crate::error::{QuantBtError, Result};
use crate::model::{Fill, MarketState, Order, OrderSide, OrderStatus, OrderType};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use tracing::debug;

/// 滑点模型特征
pub trait SlippageModel: Send + Sync {
    /// 计算滑点后的成交价
    fn calculate_price(&self, price: Decimal, quantity: Decimal, side: OrderSide) -> Decimal;
}

/// 零滑点模型 (默认)
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroSlippage;

impl SlippageModel for ZeroSlippage {
    fn calculate_price(&self, price: Decimal, _quantity: Decimal, _side: OrderSide) -> Decimal {
        price
    }
}

/// 固定值滑点模型
/// 每单位价格增加/减少固定数值
#[derive(Debug, Clone, Copy)]
pub struct FixedSlippage {
    pub delta: Decimal,
}

impl SlippageModel for FixedSlippage {
    fn calculate_price(&self, price: Decimal, _quantity: Decimal, side: OrderSide) -> Decimal {
        match side {
            OrderSide::Buy => price + self.delta,
            OrderSide::Sell => price - self.delta,
        }
    }
}

/// 百分比滑点模型
/// 价格增加/减少固定百分比
#[derive(Debug, Clone, Copy)]
pub struct PercentSlippage {
    pub rate: Decimal,
}

impl SlippageModel for PercentSlippage {
    fn calculate_price(&self, price: Decimal, _quantity: Decimal, side: OrderSide) -> Decimal {
        match side {
            OrderSide::Buy => price * (Decimal::ONE + self.rate),
            OrderSide::Sell => price * (Decimal::ONE - self.rate),
        }
    }
}

/// 撮合引擎.
///
/// execute 是挂单快照与当前行情的纯函数, 除单次调用内的
/// 簿记外不持有可变状态. 撮合规则:
/// - 市价单按对手价立即成交 (买 = ask, 卖 = bid)
/// - 限价买单在 low <= 限价时以 min(限价, open) 成交, 卖单对称
/// - 止损单在触发价被 high/low 触及后转为市价, 同一根 K 线内撮合
/// - 止损限价单触发后转为限价, 限价检查同样从触发的 K 线开始
/// - 手续费 = 成交量 * 成交价 * fee_rate
pub struct ExecutionEngine {
    fee_rate: Decimal,
    slippage_model: Box<dyn SlippageModel>,
    volume_limit_pct: Decimal, // 成交量限制比例 (0.0 = 不限制)
}

impl ExecutionEngine {
    pub fn new(fee_rate: Decimal) -> Self {
        ExecutionEngine {
            fee_rate,
            slippage_model: Box::new(ZeroSlippage),
            volume_limit_pct: Decimal::ZERO,
        }
    }

    pub fn fee_rate(&self) -> Decimal {
        self.fee_rate
    }

    pub fn set_slippage_model(&mut self, model: Box<dyn SlippageModel>) {
        self.slippage_model = model;
    }

    pub fn set_volume_limit(&mut self, limit: f64) {
        self.volume_limit_pct = Decimal::from_f64(limit).unwrap_or(Decimal::ZERO);
    }

    /// 对当前行情撮合挂单, 返回生成的成交.
    ///
    /// 订单按提交顺序 (= id 顺序) 处理, 不为更优价格重排.
    /// 流动性不足不报错, 该订单本步产生零成交;
    /// 行情快照不变量被破坏时返回 ConfigError.
    pub fn execute(&self, orders: &mut [Order], market: &MarketState) -> Result<Vec<Fill>> {
        market.validate()?;

        let mut fills = Vec::new();

        for order in orders.iter_mut() {
            if !order.is_open() {
                continue;
            }
            if order.size <= Decimal::ZERO {
                return Err(QuantBtError::ConfigError(format!(
                    "Order {} has non-positive size {}",
                    order.id, order.size
                )));
            }

            // 1. 止损触发检查
            if matches!(order.order_type, OrderType::Stop | OrderType::StopLimit)
                && order.status == OrderStatus::New
            {
                let trigger = order.trigger_price.ok_or_else(|| {
                    QuantBtError::MatchingError(format!(
                        "Stop order {} without trigger price",
                        order.id
                    ))
                })?;
                let triggered = match order.side {
                    OrderSide::Buy => market.high >= trigger, // 价格上穿触发
                    OrderSide::Sell => market.low <= trigger, // 价格下穿触发
                };
                if !triggered {
                    continue;
                }
                order.status = OrderStatus::Triggered;
                debug!(order_id = order.id, ts = market.timestamp, "stop triggered");
            }

            // 2. 撮合: 确定成交价
            let execute_price: Option<Decimal> = match order.order_type {
                OrderType::Market | OrderType::Stop => {
                    // 市价单 / 已触发的止损单按对手价成交
                    Some(match order.side {
                        OrderSide::Buy => market.ask,
                        OrderSide::Sell => market.bid,
                    })
                }
                OrderType::Limit | OrderType::StopLimit => {
                    let limit_price = order.price.ok_or_else(|| {
                        QuantBtError::MatchingError(format!(
                            "Limit order {} without price",
                            order.id
                        ))
                    })?;
                    match order.side {
                        OrderSide::Buy => {
                            // 买单: 最低价 <= 限价, 以 min(限价, open) 成交
                            if market.low <= limit_price {
                                Some(limit_price.min(market.open))
                            } else {
                                None
                            }
                        }
                        OrderSide::Sell => {
                            // 卖单: 最高价 >= 限价, 以 max(限价, open) 成交
                            if market.high >= limit_price {
                                Some(limit_price.max(market.open))
                            } else {
                                None
                            }
                        }
                    }
                }
            };

            let Some(price) = execute_price else {
                continue;
            };

            let final_price =
                self.slippage_model
                    .calculate_price(price, order.remaining_size(), order.side);

            // 3. 成交量限制 (部分成交)
            let max_qty = if self.volume_limit_pct > Decimal::ZERO {
                market.volume * self.volume_limit_pct
            } else {
                Decimal::MAX
            };

            let fill_size = order.remaining_size().min(max_qty);
            if fill_size <= Decimal::ZERO {
                continue;
            }
            if fill_size > order.remaining_size() {
                return Err(QuantBtError::MatchingError(format!(
                    "Fill size {} exceeds remaining {} for order {}",
                    fill_size,
                    order.remaining_size(),
                    order.id
                )));
            }

            // 4. 更新订单状态与成交均价 (加权)
            let prev_filled = order.filled_size;
            let prev_avg = order.average_filled_price.unwrap_or(Decimal::ZERO);
            order.filled_size += fill_size;
            order.average_filled_price =
                Some((prev_avg * prev_filled + final_price * fill_size) / order.filled_size);
            order.status = if order.filled_size == order.size {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };

            let fee = fill_size * final_price * self.fee_rate;
            debug!(
                order_id = order.id,
                ts = market.timestamp,
                %final_price,
                %fill_size,
                "fill"
            );
            fills.push(Fill {
                order_id: order.id,
                side: order.side,
                price: final_price,
                size: fill_size,
                fee,
                timestamp: market.timestamp,
            });
        }

        Ok(fills)
    }
}
