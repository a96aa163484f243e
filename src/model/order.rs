use super::types::{OrderSide, OrderStatus, OrderType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// 订单.
///
/// 状态流转: New -> (Triggered) -> PartiallyFilled -> Filled / Cancelled.
/// id 在一次回测内由上下文单调分配.
pub struct Order {
    pub id: i64,
    pub side: OrderSide,
    pub order_type: OrderType,
    /// 数量 (恒为正)
    pub size: Decimal,
    /// 限价 (Limit / StopLimit 有效)
    pub price: Option<Decimal>,
    /// 触发价 (Stop / StopLimit 有效)
    pub trigger_price: Option<Decimal>,
    /// 创建时间戳 (纳秒)
    pub timestamp: i64,
    pub status: OrderStatus,
    pub filled_size: Decimal,
    pub average_filled_price: Option<Decimal>,
}

impl Order {
    pub fn new(
        id: i64,
        side: OrderSide,
        order_type: OrderType,
        size: Decimal,
        price: Option<Decimal>,
        trigger_price: Option<Decimal>,
        timestamp: i64,
    ) -> Self {
        Order {
            id,
            side,
            order_type,
            size,
            price,
            trigger_price,
            timestamp,
            status: OrderStatus::New,
            filled_size: Decimal::ZERO,
            average_filled_price: None,
        }
    }

    /// 剩余未成交数量
    pub fn remaining_size(&self) -> Decimal {
        self.size - self.filled_size
    }

    /// 是否仍在等待撮合
    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::New | OrderStatus::Triggered | OrderStatus::PartiallyFilled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// 成交记录.
///
/// 一笔订单对一根 K 线撮合的结果, 不可变且终态,
/// 是投资组合记账的唯一输入.
pub struct Fill {
    pub order_id: i64,
    pub side: OrderSide,
    pub price: Decimal,
    pub size: Decimal,
    /// 手续费 (非负, 与成交额成比例)
    pub fee: Decimal,
    /// 撮合所用 K 线的时间戳 (纳秒)
    pub timestamp: i64,
}
