use crate::model::{Fill, Order, OrderStatus};

/// 订单管理器
/// 负责管理活跃/历史订单与成交流水
pub struct OrderManager {
    /// 历史订单 (已完成)
    pub orders: Vec<Order>,
    /// 当前活跃订单 (未完成, 按提交顺序)
    pub active_orders: Vec<Order>,
    /// 全部成交记录
    pub fills: Vec<Fill>,
}

impl OrderManager {
    pub fn new() -> Self {
        OrderManager {
            orders: Vec::new(),
            active_orders: Vec::new(),
            fills: Vec::new(),
        }
    }

    pub fn add_active_order(&mut self, order: Order) {
        self.active_orders.push(order);
    }

    /// 按 ID 撤销一笔仍未撮合的订单.
    /// 返回是否找到并撤销; 未知或已完结的 ID 为空操作.
    pub fn cancel_order(&mut self, order_id: i64) -> bool {
        if let Some(order) = self
            .active_orders
            .iter_mut()
            .find(|o| o.id == order_id && o.is_open())
        {
            order.status = OrderStatus::Cancelled;
            true
        } else {
            false
        }
    }

    /// 撤销全部仍在等待撮合的订单.
    pub fn cancel_all(&mut self) {
        for order in self.active_orders.iter_mut() {
            if order.is_open() {
                order.status = OrderStatus::Cancelled;
            }
        }
    }

    /// 记录一步产生的成交.
    pub fn record_fills(&mut self, fills: &[Fill]) {
        self.fills.extend_from_slice(fills);
    }

    /// 清理已完成的订单 (Filled, Cancelled), 移入历史列表.
    pub fn cleanup_finished_orders(&mut self) {
        let (finished, active): (Vec<Order>, Vec<Order>) =
            self.active_orders.drain(..).partition(|o| !o.is_open());

        self.orders.extend(finished);
        self.active_orders = active;
    }

    /// 获取所有订单 (历史 + 活跃)
    pub fn get_all_orders(&self) -> Vec<Order> {
        let mut all = self.orders.clone();
        all.extend(self.active_orders.clone());
        all
    }
}

impl Default for OrderManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderSide, OrderType};
    use rust_decimal::Decimal;

    fn create_order(id: i64) -> Order {
        Order::new(
            id,
            OrderSide::Buy,
            OrderType::Limit,
            Decimal::from(10),
            Some(Decimal::from(100)),
            None,
            1000,
        )
    }

    #[test]
    fn test_cancel_order() {
        let mut manager = OrderManager::new();
        manager.add_active_order(create_order(1));
        manager.add_active_order(create_order(2));

        assert!(manager.cancel_order(1));
        assert_eq!(manager.active_orders[0].status, OrderStatus::Cancelled);
        // unknown id
        assert!(!manager.cancel_order(99));
    }

    #[test]
    fn test_cancel_finished_is_noop() {
        let mut manager = OrderManager::new();
        let mut order = create_order(1);
        order.status = OrderStatus::Filled;
        manager.add_active_order(order);

        assert!(!manager.cancel_order(1));
        assert_eq!(manager.active_orders[0].status, OrderStatus::Filled);
    }

    #[test]
    fn test_cancel_all() {
        let mut manager = OrderManager::new();
        manager.add_active_order(create_order(1));
        manager.add_active_order(create_order(2));

        manager.cancel_all();
        assert!(manager
            .active_orders
            .iter()
            .all(|o| o.status == OrderStatus::Cancelled));
    }

    #[test]
    fn test_cleanup_finished_orders() {
        let mut manager = OrderManager::new();
        manager.add_active_order(create_order(1));
        let mut filled = create_order(2);
        filled.status = OrderStatus::Filled;
        manager.add_active_order(filled);
        let mut cancelled = create_order(3);
        cancelled.status = OrderStatus::Cancelled;
        manager.add_active_order(cancelled);

        manager.cleanup_finished_orders();

        assert_eq!(manager.active_orders.len(), 1);
        assert_eq!(manager.active_orders[0].id, 1);
        assert_eq!(manager.orders.len(), 2);
        assert_eq!(manager.get_all_orders().len(), 3);
    }
}
