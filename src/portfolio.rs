use crate::model::{Fill, OrderSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// 投资组合.
///
/// :cash: 当前现金 (杠杆下可为负)
/// :position: 当前持仓 (正 = 多头, 负 = 空头)
/// :equity: 权益, 只由 mark_to_market 重新计算, 不单独修改
pub struct Portfolio {
    pub cash: Decimal,
    pub position: Decimal,
    pub equity: Decimal,
}

impl Portfolio {
    /// 创建投资组合.
    ///
    /// :param cash: 初始资金
    pub fn new(cash: Decimal) -> Self {
        Portfolio {
            cash,
            position: Decimal::ZERO,
            equity: cash,
        }
    }

    /// 应用一笔成交.
    ///
    /// 买入: cash -= size * price + fee, position += size.
    /// 卖出: cash += size * price - fee, position -= size.
    pub fn apply_fill(&mut self, fill: &Fill) {
        let notional = fill.size * fill.price;
        match fill.side {
            OrderSide::Buy => {
                self.cash -= notional + fill.fee;
                self.position += fill.size;
            }
            OrderSide::Sell => {
                self.cash += notional - fill.fee;
                self.position -= fill.size;
            }
        }
    }

    /// 盯市: equity = cash + position * price.
    ///
    /// 每根 K 线在全部成交应用后调用一次, 无成交时也调用,
    /// 以跟踪持仓的市值漂移. 返回计算后的权益.
    pub fn mark_to_market(&mut self, price: Decimal) -> Decimal {
        self.equity = self.cash + self.position * price;
        self.equity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(side: OrderSide, price: i64, size: i64, fee: Decimal) -> Fill {
        Fill {
            order_id: 1,
            side,
            price: Decimal::from(price),
            size: Decimal::from(size),
            fee,
            timestamp: 1000,
        }
    }

    #[test]
    fn test_apply_fill_buy() {
        let mut portfolio = Portfolio::new(Decimal::from(10_000));
        portfolio.apply_fill(&fill(OrderSide::Buy, 100, 10, Decimal::ONE));

        // 10000 - (10 * 100 + 1) = 8999
        assert_eq!(portfolio.cash, Decimal::from(8999));
        assert_eq!(portfolio.position, Decimal::from(10));
    }

    #[test]
    fn test_apply_fill_sell() {
        let mut portfolio = Portfolio::new(Decimal::from(10_000));
        portfolio.apply_fill(&fill(OrderSide::Sell, 100, 5, Decimal::ONE));

        // 10000 + (5 * 100 - 1) = 10499, position -5 (short)
        assert_eq!(portfolio.cash, Decimal::from(10499));
        assert_eq!(portfolio.position, Decimal::from(-5));
    }

    #[test]
    fn test_buy_then_sell_nets_position() {
        let mut portfolio = Portfolio::new(Decimal::from(10_000));
        portfolio.apply_fill(&fill(OrderSide::Buy, 100, 10, Decimal::ZERO));
        portfolio.apply_fill(&fill(OrderSide::Sell, 100, 5, Decimal::ZERO));

        assert_eq!(portfolio.position, Decimal::from(5));
        // 10000 - 1000 + 500 = 9500
        assert_eq!(portfolio.cash, Decimal::from(9500));
    }

    #[test]
    fn test_mark_to_market() {
        let mut portfolio = Portfolio::new(Decimal::from(10_000));
        portfolio.apply_fill(&fill(OrderSide::Buy, 100, 10, Decimal::ZERO));

        let equity = portfolio.mark_to_market(Decimal::from(110));
        // 9000 + 10 * 110 = 10100
        assert_eq!(equity, Decimal::from(10100));
        assert_eq!(portfolio.equity, equity);
    }

    #[test]
    fn test_cash_reconstruction_from_fill_log() {
        // 任意成交序列下, 现金应等于初始资金减去带符号的成交额与手续费之和
        let seed = Decimal::from(100_000);
        let mut portfolio = Portfolio::new(seed);
        let fills = vec![
            fill(OrderSide::Buy, 101, 10, Decimal::new(101, 2)),
            fill(OrderSide::Sell, 99, 4, Decimal::new(40, 2)),
            fill(OrderSide::Buy, 102, 7, Decimal::new(71, 2)),
            fill(OrderSide::Sell, 105, 13, Decimal::new(137, 2)),
        ];

        let mut expected = seed;
        for f in &fills {
            portfolio.apply_fill(f);
            match f.side {
                OrderSide::Buy => expected -= f.size * f.price + f.fee,
                OrderSide::Sell => expected += f.size * f.price - f.fee,
            }
        }
        assert_eq!(portfolio.cash, expected);
    }
}
