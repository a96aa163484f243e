use crate::context::ExecutionContext;
use crate::error::Result;
use crate::model::MarketState;

/// 策略契约.
///
/// 两个扩展点: `init` 在回测开始时调用一次 (只做副作用),
/// `on_bar` 每根 K 线调用一次, 可以零次或多次调用上下文的
/// 下单/撤单/账户方法. 从任一回调传播出的错误都会终止回测.
pub trait Strategy {
    /// 回测开始时调用一次.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// 每根 K 线调用一次.
    fn on_bar(&mut self, market: &MarketState, ctx: &mut ExecutionContext) -> Result<()>;

    /// 策略名称 (日志用)
    fn name(&self) -> &str {
        "unnamed"
    }
}
