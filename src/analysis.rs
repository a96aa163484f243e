use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const NS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0 * 1e9;

#[derive(Debug, Clone, Serialize, Deserialize)]
/// 绩效指标.
///
/// 由权益曲线计算, 金额与百分比均以 f64 输出.
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    /// 最大回撤 (金额, 非负)
    pub max_drawdown: f64,
    /// 最大回撤相对峰值的百分比 (非负)
    pub max_drawdown_pct: f64,
    /// 年化波动率 (%)
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub initial_equity: f64,
    pub final_equity: f64,
}

impl PerformanceMetrics {
    fn zero() -> Self {
        PerformanceMetrics {
            total_return: 0.0,
            total_return_pct: 0.0,
            annualized_return_pct: 0.0,
            max_drawdown: 0.0,
            max_drawdown_pct: 0.0,
            volatility: 0.0,
            sharpe_ratio: 0.0,
            initial_equity: 0.0,
            final_equity: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// 回测结果.
///
/// 四条等长的时间对齐序列, 每处理一根 K 线追加一项:
/// drawdown[i] = equity[i] - max(equity[0..=i]), 恒 <= 0,
/// 创新高时为 0. pnl[i] = equity[i] - equity[i-1],
/// 第一项以初始资金作为前值.
pub struct BacktestResult {
    pub timestamps: Vec<i64>,
    pub equity: Vec<f64>,
    pub pnl: Vec<f64>,
    pub drawdown: Vec<f64>,
    pub metrics: PerformanceMetrics,
}

impl BacktestResult {
    /// 由权益曲线计算完整结果.
    ///
    /// 空曲线 (零根 K 线) 产生四条空序列和零值指标.
    pub fn calculate(equity_curve: &[(i64, Decimal)], initial_cash: Decimal) -> Self {
        let n = equity_curve.len();
        let mut timestamps = Vec::with_capacity(n);
        let mut equity = Vec::with_capacity(n);
        let mut pnl = Vec::with_capacity(n);
        let mut drawdown = Vec::with_capacity(n);

        let mut prev = initial_cash;
        let mut peak: Option<Decimal> = None;
        let mut max_dd = Decimal::ZERO; // 最深回撤 (负值)
        let mut max_dd_pct = 0.0f64;

        for &(ts, eq) in equity_curve {
            let running_peak = match peak {
                Some(p) if p >= eq => p,
                _ => {
                    peak = Some(eq);
                    eq
                }
            };
            let dd = eq - running_peak;
            if dd < max_dd {
                max_dd = dd;
            }
            if running_peak > Decimal::ZERO {
                let pct = (dd / running_peak).to_f64().unwrap_or(0.0) * -100.0;
                if pct > max_dd_pct {
                    max_dd_pct = pct;
                }
            }

            timestamps.push(ts);
            equity.push(eq.to_f64().unwrap_or_default());
            pnl.push((eq - prev).to_f64().unwrap_or_default());
            drawdown.push(dd.to_f64().unwrap_or_default());
            prev = eq;
        }

        let metrics = if n == 0 {
            PerformanceMetrics::zero()
        } else {
            Self::calculate_metrics(
                &timestamps,
                &equity,
                initial_cash.to_f64().unwrap_or_default(),
                (-max_dd).to_f64().unwrap_or_default(),
                max_dd_pct,
            )
        };

        BacktestResult {
            timestamps,
            equity,
            pnl,
            drawdown,
            metrics,
        }
    }

    fn calculate_metrics(
        timestamps: &[i64],
        equity: &[f64],
        initial: f64,
        max_drawdown: f64,
        max_drawdown_pct: f64,
    ) -> PerformanceMetrics {
        let final_equity = *equity.last().unwrap_or(&initial);
        let total_return = final_equity - initial;
        let total_return_pct = if initial > 0.0 {
            total_return / initial * 100.0
        } else {
            0.0
        };

        let span_ns = (timestamps.last().unwrap_or(&0) - timestamps.first().unwrap_or(&0)) as f64;
        let years = span_ns / NS_PER_YEAR;

        let annualized_return_pct = if years > 0.0 && initial > 0.0 && final_equity > 0.0 {
            ((final_equity / initial).powf(1.0 / years) - 1.0) * 100.0
        } else {
            0.0
        };

        // 单根 K 线收益序列
        let mut returns = Vec::with_capacity(equity.len().saturating_sub(1));
        for window in equity.windows(2) {
            if window[0] != 0.0 {
                returns.push(window[1] / window[0] - 1.0);
            }
        }

        let (volatility, sharpe_ratio) = if returns.len() >= 2 && years > 0.0 {
            let mean = returns.iter().sum::<f64>() / returns.len() as f64;
            let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
                / (returns.len() - 1) as f64;
            let std = variance.sqrt();
            let bars_per_year = returns.len() as f64 / years;
            let vol = std * bars_per_year.sqrt() * 100.0;
            let sharpe = if std > 0.0 {
                mean / std * bars_per_year.sqrt()
            } else {
                0.0
            };
            (vol, sharpe)
        } else {
            (0.0, 0.0)
        };

        PerformanceMetrics {
            total_return,
            total_return_pct,
            annualized_return_pct,
            max_drawdown,
            max_drawdown_pct,
            volatility,
            sharpe_ratio,
            initial_equity: initial,
            final_equity,
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
