use thiserror::Error;

/// 回测引擎错误类型
#[derive(Error, Debug)]
pub enum QuantBtError {
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Strategy error: {0}")]
    StrategyError(String),

    #[error("Matching error: {0}")]
    MatchingError(String),

    #[error("Backtest aborted")]
    Aborted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, QuantBtError>;
