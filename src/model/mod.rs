pub mod market_state;
pub mod order;
pub mod types;

pub use market_state::*;
pub use order::*;
pub use types::{MarginMode, OrderSide, OrderStatus, OrderType};
