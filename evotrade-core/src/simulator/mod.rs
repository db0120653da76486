//! Trade simulator — account bookkeeping and the tradebot that drives it.

pub mod account;
pub mod tradebot;

pub use account::Account;
pub use tradebot::{verify_history, TradeLimits, TradeRun, Tradebot};
