//! Domain types for evotrade

pub mod bar;
pub mod decision;

pub use bar::{Bar, PriceWindow, WindowError};
pub use decision::{DecisionStream, TradeDecision};
