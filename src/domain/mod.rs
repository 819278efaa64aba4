//! Core domain types and logic.

pub mod price;
pub mod pair;
pub mod hedge;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod numeric;
pub mod config_validation;
pub mod error;
