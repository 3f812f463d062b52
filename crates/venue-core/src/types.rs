//! Core domain types shared across the copy-trading engine.

pub mod market;
pub mod order;
pub mod wallet;

pub use market::*;
pub use order::*;
pub use wallet::*;
