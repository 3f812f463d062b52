//! Per-trade filter chain, per-wallet rate limiting, and the global
//! commitment-based stop-loss.

pub mod engine;
pub mod rate_limiter;
pub mod stop_loss;

pub use engine::{FilterOutcome, PolicyEngine};
pub use rate_limiter::RateLimiter;
pub use stop_loss::{StopLossConfig, StopLossGuard};
