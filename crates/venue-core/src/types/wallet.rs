//! Tracked wallets and their per-wallet trading policy.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How trade size is computed for a tracked wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SizingMode {
    /// Use the global default size, no threshold filtering.
    #[default]
    Unset,
    Fixed,
    Proportional,
}

/// Restrict which side of a trade is copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SideFilter {
    #[default]
    All,
    BuyOnly,
    SellOnly,
}

/// Per-wallet overrides of the global trading policy. Every field is
/// optional; `None` means "inherit the global default / do not filter".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerWalletPolicy {
    pub sizing_mode: SizingMode,
    pub fixed_trade_size: Option<Decimal>,
    pub threshold_enabled: bool,
    pub threshold_percent: Option<Decimal>,
    pub side_filter: SideFilter,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub value_filter_enabled: bool,
    pub value_filter_min: Option<Decimal>,
    pub value_filter_max: Option<Decimal>,
    pub no_repeat_enabled: bool,
    /// 0 means "forever".
    pub no_repeat_period_hours: u32,
    pub rate_limit_enabled: bool,
    pub rate_limit_per_hour: Option<u32>,
    pub rate_limit_per_day: Option<u32>,
    pub slippage_percent: Decimal,
}

impl Default for PerWalletPolicy {
    fn default() -> Self {
        Self {
            sizing_mode: SizingMode::Unset,
            fixed_trade_size: None,
            threshold_enabled: false,
            threshold_percent: None,
            side_filter: SideFilter::All,
            price_min: None,
            price_max: None,
            value_filter_enabled: false,
            value_filter_min: None,
            value_filter_max: None,
            no_repeat_enabled: false,
            no_repeat_period_hours: 0,
            rate_limit_enabled: false,
            rate_limit_per_hour: None,
            rate_limit_per_day: None,
            slippage_percent: Decimal::new(2, 0),
        }
    }
}

impl PerWalletPolicy {
    /// Effective lower price bound, clamped to the venue's hard envelope.
    pub fn effective_price_min(&self) -> Decimal {
        self.price_min
            .unwrap_or(Decimal::new(1, 2))
            .max(Decimal::new(1, 2))
    }

    /// Effective upper price bound, clamped to the venue's hard envelope.
    pub fn effective_price_max(&self) -> Decimal {
        self.price_max
            .unwrap_or(Decimal::new(99, 2))
            .min(Decimal::new(99, 2))
    }
}

/// A wallet whose trades are copied, together with its policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedWallet {
    /// 20-byte account address, stored lowercase.
    pub address: String,
    pub label: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub policy: PerWalletPolicy,
}

impl TrackedWallet {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into().to_lowercase(),
            label: None,
            active: true,
            created_at: Utc::now(),
            policy: PerWalletPolicy::default(),
        }
    }
}
