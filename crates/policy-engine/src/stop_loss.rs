//! Global commitment-based stop-loss. Unlike a per-position stop, this
//! rejects *new* trades outright once the operator's open-position value
//! crosses a configured share of total account value — there is nothing
//! to "activate" or "trail" because there is no per-position rule to track.

use rust_decimal::Decimal;
use tracing::warn;
use venue_core::api::DataApiClient;

#[derive(Debug, Clone)]
pub struct StopLossConfig {
    pub enabled: bool,
    pub max_commitment_percent: Decimal,
}

pub struct StopLossGuard {
    config: StopLossConfig,
}

impl StopLossGuard {
    pub fn new(config: StopLossConfig) -> Self {
        Self { config }
    }

    /// `Ok(true)` if the stop-loss should block new trades right now.
    /// Any read failure is treated as "active" by the caller (fail-closed);
    /// this method surfaces the error rather than hiding it.
    pub async fn is_active(&self, data: &DataApiClient, operator_address: &str) -> venue_core::Result<bool> {
        if !self.config.enabled {
            return Ok(false);
        }

        let (usdc, positions_value) = tokio::try_join!(
            data.get_usdc_balance(operator_address),
            data.get_positions_value(operator_address)
        )?;

        let total = usdc + positions_value;
        if total <= Decimal::ZERO {
            return Ok(false);
        }

        let commitment_percent = positions_value / total * Decimal::new(100, 0);
        let active = commitment_percent >= self.config.max_commitment_percent;
        if active {
            warn!(
                %commitment_percent,
                max = %self.config.max_commitment_percent,
                "stop-loss active: commitment threshold reached"
            );
        }
        Ok(active)
    }
}
