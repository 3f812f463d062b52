//! Order execution: turns a policy-accepted `TradeOrder` into a signed,
//! submitted order and classifies the venue's response.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use venue_core::api::{PlaceOrderOutcome, VenueClient};
use venue_core::types::order::{OrderOutcomeKind, TradeOrder, TradeResult};

/// `false` runs every accepted trade through the same sizing/slippage math
/// without calling `VenueClient::place_order` — the `--dry-run` branch.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    pub live_trading: bool,
}

pub struct Executor {
    venue: Arc<VenueClient>,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(venue: Arc<VenueClient>, config: ExecutorConfig) -> Self {
        Self { venue, config }
    }

    pub async fn execute(&self, order: &TradeOrder) -> TradeResult {
        let start = Instant::now();

        if !self.config.live_trading {
            info!(
                market = %order.market_id,
                side = %order.side,
                shares = %order.shares,
                price = %order.price,
                "[dry-run] would submit order"
            );
            return TradeResult::executed("dry-run".to_string(), elapsed_ms(start));
        }

        info!(
            market = %order.market_id,
            side = %order.side,
            shares = %order.shares,
            price = %order.price,
            "submitting order"
        );

        match self.venue.clob.place_order(order, order.price).await {
            Ok(PlaceOrderOutcome::Executed { order_id }) => {
                TradeResult::executed(order_id, elapsed_ms(start))
            }
            Ok(PlaceOrderOutcome::MarketClosed) => TradeResult::market_closed(elapsed_ms(start)),
            Ok(PlaceOrderOutcome::Failed(reason)) => {
                warn!(market = %order.market_id, reason = %reason, "order failed");
                TradeResult::failed(reason, elapsed_ms(start))
            }
            Err(e) => {
                warn!(market = %order.market_id, error = %e, "order submission errored");
                TradeResult::failed(e.to_string(), elapsed_ms(start))
            }
        }
    }

    pub fn status_kind(result: &TradeResult) -> OrderOutcomeKind {
        result.status
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Slippage-adjusted limit price; kept here (not only in policy-engine)
/// since the Executor is the last place allowed to touch pricing before
/// submission — policy-engine computes the same value when it builds the
/// `TradeOrder`, this just re-documents the invariant at the call site.
pub fn slippage_adjusted_limit(side: venue_core::types::order::OrderSide, price: Decimal, slippage_percent: Decimal) -> Decimal {
    use venue_core::types::order::OrderSide;
    let adjustment = slippage_percent / Decimal::new(100, 0);
    let limit = match side {
        OrderSide::Buy => (price * (Decimal::ONE + adjustment)).min(Decimal::new(99, 2)),
        OrderSide::Sell => (price * (Decimal::ONE - adjustment)).max(Decimal::new(1, 2)),
    };
    limit.round_dp(2)
}
