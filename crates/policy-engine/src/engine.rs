//! Per-trade filter chain. Order is load-bearing: each numbered step maps
//! to a private method, run in sequence with early-return on the first
//! rejection, grounded stylistically in the source lineage's long
//! check/record/return match chain.

use crate::rate_limiter::RateLimiter;
use crate::stop_loss::StopLossGuard;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use venue_core::api::VenueClient;
use venue_core::types::order::{DetectedTrade, OrderSide, TradeOrder};
use venue_core::types::wallet::SideFilter;
use wallet_store::Storage;

#[derive(Debug, Clone)]
pub enum FilterOutcome {
    Accept(TradeOrder),
    Reject(String),
}

pub struct PolicyEngine {
    storage: Arc<dyn Storage>,
    venue: Arc<VenueClient>,
    rate_limiter: RateLimiter,
    stop_loss: StopLossGuard,
    default_trade_size_usd: Decimal,
    operator_address: String,
}

impl PolicyEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        venue: Arc<VenueClient>,
        stop_loss: StopLossGuard,
        default_trade_size_usd: Decimal,
        operator_address: String,
    ) -> Self {
        Self {
            storage,
            venue,
            rate_limiter: RateLimiter::new(),
            stop_loss,
            default_trade_size_usd,
            operator_address,
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Runs the full filter chain against a single detected trade.
    pub async fn evaluate(&self, trade: &DetectedTrade) -> FilterOutcome {
        macro_rules! check {
            ($step:expr) => {
                match $step {
                    FilterOutcome::Accept(_) => {}
                    rejected => return rejected,
                }
            };
        }

        check!(self.check_tracked_wallet(trade).await);
        check!(self.check_schema(trade));
        check!(self.check_side_filter(trade));
        check!(self.check_price_bounds(trade));
        check!(self.check_no_repeat(trade).await);
        check!(self.check_value_filter(trade));
        check!(self.check_rate_limit(trade));
        check!(self.check_schema(trade));

        if let Err(reason) = self.check_stop_loss().await {
            return FilterOutcome::Reject(reason);
        }

        let trade_size_usd = match self.compute_trade_size(trade).await {
            Ok(size) => size,
            Err(reason) => return FilterOutcome::Reject(reason),
        };

        let (shares, limit_price) = match self.check_minimum_order(trade, trade_size_usd).await {
            Ok(pair) => pair,
            Err(reason) => return FilterOutcome::Reject(reason),
        };

        let shares = match self.check_sell_ownership(trade, shares).await {
            Ok(s) => s,
            Err(reason) => return FilterOutcome::Reject(reason),
        };

        info!(
            wallet = %trade.source_wallet,
            market = %trade.market_id,
            side = %trade.side,
            shares = %shares,
            "trade accepted by policy chain"
        );

        FilterOutcome::Accept(TradeOrder {
            market_id: trade.market_id.clone(),
            token_id: trade.asset.clone(),
            outcome: trade.outcome,
            side: trade.side,
            shares,
            price: limit_price,
            slippage_percent: trade.policy_snapshot.slippage_percent,
            tick_size: Decimal::new(1, 2),
            neg_risk: trade.neg_risk,
        })
    }

    // 1. Tracked-wallet check.
    async fn check_tracked_wallet(&self, trade: &DetectedTrade) -> FilterOutcome {
        if trade.source_wallet.eq_ignore_ascii_case(&self.operator_address) {
            return FilterOutcome::Reject("source wallet is the operator's own account".to_string());
        }
        match self.storage.list_active().await {
            Ok(active) => {
                if active.iter().any(|w| w.address == trade.source_wallet) {
                    FilterOutcome::Accept(placeholder_order(trade))
                } else {
                    FilterOutcome::Reject("source wallet is not actively tracked".to_string())
                }
            }
            Err(e) => FilterOutcome::Reject(format!("safety: failed to read tracked wallets: {}", e)),
        }
    }

    // 2 & 8. Schema check.
    fn check_schema(&self, trade: &DetectedTrade) -> FilterOutcome {
        if trade.market_id.is_empty() || trade.market_id == "unknown" {
            return FilterOutcome::Reject("missing or unknown market id".to_string());
        }
        if trade.price <= Decimal::ZERO || trade.price > Decimal::ONE {
            return FilterOutcome::Reject("price out of (0, 1] range".to_string());
        }
        FilterOutcome::Accept(placeholder_order(trade))
    }

    // 3. Side filter.
    fn check_side_filter(&self, trade: &DetectedTrade) -> FilterOutcome {
        match trade.policy_snapshot.side_filter {
            SideFilter::BuyOnly if trade.side == OrderSide::Sell => {
                FilterOutcome::Reject("side filter: buy_only rejects SELL".to_string())
            }
            SideFilter::SellOnly if trade.side == OrderSide::Buy => {
                FilterOutcome::Reject("side filter: sell_only rejects BUY".to_string())
            }
            _ => FilterOutcome::Accept(placeholder_order(trade)),
        }
    }

    // 4. Global price bounds. `effective_price_{min,max}` already clamp to
    // the venue's hard 0.01/0.99 envelope.
    fn check_price_bounds(&self, trade: &DetectedTrade) -> FilterOutcome {
        let floor = trade.policy_snapshot.effective_price_min();
        let ceiling = trade.policy_snapshot.effective_price_max();
        if trade.price < floor {
            return FilterOutcome::Reject(format!("price {} below floor {}", trade.price, floor));
        }
        if trade.price > ceiling {
            return FilterOutcome::Reject(format!("price {} above ceiling {}", trade.price, ceiling));
        }
        FilterOutcome::Accept(placeholder_order(trade))
    }

    // 5. No-repeat, always active with a 5-minute global safety minimum.
    async fn check_no_repeat(&self, trade: &DetectedTrade) -> FilterOutcome {
        let block_window = if trade.policy_snapshot.no_repeat_enabled {
            chrono::Duration::hours(trade.policy_snapshot.no_repeat_period_hours as i64)
        } else {
            chrono::Duration::minutes(5)
        };

        match self
            .storage
            .is_position_blocked(&trade.market_id, trade.outcome, block_window)
            .await
        {
            Ok(true) => FilterOutcome::Reject("no-repeat: recent position already taken in this market/outcome".to_string()),
            Ok(false) => FilterOutcome::Accept(placeholder_order(trade)),
            Err(e) => FilterOutcome::Reject(format!("safety: no-repeat lookup failed: {}", e)),
        }
    }

    // 6. Value filter.
    fn check_value_filter(&self, trade: &DetectedTrade) -> FilterOutcome {
        if !trade.policy_snapshot.value_filter_enabled {
            return FilterOutcome::Accept(placeholder_order(trade));
        }
        let notional = trade.notional();
        if let Some(min) = trade.policy_snapshot.value_filter_min {
            if notional < min {
                return FilterOutcome::Reject(format!("value filter: notional {} below minimum {}", notional, min));
            }
        }
        if let Some(max) = trade.policy_snapshot.value_filter_max {
            if notional > max {
                return FilterOutcome::Reject(format!("value filter: notional {} above maximum {}", notional, max));
            }
        }
        FilterOutcome::Accept(placeholder_order(trade))
    }

    // 7. Rate limit.
    fn check_rate_limit(&self, trade: &DetectedTrade) -> FilterOutcome {
        if !trade.policy_snapshot.rate_limit_enabled {
            return FilterOutcome::Accept(placeholder_order(trade));
        }
        let at_cap = self.rate_limiter.is_at_cap(
            &trade.source_wallet,
            trade.policy_snapshot.rate_limit_per_hour,
            trade.policy_snapshot.rate_limit_per_day,
        );
        if at_cap {
            FilterOutcome::Reject("rate limit: wallet at configured cap".to_string())
        } else {
            FilterOutcome::Accept(placeholder_order(trade))
        }
    }

    // 9. Stop-loss.
    async fn check_stop_loss(&self) -> Result<(), String> {
        match self.stop_loss.is_active(&self.venue.data, &self.operator_address).await {
            Ok(true) => Err("Stop-loss active: commitment threshold reached".to_string()),
            Ok(false) => Ok(()),
            Err(e) => Err(format!("safety: stop-loss balance read failed: {}", e)),
        }
    }

    // 10. Sizing.
    async fn compute_trade_size(&self, trade: &DetectedTrade) -> Result<Decimal, String> {
        use venue_core::types::wallet::SizingMode;

        let policy = &trade.policy_snapshot;
        let computed = match policy.sizing_mode {
            SizingMode::Unset => self.default_trade_size_usd,
            SizingMode::Fixed => {
                let size = policy.fixed_trade_size.unwrap_or(self.default_trade_size_usd);
                if policy.threshold_enabled {
                    let portfolio = self
                        .venue
                        .data
                        .get_portfolio_value(&trade.source_wallet)
                        .await
                        .map_err(|e| format!("safety: threshold portfolio lookup failed: {}", e))?;
                    if portfolio > Decimal::ZERO {
                        let pct = trade.notional() / portfolio * Decimal::new(100, 0);
                        let threshold = policy.threshold_percent.unwrap_or(Decimal::ZERO);
                        if pct < threshold {
                            return Err(format!(
                                "threshold filter: trade is {}% of portfolio, below {}%",
                                pct, threshold
                            ));
                        }
                    }
                }
                size
            }
            SizingMode::Proportional => {
                let fallback = policy.fixed_trade_size.unwrap_or(self.default_trade_size_usd);
                match tokio::try_join!(
                    self.venue.data.get_portfolio_value(&trade.source_wallet),
                    self.venue.data.get_usdc_balance(&self.operator_address)
                ) {
                    Ok((source_portfolio, operator_usdc)) if source_portfolio > Decimal::ZERO => {
                        let pct = trade.notional() / source_portfolio * Decimal::new(100, 0);
                        pct / Decimal::new(100, 0) * operator_usdc
                    }
                    _ => fallback,
                }
            }
        };

        // Safety cap: catches arithmetic/unit bugs regardless of sizing mode.
        let cap = match policy.sizing_mode {
            SizingMode::Proportional => (Decimal::new(2, 0) * computed).max(Decimal::new(500, 0)),
            _ => Decimal::new(2, 0) * computed,
        };
        if computed > cap {
            return Err(format!("sizing safety cap: computed ${} exceeds cap ${}", computed, cap));
        }

        Ok(computed)
    }

    // 11. Minimum-order check.
    async fn check_minimum_order(
        &self,
        trade: &DetectedTrade,
        trade_size_usd: Decimal,
    ) -> Result<(Decimal, Decimal), String> {
        let limit_price = slippage_adjusted_limit(trade.side, trade.price, trade.policy_snapshot.slippage_percent);
        let shares = (trade_size_usd / limit_price).round_dp(2);

        let min_shares = self
            .venue
            .clob
            .get_min_order_size(&trade.asset)
            .await
            .unwrap_or(Decimal::new(5, 0));

        if shares < min_shares {
            return Err(format!(
                "minimum order: need at least {} shares (${:.2})",
                min_shares,
                min_shares * limit_price
            ));
        }

        Ok((shares, limit_price))
    }

    // 12. SELL ownership.
    async fn check_sell_ownership(&self, trade: &DetectedTrade, requested: Decimal) -> Result<Decimal, String> {
        if trade.side != OrderSide::Sell {
            return Ok(requested);
        }

        let address = self
            .venue
            .data
            .get_proxy_wallet(&self.operator_address)
            .await
            .unwrap_or(None)
            .unwrap_or_else(|| self.operator_address.clone());

        let positions = self
            .venue
            .data
            .get_user_positions(&address)
            .await
            .map_err(|e| format!("safety: position ownership lookup failed: {}", e))?;

        let owned: Decimal = positions
            .iter()
            .filter(|p| p.condition_id == trade.market_id)
            .map(|p| p.size)
            .sum();

        if owned <= Decimal::ZERO {
            return Err("SELL rejected: operator holds none of this token".to_string());
        }

        Ok(requested.min(owned))
    }
}

fn slippage_adjusted_limit(side: OrderSide, price: Decimal, slippage_percent: Decimal) -> Decimal {
    let adjustment = slippage_percent / Decimal::new(100, 0);
    let limit = match side {
        OrderSide::Buy => (price * (Decimal::ONE + adjustment)).min(Decimal::new(99, 2)),
        OrderSide::Sell => (price * (Decimal::ONE - adjustment)).max(Decimal::new(1, 2)),
    };
    limit.round_dp(2)
}

/// Intermediate steps only need to signal accept/reject, not build the
/// final order (that happens once, after sizing); this fills the `Accept`
/// slot cheaply without re-deriving fields the caller doesn't use yet.
fn placeholder_order(trade: &DetectedTrade) -> TradeOrder {
    TradeOrder {
        market_id: trade.market_id.clone(),
        token_id: trade.asset.clone(),
        outcome: trade.outcome,
        side: trade.side,
        shares: Decimal::ZERO,
        price: trade.price,
        slippage_percent: trade.policy_snapshot.slippage_percent,
        tick_size: Decimal::new(1, 2),
        neg_risk: trade.neg_risk,
    }
}
