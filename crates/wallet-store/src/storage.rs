//! Persistence interface: tracked wallets, global config, and the
//! append-only executed-position ledger used by the no-repeat filter.
//!
//! `PostgresStorage` backs real deployments; `InMemoryStorage` backs
//! `--dry-run` and every unit test that exercises the policy/coordinator
//! layers without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;
use venue_core::types::order::{ExecutedPositionEntry, OutcomeSide};
use venue_core::types::wallet::{PerWalletPolicy, TrackedWallet};
use venue_core::{Error, GlobalConfig, Result};

#[async_trait]
pub trait Storage: Send + Sync {
    async fn list_wallets(&self) -> Result<Vec<TrackedWallet>>;
    async fn list_active(&self) -> Result<Vec<TrackedWallet>>;
    async fn add_wallet(&self, address: &str) -> Result<TrackedWallet>;
    async fn remove_wallet(&self, address: &str) -> Result<bool>;
    async fn set_active(&self, address: &str, active: bool) -> Result<bool>;
    async fn update_wallet_policy(&self, address: &str, policy: PerWalletPolicy) -> Result<bool>;
    async fn set_label(&self, address: &str, label: Option<String>) -> Result<bool>;

    async fn load_config(&self) -> Result<Option<GlobalConfigDoc>>;
    async fn save_config(&self, cfg: &GlobalConfigDoc) -> Result<()>;

    async fn append_executed_position(
        &self,
        market_id: &str,
        outcome: OutcomeSide,
        source_wallet: &str,
        ts: DateTime<Utc>,
    ) -> Result<()>;

    /// True iff the latest entry for `(marketId, outcome)` is newer than
    /// `now - blockWindow`, or any entry exists when `blockWindow` is zero
    /// (interpreted as "block forever").
    async fn is_position_blocked(
        &self,
        market_id: &str,
        outcome: OutcomeSide,
        block_window: chrono::Duration,
    ) -> Result<bool>;

    /// Removes ledger entries older than `maxKeepHours`, returns the count removed.
    async fn cleanup_expired_positions(&self, max_keep_hours: u32) -> Result<u64>;
}

/// A persisted snapshot of `GlobalConfig`'s tunable fields. Kept separate
/// from `venue_core::GlobalConfig` because the latter also carries
/// process-only fields (credentials) that never belong in a document store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GlobalConfigDoc {
    pub default_trade_size_usd: rust_decimal::Decimal,
    pub poll_interval_ms: u64,
    pub stop_loss_enabled: bool,
    pub stop_loss_max_commitment_percent: rust_decimal::Decimal,
}

// ---------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------

pub struct InMemoryStorage {
    wallets: DashMap<String, TrackedWallet>,
    config: Arc<tokio::sync::RwLock<Option<GlobalConfigDoc>>>,
    ledger: DashMap<(String, String), Vec<ExecutedPositionEntry>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            wallets: DashMap::new(),
            config: Arc::new(tokio::sync::RwLock::new(None)),
            ledger: DashMap::new(),
        }
    }

    fn ledger_key(market_id: &str, outcome: OutcomeSide) -> (String, String) {
        (market_id.to_string(), outcome.to_string())
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn list_wallets(&self) -> Result<Vec<TrackedWallet>> {
        Ok(self.wallets.iter().map(|e| e.value().clone()).collect())
    }

    async fn list_active(&self) -> Result<Vec<TrackedWallet>> {
        Ok(self
            .wallets
            .iter()
            .filter(|e| e.value().active)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn add_wallet(&self, address: &str) -> Result<TrackedWallet> {
        let wallet = TrackedWallet::new(address);
        self.wallets.insert(wallet.address.clone(), wallet.clone());
        Ok(wallet)
    }

    async fn remove_wallet(&self, address: &str) -> Result<bool> {
        Ok(self.wallets.remove(&address.to_lowercase()).is_some())
    }

    async fn set_active(&self, address: &str, active: bool) -> Result<bool> {
        match self.wallets.get_mut(&address.to_lowercase()) {
            Some(mut w) => {
                w.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_wallet_policy(&self, address: &str, policy: PerWalletPolicy) -> Result<bool> {
        match self.wallets.get_mut(&address.to_lowercase()) {
            Some(mut w) => {
                w.policy = policy;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_label(&self, address: &str, label: Option<String>) -> Result<bool> {
        match self.wallets.get_mut(&address.to_lowercase()) {
            Some(mut w) => {
                w.label = label;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn load_config(&self) -> Result<Option<GlobalConfigDoc>> {
        Ok(self.config.read().await.clone())
    }

    async fn save_config(&self, cfg: &GlobalConfigDoc) -> Result<()> {
        *self.config.write().await = Some(cfg.clone());
        Ok(())
    }

    async fn append_executed_position(
        &self,
        market_id: &str,
        outcome: OutcomeSide,
        source_wallet: &str,
        ts: DateTime<Utc>,
    ) -> Result<()> {
        let entry = ExecutedPositionEntry {
            id: Uuid::new_v4(),
            market_id: market_id.to_string(),
            outcome,
            source_wallet: source_wallet.to_string(),
            timestamp: ts,
        };
        self.ledger
            .entry(Self::ledger_key(market_id, outcome))
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn is_position_blocked(
        &self,
        market_id: &str,
        outcome: OutcomeSide,
        block_window: chrono::Duration,
    ) -> Result<bool> {
        let key = Self::ledger_key(market_id, outcome);
        let Some(entries) = self.ledger.get(&key) else {
            return Ok(false);
        };
        if entries.is_empty() {
            return Ok(false);
        }
        if block_window.is_zero() {
            return Ok(true);
        }
        let cutoff = Utc::now() - block_window;
        Ok(entries.iter().any(|e| e.timestamp > cutoff))
    }

    async fn cleanup_expired_positions(&self, max_keep_hours: u32) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::hours(max_keep_hours as i64);
        let mut removed = 0u64;
        for mut entry in self.ledger.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|e| e.timestamp > cutoff);
            removed += (before - entry.value().len()) as u64;
        }
        Ok(removed)
    }
}

// ---------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------

pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_wallet(row: &sqlx::postgres::PgRow) -> Result<TrackedWallet> {
        let policy_json: Value = row.get("policy");
        let policy: PerWalletPolicy = serde_json::from_value(policy_json).map_err(Error::Json)?;
        Ok(TrackedWallet {
            address: row.get("address"),
            label: row.get("label"),
            active: row.get("active"),
            created_at: row.get("created_at"),
            policy,
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn list_wallets(&self) -> Result<Vec<TrackedWallet>> {
        let rows = sqlx::query("SELECT address, label, active, created_at, policy FROM tracked_wallets")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_wallet).collect()
    }

    async fn list_active(&self) -> Result<Vec<TrackedWallet>> {
        let rows = sqlx::query(
            "SELECT address, label, active, created_at, policy FROM tracked_wallets WHERE active = true",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_wallet).collect()
    }

    async fn add_wallet(&self, address: &str) -> Result<TrackedWallet> {
        let wallet = TrackedWallet::new(address);
        let policy_json = serde_json::to_value(&wallet.policy)?;
        sqlx::query(
            r#"
            INSERT INTO tracked_wallets (address, label, active, created_at, policy)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (address) DO UPDATE SET active = EXCLUDED.active
            "#,
        )
        .bind(&wallet.address)
        .bind(&wallet.label)
        .bind(wallet.active)
        .bind(wallet.created_at)
        .bind(policy_json)
        .execute(&self.pool)
        .await?;
        Ok(wallet)
    }

    async fn remove_wallet(&self, address: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tracked_wallets WHERE address = $1")
            .bind(address.to_lowercase())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_active(&self, address: &str, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE tracked_wallets SET active = $2 WHERE address = $1")
            .bind(address.to_lowercase())
            .bind(active)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_wallet_policy(&self, address: &str, policy: PerWalletPolicy) -> Result<bool> {
        let policy_json = serde_json::to_value(&policy)?;
        let result = sqlx::query("UPDATE tracked_wallets SET policy = $2 WHERE address = $1")
            .bind(address.to_lowercase())
            .bind(policy_json)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_label(&self, address: &str, label: Option<String>) -> Result<bool> {
        let result = sqlx::query("UPDATE tracked_wallets SET label = $2 WHERE address = $1")
            .bind(address.to_lowercase())
            .bind(label)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn load_config(&self) -> Result<Option<GlobalConfigDoc>> {
        let row = sqlx::query(
            "SELECT default_trade_size_usd, poll_interval_ms, stop_loss_enabled, stop_loss_max_commitment_percent FROM global_config WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| GlobalConfigDoc {
            default_trade_size_usd: r.get("default_trade_size_usd"),
            poll_interval_ms: r.get::<i64, _>("poll_interval_ms") as u64,
            stop_loss_enabled: r.get("stop_loss_enabled"),
            stop_loss_max_commitment_percent: r.get("stop_loss_max_commitment_percent"),
        }))
    }

    async fn save_config(&self, cfg: &GlobalConfigDoc) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO global_config (id, default_trade_size_usd, poll_interval_ms, stop_loss_enabled, stop_loss_max_commitment_percent)
            VALUES (1, $1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                default_trade_size_usd = EXCLUDED.default_trade_size_usd,
                poll_interval_ms = EXCLUDED.poll_interval_ms,
                stop_loss_enabled = EXCLUDED.stop_loss_enabled,
                stop_loss_max_commitment_percent = EXCLUDED.stop_loss_max_commitment_percent
            "#,
        )
        .bind(cfg.default_trade_size_usd)
        .bind(cfg.poll_interval_ms as i64)
        .bind(cfg.stop_loss_enabled)
        .bind(cfg.stop_loss_max_commitment_percent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_executed_position(
        &self,
        market_id: &str,
        outcome: OutcomeSide,
        source_wallet: &str,
        ts: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO executed_positions (id, market_id, outcome, source_wallet, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(market_id)
        .bind(outcome.to_string())
        .bind(source_wallet)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_position_blocked(
        &self,
        market_id: &str,
        outcome: OutcomeSide,
        block_window: chrono::Duration,
    ) -> Result<bool> {
        if block_window.is_zero() {
            let row = sqlx::query(
                "SELECT 1 FROM executed_positions WHERE market_id = $1 AND outcome = $2 LIMIT 1",
            )
            .bind(market_id)
            .bind(outcome.to_string())
            .fetch_optional(&self.pool)
            .await?;
            return Ok(row.is_some());
        }

        let row = sqlx::query(
            r#"
            SELECT 1 FROM executed_positions
            WHERE market_id = $1 AND outcome = $2 AND timestamp > $3
            LIMIT 1
            "#,
        )
        .bind(market_id)
        .bind(outcome.to_string())
        .bind(Utc::now() - block_window)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn cleanup_expired_positions(&self, max_keep_hours: u32) -> Result<u64> {
        let result = sqlx::query("DELETE FROM executed_positions WHERE timestamp < $1")
            .bind(Utc::now() - chrono::Duration::hours(max_keep_hours as i64))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_list_wallets() {
        let storage = InMemoryStorage::new();
        storage.add_wallet("0xAAA").await.unwrap();
        storage.add_wallet("0xBBB").await.unwrap();

        let wallets = storage.list_wallets().await.unwrap();
        assert_eq!(wallets.len(), 2);
    }

    #[tokio::test]
    async fn test_set_active_and_list_active() {
        let storage = InMemoryStorage::new();
        storage.add_wallet("0xaaa").await.unwrap();
        storage.add_wallet("0xbbb").await.unwrap();
        storage.set_active("0xaaa", false).await.unwrap();

        let active = storage.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].address, "0xbbb");
    }

    #[tokio::test]
    async fn test_position_blocked_forever_when_window_zero() {
        let storage = InMemoryStorage::new();
        assert!(!storage
            .is_position_blocked("m1", OutcomeSide::Yes, chrono::Duration::zero())
            .await
            .unwrap());

        storage
            .append_executed_position("m1", OutcomeSide::Yes, "0xaaa", Utc::now() - chrono::Duration::days(30))
            .await
            .unwrap();

        assert!(storage
            .is_position_blocked("m1", OutcomeSide::Yes, chrono::Duration::zero())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_position_blocked_respects_window() {
        let storage = InMemoryStorage::new();
        storage
            .append_executed_position("m1", OutcomeSide::No, "0xaaa", Utc::now() - chrono::Duration::hours(10))
            .await
            .unwrap();

        assert!(!storage
            .is_position_blocked("m1", OutcomeSide::No, chrono::Duration::hours(5))
            .await
            .unwrap());
        assert!(storage
            .is_position_blocked("m1", OutcomeSide::No, chrono::Duration::hours(24))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_expired_positions() {
        let storage = InMemoryStorage::new();
        storage
            .append_executed_position("m1", OutcomeSide::Yes, "0xaaa", Utc::now() - chrono::Duration::days(10))
            .await
            .unwrap();
        storage
            .append_executed_position("m1", OutcomeSide::Yes, "0xaaa", Utc::now())
            .await
            .unwrap();

        let removed = storage.cleanup_expired_positions(24).await.unwrap();
        assert_eq!(removed, 1);
    }
}
