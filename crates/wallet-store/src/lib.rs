//! Persistence and trade discovery for the copy-trading engine: tracked
//! wallets, the executed-position ledger, and the Data API poller that
//! turns a wallet's trade history into a stream of `DetectedTrade`s.

pub mod poller;
pub mod storage;

pub use poller::{Poller, PollerConfig, PolicyLookup};
pub use storage::{GlobalConfigDoc, InMemoryStorage, PostgresStorage, Storage};
