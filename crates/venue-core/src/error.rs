//! Error taxonomy shared by every crate that talks to the venue.
//!
//! Variants group by how the rest of the engine must react, not by where the
//! error originated: a 503 from the Data API and a dropped WebSocket frame
//! are both `Transient`, because both are handled the same way (retry with
//! backoff on reads, never on order submission).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Timeout, connection reset, 429, 5xx. Safe to retry on reads.
    #[error("transient error: {0}")]
    Transient(String),

    /// Unexpected schema, missing order id, HTML error page, empty body.
    /// Never retried automatically — surfaced as an order/fetch failure.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Market closed, orderbook missing, order not marketable at any price
    /// the venue will accept. Not a bug; callers treat this as an
    /// informational non-error outcome.
    #[error("venue refused: {0}")]
    VenueRefusal(String),

    /// Cannot initialize on startup (bad key, unreachable venue). The
    /// engine refuses to start rather than run in a half-configured state.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("signing error: {0}")]
    Signing(String),
}

impl Error {
    /// Whether a read (never a write) may be retried after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transient(_) => true,
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429),
            Error::WebSocket(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
