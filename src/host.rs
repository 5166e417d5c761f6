//! Seam for the host-provided extension SDK.
//!
//! The real SDK lives in the embedding page and is opaque to us; what the
//! core consumes is (a) its callbacks, flattened into [`HostEvent`]s, and
//! (b) the bits purchase surface behind the [`BitsSdk`] trait so the
//! redemption controller can be driven by a mock in tests. One handler is
//! registered per callback type and no delivery ordering is assumed across
//! distinct event types.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::catalog::Tier;

/// Host SDK callbacks, in the order the host fires them (per type).
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// `onAuthorized` — fires at least once, again on token refresh.
    Authorized {
        token: String,
        channel_id: String,
        user_id: Option<String>,
    },

    /// Bits feature flag flipped for this viewer/channel.
    BitsEnabledChanged(bool),

    /// A purchase started earlier resolved with a receipt.
    TransactionComplete {
        transaction_id: String,
        receipt: String,
    },

    /// The viewer backed out of the purchase dialog.
    TransactionCancelled { transaction_id: String },
}

/// One purchasable bits product, as reported by the host's product list.
#[derive(Debug, Clone, Deserialize)]
pub struct BitsProduct {
    pub sku: String,
    pub cost: u64,
}

/// The host's bits purchase surface.
///
/// `request_purchase` only *starts* a transaction; the outcome arrives later
/// as a [`HostEvent::TransactionComplete`] or
/// [`HostEvent::TransactionCancelled`] carrying the returned id.
#[async_trait]
pub trait BitsSdk: Send + Sync {
    async fn products(&self) -> BitsResult<Vec<BitsProduct>>;

    async fn request_purchase(&self, sku: &Tier) -> BitsResult<String>;
}

pub type BitsResult<T> = core::result::Result<T, BitsErr>;

#[derive(Debug, Error)]
pub enum BitsErr {
    #[error("bits are not available for this viewer")]
    Unavailable,

    #[error("host sdk rejected the request: {0}")]
    Rejected(String),
}
