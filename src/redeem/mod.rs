//! Redemption flow controller.
//!
//! A redemption crosses three parties: the viewer's click, the host's bits
//! dialog, and the EBS confirmation. The controller owns the single
//! in-flight transaction slot — a second purchase attempt while one is
//! outstanding is rejected as busy rather than silently replacing the first,
//! so a late host callback can never pair a receipt with the wrong item.

pub mod cooldown;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::instrument;

use crate::catalog::{SoundCatalogItem, Tier};
use crate::constants::{DEFAULT_COOLDOWN_MS, LAST_PLAYED_MS};
use crate::ebs::{EbsClient, EbsErr};
use crate::host::{BitsErr, BitsSdk};
use cooldown::CooldownMap;

/// A purchase between the host dialog opening and its outcome callback.
/// At most one exists per client.
#[derive(Debug, Clone)]
pub struct PendingRedemption {
    pub transaction_id: String,
    pub sound_id: String,
    pub tier: Tier,
    pub name: String,
    pub cooldown_ms: u64,
}

#[derive(Debug)]
pub struct RedemptionController {
    channel_id: String,
    bits_enabled: bool,
    pending: Option<PendingRedemption>,
    cooldowns: CooldownMap,
    last_played: Option<(String, DateTime<Utc>)>,
}

impl RedemptionController {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            bits_enabled: true,
            pending: None,
            cooldowns: CooldownMap::new(),
            last_played: None,
        }
    }

    /// Host feature-flag callback. Disabling bits degrades purchasing to a
    /// no-op rather than erroring anywhere else.
    pub fn set_bits_enabled(&mut self, enabled: bool) {
        self.bits_enabled = enabled;
    }

    pub fn pending(&self) -> Option<&PendingRedemption> {
        self.pending.as_ref()
    }

    /// Whether a card should render as purchasable right now.
    pub fn is_purchasable(&self, now: DateTime<Utc>, item: &SoundCatalogItem) -> bool {
        self.bits_enabled
            && item.enabled
            && self.pending.is_none()
            && !self.cooldowns.is_active(now, &item.id)
    }

    pub fn is_on_cooldown(&self, now: DateTime<Utc>, id: &str) -> bool {
        self.cooldowns.is_active(now, id)
    }

    /// The transient "now playing" label, or `None` once its 3s window has
    /// lapsed. Lazy expiry, same as cooldowns.
    pub fn last_played(&self, now: DateTime<Utc>) -> Option<&str> {
        match &self.last_played {
            Some((name, expires_at)) if now < *expires_at => Some(name),
            _ => None,
        }
    }

    /// Opens the host purchase dialog for an item and claims the pending
    /// slot with the returned transaction id.
    #[instrument(skip(self, sdk, item), fields(sound_id = item.id))]
    pub async fn begin_purchase(
        &mut self,
        item: &SoundCatalogItem,
        now: DateTime<Utc>,
        sdk: &dyn BitsSdk,
    ) -> RedeemResult<()> {
        if !self.bits_enabled {
            return Err(RedeemErr::BitsDisabled);
        }

        if !item.enabled {
            return Err(RedeemErr::ItemDisabled);
        }

        if self.pending.is_some() {
            return Err(RedeemErr::Busy);
        }

        if self.cooldowns.is_active(now, &item.id) {
            return Err(RedeemErr::OnCooldown);
        }

        let transaction_id = sdk.request_purchase(&item.tier).await?;
        tracing::debug!(transaction_id, "purchase dialog opened");

        self.pending = Some(PendingRedemption {
            transaction_id,
            sound_id: item.id.clone(),
            tier: item.tier.clone(),
            name: item.name.clone(),
            cooldown_ms: item.cooldown_ms.unwrap_or(DEFAULT_COOLDOWN_MS),
        });

        Ok(())
    }

    /// Host completion callback: pair the receipt with the pending item and
    /// confirm with the EBS.
    ///
    /// The pending slot is consumed on every path. EBS failure is silent by
    /// design — no cooldown, no label, no retry; the viewer may just click
    /// again.
    #[instrument(skip(self, ebs, receipt))]
    pub async fn complete(
        &mut self,
        transaction_id: &str,
        receipt: &str,
        now: DateTime<Utc>,
        ebs: &EbsClient,
    ) {
        let Some(pending) = self.pending.take_if(|p| p.transaction_id == transaction_id) else {
            tracing::warn!(transaction_id, "completion for unknown transaction, ignoring");
            return;
        };

        match ebs
            .redeem(receipt, &pending.sound_id, &self.channel_id)
            .await
        {
            Ok(()) => {
                self.cooldowns
                    .apply(&pending.sound_id, now, pending.cooldown_ms);
                self.last_played = Some((
                    pending.name,
                    now + Duration::milliseconds(LAST_PLAYED_MS as i64),
                ));
            }
            Err(e) => {
                tracing::error!(error = ?e, sound_id = pending.sound_id, "redemption confirmation failed");
            }
        }
    }

    /// Host cancellation callback: release the slot, nothing else happens.
    #[instrument(skip(self))]
    pub fn cancel(&mut self, transaction_id: &str) {
        if self.pending.take_if(|p| p.transaction_id == transaction_id).is_none() {
            tracing::warn!(transaction_id, "cancellation for unknown transaction, ignoring");
        }
    }
}

pub type RedeemResult<T> = core::result::Result<T, RedeemErr>;

#[derive(Debug, Error)]
pub enum RedeemErr {
    #[error("a purchase is already in flight")]
    Busy,

    #[error("this alert is still on cooldown")]
    OnCooldown,

    #[error("this alert is disabled")]
    ItemDisabled,

    #[error("bits are not available")]
    BitsDisabled,

    #[error(transparent)]
    Bits(#[from] BitsErr),

    #[error(transparent)]
    Ebs(#[from] EbsErr),
}
