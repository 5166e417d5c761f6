//! Viewer panel surface: the purchasable alert grid.
//!
//! Glues the host callback stream to the pieces that own state: the first
//! `Authorized` event installs the session and pulls the public catalog, the
//! bits flag and transaction outcomes are routed to the redemption
//! controller, previews to the preview controller. The rendering shell polls
//! the accessors after each handled event.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use crate::catalog::{Catalog, SoundCatalogItem, Tier};
use crate::ebs::EbsClient;
use crate::host::{BitsErr, BitsProduct, BitsSdk, HostEvent};
use crate::preview::{AudioFactory, PreviewController, PreviewErr};
use crate::redeem::{RedeemErr, RedemptionController};
use crate::session::SessionCell;

pub struct ViewerPanel {
    session: SessionCell,
    ebs: EbsClient,
    catalog: Option<Catalog>,
    channel_id: Option<String>,
    redemption: Option<RedemptionController>,
    preview: PreviewController,
    products: Vec<BitsProduct>,
}

impl ViewerPanel {
    pub fn new(ebs_base_url: impl Into<String>, audio: Box<dyn AudioFactory>) -> Self {
        let session = SessionCell::new();
        let ebs = EbsClient::new(ebs_base_url, session.clone());

        Self {
            session,
            ebs,
            catalog: None,
            channel_id: None,
            redemption: None,
            preview: PreviewController::new(audio),
            products: Vec::new(),
        }
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn session(&self) -> &SessionCell {
        &self.session
    }

    fn board_enabled(&self) -> bool {
        self.catalog.as_ref().is_some_and(|c| c.settings.enabled)
    }

    /// Whether a card should render its buy button enabled right now.
    pub fn is_purchasable(&self, now: DateTime<Utc>, item: &SoundCatalogItem) -> bool {
        self.board_enabled()
            && self
                .redemption
                .as_ref()
                .is_some_and(|r| r.is_purchasable(now, item))
    }

    /// Fetches the host's bits product list so each card can show its price.
    pub async fn load_products(&mut self, sdk: &dyn BitsSdk) -> ViewerResult<()> {
        self.products = sdk.products().await?;
        Ok(())
    }

    pub fn cost_of(&self, tier: &Tier) -> Option<u64> {
        self.products.iter().find(|p| p.sku == tier.0).map(|p| p.cost)
    }

    pub fn last_played(&self, now: DateTime<Utc>) -> Option<&str> {
        self.redemption.as_ref().and_then(|r| r.last_played(now))
    }

    /// Routes one host callback. Auth installs the session and (re)loads the
    /// catalog; everything else lands on the redemption controller. Events
    /// arriving before authorization are dropped — there is nothing to apply
    /// them to yet.
    #[instrument(skip(self, event))]
    pub async fn handle_event(&mut self, event: HostEvent, now: DateTime<Utc>) {
        match event {
            HostEvent::Authorized {
                token,
                channel_id,
                user_id,
            } => {
                self.session.authorize(token, channel_id.clone(), user_id);

                // cooldown state survives a plain token refresh
                if self.channel_id.as_deref() != Some(channel_id.as_str()) {
                    self.redemption = Some(RedemptionController::new(channel_id.clone()));
                    self.channel_id = Some(channel_id.clone());
                }

                match self.ebs.fetch_public(&channel_id).await {
                    Ok(catalog) => self.catalog = Some(catalog),
                    Err(e) => {
                        tracing::error!(error = ?e, "catalog load failed");
                    }
                }
            }

            HostEvent::BitsEnabledChanged(enabled) => {
                if let Some(redemption) = &mut self.redemption {
                    redemption.set_bits_enabled(enabled);
                }
            }

            HostEvent::TransactionComplete {
                transaction_id,
                receipt,
            } => {
                if let Some(redemption) = &mut self.redemption {
                    redemption
                        .complete(&transaction_id, &receipt, now, &self.ebs)
                        .await;
                }
            }

            HostEvent::TransactionCancelled { transaction_id } => {
                if let Some(redemption) = &mut self.redemption {
                    redemption.cancel(&transaction_id);
                }
            }
        }
    }

    /// Click handler for a card's buy button. The whole board being switched
    /// off gates purchasing the same way a disabled card does.
    pub async fn purchase(
        &mut self,
        item: &SoundCatalogItem,
        now: DateTime<Utc>,
        sdk: &dyn BitsSdk,
    ) -> ViewerResult<()> {
        if self.redemption.is_none() {
            return Err(ViewerErr::NotReady);
        }

        if !self.board_enabled() {
            return Err(ViewerErr::BoardDisabled);
        }

        let redemption = self.redemption.as_mut().ok_or(ViewerErr::NotReady)?;
        Ok(redemption.begin_purchase(item, now, sdk).await?)
    }

    /// Click handler for a card's preview control.
    pub async fn toggle_preview(&mut self, item: &SoundCatalogItem) -> ViewerResult<()> {
        if self.preview.toggle_stop(&item.id) {
            return Ok(());
        }

        Ok(self.preview.start(item, &self.ebs).await?)
    }
}

pub type ViewerResult<T> = core::result::Result<T, ViewerErr>;

#[derive(Debug, Error)]
pub enum ViewerErr {
    #[error("not authorized yet")]
    NotReady,

    #[error("the alert board is disabled")]
    BoardDisabled,

    #[error(transparent)]
    Bits(#[from] BitsErr),

    #[error(transparent)]
    Redeem(#[from] RedeemErr),

    #[error(transparent)]
    Preview(#[from] PreviewErr),
}
