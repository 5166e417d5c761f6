//! Pre-purchase audio preview.
//!
//! The embedding sandbox only allows playback that it can trace back to a
//! user gesture, so the playback handle has to exist *before* anything is
//! awaited: [`PreviewController::start`] creates it synchronously through
//! the [`AudioFactory`] inside the click handler, then feeds it the fetched
//! blob once the EBS responds. Creating the handle after the fetch resolves
//! silently produces no sound in a sandboxed iframe.

use thiserror::Error;
use tracing::instrument;

use crate::catalog::{AlertKind, SoundCatalogItem};
use crate::ebs::{EbsClient, EbsErr};

/// One playback resource. Dropping it must release the underlying handle
/// (object URL, audio element, decoder — whatever the shell uses).
pub trait AudioHandle: Send {
    /// Hands the fetched blob to the handle and starts playback.
    fn attach(&mut self, blob: Vec<u8>);

    fn stop(&mut self);
}

/// Creates playback handles synchronously. Must be callable from inside a
/// user-interaction handler without awaiting.
pub trait AudioFactory: Send {
    fn create(&self) -> Box<dyn AudioHandle>;
}

/// Owns the single active preview. Starting a new one (or re-clicking the
/// current one) stops and drops whatever was playing.
pub struct PreviewController {
    factory: Box<dyn AudioFactory>,
    active: Option<(String, Box<dyn AudioHandle>)>,
}

impl PreviewController {
    pub fn new(factory: Box<dyn AudioFactory>) -> Self {
        Self {
            factory,
            active: None,
        }
    }

    pub fn playing(&self) -> Option<&str> {
        self.active.as_ref().map(|(id, _)| id.as_str())
    }

    /// Starts a preview for `item`, replacing any active one.
    ///
    /// Clip alerts have no previewable audio. A failed fetch drops the fresh
    /// handle silently and leaves nothing playing.
    #[instrument(skip(self, ebs, item), fields(sound_id = item.id))]
    pub async fn start(&mut self, item: &SoundCatalogItem, ebs: &EbsClient) -> PreviewResult<()> {
        if item.kind == AlertKind::Clip {
            return Err(PreviewErr::NotPreviewable);
        }

        self.stop();

        // handle must exist before the first await — see module docs
        let mut handle = self.factory.create();

        match ebs.preview(&item.id).await {
            Ok(blob) => {
                handle.attach(blob);
                self.active = Some((item.id.clone(), handle));
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = ?e, "preview fetch failed");
                Err(PreviewErr::Fetch(e))
            }
        }
    }

    /// Re-click semantics: stop if this item is the one playing, otherwise
    /// report whether the caller should start it instead.
    pub fn toggle_stop(&mut self, id: &str) -> bool {
        if self.playing() == Some(id) {
            self.stop();
            true
        } else {
            false
        }
    }

    pub fn stop(&mut self) {
        if let Some((id, mut handle)) = self.active.take() {
            tracing::debug!(sound_id = id, "stopping active preview");
            handle.stop();
        }
    }
}

pub type PreviewResult<T> = core::result::Result<T, PreviewErr>;

#[derive(Debug, Error)]
pub enum PreviewErr {
    #[error("clip alerts cannot be previewed")]
    NotPreviewable,

    #[error(transparent)]
    Fetch(#[from] EbsErr),
}
