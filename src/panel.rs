//! Broadcaster configuration panel controller.
//!
//! Pure confirm-then-reload: every mutation is one authenticated EBS call,
//! followed on success by a full catalog refetch (no optimistic local edits)
//! and a transient success banner. Failures surface the EBS error string and
//! leave the held catalog untouched. Oversized files are rejected here,
//! before a request is spent on them.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::instrument;

use crate::catalog::{Catalog, Tier};
use crate::constants::{BANNER_MS, MAX_IMAGE_BYTES, MAX_SOUND_BYTES, MAX_VIDEO_BYTES};
use crate::ebs::{EbsClient, EbsErr, SettingsPatch, SoundPatch};

#[derive(Debug, Clone)]
pub struct Banner {
    pub message: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub tier: Tier,
    pub volume: f32,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct PanelController {
    ebs: EbsClient,
    catalog: Option<Catalog>,
    banner: Option<Banner>,
    error: Option<String>,
    loading: bool,
}

impl PanelController {
    pub fn new(ebs: EbsClient) -> Self {
        Self {
            ebs,
            catalog: None,
            banner: None,
            error: None,
            loading: false,
        }
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The success banner, or `None` once its window has lapsed.
    pub fn banner(&self, now: DateTime<Utc>) -> Option<&str> {
        match &self.banner {
            Some(banner) if now < banner.expires_at => Some(&banner.message),
            _ => None,
        }
    }

    /// Initial load (and post-mutation reload) of the broadcaster catalog.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> PanelResult<()> {
        self.loading = true;
        match self.ebs.fetch_catalog().await {
            Ok(catalog) => {
                self.catalog = Some(catalog);
                self.loading = false;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    #[instrument(skip(self, upload), fields(name = upload.name, file_len = upload.bytes.len()))]
    pub async fn upload_sound(&mut self, upload: FileUpload, now: DateTime<Utc>) -> PanelResult<()> {
        if upload.bytes.is_empty() {
            return Err(self.invalid("select a sound file first"));
        }

        if upload.bytes.len() > MAX_SOUND_BYTES {
            return Err(self.invalid("sound files must be 1MB or smaller"));
        }

        self.loading = true;
        let result = self
            .ebs
            .upload_sound(
                &upload.name,
                &upload.tier,
                upload.volume,
                &upload.file_name,
                upload.bytes,
            )
            .await;

        self.finish(result.map(|_| "sound uploaded"), now).await
    }

    #[instrument(skip(self))]
    pub async fn create_clip_alert(
        &mut self,
        name: &str,
        clip_url: &str,
        tier: &Tier,
        volume: f32,
        now: DateTime<Utc>,
    ) -> PanelResult<()> {
        if clip_url.trim().is_empty() {
            return Err(self.invalid("a clip URL is required"));
        }

        self.loading = true;
        let result = self.ebs.create_clip_alert(name, clip_url, tier, volume).await;

        self.finish(result.map(|_| "clip alert created"), now).await
    }

    #[instrument(skip(self, upload), fields(name = upload.name, file_len = upload.bytes.len()))]
    pub async fn upload_video(&mut self, upload: FileUpload, now: DateTime<Utc>) -> PanelResult<()> {
        if upload.bytes.is_empty() {
            return Err(self.invalid("select a video file first"));
        }

        if upload.bytes.len() > MAX_VIDEO_BYTES {
            return Err(self.invalid("video files must be 10MB or smaller"));
        }

        self.loading = true;
        let result = self
            .ebs
            .upload_video(
                &upload.name,
                &upload.tier,
                upload.volume,
                &upload.file_name,
                upload.bytes,
            )
            .await;

        self.finish(result.map(|_| "video uploaded"), now).await
    }

    #[instrument(skip(self, patch))]
    pub async fn update_item(
        &mut self,
        id: &str,
        patch: SoundPatch,
        now: DateTime<Utc>,
    ) -> PanelResult<()> {
        self.loading = true;
        let result = self.ebs.update_sound(id, &patch).await;

        self.finish(result.map(|_| "alert updated"), now).await
    }

    /// Convenience wrapper for the per-item enable toggle.
    pub async fn set_item_enabled(
        &mut self,
        id: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> PanelResult<()> {
        let patch = SoundPatch {
            enabled: Some(enabled),
            ..SoundPatch::default()
        };

        self.update_item(id, patch, now).await
    }

    #[instrument(skip(self))]
    pub async fn delete_item(&mut self, id: &str, now: DateTime<Utc>) -> PanelResult<()> {
        self.loading = true;
        let result = self.ebs.delete_sound(id).await;

        self.finish(result.map(|_| "alert deleted"), now).await
    }

    #[instrument(skip(self, image_bytes), fields(image_len = image_bytes.len()))]
    pub async fn upload_image(
        &mut self,
        id: &str,
        file_name: &str,
        image_bytes: Vec<u8>,
        now: DateTime<Utc>,
    ) -> PanelResult<()> {
        // unlike the other limits this one used to be dropped on the floor
        // with no feedback; it errors like the rest now
        if image_bytes.len() > MAX_IMAGE_BYTES {
            return Err(self.invalid("images must be 256KB or smaller"));
        }

        self.loading = true;
        let result = self.ebs.upload_image(id, file_name, image_bytes).await;

        self.finish(result.map(|_| "image attached"), now).await
    }

    #[instrument(skip(self))]
    pub async fn delete_image(&mut self, id: &str, now: DateTime<Utc>) -> PanelResult<()> {
        self.loading = true;
        let result = self.ebs.delete_image(id).await;

        self.finish(result.map(|_| "image removed"), now).await
    }

    #[instrument(skip(self))]
    pub async fn set_board_enabled(&mut self, enabled: bool, now: DateTime<Utc>) -> PanelResult<()> {
        self.loading = true;
        let result = self
            .ebs
            .patch_settings(&SettingsPatch {
                enabled: Some(enabled),
            })
            .await;

        self.finish(result.map(|_| "settings saved"), now).await
    }

    #[instrument(skip(self))]
    pub async fn overlay_url(&mut self) -> PanelResult<String> {
        match self.ebs.overlay_url().await {
            Ok(url) => Ok(url),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Shared tail of every mutation: reload the catalog and raise the
    /// banner on success, surface the error string otherwise.
    async fn finish(
        &mut self,
        result: Result<&'static str, EbsErr>,
        now: DateTime<Utc>,
    ) -> PanelResult<()> {
        let message = match result {
            Ok(message) => message,
            Err(e) => return Err(self.fail(e)),
        };

        match self.ebs.fetch_catalog().await {
            Ok(catalog) => {
                self.catalog = Some(catalog);
                self.loading = false;
                self.error = None;
                self.banner = Some(Banner {
                    message: message.to_string(),
                    expires_at: now + Duration::milliseconds(BANNER_MS as i64),
                });
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fail(&mut self, e: EbsErr) -> PanelErr {
        self.loading = false;
        self.error = Some(e.user_message());
        PanelErr::Ebs(e)
    }

    fn invalid(&mut self, message: &'static str) -> PanelErr {
        self.error = Some(message.to_string());
        PanelErr::Validation(message)
    }
}

pub type PanelResult<T> = core::result::Result<T, PanelErr>;

#[derive(Debug, Error)]
pub enum PanelErr {
    #[error("{0}")]
    Validation(&'static str),

    #[error(transparent)]
    Ebs(#[from] EbsErr),
}

#[cfg(test)]
mod test {
    use std::net::{Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::session::SessionCell;

    #[derive(Debug, Default)]
    struct Hits {
        mutations: AtomicUsize,
        fetches: AtomicUsize,
    }

    async fn catalog_body() -> impl IntoResponse {
        Json(json!({
            "sounds": [
                {"id": "s1", "name": "airhorn", "tier": "alert100", "type": "sound"}
            ],
            "settings": {"enabled": true},
            "tiers": ["alert100"]
        }))
    }

    async fn mock_panel(mutation_status: StatusCode) -> (PanelController, Arc<Hits>) {
        let hits = Arc::new(Hits::default());

        let fetch_hits = hits.clone();
        let sound_hits = hits.clone();
        let delete_hits = hits.clone();

        let router = Router::new()
            .route(
                "/api/sounds",
                get(move || {
                    let hits = fetch_hits.clone();
                    async move {
                        hits.fetches.fetch_add(1, Ordering::SeqCst);
                        catalog_body().await
                    }
                })
                .post(move || {
                    let hits = sound_hits.clone();
                    async move {
                        hits.mutations.fetch_add(1, Ordering::SeqCst);
                        if mutation_status.is_success() {
                            (
                                mutation_status,
                                Json(json!({"id": "s2", "name": "new", "tier": "alert100", "type": "sound"})),
                            )
                                .into_response()
                        } else {
                            (mutation_status, Json(json!({"error": "file rejected by server"})))
                                .into_response()
                        }
                    }
                }),
            )
            .route(
                "/api/sounds/{id}",
                delete(move || {
                    let hits = delete_hits.clone();
                    async move {
                        hits.mutations.fetch_add(1, Ordering::SeqCst);
                        StatusCode::NO_CONTENT
                    }
                }),
            )
            .route(
                "/api/sounds/settings",
                post(|| async { Json(json!({"settings": {"enabled": false}})) }),
            );

        let listener =
            tokio::net::TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
                .await
                .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let session = SessionCell::new();
        session.authorize("jwt-test".into(), "112233".into(), None);
        let ebs = EbsClient::new(format!("http://{}", addr), session);

        (PanelController::new(ebs), hits)
    }

    fn upload_of(len: usize) -> FileUpload {
        FileUpload {
            name: "new".into(),
            tier: Tier("alert100".into()),
            volume: 1.0,
            file_name: "new.mp3".into(),
            bytes: vec![0u8; len],
        }
    }

    #[tokio::test]
    async fn test_sound_size_boundary() {
        let (mut panel, hits) = mock_panel(StatusCode::CREATED).await;
        let now = Utc::now();

        // one byte over: rejected locally, no request issued
        let err = panel
            .upload_sound(upload_of(MAX_SOUND_BYTES + 1), now)
            .await
            .unwrap_err();
        assert!(matches!(err, PanelErr::Validation(_)));
        assert_eq!(panel.error(), Some("sound files must be 1MB or smaller"));
        assert_eq!(hits.mutations.load(Ordering::SeqCst), 0);

        // exactly at the limit: accepted and sent
        panel.upload_sound(upload_of(MAX_SOUND_BYTES), now).await.unwrap();
        assert_eq!(hits.mutations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mutation_refetches_and_raises_banner() {
        let (mut panel, hits) = mock_panel(StatusCode::CREATED).await;
        let now = Utc::now();

        panel.upload_sound(upload_of(128), now).await.unwrap();

        assert_eq!(hits.mutations.load(Ordering::SeqCst), 1);
        assert_eq!(hits.fetches.load(Ordering::SeqCst), 1);
        assert!(panel.catalog().is_some());
        assert!(!panel.is_loading());
        assert_eq!(panel.banner(now), Some("sound uploaded"));

        // banner lapses on its own clock
        let later = now + Duration::milliseconds(3_000);
        assert_eq!(panel.banner(later), None);
    }

    #[tokio::test]
    async fn test_backend_rejection_surfaces_error_string() {
        let (mut panel, hits) = mock_panel(StatusCode::UNPROCESSABLE_ENTITY).await;
        let now = Utc::now();

        let err = panel.upload_sound(upload_of(128), now).await.unwrap_err();
        assert!(matches!(err, PanelErr::Ebs(_)));
        assert_eq!(panel.error(), Some("file rejected by server"));
        assert!(!panel.is_loading());

        // failed mutation: no refetch, no banner
        assert_eq!(hits.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(panel.banner(now), None);
    }

    #[tokio::test]
    async fn test_empty_clip_url_rejected_locally() {
        let (mut panel, hits) = mock_panel(StatusCode::CREATED).await;
        let now = Utc::now();

        let err = panel
            .create_clip_alert("best of", "   ", &Tier("alert100".into()), 1.0, now)
            .await
            .unwrap_err();
        assert!(matches!(err, PanelErr::Validation(_)));
        assert_eq!(hits.mutations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_image_errors_instead_of_silent_drop() {
        let (mut panel, hits) = mock_panel(StatusCode::CREATED).await;
        let now = Utc::now();

        let err = panel
            .upload_image("s1", "art.png", vec![0u8; MAX_IMAGE_BYTES + 1], now)
            .await
            .unwrap_err();
        assert!(matches!(err, PanelErr::Validation(_)));
        assert_eq!(panel.error(), Some("images must be 256KB or smaller"));
        assert_eq!(hits.mutations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delete_then_reload() {
        let (mut panel, hits) = mock_panel(StatusCode::CREATED).await;
        let now = Utc::now();

        panel.delete_item("s1", now).await.unwrap();
        assert_eq!(hits.mutations.load(Ordering::SeqCst), 1);
        assert_eq!(hits.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(panel.banner(now), Some("alert deleted"));
    }
}
