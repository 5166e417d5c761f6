//! HTTP client for the extension backend service (EBS).
//!
//! The EBS is the source of truth for the catalog, settings, and redemption
//! confirmation; this client is a thin authenticated wrapper around its
//! routes. Each surface holds one `EbsClient` for the page's lifetime — the
//! bearer token is resolved per request through the [`SessionCell`], so a
//! host re-authorization is picked up without rebuilding anything.

use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;

use crate::catalog::{Catalog, SoundCatalogItem, SoundSettings, Tier};
use crate::session::{SessionCell, SessionErr};

#[derive(Debug, Clone)]
pub struct EbsClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionCell,
}

impl EbsClient {
    pub fn new(base_url: impl Into<String>, session: SessionCell) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    /// Viewer-facing catalog snapshot. Unauthenticated, keyed by channel.
    #[instrument(skip(self))]
    pub async fn fetch_public(&self, channel_id: &str) -> EbsResult<Catalog> {
        let uri = format!("{}/api/sounds/public?channelId={}", self.base_url, channel_id);
        let res = self.http.get(uri).send().await?;

        Self::parse::<Catalog>(res).await
    }

    /// Full broadcaster catalog, including the configurable tier list.
    #[instrument(skip(self))]
    pub async fn fetch_catalog(&self) -> EbsResult<Catalog> {
        let res = self
            .authed(self.http.get(self.route("/api/sounds")))?
            .send()
            .await?;

        Self::parse::<Catalog>(res).await
    }

    #[instrument(skip(self, file_bytes), fields(file_len = file_bytes.len()))]
    pub async fn upload_sound(
        &self,
        name: &str,
        tier: &Tier,
        volume: f32,
        file_name: &str,
        file_bytes: Vec<u8>,
    ) -> EbsResult<SoundCatalogItem> {
        let form = reqwest::multipart::Form::new()
            .text("name", name.to_string())
            .text("tier", tier.0.clone())
            .text("volume", volume.to_string())
            .part(
                "file",
                reqwest::multipart::Part::bytes(file_bytes).file_name(file_name.to_string()),
            );

        let res = self
            .authed(self.http.post(self.route("/api/sounds")))?
            .multipart(form)
            .send()
            .await?;

        Self::parse::<SoundCatalogItem>(res).await
    }

    #[instrument(skip(self))]
    pub async fn create_clip_alert(
        &self,
        name: &str,
        clip_url: &str,
        tier: &Tier,
        volume: f32,
    ) -> EbsResult<SoundCatalogItem> {
        let body = json!({
            "name": name,
            "clipUrl": clip_url,
            "tier": tier,
            "volume": volume,
        });

        let res = self
            .authed(self.http.post(self.route("/api/sounds/clip")))?
            .json(&body)
            .send()
            .await?;

        Self::parse::<SoundCatalogItem>(res).await
    }

    #[instrument(skip(self, file_bytes), fields(file_len = file_bytes.len()))]
    pub async fn upload_video(
        &self,
        name: &str,
        tier: &Tier,
        volume: f32,
        file_name: &str,
        file_bytes: Vec<u8>,
    ) -> EbsResult<SoundCatalogItem> {
        let form = reqwest::multipart::Form::new()
            .text("name", name.to_string())
            .text("tier", tier.0.clone())
            .text("volume", volume.to_string())
            .part(
                "file",
                reqwest::multipart::Part::bytes(file_bytes).file_name(file_name.to_string()),
            );

        let res = self
            .authed(self.http.post(self.route("/api/sounds/video")))?
            .multipart(form)
            .send()
            .await?;

        Self::parse::<SoundCatalogItem>(res).await
    }

    /// Partial update of a single catalog item.
    #[instrument(skip(self, patch))]
    pub async fn update_sound(&self, id: &str, patch: &SoundPatch) -> EbsResult<SoundCatalogItem> {
        let uri = self.route(&format!("/api/sounds/{id}"));
        let res = self.authed(self.http.put(uri))?.json(patch).send().await?;

        Self::parse::<SoundCatalogItem>(res).await
    }

    #[instrument(skip(self))]
    pub async fn delete_sound(&self, id: &str) -> EbsResult<()> {
        let uri = self.route(&format!("/api/sounds/{id}"));
        let res = self.authed(self.http.delete(uri))?.send().await?;

        Self::check(res).await
    }

    #[instrument(skip(self, patch))]
    pub async fn patch_settings(&self, patch: &SettingsPatch) -> EbsResult<SoundSettings> {
        let res = self
            .authed(self.http.post(self.route("/api/sounds/settings")))?
            .json(patch)
            .send()
            .await?;

        Ok(Self::parse::<SettingsEnvelope>(res).await?.settings)
    }

    /// Browser-source URL for external streaming software.
    #[instrument(skip(self))]
    pub async fn overlay_url(&self) -> EbsResult<String> {
        let res = self
            .authed(self.http.get(self.route("/api/sounds/overlay-url")))?
            .send()
            .await?;

        Ok(Self::parse::<OverlayUrlEnvelope>(res).await?.url)
    }

    #[instrument(skip(self))]
    pub async fn fetch_image(&self, id: &str) -> EbsResult<Vec<u8>> {
        let uri = self.route(&format!("/api/sounds/image/{id}"));
        let res = self.authed(self.http.get(uri))?.send().await?;

        Self::bytes(res).await
    }

    #[instrument(skip(self, image_bytes), fields(image_len = image_bytes.len()))]
    pub async fn upload_image(
        &self,
        id: &str,
        file_name: &str,
        image_bytes: Vec<u8>,
    ) -> EbsResult<()> {
        let form = reqwest::multipart::Form::new().part(
            "image",
            reqwest::multipart::Part::bytes(image_bytes).file_name(file_name.to_string()),
        );

        let uri = self.route(&format!("/api/sounds/{id}/image"));
        let res = self.authed(self.http.post(uri))?.multipart(form).send().await?;

        Self::check(res).await
    }

    #[instrument(skip(self))]
    pub async fn delete_image(&self, id: &str) -> EbsResult<()> {
        let uri = self.route(&format!("/api/sounds/{id}/image"));
        let res = self.authed(self.http.delete(uri))?.send().await?;

        Self::check(res).await
    }

    /// Short audio preview of a catalog item, as a raw blob.
    #[instrument(skip(self))]
    pub async fn preview(&self, id: &str) -> EbsResult<Vec<u8>> {
        let uri = self.route(&format!("/api/sounds/preview/{id}"));
        let res = self.authed(self.http.get(uri))?.send().await?;

        Self::bytes(res).await
    }

    /// Pairs a host purchase receipt with a catalog item. The EBS validates
    /// the receipt and fans the alert out over the broadcast topic.
    #[instrument(skip(self, receipt))]
    pub async fn redeem(&self, receipt: &str, sound_id: &str, channel_id: &str) -> EbsResult<()> {
        let body = json!({
            "receipt": receipt,
            "soundId": sound_id,
            "channelId": channel_id,
        });

        let res = self
            .authed(self.http.post(self.route("/api/sounds/redeem")))?
            .json(&body)
            .send()
            .await?;

        Self::check(res).await
    }

    fn route(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> EbsResult<reqwest::RequestBuilder> {
        let session = self.session.current()?;
        Ok(req.header(AUTHORIZATION, format!("Bearer {}", session.token)))
    }

    /// Decodes a success body, or lifts the EBS error detail out of a
    /// non-success one. The EBS reports failures as JSON with an `error`
    /// (sometimes `message`) field; when neither is present the bare status
    /// code is all we can surface.
    async fn parse<T>(res: reqwest::Response) -> EbsResult<T>
    where
        T: DeserializeOwned,
    {
        let status = res.status();
        if !status.is_success() {
            tracing::error!(code = %status, "non-success ebs response");

            if let Ok(body) = res.json::<Value>().await {
                let detail = body["error"].as_str().or(body["message"].as_str());
                if let Some(message) = detail {
                    return Err(EbsErr::Api {
                        status: status.as_u16(),
                        message: message.to_string(),
                    });
                }
            }

            return Err(EbsErr::Status(status.as_u16()));
        }

        Ok(res.json::<T>().await?)
    }

    async fn check(res: reqwest::Response) -> EbsResult<()> {
        let status = res.status();
        if status.is_success() {
            return Ok(());
        }

        tracing::error!(code = %status, "non-success ebs response");
        if let Ok(body) = res.json::<Value>().await {
            let detail = body["error"].as_str().or(body["message"].as_str());
            if let Some(message) = detail {
                return Err(EbsErr::Api {
                    status: status.as_u16(),
                    message: message.to_string(),
                });
            }
        }

        Err(EbsErr::Status(status.as_u16()))
    }

    async fn bytes(res: reqwest::Response) -> EbsResult<Vec<u8>> {
        let status = res.status();
        if !status.is_success() {
            tracing::error!(code = %status, "non-success ebs response");
            return Err(EbsErr::Status(status.as_u16()));
        }

        Ok(res.bytes().await?.to_vec())
    }
}

/// JSON patch body for `PUT /api/sounds/:id`. Absent fields are left alone
/// by the EBS.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SettingsEnvelope {
    settings: SoundSettings,
}

#[derive(Debug, Deserialize)]
struct OverlayUrlEnvelope {
    url: String,
}

pub type EbsResult<T> = core::result::Result<T, EbsErr>;

#[derive(Debug, Error)]
pub enum EbsErr {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Session(#[from] SessionErr),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("ebs returned status {0}")]
    Status(u16),
}

impl EbsErr {
    /// The string a surface shows the broadcaster when an operation fails.
    pub fn user_message(&self) -> String {
        match self {
            EbsErr::Api { message, .. } => message.clone(),
            _ => String::from("something went wrong, please try again"),
        }
    }
}

#[cfg(test)]
mod test {
    use std::net::{Ipv4Addr, SocketAddr};

    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;

    async fn mock_ebs(router: Router) -> String {
        let listener =
            tokio::net::TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
                .await
                .unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn authorized_client(base_url: &str) -> EbsClient {
        let session = SessionCell::new();
        session.authorize("jwt-test".into(), "112233".into(), None);
        EbsClient::new(base_url, session)
    }

    #[derive(Debug, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct PublicQuery {
        channel_id: String,
    }

    async fn public_handler(Query(q): Query<PublicQuery>) -> impl IntoResponse {
        assert_eq!(q.channel_id, "112233");
        Json(json!({
            "sounds": [
                {"id": "s1", "name": "airhorn", "tier": "alert100", "type": "sound"}
            ],
            "settings": {"enabled": true}
        }))
    }

    #[tokio::test]
    async fn test_fetch_public_catalog() {
        let base = mock_ebs(Router::new().route("/api/sounds/public", get(public_handler))).await;
        let client = EbsClient::new(&base, SessionCell::new());

        let catalog = client.fetch_public("112233").await.unwrap();
        assert_eq!(catalog.sounds.len(), 1);
        assert!(catalog.settings.enabled);
    }

    #[tokio::test]
    async fn test_bearer_token_attached_to_authed_routes() {
        async fn catalog_handler(headers: HeaderMap) -> impl IntoResponse {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();

            if auth != "Bearer jwt-test" {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": "bad token"})),
                );
            }

            (
                StatusCode::OK,
                Json(json!({
                    "sounds": [],
                    "settings": {"enabled": false},
                    "tiers": ["alert100", "alert500"]
                })),
            )
        }

        let base = mock_ebs(Router::new().route("/api/sounds", get(catalog_handler))).await;
        let client = authorized_client(&base);

        let catalog = client.fetch_catalog().await.unwrap();
        assert_eq!(catalog.tiers.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_session_fails_before_any_request() {
        // no listener at all — the call must fail on the session, not transport
        let client = EbsClient::new("http://127.0.0.1:1", SessionCell::new());
        let err = client.fetch_catalog().await.unwrap_err();
        assert!(matches!(err, EbsErr::Session(SessionErr::NotAuthorized)));
    }

    #[tokio::test]
    async fn test_error_body_detail_is_surfaced() {
        async fn failing_handler() -> impl IntoResponse {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error": "tier is not configured for this channel"})),
            )
        }

        let base =
            mock_ebs(Router::new().route("/api/sounds/clip", post(failing_handler))).await;
        let client = authorized_client(&base);

        let err = client
            .create_clip_alert("best of", "https://clips.twitch.tv/x", &Tier("alert9".into()), 1.0)
            .await
            .unwrap_err();

        match err {
            EbsErr::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "tier is not configured for this channel");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_without_body_detail_keeps_status() {
        async fn opaque_failure() -> impl IntoResponse {
            StatusCode::INTERNAL_SERVER_ERROR
        }

        let base = mock_ebs(Router::new().route("/api/sounds/{id}", put(opaque_failure))).await;
        let client = authorized_client(&base);

        let err = client
            .update_sound("s1", &SoundPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EbsErr::Status(500)));
        assert_eq!(err.user_message(), "something went wrong, please try again");
    }

    #[tokio::test]
    async fn test_redeem_posts_receipt_and_ids() {
        async fn redeem_handler(Json(body): Json<Value>) -> impl IntoResponse {
            assert_eq!(body["receipt"], "rcpt-1");
            assert_eq!(body["soundId"], "s1");
            assert_eq!(body["channelId"], "112233");
            StatusCode::NO_CONTENT
        }

        let base = mock_ebs(Router::new().route("/api/sounds/redeem", post(redeem_handler))).await;
        let client = authorized_client(&base);

        client.redeem("rcpt-1", "s1", "112233").await.unwrap();
    }

    #[tokio::test]
    async fn test_preview_returns_raw_blob() {
        async fn preview_handler(Path(id): Path<String>) -> impl IntoResponse {
            assert_eq!(id, "s1");
            vec![0x52u8, 0x49, 0x46, 0x46]
        }

        let base =
            mock_ebs(Router::new().route("/api/sounds/preview/{id}", get(preview_handler))).await;
        let client = authorized_client(&base);

        let blob = client.preview("s1").await.unwrap();
        assert_eq!(blob, vec![0x52, 0x49, 0x46, 0x46]);
    }
}
