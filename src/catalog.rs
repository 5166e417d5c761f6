//! Wire types for the broadcaster's alert catalog.
//!
//! A catalog is fetched as an immutable snapshot; nothing here is mutated
//! client-side. Edits go through the EBS and are followed by a full refetch.

use serde::{Deserialize, Serialize};

/// What plays when an alert is redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Sound,
    Clip,
    Video,
}

/// Cost-class sku for a catalog item, e.g. `"alert100"`. The bits price is
/// resolved through the host's product list, not stored here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tier(pub String);

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundCatalogItem {
    pub id: String,
    pub name: String,
    pub tier: Tier,

    #[serde(rename = "type")]
    pub kind: AlertKind,

    /// Per-item reuse suppression window. Falls back to
    /// [`DEFAULT_COOLDOWN_MS`](crate::constants::DEFAULT_COOLDOWN_MS) when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,

    /// Only present for [`AlertKind::Clip`] items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_url: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub has_image: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundSettings {
    pub enabled: bool,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Response body of the catalog endpoints. `tiers` is only populated on the
/// authenticated broadcaster route.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub sounds: Vec<SoundCatalogItem>,
    pub settings: SoundSettings,

    #[serde(default)]
    pub tiers: Option<Vec<Tier>>,
}

impl Catalog {
    pub fn item(&self, id: &str) -> Option<&SoundCatalogItem> {
        self.sounds.iter().find(|item| item.id == id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_catalog_deserializes_public_shape() {
        let body = r#"{
            "sounds": [
                {"id": "s1", "name": "airhorn", "tier": "alert100", "type": "sound", "cooldownMs": 8000},
                {"id": "c1", "name": "best of", "tier": "alert500", "type": "clip", "clipUrl": "https://clips.twitch.tv/x"}
            ],
            "settings": {"enabled": true}
        }"#;

        let catalog: Catalog = serde_json::from_str(body).unwrap();
        assert_eq!(catalog.sounds.len(), 2);
        assert!(catalog.tiers.is_none());

        let airhorn = catalog.item("s1").unwrap();
        assert_eq!(airhorn.kind, AlertKind::Sound);
        assert_eq!(airhorn.cooldown_ms, Some(8000));
        assert!(airhorn.enabled);

        let clip = catalog.item("c1").unwrap();
        assert_eq!(clip.kind, AlertKind::Clip);
        assert_eq!(clip.clip_url.as_deref(), Some("https://clips.twitch.tv/x"));
    }
}
