//! Messages pushed to every connected viewer over the channel's broadcast
//! topic. Encoded as JSON with a `type` discriminator and a `payload` object.

use serde::{Deserialize, Serialize};

use crate::catalog::AlertKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum BroadcastMessage {
    /// Authoritative restart of the countdown.
    TimerReset {
        remaining: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hype: Option<bool>,
    },

    /// Periodic authoritative correction of the countdown.
    TimerTick {
        remaining: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hype: Option<bool>,
    },

    /// Time was added to the countdown (hype milestone). Carries the new
    /// total rather than a delta, and always states the hype flag.
    TimerAdd { new_remaining: u64, hype: bool },

    /// A viewer's redemption was confirmed; overlays should play it.
    SoundAlert {
        sound_id: String,
        name: String,
        kind: AlertKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        volume: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clip_url: Option<String>,
    },
}

/// Lenient decode for broadcast frames.
///
/// The transport is shared with other extension versions, so anything that
/// fails to parse is dropped rather than surfaced — a malformed frame must
/// never take the overlay down or stop local ticking.
pub fn decode(raw: &str) -> Option<BroadcastMessage> {
    match serde_json::from_str::<BroadcastMessage>(raw) {
        Ok(msg) => Some(msg),
        Err(e) => {
            tracing::debug!(error = %e, raw_len = raw.len(), "dropping undecodable broadcast frame");
            None
        }
    }
}
