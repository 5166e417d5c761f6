/// Cadence of the purely cosmetic local countdown tick.
pub const LOCAL_TICK_MS: u64 = 1_000;

/// Applied when a catalog item carries no cooldown of its own.
pub const DEFAULT_COOLDOWN_MS: u64 = 5_000;

/// How long the "now playing" label stays up after a redemption confirms.
pub const LAST_PLAYED_MS: u64 = 3_000;

/// How long a success banner stays up in the config panel.
pub const BANNER_MS: u64 = 3_000;

// CLIENT-SIDE UPLOAD LIMITS
//
// The EBS enforces its own limits; these exist so the panel can reject an
// oversized file before burning a request on it.
pub const MAX_SOUND_BYTES: usize = 1024 * 1024;
pub const MAX_VIDEO_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_IMAGE_BYTES: usize = 256 * 1024;
