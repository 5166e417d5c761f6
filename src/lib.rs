//! Client core for a Twitch broadcaster extension: a hype countdown timer and
//! a bits-redeemable sound/clip/video alert board.
//!
//! The crate is headless. Each surface of the extension (overlay, viewer
//! panel, broadcaster config) maps onto a controller here that a rendering
//! shell subscribes to: [`timer`] for the countdown, [`redeem`] for the
//! purchase flow, [`panel`] for catalog administration. All remote state
//! lives in the EBS (extension backend service), reached through
//! [`ebs::EbsClient`]; low-latency pushes arrive over the broadcast channel
//! handled in [`broadcast`].

pub mod broadcast;
pub mod catalog;
pub mod constants;
pub mod ebs;
pub mod host;
pub mod panel;
pub mod preview;
pub mod redeem;
pub mod session;
pub mod timer;
pub mod util;
pub mod viewer;
