//! Local countdown reconciler.
//!
//! The overlay shows a countdown that ticks once per second locally, purely
//! to avoid visual staleness: the EBS only pushes on resets and milestones.
//! Whenever an authoritative timer message arrives it overwrites the local
//! value outright — last writer wins, no merge window, no sequencing. The
//! two writers run on disjoint cadences and the server is authoritative, so
//! nothing smarter is warranted.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::broadcast::BroadcastMessage;
use crate::constants::LOCAL_TICK_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerState {
    /// Seconds left on the countdown. Never negative; local ticking clamps
    /// at zero.
    pub remaining: u64,
    pub hype: bool,
}

impl TimerState {
    /// One cosmetic local tick.
    pub fn local_tick(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    /// Applies an authoritative broadcast correction. Non-timer messages are
    /// ignored. The `hype` flag only changes when the message states it,
    /// except for `timer_add` where it is always present.
    pub fn apply(&mut self, msg: &BroadcastMessage) {
        match msg {
            BroadcastMessage::TimerReset { remaining, hype }
            | BroadcastMessage::TimerTick { remaining, hype } => {
                self.remaining = *remaining;
                if let Some(hype) = hype {
                    self.hype = *hype;
                }
            }

            BroadcastMessage::TimerAdd { new_remaining, hype } => {
                self.remaining = *new_remaining;
                self.hype = *hype;
            }

            BroadcastMessage::SoundAlert { .. } => (),
        }
    }
}

/// Runs the countdown until cancellation, publishing every state change on a
/// watch channel.
///
/// Cancelling the token is the teardown path: the interval is dropped with
/// the task, so no tick can fire against a torn-down view.
#[instrument(skip_all)]
pub fn run_countdown(
    initial: TimerState,
    mut broadcast_rx: UnboundedReceiver<BroadcastMessage>,
    cancel_token: CancellationToken,
) -> (watch::Receiver<TimerState>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(initial);

    let handle = tokio::spawn(async move {
        let mut state = initial;
        let mut interval = tokio::time::interval(Duration::from_millis(LOCAL_TICK_MS));
        let mut feed_open = true;

        // the first tick resolves immediately; burn it so the display holds
        // its starting value for a full second
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    state.local_tick();
                    if tx.send(state).is_err() {
                        break;
                    }
                }

                msg = broadcast_rx.recv(), if feed_open => {
                    let Some(msg) = msg else {
                        // keep ticking locally; only cancellation stops us
                        tracing::debug!("broadcast feed closed, countdown continues locally");
                        feed_open = false;
                        continue;
                    };

                    state.apply(&msg);
                    if tx.send(state).is_err() {
                        break;
                    }
                }

                _ = cancel_token.cancelled() => {
                    tracing::debug!("countdown cancelled");
                    break;
                }
            }
        }
    });

    (rx, handle)
}

#[cfg(test)]
mod test {
    use tokio::sync::mpsc::unbounded_channel;

    use super::*;

    #[test]
    fn test_local_tick_decrements_and_clamps() {
        for start in [0u64, 1, 2, 90, u64::MAX] {
            let mut state = TimerState {
                remaining: start,
                hype: false,
            };
            state.local_tick();
            assert_eq!(state.remaining, start.saturating_sub(1));
        }
    }

    #[test]
    fn test_authoritative_tick_overwrites_any_drift() {
        let mut state = TimerState {
            remaining: 7,
            hype: true,
        };

        state.apply(&BroadcastMessage::TimerTick {
            remaining: 42,
            hype: None,
        });

        assert_eq!(state.remaining, 42);
        // hype untouched when the payload omits it
        assert!(state.hype);
    }

    #[test]
    fn test_timer_add_overwrites_both_fields() {
        let mut state = TimerState::default();

        state.apply(&BroadcastMessage::TimerAdd {
            new_remaining: 90,
            hype: true,
        });

        assert_eq!(
            state,
            TimerState {
                remaining: 90,
                hype: true
            }
        );
    }

    #[test]
    fn test_sound_alert_does_not_touch_timer() {
        let mut state = TimerState {
            remaining: 30,
            hype: false,
        };

        state.apply(&BroadcastMessage::SoundAlert {
            sound_id: "s1".into(),
            name: "airhorn".into(),
            kind: crate::catalog::AlertKind::Sound,
            volume: None,
            clip_url: None,
        });

        assert_eq!(state.remaining, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_ticks_once_per_second() {
        let (_broadcast_tx, broadcast_rx) = unbounded_channel();
        let cancel = CancellationToken::new();

        let initial = TimerState {
            remaining: 10,
            hype: false,
        };
        let (mut rx, handle) = run_countdown(initial, broadcast_rx, cancel.clone());

        // one second per step so every tick is observed individually
        for expected in [9, 8, 7] {
            tokio::time::advance(Duration::from_millis(1_000)).await;
            rx.changed().await.unwrap();
            assert_eq!(rx.borrow_and_update().remaining, expected);
        }

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_correction_wins_over_local_drift() {
        let (broadcast_tx, broadcast_rx) = unbounded_channel();
        let cancel = CancellationToken::new();

        let initial = TimerState {
            remaining: 100,
            hype: false,
        };
        let (mut rx, handle) = run_countdown(initial, broadcast_rx, cancel.clone());

        tokio::time::advance(Duration::from_millis(5_100)).await;

        broadcast_tx
            .send(BroadcastMessage::TimerReset {
                remaining: 300,
                hype: Some(true),
            })
            .unwrap();

        // wait until the correction is observed (a local tick may land first)
        loop {
            rx.changed().await.unwrap();
            let state = *rx.borrow_and_update();
            if state.remaining >= 299 {
                assert!(state.hype);
                break;
            }
        }

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_countdown_stops_publishing() {
        let (_broadcast_tx, broadcast_rx) = unbounded_channel();
        let cancel = CancellationToken::new();

        let initial = TimerState {
            remaining: 60,
            hype: false,
        };
        let (rx, handle) = run_countdown(initial, broadcast_rx, cancel.clone());

        cancel.cancel();
        handle.await.unwrap();

        let frozen = rx.borrow().remaining;
        tokio::time::advance(Duration::from_millis(10_000)).await;
        assert_eq!(rx.borrow().remaining, frozen);
    }
}
