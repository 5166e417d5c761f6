use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc::unbounded_channel;
use tokio_util::sync::CancellationToken;

use bitsboard::broadcast::BroadcastMessage;
use bitsboard::broadcast::socket::BroadcastSocket;
use bitsboard::ebs::EbsClient;
use bitsboard::session::SessionCell;
use bitsboard::timer::{TimerState, run_countdown};
use bitsboard::util::env::Var;
use bitsboard::util::telemetry::Telemetry;
use bitsboard::var;

/// Headless overlay runner: subscribes to a channel's broadcast topic and
/// logs the countdown plus every confirmed alert. Intended for wiring the
/// extension into external streaming software without a browser.
#[derive(Parser, Debug)]
struct Cli {
    /// Broadcaster channel id (falls back to BITSBOARD_CHANNEL_ID)
    #[arg(short, long)]
    channel: Option<String>,

    /// EBS base URL (falls back to BITSBOARD_EBS_URL)
    #[arg(long)]
    ebs_url: Option<String>,

    /// Broadcast websocket URL (falls back to BITSBOARD_BROADCAST_URL)
    #[arg(long)]
    broadcast_url: Option<String>,

    /// Viewer token (falls back to BITSBOARD_AUTH_TOKEN)
    #[arg(short, long)]
    token: Option<String>,
}

async fn resolve(cli_value: Option<String>, var: Var) -> Result<String> {
    match cli_value {
        Some(v) => Ok(v),
        None => Ok(var!(var).await?.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    Telemetry::new().register();

    let args = Cli::parse();
    let channel_id = resolve(args.channel, Var::ChannelId).await?;
    let ebs_url = resolve(args.ebs_url, Var::EbsUrl).await?;
    let broadcast_url = resolve(args.broadcast_url, Var::BroadcastUrl).await?;
    let token = resolve(args.token, Var::AuthToken).await?;

    let session = SessionCell::new();
    session.authorize(token, channel_id.clone(), None);

    let ebs = EbsClient::new(ebs_url, session);
    let catalog = ebs.fetch_public(&channel_id).await?;
    tracing::info!(
        sound_count = catalog.sounds.len(),
        board_enabled = catalog.settings.enabled,
        "catalog loaded"
    );

    let cancel = CancellationToken::new();

    let socket = BroadcastSocket::connect(&broadcast_url, &channel_id).await?;
    let (broadcast_tx, mut broadcast_rx) = unbounded_channel::<BroadcastMessage>();
    let (timer_tx, timer_rx) = unbounded_channel::<BroadcastMessage>();

    let reader_cancel = cancel.clone();
    let reader = tokio::spawn(async move {
        if let Err(e) = socket.loop_read(broadcast_tx, reader_cancel).await {
            tracing::error!(error = ?e, "broadcast read loop failed");
        }
    });

    // fan incoming frames out: timer messages feed the countdown, confirmed
    // alerts are logged as they land
    let dispatch_cancel = cancel.clone();
    let dispatcher = tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = broadcast_rx.recv() => {
                    let Some(msg) = msg else { break };

                    match &msg {
                        BroadcastMessage::SoundAlert { sound_id, name, kind, .. } => {
                            tracing::info!(sound_id, name, ?kind, "alert redeemed");
                        }
                        _ => {
                            if timer_tx.send(msg).is_err() {
                                break;
                            }
                        }
                    }
                }

                _ = dispatch_cancel.cancelled() => break,
            }
        }
    });

    let (mut timer_watch, countdown) =
        run_countdown(TimerState::default(), timer_rx, cancel.clone());

    let display_cancel = cancel.clone();
    let display = tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = timer_watch.changed() => {
                    if changed.is_err() {
                        break;
                    }

                    let state = *timer_watch.borrow_and_update();
                    tracing::info!(remaining = state.remaining, hype = state.hype, "countdown");
                }

                _ = display_cancel.cancelled() => break,
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    cancel.cancel();

    for handle in [reader, dispatcher, countdown, display] {
        _ = handle.await;
    }

    Ok(())
}
