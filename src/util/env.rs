//! `.env`-backed configuration.
//!
//! Variables are read once through [`dotenvy`] into a process-wide [`Env`]
//! and handed out by reference through the [`var!`](crate::var) macro.

use std::sync::LazyLock;

use thiserror::Error;
use tokio::sync::OnceCell;

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);
pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = ENV_VARS.get_or_try_init(|| async { Env::new() }).await?;
    Ok(match var {
        Var::EbsUrl => &vars.ebs_url,
        Var::BroadcastUrl => &vars.broadcast_url,
        Var::ChannelId => &vars.channel_id,
        Var::AuthToken => &vars.auth_token,
    })
}

#[derive(Debug, Clone)]
pub struct Env {
    pub ebs_url: String,
    pub broadcast_url: String,
    pub channel_id: String,
    pub auth_token: String,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        Ok(Self {
            ebs_url: read("BITSBOARD_EBS_URL")?,
            broadcast_url: read("BITSBOARD_BROADCAST_URL")?,
            channel_id: read("BITSBOARD_CHANNEL_ID")?,
            auth_token: read("BITSBOARD_AUTH_TOKEN")?,
        })
    }
}

fn read(key: &str) -> EnvResult<String> {
    dotenvy::var(key).map_err(|_| EnvErr::Missing(key.to_string()))
}

#[derive(Debug)]
pub enum Var {
    EbsUrl,
    BroadcastUrl,
    ChannelId,
    AuthToken,
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error("missing environment variable '{0}'")]
    Missing(String),

    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),
}
