//! Create a Discord guild with a bot, invite its owner, and hand them the
//! admin role once they join.
//!
//! A run has two stages. [`pipeline::provision`] makes the REST calls that
//! create the guild and a single-use invite. [`session::GatewaySession`] then
//! holds a gateway connection open until [`watcher::CompletionWatcher`] sees
//! the owner join, grants the role, and closes the session.

pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod http;
pub mod notify;
pub mod pipeline;
pub mod session;
pub mod types;
pub mod watcher;

#[cfg(test)]
mod test_support;

use std::future::Future;

use tracing::info;

use crate::config::Config;
use crate::error::{Error, SessionError};
use crate::gateway::{GatewayConfig, GatewayTransport};
use crate::http::{DiscordApi, DiscordHttpClient};
use crate::notify::Notifier;
use crate::session::GatewaySession;
use crate::watcher::CompletionWatcher;

/// Run the whole flow against the real Discord API and gateway.
pub async fn run<N: Notifier>(config: &Config, notifier: &N) -> Result<(), Error> {
    let http = DiscordHttpClient::new(&config.bot_token, &config.api_base_url);
    run_with(&http, config, notifier, |url| async move {
        gateway::connect(&url).await
    })
    .await
}

/// Run the flow with an explicit API client and gateway connector.
///
/// `connect` is only called once provisioning has succeeded.
pub async fn run_with<A, N, T, C, F>(
    api: &A,
    config: &Config,
    notifier: &N,
    connect: C,
) -> Result<(), Error>
where
    A: DiscordApi + Sync,
    N: Notifier,
    T: GatewayTransport,
    C: FnOnce(String) -> F,
    F: Future<Output = Result<T, SessionError>>,
{
    let result = pipeline::provision(api, config, notifier).await?;
    info!(
        guild_id = %result.guild_id,
        owner_id = %result.owner_id,
        "provisioning complete, waiting for the owner"
    );

    let gateway = GatewayConfig::new(&config.gateway_url, &config.bot_token);
    let transport = connect(gateway.url.clone()).await?;
    let mut session = GatewaySession::new(transport, gateway);
    let mut watcher = CompletionWatcher::new(api, notifier, &result);
    session.run(&mut watcher).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
