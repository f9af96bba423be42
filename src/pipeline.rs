//! Provisioning pipeline: guild, invite and owner resolution.
//!
//! Every step depends on the previous one and the first failure aborts the
//! rest, so this is a straight line of awaited REST calls.

use tracing::info;

use crate::config::{AdminRoleConfig, Config};
use crate::error::Error;
use crate::http::DiscordApi;
use crate::notify::Notifier;
use crate::types::*;

/// Everything the gateway stage needs to know about the new guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningResult {
    pub guild_id: Snowflake,
    pub admin_role_id: Snowflake,
    pub owner_id: Snowflake,
    pub invite_code: String,
}

/// Build the `POST /guilds` body: the `@everyone` placeholder followed by
/// the administrator role.
pub fn create_guild_body(name: &str, role: &AdminRoleConfig) -> CreateGuild {
    CreateGuild {
        name: name.to_string(),
        roles: vec![
            CreateGuildRole::default(),
            CreateGuildRole {
                id: 0,
                name: Some(role.name.clone()),
                color: Some(role.color),
                unicode_emoji: role.emoji.clone(),
                mentionable: Some(role.mentionable),
                hoist: Some(role.hoist),
                position: Some(0),
                permissions: Some(Permissions::ADMINISTRATOR.bits()),
            },
        ],
    }
}

/// First text channel of the guild, if any.
pub fn first_text_channel(channels: &[Channel]) -> Option<&Channel> {
    channels.iter().find(|c| c.kind == ChannelType::GuildText)
}

/// Run the provisioning steps in order.
pub async fn provision<A, N>(api: &A, config: &Config, notifier: &N) -> Result<ProvisioningResult, Error>
where
    A: DiscordApi,
    N: Notifier,
{
    let body = create_guild_body(&config.guild_name, &config.admin_role);
    let guild = api.create_guild(&body).await?;
    let admin_role_id = guild
        .admin_role()
        .map(|role| role.id.clone())
        .ok_or(Error::NotFound("admin role"))?;
    info!(guild_id = %guild.id, admin_role_id = %admin_role_id, "guild created");

    let channels = api.get_guild_channels(&guild.id).await?;
    let channel = first_text_channel(&channels).ok_or(Error::NotFound("text channel"))?;

    let invite = api
        .create_invite(&channel.id, &CreateInvite { max_uses: 1 })
        .await?;
    info!(channel_id = %channel.id, code = %invite.code, "invite created");
    notifier.invite_created(&invite.url());

    let owner_id = match &config.owner_id {
        Some(id) => id.clone(),
        None => {
            let application = api.get_current_application().await?;
            let owner = application
                .owner
                .ok_or(Error::NotFound("application owner"))?;
            info!(owner_id = %owner.id, "resolved bot owner");
            owner.id
        }
    };

    Ok(ProvisioningResult {
        guild_id: guild.id,
        admin_role_id,
        owner_id,
        invite_code: invite.code,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
