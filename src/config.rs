//! Run configuration.
//!
//! The command line is parsed once into [`CliArgs`] and then frozen into a
//! [`Config`] that is passed by reference to every stage of the run.

use clap::{ArgAction, Parser};

use crate::error::Error;

pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

// ---------------------------------------------------------------------------
// Frozen configuration
// ---------------------------------------------------------------------------

/// Settings for the admin role created with the guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRoleConfig {
    pub name: String,
    /// 24-bit RGB value.
    pub color: u32,
    pub emoji: Option<String>,
    pub hoist: bool,
    pub mentionable: bool,
}

#[derive(Clone)]
pub struct Config {
    pub bot_token: String,
    /// User to grant the admin role to. Resolved to the application owner
    /// when absent.
    pub owner_id: Option<String>,
    pub guild_name: String,
    pub admin_role: AdminRoleConfig,
    pub api_base_url: String,
    pub gateway_url: String,
}

impl Config {
    /// Configuration with the default guild and role settings.
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            owner_id: None,
            guild_name: "Bot Guild".to_string(),
            admin_role: AdminRoleConfig {
                name: "Admin".to_string(),
                color: 0x99AAB5,
                emoji: None,
                hoist: false,
                mentionable: false,
            },
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"<redacted>")
            .field("owner_id", &self.owner_id)
            .field("guild_name", &self.guild_name)
            .field("admin_role", &self.admin_role)
            .field("api_base_url", &self.api_base_url)
            .field("gateway_url", &self.gateway_url)
            .finish()
    }
}

/// Parse a `#RRGGBB` color into its 24-bit integer value.
pub fn parse_hex_color(input: &str) -> Result<u32, Error> {
    let hex = input.strip_prefix('#').unwrap_or(input);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::Config(format!(
            "admin role color must look like #RRGGBB, got {:?}",
            input
        )));
    }
    u32::from_str_radix(hex, 16).map_err(|e| Error::Config(format!("bad color {:?}: {}", input, e)))
}

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Create a Discord guild with a bot and hand its admin role to the owner.
#[derive(Debug, Parser)]
#[command(name = "create-discord-guild", version, disable_help_flag = true)]
pub struct CliArgs {
    /// Discord bot token.
    #[arg(short = 't', long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    /// User that receives the admin role. Defaults to the bot's owner.
    #[arg(short = 'i', long)]
    pub owner_id: Option<String>,

    /// Name of the new guild.
    #[arg(short = 'n', long, default_value = "Bot Guild")]
    pub guild_name: String,

    /// Admin role color as #RRGGBB.
    #[arg(short = 'c', long, default_value = "#99AAB5")]
    pub admin_role_color: String,

    /// Admin role name.
    #[arg(short = 'r', long, default_value = "Admin")]
    pub admin_role_name: String,

    /// Whether to display the admin role separately in the member list.
    #[arg(short = 'h', long, default_value_t = false, action = ArgAction::Set)]
    pub admin_role_hoist: bool,

    /// Whether the admin role can be mentioned.
    #[arg(short = 'm', long, default_value_t = false, action = ArgAction::Set)]
    pub admin_role_mentionable: bool,

    /// Admin role emoji (unicode).
    #[arg(short = 'e', long)]
    pub admin_role_emoji: Option<String>,

    #[arg(long, hide = true, default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,

    #[arg(long, hide = true, default_value = DEFAULT_GATEWAY_URL)]
    pub gateway_url: String,

    /// Print help.
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

impl CliArgs {
    /// Validate the arguments and freeze them into a [`Config`].
    pub fn into_config(self) -> Result<Config, Error> {
        if self.bot_token.trim().is_empty() {
            return Err(Error::Config("bot token must not be empty".to_string()));
        }
        let color = parse_hex_color(&self.admin_role_color)?;
        Ok(Config {
            bot_token: self.bot_token,
            owner_id: self.owner_id.filter(|id| !id.is_empty()),
            guild_name: self.guild_name,
            admin_role: AdminRoleConfig {
                name: self.admin_role_name,
                color,
                emoji: self.admin_role_emoji.filter(|e| !e.is_empty()),
                hoist: self.admin_role_hoist,
                mentionable: self.admin_role_mentionable,
            },
            api_base_url: self.api_base_url,
            gateway_url: self.gateway_url,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
