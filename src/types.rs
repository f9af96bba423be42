//! Typed representations of the Discord API objects this tool touches.
//!
//! Only the fields the provisioning flow reads or writes are modelled; serde
//! ignores everything else Discord sends back.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// Discord IDs are snowflakes transmitted as strings in JSON.
pub type Snowflake = String;

bitflags! {
    /// Gateway intents declared at IDENTIFY time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Intents: u64 {
        const GUILD_MEMBERS = 1 << 1;
    }
}

bitflags! {
    /// Role permission bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u64 {
        const ADMINISTRATOR = 1 << 3;
    }
}

// ---------------------------------------------------------------------------
// Gateway envelopes
// ---------------------------------------------------------------------------

/// Gateway opcodes this client sends or reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum OpCode {
    Dispatch = 0,
    Heartbeat = 1,
    Identify = 2,
    Reconnect = 7,
    InvalidSession = 9,
    Hello = 10,
    HeartbeatAck = 11,
}

/// Raw inbound gateway payload. `op` stays a plain integer so unknown
/// opcodes still parse.
///
/// The sequence number `s` is not kept: nothing resumes.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: Option<serde_json::Value>,
    #[serde(default)]
    pub t: Option<String>,
}

/// Outbound gateway frame.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayFrame<T> {
    pub op: OpCode,
    pub d: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct Identify {
    pub token: String,
    pub intents: u64,
    pub properties: ConnectionProperties,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

/// `d` of the HELLO frame.
#[derive(Debug, Clone, Deserialize)]
pub struct Hello {
    pub heartbeat_interval: u64,
}

/// The parts of a dispatch body used for correlation: `GUILD_MEMBER_ADD`
/// carries both, most other events carry one or neither.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchTarget {
    pub guild_id: Option<Snowflake>,
    pub user: Option<PartialUser>,
}

// ---------------------------------------------------------------------------
// REST objects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PartialUser {
    pub id: Snowflake,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Role {
    pub id: Snowflake,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Guild {
    pub id: Snowflake,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Guild {
    /// The admin role created alongside the guild. Discord returns the roles
    /// in request order, so it sits right after `@everyone`.
    pub fn admin_role(&self) -> Option<&Role> {
        self.roles.get(1)
    }
}

/// Channel type discriminator. Kept open-ended because Discord keeps adding
/// channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "u8", into = "u8")]
pub enum ChannelType {
    GuildText,
    GuildVoice,
    GuildCategory,
    Other(u8),
}

impl From<u8> for ChannelType {
    fn from(value: u8) -> Self {
        match value {
            0 => ChannelType::GuildText,
            2 => ChannelType::GuildVoice,
            4 => ChannelType::GuildCategory,
            other => ChannelType::Other(other),
        }
    }
}

impl From<ChannelType> for u8 {
    fn from(value: ChannelType) -> Self {
        match value {
            ChannelType::GuildText => 0,
            ChannelType::GuildVoice => 2,
            ChannelType::GuildCategory => 4,
            ChannelType::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Channel {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: ChannelType,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Invite {
    pub code: String,
}

impl Invite {
    pub fn url(&self) -> String {
        format!("https://discord.gg/{}", self.code)
    }
}

/// Response of `GET /oauth2/applications/@me`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Application {
    pub id: Snowflake,
    #[serde(default)]
    pub owner: Option<PartialUser>,
}

// ---------------------------------------------------------------------------
// Outbound REST bodies
// ---------------------------------------------------------------------------

/// Body for `POST /guilds`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateGuild {
    pub name: String,
    pub roles: Vec<CreateGuildRole>,
}

/// Role entry inside [`CreateGuild`]. The `id` is a placeholder the API
/// requires; the first entry always describes `@everyone`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateGuildRole {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unicode_emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentionable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hoist: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<u64>,
}

/// Body for `POST /channels/{id}/invites`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateInvite {
    pub max_uses: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
