//! Typed gateway events.
//!
//! Every inbound text frame is decoded into a [`GatewayEvent`] before the
//! session or the watcher look at it. Decoding only fails for frames that
//! are not gateway payloads at all, or for a HELLO without its interval;
//! unknown opcodes and dispatch names are kept as data.

use std::time::Duration;

use crate::error::SessionError;
use crate::types::*;

/// Dispatch name of "a member joined a guild".
pub const GUILD_MEMBER_ADD: &str = "GUILD_MEMBER_ADD";

/// Dispatch name sent once IDENTIFY has been accepted.
pub const READY: &str = "READY";

/// A decoded gateway frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Op 10: the server's greeting with the heartbeat cadence.
    Hello { heartbeat_interval: Duration },

    /// Op 0: a named domain event, reduced to the ids used for correlation.
    Dispatch(Dispatch),

    /// Op 1: the server asks for an immediate heartbeat.
    HeartbeatRequest,

    /// Op 11.
    HeartbeatAck,

    /// Op 7: the server wants us to reconnect and resume.
    Reconnect,

    /// Op 9.
    InvalidSession { resumable: bool },

    /// Anything else.
    Other { op: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub name: String,
    pub guild_id: Option<Snowflake>,
    pub user_id: Option<Snowflake>,
}

impl Dispatch {
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

impl GatewayEvent {
    /// Decode one inbound text frame.
    pub fn decode(text: &str) -> Result<Self, SessionError> {
        let payload: GatewayPayload = serde_json::from_str(text)
            .map_err(|e| SessionError::MalformedFrame(format!("not a gateway payload: {}", e)))?;
        Self::from_payload(payload)
    }

    /// Convert a raw [`GatewayPayload`] into a typed event.
    pub fn from_payload(payload: GatewayPayload) -> Result<Self, SessionError> {
        const DISPATCH: u8 = OpCode::Dispatch as u8;
        const HEARTBEAT: u8 = OpCode::Heartbeat as u8;
        const RECONNECT: u8 = OpCode::Reconnect as u8;
        const INVALID_SESSION: u8 = OpCode::InvalidSession as u8;
        const HELLO: u8 = OpCode::Hello as u8;
        const HEARTBEAT_ACK: u8 = OpCode::HeartbeatAck as u8;

        let event = match payload.op {
            HELLO => {
                let hello: Hello = payload
                    .d
                    .ok_or_else(|| SessionError::MalformedFrame("HELLO without data".to_string()))
                    .and_then(|d| {
                        serde_json::from_value(d).map_err(|e| {
                            SessionError::MalformedFrame(format!("bad HELLO data: {}", e))
                        })
                    })?;
                if hello.heartbeat_interval == 0 {
                    return Err(SessionError::MalformedFrame(
                        "HELLO with a zero heartbeat_interval".to_string(),
                    ));
                }
                GatewayEvent::Hello {
                    heartbeat_interval: Duration::from_millis(hello.heartbeat_interval),
                }
            }

            DISPATCH => {
                let name = payload.t.ok_or_else(|| {
                    SessionError::MalformedFrame("dispatch without event name".to_string())
                })?;
                // Only the correlation ids matter; a body that lacks them, or
                // shapes them differently, is simply not a match.
                let target: DispatchTarget = payload
                    .d
                    .and_then(|d| serde_json::from_value(d).ok())
                    .unwrap_or_default();
                GatewayEvent::Dispatch(Dispatch {
                    name,
                    guild_id: target.guild_id,
                    user_id: target.user.map(|u| u.id),
                })
            }

            HEARTBEAT => GatewayEvent::HeartbeatRequest,
            HEARTBEAT_ACK => GatewayEvent::HeartbeatAck,
            RECONNECT => GatewayEvent::Reconnect,

            INVALID_SESSION => GatewayEvent::InvalidSession {
                resumable: payload.d.as_ref().and_then(|v| v.as_bool()).unwrap_or(false),
            },

            op => GatewayEvent::Other { op },
        };
        Ok(event)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
