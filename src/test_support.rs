//! In-memory stand-ins for the REST API, the gateway socket, the notifier
//! and the event handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::{ApiError, Error, SessionError};
use crate::events::GatewayEvent;
use crate::gateway::GatewayTransport;
use crate::http::DiscordApi;
use crate::notify::Notifier;
use crate::session::{EventHandler, Watch};
use crate::types::*;

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

/// Scripted [`DiscordApi`] that records every call.
pub struct FakeApi {
    pub guild: Mutex<Result<Guild, ApiError>>,
    pub channels: Mutex<Result<Vec<Channel>, ApiError>>,
    pub invite: Mutex<Result<Invite, ApiError>>,
    pub application: Mutex<Result<Application, ApiError>>,
    pub grant: Mutex<Result<(), ApiError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    /// Guild `G1` with roles `R0`/`R1`, one text channel `C1`, invite
    /// `abc123`, application owned by `OWNER`.
    pub fn happy_path() -> Self {
        Self {
            guild: Mutex::new(Ok(serde_json::from_value(serde_json::json!({
                "id": "G1",
                "name": "Bot Guild",
                "roles": [{"id": "R0", "name": "@everyone"}, {"id": "R1", "name": "Admin"}],
            }))
            .unwrap())),
            channels: Mutex::new(Ok(serde_json::from_value(serde_json::json!([
                {"id": "CAT", "type": 4, "name": "Text Channels"},
                {"id": "C1", "type": 0, "name": "general"},
                {"id": "V1", "type": 2, "name": "General"},
            ]))
            .unwrap())),
            invite: Mutex::new(Ok(Invite {
                code: "abc123".to_string(),
            })),
            application: Mutex::new(Ok(serde_json::from_value(serde_json::json!({
                "id": "APP",
                "owner": {"id": "OWNER", "username": "owner"},
            }))
            .unwrap())),
            grant: Mutex::new(Ok(())),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn grants(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("add_member_role"))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl DiscordApi for FakeApi {
    async fn create_guild(&self, _body: &CreateGuild) -> Result<Guild, ApiError> {
        self.record("create_guild".to_string());
        self.guild.lock().unwrap().clone()
    }

    async fn get_guild_channels(&self, guild_id: &str) -> Result<Vec<Channel>, ApiError> {
        self.record(format!("get_guild_channels {}", guild_id));
        self.channels.lock().unwrap().clone()
    }

    async fn create_invite(&self, channel_id: &str, body: &CreateInvite) -> Result<Invite, ApiError> {
        assert_eq!(body.max_uses, 1);
        self.record(format!("create_invite {}", channel_id));
        self.invite.lock().unwrap().clone()
    }

    async fn add_member_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), ApiError> {
        self.record(format!("add_member_role {} {} {}", guild_id, user_id, role_id));
        self.grant.lock().unwrap().clone()
    }

    async fn get_current_application(&self) -> Result<Application, ApiError> {
        self.record("get_current_application".to_string());
        self.application.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    invites: Mutex<Vec<String>>,
    grants: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn invites(&self) -> Vec<String> {
        self.invites.lock().unwrap().clone()
    }

    pub fn grants(&self) -> Vec<(String, String)> {
        self.grants.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn invite_created(&self, invite_url: &str) {
        self.invites.lock().unwrap().push(invite_url.to_string());
    }

    fn owner_granted(&self, guild_id: &str, user_id: &str) {
        self.grants
            .lock()
            .unwrap()
            .push((guild_id.to_string(), user_id.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Gateway socket
// ---------------------------------------------------------------------------

/// Client half handed to the session.
pub struct FakeTransport {
    inbound: mpsc::UnboundedReceiver<Result<String, SessionError>>,
    sent: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

/// Server half driven by the test.
pub struct FakeServer {
    inbound: Mutex<Option<mpsc::UnboundedSender<Result<String, SessionError>>>>,
    pub sent: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

pub fn fake_transport() -> (FakeTransport, FakeServer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    (
        FakeTransport {
            inbound: in_rx,
            sent: sent_tx,
            closed: Arc::clone(&closed),
        },
        FakeServer {
            inbound: Mutex::new(Some(in_tx)),
            sent: sent_rx,
            closed,
        },
    )
}

impl FakeServer {
    pub fn push(&self, frame: &str) {
        self.send(Ok(frame.to_string()));
    }

    pub fn fail(&self, err: SessionError) {
        self.send(Err(err));
    }

    /// End the inbound stream once the queued frames are consumed.
    pub fn end(&self) {
        self.inbound.lock().unwrap().take();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn send(&self, item: Result<String, SessionError>) {
        if let Some(tx) = self.inbound.lock().unwrap().as_ref() {
            let _ = tx.send(item);
        }
    }
}

impl GatewayTransport for FakeTransport {
    async fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        self.sent
            .send(text)
            .map_err(|_| SessionError::Socket("fake server gone".to_string()))
    }

    async fn next_text(&mut self) -> Result<String, SessionError> {
        match self.inbound.recv().await {
            Some(item) => item,
            None => Err(SessionError::StreamEnded),
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Event handler
// ---------------------------------------------------------------------------

/// Records the name of every event; completes or fails on a given dispatch.
#[derive(Default)]
pub struct RecordingHandler {
    names: Vec<String>,
    complete_on: Option<String>,
    fail_on: Option<String>,
}

impl RecordingHandler {
    pub fn completing_on(name: &str) -> Self {
        Self {
            complete_on: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_on(name: &str) -> Self {
        Self {
            fail_on: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }
}

impl EventHandler for RecordingHandler {
    async fn on_event(&mut self, event: &GatewayEvent) -> Result<Watch, Error> {
        let name = match event {
            GatewayEvent::Hello { .. } => "HELLO".to_string(),
            GatewayEvent::Dispatch(d) => d.name.clone(),
            GatewayEvent::HeartbeatRequest => "HEARTBEAT".to_string(),
            GatewayEvent::HeartbeatAck => "HEARTBEAT_ACK".to_string(),
            GatewayEvent::Reconnect => "RECONNECT".to_string(),
            GatewayEvent::InvalidSession { .. } => "INVALID_SESSION".to_string(),
            GatewayEvent::Other { op } => format!("OP {}", op),
        };
        self.names.push(name.clone());

        if self.fail_on.as_deref() == Some(name.as_str()) {
            return Err(ApiError::transport("boom").into());
        }
        if self.complete_on.as_deref() == Some(name.as_str()) {
            return Ok(Watch::Complete);
        }
        Ok(Watch::Pending)
    }
}
