//! Gateway session state machine.
//!
//! One session per run, moving through
//! `Connecting → Identifying → Active → Closing → Closed`:
//!
//!   - IDENTIFY is sent as soon as the socket is open
//!   - the first HELLO arms the heartbeat timer and makes the session active
//!   - every decoded event is handed to an [`EventHandler`]
//!   - the handler answering [`Watch::Complete`] closes the session
//!
//! Inputs come from a single `select!` loop over the socket and the heartbeat
//! channel, so all state changes happen one input at a time without locks.
//! Every exit path, successful or not, cancels the heartbeat and closes the
//! socket.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{Error, SessionError};
use crate::events::{GatewayEvent, READY};
use crate::gateway::{heartbeat_frame, identify_frame, GatewayConfig, GatewayTransport};

// ---------------------------------------------------------------------------
// Event handler seam
// ---------------------------------------------------------------------------

/// What the handler wants the session to do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watch {
    Pending,
    Complete,
}

/// Consumer of decoded gateway events.
pub trait EventHandler {
    fn on_event(&mut self, event: &GatewayEvent)
        -> impl Future<Output = Result<Watch, Error>> + Send;
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Identifying,
    Active,
    Closing,
    Closed,
}

/// Background task pushing a tick into the session loop every interval.
/// Aborted on cancel and on drop.
#[derive(Debug)]
struct HeartbeatTimer {
    task: JoinHandle<()>,
}

impl HeartbeatTimer {
    fn spawn(period: Duration, ticks: mpsc::Sender<()>) -> Self {
        let task = tokio::spawn(async move {
            // First beat one full interval after HELLO.
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if ticks.send(()).await.is_err() {
                    return;
                }
            }
        });
        Self { task }
    }

    fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for HeartbeatTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Mutable state of the single gateway session.
#[derive(Debug)]
pub struct SessionState {
    phase: SessionPhase,
    heartbeat_interval: Option<Duration>,
    heartbeat: Option<HeartbeatTimer>,
    ticks: mpsc::Sender<()>,
}

impl SessionState {
    fn new(ticks: mpsc::Sender<()>) -> Self {
        Self {
            phase: SessionPhase::Connecting,
            heartbeat_interval: None,
            heartbeat: None,
            ticks,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Interval taken from the HELLO that armed the heartbeat.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval
    }

    pub fn heartbeat_armed(&self) -> bool {
        self.heartbeat.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }

    /// Arm the heartbeat and enter `Active`. Only the first call in a
    /// session's lifetime has an effect; returns whether it did.
    fn arm_heartbeat(&mut self, period: Duration) -> bool {
        if self.heartbeat_interval.is_some()
            || matches!(self.phase, SessionPhase::Closing | SessionPhase::Closed)
        {
            return false;
        }
        self.heartbeat = Some(HeartbeatTimer::spawn(period, self.ticks.clone()));
        self.heartbeat_interval = Some(period);
        self.phase = SessionPhase::Active;
        true
    }

    fn disarm_heartbeat(&mut self) {
        if let Some(timer) = self.heartbeat.take() {
            timer.cancel();
            debug!("heartbeat cancelled");
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum SessionInput {
    Frame(String),
    HeartbeatDue,
}

/// A gateway session over an already-open transport.
pub struct GatewaySession<T> {
    transport: T,
    config: GatewayConfig,
    state: SessionState,
    ticks: mpsc::Receiver<()>,
}

impl<T: GatewayTransport> GatewaySession<T> {
    pub fn new(transport: T, config: GatewayConfig) -> Self {
        let (tick_tx, tick_rx) = mpsc::channel(1);
        Self {
            transport,
            config,
            state: SessionState::new(tick_tx),
            ticks: tick_rx,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Drive the session until the handler completes or a fatal error
    /// occurs. The session is `Closed` when this returns, either way.
    pub async fn run<H: EventHandler>(&mut self, handler: &mut H) -> Result<(), Error> {
        let result = self.drive(handler).await;
        if let Err(e) = &result {
            warn!(error = %e, "gateway session failed");
        }
        self.shutdown().await;
        result
    }

    async fn drive<H: EventHandler>(&mut self, handler: &mut H) -> Result<(), Error> {
        self.identify().await?;

        loop {
            let input = tokio::select! {
                frame = self.transport.next_text() => SessionInput::Frame(frame?),
                Some(()) = self.ticks.recv() => SessionInput::HeartbeatDue,
            };

            if self.step(input, handler).await? == Watch::Complete {
                return Ok(());
            }
        }
    }

    async fn identify(&mut self) -> Result<(), Error> {
        let frame = identify_frame(&self.config.token, self.config.intents);
        self.transport.send_text(frame).await?;
        self.state.phase = SessionPhase::Identifying;
        info!(intents = self.config.intents.bits(), "sent IDENTIFY");
        Ok(())
    }

    async fn send_heartbeat(&mut self) -> Result<(), Error> {
        self.transport.send_text(heartbeat_frame()).await?;
        debug!("sent heartbeat");
        Ok(())
    }

    async fn step<H: EventHandler>(
        &mut self,
        input: SessionInput,
        handler: &mut H,
    ) -> Result<Watch, Error> {
        let text = match input {
            SessionInput::HeartbeatDue => {
                self.send_heartbeat().await?;
                return Ok(Watch::Pending);
            }
            SessionInput::Frame(text) => text,
        };

        let event = GatewayEvent::decode(&text)?;
        match &event {
            GatewayEvent::Hello { heartbeat_interval } => {
                if self.state.arm_heartbeat(*heartbeat_interval) {
                    info!(
                        interval_ms = heartbeat_interval.as_millis() as u64,
                        "received HELLO, heartbeat armed"
                    );
                } else {
                    debug!("repeated HELLO ignored, heartbeat already armed");
                }
            }
            GatewayEvent::HeartbeatRequest => self.send_heartbeat().await?,
            GatewayEvent::HeartbeatAck => debug!("heartbeat acknowledged"),
            GatewayEvent::Reconnect => return Err(SessionError::ReconnectRequested.into()),
            GatewayEvent::InvalidSession { resumable } => {
                return Err(SessionError::InvalidSession {
                    resumable: *resumable,
                }
                .into());
            }
            GatewayEvent::Dispatch(dispatch) if dispatch.is(READY) => {
                info!("gateway READY");
            }
            GatewayEvent::Dispatch(dispatch) => {
                debug!(event = %dispatch.name, "dispatch");
            }
            GatewayEvent::Other { op } => debug!(op, "unhandled opcode"),
        }

        handler.on_event(&event).await
    }

    /// `Closing → Closed`: stop the heartbeat, then close the socket.
    async fn shutdown(&mut self) {
        if self.state.is_closed() {
            return;
        }
        self.state.phase = SessionPhase::Closing;
        self.state.disarm_heartbeat();
        if let Err(e) = self.transport.close().await {
            debug!(error = %e, "socket close failed");
        }
        self.state.phase = SessionPhase::Closed;
        info!("gateway session closed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fake_transport, RecordingHandler};

    const HELLO_1000: &str = r#"{"op":10,"d":{"heartbeat_interval":1000}}"#;

    fn config() -> GatewayConfig {
        GatewayConfig::new("wss://gateway.test", "tok")
    }

    fn dispatch(name: &str) -> String {
        format!(r#"{{"op":0,"s":1,"t":"{}","d":{{}}}}"#, name)
    }

    fn op(frame: &str) -> u64 {
        serde_json::from_str::<serde_json::Value>(frame).unwrap()["op"]
            .as_u64()
            .unwrap()
    }

    #[tokio::test]
    async fn new_session_is_connecting_without_heartbeat() {
        let (transport, _server) = fake_transport();
        let session = GatewaySession::new(transport, config());
        assert_eq!(session.state().phase(), SessionPhase::Connecting);
        assert!(!session.state().heartbeat_armed());
    }

    #[tokio::test]
    async fn heartbeat_arms_only_once() {
        let (tx, _rx) = mpsc::channel(1);
        let mut state = SessionState::new(tx);

        assert!(state.arm_heartbeat(Duration::from_millis(1000)));
        assert_eq!(state.phase(), SessionPhase::Active);
        assert!(!state.arm_heartbeat(Duration::from_millis(50)));
        assert_eq!(state.heartbeat_interval(), Some(Duration::from_millis(1000)));

        state.disarm_heartbeat();
        assert!(!state.heartbeat_armed());
        // Disarming does not reopen the slot.
        assert!(!state.arm_heartbeat(Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_fires_at_hello_interval_and_stops_on_close() {
        let (transport, mut server) = fake_transport();
        let mut session = GatewaySession::new(transport, config());
        let mut handler = RecordingHandler::completing_on("DONE");

        let script = async {
            let identify = server.sent.recv().await.unwrap();
            assert_eq!(op(&identify), 2);

            server.push(HELLO_1000);
            let armed_at = Instant::now();

            let first = server.sent.recv().await.unwrap();
            assert_eq!(first, heartbeat_frame());
            assert_eq!(armed_at.elapsed(), Duration::from_millis(1000));

            // A second HELLO must not re-arm or change the cadence.
            server.push(r#"{"op":10,"d":{"heartbeat_interval":50}}"#);
            let previous = Instant::now();
            let second = server.sent.recv().await.unwrap();
            assert_eq!(second, heartbeat_frame());
            assert_eq!(previous.elapsed(), Duration::from_millis(1000));

            server.push(&dispatch("DONE"));
        };

        let (result, ()) = tokio::join!(session.run(&mut handler), script);
        result.unwrap();

        assert!(session.state().is_closed());
        assert!(!session.state().heartbeat_armed());
        assert_eq!(session.state().heartbeat_interval(), Some(Duration::from_millis(1000)));
        assert!(server.is_closed());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(server.sent.try_recv().is_err(), "heartbeat outlived the session");
    }

    #[tokio::test]
    async fn forwards_every_event_to_the_handler() {
        let (transport, server) = fake_transport();
        let mut session = GatewaySession::new(transport, config());
        let mut handler = RecordingHandler::completing_on("DONE");

        server.push(HELLO_1000);
        server.push(&dispatch("READY"));
        server.push(r#"{"op":11}"#);
        server.push(&dispatch("GUILD_CREATE"));
        server.push(&dispatch("DONE"));

        session.run(&mut handler).await.unwrap();

        assert_eq!(
            handler.names(),
            vec!["HELLO", "READY", "HEARTBEAT_ACK", "GUILD_CREATE", "DONE"]
        );
    }

    #[tokio::test]
    async fn dispatch_before_hello_is_forwarded_while_identifying() {
        let (transport, server) = fake_transport();
        let mut session = GatewaySession::new(transport, config());
        let mut handler = RecordingHandler::completing_on("DONE");

        server.push(&dispatch("DONE"));
        session.run(&mut handler).await.unwrap();

        assert_eq!(handler.names(), vec!["DONE"]);
        assert!(session.state().heartbeat_interval().is_none());
        assert!(session.state().is_closed());
    }

    #[tokio::test]
    async fn heartbeat_request_is_answered_immediately() {
        let (transport, mut server) = fake_transport();
        let mut session = GatewaySession::new(transport, config());
        let mut handler = RecordingHandler::completing_on("DONE");

        server.push(HELLO_1000);
        server.push(r#"{"op":1,"d":null}"#);
        server.push(&dispatch("DONE"));
        session.run(&mut handler).await.unwrap();

        let sent: Vec<String> = std::iter::from_fn(|| server.sent.try_recv().ok()).collect();
        assert_eq!(sent.len(), 2);
        assert_eq!(op(&sent[0]), 2);
        assert_eq!(sent[1], heartbeat_frame());
    }

    #[tokio::test]
    async fn stream_end_is_fatal_and_closes() {
        let (transport, server) = fake_transport();
        let mut session = GatewaySession::new(transport, config());
        let mut handler = RecordingHandler::completing_on("DONE");

        server.push(HELLO_1000);
        server.end();

        let err = session.run(&mut handler).await.unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::StreamEnded)));
        assert!(session.state().is_closed());
        assert!(!session.state().heartbeat_armed());
        assert!(server.is_closed());
    }

    #[tokio::test]
    async fn server_close_is_fatal() {
        let (transport, server) = fake_transport();
        let mut session = GatewaySession::new(transport, config());
        let mut handler = RecordingHandler::completing_on("DONE");

        server.push(HELLO_1000);
        server.fail(SessionError::Closed {
            code: Some(4004),
            reason: "Authentication failed.".to_string(),
        });

        let err = session.run(&mut handler).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Session(SessionError::Closed { code: Some(4004), .. })
        ));
    }

    #[tokio::test]
    async fn malformed_frame_is_fatal() {
        let (transport, server) = fake_transport();
        let mut session = GatewaySession::new(transport, config());
        let mut handler = RecordingHandler::completing_on("DONE");

        server.push(HELLO_1000);
        server.push("{not json");

        let err = session.run(&mut handler).await.unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::MalformedFrame(_))));
        assert!(session.state().is_closed());
    }

    #[tokio::test]
    async fn reconnect_and_invalid_session_are_fatal() {
        for (frame, resumable) in [(r#"{"op":7,"d":null}"#, None), (r#"{"op":9,"d":false}"#, Some(false))] {
            let (transport, server) = fake_transport();
            let mut session = GatewaySession::new(transport, config());
            let mut handler = RecordingHandler::completing_on("DONE");

            server.push(HELLO_1000);
            server.push(frame);

            let err = session.run(&mut handler).await.unwrap_err();
            match (err, resumable) {
                (Error::Session(SessionError::ReconnectRequested), None) => {}
                (Error::Session(SessionError::InvalidSession { resumable }), Some(expected)) => {
                    assert_eq!(resumable, expected)
                }
                (other, _) => panic!("unexpected error: {:?}", other),
            }
            assert!(session.state().is_closed());
        }
    }

    #[tokio::test]
    async fn handler_error_is_fatal() {
        let (transport, server) = fake_transport();
        let mut session = GatewaySession::new(transport, config());
        let mut handler = RecordingHandler::failing_on("BOOM");

        server.push(HELLO_1000);
        server.push(&dispatch("BOOM"));

        let err = session.run(&mut handler).await.unwrap_err();
        assert!(matches!(err, Error::Api(_)));
        assert!(session.state().is_closed());
        assert!(server.is_closed());
    }
}
