use crate::channel::{ChannelConnector, ChannelEvent, ChannelManager, ChannelState, WsConnector};
use crate::config::ClientConfig;
use crate::errors::{SessionError, SessionResult};
use crate::frames::{decode, FrameEvent, TerminalSignal};
use crate::gateway::{Gateway, HttpGateway};
use crate::models::{Job, Language, LogLine, SessionStatus, SubmitRequest};
use crate::transcript::TerminalLog;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

struct SessionState {
    generation: u64,
    session_id: String,
    status: SessionStatus,
    log: TerminalLog,
    job: Option<Job>,
    pending_terminal: Option<TerminalSignal>,
    submit_in_flight: bool,
}

impl SessionState {
    fn new() -> Self {
        Self {
            generation: 0,
            session_id: String::new(),
            status: SessionStatus::Idle,
            log: TerminalLog::new(),
            job: None,
            pending_terminal: None,
            submit_in_flight: false,
        }
    }
}

/// Coordinates submit, decode, channel lifecycle, and status transitions for
/// the single active execution session. All mutation of the transcript, the
/// status, and the channel goes through this controller.
///
/// Lock order where both are held: channel before state.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    channel: Arc<Mutex<ChannelManager>>,
    gateway: Arc<dyn Gateway>,
    connector: Arc<dyn ChannelConnector>,
    config: ClientConfig,
}

impl SessionController {
    pub fn new(
        config: ClientConfig,
        gateway: Arc<dyn Gateway>,
        connector: Arc<dyn ChannelConnector>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            channel: Arc::new(Mutex::new(ChannelManager::new())),
            gateway,
            connector,
            config,
        }
    }

    /// Wires the controller to a real execution service using the HTTP
    /// gateway and the websocket connector from the config URLs.
    pub fn for_service(config: ClientConfig) -> Self {
        let gateway = Arc::new(HttpGateway::new(config.gateway_url.clone()));
        let connector = Arc::new(WsConnector::new(
            config.socket_url.clone(),
            config.channel_buffer,
        ));
        Self::new(config, gateway, connector)
    }

    /// Submits the source for execution and streams the resulting terminal
    /// transcript. Any prior session is invalidated first: its channel is
    /// closed before the gateway call is issued, and its trailing frames can
    /// never land in the new transcript.
    ///
    /// Failures inside the session surface through the transcript and the
    /// status, never as an error from this call; the only error is `Busy`
    /// while a `submit` is in flight.
    pub async fn run(&self, source_code: &str, language: Language, stdin: &str) -> SessionResult<()> {
        let generation = {
            let mut channel = self.channel.lock().await;
            let mut state = self.state.lock().await;
            if state.submit_in_flight {
                return Err(SessionError::Busy("a submit is already in flight".to_string()));
            }
            channel.teardown();
            state.generation += 1;
            state.session_id = Uuid::new_v4().to_string();
            state.job = None;
            state.pending_terminal = None;
            state.status = SessionStatus::Submitting;
            state.log.reset();
            state.log.append(LogLine::system("Running code…"));
            tracing::debug!(
                session_id = %state.session_id,
                language = language.as_service_id(),
                "submitting job"
            );
            state.generation
        };

        let request = SubmitRequest {
            code: source_code.to_string(),
            language: language.as_service_id().to_string(),
            input: stdin.to_string(),
        };
        let response = match self.gateway.submit(&request).await {
            Ok(response) => response,
            Err(error) => {
                let mut state = self.state.lock().await;
                if state.generation == generation {
                    state.log.append(LogLine::error(format!("Error: {}", error.message())));
                    state.status = SessionStatus::Failed;
                }
                return Ok(());
            }
        };

        let job = Job {
            id: response.id,
            language,
            source_code: source_code.to_string(),
            stdin: stdin.to_string(),
        };

        {
            let mut channel = self.channel.lock().await;
            {
                let state = self.state.lock().await;
                if state.generation != generation {
                    // superseded while the gateway call was in flight
                    return Ok(());
                }
            }
            let events = match channel.open(self.connector.as_ref(), generation, &job.id).await {
                Ok(events) => events,
                Err(error) => {
                    drop(channel);
                    let mut state = self.state.lock().await;
                    if state.generation == generation {
                        state
                            .log
                            .append(LogLine::error(format!("Transport error: {}", error.message())));
                        state.status = SessionStatus::Failed;
                    }
                    return Ok(());
                }
            };
            {
                // flip to streaming before the listener attaches: frames the
                // peer emits at connect time must find the session streaming
                let mut state = self.state.lock().await;
                if state.generation != generation {
                    // cancelled while the connector was dialing
                    channel.teardown();
                    return Ok(());
                }
                state.job = Some(job);
                state.status = SessionStatus::Streaming;
            }
            channel.attach_listener(self.spawn_pump(generation, events));
        }

        if let Some(limit) = self.config.max_session {
            let controller = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                controller.expire(generation).await;
            });
        }

        Ok(())
    }

    /// One-shot submission without a streaming channel: awaits an externally
    /// supplied completion future and reports the outcome as log lines.
    /// Mutually exclusive with an active streaming session.
    pub async fn submit<F>(&self, on_result: F) -> SessionResult<()>
    where
        F: Future<Output = Result<String, String>> + Send,
    {
        let generation = {
            let channel = self.channel.lock().await;
            let mut state = self.state.lock().await;
            if state.status.is_active() || channel.is_live() {
                return Err(SessionError::Busy("a streaming session is active".to_string()));
            }
            state.generation += 1;
            state.session_id = Uuid::new_v4().to_string();
            state.job = None;
            state.pending_terminal = None;
            state.submit_in_flight = true;
            state.status = SessionStatus::Submitting;
            state.log.reset();
            state.log.append(LogLine::system("Submitting…"));
            state.generation
        };

        let outcome = on_result.await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            return Ok(());
        }
        state.submit_in_flight = false;
        match outcome {
            Ok(message) => {
                state.log.append(LogLine::system(message));
                state.status = SessionStatus::Completed;
            }
            Err(message) => {
                state.log.append(LogLine::error(message));
                state.status = SessionStatus::Failed;
            }
        }
        Ok(())
    }

    /// Tears the active session down and marks it `cancelled`. No-op unless
    /// a session is submitting or streaming.
    pub async fn cancel(&self) {
        {
            let mut state = self.state.lock().await;
            if !state.status.is_active() {
                return;
            }
            state.generation += 1;
            state.pending_terminal = None;
            state.submit_in_flight = false;
            state.status = SessionStatus::Cancelled;
            state.log.append(LogLine::system("Cancelled"));
        }
        self.channel.lock().await.teardown();
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.lock().await.status
    }

    pub async fn transcript(&self) -> Vec<LogLine> {
        self.state.lock().await.log.snapshot()
    }

    pub async fn active_job(&self) -> Option<Job> {
        self.state.lock().await.job.clone()
    }

    pub async fn channel_state(&self) -> ChannelState {
        self.channel.lock().await.state()
    }

    fn spawn_pump(&self, generation: u64, mut events: mpsc::Receiver<ChannelEvent>) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ChannelEvent::Frame(raw) => {
                        let Some(frame) = decode(&raw) else { continue };
                        controller.apply_frame(generation, frame).await;
                    }
                    ChannelEvent::TransportError(message) => {
                        controller
                            .fail_streaming(generation, format!("Transport error: {}", message))
                            .await;
                        break;
                    }
                    ChannelEvent::Closed => {
                        controller.on_channel_closed(generation).await;
                        break;
                    }
                }
            }
        })
    }

    async fn apply_frame(&self, generation: u64, frame: FrameEvent) {
        let schedule_commit = {
            let mut state = self.state.lock().await;
            if state.generation != generation || state.status != SessionStatus::Streaming {
                return;
            }
            state.log.append(frame.to_log_line());
            match frame.terminal_signal() {
                Some(signal) if state.pending_terminal.is_none() => {
                    state.pending_terminal = Some(signal);
                    true
                }
                _ => false,
            }
        };

        if schedule_commit {
            let controller = self.clone();
            let debounce = self.config.terminal_debounce;
            tokio::spawn(async move {
                tokio::time::sleep(debounce).await;
                controller.commit_terminal(generation).await;
            });
        }
    }

    async fn commit_terminal(&self, generation: u64) {
        {
            let mut state = self.state.lock().await;
            if state.generation != generation || state.status != SessionStatus::Streaming {
                return;
            }
            let Some(signal) = state.pending_terminal.take() else {
                return;
            };
            state.status = match signal {
                TerminalSignal::Completed => SessionStatus::Completed,
                TerminalSignal::Failed => SessionStatus::Failed,
            };
            tracing::debug!(
                session_id = %state.session_id,
                status = state.status.as_str(),
                "session reached terminal status"
            );
        }
        self.channel.lock().await.teardown_if(generation);
    }

    async fn on_channel_closed(&self, generation: u64) {
        {
            let mut state = self.state.lock().await;
            if state.generation != generation || state.status != SessionStatus::Streaming {
                return;
            }
            if state.pending_terminal.is_some() {
                // final status frame already observed; the debounce commit owns the flip
                return;
            }
            // silent close from the peer counts as a graceful completion
            state.status = SessionStatus::Completed;
        }
        self.channel.lock().await.teardown_if(generation);
    }

    async fn fail_streaming(&self, generation: u64, message: String) {
        {
            let mut state = self.state.lock().await;
            if state.generation != generation || state.status != SessionStatus::Streaming {
                return;
            }
            state.log.append(LogLine::error(message));
            state.pending_terminal = None;
            state.status = SessionStatus::Failed;
        }
        self.channel.lock().await.teardown_if(generation);
    }

    async fn expire(&self, generation: u64) {
        {
            let mut state = self.state.lock().await;
            if state.generation != generation || !state.status.is_active() {
                return;
            }
            state
                .log
                .append(LogLine::error("Session exceeded the maximum allowed duration"));
            state.pending_terminal = None;
            state.status = SessionStatus::Failed;
            tracing::warn!(session_id = %state.session_id, "session expired without terminal status");
        }
        self.channel.lock().await.teardown_if(generation);
    }
}
