use crate::errors::SessionResult;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug)]
pub enum ChannelEvent {
    Frame(String),
    TransportError(String),
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// One established streaming connection, as handed back by a connector:
/// an event stream, a close signal, and the task reading the socket.
pub struct ChannelConnection {
    pub events: mpsc::Receiver<ChannelEvent>,
    pub close: oneshot::Sender<()>,
    pub reader: Option<JoinHandle<()>>,
}

#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self, job_id: &str) -> SessionResult<ChannelConnection>;
}

/// Production connector dialing `<socket-url>/terminal/<job-id>`.
pub struct WsConnector {
    socket_url: String,
    buffer: usize,
}

impl WsConnector {
    pub fn new(socket_url: impl Into<String>, buffer: usize) -> Self {
        Self {
            socket_url: socket_url.into(),
            buffer,
        }
    }
}

#[async_trait]
impl ChannelConnector for WsConnector {
    async fn connect(&self, job_id: &str) -> SessionResult<ChannelConnection> {
        let url = format!(
            "{}/terminal/{}",
            self.socket_url.trim_end_matches('/'),
            job_id
        );
        let (socket, _) = connect_async(url).await?;
        tracing::debug!(job_id, "terminal channel connected");

        let (events_tx, events_rx) = mpsc::channel(self.buffer);
        let (close_tx, mut close_rx) = oneshot::channel::<()>();
        let reader = tokio::spawn(async move {
            let (mut sink, mut stream) = socket.split();
            loop {
                tokio::select! {
                    _ = &mut close_rx => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    frame = stream.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            if events_tx.send(ChannelEvent::Frame(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            let _ = events_tx.send(ChannelEvent::Closed).await;
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(error)) => {
                            let _ = events_tx
                                .send(ChannelEvent::TransportError(error.to_string()))
                                .await;
                            break;
                        }
                    }
                }
            }
        });

        Ok(ChannelConnection {
            events: events_rx,
            close: close_tx,
            reader: Some(reader),
        })
    }
}

struct ChannelHandle {
    job_id: String,
    generation: u64,
    state: ChannelState,
    listener: Option<JoinHandle<()>>,
    close_tx: Option<oneshot::Sender<()>>,
    reader: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    fn connecting(generation: u64, job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            generation,
            state: ChannelState::Connecting,
            listener: None,
            close_tx: None,
            reader: None,
        }
    }

    fn is_live(&self) -> bool {
        matches!(self.state, ChannelState::Connecting | ChannelState::Open)
    }

    /// Listener detachment comes first: aborting the listener drops the event
    /// receiver, so anything the peer still transmits after the close request
    /// can never reach the decoder. Idempotent.
    fn close(&mut self) {
        if self.state == ChannelState::Closed {
            return;
        }
        self.state = ChannelState::Closing;
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let Some(close_tx) = self.close_tx.take() {
            if close_tx.send(()).is_err() {
                // reader already gone; nothing left to close gracefully
                if let Some(reader) = self.reader.take() {
                    reader.abort();
                }
            }
        }
        self.state = ChannelState::Closed;
        tracing::debug!(job_id = %self.job_id, generation = self.generation, "channel closed");
    }
}

/// Owns at most one live streaming channel. Opening tears the previous
/// channel down completely before the new connection starts; closing is
/// idempotent.
#[derive(Default)]
pub struct ChannelManager {
    active: Option<ChannelHandle>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(
        &mut self,
        connector: &dyn ChannelConnector,
        generation: u64,
        job_id: &str,
    ) -> SessionResult<mpsc::Receiver<ChannelEvent>> {
        self.teardown();
        self.active = Some(ChannelHandle::connecting(generation, job_id));
        let connection = match connector.connect(job_id).await {
            Ok(connection) => connection,
            Err(error) => {
                if let Some(handle) = self.active.as_mut() {
                    handle.state = ChannelState::Closed;
                }
                return Err(error);
            }
        };
        if let Some(handle) = self.active.as_mut() {
            handle.state = ChannelState::Open;
            handle.close_tx = Some(connection.close);
            handle.reader = connection.reader;
        }
        Ok(connection.events)
    }

    /// Registers the task consuming the event receiver for the active
    /// channel, so teardown can detach it before requesting close.
    pub fn attach_listener(&mut self, task: JoinHandle<()>) {
        if let Some(handle) = self.active.as_mut() {
            handle.listener = Some(task);
        }
    }

    pub fn teardown(&mut self) {
        if let Some(handle) = self.active.as_mut() {
            handle.close();
        }
    }

    /// Tears down only if the active channel still belongs to the given
    /// session generation; stale teardown requests are no-ops.
    pub fn teardown_if(&mut self, generation: u64) {
        if let Some(handle) = self.active.as_mut() {
            if handle.generation == generation {
                handle.close();
            }
        }
    }

    pub fn state(&self) -> ChannelState {
        self.active
            .as_ref()
            .map(|handle| handle.state)
            .unwrap_or(ChannelState::Closed)
    }

    pub fn is_live(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(ChannelHandle::is_live)
    }
}
