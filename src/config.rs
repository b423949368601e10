use tokio::time::Duration;

/// Client-side knobs for one execution service endpoint. The socket URL is
/// normally derived from the gateway URL by swapping the scheme.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub gateway_url: String,
    pub socket_url: String,
    /// Grace period between a terminal-pending signal and committing the
    /// terminal status, so trailing frames still land in the transcript.
    pub terminal_debounce: Duration,
    /// Defensive ceiling on one streaming session. `None` disables it and the
    /// session then relies entirely on the peer to terminate.
    pub max_session: Option<Duration>,
    pub channel_buffer: usize,
}

impl ClientConfig {
    pub fn for_gateway(gateway_url: impl Into<String>) -> Self {
        let gateway_url = gateway_url.into();
        let socket_url = derive_socket_url(&gateway_url);
        Self {
            gateway_url,
            socket_url,
            ..Self::default()
        }
    }

    pub fn with_socket_url(mut self, socket_url: impl Into<String>) -> Self {
        self.socket_url = socket_url.into();
        self
    }

    pub fn with_terminal_debounce(mut self, debounce: Duration) -> Self {
        self.terminal_debounce = debounce;
        self
    }

    pub fn with_max_session(mut self, max_session: Option<Duration>) -> Self {
        self.max_session = max_session;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8000".to_string(),
            socket_url: "ws://localhost:8000".to_string(),
            terminal_debounce: Duration::from_millis(150),
            max_session: Some(Duration::from_secs(300)),
            channel_buffer: 256,
        }
    }
}

fn derive_socket_url(gateway_url: &str) -> String {
    if let Some(rest) = gateway_url.strip_prefix("https://") {
        return format!("wss://{}", rest);
    }
    if let Some(rest) = gateway_url.strip_prefix("http://") {
        return format!("ws://{}", rest);
    }
    gateway_url.to_string()
}
