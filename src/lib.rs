pub mod channel;
pub mod config;
pub mod errors;
pub mod frames;
pub mod gateway;
pub mod models;
pub mod session;
pub mod transcript;

pub use channel::{ChannelConnection, ChannelConnector, ChannelEvent, ChannelState};
pub use config::ClientConfig;
pub use errors::{SessionError, SessionResult};
pub use gateway::{Gateway, HttpGateway};
pub use models::{Job, Language, LogKind, LogLine, SessionStatus};
pub use session::SessionController;
pub use transcript::TerminalLog;

/// Installs the fmt subscriber, honoring `RUST_LOG`. Safe to call more than
/// once; later calls are no-ops.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
