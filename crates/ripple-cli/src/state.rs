//! Application state wiring the adapters together.
//!
//! AppState pins the session core's ports to the concrete infra
//! implementations: `RestClient` for the directory and message log,
//! `WsTransport` for the event stream.

use std::sync::Arc;

use ripple_infra::config::{default_data_dir, load_client_config};
use ripple_infra::rest::RestClient;
use ripple_infra::ws::WsTransport;
use ripple_types::config::ClientConfig;
use ripple_types::participant::ParticipantId;

use crate::cli::Cli;

/// Shared application state for CLI commands.
#[derive(Clone)]
pub struct AppState {
    pub config: ClientConfig,
    pub user: ParticipantId,
    pub rest: Arc<RestClient>,
    pub transport: Arc<WsTransport>,
}

impl AppState {
    /// Initialize the application state: load config, wire adapters.
    pub async fn init(cli: &Cli) -> anyhow::Result<Self> {
        if cli.user.is_empty() {
            anyhow::bail!("no participant id: pass --user or set RIPPLE_USER");
        }
        let user = ParticipantId::new(cli.user.clone());

        let mut config = load_client_config(&default_data_dir()).await;
        if let Some(ref server) = cli.server {
            config.server.base_url = server.clone();
            config.server.ws_url = None;
        }

        let rest = Arc::new(RestClient::new(config.server.base_url.clone(), user.clone()));
        let transport = Arc::new(WsTransport::new(
            config.server.event_stream_url(),
            config.reconnect.clone(),
        ));

        Ok(Self {
            config,
            user,
            rest,
            transport,
        })
    }
}
