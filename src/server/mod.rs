pub mod api;
pub mod websocket;

use crate::assistant::Assistant;
use crate::cli::Args;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Pins rustls to `ring`; `aws-lc-rs` is compiled in as well via `axum-server`.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

pub struct Server {
    addr: String,
    assistant: Arc<Mutex<Assistant>>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, assistant: Arc<Mutex<Assistant>>, args: Args) -> Self {
        Self { addr, assistant, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(http_port) = self.args.http_port {
            self.start_http_server(http_port).await?;
        }

        self.start_ws_server().await?;

        Ok(())
    }

    async fn start_http_server(&self, http_port: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(http_port, self.assistant.clone(), self.args.clone()).await
    }

    async fn start_ws_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        websocket::start_ws_server(
            &self.addr,
            self.assistant.clone(),
            self.args.server_api_key.clone(),
            self.args.clone()
        ).await
    }
}
