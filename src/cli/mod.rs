use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the chat WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the HTTP JSON API (catalog, contact form, quick actions). Disabled if unset.
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Optional shared secret. If set, WebSocket clients must sign the handshake (ts + HMAC sig).
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    // --- Assistant Args ---
    /// Optional JSON file overriding the built-in reply table.
    #[arg(long, env = "REPLIES_PATH")]
    pub replies_path: Option<String>,

    /// Shortest simulated typing pause before the assistant answers, in milliseconds.
    #[arg(long, env = "TYPING_DELAY_MIN_MS", default_value = "1000")]
    pub typing_delay_min_ms: u64,

    /// Longest simulated typing pause before the assistant answers, in milliseconds.
    #[arg(long, env = "TYPING_DELAY_MAX_MS", default_value = "2000")]
    pub typing_delay_max_ms: u64,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    // --- TLS Args ---
    /// Optional path to the TLS certificate file (PEM format) for enabling WSS/HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS/HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) if self.enable_tls => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}
