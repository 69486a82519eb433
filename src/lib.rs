pub mod assistant;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod contact;
pub mod models;
pub mod server;
pub mod session;

use assistant::Assistant;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Chat Server Address: {}", args.server_addr);
    match args.http_port {
        Some(port) => info!("HTTP API Port: {}", port),
        None => info!("HTTP API: disabled"),
    }
    info!("Replies Path: {}", args.replies_path.as_deref().unwrap_or("(built-in)"));
    info!(
        "Typing Delay: {}-{} ms",
        args.typing_delay_min_ms,
        args.typing_delay_max_ms
    );
    info!("Handshake Signing: {}", args.server_api_key.is_some());
    info!("TLS Enabled: {}", args.enable_tls);
    info!("Catalog Size: {}", catalog::builtin().len());
    info!("-------------------------");

    if args.enable_tls {
        server::install_crypto_provider();
    }

    let assistant = Arc::new(Mutex::new(Assistant::new(&args)?));
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, assistant, args.clone());
    server.run().await?;

    Ok(())
}
