pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod image;
pub mod llm;
pub mod models;
pub mod server;
pub mod session;
pub mod text;

use agent::DeclutterAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("API Key: {}", args.masked_api_key());
    info!("Model: {}", args.model.as_deref().unwrap_or("adapter default"));
    info!("Base URL: {}", args.base_url.as_deref().unwrap_or("adapter default"));
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("Max Image Bytes: {}", args.max_image_bytes);
    info!("Session TTL: {}s", args.session_ttl_secs);
    info!("-------------------------");

    let agent = DeclutterAgent::new(&args)?;
    let server = Server::new(args.server_addr.clone(), agent, &args);
    server.run().await?;

    Ok(())
}
