pub mod api;

use crate::agent::DeclutterAgent;
use crate::cli::Args;
use crate::session::SessionStore;
use self::api::AppState;

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use log::info;

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct Server {
    addr: String,
    state: AppState,
}

impl Server {
    pub fn new(addr: String, agent: DeclutterAgent, args: &Args) -> Self {
        Self {
            addr,
            state: AppState {
                agent,
                sessions: Arc::new(SessionStore::new(Duration::from_secs(args.session_ttl_secs))),
                max_image_bytes: args.max_image_bytes,
            },
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e|
            format!("Failed to bind HTTP server to {}: {}. Try a different address.", addr, e)
        )?;
        info!("HTTP API listening on: http://{}", addr);

        let sessions = &self.state.sessions;
        let sweep_every = sessions.idle_ttl().min(MAX_SWEEP_INTERVAL).max(Duration::from_secs(1));
        let _sweeper = sessions.spawn_sweeper(sweep_every);

        let app = api::router(self.state.clone());
        axum::serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}
