use log::info;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use warp::Filter;

use super::routes::{handle_rejection, routes};
use super::types::ServiceState;
use crate::error_handling::types::WebError;

/// HTTP API, event stream and browser UI
pub struct WebServer {
    state: Arc<ServiceState>,
    address: SocketAddr,
}

impl WebServer {
    pub fn new(state: Arc<ServiceState>, address: SocketAddr) -> Self {
        Self { state, address }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Fails if the listen address cannot be bound right now.
    pub fn check_address(&self) -> Result<(), WebError> {
        std::net::TcpListener::bind(self.address)
            .map(drop)
            .map_err(|e| WebError::BindFailed(format!("{}: {}", self.address, e)))
    }

    /// Serves until `shutdown` resolves. Open event streams are dropped with
    /// the server.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let routes = routes(self.state).recover(handle_rejection);

        info!("Web interface listening on http://{}", self.address);
        tokio::select! {
            _ = warp::serve(routes).run(self.address) => {}
            _ = shutdown => info!("Web interface shutting down"),
        }
    }
}
