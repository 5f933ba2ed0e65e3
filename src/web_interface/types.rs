use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::lifecycle::ProcessLifecycleManager;
use crate::lookup::{SystemTable, VendorLookup};
use crate::network::PingSweeper;

/// Everything the HTTP handlers share. Built once by the controller.
pub struct ServiceState {
    pub lifecycle: ProcessLifecycleManager,
    pub vendors: Arc<dyn VendorLookup>,
    pub systems: SystemTable,
    pub sweeper: PingSweeper,
    pub pubsub_endpoint: String,
    pub reconnect_interval: Duration,
    pub default_timeout: Duration,
}

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub interface: String,
    /// Seconds; the configured default when absent.
    pub timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PingRequest {
    pub network: String,
}

#[derive(Debug, Serialize)]
pub struct VendorResponse {
    pub vendor: String,
}

#[derive(Debug, Serialize)]
pub struct SystemResponse {
    pub system: String,
}
