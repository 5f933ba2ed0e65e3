use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::shutdown::{wait_for_termination, ShutdownCoordinator};
use crate::capture::{run_publisher, PublishOptions};
use crate::configuration::config::Config;
use crate::error_handling::types::*;
use crate::lifecycle::{CaptureCommand, ProcessLifecycleManager};
use crate::lookup::{OuiVendorLookup, SystemTable, VendorLookup};
use crate::network::PingSweeper;
use crate::web_interface::{ServiceState, WebServer};

/// Time granted to background tasks between the shutdown signal and abort.
const TASK_GRACE: Duration = Duration::from_secs(5);

/// Composition root: builds every component from the configuration and
/// drives one of the two roles of the binary.
pub struct Controller {
    config: Config,
    config_file: Option<PathBuf>,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate().map_err(|err| {
            error!("Invalid configuration: {}", err);
            ControllerError::Config(err)
        })?;
        info!("Controller initialized");
        Ok(Self {
            config,
            config_file: None,
        })
    }

    /// Records the file the configuration was read from. Capture processes
    /// started by `serve` are pointed at the same file.
    pub fn with_config_file(mut self, path: PathBuf) -> Self {
        self.config_file = Some(path);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Assembles the state shared by the HTTP handlers.
    pub async fn build_state(&self) -> Result<ServiceState, ControllerError> {
        let systems = SystemTable::from_file(&self.config.lookup.systems_file)?;

        let vendors: Arc<dyn VendorLookup> = Arc::new(
            tokio::task::spawn_blocking(OuiVendorLookup::load)
                .await
                .map_err(|e| {
                    ControllerError::InitializationFailed(format!("vendor database: {}", e))
                })?,
        );

        let command = CaptureCommand::from_settings(
            &self.config.capture,
            &self.config.pubsub.bind,
            self.config_file(),
        )?;
        let lifecycle = ProcessLifecycleManager::new(command, self.config.stop_grace());

        Ok(ServiceState {
            lifecycle,
            vendors,
            systems,
            sweeper: PingSweeper::new(self.config.ping.clone()),
            pubsub_endpoint: self.config.pubsub.endpoint.clone(),
            reconnect_interval: self.config.reconnect_interval(),
            default_timeout: Duration::from_secs(self.config.capture.default_timeout_secs),
        })
    }

    /// `serve`: runs the web interface until SIGINT/SIGTERM, then stops the
    /// capture process.
    pub async fn run(&mut self) -> Result<(), ControllerError> {
        let state = Arc::new(self.build_state().await?);
        let lifecycle = state.lifecycle.clone();

        let server = WebServer::new(state, self.config.web_address()?);
        server.check_address()?;

        let mut coordinator = ShutdownCoordinator::new(TASK_GRACE);
        coordinator.manage(lifecycle);
        let signal = coordinator.signal();
        coordinator.register("web server", tokio::spawn(server.run(signal.recv())));

        let name = wait_for_termination().await.map_err(|e| {
            ControllerError::InitializationFailed(format!("signal handlers: {}", e))
        })?;
        info!("Received {}, shutting down", name);
        coordinator.shutdown().await;
        Ok(())
    }

    /// `publish`: captures and publishes until SIGINT/SIGTERM or until the
    /// capture source fails.
    pub async fn publish(&self, options: PublishOptions) -> Result<(), ControllerError> {
        let coordinator = ShutdownCoordinator::new(TASK_GRACE);
        let pipeline = run_publisher(options, coordinator.signal().recv());
        tokio::pin!(pipeline);

        tokio::select! {
            result = &mut pipeline => {
                result?;
            }
            name = wait_for_termination() => {
                let name = name.map_err(|e| {
                    ControllerError::InitializationFailed(format!("signal handlers: {}", e))
                })?;
                info!("Received {}, shutting down", name);
                coordinator.shutdown().await;
                pipeline.await?;
            }
        }
        Ok(())
    }

    /// Publisher options from configuration, before command-line overrides.
    pub fn publish_options(&self, interface: String) -> PublishOptions {
        PublishOptions {
            interface,
            bind: self.config.pubsub.bind.clone(),
            backend: crate::configuration::CaptureBackend::Tcpdump,
            tcpdump_program: self.config.capture.tcpdump_program.clone(),
            channel_capacity: self.config.pubsub.channel_capacity,
            stop_grace: self.config.stop_grace(),
        }
    }
}
