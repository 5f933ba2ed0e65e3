use log::{info, warn};
use std::io;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::lifecycle::ProcessLifecycleManager;

/// Receiving side of the process-wide shutdown flag.
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once shutdown has been requested or the coordinator is gone.
    pub async fn recv(mut self) {
        let _ = self.receiver.wait_for(|stop| *stop).await;
    }
}

/// Owns everything that has to be wound down when the process exits: the
/// background tasks and, on the serving side, the capture process.
///
/// `shutdown` consumes the coordinator, so it runs once.
pub struct ShutdownCoordinator {
    sender: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    lifecycle: Option<ProcessLifecycleManager>,
    grace: Duration,
}

impl ShutdownCoordinator {
    pub fn new(grace: Duration) -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender,
            tasks: Vec::new(),
            lifecycle: None,
            grace,
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn register(&mut self, name: &'static str, task: JoinHandle<()>) {
        self.tasks.push((name, task));
    }

    pub fn manage(&mut self, lifecycle: ProcessLifecycleManager) {
        self.lifecycle = Some(lifecycle);
    }

    /// Signals every task, waits up to the grace period for each, aborts the
    /// stragglers, then stops the capture process.
    pub async fn shutdown(self) {
        info!("Shutting down {} tasks", self.tasks.len());
        self.sender.send_replace(true);

        for (name, mut task) in self.tasks {
            match tokio::time::timeout(self.grace, &mut task).await {
                Ok(Ok(())) => info!("{} stopped", name),
                Ok(Err(e)) => warn!("{} ended abnormally: {}", name, e),
                Err(_) => {
                    warn!("{} did not stop within {:?}, aborting it", name, self.grace);
                    task.abort();
                }
            }
        }

        if let Some(lifecycle) = self.lifecycle {
            match lifecycle.stop().await {
                Ok(Some(termination)) => info!("Capture process stopped ({:?})", termination),
                Ok(None) => {}
                Err(e) => warn!("Failed to stop capture process: {}", e),
            }
        }
        info!("Shutdown complete");
    }
}

/// Waits for SIGINT or SIGTERM and returns the name of the one received.
pub async fn wait_for_termination() -> io::Result<&'static str> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    };
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{CaptureCommand, CaptureState};
    use serial_test::serial;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_signal_reaches_tasks() {
        let mut coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let signal = coordinator.signal();
        assert!(!signal.is_shutdown());

        let saw_shutdown = Arc::new(AtomicBool::new(false));
        let flag = saw_shutdown.clone();
        let task_signal = signal.clone();
        coordinator.register(
            "worker",
            tokio::spawn(async move {
                task_signal.recv().await;
                flag.store(true, Ordering::SeqCst);
            }),
        );

        coordinator.shutdown().await;
        assert!(saw_shutdown.load(Ordering::SeqCst));
        assert!(signal.is_shutdown());
    }

    #[tokio::test]
    async fn test_stuck_task_is_aborted() {
        let mut coordinator = ShutdownCoordinator::new(Duration::from_millis(50));
        coordinator.register("stuck", tokio::spawn(std::future::pending::<()>()));
        tokio::time::timeout(Duration::from_secs(2), coordinator.shutdown())
            .await
            .expect("shutdown hung on a stuck task");
    }

    #[tokio::test]
    #[serial]
    async fn test_capture_process_is_stopped() {
        let lifecycle = ProcessLifecycleManager::new(
            CaptureCommand::new("sleep", vec!["30".to_string()]),
            Duration::from_secs(2),
        );
        lifecycle.start("eth0", Duration::from_secs(30)).await.unwrap();

        let mut coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        coordinator.manage(lifecycle.clone());
        coordinator.shutdown().await;

        assert_eq!(lifecycle.state(), CaptureState::Idle);
    }
}
