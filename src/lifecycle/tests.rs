#[cfg(test)]
mod tests {
    use crate::error_handling::types::LifecycleError;
    use crate::lifecycle::{
        validate_interface, CaptureCommand, CaptureState, ProcessLifecycleManager, Termination,
    };
    use nix::errno::Errno;
    use nix::sys::signal;
    use nix::unistd::Pid;
    use serial_test::serial;
    use std::time::Duration;

    const LONG: Duration = Duration::from_secs(30);

    // Helper: a manager whose capture process is a plain long sleep
    fn sleeper() -> ProcessLifecycleManager {
        ProcessLifecycleManager::new(
            CaptureCommand::new("sleep", vec!["30".to_string()]),
            Duration::from_secs(5),
        )
    }

    // Helper: a process that ignores SIGTERM
    fn stubborn(grace: Duration) -> ProcessLifecycleManager {
        ProcessLifecycleManager::new(
            CaptureCommand::new(
                "sh",
                vec!["-c".to_string(), "trap '' TERM; exec sleep 30".to_string()],
            ),
            grace,
        )
    }

    fn is_gone(pid: u32) -> bool {
        signal::kill(Pid::from_raw(pid as i32), None) == Err(Errno::ESRCH)
    }

    #[test]
    fn test_validate_interface() {
        for ok in ["eth0", "wlp3s0", "br-lan", "eth0.100", "veth1@if3", "en0:1"] {
            assert!(validate_interface(ok).is_ok(), "rejected {}", ok);
        }
        let too_long = "a".repeat(65);
        for bad in ["", "-i", "--help", "eth0; rm -rf /", "eth 0", "eth0/1", too_long.as_str()] {
            assert!(
                matches!(validate_interface(bad), Err(LifecycleError::InvalidInterface(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_start_reports_running() {
        let manager = sleeper();
        assert_eq!(manager.state(), CaptureState::Idle);

        let status = manager.start("eth0", LONG).await.unwrap();
        assert_eq!(status.state, CaptureState::Running);
        assert_eq!(status.interface.as_deref(), Some("eth0"));
        assert!(status.process_id.is_some());
        assert!(status.expires_at.unwrap() > status.started_at.unwrap());
        assert_eq!(manager.status(), status);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_restart_stops_previous_process_first() {
        let manager = sleeper();
        let first = manager.start("eth0", LONG).await.unwrap();
        let first_pid = first.process_id.unwrap();

        let second = manager.start("eth1", LONG).await.unwrap();
        let second_pid = second.process_id.unwrap();

        assert_ne!(first_pid, second_pid);
        assert!(is_gone(first_pid), "previous capture process still alive");
        assert!(!is_gone(second_pid));
        assert_eq!(manager.status().interface.as_deref(), Some("eth1"));

        manager.stop().await.unwrap();
        assert!(is_gone(second_pid));
    }

    #[tokio::test]
    #[serial]
    async fn test_concurrent_starts_leave_one_process() {
        let manager = sleeper();
        let mut handles = Vec::new();
        for i in 0..4 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.start(&format!("eth{}", i), LONG).await.unwrap()
            }));
        }
        let mut pids = Vec::new();
        for handle in handles {
            pids.push(handle.await.unwrap().process_id.unwrap());
        }

        let alive: Vec<u32> = pids.iter().copied().filter(|pid| !is_gone(*pid)).collect();
        assert_eq!(alive.len(), 1);
        assert_eq!(manager.status().process_id, Some(alive[0]));

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_timeout_returns_to_idle() {
        let manager = sleeper();
        let status = manager
            .start("eth0", Duration::from_millis(200))
            .await
            .unwrap();
        let pid = status.process_id.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(manager.state(), CaptureState::Idle);
        assert_eq!(manager.status().process_id, None);
        assert!(is_gone(pid));
        assert_eq!(manager.stop().await.unwrap(), None);
    }

    #[tokio::test]
    #[serial]
    async fn test_stale_timeout_does_not_stop_replacement() {
        let manager = sleeper();
        manager
            .start("eth0", Duration::from_millis(200))
            .await
            .unwrap();
        let replacement = manager.start("eth0", LONG).await.unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(manager.state(), CaptureState::Running);
        assert_eq!(manager.status().process_id, replacement.process_id);
        manager.stop().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_stop_when_idle_is_ok() {
        let manager = sleeper();
        assert_eq!(manager.stop().await.unwrap(), None);
        assert_eq!(manager.state(), CaptureState::Idle);
    }

    #[tokio::test]
    #[serial]
    async fn test_stop_after_process_exited_is_success() {
        let manager = ProcessLifecycleManager::new(
            CaptureCommand::new("true", Vec::new()),
            Duration::from_secs(1),
        );
        manager.start("eth0", LONG).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        // a crashed capture leaves the slot looking busy until the next call
        assert_eq!(manager.state(), CaptureState::Running);
        let termination = manager.stop().await.unwrap();
        assert_eq!(termination, Some(Termination::AlreadyExited));
        assert_eq!(manager.state(), CaptureState::Idle);
    }

    #[tokio::test]
    #[serial]
    async fn test_stop_escalates_to_kill() {
        let manager = stubborn(Duration::from_millis(300));
        let pid = manager.start("eth0", LONG).await.unwrap().process_id.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let termination = manager.stop().await.unwrap();
        assert_eq!(termination, Some(Termination::Killed));
        assert!(is_gone(pid));
    }

    #[tokio::test]
    #[serial]
    async fn test_stopping_state_is_observable() {
        let manager = stubborn(Duration::from_millis(500));
        manager.start("eth0", LONG).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut status = manager.subscribe();
        let stopper = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.stop().await })
        };

        let observed = tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(|status| status.state == CaptureState::Stopping),
        )
        .await
        .expect("never saw Stopping")
        .map(|status| status.process_id.is_some())
        .unwrap();
        assert!(observed);

        stopper.await.unwrap().unwrap();
        assert_eq!(manager.state(), CaptureState::Idle);
    }

    #[tokio::test]
    #[serial]
    async fn test_invalid_interface_spawns_nothing() {
        let manager = sleeper();
        let result = manager.start("-w/tmp/out", LONG).await;
        assert!(matches!(result, Err(LifecycleError::InvalidInterface(_))));
        assert_eq!(manager.state(), CaptureState::Idle);
    }

    #[tokio::test]
    #[serial]
    async fn test_spawn_failure_leaves_idle() {
        let manager = ProcessLifecycleManager::new(
            CaptureCommand::new("/nonexistent/capture", Vec::new()),
            Duration::from_secs(1),
        );
        let result = manager.start("eth0", LONG).await;
        assert!(matches!(result, Err(LifecycleError::SpawnFailed(_))));
        assert_eq!(manager.state(), CaptureState::Idle);
    }
}
