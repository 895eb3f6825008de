use tokio::sync::broadcast;

/// Broadcasts a single stop signal to event handlers and the detection feed.
///
/// Usage:
/// ```no_run
/// use crimesound_sim::shutdown::ShutdownCoordinator;
///
/// # async fn example() {
/// let coordinator = ShutdownCoordinator::new();
/// let mut shutdown_rx = coordinator.subscribe();
///
/// tokio::spawn(async move {
///     let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
///     loop {
///         tokio::select! {
///             _ = ticker.tick() => { /* periodic work */ }
///             _ = shutdown_rx.recv() => break,
///         }
///     }
/// });
///
/// coordinator.shutdown();
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(10);
        Self { shutdown_tx }
    }

    /// Receiver that yields once shutdown is triggered
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal every current subscriber to stop
    pub fn shutdown(&self) {
        // No subscribers simply means nothing is left to stop
        let _ = self.shutdown_tx.send(());
    }

    pub fn has_subscribers(&self) -> bool {
        self.shutdown_tx.receiver_count() > 0
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_shutdown_signal() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();

        let task = tokio::spawn(async move {
            rx.recv().await.ok();
            "stopped"
        });

        coordinator.shutdown();

        let result = timeout(Duration::from_millis(100), task).await;
        assert_eq!(result.unwrap().unwrap(), "stopped");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx1 = coordinator.subscribe();
        let mut rx2 = coordinator.subscribe();
        assert!(coordinator.has_subscribers());

        coordinator.shutdown();

        assert!(timeout(Duration::from_millis(100), rx1.recv()).await.is_ok());
        assert!(timeout(Duration::from_millis(100), rx2.recv()).await.is_ok());
    }

    #[test]
    fn test_clone_shares_channel() {
        let coordinator1 = ShutdownCoordinator::new();
        let coordinator2 = coordinator1.clone();

        let mut rx = coordinator1.subscribe();
        coordinator2.shutdown();

        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_shutdown_without_subscribers() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.has_subscribers());
        coordinator.shutdown();
    }
}
