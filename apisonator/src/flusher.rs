use crate::metrics_defs::FLUSHES;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use threescale::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Periodically flushes the upstream client on a background task.
///
/// The first flush happens one full interval after spawning. Flush errors are
/// logged and otherwise ignored. Nothing is flushed on stop.
pub struct Flusher {
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Flusher {
    /// Must be called from within a tokio runtime.
    pub fn spawn(client: Arc<dyn Client>, period: Duration) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(flush_loop(client, period, stop_rx));

        Flusher {
            stop_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signals the task to stop and waits for it to exit. Once this returns no
    /// further flush is started. Calling it again is a no-op.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(true);

        let handle = self.handle.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!("flusher task panicked: {}", e);
        }
    }
}

async fn flush_loop(
    client: Arc<dyn Client>,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    tracing::info!(period_secs = period.as_secs_f64(), "flusher started");

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // Also fires when the sender is dropped
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {
                match client.flush().await {
                    Ok(()) => shared::counter!(FLUSHES, "result" => "ok").increment(1),
                    Err(e) => {
                        tracing::warn!(error = %e, "flush failed");
                        shared::counter!(FLUSHES, "result" => "error").increment(1);
                    }
                }
            }
        }
    }

    // Stop the timer before reporting the task as done
    drop(ticker);
    tracing::info!("flusher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::MockClient;
    use std::sync::atomic::Ordering;
    use threescale::AuthorizationResult;

    #[tokio::test(start_paused = true)]
    async fn test_flushes_every_period() {
        let client = MockClient::new(Ok(AuthorizationResult::authorized()));
        let flusher = Flusher::spawn(client.clone(), Duration::from_secs(15));

        // Let the task register its timer
        tokio::task::yield_now().await;
        assert_eq!(client.flush_calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(14_900)).await;
        assert_eq!(client.flush_calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(client.flush_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(client.flush_calls.load(Ordering::SeqCst), 3);
        assert!(flusher.is_running());

        flusher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_flush_after_stop() {
        let client = MockClient::new(Ok(AuthorizationResult::authorized()));
        let flusher = Flusher::spawn(client.clone(), Duration::from_secs(15));

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(client.flush_calls.load(Ordering::SeqCst), 1);

        flusher.stop().await;
        assert!(!flusher.is_running());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(client.flush_calls.load(Ordering::SeqCst), 1);

        // Stopping twice is fine
        flusher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_errors_keep_the_loop_running() {
        let client = MockClient::new(Err("upstream down".into()));
        let flusher = Flusher::spawn(client.clone(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(client.flush_calls.load(Ordering::SeqCst), 3);
        assert!(flusher.is_running());

        flusher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_flusher_ends_the_task() {
        let client = MockClient::new(Ok(AuthorizationResult::authorized()));
        let flusher = Flusher::spawn(client.clone(), Duration::from_secs(1));
        drop(flusher);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(client.flush_calls.load(Ordering::SeqCst), 0);
        // The task released its reference to the client
        assert_eq!(Arc::strong_count(&client), 1);
    }
}
