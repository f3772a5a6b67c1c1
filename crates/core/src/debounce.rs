use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Collapses bursts of signals into one action run after `quiet` has passed
/// without a new signal.
pub struct Debouncer {
    tx: mpsc::UnboundedSender<()>,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Debouncer {
    pub fn spawn<F, Fut>(quiet: Duration, mut action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    signal = rx.recv() => if signal.is_none() { return },
                }

                let mut deadline = Instant::now() + quiet;
                let mut closed = false;
                loop {
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = sleep_until(deadline) => break,
                        signal = rx.recv() => match signal {
                            Some(()) => deadline = Instant::now() + quiet,
                            None => {
                                closed = true;
                                break;
                            }
                        },
                    }
                }

                action().await;
                if closed {
                    return;
                }
            }
        });

        Self {
            tx,
            cancel_token,
            handle,
        }
    }

    pub fn signal(&self) {
        let _ = self.tx.send(());
    }

    /// Stop without running a pending action.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();
        let _ = (&mut self.handle).await;
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::advance;

    fn counting() -> (Arc<AtomicUsize>, Debouncer) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let debouncer = Debouncer::spawn(DEFAULT_QUIET_PERIOD, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (runs, debouncer)
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_once() {
        let (runs, debouncer) = counting();
        for _ in 0..5 {
            debouncer.signal();
            settle().await;
            advance(Duration::from_millis(50)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        advance(Duration::from_millis(250)).await;
        settle().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_run_separately() {
        let (runs, debouncer) = counting();
        debouncer.signal();
        settle().await;
        advance(Duration::from_millis(300)).await;
        settle().await;

        debouncer.signal();
        settle().await;
        advance(Duration::from_millis(300)).await;
        settle().await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending() {
        let (runs, debouncer) = counting();
        debouncer.signal();
        settle().await;
        debouncer.cancel();
        advance(Duration::from_millis(300)).await;
        settle().await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
