use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

enum Input<T> {
    Value(u64, T),
    Cancel,
}

/// Coalesces a burst of values into the last one, emitted once the input has
/// been quiet for `window`.
///
/// A background task owns the timer: every new value restarts it, and only
/// the value present when it fires is forwarded. Values carry the generation
/// they were pushed in; [`Debouncer::cancel`] starts a new generation, so a
/// value the task emits while a cancel is still queued is never delivered.
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    generation: Arc<AtomicU64>,
    input: mpsc::UnboundedSender<Input<T>>,
    output: mpsc::UnboundedReceiver<(u64, T)>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        let (input, mut input_rx) = mpsc::unbounded_channel::<Input<T>>();
        let (output_tx, output) = mpsc::unbounded_channel::<(u64, T)>();

        let task = tokio::spawn(async move {
            loop {
                // Wait for the first value of a burst.
                let mut latest = match input_rx.recv().await {
                    Some(Input::Value(g, v)) => (g, v),
                    Some(Input::Cancel) => continue,
                    None => return,
                };

                // Restart the timer on every new value until it expires.
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(window) => {
                            if output_tx.send(latest).is_err() {
                                return;
                            }
                            break;
                        }
                        next = input_rx.recv() => match next {
                            Some(Input::Value(g, v)) => latest = (g, v),
                            Some(Input::Cancel) => break,
                            None => {
                                let _ = output_tx.send(latest);
                                return;
                            }
                        }
                    }
                }
            }
        });

        Self {
            window,
            generation: Arc::new(AtomicU64::new(0)),
            input,
            output,
            task,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn push(&self, value: T) {
        let generation = self.generation.load(Ordering::SeqCst);
        let _ = self.input.send(Input::Value(generation, value));
    }

    /// Drop any value still waiting for quiescence or waiting to be read,
    /// including one the task emits after this call returns.
    pub fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _ = self.input.send(Input::Cancel);
        while self.output.try_recv().is_ok() {}
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation.load(Ordering::SeqCst)
    }

    /// Next settled value. Pending forever while no input arrives.
    /// Cancel-safe: nothing is lost if the future is dropped.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            let (generation, value) = self.output.recv().await?;
            if self.is_current(generation) {
                return Some(value);
            }
        }
    }

    /// A settled value, if one is ready right now.
    pub fn try_next(&mut self) -> Option<T> {
        while let Ok((generation, value)) = self.output.try_recv() {
            if self.is_current(generation) {
                return Some(value);
            }
        }
        None
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout};

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_last_value() {
        let mut d = Debouncer::new(Duration::from_millis(300));
        for term in ["d", "du", "dun", "dune"] {
            d.push(term.to_string());
            sleep(Duration::from_millis(100)).await;
        }

        assert_eq!(d.next().await.as_deref(), Some("dune"));
        assert!(timeout(Duration::from_secs(5), d.next()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn separated_bursts_emit_separately() {
        let mut d = Debouncer::new(Duration::from_millis(300));
        d.push(1);
        d.push(2);
        sleep(Duration::from_millis(400)).await;
        d.push(3);

        assert_eq!(d.next().await, Some(2));
        assert_eq!(d.next().await, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending_value() {
        let mut d = Debouncer::new(Duration::from_millis(300));
        d.push("stale");
        sleep(Duration::from_millis(50)).await;
        d.cancel();

        assert!(timeout(Duration::from_secs(5), d.next()).await.is_err());
        assert_eq!(d.try_next(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_after_deadline_drops_late_emission() {
        let window = Duration::from_millis(2);
        let mut d = Debouncer::new(window);
        let mut delivered = 0;
        for _ in 0..100 {
            d.push(1);
            // Let the window lapse so the timer races the cancel.
            std::thread::sleep(window);
            d.cancel();
            sleep(Duration::from_millis(10)).await;
            if d.try_next().is_some() {
                delivered += 1;
            }
        }
        assert_eq!(delivered, 0);

        d.push(2);
        assert_eq!(timeout(Duration::from_secs(1), d.next()).await.unwrap(), Some(2));
    }
}
