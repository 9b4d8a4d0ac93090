use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

/// Action fired when the quiet period elapses with no further edits.
pub type DebounceAction<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

struct DebounceState<T> {
    latest: Option<T>,
    generation: u64,
}

/// Coalesces rapid successive edits into a single action after a quiet
/// period.
///
/// Each [`Debouncer::push`] resets the timer; only when no further edit
/// arrives before the quiet period elapses does the latest value propagate.
/// Intermediate values are discarded. This is purely a timing policy layered
/// above a subscription's `select`; one-shot operations are unaffected.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # async fn example() -> room::RoomResult<()> {
/// let room = room::Room::local();
/// let subscription = Arc::new(room.subscribe().await?);
///
/// let sub = subscription.clone();
/// let debouncer = room::Debouncer::new(
///     Duration::from_secs(2),
///     Arc::new(move |queries: Vec<String>| {
///         let sub = sub.clone();
///         Box::pin(async move {
///             let refs: Vec<&str> = queries.iter().map(|q| q.as_str()).collect();
///             let _ = sub.select(&refs).await;
///         })
///     }),
/// );
/// debouncer.push(vec!["point at ($x, $y)".to_string()]);
/// # Ok(())
/// # }
/// ```
pub struct Debouncer<T> {
    quiet: Duration,
    action: DebounceAction<T>,
    state: Arc<Mutex<DebounceState<T>>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(quiet: Duration, action: DebounceAction<T>) -> Self {
        Self {
            quiet,
            action,
            state: Arc::new(Mutex::new(DebounceState {
                latest: None,
                generation: 0,
            })),
        }
    }

    /// Record an edit and re-arm the quiet-period timer.
    pub fn push(&self, value: T) {
        let generation = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            state.latest = Some(value);
            state.generation += 1;
            state.generation
        };

        let state = self.state.clone();
        let action = self.action.clone();
        let quiet = self.quiet;
        tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let value = {
                let Ok(mut state) = state.lock() else {
                    return;
                };
                if state.generation != generation {
                    // A newer edit re-armed the timer; this one lost.
                    return;
                }
                state.latest.take()
            };
            if let Some(value) = value {
                action(value).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_debouncer(
        quiet: Duration,
    ) -> (Debouncer<String>, Arc<Mutex<Vec<String>>>) {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let debouncer = Debouncer::new(
            quiet,
            Arc::new(move |value: String| {
                let sink = sink.clone();
                Box::pin(async move {
                    sink.lock().unwrap().push(value);
                })
            }),
        );
        (debouncer, seen)
    }

    #[tokio::test(start_paused = true)]
    async fn latest_edit_wins_after_quiet_period() {
        let quiet = Duration::from_secs(2);
        let (debouncer, seen) = recording_debouncer(quiet);

        debouncer.push("first".to_string());
        debouncer.push("second".to_string());
        debouncer.push("third".to_string());

        tokio::time::sleep(quiet + Duration::from_millis(10)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec!["third".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_quiet_windows_each_propagate() {
        let quiet = Duration::from_secs(2);
        let (debouncer, seen) = recording_debouncer(quiet);

        debouncer.push("a".to_string());
        tokio::time::sleep(quiet + Duration::from_millis(10)).await;

        debouncer.push("b".to_string());
        tokio::time::sleep(quiet + Duration::from_millis(10)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn edit_inside_window_resets_the_timer() {
        let quiet = Duration::from_secs(2);
        let (debouncer, seen) = recording_debouncer(quiet);

        debouncer.push("early".to_string());
        tokio::time::sleep(Duration::from_secs(1)).await;
        debouncer.push("late".to_string());

        // One second after the reset: still quiet, nothing propagated.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(seen.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(1) + Duration::from_millis(10)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["late".to_string()]);
    }
}
