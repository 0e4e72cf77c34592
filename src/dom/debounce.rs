use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::platform::runtime::{sleep, spawn_detached};

pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(100);

/// Timing options for [`debounce`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebounceOptions {
    pub delay: Duration,
    /// Fire on the leading edge of a burst instead of the trailing edge.
    pub immediate: bool,
}

impl Default for DebounceOptions {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DEBOUNCE_DELAY,
            immediate: false,
        }
    }
}

impl DebounceOptions {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn leading(mut self) -> Self {
        self.immediate = true;
        self
    }
}

/// Wraps `callback` so that bursts of calls collapse into a single invocation.
///
/// Every call restarts the quiet period. In trailing mode the callback runs once the quiet
/// period elapses, with the arguments of the last call. In leading mode the first call of a
/// burst runs synchronously and the rest of the burst is dropped.
pub fn debounce<A, F>(callback: F, options: DebounceOptions) -> Debounced<A>
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    Debounced {
        inner: Arc::new(DebounceInner {
            callback: Box::new(callback),
            options,
            timer: Mutex::new(TimerState {
                deadline: None,
                running: false,
                last_args: None,
            }),
        }),
    }
}

pub struct Debounced<A> {
    inner: Arc<DebounceInner<A>>,
}

struct DebounceInner<A> {
    callback: Box<dyn Fn(A) + Send + Sync>,
    options: DebounceOptions,
    timer: Mutex<TimerState<A>>,
}

// At most one timer task runs per wrapper. Calls only push `deadline` forward; the task
// sleeps until the deadline it reads and exits once the deadline passes or is cleared.
struct TimerState<A> {
    deadline: Option<DateTime<Utc>>,
    running: bool,
    last_args: Option<A>,
}

impl<A> Clone for Debounced<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A> fmt::Debug for Debounced<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounced")
            .field("options", &self.inner.options)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl<A> Debounced<A>
where
    A: Send + 'static,
{
    pub fn call(&self, args: A) {
        let options = self.inner.options;
        let delay = TimeDelta::from_std(options.delay).unwrap_or_else(|_| TimeDelta::days(365));
        let (leading_args, start_timer) = {
            let mut timer = self.inner.timer.lock().unwrap();
            let fire_now = options.immediate && timer.deadline.is_none();
            timer.deadline = Some(Utc::now() + delay);
            let leading_args = if options.immediate {
                fire_now.then_some(args)
            } else {
                timer.last_args = Some(args);
                None
            };
            let start_timer = !timer.running;
            timer.running = true;
            (leading_args, start_timer)
        };

        if let Some(args) = leading_args {
            (self.inner.callback)(args);
        }
        if start_timer {
            spawn_detached(run_timer(self.inner.clone()));
        }
    }

    /// Drops the pending trailing call, if any, and ends the current burst.
    pub fn cancel(&self) {
        let mut timer = self.inner.timer.lock().unwrap();
        timer.deadline = None;
        timer.last_args = None;
    }
}

impl<A> Debounced<A> {
    pub fn is_pending(&self) -> bool {
        self.inner.timer.lock().unwrap().deadline.is_some()
    }
}

async fn run_timer<A>(inner: Arc<DebounceInner<A>>)
where
    A: Send + 'static,
{
    loop {
        let wait = {
            let mut timer = inner.timer.lock().unwrap();
            let Some(deadline) = timer.deadline else {
                timer.running = false;
                return;
            };
            match (deadline - Utc::now()).to_std() {
                Ok(remaining) if !remaining.is_zero() => remaining,
                _ => {
                    timer.deadline = None;
                    timer.running = false;
                    let trailing_args = timer.last_args.take();
                    drop(timer);
                    if let Some(args) = trailing_args {
                        (inner.callback)(args);
                    }
                    return;
                }
            }
        };
        sleep(wait).await;
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) + Send + Sync + 'static) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        (calls, move |value| sink.lock().unwrap().push(value))
    }

    #[tokio::test(flavor = "current_thread")]
    async fn trailing_call_uses_last_arguments() {
        let (calls, callback) = recorder();
        let debounced = debounce(
            callback,
            DebounceOptions::default().with_delay(Duration::from_millis(40)),
        );

        for value in 1..=5 {
            debounced.call(value);
        }
        assert!(calls.lock().unwrap().is_empty());
        assert!(debounced.is_pending());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*calls.lock().unwrap(), vec![5]);
        assert!(!debounced.is_pending());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn leading_edge_fires_once_per_burst() {
        let (calls, callback) = recorder();
        let debounced = debounce(
            callback,
            DebounceOptions::default()
                .with_delay(Duration::from_millis(40))
                .leading(),
        );

        debounced.call(1);
        debounced.call(2);
        debounced.call(3);
        assert_eq!(*calls.lock().unwrap(), vec![1]);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*calls.lock().unwrap(), vec![1]);

        debounced.call(4);
        assert_eq!(*calls.lock().unwrap(), vec![1, 4]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn separate_bursts_fire_separately() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let debounced = debounce(
            move |_: ()| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            DebounceOptions::default().with_delay(Duration::from_millis(20)),
        );

        debounced.call(());
        tokio::time::sleep(Duration::from_millis(100)).await;
        debounced.call(());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cancel_drops_pending_call() {
        let (calls, callback) = recorder();
        let debounced = debounce(
            callback,
            DebounceOptions::default().with_delay(Duration::from_millis(20)),
        );
        debounced.call(7);
        debounced.cancel();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn each_call_pushes_the_single_timer_forward() {
        let (calls, callback) = recorder();
        let debounced = debounce(
            callback,
            DebounceOptions::default().with_delay(Duration::from_millis(60)),
        );

        debounced.call(1);
        tokio::time::sleep(Duration::from_millis(40)).await;
        debounced.call(2);
        assert!(debounced.inner.timer.lock().unwrap().running);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(calls.lock().unwrap().is_empty());
        assert!(debounced.inner.timer.lock().unwrap().running);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(*calls.lock().unwrap(), vec![2]);
        let timer = debounced.inner.timer.lock().unwrap();
        assert!(!timer.running);
        assert!(timer.deadline.is_none());
    }

    #[test]
    fn default_delay_is_one_hundred_millis() {
        let options = DebounceOptions::default();
        assert_eq!(options.delay, Duration::from_millis(100));
        assert!(!options.immediate);
    }
}
