//! services/client/src/controllers/refresh.rs
//!
//! The periodic fetch-and-publish machinery shared by the sensor poller and the
//! weather refresher.
//!
//! A `Refresher` owns the published `RefreshState` and at most one background
//! loop. Each tick runs one `RefreshJob::fetch`. Success replaces the value,
//! stamps `last_success` and clears the error; failure records the error and
//! keeps the previous value. Only the first attempt after start (or reset)
//! raises the full-screen `loading` flag.

use std::sync::Arc;
use std::time::Duration;

use agrigenius_core::ports::{PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Whether a view has finished its first fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Uninitialized,
    Initialized,
}

/// The view state a refresh loop publishes.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshState<T> {
    pub value: Option<T>,
    pub phase: LoadPhase,
    /// Set only while the first attempt is in flight.
    pub loading: bool,
    pub error: Option<PortError>,
    pub last_success: Option<DateTime<Utc>>,
}

impl<T> Default for RefreshState<T> {
    fn default() -> Self {
        Self {
            value: None,
            phase: LoadPhase::Uninitialized,
            loading: false,
            error: None,
            last_success: None,
        }
    }
}

/// One fetch against a resolved target (an endpoint, a location).
#[async_trait]
pub trait RefreshJob<T>: Send + Sync {
    async fn fetch(&self) -> PortResult<T>;
}

//=========================================================================================
// The Refresher
//=========================================================================================

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Refresher<T> {
    name: &'static str,
    interval: Duration,
    state: Arc<watch::Sender<RefreshState<T>>>,
    running: Option<Running>,
}

impl<T> Refresher<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, interval: Duration) -> Self {
        let (state, _) = watch::channel(RefreshState::default());
        Self {
            name,
            interval,
            state: Arc::new(state),
            running: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshState<T>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> RefreshState<T> {
        self.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Starts the loop: one fetch now, then one per interval until `stop`.
    pub fn start(&mut self, job: Arc<dyn RefreshJob<T>>) {
        self.stop();

        let token = CancellationToken::new();
        let state = self.state.clone();
        let interval = self.interval;
        let name = self.name;
        let loop_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                // A fetch still in flight at teardown is dropped unapplied.
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = attempt(&state, job.as_ref(), name) => {}
                }
            }
            debug!("{} loop stopped", name);
        });

        info!("{} started (every {:?})", self.name, self.interval);
        self.running = Some(Running { token, handle });
    }

    /// Runs a single fetch outside the loop and applies its result.
    pub async fn run_once(&self, job: &dyn RefreshJob<T>) {
        attempt(&self.state, job, self.name).await;
    }

    /// Cancels the loop. No fetch result is applied afterwards.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.token.cancel();
            running.handle.abort();
        }
    }

    /// Records a failure that prevents polling from starting at all.
    pub fn halt_with(&mut self, error: PortError, clear_value: bool) {
        self.stop();
        warn!("{} not started: {}", self.name, error);
        self.state.send_modify(|s| {
            if clear_value {
                s.value = None;
            }
            s.phase = LoadPhase::Initialized;
            s.loading = false;
            s.error = Some(error);
        });
    }

    /// Back to first-load behaviour. `clear_value` also drops the last good
    /// value, for user-driven restarts that should not show stale data.
    pub fn reset(&mut self, clear_value: bool) {
        self.stop();
        self.state.send_modify(|s| {
            if clear_value {
                s.value = None;
            }
            s.phase = LoadPhase::Uninitialized;
            s.loading = false;
            s.error = None;
        });
    }
}

impl<T> Drop for Refresher<T> {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.token.cancel();
            running.handle.abort();
        }
    }
}

async fn attempt<T>(state: &watch::Sender<RefreshState<T>>, job: &dyn RefreshJob<T>, name: &str) {
    state.send_if_modified(|s| {
        let first = s.phase == LoadPhase::Uninitialized && !s.loading;
        if first {
            s.loading = true;
        }
        first
    });

    let result = job.fetch().await;

    state.send_modify(|s| {
        match result {
            Ok(value) => {
                s.value = Some(value);
                s.last_success = Some(Utc::now());
                s.error = None;
            }
            Err(e) => {
                warn!("{} fetch failed: {}", name, e);
                s.error = Some(e);
            }
        }
        s.phase = LoadPhase::Initialized;
        s.loading = false;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted results, then repeats the last one.
    struct Scripted {
        results: Mutex<Vec<PortResult<u32>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(results: Vec<PortResult<u32>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RefreshJob<u32> for Scripted {
        async fn fetch(&self) -> PortResult<u32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock().unwrap();
            if results.len() > 1 {
                results.remove(0)
            } else {
                results[0].clone()
            }
        }
    }

    fn malformed() -> PortError {
        PortError::MalformedResponse("missing field Temp".to_string())
    }

    #[tokio::test]
    async fn failure_keeps_the_previous_value() {
        let refresher = Refresher::new("test", Duration::from_secs(5));
        let job = Scripted::new(vec![Ok(7), Err(malformed())]);

        refresher.run_once(job.as_ref()).await;
        let first = refresher.snapshot();
        assert_eq!(first.value, Some(7));
        assert_eq!(first.phase, LoadPhase::Initialized);
        assert!(first.last_success.is_some());

        refresher.run_once(job.as_ref()).await;
        let second = refresher.snapshot();
        assert_eq!(second.value, Some(7));
        assert_eq!(second.error, Some(malformed()));
        assert_eq!(second.last_success, first.last_success);
    }

    #[tokio::test]
    async fn success_clears_a_previous_error() {
        let refresher = Refresher::new("test", Duration::from_secs(5));
        let job = Scripted::new(vec![Err(malformed()), Ok(3)]);

        refresher.run_once(job.as_ref()).await;
        assert!(refresher.snapshot().error.is_some());
        refresher.run_once(job.as_ref()).await;
        assert_eq!(refresher.snapshot().error, None);
        assert_eq!(refresher.snapshot().value, Some(3));
    }

    /// Records the published `loading` flag while each fetch is in flight.
    struct LoadingWatcher {
        rx: watch::Receiver<RefreshState<u32>>,
        seen: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl RefreshJob<u32> for LoadingWatcher {
        async fn fetch(&self) -> PortResult<u32> {
            let loading = self.rx.borrow().loading;
            self.seen.lock().unwrap().push(loading);
            Ok(1)
        }
    }

    #[tokio::test]
    async fn only_the_first_attempt_raises_loading() {
        let mut refresher = Refresher::<u32>::new("test", Duration::from_secs(5));
        let watcher = LoadingWatcher {
            rx: refresher.subscribe(),
            seen: Mutex::new(Vec::new()),
        };

        refresher.run_once(&watcher).await;
        refresher.run_once(&watcher).await;
        refresher.reset(false);
        refresher.run_once(&watcher).await;

        assert_eq!(*watcher.seen.lock().unwrap(), vec![true, false, true]);
        assert!(!refresher.snapshot().loading);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_fetches_every_interval_until_stopped() {
        let mut refresher = Refresher::new("test", Duration::from_secs(5));
        let job = Scripted::new(vec![Ok(1)]);
        refresher.start(job.clone());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(job.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(job.calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(job.calls.load(Ordering::SeqCst), 4);

        refresher.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(job.calls.load(Ordering::SeqCst), 4);
        assert!(!refresher.is_running());
    }

    #[tokio::test]
    async fn reset_returns_to_first_load_but_keeps_the_value() {
        let mut refresher = Refresher::new("test", Duration::from_secs(5));
        let job = Scripted::new(vec![Ok(9), Err(malformed())]);
        refresher.run_once(job.as_ref()).await;
        refresher.run_once(job.as_ref()).await;

        refresher.reset(false);
        let state = refresher.snapshot();
        assert_eq!(state.phase, LoadPhase::Uninitialized);
        assert_eq!(state.error, None);
        assert_eq!(state.value, Some(9));
    }

    #[tokio::test]
    async fn clearing_reset_drops_the_value() {
        let mut refresher = Refresher::new("test", Duration::from_secs(5));
        let job = Scripted::new(vec![Ok(9)]);
        refresher.run_once(job.as_ref()).await;

        refresher.reset(true);
        let state = refresher.snapshot();
        assert_eq!(state.phase, LoadPhase::Uninitialized);
        assert_eq!(state.value, None);
        assert!(state.last_success.is_some());
    }

    #[tokio::test]
    async fn halting_publishes_the_reason() {
        let mut refresher = Refresher::<u32>::new("test", Duration::from_secs(5));
        refresher.halt_with(PortError::NotAuthenticated, true);
        let state = refresher.snapshot();
        assert_eq!(state.error, Some(PortError::NotAuthenticated));
        assert_eq!(state.phase, LoadPhase::Initialized);
        assert!(!refresher.is_running());
    }
}
