//! Live position ingestion.
//!
//! A [`LocationFeed`] owns one [`FeedAdapter`], chosen at construction:
//! [`PollingAdapter`] refetches the whole set on a timer, while
//! [`SubscriptionAdapter`] applies pushed change events. Both reduce their
//! input to [`PositionDelta`]s applied to the same [`SharedPositions`].

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FeedError, StoreError};
use crate::models::{LivePosition, PositionChange, PositionDelta, PositionRecord};

pub mod poll;
pub mod position_set;
pub mod push;

pub use poll::PollingAdapter;
pub use position_set::{PositionSet, SharedPositions};
pub use push::SubscriptionAdapter;

/// Source of full position snapshots.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn fetch_positions(&self) -> Result<Vec<PositionRecord>, StoreError>;
}

/// Delivery mode, fixed for the lifetime of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    Poll { interval: Duration },
    Push,
}

impl FeedMode {
    /// A positive interval selects polling; absent or zero selects push.
    pub fn from_interval_ms(interval_ms: Option<u64>) -> Self {
        match interval_ms {
            Some(ms) if ms > 0 => FeedMode::Poll {
                interval: Duration::from_millis(ms),
            },
            _ => FeedMode::Push,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Uninitialized,
    Polling,
    Subscribed,
    Stopped,
}

/// One ingestion strategy. `run` applies deltas until `cancel` fires or its
/// input is exhausted.
#[async_trait]
pub trait FeedAdapter: Send + 'static {
    /// State the feed enters while this adapter runs.
    fn active_state(&self) -> FeedState;

    async fn run(self: Box<Self>, positions: SharedPositions, cancel: CancellationToken);
}

pub struct LocationFeed {
    positions: SharedPositions,
    adapter: Option<Box<dyn FeedAdapter>>,
    state: FeedState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LocationFeed {
    pub fn new(adapter: Box<dyn FeedAdapter>) -> Self {
        Self {
            positions: PositionSet::shared(),
            adapter: Some(adapter),
            state: FeedState::Uninitialized,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn polling(source: Arc<dyn PositionSource>, interval: Duration) -> Self {
        Self::new(Box::new(PollingAdapter::new(source, interval)))
    }

    pub fn subscribed(
        snapshot: Option<Arc<dyn PositionSource>>,
        changes: BoxStream<'static, PositionChange>,
    ) -> Self {
        Self::new(Box::new(SubscriptionAdapter::new(snapshot, changes)))
    }

    /// Reports `Stopped` once the adapter task has ended, including when a
    /// change stream closes on its own before `stop` is called.
    pub fn state(&self) -> FeedState {
        match (self.state, &self.task) {
            (FeedState::Polling | FeedState::Subscribed, Some(task)) if task.is_finished() => {
                FeedState::Stopped
            }
            (state, _) => state,
        }
    }

    pub fn positions(&self) -> SharedPositions {
        Arc::clone(&self.positions)
    }

    pub async fn snapshot(&self) -> Vec<LivePosition> {
        self.positions.read().await.to_vec()
    }

    /// Spawns the adapter task. Must run inside a Tokio runtime.
    pub fn start(&mut self) -> Result<(), FeedError> {
        match self.state() {
            FeedState::Uninitialized => {}
            FeedState::Stopped => return Err(FeedError::Stopped),
            FeedState::Polling | FeedState::Subscribed => return Err(FeedError::AlreadyStarted),
        }
        let adapter = self.adapter.take().ok_or(FeedError::AlreadyStarted)?;

        self.state = adapter.active_state();
        info!("Starting location feed in {:?} state", self.state);
        self.task = Some(tokio::spawn(
            adapter.run(Arc::clone(&self.positions), self.cancel.clone()),
        ));
        Ok(())
    }

    /// Releases the timer or subscription and waits for the task to finish.
    /// Calling it again is a no-op.
    pub async fn stop(&mut self) {
        match self.state {
            FeedState::Stopped => {
                debug!("Location feed already stopped");
                return;
            }
            FeedState::Uninitialized => {
                self.adapter = None;
            }
            FeedState::Polling | FeedState::Subscribed => {
                self.cancel.cancel();
                if let Some(task) = self.task.take() {
                    if let Err(e) = task.await {
                        warn!("Location feed task ended abnormally: {}", e);
                    }
                }
            }
        }
        self.state = FeedState::Stopped;
        info!("Location feed stopped");
    }
}

impl Drop for LocationFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub(crate) async fn apply_delta(positions: &SharedPositions, delta: PositionDelta) {
    positions.write().await.apply(delta);
}

pub(crate) fn normalize_all(records: &[PositionRecord]) -> Vec<LivePosition> {
    records.iter().filter_map(PositionRecord::normalize).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Snapshot source whose answer can be swapped between fetches.
    #[derive(Default)]
    pub struct ScriptedSource {
        pub response: Mutex<Option<Vec<PositionRecord>>>,
        pub fetches: AtomicUsize,
    }

    impl ScriptedSource {
        pub fn returning(records: Vec<PositionRecord>) -> Self {
            Self {
                response: Mutex::new(Some(records)),
                fetches: AtomicUsize::new(0),
            }
        }

        /// `None` makes every following fetch fail.
        pub fn set(&self, records: Option<Vec<PositionRecord>>) {
            *self.response.lock().unwrap() = records;
        }

        pub fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PositionSource for ScriptedSource {
        async fn fetch_positions(&self) -> Result<Vec<PositionRecord>, StoreError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.response
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| StoreError::Malformed("source offline".to_string()))
        }
    }

    pub fn record(user_id: &str, latitude: f64, longitude: f64) -> PositionRecord {
        PositionRecord {
            user_id: Some(user_id.to_string()),
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..PositionRecord::default()
        }
    }

    pub async fn wait_until<F>(positions: &SharedPositions, predicate: F) -> bool
    where
        F: Fn(&PositionSet) -> bool,
    {
        for _ in 0..200 {
            if predicate(&*positions.read().await) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_mode_from_interval() {
        assert_eq!(FeedMode::from_interval_ms(None), FeedMode::Push);
        assert_eq!(FeedMode::from_interval_ms(Some(0)), FeedMode::Push);
        assert_eq!(
            FeedMode::from_interval_ms(Some(5000)),
            FeedMode::Poll {
                interval: Duration::from_secs(5)
            }
        );
    }

    #[tokio::test]
    async fn test_polling_lifecycle() {
        let source = Arc::new(ScriptedSource::returning(vec![
            record("a", 12.97, 79.15),
            record("b", 12.96, 79.14),
        ]));
        let mut feed = LocationFeed::polling(source.clone(), Duration::from_millis(20));
        assert_eq!(feed.state(), FeedState::Uninitialized);

        feed.start().unwrap();
        assert_eq!(feed.state(), FeedState::Polling);
        assert_eq!(feed.start(), Err(FeedError::AlreadyStarted));

        let positions = feed.positions();
        assert!(wait_until(&positions, |set| set.len() == 2).await);

        feed.stop().await;
        assert_eq!(feed.state(), FeedState::Stopped);
        let fetched = source.fetch_count();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(source.fetch_count(), fetched);

        feed.stop().await;
        assert_eq!(feed.state(), FeedState::Stopped);
        assert_eq!(feed.start(), Err(FeedError::Stopped));
    }

    #[tokio::test]
    async fn test_subscribed_lifecycle() {
        let changes = futures::stream::pending::<PositionChange>().boxed();
        let mut feed = LocationFeed::subscribed(None, changes);

        feed.start().unwrap();
        assert_eq!(feed.state(), FeedState::Subscribed);

        feed.stop().await;
        feed.stop().await;
        assert_eq!(feed.state(), FeedState::Stopped);
    }

    #[tokio::test]
    async fn test_ended_stream_reports_stopped() {
        let changes = futures::stream::empty::<PositionChange>().boxed();
        let mut feed = LocationFeed::subscribed(None, changes);
        feed.start().unwrap();

        let mut ended = false;
        for _ in 0..200 {
            if feed.state() == FeedState::Stopped {
                ended = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(ended);
        assert_eq!(feed.start(), Err(FeedError::Stopped));

        feed.stop().await;
        assert_eq!(feed.state(), FeedState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let source = Arc::new(ScriptedSource::default());
        let mut feed = LocationFeed::polling(source.clone(), Duration::from_millis(10));
        feed.stop().await;
        assert_eq!(feed.state(), FeedState::Stopped);
        assert_eq!(source.fetch_count(), 0);
    }
}
