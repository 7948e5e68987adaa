use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{apply_delta, normalize_all, FeedAdapter, FeedState, PositionSource, SharedPositions};
use crate::models::PositionDelta;

/// Refetches the full position set every `interval` and replaces it wholesale.
pub struct PollingAdapter {
    source: Arc<dyn PositionSource>,
    interval: Duration,
}

impl PollingAdapter {
    pub fn new(source: Arc<dyn PositionSource>, interval: Duration) -> Self {
        Self { source, interval }
    }

    /// One fetch-and-replace cycle. A failed fetch leaves the set untouched.
    pub async fn poll_once(&self, positions: &SharedPositions) -> bool {
        match self.source.fetch_positions().await {
            Ok(records) => {
                let fetched = normalize_all(&records);
                debug!(
                    "Polled {} location record(s), {} usable",
                    records.len(),
                    fetched.len()
                );
                apply_delta(positions, PositionDelta::Replace(fetched)).await;
                true
            }
            Err(e) => {
                warn!("live location fetch error: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl FeedAdapter for PollingAdapter {
    fn active_state(&self) -> FeedState {
        FeedState::Polling
    }

    async fn run(self: Box<Self>, positions: SharedPositions, cancel: CancellationToken) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Location polling started"
        );

        // The first tick fires immediately, which doubles as the initial fetch.
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Location polling stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.poll_once(&positions).await;
                }
            }
        }
    }
}
