use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{apply_delta, normalize_all, FeedAdapter, FeedState, PositionSource, SharedPositions};
use crate::models::{PositionChange, PositionDelta};

/// Applies pushed change events in arrival order; the last applied write wins.
pub struct SubscriptionAdapter {
    snapshot: Option<Arc<dyn PositionSource>>,
    changes: BoxStream<'static, PositionChange>,
}

impl SubscriptionAdapter {
    /// `snapshot`, when given, seeds the set once before events are applied.
    pub fn new(
        snapshot: Option<Arc<dyn PositionSource>>,
        changes: BoxStream<'static, PositionChange>,
    ) -> Self {
        Self { snapshot, changes }
    }
}

/// INSERT and UPDATE upsert by `user_id`; DELETE removes it.
pub async fn apply_change(positions: &SharedPositions, change: PositionChange) {
    let kind = change.event_type;
    if let Some(delta) = change.into_delta() {
        debug!("Applying {:?} change", kind);
        apply_delta(positions, delta).await;
    }
}

#[async_trait]
impl FeedAdapter for SubscriptionAdapter {
    fn active_state(&self) -> FeedState {
        FeedState::Subscribed
    }

    async fn run(self: Box<Self>, positions: SharedPositions, cancel: CancellationToken) {
        let SubscriptionAdapter {
            snapshot,
            mut changes,
        } = *self;

        if let Some(source) = snapshot {
            match source.fetch_positions().await {
                Ok(records) => {
                    apply_delta(&positions, PositionDelta::Replace(normalize_all(&records))).await;
                }
                Err(e) => warn!("live location fetch error: {}", e),
            }
        }

        info!("Location subscription active");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Location subscription closing");
                    break;
                }
                next = changes.next() => match next {
                    Some(change) => apply_change(&positions, change).await,
                    None => {
                        warn!("Location change stream ended");
                        break;
                    }
                },
            }
        }
        // Dropping the stream releases the underlying subscription.
        drop(changes);
    }
}
