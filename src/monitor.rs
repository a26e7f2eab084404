/// Media expiration status monitor
///
/// Read-only view over all media rows with their computed expiration
/// status. Polling, explicit refresh, and store change notifications all
/// converge on the single `refresh` read path, so every surface sees the
/// same data.
use crate::{
    error::AppResult,
    expiration::{format_countdown, ExpirationPolicy, ExpirationStatus},
    media::{MediaChange, MediaRecordStore},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// One media row with its computed status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaStatusEntry {
    pub id: String,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ExpirationStatus,
    pub time_remaining: String,
}

/// Aggregate counts per status
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub active: u64,
    pub expiring_soon: u64,
    pub expired: u64,
}

/// A point-in-time view of all media with computed statuses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub generated_at: DateTime<Utc>,
    pub counts: StatusCounts,
    pub assets: Vec<MediaStatusEntry>,
}

impl MonitorSnapshot {
    fn empty() -> Self {
        Self {
            generated_at: Utc::now(),
            counts: StatusCounts::default(),
            assets: Vec::new(),
        }
    }
}

/// Monitor service holding the latest snapshot in a watch channel
pub struct ExpirationMonitor {
    media_store: Arc<MediaRecordStore>,
    policy: ExpirationPolicy,
    snapshot_tx: watch::Sender<MonitorSnapshot>,
    snapshot_rx: watch::Receiver<MonitorSnapshot>,
}

impl ExpirationMonitor {
    pub fn new(media_store: Arc<MediaRecordStore>, policy: ExpirationPolicy) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(MonitorSnapshot::empty());
        Self {
            media_store,
            policy,
            snapshot_tx,
            snapshot_rx,
        }
    }

    /// Re-fetch all media and recompute statuses
    ///
    /// This is the only read path; every refresh trigger ends up here.
    pub async fn refresh(&self) -> AppResult<MonitorSnapshot> {
        let now = Utc::now();
        let assets = self.media_store.list_all_media().await?;

        let mut counts = StatusCounts::default();
        let entries: Vec<MediaStatusEntry> = assets
            .into_iter()
            .map(|asset| {
                let remaining = self.policy.time_remaining(asset.expires_at, now);
                let status = self.policy.status(remaining);
                match status {
                    ExpirationStatus::Active => counts.active += 1,
                    ExpirationStatus::ExpiringSoon => counts.expiring_soon += 1,
                    ExpirationStatus::Expired => counts.expired += 1,
                }
                MediaStatusEntry {
                    id: asset.id,
                    file_path: asset.file_path,
                    created_at: asset.created_at,
                    expires_at: asset.expires_at,
                    status,
                    time_remaining: format_countdown(remaining),
                }
            })
            .collect();

        let snapshot = MonitorSnapshot {
            generated_at: now,
            counts,
            assets: entries,
        };

        self.snapshot_tx.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    /// Latest computed snapshot without touching the database
    pub fn latest(&self) -> MonitorSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Run the refresh loop: fixed polling interval plus push-based
    /// invalidation from the media store
    pub fn spawn(self: Arc<Self>, poll_interval: std::time::Duration) {
        let mut changes = self.media_store.subscribe();
        let monitor = self;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    change = changes.recv() => match change {
                        Ok(event) => debug!("Media change: {:?}", event),
                        // Lagged means we missed events; a refresh still
                        // reconverges on current state
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            debug!("Monitor lagged {} media change events", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("Media change channel closed; monitor polling only");
                            ticker.tick().await;
                        }
                    },
                }

                if let Err(e) = monitor.refresh().await {
                    warn!("Monitor refresh failed: {}", e);
                }
            }
        });
    }
}
