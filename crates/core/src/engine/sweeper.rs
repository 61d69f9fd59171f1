//! Expiry sweeper
//!
//! Retires activity posts whose scheduled time has passed. Runs once at
//! startup and then on a fixed interval until shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use super::Commons;
use crate::error::Result;
use crate::models::PostKind;
use crate::storage::{Collection, Document, DocumentStore, Query};

/// Counts from one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Activities examined
    pub scanned: usize,
    pub deleted: usize,
    /// Deletes that failed and were skipped
    pub failed: usize,
}

pub struct ExpirySweeper<S> {
    store: Arc<S>,
    offset: FixedOffset,
}

impl<S: DocumentStore + 'static> ExpirySweeper<S> {
    pub fn new(store: Arc<S>, offset: FixedOffset) -> Self {
        Self { store, offset }
    }

    /// One pass: delete every activity scheduled before `now`
    #[instrument(skip(self))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let activities = self
            .store
            .query(Query::collection(Collection::Posts).where_eq("kind", PostKind::Activity.as_str()))
            .await?;

        let mut report = SweepReport {
            scanned: activities.len(),
            ..SweepReport::default()
        };

        for document in &activities {
            let Some(scheduled_at) = self.scheduled_at(document) else {
                continue;
            };
            if scheduled_at >= now {
                continue;
            }

            match self.store.delete(Collection::Posts, &document.id).await {
                Ok(true) => {
                    debug!(post_id = %document.id, %scheduled_at, "Expired activity deleted");
                    report.deleted += 1;
                }
                Ok(false) => {
                    debug!(post_id = %document.id, "Expired activity already removed");
                }
                Err(e) => {
                    warn!(post_id = %document.id, error = %e, "Failed to delete expired activity");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            deleted = report.deleted,
            failed = report.failed,
            "Expiry sweep finished"
        );
        Ok(report)
    }

    /// Sweep now, then every `interval`, until shutdown is signalled
    pub fn spawn(self, interval: Duration, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once(Utc::now()).await {
                            warn!(error = %e, "Expiry sweep failed");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Expiry sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }

    fn scheduled_at(&self, document: &Document) -> Option<DateTime<Utc>> {
        let date = document.field("scheduledDate")?.as_str()?;
        let time = document.field("scheduledTime")?.as_str()?;
        let parsed = parse_schedule(date, time, self.offset);
        if parsed.is_none() {
            debug!(post_id = %document.id, date, time, "Unparseable schedule, skipping");
        }
        parsed
    }
}

/// `YYYY-MM-DD` plus `HH:MM` or `HH:MM:SS`, read in the given offset
pub fn parse_schedule(date: &str, time: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time.trim(), "%H:%M:%S"))
        .ok()?;
    offset
        .from_local_datetime(&NaiveDateTime::new(date, time))
        .single()
        .map(|at| at.with_timezone(&Utc))
}

impl<S: DocumentStore + 'static> Commons<S> {
    /// Run one sweep synchronously and report what it did
    pub async fn run_expiry_sweep_once(&self) -> Result<SweepReport> {
        ExpirySweeper::new(self.store.clone(), self.settings.schedule_offset)
            .run_once(Utc::now())
            .await
    }
}
