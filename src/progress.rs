//! Fire-and-forget progress broadcasting for sync jobs.
//!
//! The publisher enforces the pipeline stage ordering per job: stages never go
//! backwards and each job emits exactly one terminal stage. Publishing to a
//! stream nobody listens to is fine; progress can never abort a sync.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Upper bound on per-job ordering state kept in memory. Old entries are
/// evicted least-recently-used; job ids are never reused, so an evicted
/// terminal entry only weakens the duplicate-terminal guard for jobs that
/// finished long ago.
const MAX_TRACKED_JOBS: usize = 4096;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Init,
    LocationsFetch,
    ReviewsFetch,
    QuestionsFetch,
    Transaction,
    CacheRefresh,
    Complete,
    Failed,
}

impl SyncStage {
    /// Position in the pipeline. `Failed` shares the terminal slot with
    /// `Complete` so it is reachable from any earlier stage.
    pub const fn order(self) -> u8 {
        match self {
            SyncStage::Init => 0,
            SyncStage::LocationsFetch => 1,
            SyncStage::ReviewsFetch => 2,
            SyncStage::QuestionsFetch => 3,
            SyncStage::Transaction => 4,
            SyncStage::CacheRefresh => 5,
            SyncStage::Complete => 6,
            SyncStage::Failed => 6,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, SyncStage::Complete | SyncStage::Failed)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SyncStage::Init => "init",
            SyncStage::LocationsFetch => "locations_fetch",
            SyncStage::ReviewsFetch => "reviews_fetch",
            SyncStage::QuestionsFetch => "questions_fetch",
            SyncStage::Transaction => "transaction",
            SyncStage::CacheRefresh => "cache_refresh",
            SyncStage::Complete => "complete",
            SyncStage::Failed => "failed",
        }
    }
}

/// One progress event on the broadcast stream.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub job_id: Uuid,
    pub account_id: Uuid,
    pub stage: SyncStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

/// Per-job publishing state.
#[derive(Debug, Clone, Copy)]
struct JobProgress {
    last_order: u8,
    terminated: bool,
}

/// Broadcast publisher for sync progress events.
pub struct ProgressPublisher {
    sender: broadcast::Sender<ProgressEvent>,
    jobs: Mutex<LruCache<Uuid, JobProgress>>,
}

impl ProgressPublisher {
    pub fn new(buffer: NonZeroUsize) -> Self {
        let (sender, _) = broadcast::channel(buffer.get());
        Self {
            sender,
            jobs: Mutex::new(LruCache::new(
                NonZeroUsize::new(MAX_TRACKED_JOBS).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Subscribe to the live event stream. Slow receivers may observe lag,
    /// never block publishers.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Forget a job's publishing state. Used when a job is requeued for a
    /// later attempt so the next run starts a fresh stage sequence.
    pub fn reset(&self, job_id: Uuid) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.pop(&job_id);
        }
    }

    /// Publish a stage for a job. Out-of-order or post-terminal publishes are
    /// dropped with a warning; dropping an event never fails the sync.
    pub fn publish(&self, job_id: Uuid, account_id: Uuid, stage: SyncStage, detail: Option<&str>) {
        let accepted = {
            let mut jobs = match self.jobs.lock() {
                Ok(jobs) => jobs,
                Err(poisoned) => poisoned.into_inner(),
            };

            let entry = jobs.get_or_insert_mut(job_id, || JobProgress {
                last_order: 0,
                terminated: false,
            });

            if entry.terminated {
                warn!(%job_id, stage = stage.as_str(), "dropping progress event after terminal stage");
                false
            } else if stage.order() < entry.last_order {
                warn!(
                    %job_id,
                    stage = stage.as_str(),
                    last_order = entry.last_order,
                    "dropping out-of-order progress event"
                );
                false
            } else {
                entry.last_order = stage.order();
                if stage.is_terminal() {
                    entry.terminated = true;
                }
                true
            }
        };

        if !accepted {
            return;
        }

        let event = ProgressEvent {
            job_id,
            account_id,
            stage,
            detail: detail.map(str::to_string),
            at: Utc::now(),
        };

        debug!(%job_id, stage = stage.as_str(), "sync progress");
        // Err means no active subscribers, which is fine.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher() -> ProgressPublisher {
        ProgressPublisher::new(NonZeroUsize::new(16).unwrap())
    }

    fn drain(rx: &mut broadcast::Receiver<ProgressEvent>) -> Vec<SyncStage> {
        let mut stages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            stages.push(event.stage);
        }
        stages
    }

    #[tokio::test]
    async fn test_full_stage_sequence_is_delivered() {
        let publisher = publisher();
        let mut rx = publisher.subscribe();
        let job_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();

        for stage in [
            SyncStage::Init,
            SyncStage::LocationsFetch,
            SyncStage::ReviewsFetch,
            SyncStage::QuestionsFetch,
            SyncStage::Transaction,
            SyncStage::CacheRefresh,
            SyncStage::Complete,
        ] {
            publisher.publish(job_id, account_id, stage, None);
        }

        assert_eq!(
            drain(&mut rx),
            vec![
                SyncStage::Init,
                SyncStage::LocationsFetch,
                SyncStage::ReviewsFetch,
                SyncStage::QuestionsFetch,
                SyncStage::Transaction,
                SyncStage::CacheRefresh,
                SyncStage::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_out_of_order_stage_is_dropped() {
        let publisher = publisher();
        let mut rx = publisher.subscribe();
        let job_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();

        publisher.publish(job_id, account_id, SyncStage::Transaction, None);
        publisher.publish(job_id, account_id, SyncStage::LocationsFetch, None);
        publisher.publish(job_id, account_id, SyncStage::CacheRefresh, None);

        assert_eq!(
            drain(&mut rx),
            vec![SyncStage::Transaction, SyncStage::CacheRefresh]
        );
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_stage() {
        let publisher = publisher();
        let mut rx = publisher.subscribe();
        let job_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();

        publisher.publish(job_id, account_id, SyncStage::Init, None);
        publisher.publish(job_id, account_id, SyncStage::Failed, Some("provider down"));
        publisher.publish(job_id, account_id, SyncStage::Complete, None);
        publisher.publish(job_id, account_id, SyncStage::Failed, None);

        assert_eq!(drain(&mut rx), vec![SyncStage::Init, SyncStage::Failed]);
    }

    #[tokio::test]
    async fn test_failed_reachable_from_any_stage() {
        let publisher = publisher();
        let mut rx = publisher.subscribe();
        let job_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();

        publisher.publish(job_id, account_id, SyncStage::Init, None);
        publisher.publish(job_id, account_id, SyncStage::LocationsFetch, None);
        publisher.publish(job_id, account_id, SyncStage::Failed, Some("HTTP 503"));

        let stages = drain(&mut rx);
        assert_eq!(stages.last(), Some(&SyncStage::Failed));
    }

    #[tokio::test]
    async fn test_jobs_are_tracked_independently() {
        let publisher = publisher();
        let mut rx = publisher.subscribe();
        let account_id = Uuid::new_v4();
        let job_a = Uuid::new_v4();
        let job_b = Uuid::new_v4();

        publisher.publish(job_a, account_id, SyncStage::Complete, None);
        publisher.publish(job_b, account_id, SyncStage::Init, None);

        assert_eq!(drain(&mut rx), vec![SyncStage::Complete, SyncStage::Init]);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let publisher = publisher();
        publisher.publish(Uuid::new_v4(), Uuid::new_v4(), SyncStage::Init, None);
    }

    #[test]
    fn test_tracked_job_state_is_bounded() {
        let publisher = publisher();

        for _ in 0..(MAX_TRACKED_JOBS + 100) {
            publisher.publish(Uuid::new_v4(), Uuid::new_v4(), SyncStage::Complete, None);
        }

        let tracked = publisher.jobs.lock().unwrap().len();
        assert!(tracked <= MAX_TRACKED_JOBS);
    }
}
