//! # Reminder Scheduling
//!
//! Server-side collaborator of the push receiver: for every event starting
//! within the lookahead window, two reminder jobs are scheduled, 24 hours
//! and 1 hour before the start.
//!
//! Jobs are plain tokio tasks holding a copy of the event data they were
//! planned from. [`ReminderScheduler::reschedule_all`] aborts every job and
//! plans again from current event data, so a job never fires with an
//! outdated attendee list. Call it on process start and whenever events
//! change.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Event data a reminder is planned from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub attendee_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderKind {
    DayBefore,
    HourBefore,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 2] = [ReminderKind::DayBefore, ReminderKind::HourBefore];

    pub fn lead_time(&self) -> chrono::Duration {
        match self {
            ReminderKind::DayBefore => chrono::Duration::hours(24),
            ReminderKind::HourBefore => chrono::Duration::hours(1),
        }
    }
}

/// One planned reminder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub event_id: String,
    pub title: String,
    pub kind: ReminderKind,
    pub fire_at: DateTime<Utc>,
    pub attendee_ids: Vec<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("reminder delivery failed: {0}")]
pub struct ReminderError(pub String);

/// Delivers a due reminder (typically as a push message to each attendee)
#[async_trait]
pub trait ReminderSink: Send + Sync {
    async fn deliver(&self, reminder: Reminder) -> Result<(), ReminderError>;
}

/// Reminders due for `events`, as seen at `now`.
///
/// Only events starting within `(now, now + lookahead]` are considered and
/// reminders whose fire time has already passed are skipped.
pub fn plan(events: &[ScheduledEvent], now: DateTime<Utc>, lookahead: chrono::Duration) -> Vec<Reminder> {
    let horizon = now + lookahead;
    events
        .iter()
        .filter(|event| event.start_time > now && event.start_time <= horizon)
        .flat_map(|event| {
            ReminderKind::ALL.into_iter().filter_map(move |kind| {
                let fire_at = event.start_time - kind.lead_time();
                (fire_at > now).then(|| Reminder {
                    event_id: event.id.clone(),
                    title: event.title.clone(),
                    kind,
                    fire_at,
                    attendee_ids: event.attendee_ids.clone(),
                })
            })
        })
        .collect()
}

pub struct ReminderScheduler {
    sink: Arc<dyn ReminderSink>,
    lookahead: chrono::Duration,
    jobs: RwLock<HashMap<(String, ReminderKind), JoinHandle<()>>>,
}

impl ReminderScheduler {
    pub fn new(sink: Arc<dyn ReminderSink>, lookahead: Duration) -> Self {
        Self {
            sink,
            lookahead: chrono::Duration::from_std(lookahead).unwrap_or_else(|_| chrono::Duration::days(365)),
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Cancel every job and schedule again from `events`. Returns how many
    /// jobs are now scheduled.
    pub async fn reschedule_all(&self, events: &[ScheduledEvent]) -> usize {
        let mut jobs = self.jobs.write().await;
        let cancelled = jobs.len();
        for (_, handle) in jobs.drain() {
            handle.abort();
        }

        let now = Utc::now();
        for reminder in plan(events, now, self.lookahead) {
            let delay = (reminder.fire_at - now).to_std().unwrap_or(Duration::ZERO);
            let key = (reminder.event_id.clone(), reminder.kind);
            let sink = Arc::clone(&self.sink);
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let (event_id, kind) = (reminder.event_id.clone(), reminder.kind);
                match sink.deliver(reminder).await {
                    Ok(()) => tracing::info!("[Reminders] Sent {:?} reminder for event {}", kind, event_id),
                    Err(e) => tracing::error!("[Reminders] {:?} reminder for event {} failed: {}", kind, event_id, e),
                }
            });
            jobs.insert(key, handle);
        }

        tracing::info!(
            "[Reminders] Rescheduled: {} jobs cancelled, {} scheduled",
            cancelled,
            jobs.len()
        );
        jobs.len()
    }

    /// Jobs that have not fired yet
    pub async fn scheduled_count(&self) -> usize {
        self.jobs.read().await.values().filter(|h| !h.is_finished()).count()
    }

    pub async fn cancel_all(&self) {
        let mut jobs = self.jobs.write().await;
        for (_, handle) in jobs.drain() {
            handle.abort();
        }
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        for handle in self.jobs.get_mut().values() {
            handle.abort();
        }
    }
}
