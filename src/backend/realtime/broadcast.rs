/**
 * Foreground Broadcasting
 *
 * Publish/subscribe between the background worker and any number of live
 * foreground contexts. Publishing with zero subscribers is a valid case and
 * simply reports a delivery count of 0.
 *
 * # Broadcasting
 *
 * `ChannelBroadcaster` is backed by `tokio::sync::broadcast`: every
 * subscriber receives a copy of each envelope and filters by topic. Topic
 * interest is also tracked on the publishing side, so the delivery count
 * only includes contexts subscribed to the topic.
 */
use crate::shared::{BroadcastMessage, Topic};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

/// Narrow publish interface the sync and notification logic depends on
pub trait Broadcaster: Send + Sync {
    /// Deliver `message` to every subscriber of `topic`.
    ///
    /// Returns the number of subscribers that received it (0 if none).
    fn publish(&self, topic: Topic, message: BroadcastMessage) -> usize;
}

/// Message plus the topic it was published under
#[derive(Debug, Clone)]
pub struct Envelope {
    pub topic: Topic,
    pub message: BroadcastMessage,
}

/// Live subscriptions per topic. `None` counts subscribers to every topic.
#[derive(Debug, Default)]
struct Interest {
    counts: Mutex<HashMap<Option<Topic>, usize>>,
}

impl Interest {
    fn counts(&self) -> MutexGuard<'_, HashMap<Option<Topic>, usize>> {
        // Counters stay consistent even if a holder panicked
        self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn keys(topics: &[Topic]) -> Vec<Option<Topic>> {
        if topics.is_empty() {
            vec![None]
        } else {
            topics.iter().copied().map(Some).collect()
        }
    }

    fn add(&self, topics: &[Topic]) {
        let mut counts = self.counts();
        for key in Self::keys(topics) {
            *counts.entry(key).or_default() += 1;
        }
    }

    fn remove(&self, topics: &[Topic]) {
        let mut counts = self.counts();
        for key in Self::keys(topics) {
            if let Some(count) = counts.get_mut(&key) {
                *count = count.saturating_sub(1);
            }
        }
    }

    fn interested_in(&self, topic: Topic) -> usize {
        let counts = self.counts();
        counts.get(&None).copied().unwrap_or(0) + counts.get(&Some(topic)).copied().unwrap_or(0)
    }
}

/// Broadcaster backed by a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<Envelope>,
    interest: Arc<Interest>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            interest: Arc::new(Interest::default()),
        }
    }

    /// Subscribe a foreground context to the given topics (all topics if empty)
    pub fn subscribe(&self, topics: &[Topic]) -> ForegroundSubscription {
        let mut topics = topics.to_vec();
        topics.sort_by_key(|topic| *topic as u8);
        topics.dedup();
        self.interest.add(&topics);
        ForegroundSubscription {
            rx: self.tx.subscribe(),
            topics,
            interest: Arc::clone(&self.interest),
        }
    }

    /// Number of live foreground contexts
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(&self, topic: Topic, message: BroadcastMessage) -> usize {
        match self.tx.send(Envelope { topic, message }) {
            Ok(_) => {
                let delivered = self.interest.interested_in(topic);
                tracing::debug!("[Realtime] {:?} message delivered to {} contexts", topic, delivered);
                delivered
            }
            Err(_) => {
                // No foreground context is open, that's okay
                tracing::debug!("[Realtime] No foreground contexts for {:?} message", topic);
                0
            }
        }
    }
}

/// Receiving end held by one foreground context
#[derive(Debug)]
pub struct ForegroundSubscription {
    rx: broadcast::Receiver<Envelope>,
    topics: Vec<Topic>,
    interest: Arc<Interest>,
}

impl Drop for ForegroundSubscription {
    fn drop(&mut self) {
        self.interest.remove(&self.topics);
    }
}

impl ForegroundSubscription {
    /// Wait for the next message on a subscribed topic.
    ///
    /// Returns `None` once every broadcaster handle has been dropped. A slow
    /// context that lags behind skips the overwritten messages.
    pub async fn recv(&mut self) -> Option<BroadcastMessage> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) => {
                    if self.topics.is_empty() || self.topics.contains(&envelope.topic) {
                        return Some(envelope.message);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("[Realtime] Foreground context lagged, skipped {} messages", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Option<BroadcastMessage> {
        loop {
            match self.rx.try_recv() {
                Ok(envelope) => {
                    if self.topics.is_empty() || self.topics.contains(&envelope.topic) {
                        return Some(envelope.message);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
