// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub internals: subscriber registry, sequencing, delivery, eviction.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tether_core::{Event, EventFilter, EventPayload, RouteContext};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Tuning knobs for the hub. Defaults match production behavior.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Bounded queue depth per subscriber.
    pub queue_capacity: usize,
    /// Dropped-event count that triggers eviction when reached inside one window.
    pub eviction_threshold: u64,
    /// Sliding window over which drops are counted.
    pub eviction_window: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            eviction_threshold: 1024,
            eviction_window: Duration::from_secs(60),
        }
    }
}

/// Registration request for a new subscriber.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: String,
    pub filter: EventFilter,
    /// Internal subscribers (loggers, the session index) do not count
    /// toward the external-subscriber total the supervisor's auto-deny
    /// rule keys off.
    pub internal: bool,
}

impl Subscriber {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), filter: EventFilter::all(), internal: false }
    }

    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }
}

/// The transport's end of a subscription: the event queue plus the done
/// token it cancels when the connection goes away.
pub struct SubscriberHandle {
    pub id: String,
    pub events: mpsc::Receiver<Arc<Event>>,
    pub done: CancellationToken,
}

struct DropWindow {
    window_start: Instant,
    dropped_in_window: u64,
    dropped_total: u64,
}

struct Registration {
    tx: mpsc::Sender<Arc<Event>>,
    filter: EventFilter,
    done: CancellationToken,
    internal: bool,
    drops: Mutex<DropWindow>,
}

/// In-process event broker with per-subscriber isolation.
///
/// Cheap to clone; all clones share one registry and sequence counter.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<Inner>,
}

struct Inner {
    config: HubConfig,
    sequence: AtomicU64,
    running: AtomicBool,
    registry: RwLock<HashMap<String, Registration>>,
}

enum EvictReason {
    Slow { dropped: u64 },
    Closed,
}

impl EventHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                sequence: AtomicU64::new(0),
                running: AtomicBool::new(true),
                registry: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a subscriber and hand back its queue.
    ///
    /// A subscriber re-using an existing id replaces the old
    /// registration; the old queue is closed.
    pub fn subscribe(&self, sub: Subscriber) -> SubscriberHandle {
        let (tx, rx) = mpsc::channel(self.inner.config.queue_capacity);
        let done = CancellationToken::new();
        let registration = Registration {
            tx,
            filter: sub.filter,
            done: done.clone(),
            internal: sub.internal,
            drops: Mutex::new(DropWindow {
                window_start: Instant::now(),
                dropped_in_window: 0,
                dropped_total: 0,
            }),
        };
        let replaced = self.inner.registry.write().insert(sub.id.clone(), registration);
        if let Some(old) = replaced {
            old.done.cancel();
        }
        tracing::debug!(subscriber = %sub.id, internal = sub.internal, "subscribed");
        SubscriberHandle { id: sub.id, events: rx, done }
    }

    /// Remove a subscriber, closing its queue.
    pub fn unsubscribe(&self, id: &str) {
        if let Some(reg) = self.inner.registry.write().remove(id) {
            reg.done.cancel();
            tracing::debug!(subscriber = id, "unsubscribed");
        }
    }

    /// Publish with the current wall-clock timestamp.
    ///
    /// Returns the assigned sequence number, or 0 when the hub is
    /// stopped (the event is discarded).
    pub fn publish(&self, payload: EventPayload, context: RouteContext) -> u64 {
        self.publish_at(payload, context, Utc::now())
    }

    /// Publish with a caller-supplied timestamp.
    pub fn publish_at(
        &self,
        payload: EventPayload,
        context: RouteContext,
        timestamp: DateTime<Utc>,
    ) -> u64 {
        if !self.inner.running.load(Ordering::Acquire) {
            return 0;
        }
        let sequence = self.inner.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let event = Arc::new(Event { sequence, timestamp, context, payload });

        let mut evictions: Vec<(String, EvictReason)> = Vec::new();
        {
            let registry = self.inner.registry.read();
            for (id, reg) in registry.iter() {
                if reg.done.is_cancelled() {
                    evictions.push((id.clone(), EvictReason::Closed));
                    continue;
                }
                if !reg.filter.accepts(&event) {
                    continue;
                }
                match reg.tx.try_send(Arc::clone(&event)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        if let Some(dropped) = self.record_drop(reg) {
                            evictions.push((id.clone(), EvictReason::Slow { dropped }));
                        }
                    }
                    Err(TrySendError::Closed(_)) => {
                        evictions.push((id.clone(), EvictReason::Closed));
                    }
                }
            }
        }

        for (id, reason) in evictions {
            self.evict(&id, reason);
        }
        sequence
    }

    /// Record one dropped event; returns the total drop count when the
    /// subscriber just crossed the eviction threshold.
    fn record_drop(&self, reg: &Registration) -> Option<u64> {
        let mut drops = reg.drops.lock();
        if drops.window_start.elapsed() > self.inner.config.eviction_window {
            drops.window_start = Instant::now();
            drops.dropped_in_window = 0;
        }
        drops.dropped_in_window += 1;
        drops.dropped_total += 1;
        (drops.dropped_in_window == self.inner.config.eviction_threshold)
            .then_some(drops.dropped_total)
    }

    fn evict(&self, id: &str, reason: EvictReason) {
        let removed = self.inner.registry.write().remove(id);
        let Some(reg) = removed else {
            return;
        };
        reg.done.cancel();
        match reason {
            EvictReason::Slow { dropped } => {
                tracing::warn!(subscriber = id, dropped, "evicting slow subscriber");
                self.publish(
                    EventPayload::SubscriberEvicted { subscriber_id: id.to_string(), dropped },
                    RouteContext::default(),
                );
            }
            EvictReason::Closed => {
                tracing::debug!(subscriber = id, "removing closed subscriber");
            }
        }
    }

    /// Drop registrations whose done token is cancelled or whose queue
    /// receiver is gone. Publish also notices these lazily; the sweep is
    /// the backstop for hubs that go quiet.
    pub fn sweep(&self) {
        let mut registry = self.inner.registry.write();
        registry.retain(|id, reg| {
            let alive = !reg.done.is_cancelled() && !reg.tx.is_closed();
            if !alive {
                reg.done.cancel();
                tracing::debug!(subscriber = %id, "swept dead subscriber");
            }
            alive
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.read().len()
    }

    /// Subscribers that represent remote transports (non-internal).
    pub fn external_subscriber_count(&self) -> usize {
        self.inner.registry.read().values().filter(|r| !r.internal).count()
    }

    /// Total events dropped for a subscriber, if registered.
    pub fn dropped_for(&self, id: &str) -> Option<u64> {
        self.inner.registry.read().get(id).map(|r| r.drops.lock().dropped_total)
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Stop the hub: no further publishes are accepted and every
    /// subscriber queue is closed.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::Release);
        let mut registry = self.inner.registry.write();
        for (_, reg) in registry.drain() {
            reg.done.cancel();
        }
        tracing::debug!("hub stopped");
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
