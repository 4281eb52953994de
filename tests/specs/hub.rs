// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub delivery guarantees across subscribers.

use tether_core::{EventPayload, RouteContext};
use tether_hub::{EventHub, HubConfig, Subscriber};

#[test]
fn every_lossless_subscriber_sees_publication_order() {
    let hub = EventHub::default();
    let mut a = hub.subscribe(Subscriber::new("a"));
    let mut b = hub.subscribe(Subscriber::new("b"));
    for _ in 0..20 {
        hub.publish(EventPayload::Heartbeat {}, RouteContext::default());
    }
    for handle in [&mut a, &mut b] {
        let mut sequences = Vec::new();
        while let Ok(ev) = handle.events.try_recv() {
            sequences.push(ev.sequence);
        }
        assert_eq!(sequences, (1..=20).collect::<Vec<_>>());
    }
}

#[test]
fn slow_consumer_eviction_is_isolated() {
    let hub = EventHub::new(HubConfig {
        queue_capacity: 1,
        eviction_threshold: 8,
        eviction_window: std::time::Duration::from_secs(60),
    });
    let _victim = hub.subscribe(Subscriber::new("victim"));
    for _ in 0..16 {
        hub.publish(EventPayload::Heartbeat {}, RouteContext::default());
    }
    assert_eq!(hub.subscriber_count(), 0, "victim evicted");

    // The hub keeps serving new subscribers afterwards.
    let mut fresh = hub.subscribe(Subscriber::new("fresh"));
    hub.publish(EventPayload::Heartbeat {}, RouteContext::default());
    assert!(fresh.events.try_recv().is_ok());
}
