//! Queue concurrency properties
//!
//! Excess requests beyond a category's limit wait without executing;
//! queue-idle fires only once a category drains; low-memory mode
//! serializes categories that are otherwise independent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use haskmate_backend::{BackendEvent, CommandQueues, EventChannel, QueueCategory};

struct Gauge {
    running: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
}

impl Gauge {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        })
    }

    async fn work(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_excess_requests_wait_for_a_slot() {
    let queues = Arc::new(CommandQueues::new(EventChannel::new(), 2));
    let gauge = Gauge::new();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let queues = Arc::clone(&queues);
        let gauge = Arc::clone(&gauge);
        handles.push(tokio::spawn(async move {
            queues
                .run(QueueCategory::CheckLint, async { gauge.work().await })
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    // the checklint limit is two
    assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(gauge.completed.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_queue_idle_only_when_drained() {
    let events = EventChannel::new();
    let mut receiver = events.subscribe();
    let queues = Arc::new(CommandQueues::new(events, 2));
    let gauge = Gauge::new();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let queues = Arc::clone(&queues);
        let gauge = Arc::clone(&gauge);
        handles.push(tokio::spawn(async move {
            queues
                .run(QueueCategory::TypeInfo, async { gauge.work().await })
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut idle_events = 0;
    while let Ok(event) = receiver.try_recv() {
        if let BackendEvent::QueueIdle { queue } = event {
            assert_eq!(queue, QueueCategory::TypeInfo);
            idle_events += 1;
        }
    }
    // five requests through a single-slot queue drain exactly once
    assert_eq!(idle_events, 1);
}

#[tokio::test]
async fn test_backend_active_idle_bracket_activity() {
    let events = EventChannel::new();
    let mut receiver = events.subscribe();
    let queues = Arc::new(CommandQueues::new(events, 2));

    queues
        .run(QueueCategory::Browse, async {
            tokio::time::sleep(Duration::from_millis(5)).await;
        })
        .await;

    let mut saw = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        match event {
            BackendEvent::Active => saw.push("active"),
            BackendEvent::Idle => saw.push("idle"),
            _ => {}
        }
    }
    assert_eq!(saw, ["active", "idle"]);
}

#[tokio::test]
async fn test_low_memory_mode_serializes_all_categories() {
    let queues = Arc::new(CommandQueues::new(EventChannel::new(), 4));
    queues.set_low_memory(true);
    let gauge = Gauge::new();

    let mut handles = Vec::new();
    for category in [
        QueueCategory::Browse,
        QueueCategory::TypeInfo,
        QueueCategory::CheckLint,
        QueueCategory::Init,
    ] {
        let queues = Arc::clone(&queues);
        let gauge = Arc::clone(&gauge);
        handles.push(tokio::spawn(async move {
            queues.run(category, async { gauge.work().await }).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
    assert_eq!(gauge.completed.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_leaving_low_memory_restores_parallelism() {
    let queues = Arc::new(CommandQueues::new(EventChannel::new(), 4));
    queues.set_low_memory(true);
    queues.set_low_memory(false);
    let gauge = Gauge::new();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let queues = Arc::clone(&queues);
        let gauge = Arc::clone(&gauge);
        handles.push(tokio::spawn(async move {
            queues
                .run(QueueCategory::Browse, async { gauge.work().await })
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert!(gauge.peak.load(Ordering::SeqCst) > 1);
}
