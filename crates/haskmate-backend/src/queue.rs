//! Per-category bounded-concurrency command queues
//!
//! Each category admits up to its configured number of concurrently-running
//! invocations and queues the rest FIFO on a semaphore. Low-memory mode
//! collapses every category onto one shared single-slot queue.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::events::{BackendEvent, EventChannel};

/// Command categories with independent concurrency limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueCategory {
    /// check/lint invocations
    CheckLint,
    /// symbol browse
    Browse,
    /// type/info queries
    TypeInfo,
    /// imported-from lookups
    FindRefs,
    /// language-pragma / compiler-option listing
    Init,
    /// module listing
    List,
    /// shared single-slot fallback in low-memory mode
    LowMemory,
}

impl QueueCategory {
    const ALL: [QueueCategory; 7] = [
        QueueCategory::CheckLint,
        QueueCategory::Browse,
        QueueCategory::TypeInfo,
        QueueCategory::FindRefs,
        QueueCategory::Init,
        QueueCategory::List,
        QueueCategory::LowMemory,
    ];

    fn default_limit(self, browse_parallelism: usize) -> usize {
        match self {
            QueueCategory::CheckLint => 2,
            QueueCategory::Browse => browse_parallelism.max(1),
            QueueCategory::TypeInfo => 1,
            QueueCategory::FindRefs => 1,
            QueueCategory::Init => 4,
            QueueCategory::List => 1,
            QueueCategory::LowMemory => 1,
        }
    }
}

struct Lane {
    semaphore: Arc<Semaphore>,
    /// Running plus waiting invocations in this lane
    pending: AtomicUsize,
    limit: AtomicUsize,
}

/// All queues for one project root
pub struct CommandQueues {
    lanes: HashMap<QueueCategory, Lane>,
    global_pending: AtomicUsize,
    low_memory: AtomicBool,
    events: EventChannel,
}

impl CommandQueues {
    pub fn new(events: EventChannel, browse_parallelism: usize) -> Self {
        let lanes = QueueCategory::ALL
            .into_iter()
            .map(|category| {
                let limit = category.default_limit(browse_parallelism);
                (
                    category,
                    Lane {
                        semaphore: Arc::new(Semaphore::new(limit)),
                        pending: AtomicUsize::new(0),
                        limit: AtomicUsize::new(limit),
                    },
                )
            })
            .collect();
        Self {
            lanes,
            global_pending: AtomicUsize::new(0),
            low_memory: AtomicBool::new(false),
            events,
        }
    }

    /// Force all categories through the single-slot fallback queue
    pub fn set_low_memory(&self, on: bool) {
        self.low_memory.store(on, Ordering::SeqCst);
    }

    pub fn low_memory(&self) -> bool {
        self.low_memory.load(Ordering::SeqCst)
    }

    /// Adjust browse concurrency live. Growing adds permits immediately;
    /// shrinking retires permits as running invocations release them.
    pub fn set_browse_parallelism(&self, target: usize) {
        let target = target.max(1);
        let lane = &self.lanes[&QueueCategory::Browse];
        let current = lane.limit.swap(target, Ordering::SeqCst);
        if target > current {
            lane.semaphore.add_permits(target - current);
        } else if target < current {
            let semaphore = Arc::clone(&lane.semaphore);
            let retire = current - target;
            tokio::spawn(async move {
                for _ in 0..retire {
                    if let Ok(permit) = semaphore.clone().acquire_owned().await {
                        permit.forget();
                    }
                }
            });
        }
    }

    /// Queue `task` on `category` (or the fallback queue in low-memory
    /// mode), emitting activity and idle events around it.
    pub async fn run<F, T>(&self, category: QueueCategory, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let effective = if self.low_memory() {
            QueueCategory::LowMemory
        } else {
            category
        };
        let lane = &self.lanes[&effective];

        lane.pending.fetch_add(1, Ordering::SeqCst);
        if self.global_pending.fetch_add(1, Ordering::SeqCst) == 0 {
            self.events.emit(BackendEvent::Active);
        }

        let permit = lane
            .semaphore
            .acquire()
            .await
            .expect("queue semaphore never closed");
        debug!(queue = ?effective, "Invocation admitted");
        let result = task.await;
        drop(permit);

        if lane.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.events.emit(BackendEvent::QueueIdle { queue: effective });
        }
        if self.global_pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.events.emit(BackendEvent::Idle);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn queues() -> Arc<CommandQueues> {
        Arc::new(CommandQueues::new(EventChannel::new(), 2))
    }

    #[tokio::test]
    async fn test_concurrency_bound_holds() {
        let queues = queues();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queues = Arc::clone(&queues);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                queues
                    .run(QueueCategory::TypeInfo, async {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_queue_idle_fires_once_drained() {
        let events = EventChannel::new();
        let mut receiver = events.subscribe();
        let queues = Arc::new(CommandQueues::new(events, 2));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let queues = Arc::clone(&queues);
            handles.push(tokio::spawn(async move {
                queues
                    .run(QueueCategory::Browse, async {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut saw_active = false;
        let mut queue_idle = 0;
        let mut saw_idle = false;
        while let Ok(event) = receiver.try_recv() {
            match event {
                BackendEvent::Active => saw_active = true,
                BackendEvent::QueueIdle { queue } => {
                    assert_eq!(queue, QueueCategory::Browse);
                    queue_idle += 1;
                }
                BackendEvent::Idle => saw_idle = true,
                _ => {}
            }
        }
        assert!(saw_active);
        assert_eq!(queue_idle, 1);
        assert!(saw_idle);
    }

    #[tokio::test]
    async fn test_low_memory_serializes_categories() {
        let queues = queues();
        queues.set_low_memory(true);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let spawn = |category| {
            let queues = Arc::clone(&queues);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                queues
                    .run(category, async {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            })
        };
        let a = spawn(QueueCategory::Browse);
        let b = spawn(QueueCategory::TypeInfo);
        a.await.unwrap();
        b.await.unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_browse_parallelism_grows_live() {
        let queues = queues();
        queues.set_browse_parallelism(4);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queues = Arc::clone(&queues);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                queues
                    .run(QueueCategory::Browse, async {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) > 2);
    }
}
