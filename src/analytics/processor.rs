// Batch analytics processor
//
// Events queue up and flush when the queue reaches max_batch_size or when
// the single debounced timer fires, whichever comes first. Only one flush
// runs at a time.

use chrono::Utc;
use futures::future::try_join_all;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::sink::AnalyticsSink;
use super::types::{AnalyticsEvent, AnalyticsEventType, AnalyticsStats};
use crate::config::AnalyticsConfig;

#[derive(Default)]
struct Counters {
    events_queued: u64,
    events_processed: u64,
    events_failed: u64,
    batches_processed: u64,
    last_processed_at: Option<chrono::DateTime<Utc>>,
}

struct Inner {
    max_batch_size: usize,
    max_wait: Duration,
    crisis_alert_threshold: f64,
    sink: Arc<dyn AnalyticsSink>,
    queue: Mutex<VecDeque<AnalyticsEvent>>,
    processing: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
    failed_batches: Mutex<Vec<Vec<AnalyticsEvent>>>,
    counters: Mutex<Counters>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Clone)]
pub struct BatchAnalyticsProcessor {
    inner: Arc<Inner>,
}

impl BatchAnalyticsProcessor {
    pub fn new(config: &AnalyticsConfig, sink: Arc<dyn AnalyticsSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_batch_size: config.max_batch_size.max(1),
                max_wait: Duration::from_millis(config.max_wait_ms),
                crisis_alert_threshold: config.crisis_alert_threshold,
                sink,
                queue: Mutex::new(VecDeque::new()),
                processing: AtomicBool::new(false),
                timer: Mutex::new(None),
                failed_batches: Mutex::new(Vec::new()),
                counters: Mutex::new(Counters::default()),
            }),
        }
    }

    /// Enqueue an event; never blocks on the sink
    pub fn queue_event(
        &self,
        event_type: AnalyticsEventType,
        user_id: &str,
        session_id: &str,
        data: serde_json::Value,
    ) {
        let event = AnalyticsEvent::new(event_type, user_id, session_id, data);

        if event_type == AnalyticsEventType::Crisis {
            if let Some(severity) = event.severity() {
                if severity >= self.inner.crisis_alert_threshold {
                    tracing::warn!(user_id, session_id, severity, "High severity crisis event");
                }
            }
        }

        let queued = {
            let mut queue = lock(&self.inner.queue);
            queue.push_back(event);
            queue.len()
        };
        lock(&self.inner.counters).events_queued += 1;

        if queued >= self.inner.max_batch_size {
            self.cancel_timer();
            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                tracing::debug!("No runtime for analytics flush; events stay queued");
                return;
            };
            let processor = self.clone();
            handle.spawn(async move {
                processor.flush().await;
            });
        } else {
            self.schedule_flush();
        }
    }

    /// Start the debounce timer unless one is already pending
    fn schedule_flush(&self) {
        let mut timer = lock(&self.inner.timer);
        if timer.as_ref().map_or(false, |t| !t.is_finished()) {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let processor = self.clone();
        let wait = self.inner.max_wait;
        *timer = Some(handle.spawn(async move {
            tokio::time::sleep(wait).await;
            // Release our own slot so flush doesn't abort this task
            lock(&processor.inner.timer).take();
            processor.flush().await;
        }));
    }

    fn cancel_timer(&self) {
        if let Some(timer) = lock(&self.inner.timer).take() {
            timer.abort();
        }
    }

    /// Process up to one batch; returns the number of events written
    pub async fn flush(&self) -> usize {
        self.cancel_timer();

        if self
            .inner
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return 0;
        }

        let batch: Vec<AnalyticsEvent> = {
            let mut queue = lock(&self.inner.queue);
            let take = queue.len().min(self.inner.max_batch_size);
            queue.drain(..take).collect()
        };

        let written = if batch.is_empty() {
            0
        } else {
            self.process_batch(batch).await
        };

        self.inner.processing.store(false, Ordering::Release);

        if !lock(&self.inner.queue).is_empty() {
            self.schedule_flush();
        }

        written
    }

    async fn process_batch(&self, batch: Vec<AnalyticsEvent>) -> usize {
        let mut grouped: BTreeMap<AnalyticsEventType, Vec<AnalyticsEvent>> = BTreeMap::new();
        for event in &batch {
            grouped.entry(event.event_type).or_default().push(event.clone());
        }

        let sink = &self.inner.sink;
        let writes = grouped
            .iter()
            .map(|(event_type, events)| sink.write_batch(*event_type, events));

        match try_join_all(writes).await {
            Ok(_) => {
                let mut counters = lock(&self.inner.counters);
                counters.batches_processed += 1;
                counters.events_processed += batch.len() as u64;
                counters.last_processed_at = Some(Utc::now());
                tracing::debug!(count = batch.len(), types = grouped.len(), "Analytics batch processed");
                batch.len()
            }
            Err(e) => {
                tracing::error!(count = batch.len(), error = %e, "Failed to process analytics batch");
                lock(&self.inner.counters).events_failed += batch.len() as u64;
                lock(&self.inner.failed_batches).push(batch);
                0
            }
        }
    }

    pub fn stats(&self) -> AnalyticsStats {
        let counters = lock(&self.inner.counters);
        AnalyticsStats {
            events_queued: counters.events_queued,
            events_processed: counters.events_processed,
            events_failed: counters.events_failed,
            batches_processed: counters.batches_processed,
            average_batch_size: if counters.batches_processed == 0 {
                0.0
            } else {
                counters.events_processed as f64 / counters.batches_processed as f64
            },
            last_processed_at: counters.last_processed_at,
            queue_size: lock(&self.inner.queue).len(),
            failed_batches: lock(&self.inner.failed_batches).len(),
            processing: self.inner.processing.load(Ordering::Acquire),
        }
    }

    pub fn failed_batches(&self) -> Vec<Vec<AnalyticsEvent>> {
        lock(&self.inner.failed_batches).clone()
    }

    /// Drain the queue before exit
    pub async fn shutdown(&self) {
        self.cancel_timer();
        tracing::info!(queued = lock(&self.inner.queue).len(), "Flushing analytics queue");

        while !lock(&self.inner.queue).is_empty() {
            if self.flush().await == 0 && self.inner.processing.load(Ordering::Acquire) {
                // Another flush holds the batch; let it finish
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
        self.cancel_timer();

        tracing::info!("Analytics queue flushed");
    }
}
