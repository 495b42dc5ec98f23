// Integration tests for batched analytics

mod common;

use common::RecordingSink;
use serde_json::json;
use std::time::Duration;

use amani::analytics::{AnalyticsEventType, BatchAnalyticsProcessor};
use amani::config::AnalyticsConfig;

fn config(max_batch_size: usize, max_wait_ms: u64) -> AnalyticsConfig {
    AnalyticsConfig {
        max_batch_size,
        max_wait_ms,
        ..AnalyticsConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_batch_flushes_immediately() {
    let sink = RecordingSink::new();
    let processor = BatchAnalyticsProcessor::new(&config(3, 5000), sink.clone());

    for i in 0..3 {
        processor.queue_event(
            AnalyticsEventType::Classification,
            "user-1",
            "session-1",
            json!({ "n": i }),
        );
    }

    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(sink.event_count(), 3);
    assert_eq!(processor.stats().queue_size, 0);
}

#[tokio::test(start_paused = true)]
async fn test_partial_batch_waits_for_timer() {
    let sink = RecordingSink::new();
    let processor = BatchAnalyticsProcessor::new(&config(10, 1000), sink.clone());

    processor.queue_event(AnalyticsEventType::Engagement, "user-1", "session-1", json!({}));
    processor.queue_event(AnalyticsEventType::Engagement, "user-1", "session-1", json!({}));

    tokio::time::sleep(Duration::from_millis(999)).await;
    assert_eq!(sink.event_count(), 0);

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(sink.event_count(), 2);
    assert_eq!(sink.batch_count(), 1);
}

#[tokio::test]
async fn test_flush_groups_by_type() {
    let sink = RecordingSink::new();
    let processor = BatchAnalyticsProcessor::new(&config(10, 60_000), sink.clone());

    processor.queue_event(AnalyticsEventType::Classification, "u", "s", json!({}));
    processor.queue_event(AnalyticsEventType::Feedback, "u", "s", json!({}));
    processor.queue_event(AnalyticsEventType::Classification, "u", "s", json!({}));

    assert_eq!(processor.flush().await, 3);

    let mut types = sink.types();
    types.sort();
    assert_eq!(
        types,
        vec![AnalyticsEventType::Classification, AnalyticsEventType::Feedback]
    );
}

#[tokio::test]
async fn test_failed_batch_is_kept() {
    let sink = RecordingSink::failing();
    let processor = BatchAnalyticsProcessor::new(&config(10, 60_000), sink);

    processor.queue_event(AnalyticsEventType::Crisis, "u", "s", json!({ "severity": 10 }));
    processor.queue_event(AnalyticsEventType::Crisis, "u", "s", json!({ "severity": 9 }));

    assert_eq!(processor.flush().await, 0);

    let failed = processor.failed_batches();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].len(), 2);
    assert_eq!(processor.stats().events_failed, 2);
}

#[tokio::test]
async fn test_shutdown_drains_queue() {
    let sink = RecordingSink::new();
    let processor = BatchAnalyticsProcessor::new(&config(2, 60_000), sink.clone());

    for _ in 0..5 {
        processor.queue_event(AnalyticsEventType::ResourceClick, "u", "s", json!({}));
    }
    processor.shutdown().await;

    assert_eq!(sink.event_count(), 5);
    assert_eq!(processor.stats().queue_size, 0);
}
