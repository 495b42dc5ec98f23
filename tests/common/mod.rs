// Shared test doubles

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use amani::analytics::{AnalyticsEvent, AnalyticsEventType, AnalyticsSink, LogSink};
use amani::config::Config;
use amani::notify::{NotificationChannel, Notifier, NotifyOutcome};
use amani::pipeline::SupportPipeline;
use amani::providers::{CompletionRequest, CompletionResponse, LlmProvider};

/// How a mock provider answers
#[derive(Clone)]
pub enum Behavior {
    Reply(String),
    Fail,
    Hang,
}

/// Provider that answers from a script and counts calls
pub struct MockProvider {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn replying(json: &str) -> Arc<Self> {
        Self::new(Behavior::Reply(json.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Reply(text) => Ok(CompletionResponse {
                text: text.clone(),
                model: "mock".to_string(),
                usage: None,
                provider: "mock".to_string(),
            }),
            Behavior::Fail => anyhow::bail!("mock provider unavailable"),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                anyhow::bail!("mock provider woke up")
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock"
    }
}

/// Notifier that records every channel it was asked to use
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(NotificationChannel, serde_json::Value)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self, channel: NotificationChannel) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == channel)
            .count()
    }

    pub fn payloads(&self, channel: NotificationChannel) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, channel: NotificationChannel, payload: &serde_json::Value) -> Result<NotifyOutcome> {
        self.sent.lock().unwrap().push((channel, payload.clone()));
        Ok(NotifyOutcome {
            success: true,
            method: "recording".to_string(),
        })
    }
}

/// Sink that keeps every batch; optionally rejects them all
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<(AnalyticsEventType, Vec<AnalyticsEvent>)>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn event_count(&self) -> usize {
        self.batches.lock().unwrap().iter().map(|(_, e)| e.len()).sum()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn types(&self) -> Vec<AnalyticsEventType> {
        self.batches.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

#[async_trait]
impl AnalyticsSink for RecordingSink {
    async fn write_batch(&self, event_type: AnalyticsEventType, events: &[AnalyticsEvent]) -> Result<()> {
        if self.fail {
            anyhow::bail!("sink offline");
        }
        self.batches.lock().unwrap().push((event_type, events.to_vec()));
        Ok(())
    }
}

/// Pipeline over the given provider with in-memory collaborators
pub fn pipeline_with(provider: Arc<dyn LlmProvider>, notifier: Arc<dyn Notifier>) -> SupportPipeline {
    let mut config = Config::default();
    config.audit.emergency_log_path = None;

    SupportPipeline::builder(config)
        .provider(provider)
        .notifier(notifier)
        .analytics_sink(Arc::new(LogSink))
        .build()
        .expect("pipeline should build")
}
