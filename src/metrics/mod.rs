// Pipeline metrics
// Prometheus counters and histograms exposed on /metrics

use anyhow::{Context, Result};
use prometheus::{
    register_histogram_vec_with_registry, register_histogram_with_registry,
    register_int_counter_vec_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    HistogramVec, IntCounterVec, IntGauge, Registry, TextEncoder,
};

use crate::classifier::Classification;

#[derive(Clone)]
pub struct PipelineMetrics {
    pub messages_total: IntCounterVec,
    pub crisis_detections_total: IntCounterVec,
    pub fallback_level: HistogramVec,
    pub handoffs_total: IntCounterVec,
    pub processing_seconds: Histogram,
    pub analytics_failed_events: IntGauge,
    pub active_crises: IntGauge,
    registry: Registry,
}

impl PipelineMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let messages_total = register_int_counter_vec_with_registry!(
            "amani_messages_total",
            "Messages processed by classification method",
            &["method"],
            registry
        )?;

        let crisis_detections_total = register_int_counter_vec_with_registry!(
            "amani_crisis_detections_total",
            "Crisis detections by severity tier",
            &["severity"],
            registry
        )?;

        let fallback_level = register_histogram_vec_with_registry!(
            "amani_fallback_level",
            "Degradation chain level that produced the classification",
            &["strategy"],
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            registry
        )?;

        let handoffs_total = register_int_counter_vec_with_registry!(
            "amani_handoffs_total",
            "Human handoffs opened by priority",
            &["priority"],
            registry
        )?;

        let processing_seconds = register_histogram_with_registry!(
            "amani_processing_seconds",
            "End-to-end message processing time",
            vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0],
            registry
        )?;

        let analytics_failed_events = register_int_gauge_with_registry!(
            "amani_analytics_failed_events",
            "Analytics events in failed batches",
            registry
        )?;

        let active_crises = register_int_gauge_with_registry!(
            "amani_active_crises",
            "Users with an open crisis",
            registry
        )?;

        Ok(Self {
            messages_total,
            crisis_detections_total,
            fallback_level,
            handoffs_total,
            processing_seconds,
            analytics_failed_events,
            active_crises,
            registry,
        })
    }

    pub fn observe_classification(&self, classification: &Classification) {
        self.messages_total
            .with_label_values(&[classification.method.as_str()])
            .inc();

        if let Some(level) = classification.fallback_level {
            let strategy = classification.strategy_used.as_deref().unwrap_or("unknown");
            self.fallback_level
                .with_label_values(&[strategy])
                .observe(level as f64);
        }
    }

    /// Prometheus text exposition
    pub fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .context("Failed to encode metrics")?;
        String::from_utf8(buf).context("Metrics output was not UTF-8")
    }
}
