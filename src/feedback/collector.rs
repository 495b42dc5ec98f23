// Feedback collector
//
// Keeps the latest rating per message, derived error records, and running
// counters. Optionally mirrors every rating to a JSONL log.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::log::FeedbackLog;
use super::trends::HelpfulnessTrend;
use super::types::{
    AccuracyReport, ClassificationErrorRecord, ConfusionEntry, ConfusionExample, ErrorPattern,
    FeedbackDetails, FeedbackRecord, FeedbackStats, FeedbackType, HealthLevel, Insight,
    InsightKind, ModelHealth, ToneIssue,
};
use crate::classifier::Category;

const EXAMPLES_PER_CONFUSION: usize = 3;
const EXAMPLE_CHARS: usize = 100;

#[derive(Default)]
struct State {
    counts: HashMap<FeedbackType, u64>,
    total: u64,
    /// Latest record per message, in first-rated order
    records: Vec<FeedbackRecord>,
    record_index: HashMap<String, usize>,
    errors: BTreeMap<String, ClassificationErrorRecord>,
    tone_issues: Vec<ToneIssue>,
}

pub struct FeedbackCollector {
    state: Mutex<State>,
    trend: Mutex<HelpfulnessTrend>,
    log: Option<FeedbackLog>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(part as f64 / total as f64 * 100.0)
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(EXAMPLE_CHARS).collect()
}

fn category_label(category: Option<Category>) -> &'static str {
    category.map_or("UNKNOWN", |c| c.as_str())
}

impl FeedbackCollector {
    pub fn new(trend_window: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            trend: Mutex::new(HelpfulnessTrend::new(trend_window)),
            log: None,
        }
    }

    /// Mirror ratings to a JSONL log
    pub fn with_log(mut self, log: FeedbackLog) -> Self {
        self.log = Some(log);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn trend(&self) -> MutexGuard<'_, HelpfulnessTrend> {
        self.trend.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record_feedback(
        &self,
        message_id: &str,
        user_id: &str,
        session_id: &str,
        feedback_type: FeedbackType,
        details: FeedbackDetails,
    ) -> FeedbackRecord {
        let record = FeedbackRecord {
            message_id: message_id.to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            feedback_type,
            details,
            timestamp: Utc::now(),
        };

        tracing::info!(message_id, feedback_type = %feedback_type, "Feedback recorded");

        {
            let mut state = self.state();
            *state.counts.entry(feedback_type).or_insert(0) += 1;
            state.total += 1;

            match state.record_index.get(message_id).copied() {
                Some(pos) => state.records[pos] = record.clone(),
                None => {
                    let pos = state.records.len();
                    state.records.push(record.clone());
                    state.record_index.insert(message_id.to_string(), pos);
                }
            }

            match feedback_type {
                FeedbackType::WrongCategory => {
                    let error = Self::classification_error(&record);
                    tracing::warn!(
                        message_id,
                        predicted = category_label(error.predicted),
                        actual = category_label(error.actual),
                        confidence = error.confidence,
                        "Classification error reported"
                    );
                    state.errors.insert(message_id.to_string(), error);
                }
                FeedbackType::ToneOff => {
                    let issue = Self::tone_issue(&record);
                    tracing::warn!(
                        message_id,
                        intensity = ?issue.emotional_intensity,
                        comment = ?issue.user_comment,
                        "Tone issue reported"
                    );
                    state.tone_issues.push(issue);
                }
                FeedbackType::Helpful | FeedbackType::NotHelpful => {}
            }
        }

        self.trend().record(feedback_type == FeedbackType::Helpful);

        if let Some(log) = &self.log {
            if let Err(e) = log.log(&record) {
                tracing::warn!(error = %e, path = %log.path().display(), "Failed to persist feedback");
            }
        }

        record
    }

    fn classification_error(record: &FeedbackRecord) -> ClassificationErrorRecord {
        let d = &record.details;
        ClassificationErrorRecord {
            message_id: record.message_id.clone(),
            original_message: d.message.clone().unwrap_or_default(),
            predicted: d.predicted,
            actual: d.actual,
            predicted_subcategory: d.predicted_subcategory.clone(),
            actual_subcategory: d.actual_subcategory.clone(),
            confidence: d.confidence.unwrap_or(0.0),
            method: d.method.clone().unwrap_or_else(|| "unknown".to_string()),
            user_id: record.user_id.clone(),
            session_id: record.session_id.clone(),
            timestamp: record.timestamp,
        }
    }

    fn tone_issue(record: &FeedbackRecord) -> ToneIssue {
        let d = &record.details;
        ToneIssue {
            message_id: record.message_id.clone(),
            original_message: d.message.clone().unwrap_or_default(),
            response_text: d.response_text.clone().unwrap_or_default(),
            emotional_intensity: d.emotional_intensity,
            user_comment: d.user_comment.clone(),
            user_id: record.user_id.clone(),
            session_id: record.session_id.clone(),
            timestamp: record.timestamp,
        }
    }

    pub fn feedback(&self, message_id: &str) -> Option<FeedbackRecord> {
        let state = self.state();
        state
            .record_index
            .get(message_id)
            .map(|&pos| state.records[pos].clone())
    }

    pub fn feedback_stats(&self) -> FeedbackStats {
        let state = self.state();
        let count = |t: FeedbackType| state.counts.get(&t).copied().unwrap_or(0);

        let helpful = count(FeedbackType::Helpful);
        let errors = count(FeedbackType::WrongCategory) + count(FeedbackType::ToneOff);

        FeedbackStats {
            helpful,
            not_helpful: count(FeedbackType::NotHelpful),
            wrong_category: count(FeedbackType::WrongCategory),
            tone_off: count(FeedbackType::ToneOff),
            total: state.total,
            helpful_rate: percent(helpful, state.total),
            error_rate: percent(errors, state.total),
            classification_errors: state.errors.len(),
            tone_issues: state.tone_issues.len(),
            unique_messages: state.records.len(),
            trend: self.trend().trend(),
        }
    }

    /// Most recent classification errors first
    pub fn classification_errors(&self, limit: usize) -> Vec<ClassificationErrorRecord> {
        let state = self.state();
        let mut errors: Vec<ClassificationErrorRecord> = state.errors.values().cloned().collect();
        errors.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        errors.truncate(limit);
        errors
    }

    /// predicted -> actual pairs, most frequent first
    pub fn confusion_matrix(&self) -> Vec<ConfusionEntry> {
        let state = self.state();
        let mut entries: Vec<ConfusionEntry> = Vec::new();

        for error in state.errors.values() {
            let pos = match entries
                .iter()
                .position(|e| e.predicted == error.predicted && e.actual == error.actual)
            {
                Some(pos) => pos,
                None => {
                    entries.push(ConfusionEntry {
                        predicted: error.predicted,
                        actual: error.actual,
                        count: 0,
                        examples: Vec::new(),
                    });
                    entries.len() - 1
                }
            };

            let entry = &mut entries[pos];
            entry.count += 1;
            if entry.examples.len() < EXAMPLES_PER_CONFUSION {
                entry.examples.push(ConfusionExample {
                    message: excerpt(&error.original_message),
                    confidence: error.confidence,
                });
            }
        }

        entries.sort_by(|a, b| b.count.cmp(&a.count));
        entries
    }

    pub fn improvement_insights(&self) -> Vec<Insight> {
        let stats = self.feedback_stats();
        let mut insights = Vec::new();

        if stats.total > 0 && stats.helpful_rate < 70.0 {
            insights.push(Insight {
                kind: InsightKind::Warning,
                title: "Low helpful rate".to_string(),
                description: format!("Only {}% of responses marked as helpful", stats.helpful_rate),
                action: "Review response templates and improve empathy".to_string(),
            });
        }

        if stats.error_rate > 20.0 {
            insights.push(Insight {
                kind: InsightKind::Critical,
                title: "High error rate".to_string(),
                description: format!("{}% of responses have issues", stats.error_rate),
                action: "Review classification accuracy and tone settings".to_string(),
            });
        }

        if let Some(top) = self.confusion_matrix().first() {
            if top.count >= 5 {
                insights.push(Insight {
                    kind: InsightKind::Improvement,
                    title: "Common classification error".to_string(),
                    description: format!(
                        "\"{}\" often confused with \"{}\" ({} times)",
                        category_label(top.predicted),
                        category_label(top.actual),
                        top.count
                    ),
                    action: "Improve pattern detection for this category".to_string(),
                });
            }
        }

        let recent = self.classification_errors(10);
        if !recent.is_empty() {
            insights.push(Insight {
                kind: InsightKind::Info,
                title: "Recent classification errors".to_string(),
                description: format!("{} errors need review", recent.len()),
                action: "Review and update classification patterns".to_string(),
            });
        }

        insights
    }

    /// timestamp,user_id,session_id,message_id,feedback_type,details
    pub fn export_csv(&self) -> Result<String> {
        let state = self.state();
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["timestamp", "user_id", "session_id", "message_id", "feedback_type", "details"])?;

        for record in &state.records {
            let details = serde_json::to_string(&record.details)?;
            writer.write_record([
                record.timestamp.to_rfc3339().as_str(),
                record.user_id.as_str(),
                record.session_id.as_str(),
                record.message_id.as_str(),
                record.feedback_type.to_string().as_str(),
                details.as_str(),
            ])?;
        }

        let bytes = writer.into_inner().context("failed to flush feedback CSV")?;
        String::from_utf8(bytes).context("feedback CSV is not UTF-8")
    }

    /// Accuracy over the most recent `limit` rated messages
    pub fn evaluate_classification_accuracy(&self, limit: usize) -> AccuracyReport {
        let state = self.state();
        let mut recent: Vec<&FeedbackRecord> = state.records.iter().collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(limit);

        let count = |t: FeedbackType| recent.iter().filter(|r| r.feedback_type == t).count();
        let helpful = count(FeedbackType::Helpful);

        let mut patterns: Vec<(String, usize, f64)> = Vec::new();
        for record in recent.iter().filter(|r| r.feedback_type == FeedbackType::WrongCategory) {
            let key = format!(
                "{} → {}",
                category_label(record.details.predicted),
                category_label(record.details.actual)
            );
            let confidence = record.details.confidence.unwrap_or(0.0);
            match patterns.iter_mut().find(|(k, _, _)| *k == key) {
                Some((_, n, sum)) => {
                    *n += 1;
                    *sum += confidence;
                }
                None => patterns.push((key, 1, confidence)),
            }
        }

        let mut error_patterns: Vec<ErrorPattern> = patterns
            .into_iter()
            .map(|(pattern, count, sum)| ErrorPattern {
                pattern,
                count,
                avg_confidence: (sum / count as f64 * 100.0).round() / 100.0,
            })
            .collect();
        error_patterns.sort_by(|a, b| b.count.cmp(&a.count));

        let report = AccuracyReport {
            accuracy: percent(helpful as u64, recent.len() as u64),
            total_feedback: recent.len(),
            helpful,
            not_helpful: count(FeedbackType::NotHelpful),
            wrong_category: count(FeedbackType::WrongCategory),
            tone_off: count(FeedbackType::ToneOff),
            error_patterns,
            evaluated_at: Utc::now(),
        };

        tracing::info!(
            total = report.total_feedback,
            accuracy = report.accuracy,
            patterns = report.error_patterns.len(),
            "Classification accuracy evaluated"
        );

        report
    }

    pub fn model_health(&self) -> ModelHealth {
        let evaluation = self.evaluate_classification_accuracy(100);
        let error_rate = percent(
            (evaluation.wrong_category + evaluation.tone_off) as u64,
            evaluation.total_feedback as u64,
        );

        let health = if evaluation.accuracy < 70.0 || error_rate > 20.0 {
            HealthLevel::Critical
        } else if evaluation.accuracy < 80.0 || error_rate > 10.0 {
            HealthLevel::NeedsImprovement
        } else if evaluation.accuracy < 90.0 {
            HealthLevel::Good
        } else {
            HealthLevel::Excellent
        };

        let mut top_confusions = self.confusion_matrix();
        top_confusions.truncate(3);

        ModelHealth {
            health,
            accuracy: evaluation.accuracy,
            error_rate,
            total_feedback: evaluation.total_feedback,
            top_confusions,
            insights: self.improvement_insights(),
        }
    }

    pub fn reset(&self) {
        *self.state() = State::default();
        let mut trend = self.trend();
        let window = trend.window_size();
        *trend = HelpfulnessTrend::new(window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrong(predicted: Category, actual: Category) -> FeedbackDetails {
        FeedbackDetails {
            message: Some("my manager keeps texting me at night".to_string()),
            predicted: Some(predicted),
            actual: Some(actual),
            confidence: Some(0.8),
            ..Default::default()
        }
    }

    #[test]
    fn test_stats_and_rates() {
        let collector = FeedbackCollector::new(50);
        collector.record_feedback("m1", "u1", "s1", FeedbackType::Helpful, FeedbackDetails::default());
        collector.record_feedback("m2", "u1", "s1", FeedbackType::Helpful, FeedbackDetails::default());
        collector.record_feedback("m3", "u1", "s1", FeedbackType::NotHelpful, FeedbackDetails::default());
        collector.record_feedback(
            "m4",
            "u1",
            "s1",
            FeedbackType::WrongCategory,
            wrong(Category::Relationship, Category::Employment),
        );

        let stats = collector.feedback_stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.helpful_rate, 50.0);
        assert_eq!(stats.error_rate, 25.0);
        assert_eq!(stats.classification_errors, 1);

        let kinds: Vec<InsightKind> = collector.improvement_insights().iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![InsightKind::Warning, InsightKind::Critical, InsightKind::Info]);
    }

    #[test]
    fn test_re_rating_replaces_record() {
        let collector = FeedbackCollector::new(50);
        collector.record_feedback("m1", "u1", "s1", FeedbackType::NotHelpful, FeedbackDetails::default());
        collector.record_feedback("m1", "u1", "s1", FeedbackType::Helpful, FeedbackDetails::default());

        assert_eq!(collector.feedback("m1").unwrap().feedback_type, FeedbackType::Helpful);
        let stats = collector.feedback_stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.unique_messages, 1);
    }

    #[test]
    fn test_confusion_matrix_and_insight() {
        let collector = FeedbackCollector::new(50);
        for i in 0..5 {
            collector.record_feedback(
                &format!("m{}", i),
                "u1",
                "s1",
                FeedbackType::WrongCategory,
                wrong(Category::Relationship, Category::Employment),
            );
        }
        collector.record_feedback(
            "m9",
            "u1",
            "s1",
            FeedbackType::WrongCategory,
            wrong(Category::General, Category::Identity),
        );

        let matrix = collector.confusion_matrix();
        assert_eq!(matrix[0].count, 5);
        assert_eq!(matrix[0].examples.len(), 3);
        assert_eq!(matrix[1].count, 1);

        assert!(collector
            .improvement_insights()
            .iter()
            .any(|i| i.kind == InsightKind::Improvement));

        let report = collector.evaluate_classification_accuracy(100);
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.error_patterns[0].pattern, "RELATIONSHIP → EMPLOYMENT");
        assert_eq!(report.error_patterns[0].avg_confidence, 0.8);
        assert_eq!(collector.model_health().health, HealthLevel::Critical);
    }

    #[test]
    fn test_tone_issue_recorded() {
        let collector = FeedbackCollector::new(50);
        let details = FeedbackDetails {
            user_comment: Some("felt dismissive".to_string()),
            ..Default::default()
        };
        collector.record_feedback("m1", "u1", "s1", FeedbackType::ToneOff, details);
        assert_eq!(collector.feedback_stats().tone_issues, 1);
    }

    #[test]
    fn test_csv_export_quotes_details() {
        let collector = FeedbackCollector::new(50);
        collector.record_feedback(
            "m1",
            "u1",
            "s1",
            FeedbackType::WrongCategory,
            wrong(Category::Relationship, Category::Employment),
        );

        let csv = collector.export_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("timestamp,user_id,session_id,message_id,feedback_type,details")
        );
        let row = lines.next().unwrap();
        assert!(row.contains(",u1,s1,m1,wrong_category,\"{"));
        assert!(row.contains("\"\"predicted\"\":\"\"RELATIONSHIP\"\""));
    }

    #[test]
    fn test_csv_export_survives_awkward_ids() {
        let collector = FeedbackCollector::new(50);
        let user_id = "doe, \"jane\"\nsecond line";
        collector.record_feedback("m,2", user_id, "s2", FeedbackType::Helpful, FeedbackDetails::default());

        let csv = collector.export_csv().unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], user_id);
        assert_eq!(&rows[0][3], "m,2");
        assert_eq!(&rows[0][4], "helpful");
        let details: serde_json::Value = serde_json::from_str(&rows[0][5]).unwrap();
        assert!(details.is_object());
    }

    #[test]
    fn test_empty_collector() {
        let collector = FeedbackCollector::new(50);
        assert!(collector.improvement_insights().is_empty());
        assert_eq!(collector.evaluate_classification_accuracy(10).total_feedback, 0);
    }
}
