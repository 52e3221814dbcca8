//! Batch evaluation of the chat pipeline against a JSONL dataset
//!
//! Every row is answered by the pipeline, then scored by each selected metric. F1 is
//! computed locally; the other metrics ask a judge deployment for a 1-5 rating.

mod dataset;
mod metric;
mod scoring;

pub use dataset::{load_dataset, parse_jsonl, validate_rows, EvalRow};
pub use metric::{parse_metrics, Field, Metric, QA_COMPONENTS};
pub use scoring::{f1_score, normalize_answer, parse_judge_score};

use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::EvaluationConfig;
use crate::error::{Error, Result};
use crate::pipeline::ChatPipeline;
use crate::providers::{CompletionProvider, CompletionRequest};

/// Scores for one dataset row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowResult {
    /// Position in the dataset
    pub index: usize,
    pub chat_input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<String>,
    pub reply: String,
    pub context: String,
    pub scores: BTreeMap<Metric, f64>,
}

/// Aggregate for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: Metric,
    pub mean: f64,
    /// `mean * 100 / scale_max`
    pub percentage: f64,
    pub passed: bool,
}

/// Outcome of an evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub run_id: Uuid,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub threshold_percent: f64,
    pub summaries: Vec<MetricSummary>,
    pub rows: Vec<RowResult>,
}

impl EvaluationReport {
    /// True when every metric reached the threshold
    pub fn passed(&self) -> bool {
        self.summaries.iter().all(|s| s.passed)
    }

    /// Write one JSON object per row
    pub fn write_rows(&self, path: &Path) -> Result<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        for row in &self.rows {
            serde_json::to_writer(&mut file, row)?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        Ok(())
    }
}

/// Runs a dataset through the pipeline and scores the answers
pub struct Evaluator {
    pipeline: ChatPipeline,
    judge: Arc<dyn CompletionProvider>,
    config: EvaluationConfig,
}

impl Evaluator {
    pub fn new(
        pipeline: ChatPipeline,
        judge: Arc<dyn CompletionProvider>,
        config: EvaluationConfig,
    ) -> Self {
        Self {
            pipeline,
            judge,
            config,
        }
    }

    /// Evaluate all rows with the given metrics
    ///
    /// Rows are validated up front, so a dataset that cannot be scored fails before any
    /// network call. Rows run concurrently; results keep dataset order.
    pub async fn run(
        &self,
        name: &str,
        rows: &[EvalRow],
        metrics: &[Metric],
    ) -> Result<EvaluationReport> {
        validate_rows(rows, metrics)?;

        let started_at = Utc::now();
        tracing::info!(
            "Evaluating {} rows with {} metrics (judge: {})",
            rows.len(),
            metrics.len(),
            self.judge.model()
        );

        let mut results: Vec<RowResult> = futures::stream::iter(rows.iter().enumerate())
            .map(|(index, row)| self.evaluate_row(index, row, metrics))
            .buffer_unordered(self.config.concurrency.max(1))
            .try_collect()
            .await?;
        results.sort_by_key(|r| r.index);

        let summaries = metrics
            .iter()
            .map(|&metric| self.summarize(metric, &results))
            .collect();

        Ok(EvaluationReport {
            run_id: Uuid::new_v4(),
            name: name.to_string(),
            started_at,
            threshold_percent: self.config.pass_threshold_percent,
            summaries,
            rows: results,
        })
    }

    async fn evaluate_row(&self, index: usize, row: &EvalRow, metrics: &[Metric]) -> Result<RowResult> {
        let history = row.history();
        let response = self.pipeline.handle_turn(&row.chat_input, &history).await?;

        let mut result = RowResult {
            index,
            chat_input: row.chat_input.clone(),
            ground_truth: row.ground_truth.clone(),
            reply: response.reply,
            context: response.context,
            scores: BTreeMap::new(),
        };

        for &metric in metrics {
            let score = self.score(metric, &result).await?;
            result.scores.insert(metric, score);
        }

        tracing::debug!("Row {} scored: {:?}", index, result.scores);
        Ok(result)
    }

    async fn score(&self, metric: Metric, row: &RowResult) -> Result<f64> {
        match metric {
            Metric::F1Score => Ok(f1_score(
                &row.reply,
                row.ground_truth.as_deref().unwrap_or_default(),
            )),
            Metric::Qa => {
                let mut total = 0.0;
                for component in QA_COMPONENTS {
                    total += self.judge(component, row).await?;
                }
                Ok(total / QA_COMPONENTS.len() as f64)
            }
            judged => self.judge(judged, row).await,
        }
    }

    async fn judge(&self, metric: Metric, row: &RowResult) -> Result<f64> {
        let template = metric
            .judge_template()
            .ok_or_else(|| Error::internal(format!("{} has no judge template", metric)))?;

        let mut request = CompletionRequest::new(template, self.config.judge_max_tokens, 0.0);
        for field in metric.required_fields() {
            request = match field {
                Field::Question => request.with_variable("question", row.chat_input.as_str()),
                Field::Answer => request.with_variable("answer", row.reply.as_str()),
                Field::Context => request.with_variable("context", row.context.as_str()),
                Field::GroundTruth => request.with_variable(
                    "ground_truth",
                    row.ground_truth.as_deref().unwrap_or_default(),
                ),
            };
        }

        let output = self.judge.complete(&request).await?;
        parse_judge_score(&output)
    }

    fn summarize(&self, metric: Metric, rows: &[RowResult]) -> MetricSummary {
        let values: Vec<f64> = rows.iter().filter_map(|r| r.scores.get(&metric).copied()).collect();
        let mean = if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        };
        let percentage = mean * 100.0 / metric.scale_max();
        MetricSummary {
            metric,
            mean,
            percentage,
            passed: percentage >= self.config.pass_threshold_percent,
        }
    }
}
