//! Evaluation metrics, resolved once from their names

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::generation::PromptTemplate;

/// Inputs a metric can draw on for one dataset row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// The row's `chat_input`
    Question,
    /// The pipeline's reply
    Answer,
    /// The pipeline's context
    Context,
    /// The row's `ground_truth`
    GroundTruth,
}

/// Supported evaluation metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Coherence,
    F1Score,
    Fluency,
    Groundedness,
    Relevance,
    Similarity,
    /// Mean of the five judged metrics
    Qa,
}

/// Judged metrics averaged by `Metric::Qa`
pub const QA_COMPONENTS: [Metric; 5] = [
    Metric::Groundedness,
    Metric::Relevance,
    Metric::Coherence,
    Metric::Fluency,
    Metric::Similarity,
];

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Coherence => "coherence",
            Metric::F1Score => "f1score",
            Metric::Fluency => "fluency",
            Metric::Groundedness => "groundedness",
            Metric::Relevance => "relevance",
            Metric::Similarity => "similarity",
            Metric::Qa => "qa",
        }
    }

    /// Fields the metric reads
    pub fn required_fields(&self) -> &'static [Field] {
        match self {
            Metric::Coherence | Metric::Fluency => &[Field::Question, Field::Answer],
            Metric::F1Score => &[Field::Answer, Field::GroundTruth],
            Metric::Groundedness => &[Field::Answer, Field::Context],
            Metric::Relevance => &[Field::Question, Field::Answer, Field::Context],
            Metric::Similarity => &[Field::Question, Field::Answer, Field::GroundTruth],
            Metric::Qa => &[
                Field::Question,
                Field::Answer,
                Field::Context,
                Field::GroundTruth,
            ],
        }
    }

    /// Whether the row must carry a ground truth
    pub fn needs_ground_truth(&self) -> bool {
        self.required_fields().contains(&Field::GroundTruth)
    }

    /// Highest attainable score
    pub fn scale_max(&self) -> f64 {
        match self {
            Metric::F1Score => 1.0,
            _ => 5.0,
        }
    }

    /// Judge template for single-judge metrics
    pub fn judge_template(&self) -> Option<PromptTemplate> {
        match self {
            Metric::Coherence => Some(PromptTemplate::Coherence),
            Metric::Fluency => Some(PromptTemplate::Fluency),
            Metric::Groundedness => Some(PromptTemplate::Groundedness),
            Metric::Relevance => Some(PromptTemplate::Relevance),
            Metric::Similarity => Some(PromptTemplate::Similarity),
            Metric::F1Score | Metric::Qa => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coherence" => Ok(Metric::Coherence),
            "f1score" => Ok(Metric::F1Score),
            "fluency" => Ok(Metric::Fluency),
            "groundedness" => Ok(Metric::Groundedness),
            "relevance" => Ok(Metric::Relevance),
            "similarity" => Ok(Metric::Similarity),
            "qa" => Ok(Metric::Qa),
            "latency" => Err(Error::input("Latency metric is not implemented yet")),
            other => Err(Error::input(format!("Unknown metric: {}", other))),
        }
    }
}

/// Parse metric names, dropping duplicates but keeping first-seen order
pub fn parse_metrics<S: AsRef<str>>(names: &[S]) -> Result<Vec<Metric>> {
    if names.is_empty() {
        return Err(Error::input("At least one metric is required"));
    }
    let mut metrics = Vec::with_capacity(names.len());
    for name in names {
        let metric: Metric = name.as_ref().parse()?;
        if !metrics.contains(&metric) {
            metrics.push(metric);
        }
    }
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_metrics() {
        let metrics = parse_metrics(&["coherence", "F1Score", "qa", "coherence"]).unwrap();
        assert_eq!(metrics, vec![Metric::Coherence, Metric::F1Score, Metric::Qa]);
    }

    #[test]
    fn test_latency_not_implemented() {
        let err = "latency".parse::<Metric>().unwrap_err();
        assert!(err.to_string().contains("not implemented"));
    }

    #[test]
    fn test_unknown_metric() {
        let err = parse_metrics(&["chat"]).unwrap_err();
        assert!(matches!(err, Error::Input(ref m) if m.contains("Unknown metric: chat")));
        assert!(parse_metrics::<&str>(&[]).is_err());
    }

    #[test]
    fn test_required_fields() {
        assert!(Metric::Similarity.needs_ground_truth());
        assert!(Metric::Qa.needs_ground_truth());
        assert!(!Metric::Groundedness.needs_ground_truth());
        assert_eq!(Metric::F1Score.scale_max(), 1.0);
        assert_eq!(Metric::Relevance.judge_template(), Some(PromptTemplate::Relevance));
    }
}
