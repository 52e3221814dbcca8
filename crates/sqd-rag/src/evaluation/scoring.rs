//! Local scoring helpers: token F1 and judge-output parsing

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::{Error, Result, Stage, UpstreamKind};

static PUNCTUATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[[:punct:]]").unwrap());
static ARTICLES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(a|an|the)\b").unwrap());
static RATING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([1-5])\b").unwrap());

/// Lower-case, strip punctuation and articles, collapse whitespace
pub fn normalize_answer(text: &str) -> String {
    let lower = text.to_lowercase();
    let no_punct = PUNCTUATION_RE.replace_all(&lower, " ");
    let no_articles = ARTICLES_RE.replace_all(&no_punct, " ");
    no_articles.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Token-overlap F1 between an answer and the ground truth, in `[0, 1]`
pub fn f1_score(answer: &str, ground_truth: &str) -> f64 {
    let answer = normalize_answer(answer);
    let truth = normalize_answer(ground_truth);
    let answer_tokens: Vec<&str> = answer.split_whitespace().collect();
    let truth_tokens: Vec<&str> = truth.split_whitespace().collect();

    if answer_tokens.is_empty() || truth_tokens.is_empty() {
        return if answer_tokens.is_empty() && truth_tokens.is_empty() {
            1.0
        } else {
            0.0
        };
    }

    let mut truth_counts: HashMap<&str, usize> = HashMap::new();
    for token in &truth_tokens {
        *truth_counts.entry(token).or_default() += 1;
    }

    let mut common = 0usize;
    for token in &answer_tokens {
        if let Some(count) = truth_counts.get_mut(token) {
            if *count > 0 {
                *count -= 1;
                common += 1;
            }
        }
    }

    if common == 0 {
        return 0.0;
    }
    let precision = common as f64 / answer_tokens.len() as f64;
    let recall = common as f64 / truth_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Read the first 1-5 rating in a judge's reply
pub fn parse_judge_score(output: &str) -> Result<f64> {
    RATING_RE
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .map(f64::from)
        .ok_or_else(|| {
            Error::upstream(
                Stage::Completion,
                UpstreamKind::MalformedResponse,
                format!("Judge returned no 1-5 rating: {:?}", output),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_answer("The CEO is  Jane Doe!"), "ceo is jane doe");
    }

    #[test]
    fn test_f1_exact_and_disjoint() {
        assert_eq!(f1_score("Jane Doe", "jane doe."), 1.0);
        assert_eq!(f1_score("John Smith", "Jane Doe"), 0.0);
        assert_eq!(f1_score("", ""), 1.0);
    }

    #[test]
    fn test_f1_partial() {
        // precision 2/4, recall 2/2
        let score = f1_score("Jane Doe since 2019", "Jane Doe");
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_judge_score() {
        assert_eq!(parse_judge_score("4").unwrap(), 4.0);
        assert_eq!(parse_judge_score("Score: 5\n").unwrap(), 5.0);
        let err = parse_judge_score("excellent").unwrap_err();
        assert_eq!(err.upstream_kind(), Some(UpstreamKind::MalformedResponse));
        assert!(parse_judge_score("10").is_err());
    }
}
