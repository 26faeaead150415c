//! Held-out classification metrics

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of held-out rows whose true label is this class
    pub support: usize,
}

/// Accuracy and per-class metrics on the held-out split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
    pub n_samples: usize,
}

/// Compare predictions with ground truth
///
/// Classes with no predicted rows get precision 0; classes with no true
/// rows get recall 0.
pub fn evaluate(y_true: &[String], y_pred: &[String]) -> EvaluationReport {
    let labels: BTreeSet<&String> = y_true.iter().chain(y_pred.iter()).collect();
    let n_samples = y_true.len();

    let per_class: Vec<ClassMetrics> = labels
        .into_iter()
        .map(|label| {
            let mut tp = 0usize;
            let mut fp = 0usize;
            let mut fn_ = 0usize;
            for (truth, pred) in y_true.iter().zip(y_pred) {
                match (truth == label, pred == label) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    (false, false) => {}
                }
            }
            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_);
            ClassMetrics {
                label: label.clone(),
                precision,
                recall,
                f1: f1(precision, recall),
                support: tp + fn_,
            }
        })
        .collect();

    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    let accuracy = ratio(correct, n_samples);

    EvaluationReport {
        accuracy,
        macro_avg: average(&per_class, "macro avg", |_| 1.0),
        weighted_avg: average(&per_class, "weighted avg", |m| m.support as f64),
        per_class,
        n_samples,
    }
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn average(per_class: &[ClassMetrics], label: &str, weight: impl Fn(&ClassMetrics) -> f64) -> ClassMetrics {
    let total: f64 = per_class.iter().map(&weight).sum();
    let weighted = |field: fn(&ClassMetrics) -> f64| {
        if total == 0.0 {
            0.0
        } else {
            per_class.iter().map(|m| field(m) * weight(m)).sum::<f64>() / total
        }
    };
    ClassMetrics {
        label: label.to_string(),
        precision: weighted(|m| m.precision),
        recall: weighted(|m| m.recall),
        f1: weighted(|m| m.f1),
        support: per_class.iter().map(|m| m.support).sum(),
    }
}

impl EvaluationReport {
    pub fn class(&self, label: &str) -> Option<&ClassMetrics> {
        self.per_class.iter().find(|m| m.label == label)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .per_class
            .iter()
            .map(|m| m.label.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(0);

        writeln!(f, "Model Accuracy: {:.2}", self.accuracy)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for m in &self.per_class {
            write_row(f, m, width)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.n_samples
        )?;
        write_row(f, &self.macro_avg, width)?;
        write_row(f, &self.weighted_avg, width)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, m: &ClassMetrics, width: usize) -> fmt::Result {
    writeln!(
        f,
        "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        m.label, m.precision, m.recall, m.f1, m.support
    )
}
