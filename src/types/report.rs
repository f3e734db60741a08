//! Aggregate outputs handed to rendering and JSON export

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ActionLabel, StudentAction, TutorAction};

/// Tutor-action probabilities.
///
/// Either empty (no activations) or one entry per tutor label summing to 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distribution(BTreeMap<TutorAction, f64>);

impl Distribution {
    /// Normalize activation counts; zero total gives an empty distribution
    pub fn from_counts(counts: &BTreeMap<TutorAction, u64>) -> Self {
        let total: u64 = counts.values().sum();
        if total == 0 {
            return Self::default();
        }
        Self(
            TutorAction::ALL
                .iter()
                .map(|label| {
                    let count = counts.get(label).copied().unwrap_or(0);
                    (*label, count as f64 / total as f64)
                })
                .collect(),
        )
    }

    /// Probability of `label` (0.0 when absent)
    pub fn get(&self, label: TutorAction) -> f64 {
        self.0.get(&label).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Sum of all probabilities
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Entries in canonical label order
    pub fn iter(&self) -> impl Iterator<Item = (TutorAction, f64)> + '_ {
        self.0.iter().map(|(label, p)| (*label, *p))
    }

    /// Labels present, in canonical order
    pub fn labels(&self) -> Vec<TutorAction> {
        self.0.keys().copied().collect()
    }
}

/// Tutor-action distribution per student action present
pub type ConditionalDistribution = BTreeMap<StudentAction, Distribution>;

/// Relative frequency of "number of labels on a response"
pub type ActionsPerResponse = BTreeMap<usize, f64>;

/// Inter-annotator agreement across parallel tutor responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementReport {
    /// Share of response pairs whose full label sets are identical
    pub overall_agreement: f64,
    /// Per label: share of response pairs agreeing on presence/absence
    pub per_action_agreement: BTreeMap<TutorAction, f64>,
    /// Unordered response pairs compared
    pub pair_count: u64,
}

/// Chi-square goodness-of-fit result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareResult {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: usize,
}

/// Human vs. model action distributions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceComparison {
    pub human_distribution: Distribution,
    pub model_distribution: Distribution,
    /// Exchanges behind each distribution
    pub human_n: usize,
    pub model_n: usize,
    pub chi_square: ChiSquareResult,
}

/// Provenance attached to every exported report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub generated_at: DateTime<Utc>,
    /// SHA-256 of the dataset file, hex
    pub dataset_digest: String,
    pub conversations: usize,
    pub failed_records: usize,
}

/// A result plus its provenance
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport<T: Serialize> {
    pub meta: ReportMeta,
    pub result: T,
}

// =============================================================================
// TESTS
// =============================================================================
