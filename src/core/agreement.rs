//! Agreement engine: how consistently parallel tutor responses are labelled
//!
//! Two notions are reported side by side:
//! - per-label: a pair agrees on a label when both mark it present or both absent
//! - exact-match (overall): a pair agrees only when the full label sets are equal

use std::collections::BTreeMap;

use tracing::debug;

use crate::core::chi_square::chi_square_test;
use crate::core::DistributionEngine;
use crate::error::{Error, Result};
use crate::types::{
    ActionLabel, AgreementReport, ChiSquareResult, Distribution, Exchange, SourceComparison,
    TutorAction,
};

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    agree: u64,
    total: u64,
}

impl Tally {
    fn record(&mut self, agreed: bool) {
        if agreed {
            self.agree += 1;
        }
        self.total += 1;
    }

    fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.agree as f64 / self.total as f64
        }
    }
}

/// Agreement and comparison engine
#[derive(Debug, Default)]
pub struct AgreementEngine {
    distributions: DistributionEngine,
}

impl AgreementEngine {
    /// Create new engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairwise agreement across each exchange's tutor responses
    pub fn agreement<E: Exchange>(&self, exchanges: &[E]) -> AgreementReport {
        let mut overall = Tally::default();
        let mut per_action: BTreeMap<TutorAction, Tally> =
            TutorAction::ALL.iter().map(|label| (*label, Tally::default())).collect();

        for ex in exchanges {
            let responses = ex.tutor_responses();
            for i in 0..responses.len() {
                for j in (i + 1)..responses.len() {
                    let (a, b) = (&responses[i], &responses[j]);

                    for (label, tally) in per_action.iter_mut() {
                        tally.record(a.has(*label) == b.has(*label));
                    }
                    overall.record(a.actions == b.actions);
                }
            }
        }

        debug!(pairs = overall.total, "agreement computed");

        AgreementReport {
            overall_agreement: overall.rate(),
            per_action_agreement: per_action
                .into_iter()
                .map(|(label, tally)| (label, tally.rate()))
                .collect(),
            pair_count: overall.total,
        }
    }

    /// Chi-square test of `observed` against `expected` (probabilities × sample size).
    ///
    /// Both distributions must cover the same labels; an empty distribution
    /// against a non-empty one is a mismatch.
    pub fn chi_square_compare(
        &self,
        observed: &Distribution,
        expected: &Distribution,
        n_observed: usize,
        n_expected: usize,
    ) -> Result<ChiSquareResult> {
        let labels = observed.labels();
        if labels != expected.labels() {
            return Err(Error::LabelMismatch(format!(
                "observed labels {:?} vs expected labels {:?}",
                labels,
                expected.labels()
            )));
        }

        let observed_counts: Vec<f64> = labels
            .iter()
            .map(|label| observed.get(*label) * n_observed as f64)
            .collect();
        let expected_counts: Vec<f64> = labels
            .iter()
            .map(|label| expected.get(*label) * n_expected as f64)
            .collect();

        Ok(chi_square_test(&observed_counts, &expected_counts))
    }

    /// Compare model output against human annotations.
    ///
    /// Sample sizes are the number of exchanges on each side; the model side
    /// is the observed one.
    pub fn compare_sources<H: Exchange, M: Exchange>(
        &self,
        human: &[H],
        model: &[M],
    ) -> Result<SourceComparison> {
        let human_distribution = self.distributions.unconditional(human);
        let model_distribution = self.distributions.unconditional(model);

        let chi_square = self.chi_square_compare(
            &model_distribution,
            &human_distribution,
            model.len(),
            human.len(),
        )?;

        Ok(SourceComparison {
            human_distribution,
            model_distribution,
            human_n: human.len(),
            model_n: model.len(),
            chi_square,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
