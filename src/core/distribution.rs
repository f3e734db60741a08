//! Distribution engine: tutor-action frequencies, overall and per student action
//!
//! The denominator is the number of (response, label) activations, not the
//! number of responses: a response tagged {question, hint} counts twice.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::types::{
    ActionLabel, ActionsPerResponse, ConditionalDistribution, Distribution, Exchange,
    ResponseEntry, StudentAction, TutorAction,
};

/// Distribution engine
#[derive(Debug, Default)]
pub struct DistributionEngine;

impl DistributionEngine {
    /// Create new engine
    pub fn new() -> Self {
        Self
    }

    /// Activation count per tutor label (every label present, zeros included)
    pub fn counts<E: Exchange>(&self, exchanges: &[E]) -> BTreeMap<TutorAction, u64> {
        count_activations(exchanges.iter())
    }

    /// Tutor-action distribution over every response of every exchange
    pub fn unconditional<E: Exchange>(&self, exchanges: &[E]) -> Distribution {
        Distribution::from_counts(&self.counts(exchanges))
    }

    /// Tutor-action distribution restricted to exchanges showing each student action.
    ///
    /// Student actions with no matching exchange, or whose exchanges carry no
    /// tutor labels at all, get no entry.
    pub fn conditional<E: Exchange>(&self, exchanges: &[E]) -> ConditionalDistribution {
        let mut result = ConditionalDistribution::new();

        for student_action in StudentAction::ALL {
            let matching = exchanges
                .iter()
                .filter(|ex| ex.student_actions().contains(student_action));
            let dist = Distribution::from_counts(&count_activations(matching));

            if dist.is_empty() {
                debug!(student_action = student_action.name(), "no tutor activations, omitted");
                continue;
            }
            result.insert(*student_action, dist);
        }

        result
    }

    /// Relative frequency of the number of labels per tutor response
    pub fn actions_per_response<E: Exchange>(&self, exchanges: &[E]) -> ActionsPerResponse {
        let sizes = exchanges
            .iter()
            .flat_map(|ex| ex.tutor_responses())
            .map(|resp| resp.actions.len());
        histogram(sizes)
    }

    /// Tutor-action distribution over a response file (model output or export).
    ///
    /// Names outside the tutor vocabulary are logged and not counted.
    pub fn file_distribution(&self, entries: &BTreeMap<String, ResponseEntry>) -> Distribution {
        let mut counts: BTreeMap<TutorAction, u64> =
            TutorAction::ALL.iter().map(|label| (*label, 0)).collect();

        for (id, entry) in entries {
            for resp in entry.responses() {
                for unknown in resp.unknown_actions() {
                    warn!(id = id.as_str(), action = unknown, "unknown action label in response file");
                }
                for label in resp.tutor_actions() {
                    *counts.entry(label).or_insert(0) += 1;
                }
            }
        }

        Distribution::from_counts(&counts)
    }

    /// Labels-per-response histogram over a response file
    pub fn file_actions_per_response(
        &self,
        entries: &BTreeMap<String, ResponseEntry>,
    ) -> ActionsPerResponse {
        let sizes = entries
            .values()
            .flat_map(|entry| entry.responses())
            .map(|resp| resp.actions.len());
        histogram(sizes)
    }
}

fn count_activations<'a, E, I>(exchanges: I) -> BTreeMap<TutorAction, u64>
where
    E: Exchange + 'a,
    I: Iterator<Item = &'a E>,
{
    let mut counts: BTreeMap<TutorAction, u64> =
        TutorAction::ALL.iter().map(|label| (*label, 0)).collect();

    for ex in exchanges {
        for resp in ex.tutor_responses() {
            for label in &resp.actions {
                *counts.entry(*label).or_insert(0) += 1;
            }
        }
    }

    counts
}

fn histogram(values: impl Iterator<Item = usize>) -> ActionsPerResponse {
    let mut counts: BTreeMap<usize, u64> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }

    let total: u64 = counts.values().sum();
    if total == 0 {
        return ActionsPerResponse::new();
    }
    counts
        .into_iter()
        .map(|(size, count)| (size, count as f64 / total as f64))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CachedResponse, Conversation, ConversationContext, TutorResponse};

    fn make_conv(
        student: &[StudentAction],
        responses: Vec<Vec<TutorAction>>,
    ) -> Conversation {
        Conversation {
            id: "0".to_string(),
            student_actions: student.iter().copied().collect(),
            tutor_responses: responses
                .into_iter()
                .map(|actions| TutorResponse::new("risposta", actions))
                .collect(),
            context: ConversationContext::default(),
        }
    }

    #[test]
    fn test_unconditional_counts_activations() {
        let engine = DistributionEngine::new();
        let convs = vec![make_conv(
            &[StudentAction::Guess],
            vec![
                vec![TutorAction::Question, TutorAction::Hint],
                vec![TutorAction::Question],
            ],
        )];

        let dist = engine.unconditional(&convs);
        // 3 activations over 2 responses
        assert!((dist.get(TutorAction::Question) - 2.0 / 3.0).abs() < 1e-9);
        assert!((dist.get(TutorAction::Hint) - 1.0 / 3.0).abs() < 1e-9);
        assert!((dist.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unconditional_empty_when_no_activations() {
        let engine = DistributionEngine::new();
        let convs = vec![make_conv(&[StudentAction::Guess], vec![vec![], vec![]])];
        assert!(engine.unconditional(&convs).is_empty());

        let none: Vec<Conversation> = Vec::new();
        assert!(engine.unconditional(&none).is_empty());
    }

    #[test]
    fn test_conditional_omits_absent_student_actions() {
        let engine = DistributionEngine::new();
        let convs = vec![
            make_conv(&[StudentAction::Guess], vec![vec![TutorAction::Correction]]),
            make_conv(
                &[StudentAction::Guess, StudentAction::Question],
                vec![vec![TutorAction::Hint]],
            ),
        ];

        let cond = engine.conditional(&convs);
        assert!(!cond.contains_key(&StudentAction::Affirmation));
        assert!(!cond.contains_key(&StudentAction::Other));

        let guess = &cond[&StudentAction::Guess];
        assert!((guess.get(TutorAction::Correction) - 0.5).abs() < 1e-9);
        assert!((guess.get(TutorAction::Hint) - 0.5).abs() < 1e-9);

        let question = &cond[&StudentAction::Question];
        assert!((question.get(TutorAction::Hint) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_conditional_omits_students_without_tutor_labels() {
        let engine = DistributionEngine::new();
        let convs = vec![make_conv(&[StudentAction::Other], vec![vec![]])];
        assert!(engine.conditional(&convs).is_empty());
    }

    #[test]
    fn test_actions_per_response() {
        let engine = DistributionEngine::new();
        let convs = vec![make_conv(
            &[],
            vec![
                vec![TutorAction::Question],
                vec![TutorAction::Question, TutorAction::Hint],
                vec![TutorAction::Hint],
                vec![],
            ],
        )];

        let hist = engine.actions_per_response(&convs);
        assert!((hist[&0] - 0.25).abs() < 1e-9);
        assert!((hist[&1] - 0.5).abs() < 1e-9);
        assert!((hist[&2] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_file_distribution_ignores_unknown_labels() {
        let engine = DistributionEngine::new();
        let entries: BTreeMap<String, ResponseEntry> = [
            (
                "0".to_string(),
                ResponseEntry::Single(CachedResponse {
                    response: "Bravo!".to_string(),
                    actions: vec!["confirmation".to_string(), "praise".to_string()],
                }),
            ),
            (
                "1".to_string(),
                ResponseEntry::Ensemble(vec![CachedResponse {
                    response: "Dove?".to_string(),
                    actions: vec!["Question".to_string()],
                }]),
            ),
        ]
        .into();

        let dist = engine.file_distribution(&entries);
        assert!((dist.get(TutorAction::Confirmation) - 0.5).abs() < 1e-9);
        assert!((dist.get(TutorAction::Question) - 0.5).abs() < 1e-9);

        let hist = engine.file_actions_per_response(&entries);
        assert!((hist[&1] - 0.5).abs() < 1e-9);
        assert!((hist[&2] - 0.5).abs() < 1e-9);
    }
}
