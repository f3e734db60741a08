//! Action vocabularies for tutor and student utterances
//!
//! Raw records carry actions as positional boolean arrays with no label names.
//! The declaration order of each enum is the positional order, and `ALL` is the
//! single table every encoder/decoder goes through.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// A closed, ordered action vocabulary
pub trait ActionLabel: Copy + Ord + Eq + Hash + Debug + 'static {
    /// Every label, in positional-array order
    const ALL: &'static [Self];

    /// Lowercase vocabulary name
    fn name(&self) -> &'static str;

    /// Look up a label by name (case-insensitive, surrounding whitespace ignored)
    fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.name().eq_ignore_ascii_case(name))
    }

    /// Index of this label inside the positional array
    fn position(&self) -> usize {
        Self::ALL
            .iter()
            .position(|label| label == self)
            .unwrap_or(Self::ALL.len())
    }
}

/// Pedagogical function of a tutor utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TutorAction {
    /// Ask the student to clarify or elaborate
    Question,
    /// Indirect guidance
    Hint,
    /// Point out and fix an error
    Correction,
    /// Acknowledge a correct answer
    Confirmation,
    /// Anything else
    Other,
}

impl ActionLabel for TutorAction {
    const ALL: &'static [Self] = &[
        Self::Question,
        Self::Hint,
        Self::Correction,
        Self::Confirmation,
        Self::Other,
    ];

    fn name(&self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Hint => "hint",
            Self::Correction => "correction",
            Self::Confirmation => "confirmation",
            Self::Other => "other",
        }
    }
}

/// Function of a student utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentAction {
    Guess,
    Question,
    Affirmation,
    Other,
}

impl ActionLabel for StudentAction {
    const ALL: &'static [Self] = &[Self::Guess, Self::Question, Self::Affirmation, Self::Other];

    fn name(&self) -> &'static str {
        match self {
            Self::Guess => "guess",
            Self::Question => "question",
            Self::Affirmation => "affirmation",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for TutorAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::fmt::Display for StudentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decode a positional flag array into a label set.
///
/// Returns `None` when the array length differs from the vocabulary size.
pub fn decode_flags<A: ActionLabel>(flags: &[bool]) -> Option<BTreeSet<A>> {
    if flags.len() != A::ALL.len() {
        return None;
    }
    Some(
        A::ALL
            .iter()
            .zip(flags)
            .filter(|(_, active)| **active)
            .map(|(label, _)| *label)
            .collect(),
    )
}

/// Encode a label set back into its positional flag array
pub fn encode_flags<A: ActionLabel>(labels: &BTreeSet<A>) -> Vec<bool> {
    A::ALL.iter().map(|label| labels.contains(label)).collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{STUDENT_VOCABULARY_LEN, TUTOR_VOCABULARY_LEN};

    #[test]
    fn test_vocabulary_sizes() {
        assert_eq!(TutorAction::ALL.len(), TUTOR_VOCABULARY_LEN);
        assert_eq!(StudentAction::ALL.len(), STUDENT_VOCABULARY_LEN);
    }

    #[test]
    fn test_positions_follow_declaration_order() {
        for (i, label) in TutorAction::ALL.iter().enumerate() {
            assert_eq!(label.position(), i);
        }
        assert_eq!(StudentAction::Affirmation.position(), 2);
    }

    #[test]
    fn test_from_name_case_insensitive() {
        assert_eq!(TutorAction::from_name("Hint"), Some(TutorAction::Hint));
        assert_eq!(TutorAction::from_name(" CONFIRMATION "), Some(TutorAction::Confirmation));
        assert_eq!(StudentAction::from_name("guess"), Some(StudentAction::Guess));
        assert_eq!(TutorAction::from_name("guess"), None);
    }

    #[test]
    fn test_decode_flags() {
        let set: BTreeSet<StudentAction> = decode_flags(&[true, false, true, false]).unwrap();
        let expected: BTreeSet<_> = [StudentAction::Guess, StudentAction::Affirmation].into();
        assert_eq!(set, expected);
    }

    #[test]
    fn test_decode_flags_wrong_length() {
        assert!(decode_flags::<TutorAction>(&[true, false]).is_none());
        assert!(decode_flags::<StudentAction>(&[false; 5]).is_none());
    }

    #[test]
    fn test_encode_inverts_decode() {
        let flags = vec![false, true, true, false, false];
        let set: BTreeSet<TutorAction> = decode_flags(&flags).unwrap();
        assert_eq!(encode_flags(&set), flags);
    }

    #[test]
    fn test_serde_uses_vocabulary_names() {
        let json = serde_json::to_string(&TutorAction::Confirmation).unwrap();
        assert_eq!(json, "\"confirmation\"");
        let back: StudentAction = serde_json::from_str("\"affirmation\"").unwrap();
        assert_eq!(back, StudentAction::Affirmation);
    }
}
