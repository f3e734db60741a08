//! Normalized conversation model
//!
//! - Conversation = one dataset entry (canonical shape)
//! - Turn = one (tutor prompt, student response) pair cut from its history
//! - Both expose the annotated exchange the engines consume

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{StudentAction, TutorAction};

/// One tutor's response to a turn and its action labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorResponse {
    /// The tutor's utterance
    pub text: String,
    /// Labels from the tutor vocabulary (may be empty)
    pub actions: BTreeSet<TutorAction>,
}

impl TutorResponse {
    /// Create a new response
    pub fn new(text: impl Into<String>, actions: impl IntoIterator<Item = TutorAction>) -> Self {
        Self {
            text: text.into(),
            actions: actions.into_iter().collect(),
        }
    }

    /// Whether the response carries `action`
    pub fn has(&self, action: TutorAction) -> bool {
        self.actions.contains(&action)
    }
}

/// Phrase being taught, in the source and target language
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPhrase {
    pub source: String,
    pub target: String,
}

/// Per-conversation teaching context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub target_phrase: TargetPhrase,
    /// Rule identifiers, explanations dropped
    pub grammar_rules: Vec<String>,
    /// Prior utterances, alternating tutor/student
    pub conversation_history: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

/// Annotated exchange: what the student did and how the tutors responded
pub trait Exchange {
    fn student_actions(&self) -> &BTreeSet<StudentAction>;
    fn tutor_responses(&self) -> &[TutorResponse];
}

/// One normalized dataset entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Dataset key of the entry
    pub id: String,
    pub student_actions: BTreeSet<StudentAction>,
    /// Parallel annotations of the same turn
    pub tutor_responses: Vec<TutorResponse>,
    pub context: ConversationContext,
}

impl Conversation {
    /// Segment the history into consecutive (tutor prompt, student response) turns.
    ///
    /// Steps by two; an unpaired final utterance is dropped.
    pub fn turns(&self) -> Vec<Turn> {
        self.context
            .conversation_history
            .chunks_exact(2)
            .enumerate()
            .map(|(index, pair)| Turn {
                conversation_id: self.id.clone(),
                index,
                tutor_prompt: pair[0].clone(),
                student_response: pair[1].clone(),
                student_actions: self.student_actions.clone(),
                tutor_responses: self.tutor_responses.clone(),
                context: self.context.clone(),
            })
            .collect()
    }
}

impl Exchange for Conversation {
    fn student_actions(&self) -> &BTreeSet<StudentAction> {
        &self.student_actions
    }

    fn tutor_responses(&self) -> &[TutorResponse] {
        &self.tutor_responses
    }
}

/// One tutor-prompt/student-response pair of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub conversation_id: String,
    /// Position of the pair within the history (0-based)
    pub index: usize,
    pub tutor_prompt: String,
    pub student_response: String,
    /// Shared with every turn of the conversation
    pub student_actions: BTreeSet<StudentAction>,
    pub tutor_responses: Vec<TutorResponse>,
    pub context: ConversationContext,
}

impl Exchange for Turn {
    fn student_actions(&self) -> &BTreeSet<StudentAction> {
        &self.student_actions
    }

    fn tutor_responses(&self) -> &[TutorResponse] {
        &self.tutor_responses
    }
}

// =============================================================================
// TESTS
// =============================================================================
