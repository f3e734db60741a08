//! Record normalizer: raw dataset records → Conversation / Turn
//!
//! Action flags arrive either as JSON booleans or as "true"/"false" strings
//! (any case) depending on the dataset revision. Both decode the same way
//! here so nothing downstream ever sees the raw encoding.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::core::GrammarRuleParser;
use crate::error::{Error, Result};
use crate::types::{
    decode_flags, ActionLabel, Conversation, ConversationContext, StudentAction, TargetPhrase,
    Turn, TutorAction, TutorResponse,
};
use crate::DATASET_ENVELOPE_KEY;

// =============================================================================
// RAW FIELD NAMES [C]
// =============================================================================

pub const FIELD_HISTORY: &str = "past_convo";
pub const FIELD_GRAMMAR: &str = "grammarRules";
pub const FIELD_STUDENT_ACTIONS: &str = "studentActions";
pub const FIELD_TUTOR_RESPONSES: &str = "tutorResponses";
pub const FIELD_TUTOR_ACTIONS: &str = "tutorActions";
pub const FIELD_IMAGE: &str = "img";

/// Fields every record must carry
pub const REQUIRED_FIELDS: &[&str] = &[
    FIELD_HISTORY,
    "prep",
    "obj",
    "color",
    "engPrep",
    "engObj",
    "engColor",
    FIELD_GRAMMAR,
    FIELD_STUDENT_ACTIONS,
    FIELD_TUTOR_RESPONSES,
    FIELD_TUTOR_ACTIONS,
];

/// A component of the target phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhraseComponent {
    Preposition,
    Object,
    Color,
}

impl PhraseComponent {
    /// Field holding the source-language text
    pub fn source_field(&self) -> &'static str {
        match self {
            Self::Preposition => "prep",
            Self::Object => "obj",
            Self::Color => "color",
        }
    }

    /// Field holding the target-language text
    pub fn target_field(&self) -> &'static str {
        match self {
            Self::Preposition => "engPrep",
            Self::Object => "engObj",
            Self::Color => "engColor",
        }
    }
}

/// Normalizer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Order in which components are joined into the target phrase
    pub phrase_order: Vec<PhraseComponent>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            phrase_order: vec![
                PhraseComponent::Preposition,
                PhraseComponent::Object,
                PhraseComponent::Color,
            ],
        }
    }
}

/// A record that could not be normalized
#[derive(Debug)]
pub struct RecordFailure {
    pub id: String,
    pub error: Error,
}

/// Outcome of normalizing a whole dataset
#[derive(Debug, Default)]
pub struct DatasetNormalization {
    /// Successfully normalized records, in dataset-id order
    pub conversations: Vec<Conversation>,
    pub failures: Vec<RecordFailure>,
}

impl DatasetNormalization {
    /// Turn view of every conversation
    pub fn turns(&self) -> Vec<Turn> {
        self.conversations.iter().flat_map(Conversation::turns).collect()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Raw record → normalized conversation
#[derive(Debug, Default)]
pub struct RecordNormalizer {
    config: NormalizerConfig,
    grammar: GrammarRuleParser,
}

impl RecordNormalizer {
    /// Create normalizer with the dataset's default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create normalizer with custom settings
    pub fn with_config(config: NormalizerConfig) -> Self {
        Self {
            config,
            grammar: GrammarRuleParser::new(),
        }
    }

    /// Normalize one record
    pub fn normalize(&self, id: &str, record: &Value) -> Result<Conversation> {
        let fields = record
            .as_object()
            .ok_or_else(|| Error::malformed(id, "record is not an object"))?;

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|name| !fields.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(Error::malformed(
                id,
                format!("missing fields: {}", missing.join(", ")),
            ));
        }

        let target_phrase = TargetPhrase {
            source: self.join_phrase(id, fields, PhraseComponent::source_field)?,
            target: self.join_phrase(id, fields, PhraseComponent::target_field)?,
        };

        let grammar_rules = self
            .grammar
            .parse(text_field(id, fields, FIELD_GRAMMAR)?)
            .into_rules();

        let conversation_history = string_array(id, fields, FIELD_HISTORY)?;

        let image_path = match fields.get(FIELD_IMAGE) {
            None | Some(Value::Null) => None,
            Some(Value::String(path)) => Some(path.clone()),
            Some(_) => return Err(Error::malformed(id, format!("{} is not a string", FIELD_IMAGE))),
        };

        let student_actions: BTreeSet<StudentAction> =
            decode_actions(id, FIELD_STUDENT_ACTIONS, &fields[FIELD_STUDENT_ACTIONS])?;

        let texts = string_array(id, fields, FIELD_TUTOR_RESPONSES)?;
        let action_rows = fields[FIELD_TUTOR_ACTIONS]
            .as_array()
            .ok_or_else(|| Error::malformed(id, format!("{} is not an array", FIELD_TUTOR_ACTIONS)))?;

        if texts.is_empty() {
            return Err(Error::malformed(id, "no tutor responses"));
        }
        if texts.len() != action_rows.len() {
            return Err(Error::malformed(
                id,
                format!(
                    "{} tutor responses but {} action rows",
                    texts.len(),
                    action_rows.len()
                ),
            ));
        }

        let tutor_responses = texts
            .into_iter()
            .zip(action_rows)
            .map(|(text, row)| {
                let actions: BTreeSet<TutorAction> = decode_actions(id, FIELD_TUTOR_ACTIONS, row)?;
                Ok(TutorResponse { text, actions })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(id, responses = tutor_responses.len(), "normalized record");

        Ok(Conversation {
            id: id.to_string(),
            student_actions,
            tutor_responses,
            context: ConversationContext {
                target_phrase,
                grammar_rules,
                conversation_history,
                image_path,
            },
        })
    }

    /// Normalize one record and segment it into turns
    pub fn normalize_turns(&self, id: &str, record: &Value) -> Result<Vec<Turn>> {
        Ok(self.normalize(id, record)?.turns())
    }

    /// Normalize every record of a dataset.
    ///
    /// Accepts the flat `{id: record}` object or the `{"prepDataset": {...}}`
    /// envelope. Failing records are collected, never fatal.
    pub fn normalize_dataset(&self, data: &Value) -> Result<DatasetNormalization> {
        let records = unwrap_envelope(data)
            .as_object()
            .ok_or_else(|| Error::Config("dataset is not a JSON object".to_string()))?;

        let mut ids: Vec<&String> = records.keys().collect();
        ids.sort_by_key(|id| dataset_order(id));

        let mut out = DatasetNormalization::default();
        for id in ids {
            match self.normalize(id, &records[id.as_str()]) {
                Ok(conv) => out.conversations.push(conv),
                Err(error) => {
                    warn!(id = id.as_str(), %error, "skipping record");
                    out.failures.push(RecordFailure {
                        id: id.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            normalized = out.conversations.len(),
            failed = out.failures.len(),
            "dataset normalized"
        );
        Ok(out)
    }

    fn join_phrase(
        &self,
        id: &str,
        fields: &Map<String, Value>,
        field_of: fn(&PhraseComponent) -> &'static str,
    ) -> Result<String> {
        let parts = self
            .config
            .phrase_order
            .iter()
            .map(|component| text_field(id, fields, field_of(component)))
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(" "))
    }
}

/// Decode one flag: JSON boolean or "true"/"false" in any case
pub fn decode_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                Some(true)
            } else if s.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Decode a positional flag array into labels of vocabulary `A`
fn decode_actions<A: ActionLabel>(id: &str, field: &str, value: &Value) -> Result<BTreeSet<A>> {
    let raw = value
        .as_array()
        .ok_or_else(|| Error::malformed(id, format!("{} is not an array", field)))?;

    let flags = raw
        .iter()
        .map(|v| {
            decode_flag(v)
                .ok_or_else(|| Error::malformed(id, format!("{} holds a non-boolean flag: {}", field, v)))
        })
        .collect::<Result<Vec<bool>>>()?;

    decode_flags(&flags).ok_or_else(|| {
        Error::malformed(
            id,
            format!("{} has {} flags, expected {}", field, flags.len(), A::ALL.len()),
        )
    })
}

fn text_field<'a>(id: &str, fields: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::malformed(id, format!("{} is not a string", name)))
}

fn string_array(id: &str, fields: &Map<String, Value>, name: &str) -> Result<Vec<String>> {
    let items = fields
        .get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::malformed(id, format!("{} is not an array", name)))?;

    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(String::from)
                .ok_or_else(|| Error::malformed(id, format!("{} holds a non-string item", name)))
        })
        .collect()
}

fn unwrap_envelope(data: &Value) -> &Value {
    data.get(DATASET_ENVELOPE_KEY).unwrap_or(data)
}

/// Numeric ids ascending, then the rest lexically
fn dataset_order(id: &str) -> (bool, u64, String) {
    match id.parse::<u64>() {
        Ok(n) => (false, n, String::new()),
        Err(_) => (true, 0, id.to_string()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
