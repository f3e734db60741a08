//! Model-generated tutor responses and their cache representation

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{ActionLabel, TutorAction, TutorResponse};
use crate::SENTINEL_RESPONSE_PREFIX;

/// Decoded result of one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub response: String,
    pub actions: BTreeSet<TutorAction>,
    pub reason: GenerationReason,
}

impl GenerationOutcome {
    /// Create a decoded outcome
    pub fn decoded(response: impl Into<String>, actions: BTreeSet<TutorAction>) -> Self {
        Self {
            response: response.into(),
            actions,
            reason: GenerationReason::M001_RESPONSE_DECODED,
        }
    }

    /// Create the placeholder outcome for an undecodable payload.
    ///
    /// Text names the failure and the label set is `{other}` so the entry is
    /// counted but easy to find when auditing.
    pub fn sentinel(reason: GenerationReason, detail: impl std::fmt::Display) -> Self {
        Self {
            response: format!("{}: {}", SENTINEL_RESPONSE_PREFIX, detail),
            actions: [TutorAction::Other].into(),
            reason,
        }
    }

    /// Is this a placeholder?
    pub fn is_sentinel(&self) -> bool {
        self.reason.is_sentinel()
    }
}

/// One cache-file entry: `{response, actions}` with label names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub response: String,
    pub actions: Vec<String>,
}

impl CachedResponse {
    /// Labels that belong to the tutor vocabulary; unknown names are dropped
    pub fn tutor_actions(&self) -> BTreeSet<TutorAction> {
        self.actions
            .iter()
            .filter_map(|name| TutorAction::from_name(name))
            .collect()
    }

    /// Names outside the tutor vocabulary
    pub fn unknown_actions(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter(|name| TutorAction::from_name(name).is_none())
            .map(String::as_str)
            .collect()
    }

    /// Is this the placeholder written for an undecodable payload?
    pub fn is_sentinel(&self) -> bool {
        self.response.starts_with(SENTINEL_RESPONSE_PREFIX)
    }
}

impl From<&GenerationOutcome> for CachedResponse {
    fn from(outcome: &GenerationOutcome) -> Self {
        Self {
            response: outcome.response.clone(),
            actions: outcome.actions.iter().map(|a| a.name().to_string()).collect(),
        }
    }
}

impl From<&TutorResponse> for CachedResponse {
    fn from(resp: &TutorResponse) -> Self {
        Self {
            response: resp.text.clone(),
            actions: resp.actions.iter().map(|a| a.name().to_string()).collect(),
        }
    }
}

/// Value of a response file: one response per id (model output) or a list
/// (exported human annotations)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseEntry {
    Single(CachedResponse),
    Ensemble(Vec<CachedResponse>),
}

impl ResponseEntry {
    /// All responses in this entry
    pub fn responses(&self) -> &[CachedResponse] {
        match self {
            Self::Single(resp) => std::slice::from_ref(resp),
            Self::Ensemble(list) => list,
        }
    }
}

/// Reason codes for payload decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum GenerationReason {
    /// Payload decoded into text and labels
    M001_RESPONSE_DECODED,
    /// Message content is empty
    M002_EMPTY_CONTENT,
    /// Content is not valid JSON
    M003_NOT_JSON,
    /// `response` or `actions` missing or wrongly typed
    M004_MISSING_FIELD,
    /// An action name outside the tutor vocabulary
    M005_UNKNOWN_ACTION,
}

impl GenerationReason {
    /// Get reason code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::M001_RESPONSE_DECODED => "M001_RESPONSE_DECODED",
            Self::M002_EMPTY_CONTENT => "M002_EMPTY_CONTENT",
            Self::M003_NOT_JSON => "M003_NOT_JSON",
            Self::M004_MISSING_FIELD => "M004_MISSING_FIELD",
            Self::M005_UNKNOWN_ACTION => "M005_UNKNOWN_ACTION",
        }
    }

    /// Get human description
    pub fn description(&self) -> &'static str {
        match self {
            Self::M001_RESPONSE_DECODED => "Response decoded",
            Self::M002_EMPTY_CONTENT => "Empty message content",
            Self::M003_NOT_JSON => "Content is not JSON",
            Self::M004_MISSING_FIELD => "Missing response or actions",
            Self::M005_UNKNOWN_ACTION => "Unknown action label",
        }
    }

    /// Was a placeholder substituted?
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, Self::M001_RESPONSE_DECODED)
    }
}

impl std::fmt::Display for GenerationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}

// =============================================================================
// TESTS
// =============================================================================
