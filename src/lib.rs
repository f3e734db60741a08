//! Tutorlens: statistics over annotated dialogue-tutoring conversations
//!
//! raw record → RecordNormalizer → Conversation → distribution / agreement engines

pub mod core;
pub mod error;
pub mod types;

pub use error::{Error, Result};

// =============================================================================
// VOCABULARIES [C] - Positional order of the raw boolean arrays
// =============================================================================

/// Tutor flags per response: question, hint, correction, confirmation, other
pub const TUTOR_VOCABULARY_LEN: usize = 5;

/// Student flags per record: guess, question, affirmation, other
pub const STUDENT_VOCABULARY_LEN: usize = 4;

// =============================================================================
// DATASET SCHEMA [C]
// =============================================================================

/// Envelope key used by the published dataset file
pub const DATASET_ENVELOPE_KEY: &str = "prepDataset";

/// Marker closing the rule/explanation literal inside `grammarRules`
pub const GRAMMAR_CLOSING_MARKER: &str = "]]";

/// Deepest bracket nesting accepted in the rule literal
pub const GRAMMAR_MAX_NESTING: usize = 64;

// =============================================================================
// RESPONSE GENERATION [C]
// =============================================================================

/// Cache file suffix: `<model_id>_responses.json`
pub const RESPONSE_CACHE_SUFFIX: &str = "_responses.json";

/// OpenAI-compatible chat-completion endpoint
pub const DEFAULT_GENERATION_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Total generation calls per conversation (first try included) before it is
/// skipped for this run
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Request timeout for one generation call (seconds)
pub const GENERATION_TIMEOUT_SECS: u64 = 120;

/// Prefix of the placeholder text stored when a payload cannot be decoded
pub const SENTINEL_RESPONSE_PREFIX: &str = "Error parsing model response";

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "0.3.0";
