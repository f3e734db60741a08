//! Model responses: generation seam, on-disk cache and resumable collection
//!
//! Cache file: `<model_id>_responses.json`, an object keyed by conversation id
//! holding `{response, actions}`. The file is rewritten after every new
//! response, so an interrupted run resumes by skipping ids already present.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{
    ActionLabel, CachedResponse, Conversation, GenerationOutcome, GenerationReason, ResponseEntry,
    TutorAction, TutorResponse,
};
use crate::{DEFAULT_GENERATION_URL, GENERATION_TIMEOUT_SECS, RESPONSE_CACHE_SUFFIX};

// =============================================================================
// GENERATION SEAM
// =============================================================================

/// External producer of tutor responses
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Generate one response for `conversation` with `model`.
    ///
    /// `Err` means the call itself failed (worth retrying); an undecodable
    /// payload is an `Ok` sentinel outcome.
    async fn generate(&self, conversation: &Conversation, model: &str) -> Result<GenerationOutcome>;
}

/// Decode the message content returned by the generation service
pub fn parse_generation_payload(content: &str) -> GenerationOutcome {
    let content = content.trim();
    if content.is_empty() {
        return GenerationOutcome::sentinel(GenerationReason::M002_EMPTY_CONTENT, "empty content");
    }

    let value: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => return GenerationOutcome::sentinel(GenerationReason::M003_NOT_JSON, e),
    };

    let response = value.get("response").and_then(Value::as_str);
    let names = value.get("actions").and_then(Value::as_array).and_then(|items| {
        items
            .iter()
            .map(Value::as_str)
            .collect::<Option<Vec<&str>>>()
    });

    let (response, names) = match (response, names) {
        (Some(r), Some(n)) => (r, n),
        _ => {
            return GenerationOutcome::sentinel(
                GenerationReason::M004_MISSING_FIELD,
                "expected string 'response' and string array 'actions'",
            )
        }
    };

    let mut actions = BTreeSet::new();
    for name in names {
        match TutorAction::from_name(name) {
            Some(label) => {
                actions.insert(label);
            }
            None => {
                return GenerationOutcome::sentinel(
                    GenerationReason::M005_UNKNOWN_ACTION,
                    format!("unknown action '{}'", name),
                )
            }
        }
    }

    GenerationOutcome::decoded(response, actions)
}

// =============================================================================
// CHAT-COMPLETION CLIENT
// =============================================================================

/// OpenAI-compatible chat-completion client (OpenRouter by default)
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl ChatCompletion {
    /// First choice's content; empty when there is none
    fn content(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default()
    }
}

/// Rejected credentials abort the run; every other failure status is retryable
fn status_error(model: &str, status: reqwest::StatusCode, body: &str) -> Error {
    match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => Error::Config(
            format!("generation service rejected the API key (HTTP {}): {}", status, body),
        ),
        _ => Error::generation(model, format!("HTTP {}: {}", status, body)),
    }
}

impl OpenRouterClient {
    /// Create client for the default endpoint
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("generation API key is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(GENERATION_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            api_key,
            url: DEFAULT_GENERATION_URL.to_string(),
        })
    }

    /// Override the endpoint URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Use a preconfigured HTTP client (proxy, TLS or timeout settings)
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }
}

#[async_trait]
impl ResponseGenerator for OpenRouterClient {
    async fn generate(&self, conversation: &Conversation, model: &str) -> Result<GenerationOutcome> {
        let body = build_request(conversation, model);

        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(model, status, &text));
        }

        let completion: ChatCompletion = resp.json().await?;
        let content = completion.content();

        let outcome = parse_generation_payload(&content);
        if outcome.is_sentinel() {
            warn!(
                id = conversation.id.as_str(),
                model,
                reason = outcome.reason.code(),
                raw = content.as_str(),
                "undecodable generation payload"
            );
        }
        Ok(outcome)
    }
}

/// Chat-completion request with a strict JSON schema for `{response, actions}`
pub fn build_request(conversation: &Conversation, model: &str) -> Value {
    let action_names: Vec<&str> = TutorAction::ALL.iter().map(|a| a.name()).collect();
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system_prompt(conversation) },
            { "role": "user", "content": user_prompt(conversation) },
        ],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "tutor_response",
                "strict": true,
                "schema": {
                    "type": "object",
                    "properties": {
                        "response": {
                            "type": "string",
                            "description": "The tutor's response text"
                        },
                        "actions": {
                            "type": "array",
                            "items": { "type": "string", "enum": action_names },
                            "description": "Action types of this response"
                        }
                    },
                    "required": ["response", "actions"]
                }
            }
        }
    })
}

fn system_prompt(conversation: &Conversation) -> String {
    let ctx = &conversation.context;
    format!(
        "You are a language tutor teaching Italian.\n\n\
         Available actions (one response may have several):\n\
         - question: ask the student to clarify or elaborate\n\
         - hint: give indirect guidance\n\
         - correction: point out and fix an error\n\
         - confirmation: acknowledge a correct answer\n\
         - other: anything else\n\n\
         Context:\n\
         - Target phrase (Italian): {}\n\
         - Target phrase (English): {}\n\
         - Grammar rules: {}\n\n\
         Answer in JSON: {{\"response\": \"your reply\", \"actions\": [\"lowercase action names\"]}}",
        ctx.target_phrase.source,
        ctx.target_phrase.target,
        ctx.grammar_rules.join("; "),
    )
}

fn user_prompt(conversation: &Conversation) -> String {
    let history: Vec<String> = conversation
        .context
        .conversation_history
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let speaker = if i % 2 == 0 { "Tutor" } else { "Student" };
            format!("{}: {}", speaker, line)
        })
        .collect();
    format!(
        "Conversation history:\n{}\n\nReply as the tutor to the student's last message.",
        history.join("\n")
    )
}

// =============================================================================
// RESPONSE CACHE
// =============================================================================

/// Per-model response cache backed by `<model_id>_responses.json`
#[derive(Debug)]
pub struct ResponseStore {
    path: PathBuf,
    model: String,
    entries: BTreeMap<String, CachedResponse>,
}

impl ResponseStore {
    /// Cache path for `model` under `dir` (`/` in model ids becomes `_`)
    pub fn cache_path(dir: impl AsRef<Path>, model: &str) -> PathBuf {
        dir.as_ref()
            .join(format!("{}{}", model.replace('/', "_"), RESPONSE_CACHE_SUFFIX))
    }

    /// Open the cache for `model`, empty if the file does not exist yet
    pub fn open(dir: impl AsRef<Path>, model: &str) -> Result<Self> {
        let path = Self::cache_path(dir, model);
        let entries = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            serde_json::from_str(&json)?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), cached = entries.len(), "opened response cache");
        Ok(Self {
            path,
            model: model.to_string(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&CachedResponse> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store an outcome and rewrite the cache file
    pub fn record(&mut self, id: &str, outcome: &GenerationOutcome) -> Result<()> {
        self.entries.insert(id.to_string(), CachedResponse::from(outcome));
        self.save()
    }

    /// Write the whole cache (temp file + rename)
    pub fn save(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.entries)
    }

    /// Model-authored copies of the human conversations that have a cached response.
    ///
    /// Each copy keeps the human context and student actions and carries the
    /// model response as its only tutor response.
    pub fn synthesize(&self, human: &[Conversation]) -> Vec<Conversation> {
        human
            .iter()
            .filter_map(|conv| {
                let cached = self.entries.get(&conv.id)?;
                for unknown in cached.unknown_actions() {
                    warn!(id = conv.id.as_str(), action = unknown, "dropping unknown cached action");
                }
                Some(Conversation {
                    id: conv.id.clone(),
                    student_actions: conv.student_actions.clone(),
                    tutor_responses: vec![TutorResponse::new(
                        cached.response.clone(),
                        cached.tutor_actions(),
                    )],
                    context: conv.context.clone(),
                })
            })
            .collect()
    }
}

/// Counters for one collection run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    /// New responses written to the cache
    pub generated: usize,
    /// Ids skipped because the cache already had them
    pub cached: usize,
    /// Ids abandoned after exhausting their attempts
    pub failed: usize,
    /// Generated entries that are placeholders
    pub sentinel: usize,
}

/// Generate responses for every conversation not yet cached, one at a time.
///
/// Transient failures are retried up to `max_attempts` times, then the id is
/// skipped for this run. Other errors abort the run; everything recorded so
/// far is already on disk.
pub async fn collect_responses<G: ResponseGenerator + ?Sized>(
    store: &mut ResponseStore,
    generator: &G,
    conversations: &[Conversation],
    max_attempts: u32,
) -> Result<CollectionSummary> {
    let model = store.model().to_string();
    let max_attempts = max_attempts.max(1);
    let mut summary = CollectionSummary::default();

    for conv in conversations {
        if store.contains(&conv.id) {
            summary.cached += 1;
            continue;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match generator.generate(conv, &model).await {
                Ok(outcome) => {
                    if outcome.is_sentinel() {
                        summary.sentinel += 1;
                    }
                    store.record(&conv.id, &outcome)?;
                    summary.generated += 1;
                    debug!(id = conv.id.as_str(), attempt, "response cached");
                    break;
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(id = conv.id.as_str(), attempt, error = %e, "generation failed, retrying");
                }
                Err(e) if e.is_transient() => {
                    warn!(id = conv.id.as_str(), attempt, error = %e, "generation failed, skipping");
                    summary.failed += 1;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
    }

    info!(
        model = model.as_str(),
        generated = summary.generated,
        cached = summary.cached,
        failed = summary.failed,
        sentinel = summary.sentinel,
        "response collection finished"
    );
    Ok(summary)
}

// =============================================================================
// RESPONSE FILES
// =============================================================================

/// Human annotations in response-file form: id → list of `{response, actions}`
pub fn export_human_responses(conversations: &[Conversation]) -> BTreeMap<String, ResponseEntry> {
    conversations
        .iter()
        .map(|conv| {
            let responses = conv.tutor_responses.iter().map(CachedResponse::from).collect();
            (conv.id.clone(), ResponseEntry::Ensemble(responses))
        })
        .collect()
}

/// Load a response file in either shape (single or list per id)
pub fn load_response_file(path: impl AsRef<Path>) -> Result<BTreeMap<String, ResponseEntry>> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Serialize `value` as pretty JSON to `path` through a sibling temp file
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
