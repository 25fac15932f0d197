use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};

use crate::types::{LeadError, LeadKind, Result};

const MODEL_BASE_URL: &str = "https://api.openai.com/v1";
const MODEL_NAME: &str = "gpt-3.5-turbo";

/// Longest excerpt submitted to the model service.
pub const EXCERPT_MAX_CHARS: usize = 2000;

const LEAD_KEYWORDS: [&str; 13] = [
    "looking for",
    "need a developer",
    "hire",
    "hiring",
    "freelancer",
    "contractor",
    "budget",
    "quote",
    "estimate",
    "project",
    "build",
    "develop",
    "create",
];

const ADVICE_KEYWORDS: [&str; 6] = [
    "advice",
    "recommend",
    "suggest",
    "what should",
    "how to",
    "question",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_lead: bool,
    pub confidence: f64,
    pub reason: String,
}

/// Two-tier classifier, selected once at construction: model-backed when a
/// service key is configured, keyword fallback otherwise. The primary tier
/// delegates to the fallback on any service failure, so classification
/// itself never fails.
pub enum Classifier {
    Primary(ModelClient),
    FallbackOnly,
}

impl Classifier {
    pub fn from_api_key(api_key: Option<String>) -> Self {
        match api_key {
            Some(key) if !key.is_empty() => Classifier::Primary(ModelClient::new(&key)),
            _ => {
                warn!("Model service API key not set, classification uses the keyword fallback");
                Classifier::FallbackOnly
            }
        }
    }

    pub async fn classify(&self, text: &str, kind: LeadKind) -> Verdict {
        match self {
            Classifier::Primary(client) => match client.classify(text, kind).await {
                Ok(verdict) => verdict,
                Err(e) => {
                    warn!("Model classification failed, falling back to keywords: {}", e);
                    keyword_classify(text)
                }
            },
            Classifier::FallbackOnly => keyword_classify(text),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Chat-completions client for the model-backed tier.
pub struct ModelClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl ModelClient {
    pub fn new(api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key: api_key.to_string(),
            http,
            base_url: MODEL_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    async fn classify(&self, text: &str, kind: LeadKind) -> Result<Verdict> {
        let request = ChatRequest {
            model: MODEL_NAME.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You are an expert at identifying business leads from Reddit posts. \
                              Respond only with valid JSON."
                        .to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(text, kind),
                },
            ],
            temperature: 0.3,
            max_tokens: 200,
        };

        debug!("Submitting {} excerpt for model classification", kind.as_str());

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LeadError::General(format!(
                "model service returned HTTP {}",
                response.status()
            )));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LeadError::General("empty model response".to_string()))?;

        parse_verdict(&content)
            .ok_or_else(|| LeadError::General("no structured verdict in model response".to_string()))
    }
}

fn build_prompt(text: &str, kind: LeadKind) -> String {
    format!(
        "Analyze the following Reddit {kind} and determine if it's a request for IT services \
         (web development, software development, hiring developers, etc.) or just asking for \
         advice/recommendations.\n\n\
         Rules:\n\
         - If the {kind} is asking to HIRE someone, looking for a DEVELOPER, or requesting a \
         SERVICE - mark as LEAD (isLead: true)\n\
         - If it's just asking for ADVICE, RECOMMENDATIONS, or GENERAL QUESTIONS - mark as NOT \
         a lead (isLead: false)\n\
         - Provide confidence score from 0 to 1\n\
         - Provide a brief reason\n\n\
         Text to analyze:\n\"{excerpt}\"\n\n\
         Respond in JSON format:\n\
         {{\n  \"isLead\": boolean,\n  \"confidence\": number (0-1),\n  \"reason\": \"brief explanation\"\n}}",
        kind = kind.as_str(),
        excerpt = truncate_chars(text, EXCERPT_MAX_CHARS),
    )
}

/// Truncates to at most `max` characters on a character boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Extracts the first well-formed verdict object from the response text.
/// The service may wrap its JSON in prose, so every `{` is tried as a
/// candidate start; an object missing the required `isLead` field is
/// rejected.
pub fn parse_verdict(content: &str) -> Option<Verdict> {
    for (idx, ch) in content.char_indices() {
        if ch != '{' {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&content[idx..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            if let Some(verdict) = verdict_from_value(&value) {
                return Some(verdict);
            }
        }
    }
    None
}

fn verdict_from_value(value: &Value) -> Option<Verdict> {
    let is_lead = value.get("isLead")?.as_bool()?;
    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);
    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or("model analysis completed")
        .to_string();
    Some(Verdict {
        is_lead,
        confidence,
        reason,
    })
}

/// Deterministic keyword heuristic, a pure function of the text. Counts
/// case-insensitive substring hits against the lead and advice indicator
/// sets; lead wins only on a strict majority with at least one hit.
pub fn keyword_classify(text: &str) -> Verdict {
    let lower = text.to_lowercase();
    let lead_matches = LEAD_KEYWORDS.iter().filter(|k| lower.contains(**k)).count();
    let advice_matches = ADVICE_KEYWORDS
        .iter()
        .filter(|k| lower.contains(**k))
        .count();

    let is_lead = lead_matches > advice_matches && lead_matches > 0;
    let confidence = (0.3 + 0.1 * lead_matches as f64).min(0.7);

    Verdict {
        is_lead,
        confidence,
        reason: format!(
            "Keyword analysis: {} lead indicators, {} advice indicators",
            lead_matches, advice_matches
        ),
    }
}
