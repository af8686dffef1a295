//! Google Generative Language API client.
//!
//! One call shape: a system instruction plus an ordered list of user/model
//! turns. Failures are classified into rate-limited (retryable upstream) and
//! everything else (fatal per call).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// One replayed conversation turn sent to the model.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationTurn {
    pub role: TurnRole,
    pub text: String,
}

impl GenerationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(
        &self,
        system_instruction: &str,
        turns: &[GenerationTurn],
    ) -> Result<String, GenerationError>;
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(
        &self,
        system_instruction: &str,
        turns: &[GenerationTurn],
    ) -> Result<String, GenerationError> {
        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }

        #[derive(Serialize)]
        struct Content<'a> {
            role: &'a str,
            parts: Vec<Part<'a>>,
        }

        #[derive(Serialize)]
        struct SystemInstruction<'a> {
            parts: Vec<Part<'a>>,
        }

        #[derive(Serialize)]
        struct GenerateReq<'a> {
            system_instruction: SystemInstruction<'a>,
            contents: Vec<Content<'a>>,
        }

        #[derive(Deserialize)]
        struct GenerateResp {
            candidates: Vec<Candidate>,
        }

        #[derive(Deserialize)]
        struct Candidate {
            content: CandidateContent,
        }

        #[derive(Deserialize)]
        struct CandidateContent {
            #[serde(default)]
            parts: Vec<CandidatePart>,
        }

        #[derive(Deserialize)]
        struct CandidatePart {
            #[serde(default)]
            text: String,
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let body = GenerateReq {
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: system_instruction,
                }],
            },
            contents: turns
                .iter()
                .map(|turn| Content {
                    role: match turn.role {
                        TurnRole::User => "user",
                        TurnRole::Model => "model",
                    },
                    parts: vec![Part { text: &turn.text }],
                })
                .collect(),
        };

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| GenerationError::Failed(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, &body));
        }

        let parsed = response
            .json::<GenerateResp>()
            .await
            .map_err(|err| GenerationError::Failed(format!("undecodable response: {err}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(text.trim().to_string())
    }
}

fn classify_http_failure(status: StatusCode, body: &str) -> GenerationError {
    let message = normalize_err_body(body);
    let lowered = message.to_lowercase();

    if status == StatusCode::TOO_MANY_REQUESTS
        || lowered.contains("resource_exhausted")
        || lowered.contains("rate limit")
        || lowered.contains("quota")
    {
        GenerationError::RateLimited(format!("{status}: {message}"))
    } else {
        GenerationError::Failed(format!("{status}: {message}"))
    }
}

fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(message) = json
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return message.to_string();
        }
    }

    trimmed.to_string()
}
