//! The AI-analysis collaborator boundary.
//!
//! `AnalysisOracle` is carried in `AppState` as `Arc<dyn AnalysisOracle>`. The
//! production implementation, `LlmOracle`, goes through `LlmClient`; tests swap in a
//! scripted oracle. Responses are validated here so nothing untyped reaches the
//! candidate record.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::llm_client::{parse_json_text, Attachment, LlmClient, LlmError};
use crate::scoring::encoder::EncodedContent;
use crate::scoring::prompts::{
    resume_score_prompt, resume_score_system, ATTACHMENT_NOTE, JD_EXTRACT_PROMPT,
    JD_EXTRACT_SYSTEM, NO_ATTACHMENT_NOTE,
};

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("response did not match the expected schema: {0}")]
    Malformed(String),

    #[error("oracle returned no text")]
    EmptyText,

    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),
}

/// Inputs for scoring one resume.
#[derive(Debug, Clone, Copy)]
pub struct ScoreRequest<'a> {
    pub job_text: &'a str,
    pub display_name: &'a str,
    pub content: &'a EncodedContent,
}

/// Validated scoring response. Every field may be absent; wrong types are rejected.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePayload {
    #[serde(default)]
    pub candidate_name: Option<String>,
    #[serde(default)]
    pub current_role: Option<String>,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub analysis: Option<String>,
}

impl ScorePayload {
    /// Rounded score, passed through unclamped. Absent means 0.
    pub fn score(&self) -> i64 {
        self.match_score.map(|s| s.round() as i64).unwrap_or(0)
    }
}

#[async_trait]
pub trait AnalysisOracle: Send + Sync {
    async fn score_resume(&self, request: ScoreRequest<'_>) -> Result<ScorePayload, OracleError>;

    /// Returns the job description text found in `document`, formatted with
    /// `## ` section headers and `- ` bullets.
    async fn extract_job_description(
        &self,
        document: &EncodedContent,
    ) -> Result<String, OracleError>;
}

/// Awaits an oracle call, bounded by `timeout` when one is configured.
pub async fn bounded<T, F>(timeout: Option<Duration>, call: F) -> Result<T, OracleError>
where
    F: Future<Output = Result<T, OracleError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| OracleError::Timeout(limit))?,
        None => call.await,
    }
}

/// Parses and validates the scoring JSON returned by the model.
pub fn parse_score_payload(text: &str) -> Result<ScorePayload, OracleError> {
    if text.trim().is_empty() {
        return Err(OracleError::EmptyText);
    }
    parse_json_text::<ScorePayload>(text).map_err(|e| OracleError::Malformed(e.to_string()))
}

/// Oracle backed by the Claude Messages API.
pub struct LlmOracle {
    llm: LlmClient,
}

impl LlmOracle {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AnalysisOracle for LlmOracle {
    async fn score_resume(&self, request: ScoreRequest<'_>) -> Result<ScorePayload, OracleError> {
        let attachment = attachment_for(request.content);
        let note = if attachment.is_some() {
            ATTACHMENT_NOTE
        } else {
            NO_ATTACHMENT_NOTE
        };
        let prompt = resume_score_prompt(request.display_name, note, request.job_text);

        let text = self
            .llm
            .call_text(&prompt, &resume_score_system(), attachment.as_slice())
            .await
            .map_err(map_empty)?;
        parse_score_payload(&text)
    }

    async fn extract_job_description(
        &self,
        document: &EncodedContent,
    ) -> Result<String, OracleError> {
        let attachment = attachment_for(document).ok_or_else(|| {
            OracleError::Malformed(format!(
                "unsupported job description document type '{}'",
                document.mime_type
            ))
        })?;
        let text = self
            .llm
            .call_text(JD_EXTRACT_PROMPT, JD_EXTRACT_SYSTEM, &[attachment])
            .await
            .map_err(map_empty)?;
        Ok(text)
    }
}

fn map_empty(e: LlmError) -> OracleError {
    match e {
        LlmError::EmptyContent => OracleError::EmptyText,
        other => OracleError::Llm(other),
    }
}

/// Chooses how file content is presented to the model. Content the API cannot
/// accept is left out and the prompt says so.
pub fn attachment_for(content: &EncodedContent) -> Option<Attachment> {
    if content.is_empty() {
        return None;
    }
    let mime = content.mime_type.to_ascii_lowercase();
    match mime.as_str() {
        "application/pdf" => Some(Attachment::Pdf {
            data: content.data.clone(),
        }),
        "image/png" | "image/jpeg" | "image/gif" | "image/webp" => Some(Attachment::Image {
            media_type: mime,
            data: content.data.clone(),
        }),
        m if m.starts_with("text/") => content.decode().map(|bytes| Attachment::PlainText {
            text: String::from_utf8_lossy(&bytes).into_owned(),
        }),
        _ => None,
    }
}
