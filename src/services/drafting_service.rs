//! Letter drafting with a local Ollama model.
//!
//! The model is asked to answer in JSON with a single `letter` field
//! (`format: "json"`), which is also how the text is stored.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::IntegrationError, models::letter_request::LetterDraftRequest,
    services::http_client::expect_success,
};

#[async_trait]
pub trait LetterDrafter: Send + Sync {
    /// Produce the letter body for `prompt`.
    async fn draft(&self, prompt: &str) -> Result<String, IntegrationError>;
}

/// Calls `POST {base_url}/api/generate` on an Ollama server.
pub struct OllamaDrafter {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaDrafter {
    pub fn new(client: reqwest::Client, base_url: String, model: String) -> Self {
        Self {
            client,
            base_url,
            model,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    format: &'static str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl LetterDrafter for OllamaDrafter {
    async fn draft(&self, prompt: &str) -> Result<String, IntegrationError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                format: "json",
                stream: false,
            })
            .send()
            .await?;

        let generated: GenerateResponse = expect_success("Ollama", response).await?.json().await?;
        parse_draft_response(&generated.response)
    }
}

/// Pull the `letter` field out of the model's JSON answer.
pub fn parse_draft_response(raw: &str) -> Result<String, IntegrationError> {
    let invalid = |message: &str| IntegrationError::InvalidResponse {
        service: "Ollama",
        message: message.to_string(),
    };

    let value: Value = serde_json::from_str(raw).map_err(|_| invalid("answer is not JSON"))?;

    value
        .get("letter")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|letter| !letter.is_empty())
        .map(str::to_string)
        .ok_or_else(|| invalid("answer has no 'letter' field"))
}

/// Build the drafting prompt from the draft options and the requester's comments.
pub fn build_draft_prompt(
    bill_name: &str,
    lawmaker_name: &str,
    draft: &LetterDraftRequest,
    user_comments: &str,
) -> String {
    let mut prompt = format!(
        "Write a respectful and clear letter to {lawmaker_name} regarding the bill \"{bill_name}\".\n\
         The writer's stance towards this bill is: {stance}.\n\
         On a scale from 1 to 10, their support level is: {level}.\n\
         \n\
         Background comments from the requester:\n\
         {comments}\n",
        stance = draft.stance,
        level = draft.support_level,
        comments = user_comments.trim(),
    );

    if let Some(feedback) = draft
        .personal_feedback
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
    {
        prompt.push_str(&format!(
            "\nAdditional personal feedback from the requester:\n{feedback}\n"
        ));
    }

    prompt.push_str(
        "\nThe letter should be concise, persuasive, and well-structured. Sign off at the end.\n\
         Please respond with a JSON object containing a field \"letter\" that holds the final letter text.\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::letter_request::Stance;

    fn draft(feedback: Option<&str>) -> LetterDraftRequest {
        LetterDraftRequest {
            bill_name: None,
            lawmaker_name: None,
            stance: Stance::Oppose,
            support_level: 2,
            personal_feedback: feedback.map(str::to_string),
        }
    }

    #[test]
    fn prompt_mentions_bill_lawmaker_and_stance() {
        let prompt = build_draft_prompt(
            "HB 1234",
            "Senator Smith",
            &draft(None),
            "  It closes our clinic. ",
        );

        assert!(prompt.contains("letter to Senator Smith regarding the bill \"HB 1234\""));
        assert!(prompt.contains("stance towards this bill is: oppose."));
        assert!(prompt.contains("support level is: 2."));
        assert!(prompt.contains("requester:\nIt closes our clinic.\n"));
        assert!(!prompt.contains("Additional personal feedback"));
        assert!(prompt.ends_with("the final letter text.\n"));
    }

    #[test]
    fn feedback_is_appended_when_present() {
        let prompt = build_draft_prompt("HB 1", "Rep. Doe", &draft(Some("I am a nurse.")), "x");
        assert!(prompt.contains("Additional personal feedback from the requester:\nI am a nurse.\n"));

        let prompt = build_draft_prompt("HB 1", "Rep. Doe", &draft(Some("   ")), "x");
        assert!(!prompt.contains("Additional personal feedback"));
    }

    #[test]
    fn model_answer_must_carry_a_letter() {
        assert_eq!(
            parse_draft_response(r#"{"letter": "Dear Rep. Doe,"}"#).unwrap(),
            "Dear Rep. Doe,"
        );
        assert!(parse_draft_response("Dear Rep. Doe").is_err());
        assert!(parse_draft_response(r#"{"text": "Dear Rep. Doe"}"#).is_err());
        assert!(parse_draft_response(r#"{"letter": ""}"#).is_err());
    }
}
