//! OpenAI-compatible chat and moderation client.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::debug;

use super::{Analyst, AnalystError};
use crate::config::AnalystConfig;
use crate::model::BotScore;

const BOT_SCORE_SYSTEM: &str = "You are an AI that can detect bot-generated comments. Score each comment from 0-5, where 0 means very likely human-written and 5 means extremely likely bot-generated.";
const SUMMARY_SYSTEM: &str =
    "You are an AI that can identify the theme and extract insights from the content.";

pub struct OpenAiAnalyst {
    client: reqwest::Client,
    config: AnalystConfig,
}

impl OpenAiAnalyst {
    /// Requests use the client library's default timeout.
    pub fn new(config: AnalystConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn chat(&self, system: &str, user: String) -> Result<String, AnalystError> {
        let body = json!({
            "model": self.config.chat_model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });
        let value = self.post("chat/completions", &body).await?;
        parse_chat_reply(&value)
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, AnalystError> {
        let url = format!("{}/{}", self.config.api_base, endpoint);
        debug!(url = %url, "calling analysis service");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AnalystError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }
}

impl Analyst for OpenAiAnalyst {
    async fn score(&self, text: &str) -> Result<BotScore, AnalystError> {
        let user = format!(
            "Analyze this comment and provide a score from 0-5 for bot likelihood:\n\n{}",
            text
        );
        let reply = self.chat(BOT_SCORE_SYSTEM, user).await?;
        parse_score(&reply)
            .map(BotScore::new)
            .ok_or_else(|| AnalystError::Malformed(format!("score is not a number: {:?}", reply)))
    }

    async fn classify(&self, text: &str) -> Result<BTreeMap<String, bool>, AnalystError> {
        let body = json!({
            "model": self.config.moderation_model,
            "input": text,
        });
        let value = self.post("moderations", &body).await?;
        parse_moderation(&value)
    }

    async fn summarize(&self, text: &str) -> Result<String, AnalystError> {
        self.chat(SUMMARY_SYSTEM, format!("Analyze this content: \n\n{}", text))
            .await
    }
}

/// Text of the first choice of a chat completion response.
pub fn parse_chat_reply(value: &Value) -> Result<String, AnalystError> {
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| AnalystError::Malformed("no message content in chat response".into()))
}

/// Category flags of the first moderation result. Non-boolean entries are ignored.
pub fn parse_moderation(value: &Value) -> Result<BTreeMap<String, bool>, AnalystError> {
    let categories = value["results"][0]["categories"]
        .as_object()
        .ok_or_else(|| AnalystError::Malformed("no categories in moderation response".into()))?;
    Ok(categories
        .iter()
        .filter_map(|(name, flag)| flag.as_bool().map(|f| (name.clone(), f)))
        .collect())
}

/// The whole reply must be a number; anything else is a parse failure.
pub fn parse_score(reply: &str) -> Option<f64> {
    reply.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::serve_once;

    fn analyst_at(api_base: String) -> OpenAiAnalyst {
        OpenAiAnalyst::new(AnalystConfig {
            api_key: "test-key".into(),
            api_base,
            chat_model: "gpt-3.5-turbo".into(),
            moderation_model: "text-moderation-latest".into(),
        })
    }

    #[tokio::test]
    async fn chat_round_trip_through_default_client() {
        let reply = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"4"}}]}"#;
        let base = serve_once("200 OK", "application/json", reply).await;
        let score = analyst_at(base).score("Please adopt this rule.").await.unwrap();
        assert_eq!(score.value(), 4.0);
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let base = serve_once("429 Too Many Requests", "application/json", "slow down").await;
        let err = analyst_at(base).summarize("text").await.unwrap_err();
        assert!(matches!(err, AnalystError::Api { status: 429, ref body } if body == "slow down"));
    }

    #[test]
    fn chat_reply_content() {
        let v = json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": " 3.5\n" } }]
        });
        assert_eq!(parse_chat_reply(&v).unwrap(), "3.5");
        assert!(matches!(
            parse_chat_reply(&json!({ "choices": [] })),
            Err(AnalystError::Malformed(_))
        ));
    }

    #[test]
    fn moderation_categories() {
        let v = json!({
            "results": [{
                "flagged": true,
                "categories": { "harassment": false, "spam": true, "self-harm/intent": false, "odd": null }
            }]
        });
        let c = parse_moderation(&v).unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(c.get("spam"), Some(&true));
        assert_eq!(c.get("self-harm/intent"), Some(&false));
        assert!(parse_moderation(&json!({ "results": [] })).is_err());
    }

    #[test]
    fn scores_must_be_plain_numbers() {
        assert_eq!(parse_score("4"), Some(4.0));
        assert_eq!(parse_score(" 2.5 "), Some(2.5));
        assert_eq!(parse_score("7"), Some(7.0));
        assert_eq!(parse_score("Score: 3"), None);
        assert_eq!(parse_score("NaN"), None);
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("7").map(BotScore::new).map(BotScore::value), Some(5.0));
    }
}
