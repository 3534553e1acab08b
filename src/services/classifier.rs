// src/services/classifier.rs

//! Moderation classifier backed by the Gemini `generateContent` REST API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{ModerationConfig, Poster, Verdict};
use crate::services::Classifier;

const INSTRUCTIONS: &str = "Classify the following catalog image and its metadata as safe or \
unsafe, and give a content warning when one is needed. Keep warnings short and no more \
detailed than necessary. Stay neutral and historically accurate, but lean towards caution. \
Unsafe categories: CSEAI, Drugs, Gore, Harassment, Hate, Nudity or sexual, Offensive words, \
Self-harm, Terrorism or extremism, Toxic, Violence, Weapons.";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
];

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Gemini-backed classifier.
#[derive(Debug, Clone)]
pub struct GeminiClassifier {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClassifier {
    pub fn new(client: Client, config: &ModerationConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn request_body(poster: &Poster) -> Result<Value> {
        let payload = serde_json::to_string(poster)?;
        let safety: Vec<Value> = HARM_CATEGORIES
            .iter()
            .map(|category| json!({ "category": category, "threshold": "BLOCK_NONE" }))
            .collect();

        Ok(json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": INSTRUCTIONS },
                    { "text": format!("Image: {payload}") },
                    { "text": "Verdict: " },
                ],
            }],
            "generationConfig": {
                "temperature": 0.9,
                "topP": 0.95,
                "topK": 64,
                "maxOutputTokens": 1024,
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "safe": { "type": "BOOLEAN" },
                        "content_warning": { "type": "STRING" },
                    },
                    "required": ["safe"],
                },
            },
            "safetySettings": safety,
        }))
    }

    /// Pull the JSON verdict out of the first candidate's text.
    fn parse_verdict(response: GenerateResponse) -> Result<Verdict> {
        let text = response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| AppError::classifier("response has no candidate text"))?;

        serde_json::from_str(text.trim())
            .map_err(|e| AppError::classifier(format!("unparseable verdict {text:?}: {e}")))
    }
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify(&self, poster: &Poster) -> Result<Verdict> {
        let body = Self::request_body(poster)?;
        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(AppError::classifier)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited(format!(
                "classifier returned {status} for {}",
                poster.id
            )));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::classifier(format!("HTTP {status}: {detail}")));
        }

        let parsed: GenerateResponse = response.json().await.map_err(AppError::classifier)?;
        Self::parse_verdict(parsed)
    }
}
