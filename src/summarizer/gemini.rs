//! Gemini-backed summarizer
//!
//! Uses a long-lived reqwest::Client for connection pooling. Any failure
//! (missing key, transport, empty candidate) falls back to the template.

use super::{SummaryRequest, SummaryResponse, Summarizer, TemplateSummarizer};
use crate::error::OrchestrationError;
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

const GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

const SYSTEM_PROMPT: &str = r#"당신은 전문 주식 애널리스트입니다.
조회된 주식 데이터를 바탕으로 투자자가 이해하기 쉽게 분석하고 요약해주세요.
- 객관적이고 정확한 정보 전달
- 투자 위험에 대한 적절한 경고
- 쉽고 명확한 표현 사용
- 데이터에 없는 수치는 만들지 말 것"#;

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            api_key: api_key.into(),
            base_url: GEMINI_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(OrchestrationError::LlmError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 512,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
        };

        info!("Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                OrchestrationError::LlmError(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(OrchestrationError::LlmError(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            OrchestrationError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        first_text(gemini_response)
    }
}

fn first_text(response: GeminiResponse) -> Result<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| OrchestrationError::LlmError("Empty response from Gemini".to_string()))
}

fn build_prompt(request: &SummaryRequest<'_>, draft: &str) -> Result<String> {
    let structured = serde_json::to_string_pretty(request.structured)?;
    let result = serde_json::to_string_pretty(request.result)?;
    Ok(format!(
        "사용자 질문: {}\n\n분류 결과:\n{}\n\n조회 데이터:\n{}\n\n기본 요약:\n{}\n\n\
         위 데이터를 바탕으로 질문에 대한 답변을 3-4줄로 작성해주세요.",
        request.query, structured, result, draft
    ))
}

pub struct GeminiSummarizer {
    client: GeminiClient,
    fallback: TemplateSummarizer,
}

impl GeminiSummarizer {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            fallback: TemplateSummarizer,
        }
    }
}

#[async_trait::async_trait]
impl Summarizer for GeminiSummarizer {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<SummaryResponse> {
        let draft = self.fallback.render(request.result);

        let answer = match build_prompt(request, &draft) {
            Ok(prompt) => self.client.generate(&prompt).await,
            Err(e) => Err(e),
        };

        match answer {
            Ok(text) => Ok(SummaryResponse {
                final_answer: format!("{}\n\n{}", draft, text.trim()),
            }),
            Err(e) => {
                warn!(error = %e, "Gemini summary unavailable; using template");
                Ok(SummaryResponse {
                    final_answer: draft,
                })
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}
