//! Answer rendering
//!
//! A summarizer turns `{query, structured, result}` into a final answer. The
//! orchestrator treats it as a black box and falls back to the template
//! renderer whenever a summarizer errors.

pub mod gemini;
pub mod template;

use crate::models::{AggregatedResult, StructuredIntent};
use crate::Result;
use serde::Serialize;

pub use gemini::{GeminiClient, GeminiSummarizer};
pub use template::TemplateSummarizer;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SummaryRequest<'a> {
    pub query: &'a str,
    pub structured: &'a StructuredIntent,
    pub result: &'a AggregatedResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResponse {
    pub final_answer: String,
}

#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &'static str;
    async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<SummaryResponse>;
}
