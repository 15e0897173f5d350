//! Orchestrator - the single `handle(query)` entry point
//!
//! CLASSIFY → DISPATCH → AGGREGATE → SUMMARIZE
//!
//! Holds no business logic of its own and never fails past its boundary:
//! every call yields a success or error `QueryResponse`.

use crate::aggregator::ResultAggregator;
use crate::classifier::IntentClassifier;
use crate::collaborators::create_default_registry;
use crate::config::Settings;
use crate::dispatcher::{DispatchOutcome, DispatchTable, Dispatcher};
use crate::models::{Capability, QueryResponse, QueryType, StructuredIntent};
use crate::summarizer::{
    GeminiClient, GeminiSummarizer, Summarizer, SummaryRequest, TemplateSummarizer,
};
use crate::Result;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Queries shown when a request is not understood.
pub const USAGE_EXAMPLES: &[&str] = &[
    "삼성전자의 2024-07-01 종가는?",
    "카카오 현재가",
    "상승률 상위 5개 종목",
    "2024-07-01 코스피에서 거래량 많은 종목 10개",
    "3% 이상 상승한 종목",
    "2024-07-01 상승한 종목은 몇 개",
    "삼성전자 20일 이평선 3% 상향 돌파",
];

pub fn usage_hint() -> String {
    let mut text = String::from("질문을 이해하지 못했습니다. 이런 식으로 물어보세요:");
    for example in USAGE_EXAMPLES {
        text.push_str("\n- ");
        text.push_str(example);
    }
    text
}

pub struct Orchestrator {
    classifier: IntentClassifier,
    dispatcher: Dispatcher,
    aggregator: ResultAggregator,
    summarizer: Box<dyn Summarizer>,
}

impl Orchestrator {
    pub fn new(
        classifier: IntentClassifier,
        dispatcher: Dispatcher,
        aggregator: ResultAggregator,
        summarizer: Box<dyn Summarizer>,
    ) -> Self {
        Self {
            classifier,
            dispatcher,
            aggregator,
            summarizer,
        }
    }

    /// Wire the default classifier, registry and summarizer from settings.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let registry = create_default_registry(settings).await?;
        let table = DispatchTable::new().with_parallel(
            QueryType::StockPriceInquiry,
            &settings.price_inquiry_enrichment,
        );
        let dispatcher = Dispatcher::new(registry, table, settings.capability_timeout);

        let summarizer: Box<dyn Summarizer> = match &settings.gemini_api_key {
            Some(key) => Box::new(GeminiSummarizer::new(GeminiClient::new(key.clone()))),
            None => Box::new(TemplateSummarizer),
        };
        info!(summarizer = summarizer.name(), "Orchestrator ready");

        Ok(Self::new(
            IntentClassifier::new(),
            dispatcher,
            ResultAggregator::new(),
            summarizer,
        ))
    }

    /// Registered capabilities with their descriptions
    pub fn capabilities(&self) -> Vec<(Capability, &'static str)> {
        self.dispatcher.registry().describe()
    }

    pub fn summarizer_name(&self) -> &'static str {
        self.summarizer.name()
    }

    pub fn classify(&self, query: &str) -> StructuredIntent {
        self.classifier.classify(query)
    }

    pub async fn handle(&self, query: &str) -> QueryResponse {
        let request_id = Uuid::new_v4();
        let start = Instant::now();

        info!(request_id = %request_id, query = %query, "Orchestrator: query received");

        let intent = self.classifier.classify(query);
        if intent.is_unknown() {
            return QueryResponse::success(request_id, usage_hint()).with_structured(intent);
        }

        let results = match self.dispatcher.dispatch(&intent).await {
            DispatchOutcome::Unsupported => {
                return QueryResponse::success(request_id, usage_hint()).with_structured(intent)
            }
            DispatchOutcome::TotalFailure { message, .. } => {
                warn!(
                    request_id = %request_id,
                    query_type = %intent.query_type,
                    error = %message,
                    "Every capability failed"
                );
                return QueryResponse::error(request_id, message).with_structured(intent);
            }
            DispatchOutcome::Completed(results) => results,
        };

        let result = self.aggregator.aggregate(&intent, &results);

        let summary = self
            .summarizer
            .summarize(&SummaryRequest {
                query,
                structured: &intent,
                result: &result,
            })
            .await;
        let answer = match summary {
            Ok(summary) => summary.final_answer,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Summarizer failed; using template");
                TemplateSummarizer.render(&result)
            }
        };

        info!(
            request_id = %request_id,
            query_type = %intent.query_type,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Orchestrator: query answered"
        );

        QueryResponse::success(request_id, answer)
            .with_structured(intent)
            .with_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::market_data::tests::sample_dataset;
    use crate::collaborators::{
        CollaboratorRegistry, InMemoryMarketData, SignalEvaluator, UnconfiguredMarketData,
    };
    use crate::error::OrchestrationError;
    use crate::models::{ResponseStatus, ResultView};
    use crate::summarizer::SummaryResponse;
    use std::sync::Arc;
    use std::time::Duration;

    struct BrokenSummarizer;

    #[async_trait::async_trait]
    impl Summarizer for BrokenSummarizer {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn summarize(&self, _request: &SummaryRequest<'_>) -> Result<SummaryResponse> {
            Err(OrchestrationError::LlmError("quota exceeded".into()))
        }
    }

    fn orchestrator_with(registry: CollaboratorRegistry, summarizer: Box<dyn Summarizer>) -> Orchestrator {
        Orchestrator::new(
            IntentClassifier::new(),
            Dispatcher::new(registry, DispatchTable::new(), Duration::from_secs(1)),
            ResultAggregator::new(),
            summarizer,
        )
    }

    fn orchestrator() -> Orchestrator {
        let mut registry = CollaboratorRegistry::new();
        registry.register(Arc::new(InMemoryMarketData::new(sample_dataset())));
        registry.register(Arc::new(SignalEvaluator));
        orchestrator_with(registry, Box::new(TemplateSummarizer))
    }

    #[tokio::test]
    async fn test_unknown_query_gets_usage_hints() {
        let response = orchestrator().handle("오늘 날씨 어때").await;
        assert!(response.is_success());
        assert!(response.response.as_deref().unwrap().contains("상승률 상위 5개 종목"));
        assert_eq!(response.structured.unwrap().confidence, 0.0);
        assert!(response.result.is_none());
    }

    #[tokio::test]
    async fn test_historical_close() {
        let response = orchestrator().handle("삼성전자의 2024-07-01 종가는?").await;
        assert!(response.is_success());
        assert!(response.response.as_deref().unwrap().contains("종가: 10,000원"));
        assert_eq!(
            response.structured.unwrap().sub_type.as_deref(),
            Some("historical_close")
        );
    }

    #[tokio::test]
    async fn test_top_gainers_end_to_end() {
        let response = orchestrator().handle("상승률 상위 3개 종목").await;
        let result = response.result.unwrap();
        let ResultView::Ranking { items, total_count, .. } = result.view else {
            panic!("expected ranking view");
        };
        assert_eq!(total_count, 5);
        let names: Vec<&str> = items.iter().map(|i| i.record.display_name()).collect();
        assert_eq!(names, vec!["에코프로비엠", "SK하이닉스", "삼성전자"]);
    }

    #[tokio::test]
    async fn test_threshold_and_no_matches() {
        let o = orchestrator();

        let response = o.handle("3% 이상 상승한 종목").await;
        assert!(matches!(
            response.result.unwrap().view,
            ResultView::Threshold { match_count: 2, .. }
        ));

        let response = o.handle("30% 이상 상승한 종목").await;
        assert!(response.is_success());
        assert!(response.response.unwrap().contains("종목이 없습니다"));
    }

    #[tokio::test]
    async fn test_movement_count() {
        let response = orchestrator().handle("2024-07-01 상승한 종목은 몇 개").await;
        assert!(matches!(
            response.result.unwrap().view,
            ResultView::Statistics { count: 3, universe: 5, .. }
        ));
    }

    #[tokio::test]
    async fn test_technical_signal_pipeline() {
        let response = orchestrator().handle("삼성전자 20일 이평선 3% 상향 돌파").await;
        let ResultView::Signal { gap_ratio, judgement, .. } = response.result.unwrap().view else {
            panic!("expected signal view");
        };
        assert_eq!(gap_ratio, 11.33);
        assert!(judgement);
    }

    #[tokio::test]
    async fn test_total_failure_is_error_envelope() {
        let mut registry = CollaboratorRegistry::new();
        registry.register(Arc::new(UnconfiguredMarketData));
        let o = orchestrator_with(registry, Box::new(TemplateSummarizer));

        let response = o.handle("카카오 현재가").await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.message.unwrap().contains("not configured"));
        assert!(response.structured.is_some());
    }

    #[tokio::test]
    async fn test_summarizer_failure_falls_back_to_template() {
        let mut registry = CollaboratorRegistry::new();
        registry.register(Arc::new(InMemoryMarketData::new(sample_dataset())));
        let o = orchestrator_with(registry, Box::new(BrokenSummarizer));

        let response = o.handle("카카오 현재가").await;
        assert!(response.is_success());
        assert!(response.response.unwrap().contains("카카오"));
    }

    #[tokio::test]
    async fn test_from_default_settings() {
        let o = Orchestrator::from_settings(&Settings::default()).await.unwrap();
        assert_eq!(o.summarizer_name(), "template");
        let caps: Vec<Capability> = o.capabilities().into_iter().map(|(c, _)| c).collect();
        assert!(caps.contains(&Capability::PriceLookup));
    }
}
