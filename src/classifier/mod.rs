//! Intent classifier
//!
//! Turns a raw query into exactly one `StructuredIntent` by walking an
//! ordered rule cascade:
//! price inquiry > market statistics > ranking > conditional search > technical signal.
//!
//! The first rule that matches (and whose parameters fit) wins. A completion
//! pass then fills date / market / symbol from the full text without
//! overriding anything the rule already set.

pub mod rules;

use crate::extractors::{extract_date_on, extract_market, extract_symbol};
use crate::models::{IntentParameters, QueryType, StructuredIntent};
use chrono::{Local, NaiveDate};
use tracing::{debug, info};

pub use rules::{default_rules, IntentRule, RuleMatch};

/// Rule-based query classifier
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    /// Build a classifier from an arbitrary rule list.
    ///
    /// Rules are stably reordered by category priority, so declaration order
    /// only matters within a category.
    pub fn with_rules(mut rules: Vec<IntentRule>) -> Self {
        rules.sort_by_key(|rule| rule.query_type.priority());
        Self { rules }
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn classify(&self, query: &str) -> StructuredIntent {
        self.classify_on(query, Local::now().date_naive())
    }

    /// Classify with relative dates (오늘/어제, `M월 D일`) resolved against `today`.
    pub fn classify_on(&self, query: &str, today: NaiveDate) -> StructuredIntent {
        let text = query.trim();

        let matched = self
            .rules
            .iter()
            .find_map(|rule| rule.apply(text).map(|m| (rule, m)));

        let Some((rule, RuleMatch { sub_type, mut parameters })) = matched else {
            info!(query = %text, "Classifier: no rule matched");
            return StructuredIntent::unknown(query);
        };

        debug!(rule = rule.name, query_type = %rule.query_type, "Rule matched");

        complete_parameters(rule.query_type, text, today, &mut parameters);

        info!(
            query_type = %rule.query_type,
            sub_type = ?sub_type,
            confidence = rule.confidence,
            "Classifier: query classified"
        );

        StructuredIntent {
            original_query: query.to_string(),
            query_type: rule.query_type,
            sub_type,
            parameters,
            confidence: rule.confidence,
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Which of date / market / symbol belong to a category's parameter schema.
fn completion_schema(query_type: QueryType) -> (bool, bool, bool) {
    match query_type {
        QueryType::StockPriceInquiry | QueryType::TechnicalSignal => (true, true, true),
        QueryType::MarketStatistics
        | QueryType::RankingInquiry
        | QueryType::ConditionalSearch => (true, true, false),
        QueryType::Unknown => (false, false, false),
    }
}

fn complete_parameters(
    query_type: QueryType,
    text: &str,
    today: NaiveDate,
    parameters: &mut IntentParameters,
) {
    let (date, market, symbol) = completion_schema(query_type);

    if date && parameters.date.is_none() {
        parameters.date = extract_date_on(text, today);
    }
    if market && parameters.market.is_none() {
        parameters.market = Some(extract_market(text));
    }
    if symbol && parameters.symbol.is_none() {
        parameters.symbol = match query_type {
            QueryType::TechnicalSignal => extract_symbol(&strip_signal_vocabulary(text)),
            _ => extract_symbol(text),
        };
    }
}

/// Words of the signal rules that would otherwise pass as a company name.
/// Longer forms come first so `이동평균선` is removed whole.
const SIGNAL_VOCABULARY: &[&str] = &[
    "이동평균선", "이동평균", "이평선", "기술적", "돌파", "상향", "하향", "지지", "저항",
    "대비", "이상", "종목",
];

fn strip_signal_vocabulary(text: &str) -> String {
    SIGNAL_VOCABULARY
        .iter()
        .fold(text.to_string(), |acc, word| acc.replace(word, " "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, Market, PriceType, SignalType};
    use regex::Captures;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn classify(query: &str) -> StructuredIntent {
        IntentClassifier::new().classify_on(query, today())
    }

    #[test]
    fn test_historical_close_scenario() {
        let intent = classify("삼성전자의 2024-07-01 종가는?");
        assert_eq!(intent.query_type, QueryType::StockPriceInquiry);
        assert_eq!(intent.sub_type.as_deref(), Some("historical_close"));
        assert_eq!(intent.confidence, 0.9);
        assert_eq!(intent.parameters.symbol.as_deref(), Some("삼성전자"));
        assert_eq!(intent.parameters.date.as_deref(), Some("2024-07-01"));
        assert_eq!(intent.parameters.price_type, Some(PriceType::Close));
    }

    #[test]
    fn test_top_gainers_scenario() {
        let intent = classify("상승률 상위 5개 종목");
        assert_eq!(intent.query_type, QueryType::RankingInquiry);
        assert_eq!(intent.sub_type.as_deref(), Some("top_gainers"));
        assert_eq!(intent.parameters.limit, Some(5));
        assert_eq!(intent.parameters.market, Some(Market::All));
        assert_eq!(intent.parameters.date, None);
        assert_eq!(intent.parameters.symbol, None);
    }

    #[test]
    fn test_threshold_scenario() {
        let intent = classify("3% 이상 상승한 종목");
        assert_eq!(intent.query_type, QueryType::ConditionalSearch);
        assert_eq!(intent.sub_type.as_deref(), Some("above_threshold"));
        assert_eq!(intent.parameters.threshold, Some(3.0));
        assert_eq!(intent.parameters.direction, Some(Direction::Up));
        assert_eq!(intent.confidence, 0.85);
    }

    #[test]
    fn test_unrelated_query_is_unknown() {
        let intent = classify("오늘 날씨 어때");
        assert_eq!(intent.query_type, QueryType::Unknown);
        assert_eq!(intent.confidence, 0.0);
        assert!(intent.parameters.is_empty());
        assert_eq!(intent.sub_type, None);
    }

    #[test]
    fn test_confidence_zero_only_for_unknown() {
        for query in [
            "삼성전자 주가",
            "2024-07-01 거래 종목 수",
            "거래량 상위 3",
            "전날 대비 4% 하락",
            "기술적 돌파",
            "",
            "hello",
        ] {
            let intent = classify(query);
            assert_eq!(intent.confidence == 0.0, intent.is_unknown(), "{}", query);
        }
    }

    #[test]
    fn test_iso_date_token_is_kept_verbatim() {
        for query in [
            "2024-07-01 가장 많이 오른 종목",
            "2023-01-31 코스피 시장에 거래된 종목 수",
            "카카오 2024-02-29 시가",
            "2024-07-01 거래량 상위 3개",
        ] {
            let intent = classify(query);
            let token = crate::extractors::extract_date_on(query, today()).unwrap();
            assert_eq!(intent.parameters.date.as_deref(), Some(token.as_str()), "{}", query);
        }
    }

    #[test]
    fn test_completion_resolves_relative_date() {
        let intent = classify("어제 거래량 상위 3개");
        assert_eq!(intent.query_type, QueryType::RankingInquiry);
        assert_eq!(intent.parameters.date.as_deref(), Some("2025-03-09"));
        assert_eq!(intent.parameters.limit, Some(3));
    }

    #[test]
    fn test_completion_never_overrides_rule_values() {
        // Rule picks KOSPI from its own group; the completion pass must keep it
        let intent = classify("2024-07-01 코스피에서 거래량 많은 종목 4개 코스닥");
        assert_eq!(intent.parameters.market, Some(Market::Kospi));
        assert_eq!(intent.parameters.limit, Some(4));
    }

    #[test]
    fn test_higher_priority_category_wins() {
        // Price rule and ranking rule both fire; price inquiry is tried first
        let intent = classify("삼성전자 주가 상승률 상위 5개");
        assert_eq!(intent.query_type, QueryType::StockPriceInquiry);

        // Dated ranking cue is not claimed by the looser conditional rule
        let intent = classify("2024-07-01 가장 많이 오른 종목 5% 이상");
        assert_eq!(intent.query_type, QueryType::RankingInquiry);
    }

    #[test]
    fn test_priority_independent_of_rule_input_order() {
        let mut reversed = default_rules();
        reversed.reverse();
        let classifier = IntentClassifier::with_rules(reversed);

        for query in [
            "삼성전자 주가 상승률 상위 5개",
            "2024-07-01 가장 많이 오른 종목 5% 이상",
            "3% 이상 상승한 종목 이동평균 돌파",
        ] {
            let expected = classify(query).query_type;
            assert_eq!(classifier.classify_on(query, today()).query_type, expected);
        }
    }

    fn reject(_caps: &Captures<'_>, _text: &str) -> Option<RuleMatch> {
        None
    }

    #[test]
    fn test_malformed_rule_is_skipped() {
        let mut rules = vec![IntentRule::new(
            "always_malformed",
            QueryType::StockPriceInquiry,
            r"종목",
            0.99,
            reject,
        )];
        rules.extend(default_rules());
        let classifier = IntentClassifier::with_rules(rules);

        let intent = classifier.classify_on("3% 이상 상승한 종목", today());
        assert_eq!(intent.query_type, QueryType::ConditionalSearch);
        assert_eq!(intent.confidence, 0.85);
    }

    #[test]
    fn test_technical_signal_completion_fills_symbol() {
        let intent = classify("삼성전자 20일 이평선 3% 상향 돌파");
        assert_eq!(intent.query_type, QueryType::TechnicalSignal);
        assert_eq!(intent.sub_type.as_deref(), Some("moving_average_breakout"));
        assert_eq!(intent.parameters.symbol.as_deref(), Some("삼성전자"));
        assert_eq!(intent.parameters.ma_period, Some(20));
        assert_eq!(intent.parameters.threshold, Some(3.0));
        assert_eq!(intent.parameters.signal_type, Some(SignalType::Breakout));
        assert_eq!(intent.confidence, 0.8);
    }

    #[test]
    fn test_signal_vocabulary_is_not_a_symbol() {
        for query in ["20일 이평선 3% 상향 돌파", "50일 이동평균 돌파 종목", "기술적 돌파"] {
            let intent = classify(query);
            assert_eq!(intent.query_type, QueryType::TechnicalSignal, "{}", query);
            assert_eq!(intent.parameters.symbol, None, "{}", query);
        }
        assert_eq!(
            classify("카카오 50일 이동평균 돌파").parameters.symbol.as_deref(),
            Some("카카오")
        );
    }

    #[test]
    fn test_dated_signal_keeps_default_period() {
        let intent = classify("삼성전자 2024-07-01 이동평균 돌파");
        assert_eq!(intent.query_type, QueryType::TechnicalSignal);
        assert_eq!(intent.parameters.ma_period, Some(50));
        assert_eq!(intent.parameters.threshold, Some(10.0));
        assert_eq!(intent.parameters.date.as_deref(), Some("2024-07-01"));
        assert_eq!(intent.parameters.symbol.as_deref(), Some("삼성전자"));
    }

    #[test]
    fn test_dated_top_n_uses_default_limit() {
        let intent = classify("상승률 상위 2024-07-01");
        assert_eq!(intent.query_type, QueryType::RankingInquiry);
        assert_eq!(intent.parameters.limit, Some(5));
        assert_eq!(intent.parameters.date.as_deref(), Some("2024-07-01"));
    }

    #[test]
    fn test_ranking_limit_matches_stated_count() {
        for (query, limit) in [
            ("상승률 상위 12개 종목", 12),
            ("하락률 하위 3 종목", 3),
            ("2024-07-01 KOSDAQ 거래량 많은 종목 8개", 8),
            ("2024-07-01 가장 많이 떨어진 종목 6개", 6),
            ("2024-07-01 가장 많이 오른 종목", 10),
        ] {
            let intent = classify(query);
            assert_eq!(intent.query_type, QueryType::RankingInquiry, "{}", query);
            assert_eq!(intent.parameters.limit, Some(limit), "{}", query);
        }
    }
}
