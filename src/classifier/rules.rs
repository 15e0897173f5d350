//! Intent rule table
//!
//! Each rule pairs a text pattern with a fixed confidence and a parameter
//! builder. Builders return `None` when the match does not fit the rule's
//! parameter schema; the classifier then moves on to the next rule.

use crate::extractors::{
    extract_market, extract_numbers, extract_price_type, extract_symbol, strip_dates,
};
use crate::models::{Direction, IntentParameters, Market, PriceType, QueryType, SignalType};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

pub type ParameterBuilder = fn(&Captures<'_>, &str) -> Option<RuleMatch>;

/// What a matching rule contributes to the structured intent.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub sub_type: Option<String>,
    pub parameters: IntentParameters,
}

#[derive(Debug, Clone)]
pub struct IntentRule {
    pub name: &'static str,
    pub query_type: QueryType,
    pub pattern: Regex,
    pub confidence: f64,
    pub build: ParameterBuilder,
}

impl IntentRule {
    /// Panics if `pattern` is not a valid regex; rule patterns are literals.
    pub fn new(
        name: &'static str,
        query_type: QueryType,
        pattern: &str,
        confidence: f64,
        build: ParameterBuilder,
    ) -> Self {
        Self {
            name,
            query_type,
            pattern: Regex::new(pattern).expect("valid intent rule pattern"),
            confidence,
            build,
        }
    }

    /// Match the rule against `text` and build its parameters.
    pub fn apply(&self, text: &str) -> Option<RuleMatch> {
        let caps = self.pattern.captures(text)?;
        (self.build)(&caps, text)
    }
}

const PRICE_CONFIDENCE: f64 = 0.9;
const STATISTICS_CONFIDENCE: f64 = 0.85;
const RANKING_CONFIDENCE: f64 = 0.9;
const CONDITIONAL_CONFIDENCE: f64 = 0.85;
const SIGNAL_CONFIDENCE: f64 = 0.8;

const DEFAULT_RANKING_LIMIT: usize = 5;
const VAGUE_RANKING_LIMIT: usize = 10;
const DEFAULT_MA_PERIOD: u32 = 50;
const DEFAULT_BREAKOUT_THRESHOLD: f64 = 10.0;

lazy_static! {
    static ref STATED_COUNT: Regex = Regex::new(r"(\d+)\s*개").expect("valid count regex");
    static ref DEFAULT_RULES: Vec<IntentRule> = build_default_rules();
}

/// The built-in cascade, already in priority order.
pub fn default_rules() -> Vec<IntentRule> {
    DEFAULT_RULES.clone()
}

fn build_default_rules() -> Vec<IntentRule> {
    vec![
        // ---- price inquiry ----
        IntentRule::new(
            "price_historical_question",
            QueryType::StockPriceInquiry,
            r"(.+?)의?\s*(\d{4}-\d{2}-\d{2})\s*(시가|종가|고가|저가)(?:은|는)?\?",
            PRICE_CONFIDENCE,
            historical_price,
        ),
        IntentRule::new(
            "price_historical",
            QueryType::StockPriceInquiry,
            r"(.+?)\s*(\d{4}-\d{2}-\d{2})\s*(시가|종가|고가|저가)",
            PRICE_CONFIDENCE,
            historical_price,
        ),
        IntentRule::new(
            "price_current",
            QueryType::StockPriceInquiry,
            r"(.+?)(?:의)?\s*(현재가|주가|가격)(?:은|는)?\s*(?:얼마|어떻게)?",
            PRICE_CONFIDENCE,
            current_price,
        ),
        // ---- market statistics ----
        IntentRule::new(
            "statistics_movement_count",
            QueryType::MarketStatistics,
            r"(\d{4}-\d{2}-\d{2})에?\s*(상승|하락)한?\s*종목(?:은|는)?\s*몇\s*개",
            STATISTICS_CONFIDENCE,
            market_statistics,
        ),
        IntentRule::new(
            "statistics_market_total",
            QueryType::MarketStatistics,
            r"(\d{4}-\d{2}-\d{2})\s*(KOSPI|KOSDAQ|코스피|코스닥)?\s*시장에?\s*거래된?\s*종목\s*수",
            STATISTICS_CONFIDENCE,
            market_statistics,
        ),
        IntentRule::new(
            "statistics_total",
            QueryType::MarketStatistics,
            r"(\d{4}-\d{2}-\d{2})\s*거래\s*종목\s*수",
            STATISTICS_CONFIDENCE,
            market_statistics,
        ),
        // ---- ranking ----
        IntentRule::new(
            "ranking_dated_market",
            QueryType::RankingInquiry,
            r"(\d{4}-\d{2}-\d{2})(?:에서)?\s*(KOSPI|KOSDAQ|코스피|코스닥)(?:에서)?\s*(상승률|하락률|거래량)\s*(높은|많은)\s*종목\s*(\d+)개",
            RANKING_CONFIDENCE,
            dated_market_ranking,
        ),
        IntentRule::new(
            "ranking_top_n",
            QueryType::RankingInquiry,
            r"(상승률|하락률|거래량)\s*(상위|하위)\s*(\d+)?\s*(?:개)?(?:\s*종목)?",
            RANKING_CONFIDENCE,
            top_n_ranking,
        ),
        IntentRule::new(
            "ranking_most_moved",
            QueryType::RankingInquiry,
            r"(\d{4}-\d{2}-\d{2})\s*가장\s*(많이|적게)\s*(오른|떨어진|거래된)\s*종목",
            RANKING_CONFIDENCE,
            vague_ranking,
        ),
        // ---- conditional search ----
        IntentRule::new(
            "conditional_directional",
            QueryType::ConditionalSearch,
            r"(\d+(?:\.\d+)?)%\s*이상\s*(상승|하락|오른|떨어진)",
            CONDITIONAL_CONFIDENCE,
            threshold_search,
        ),
        IntentRule::new(
            "conditional_bound",
            QueryType::ConditionalSearch,
            r"(\d+(?:\.\d+)?)%\s*(?:이상|초과|이하|미만)",
            CONDITIONAL_CONFIDENCE,
            threshold_search,
        ),
        IntentRule::new(
            "conditional_day_over_day",
            QueryType::ConditionalSearch,
            r"전날\s*대비\s*(\d+(?:\.\d+)?)%",
            CONDITIONAL_CONFIDENCE,
            threshold_search,
        ),
        // ---- technical signal ----
        IntentRule::new(
            "signal_moving_average_threshold",
            QueryType::TechnicalSignal,
            r"(\d+)일\s*(이동평균|이평선).*?(\d+(?:\.\d+)?)%.*?(돌파|상향|하향)",
            SIGNAL_CONFIDENCE,
            explicit_moving_average,
        ),
        IntentRule::new(
            "signal_moving_average",
            QueryType::TechnicalSignal,
            r"이동평균(?:선)?\s*(돌파|상향|하향)",
            SIGNAL_CONFIDENCE,
            implied_moving_average,
        ),
        IntentRule::new(
            "signal_technical",
            QueryType::TechnicalSignal,
            r"기술적\s*(돌파|지지|저항)",
            SIGNAL_CONFIDENCE,
            implied_moving_average,
        ),
    ]
}

//
// ================= Builders =================
//

fn group<'t>(caps: &Captures<'t>, index: usize) -> Option<&'t str> {
    caps.get(index).map(|m| m.as_str())
}

fn market_token(token: &str) -> Option<Market> {
    match token {
        "KOSPI" | "코스피" => Some(Market::Kospi),
        "KOSDAQ" | "코스닥" => Some(Market::Kosdaq),
        _ => None,
    }
}

fn price_sub_type(prefix: &str, price_type: PriceType) -> String {
    match price_type {
        PriceType::Current => format!("{}_price", prefix),
        other => format!("{}_{}", prefix, other),
    }
}

fn historical_price(caps: &Captures<'_>, _text: &str) -> Option<RuleMatch> {
    let raw_symbol = group(caps, 1)?.trim();
    let symbol = raw_symbol.strip_suffix('의').unwrap_or(raw_symbol).trim();
    if symbol.is_empty() {
        return None;
    }
    let date = group(caps, 2)?;
    let price_type = extract_price_type(group(caps, 3)?);

    Some(RuleMatch {
        sub_type: Some(price_sub_type("historical", price_type)),
        parameters: IntentParameters {
            symbol: Some(symbol.to_string()),
            date: Some(date.to_string()),
            price_type: Some(price_type),
            ..Default::default()
        },
    })
}

fn current_price(_caps: &Captures<'_>, text: &str) -> Option<RuleMatch> {
    let price_type = extract_price_type(text);

    Some(RuleMatch {
        sub_type: Some(price_sub_type("current", price_type)),
        parameters: IntentParameters {
            symbol: extract_symbol(text),
            price_type: Some(price_type),
            ..Default::default()
        },
    })
}

fn market_statistics(caps: &Captures<'_>, text: &str) -> Option<RuleMatch> {
    let date = group(caps, 1)?;
    let market = group(caps, 2)
        .and_then(market_token)
        .unwrap_or_else(|| extract_market(text));

    let (sub_type, movement) = if text.contains("상승") {
        ("movement_count", Some(Direction::Up))
    } else if text.contains("하락") {
        ("movement_count", Some(Direction::Down))
    } else if text.contains("종목") && text.contains('수') {
        ("total_count", None)
    } else {
        return None;
    };

    Some(RuleMatch {
        sub_type: Some(sub_type.to_string()),
        parameters: IntentParameters {
            date: Some(date.to_string()),
            market: Some(market),
            movement,
            ..Default::default()
        },
    })
}

fn ranking_sub_type(field: &str) -> Option<&'static str> {
    match field {
        "상승률" | "오른" => Some("top_gainers"),
        "하락률" | "떨어진" => Some("top_losers"),
        "거래량" | "거래된" => Some("top_volume"),
        _ => None,
    }
}

fn stated_count(text: &str) -> Option<usize> {
    STATED_COUNT
        .captures_iter(text)
        .last()
        .and_then(|caps| caps[1].parse().ok())
}

fn ranking(sub_type: &str, limit: usize, market: Market, date: Option<&str>) -> RuleMatch {
    RuleMatch {
        sub_type: Some(sub_type.to_string()),
        parameters: IntentParameters {
            limit: Some(limit),
            market: Some(market),
            date: date.map(str::to_string),
            ..Default::default()
        },
    }
}

fn dated_market_ranking(caps: &Captures<'_>, _text: &str) -> Option<RuleMatch> {
    let date = group(caps, 1)?;
    let market = market_token(group(caps, 2)?)?;
    let sub_type = ranking_sub_type(group(caps, 3)?)?;
    let limit = group(caps, 5)?.parse().ok()?;

    Some(ranking(sub_type, limit, market, Some(date)))
}

fn top_n_ranking(caps: &Captures<'_>, text: &str) -> Option<RuleMatch> {
    let sub_type = ranking_sub_type(group(caps, 1)?)?;
    // A digit run that continues into `-` is a date, not a count
    let count = caps
        .get(3)
        .filter(|m| !text[m.end()..].starts_with('-'))
        .map(|m| m.as_str());
    let limit = match count {
        Some(count) => count.parse().ok()?,
        None => stated_count(text).unwrap_or(DEFAULT_RANKING_LIMIT),
    };

    Some(ranking(sub_type, limit, extract_market(text), None))
}

fn vague_ranking(caps: &Captures<'_>, text: &str) -> Option<RuleMatch> {
    let date = group(caps, 1)?;
    let sub_type = ranking_sub_type(group(caps, 3)?)?;
    let limit = stated_count(text).unwrap_or(VAGUE_RANKING_LIMIT);

    Some(ranking(sub_type, limit, extract_market(text), Some(date)))
}

fn threshold_search(caps: &Captures<'_>, text: &str) -> Option<RuleMatch> {
    let threshold: f64 = group(caps, 1)?.parse().ok()?;

    let direction = if text.contains("상승") || text.contains("오른") {
        Some(Direction::Up)
    } else if text.contains("하락") || text.contains("떨어진") {
        Some(Direction::Down)
    } else {
        None
    };
    let sub_type = direction.map(|d| match d {
        Direction::Up => "above_threshold".to_string(),
        Direction::Down => "below_threshold".to_string(),
    });

    Some(RuleMatch {
        sub_type,
        parameters: IntentParameters {
            threshold: Some(threshold),
            direction,
            ..Default::default()
        },
    })
}

fn signal_type(text: &str) -> SignalType {
    if text.contains("돌파") {
        SignalType::Breakout
    } else {
        SignalType::Cross
    }
}

fn moving_average_breakout(ma_period: u32, threshold: f64, text: &str) -> RuleMatch {
    RuleMatch {
        sub_type: Some("moving_average_breakout".to_string()),
        parameters: IntentParameters {
            ma_period: Some(ma_period),
            threshold: Some(threshold),
            signal_type: Some(signal_type(text)),
            direction: Some(signal_direction(text)),
            ..Default::default()
        },
    }
}

fn signal_direction(text: &str) -> Direction {
    if text.contains("하향") {
        Direction::Down
    } else {
        Direction::Up
    }
}

fn explicit_moving_average(caps: &Captures<'_>, text: &str) -> Option<RuleMatch> {
    let ma_period: u32 = group(caps, 1)?.parse().ok()?;
    let threshold: f64 = group(caps, 3)?.parse().ok()?;
    if ma_period == 0 {
        return None;
    }

    Some(moving_average_breakout(ma_period, threshold, text))
}

fn implied_moving_average(_caps: &Captures<'_>, text: &str) -> Option<RuleMatch> {
    let numbers = extract_numbers(&strip_dates(text));
    let ma_period = numbers
        .first()
        .map(|n| *n as u32)
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MA_PERIOD);
    let threshold = numbers.get(1).copied().unwrap_or(DEFAULT_BREAKOUT_THRESHOLD);

    Some(moving_average_breakout(ma_period, threshold, text))
}
