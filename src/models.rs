//! Core data models for query understanding, dispatch and aggregation

use crate::error::OrchestrationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    StockPriceInquiry,
    MarketStatistics,
    RankingInquiry,
    ConditionalSearch,
    TechnicalSignal,
    Unknown,
}

impl QueryType {
    /// Evaluation order of the rule cascade; lower ranks are tried first.
    pub fn priority(self) -> u8 {
        match self {
            QueryType::StockPriceInquiry => 0,
            QueryType::MarketStatistics => 1,
            QueryType::RankingInquiry => 2,
            QueryType::ConditionalSearch => 3,
            QueryType::TechnicalSignal => 4,
            QueryType::Unknown => u8::MAX,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::StockPriceInquiry => "stock_price_inquiry",
            QueryType::MarketStatistics => "market_statistics",
            QueryType::RankingInquiry => "ranking_inquiry",
            QueryType::ConditionalSearch => "conditional_search",
            QueryType::TechnicalSignal => "technical_signal",
            QueryType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Kospi,
    Kosdaq,
    All,
}

impl Market {
    /// `All` matches every listing.
    pub fn includes(self, other: Option<Market>) -> bool {
        match (self, other) {
            (Market::All, _) => true,
            (market, Some(other)) => market == other,
            (_, None) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PriceType {
    Open,
    Close,
    High,
    Low,
    Current,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Breakout,
    Cross,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RankingField {
    Gain,
    Loss,
    Volume,
}

//
// ================= Intent =================
//

/// Parameters gathered for a classified query.
///
/// Every field is optional; a value the text did not yield is simply absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IntentParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_type: Option<PriceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<Market>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ma_period: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_type: Option<SignalType>,
}

impl IntentParameters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructuredIntent {
    pub original_query: String,
    pub query_type: QueryType,
    pub sub_type: Option<String>,
    pub parameters: IntentParameters,
    pub confidence: f64,
}

impl StructuredIntent {
    pub fn unknown(query: &str) -> Self {
        Self {
            original_query: query.to_string(),
            query_type: QueryType::Unknown,
            sub_type: None,
            parameters: IntentParameters::default(),
            confidence: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.query_type == QueryType::Unknown
    }
}

//
// ================= Capabilities =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    PriceLookup,
    FilingLookup,
    ListingLookup,
    SignalEvaluation,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::PriceLookup => "price-lookup",
            Capability::FilingLookup => "filing-lookup",
            Capability::ListingLookup => "listing-lookup",
            Capability::SignalEvaluation => "signal-evaluation",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Capability {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "price-lookup" => Ok(Capability::PriceLookup),
            "filing-lookup" => Ok(Capability::FilingLookup),
            "listing-lookup" => Ok(Capability::ListingLookup),
            "signal-evaluation" => Ok(Capability::SignalEvaluation),
            other => Err(OrchestrationError::ConfigError(format!(
                "unknown capability '{}'",
                other
            ))),
        }
    }
}

//
// ================= Collaborator I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorRequest {
    #[serde(rename = "type")]
    pub request_type: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CollaboratorResponse {
    pub fn success(data: Value) -> Self {
        Self {
            status: ResponseStatus::Success,
            data,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            data: Value::Null,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Ok,
    Error,
}

/// Outcome of a single capability invocation within one dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorResult {
    pub capability: Capability,
    pub status: ResultStatus,
    pub payload: Value,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl CollaboratorResult {
    pub fn ok(capability: Capability, payload: Value, elapsed_ms: u64) -> Self {
        Self {
            capability,
            status: ResultStatus::Ok,
            payload,
            error: None,
            elapsed_ms,
        }
    }

    pub fn failed(capability: Capability, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            capability,
            status: ResultStatus::Error,
            payload: Value::Null,
            error: Some(error.into()),
            elapsed_ms,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResultStatus::Ok
    }
}

//
// ================= Market Data =================
//

/// One instrument row as returned by price-lookup in bulk mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketRecord {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<Market>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub current_price: f64,
    #[serde(default)]
    pub change_rate: f64,
    #[serde(default)]
    pub volume: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
}

impl MarketRecord {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.symbol)
    }

    pub fn price(&self, price_type: PriceType) -> Option<f64> {
        match price_type {
            PriceType::Open => self.open,
            PriceType::Close => self.close,
            PriceType::High => self.high,
            PriceType::Low => self.low,
            PriceType::Current => Some(self.current_price),
        }
    }
}

//
// ================= Aggregation =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedRecord {
    pub rank: usize,
    pub source: Capability,
    pub record: MarketRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourcedPayload {
    pub capability: Capability,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityFailure {
    pub capability: Capability,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultView {
    Single {
        source: Capability,
        payload: Option<Value>,
        error: Option<String>,
    },
    Ranking {
        source: Capability,
        field: RankingField,
        limit: usize,
        total_count: usize,
        items: Vec<RankedRecord>,
    },
    Threshold {
        source: Capability,
        threshold: f64,
        direction: Option<Direction>,
        match_count: usize,
        no_matches: bool,
        items: Vec<MarketRecord>,
    },
    Statistics {
        source: Capability,
        sub_type: String,
        movement: Option<Direction>,
        market: Market,
        date: Option<String>,
        count: usize,
        universe: usize,
    },
    Signal {
        source: Capability,
        symbol: String,
        signal_type: SignalType,
        direction: Direction,
        ma_period: u32,
        threshold: f64,
        latest_close: f64,
        moving_average: f64,
        gap_ratio: f64,
        judgement: bool,
    },
}

/// Merged view over every collaborator output of one dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedResult {
    #[serde(flatten)]
    pub view: ResultView,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supplements: Vec<SourcedPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<CapabilityFailure>,
}

//
// ================= Response Envelope =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub request_id: Uuid,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<StructuredIntent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AggregatedResult>,
}

impl QueryResponse {
    pub fn success(request_id: Uuid, response: String) -> Self {
        Self {
            request_id,
            status: ResponseStatus::Success,
            response: Some(response),
            message: None,
            structured: None,
            result: None,
        }
    }

    pub fn error(request_id: Uuid, message: String) -> Self {
        Self {
            request_id,
            status: ResponseStatus::Error,
            response: None,
            message: Some(message),
            structured: None,
            result: None,
        }
    }

    pub fn with_structured(mut self, structured: StructuredIntent) -> Self {
        self.structured = Some(structured);
        self
    }

    pub fn with_result(mut self, result: AggregatedResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Market::Kospi => "KOSPI",
            Market::Kosdaq => "KOSDAQ",
            Market::All => "ALL",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for PriceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PriceType::Open => "open",
            PriceType::Close => "close",
            PriceType::High => "high",
            PriceType::Low => "low",
            PriceType::Current => "current",
        };
        write!(f, "{}", s)
    }
}
